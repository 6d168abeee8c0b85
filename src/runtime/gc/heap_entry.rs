/// One occupied slot of the tracked set.
pub struct HeapEntry<P> {
    pub(crate) object: P,
    /// Number of sweeps this object has survived.
    pub(crate) survived: usize,
}

impl<P> HeapEntry<P> {
    pub fn object(&self) -> &P {
        &self.object
    }

    pub fn survived(&self) -> usize {
        self.survived
    }
}
