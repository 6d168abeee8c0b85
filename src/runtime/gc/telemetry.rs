//! GC telemetry and heap analysis.
//!
//! Collected only when an isolate is configured with `telemetry: true`;
//! otherwise the isolate holds no collector and every hook is skipped.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

// ---------------------------------------------------------------------------
// ObjectKind: payload classification
// ---------------------------------------------------------------------------

/// Classification of heap payloads for telemetry bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectKind {
    String = 0,
    Number = 1,
    Opaque = 2,
}

impl ObjectKind {
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::String => "String",
            ObjectKind::Number => "Number",
            ObjectKind::Opaque => "Opaque",
        }
    }

    /// All variants for iteration.
    pub const ALL: [ObjectKind; 3] = [ObjectKind::String, ObjectKind::Number, ObjectKind::Opaque];
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Per-kind allocation stats
// ---------------------------------------------------------------------------

/// Cumulative statistics for one object kind.
#[derive(Debug, Clone, Default)]
pub struct KindStats {
    pub alloc_count: usize,
    pub alloc_bytes: usize,
    pub reclaimed_count: usize,
    pub reclaimed_bytes: usize,
    pub survival_count: usize,
}

// ---------------------------------------------------------------------------
// Collection cycle metrics
// ---------------------------------------------------------------------------

/// Metrics captured for a single `collect()` pass.
#[derive(Debug, Clone)]
pub struct CycleMetrics {
    pub cycle_index: usize,
    pub duration: Duration,
    pub tracked_before: usize,
    pub tracked_after: usize,
    pub reclaimed_count: usize,
    pub bytes_reclaimed: usize,
}

// ---------------------------------------------------------------------------
// Heap snapshot
// ---------------------------------------------------------------------------

/// One tracked object as seen by a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotInfo {
    pub slot: u32,
    pub kind: ObjectKind,
    pub handles: usize,
    pub bytes: usize,
}

/// Point-in-time summary of an isolate's tracked set.
#[derive(Debug, Clone, Serialize)]
pub struct HeapSnapshot {
    pub capacity: usize,
    pub tracked: usize,
    pub free_list_len: usize,
    pub fragmentation: f64,
    pub utilization: f64,
    pub kind_breakdown: Vec<(ObjectKind, usize, usize)>,
    pub slots: Vec<SlotInfo>,
    pub total_live_bytes: usize,
}

impl HeapSnapshot {
    /// Builds a snapshot from per-slot rows and slab geometry.
    pub fn from_slots(capacity: usize, free_list_len: usize, slots: Vec<SlotInfo>) -> Self {
        let tracked = slots.len();
        let (fragmentation, utilization) = if capacity == 0 {
            (0.0, 0.0)
        } else {
            (
                free_list_len as f64 / capacity as f64,
                tracked as f64 / capacity as f64,
            )
        };

        let kind_breakdown = ObjectKind::ALL
            .iter()
            .map(|&kind| {
                let (count, bytes) = slots
                    .iter()
                    .filter(|s| s.kind == kind)
                    .fold((0, 0), |(c, b), s| (c + 1, b + s.bytes));
                (kind, count, bytes)
            })
            .collect();
        let total_live_bytes = slots.iter().map(|s| s.bytes).sum();

        Self {
            capacity,
            tracked,
            free_list_len,
            fragmentation,
            utilization,
            kind_breakdown,
            slots,
            total_live_bytes,
        }
    }

    /// Slots whose objects are waiting for the next sweep.
    pub fn pending_reclaim(&self) -> usize {
        self.slots.iter().filter(|s| s.handles == 0).count()
    }
}

// ---------------------------------------------------------------------------
// GcTelemetry
// ---------------------------------------------------------------------------

/// Telemetry collector for isolate heap analysis.
///
/// Tracks per-kind allocation and reclamation statistics plus per-cycle
/// collection metrics.
pub struct GcTelemetry {
    kind_stats: [KindStats; 3],
    cycles: Vec<CycleMetrics>,
    cycle_start: Option<Instant>,
    tracked_before: usize,
    bytes_reclaimed: usize,
}

impl GcTelemetry {
    pub fn new() -> Self {
        Self {
            kind_stats: [
                KindStats::default(),
                KindStats::default(),
                KindStats::default(),
            ],
            cycles: Vec::new(),
            cycle_start: None,
            tracked_before: 0,
            bytes_reclaimed: 0,
        }
    }

    // -- Allocation tracking --

    #[inline]
    pub fn record_alloc(&mut self, kind: ObjectKind, size_bytes: usize) {
        let idx = kind as usize;
        self.kind_stats[idx].alloc_count += 1;
        self.kind_stats[idx].alloc_bytes += size_bytes;
    }

    // -- Reclaim and survival tracking (called around sweeps) --

    #[inline]
    pub fn record_reclaim(&mut self, kind: ObjectKind, size_bytes: usize) {
        let idx = kind as usize;
        self.kind_stats[idx].reclaimed_count += 1;
        self.kind_stats[idx].reclaimed_bytes += size_bytes;
        self.bytes_reclaimed += size_bytes;
    }

    #[inline]
    pub fn record_survival(&mut self, kind: ObjectKind) {
        self.kind_stats[kind as usize].survival_count += 1;
    }

    // -- Collection cycle tracking --

    /// Call before starting a collection cycle.
    pub fn begin_cycle(&mut self, tracked_before: usize) {
        self.cycle_start = Some(Instant::now());
        self.tracked_before = tracked_before;
        self.bytes_reclaimed = 0;
    }

    /// Call after a collection cycle completes.
    pub fn end_cycle(&mut self, tracked_after: usize, reclaimed: usize) {
        let duration = self
            .cycle_start
            .map(|start| start.elapsed())
            .unwrap_or_default();
        let cycle_index = self.cycles.len();
        self.cycles.push(CycleMetrics {
            cycle_index,
            duration,
            tracked_before: self.tracked_before,
            tracked_after,
            reclaimed_count: reclaimed,
            bytes_reclaimed: self.bytes_reclaimed,
        });
        self.cycle_start = None;
    }

    // -- Queries --

    pub fn kind_stats(&self, kind: ObjectKind) -> &KindStats {
        &self.kind_stats[kind as usize]
    }

    pub fn cycles(&self) -> &[CycleMetrics] {
        &self.cycles
    }

    pub fn total_alloc_bytes(&self) -> usize {
        self.kind_stats.iter().map(|s| s.alloc_bytes).sum()
    }

    pub fn total_alloc_count(&self) -> usize {
        self.kind_stats.iter().map(|s| s.alloc_count).sum()
    }

    pub fn total_reclaimed_count(&self) -> usize {
        self.kind_stats.iter().map(|s| s.reclaimed_count).sum()
    }

    // -- Reporting --

    /// Formatted report of per-kind allocation statistics.
    pub fn report_allocation_stats(&self) -> String {
        let mut out = String::from("=== GC Allocation Stats ===\n");
        out.push_str(&format!(
            "{:<10} {:>8} {:>12} {:>10} {:>12} {:>9}\n",
            "Kind", "Allocs", "AllocBytes", "Reclaimed", "ReclBytes", "Survived"
        ));
        out.push_str(&"-".repeat(66));
        out.push('\n');
        for kind in ObjectKind::ALL {
            let s = self.kind_stats(kind);
            out.push_str(&format!(
                "{:<10} {:>8} {:>12} {:>10} {:>12} {:>9}\n",
                kind.label(),
                s.alloc_count,
                s.alloc_bytes,
                s.reclaimed_count,
                s.reclaimed_bytes,
                s.survival_count,
            ));
        }
        out.push_str(&"-".repeat(66));
        out.push('\n');
        out.push_str(&format!(
            "{:<10} {:>8} {:>12} {:>10}\n",
            "TOTAL",
            self.total_alloc_count(),
            self.total_alloc_bytes(),
            self.total_reclaimed_count(),
        ));
        out
    }

    /// Formatted report of collection history.
    pub fn report_cycles(&self) -> String {
        if self.cycles.is_empty() {
            return "=== GC Cycles ===\nNo collections performed.\n".to_string();
        }
        let mut out = String::from("=== GC Cycles ===\n");
        out.push_str(&format!(
            "{:>5} {:>10} {:>8} {:>8} {:>9} {:>10}\n",
            "Cycle", "Duration", "Before", "After", "Reclaimed", "Bytes"
        ));
        out.push_str(&"-".repeat(55));
        out.push('\n');
        for c in &self.cycles {
            out.push_str(&format!(
                "{:>5} {:>8}us {:>8} {:>8} {:>9} {:>10}\n",
                c.cycle_index,
                c.duration.as_micros(),
                c.tracked_before,
                c.tracked_after,
                c.reclaimed_count,
                c.bytes_reclaimed,
            ));
        }
        out
    }

    /// Full telemetry report combining all sections.
    pub fn report_full(&self, snapshot: &HeapSnapshot) -> String {
        let mut out = self.report_allocation_stats();
        out.push('\n');
        out.push_str(&self.report_cycles());
        out.push('\n');
        out.push_str(&format_heap_snapshot(snapshot));
        out
    }
}

impl Default for GcTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Heap snapshot formatting
// ---------------------------------------------------------------------------

pub fn format_heap_snapshot(snap: &HeapSnapshot) -> String {
    let mut out = String::from("=== Heap Snapshot ===\n");
    out.push_str(&format!("Capacity (slots):   {}\n", snap.capacity));
    out.push_str(&format!("Tracked objects:    {}\n", snap.tracked));
    out.push_str(&format!("Pending reclaim:    {}\n", snap.pending_reclaim()));
    out.push_str(&format!("Free list length:   {}\n", snap.free_list_len));
    out.push_str(&format!("Total live bytes:   {}\n", snap.total_live_bytes));
    out.push_str(&format!(
        "Fragmentation:      {:.2}%\n",
        snap.fragmentation * 100.0
    ));
    out.push_str(&format!(
        "Utilization:        {:.2}%\n",
        snap.utilization * 100.0
    ));
    out.push_str("\nBreakdown by kind:\n");
    out.push_str(&format!("{:<10} {:>8} {:>12}\n", "Kind", "Count", "Bytes"));
    out.push_str(&"-".repeat(32));
    out.push('\n');
    for (kind, count, bytes) in &snap.kind_breakdown {
        out.push_str(&format!("{:<10} {:>8} {:>12}\n", kind.label(), count, bytes));
    }
    if !snap.slots.is_empty() {
        out.push_str("\nSlots:\n");
        for s in &snap.slots {
            out.push_str(&format!(
                "  slot {:>4}  {:<8} handles={} bytes={}\n",
                s.slot,
                s.kind.label(),
                s.handles,
                s.bytes
            ));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
