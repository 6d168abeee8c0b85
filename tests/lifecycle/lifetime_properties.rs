use heapscope::runtime::gc::{Handle, Isolate, ObjectId};
use heapscope::runtime::value::HeapNumber;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Copy(usize),
    Clear(usize),
    Drop(usize),
    Assign(usize, usize),
    Collect,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<usize>().prop_map(Op::Copy),
        any::<usize>().prop_map(Op::Clear),
        any::<usize>().prop_map(Op::Drop),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Assign(a, b)),
        Just(Op::Collect),
    ]
}

fn live_handles_for(handles: &[Handle<'_, HeapNumber>], id: ObjectId) -> usize {
    handles
        .iter()
        .filter(|h| h.object_id() == Some(id))
        .count()
}

proptest! {
    #[test]
    fn handle_count_matches_live_handles(
        objects in 1usize..6,
        ops in prop::collection::vec(op_strategy(), 0..64),
    ) {
        let isolate = Isolate::new();
        let mut handles: Vec<_> = (0..objects)
            .map(|i| HeapNumber::new(&isolate, i as f64))
            .collect();
        let ids: Vec<ObjectId> = handles.iter().filter_map(|h| h.object_id()).collect();

        for op in ops {
            match op {
                Op::Copy(i) if !handles.is_empty() => {
                    let copy = handles[i % handles.len()].clone();
                    handles.push(copy);
                }
                Op::Clear(i) if !handles.is_empty() => {
                    let len = handles.len();
                    handles[i % len].clear();
                }
                Op::Drop(i) if !handles.is_empty() => {
                    let len = handles.len();
                    handles.swap_remove(i % len);
                }
                Op::Assign(a, b) if !handles.is_empty() => {
                    let len = handles.len();
                    let source = handles[b % len].clone();
                    handles[a % len].clone_from(&source);
                }
                Op::Collect => {
                    isolate.collect();
                }
                _ => {}
            }

            for &id in &ids {
                let live = live_handles_for(&handles, id);
                match isolate.handle_count(id) {
                    Some(count) => prop_assert_eq!(count, live),
                    None => prop_assert_eq!(live, 0),
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn sweep_leaves_only_referenced_objects(
        keep in prop::collection::vec(any::<bool>(), 0..48),
    ) {
        let isolate = Isolate::new();
        let mut handles: Vec<_> = keep
            .iter()
            .enumerate()
            .map(|(i, _)| HeapNumber::new(&isolate, i as f64))
            .collect();
        let ids: Vec<ObjectId> = handles.iter().filter_map(|h| h.object_id()).collect();

        for (h, &kept) in handles.iter_mut().zip(&keep) {
            if !kept {
                h.clear();
            }
        }

        let reclaimed = isolate.collect();
        prop_assert_eq!(reclaimed, keep.iter().filter(|&&k| !k).count());
        for (id, &kept) in ids.iter().zip(&keep) {
            prop_assert_eq!(isolate.contains(*id), kept);
            if kept {
                prop_assert_eq!(isolate.handle_count(*id), Some(1));
            }
        }
    }
}

proptest! {
    #[test]
    fn clearing_twice_matches_clearing_once(copies in 1usize..8, target in any::<usize>()) {
        let once = Isolate::new();
        let twice = Isolate::new();

        let root_once = HeapNumber::new(&once, 1.0);
        let root_twice = HeapNumber::new(&twice, 1.0);
        let mut copies_once: Vec<_> = (0..copies).map(|_| root_once.clone()).collect();
        let mut copies_twice: Vec<_> = (0..copies).map(|_| root_twice.clone()).collect();

        let idx = target % copies;
        copies_once[idx].clear();
        copies_twice[idx].clear();
        copies_twice[idx].clear();

        prop_assert_eq!(root_once.handle_count(), root_twice.handle_count());
        prop_assert_eq!(root_once.handle_count(), copies);
        prop_assert!(copies_twice[idx].is_empty());
        prop_assert_eq!(once.collect(), twice.collect());
    }
}
