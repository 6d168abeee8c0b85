use std::thread;

use heapscope::runtime::gc::{IsolateConfig, ReclaimPolicy, SharedHandle, SharedIsolate};
use heapscope::runtime::value::{HeapNumber, HeapString};

#[test]
fn shared_scenario_single_object_two_handles() {
    let isolate = SharedIsolate::new();
    let id;
    {
        let h1 = isolate.alloc(HeapString::from("string"));
        id = h1.object_id().unwrap();
        let h2 = SharedHandle::from_handle(&isolate, &h1);
        assert_eq!(isolate.size(), 1);
        assert_eq!(h2.handle_count(), 2);
    }
    assert_eq!(isolate.handle_count(id), Some(0));
    assert_eq!(isolate.size(), 1);
    assert_eq!(isolate.collect(), 1);
    assert_eq!(isolate.size(), 0);
}

#[test]
fn handles_cloned_and_dropped_on_scoped_threads() {
    let isolate = SharedIsolate::new();
    let root = isolate.alloc(HeapNumber::from(1.0));

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let local: Vec<_> = (0..32).map(|_| root.clone()).collect();
                assert!(local.iter().all(|h| h.value() == 1.0));
            });
        }
    });

    assert_eq!(root.handle_count(), 1);
    assert_eq!(isolate.collect(), 0);
    assert_eq!(isolate.size(), 1);
}

#[test]
fn collect_runs_while_other_threads_hold_handles() {
    let isolate = SharedIsolate::new();
    let held: Vec<_> = (0..16)
        .map(|i| isolate.alloc(HeapNumber::from(i as f64)))
        .collect();
    for i in 0..16 {
        isolate.alloc(HeapNumber::from(i as f64));
    }

    let reclaimed = thread::scope(|scope| {
        let holder = scope.spawn(|| held.iter().map(|h| h.handle_count()).sum::<usize>());
        let collected = isolate.collect();
        assert_eq!(holder.join().unwrap(), 16);
        collected
    });

    assert_eq!(reclaimed, 16);
    assert_eq!(isolate.size(), 16);
}

#[test]
fn eager_shared_isolate_frees_without_collect() {
    let isolate =
        SharedIsolate::with_config(IsolateConfig::default().with_reclaim(ReclaimPolicy::Eager));
    let h = isolate.alloc(HeapString::from("short-lived"));
    let id = h.object_id().unwrap();

    thread::scope(|scope| {
        let moved = h;
        scope.spawn(move || drop(moved));
    });

    assert!(!isolate.contains(id));
    assert_eq!(isolate.size(), 0);
}

#[test]
fn eager_shared_isolates_sharing_an_object_both_release_it() {
    let eager =
        || SharedIsolate::with_config(IsolateConfig::default().with_reclaim(ReclaimPolicy::Eager));
    let a = eager();
    let b = eager();

    let h1 = a.alloc(HeapNumber::from(5.0));
    let id = h1.object_id().unwrap();
    let h2 = SharedHandle::from_handle(&b, &h1);

    thread::scope(|scope| {
        scope.spawn(move || drop(h1));
        scope.spawn(move || drop(h2));
    });

    assert!(!a.contains(id));
    assert!(!b.contains(id));
}

#[test]
fn shared_isolate_honours_telemetry_config() {
    let isolate = SharedIsolate::with_config(IsolateConfig::default().with_telemetry(true));
    let _kept = isolate.alloc(HeapString::from("kept"));
    isolate.alloc(HeapString::from("dropped"));
    isolate.collect();

    let report = isolate.telemetry_report().expect("telemetry enabled");
    assert!(report.contains("=== GC Allocation Stats ==="));
    assert!(report.contains("Tracked objects:    1"));
    assert_eq!(isolate.snapshot().pending_reclaim(), 0);
}
