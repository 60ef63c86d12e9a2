use hid_events::controller::DataWaiter;
use hid_events::wakeup::{EventSignal, EventTable, RegistryError, WaitHandle, WakeupRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct CountingSignal {
    count: AtomicUsize,
}

impl EventSignal for CountingSignal {
    fn set_event(&self, _handle: WaitHandle) -> Result<(), RegistryError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

const PRODUCERS: u32 = 4;
const CONSUMERS: u32 = 6;
const ROUNDS: u32 = 500;

#[test]
fn test_membership_is_net_of_adds_and_removes() {
    let signal = Arc::new(CountingSignal::default());
    let registry = Arc::new(WakeupRegistry::new(signal.clone()));
    let barrier = Arc::new(Barrier::new((PRODUCERS + CONSUMERS) as usize));
    let mut threads = Vec::new();

    // producers leave `t + 1` copies of their handle behind and keep waking
    for t in 0..PRODUCERS {
        let registry = registry.clone();
        let barrier = barrier.clone();
        threads.push(thread::spawn(move || {
            barrier.wait();
            let handle = WaitHandle(t);
            for _ in 0..=t {
                registry.add(handle).unwrap();
            }
            for _ in 0..ROUNDS {
                registry.wakeup().unwrap();
            }
        }));
    }

    // consumers register around each simulated wait and always clean up
    for t in 0..CONSUMERS {
        let registry = registry.clone();
        let barrier = barrier.clone();
        threads.push(thread::spawn(move || {
            barrier.wait();
            let handle = WaitHandle(1000 + t);
            for round in 0..ROUNDS {
                registry.add(handle).unwrap();
                if round % 3 == 0 {
                    registry.add(handle).unwrap();
                }
                registry.remove(handle).unwrap();
            }
        }));
    }

    for t in threads {
        t.join().unwrap();
    }

    let mut expected: HashMap<WaitHandle, usize> = HashMap::new();
    for t in 0..PRODUCERS {
        expected.insert(WaitHandle(t), (t + 1) as usize);
    }
    for (handle, count) in &expected {
        assert_eq!(registry.count(*handle), *count, "handle {}", handle);
    }
    for t in 0..CONSUMERS {
        assert!(!registry.contains(WaitHandle(1000 + t)));
    }
    assert_eq!(registry.len(), expected.values().sum::<usize>());
    assert!(signal.count.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_wakeup_releases_every_blocked_waiter() {
    let table = Arc::new(EventTable::new());
    let registry = Arc::new(WakeupRegistry::new(table.clone()));
    let waiters = 5;

    let handles: Vec<_> = (0..waiters)
        .map(|_| {
            let waiter = DataWaiter::new(table.clone(), registry.clone());
            thread::spawn(move || waiter.wait_for_data(Duration::from_secs(5)))
        })
        .collect();

    // wait until every thread has registered
    while registry.len() < waiters {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(registry.wakeup().unwrap(), waiters);

    for h in handles {
        assert_eq!(h.join().unwrap(), Ok(true));
    }
    assert!(registry.is_empty());
}

#[test]
fn test_removed_waiter_is_not_signaled() {
    let table = Arc::new(EventTable::new());
    let registry = WakeupRegistry::new(table.clone());

    let kept = table.create_event(false, false);
    let gone = table.create_event(false, false);
    registry.add(kept).unwrap();
    registry.add(gone).unwrap();
    registry.remove(gone).unwrap();

    assert_eq!(registry.wakeup().unwrap(), 1);
    assert_eq!(table.is_signaled(kept), Ok(true));
    assert_eq!(table.is_signaled(gone), Ok(false));
}

#[test]
fn test_destroyed_handle_does_not_fail_wakeup() {
    let table = Arc::new(EventTable::new());
    let registry = WakeupRegistry::new(table.clone());

    let live = table.create_event(false, false);
    let stale = table.create_event(false, false);
    registry.add(live).unwrap();
    registry.add(stale).unwrap();
    table.destroy_event(stale).unwrap();

    assert_eq!(registry.wakeup().unwrap(), 1);
    assert_eq!(table.is_signaled(live), Ok(true));
}
