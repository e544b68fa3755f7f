// tests/gate_property.rs

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use scriptrun::engine::{Admission, ConcurrencyGate};
use scriptrun::types::{JobId, MAX_CONCURRENT, MIN_CONCURRENT};

#[derive(Debug, Clone)]
enum Op {
    Request,
    /// Release the n-th running job (modulo the running count).
    Release(usize),
    /// Withdraw the n-th queued job.
    Withdraw(usize),
    SetLimit(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Request),
        3 => any::<usize>().prop_map(Op::Release),
        1 => any::<usize>().prop_map(Op::Withdraw),
        1 => (0..25usize).prop_map(Op::SetLimit),
    ]
}

proptest! {
    #[test]
    fn gate_never_exceeds_limit_and_never_idles_with_work(
        initial in 1..=MAX_CONCURRENT,
        ops in proptest::collection::vec(op_strategy(), 1..200),
    ) {
        let mut gate = ConcurrencyGate::new(initial);
        let mut running: BTreeSet<JobId> = BTreeSet::new();
        let mut queued: Vec<JobId> = Vec::new();
        let mut ever_started: HashSet<JobId> = HashSet::new();
        let mut withdrawn: HashSet<JobId> = HashSet::new();
        let mut next = 1u64;

        for op in ops {
            let running_before = running.len();
            let admitted = match op {
                Op::Request => {
                    let id = JobId(next);
                    next += 1;
                    match gate.request_admission(id) {
                        Admission::Admitted => vec![id],
                        Admission::Queued { position } => {
                            queued.push(id);
                            prop_assert_eq!(position, queued.len());
                            vec![]
                        }
                    }
                }
                Op::Release(n) => {
                    if running.is_empty() {
                        continue;
                    }
                    let id = *running.iter().nth(n % running.len()).unwrap();
                    running.remove(&id);
                    gate.release(id)
                }
                Op::Withdraw(n) => {
                    if queued.is_empty() {
                        continue;
                    }
                    let id = queued.remove(n % queued.len());
                    prop_assert!(gate.withdraw(id));
                    withdrawn.insert(id);
                    vec![]
                }
                Op::SetLimit(l) => gate.set_limit(l),
            };

            for id in admitted {
                prop_assert!(!withdrawn.contains(&id), "withdrawn job {id} was admitted");
                prop_assert!(ever_started.insert(id), "job {id} admitted twice");
                // FIFO: only the head of the queue may be admitted from it.
                if let Some(pos) = queued.iter().position(|q| *q == id) {
                    prop_assert_eq!(pos, 0);
                    queued.remove(0);
                }
                running.insert(id);
            }

            let limit = gate.limit();
            prop_assert!((MIN_CONCURRENT..=MAX_CONCURRENT).contains(&limit));
            prop_assert_eq!(gate.running_count(), running.len());
            prop_assert_eq!(gate.queued_count(), queued.len());
            // Lowering the limit never stops running jobs, so the count may
            // exceed it, but nothing new is admitted while it does.
            prop_assert!(running.len() <= limit.max(running_before));
            // Work-conserving: nobody waits while a slot is free.
            if running.len() < limit {
                prop_assert!(queued.is_empty());
            }
        }
    }
}
