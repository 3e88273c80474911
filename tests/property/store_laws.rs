//! Property-based tests for the task store.
//!
//! Uses proptest to drive random operation sequences with random remote
//! failures and verify:
//! 1. A failed operation leaves the readable collection exactly as it was.
//! 2. Once every operation has settled, the store mirrors the server.
//! 3. `stats()` always agrees with the readable collection, including while
//!    operations are in flight.
//! 4. No pending operation outlives the call that started it.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use teachmate::remote::TransportError;
use teachmate::remote::memory::InMemoryRemote;
use teachmate::tasks::{StoreError, TaskStore};
use teachmate_proto::{Task, TaskStats};

/// One user action, addressing existing tasks by position.
#[derive(Debug, Clone)]
enum Op {
    Load,
    Create(String),
    Toggle(usize),
    Remove(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Load),
        "[a-z ]{0,12}".prop_map(Op::Create),
        (0usize..16).prop_map(Op::Toggle),
        (0usize..16).prop_map(Op::Remove),
    ]
}

fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(("[a-z]{1,10}", any::<bool>()), 0..6).prop_map(|specs| {
        specs
            .into_iter()
            .zip(1i64..)
            .map(|((title, completed), id)| Task::new(id, title, completed))
            .collect()
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

async fn apply(store: &TaskStore<InMemoryRemote>, op: &Op) -> Result<(), StoreError> {
    let tasks = store.tasks();
    match op {
        Op::Load => store.load().await,
        Op::Create(title) => store.create(title).await.map(drop),
        Op::Toggle(i) if !tasks.is_empty() => {
            store.toggle(&tasks[i % tasks.len()]).await.map(drop)
        }
        Op::Remove(i) if !tasks.is_empty() => store.remove(&tasks[i % tasks.len()].id).await,
        Op::Toggle(_) | Op::Remove(_) => Ok(()),
    }
}

/// What the server should hold after `op` on `task` succeeds.
fn expected_after(initial: &[Task], task: &Task, removed: bool) -> Vec<Task> {
    initial
        .iter()
        .filter(|t| !(removed && t.id == task.id))
        .map(|t| if t.id == task.id && !removed { t.toggled() } else { t.clone() })
        .collect()
}

proptest! {
    #[test]
    fn sequential_ops_keep_store_and_server_in_step(
        initial in arb_tasks(),
        ops in prop::collection::vec((arb_op(), any::<bool>()), 1..24),
    ) {
        runtime().block_on(async {
            let remote = InMemoryRemote::with_tasks(initial);
            let store = TaskStore::new(remote.clone());
            store.load().await.unwrap();

            for (op, fail) in &ops {
                if *fail {
                    match op {
                        Op::Load => remote.fail_next_load(TransportError::Timeout),
                        _ => remote.fail_next(TransportError::with_detail(503, "server busy")),
                    }
                }
                let before = store.tasks();

                let result = apply(&store, op).await;
                remote.clear_failures();

                if result.is_err() {
                    prop_assert_eq!(&store.tasks(), &before);
                }
                prop_assert_eq!(store.tasks(), remote.server_tasks());
                prop_assert_eq!(store.stats(), TaskStats::from_tasks(&store.tasks()));
                prop_assert!(store.pending_operations().is_empty());
            }
            Ok(())
        })?;
    }

    #[test]
    fn concurrent_ops_on_distinct_tasks_settle_independently(
        initial in arb_tasks().prop_filter("need two tasks", |t| t.len() >= 2),
        remove_first in any::<bool>(),
        fail_first in any::<bool>(),
        fail_second in any::<bool>(),
    ) {
        runtime().block_on(async {
            let remote = InMemoryRemote::with_tasks(initial.clone());
            let store = TaskStore::new(remote.clone());
            store.load().await.unwrap();

            let first = initial[0].clone();
            let second = initial[1].clone();
            if fail_first {
                remote.fail_next_for(first.id.clone(), TransportError::Timeout);
            }
            if fail_second {
                remote.fail_next_for(second.id.clone(), TransportError::Timeout);
            }
            remote.hold();

            let first_op = async {
                if remove_first {
                    store.remove(&first.id).await
                } else {
                    store.toggle(&first).await.map(drop)
                }
            };
            let observe = async {
                prop_assert_eq!(store.stats(), TaskStats::from_tasks(&store.tasks()));
                prop_assert_eq!(store.pending_operations().len(), 2);
                remote.release();
                Ok(())
            };
            let (a, b, observed) = tokio::join!(first_op, store.toggle(&second), observe);
            observed?;

            prop_assert_eq!(a.is_err(), fail_first);
            prop_assert_eq!(b.is_err(), fail_second);

            let mut expected = initial.clone();
            if !fail_first {
                expected = expected_after(&expected, &first, remove_first);
            }
            if !fail_second {
                expected = expected_after(&expected, &second, false);
            }
            prop_assert_eq!(store.tasks(), expected);
            prop_assert_eq!(store.tasks(), remote.server_tasks());
            prop_assert!(store.pending_operations().is_empty());
            Ok(())
        })?;
    }
}
