//! Fixed-width worker pool over a shared cursor.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::future::join_all;
use tracing::debug;

/// Run `worker` over `items` with at most `limit` units in flight.
///
/// Workers claim the next unclaimed index from a shared counter until the list
/// is exhausted. Results come back in input order. After the first failure no
/// new units are claimed; units already running are allowed to finish, and
/// that first error is returned.
pub async fn run_bounded<T, R, E, F, Fut>(items: Vec<T>, limit: usize, worker: F) -> Result<Vec<R>, E>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let width = limit.max(1).min(total);
    debug!(total, width, "Starting bounded run");

    let cursor = AtomicUsize::new(0);
    let stopped = AtomicBool::new(false);
    let first_error: Mutex<Option<E>> = Mutex::new(None);

    let (items, worker, cursor, stopped, error_slot) =
        (&items, &worker, &cursor, &stopped, &first_error);
    let lanes = (0..width).map(move |_| async move {
        let mut done: Vec<(usize, R)> = Vec::new();
        while !stopped.load(Ordering::SeqCst) {
            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(item) = items.get(index) else {
                break;
            };
            match worker(item.clone()).await {
                Ok(result) => done.push((index, result)),
                Err(e) => {
                    stopped.store(true, Ordering::SeqCst);
                    let mut slot = error_slot.lock().unwrap_or_else(PoisonError::into_inner);
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    break;
                }
            }
        }
        done
    });
    let finished = join_all(lanes).await;

    if let Some(e) = first_error
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
    {
        return Err(e);
    }

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    for (index, result) in finished.into_iter().flatten() {
        slots[index] = Some(result);
    }
    Ok(slots.into_iter().flatten().collect())
}
