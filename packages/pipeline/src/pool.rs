//! Bounded worker pool for external calls.

use std::future::Future;
use std::sync::Mutex;

use futures::future::join_all;

/// Run `f` over `items` with at most `concurrency` units in flight.
///
/// A shared queue is drained by `concurrency` workers, each finishing one
/// unit before pulling the next. Workers keep their results tagged with the
/// original index; the output is in input order regardless of completion
/// order. `f` must handle its own failures.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, concurrency: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let queue = Mutex::new(items.into_iter().enumerate());
    let workers = concurrency.clamp(1, total);
    let f = &f;
    let queue = &queue;

    let collected = join_all((0..workers).map(|_| async move {
        let mut local = Vec::new();
        loop {
            let next = match queue.lock() {
                Ok(mut guard) => guard.next(),
                Err(poisoned) => poisoned.into_inner().next(),
            };
            let Some((index, item)) = next else {
                break;
            };
            local.push((index, f(item).await));
        }
        local
    }))
    .await;

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    for (index, result) in collected.into_iter().flatten() {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}
