//! Settle-all fan-out.

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

/// Run all `futures` concurrently and wait until every one has settled.
///
/// On success the outputs come back in input order. If any future fails the
/// result is the first error in completion order, but only after the rest
/// have finished; nothing is cancelled.
pub async fn join_settled<I, F, T, E>(futures: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(index, future)| async move { (index, future.await) })
        .collect();

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None)
        .take(pending.len())
        .collect();
    let mut first_error = None;

    while let Some((index, outcome)) = pending.next().await {
        match outcome {
            Ok(value) => slots[index] = Some(value),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(slots.into_iter().flatten().collect()),
    }
}
