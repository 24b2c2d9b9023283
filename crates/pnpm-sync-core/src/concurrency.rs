//! Bounded-concurrency execution of async work.

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

/// Run `work` over every item with at most `concurrency` operations in
/// flight.
///
/// The first error stops scheduling and is returned immediately; operations
/// already in flight are dropped with it.
pub async fn for_each_concurrent<T, F, Fut>(
    items: impl IntoIterator<Item = T>,
    concurrency: usize,
    mut work: F,
) -> anyhow::Result<()>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let concurrency = concurrency.max(1);
    let mut items = items.into_iter();
    let mut in_flight = FuturesUnordered::new();

    loop {
        while in_flight.len() < concurrency {
            match items.next() {
                Some(item) => in_flight.push(work(item)),
                None => break,
            }
        }
        match in_flight.next().await {
            Some(result) => result?,
            None => return Ok(()),
        }
    }
}
