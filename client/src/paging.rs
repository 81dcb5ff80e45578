//! Aggregating 1-based paged endpoints.

use std::future::Future;

use crate::error::ClientError;
use crate::request::RequestResult;

/// Largest page size the server accepts.
pub const MAX_PAGE_SIZE: usize = 500;

/// The server refuses to page past this many items.
pub const MAX_ITEMS: usize = 10_000;

/// Items gathered across pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    /// The server-side maximum was reached; more items may exist.
    pub max_reached: bool,
}

/// Fetch pages 1, 2, ... until `limit` items are gathered or a short page
/// marks the end of data. A failed page fails the whole collection.
///
/// The result never holds more than `limit` items, nor more than [`MAX_ITEMS`].
pub async fn collect_pages<T, F, Fut>(
    page_size: usize,
    limit: usize,
    mut fetch: F,
) -> Result<RequestResult<Paged<T>>, ClientError>
where
    F: FnMut(u32, usize) -> Fut,
    Fut: Future<Output = Result<RequestResult<Vec<T>>, ClientError>>,
{
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let limit = limit.min(MAX_ITEMS);
    let mut items = Vec::new();
    let mut max_reached = false;
    let mut page: u32 = 1;
    let mut status = 200;

    while items.len() < limit {
        let result = fetch(page, page_size).await?;
        status = result.status;
        let Some(batch) = result.value else {
            tracing::debug!(page, status, "Page request failed");
            return Ok(RequestResult::failed(status));
        };
        let fetched = batch.len();
        items.extend(batch);

        if items.len() >= MAX_ITEMS {
            max_reached = true;
            tracing::warn!(
                max_items = MAX_ITEMS,
                "Server-side maximum reached; remaining items cannot be fetched"
            );
            break;
        }
        if fetched < page_size {
            break;
        }
        page += 1;
    }

    items.truncate(limit);
    Ok(RequestResult::ok(status, Paged { items, max_reached }))
}
