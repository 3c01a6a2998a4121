//! Offset/cursor pagination over a list endpoint.
//!
//! Generalizes `AsanaClient._list_pages`: a fetch closure returns one page at
//! a time, and the stream keeps requesting the next page as long as the
//! source hands back a continuation token.

use ingest_core::IngestResult;
use std::future::Future;

/// One page of a list endpoint: the items plus an optional continuation
/// token understood by the next call to the same fetch closure.
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

/// Drive `fetch` repeatedly, passing the previous page's `next` token back
/// in, until a page with `next = None` is returned. `fetch` receives the
/// continuation token (`None` on the first call).
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> IngestResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = IngestResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = None;
    loop {
        let page = fetch(cursor).await?;
        let has_more = page.next.is_some();
        items.extend(page.items);
        if !has_more {
            break;
        }
        cursor = page.next;
    }
    Ok(items)
}

/// Streaming variant that yields each page to `on_page` instead of buffering
/// every item, so callers can upsert/index as they go (§4.5.1 step 4).
pub async fn for_each_page<T, F, Fut, H>(mut fetch: F, mut on_page: H) -> IngestResult<()>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = IngestResult<Page<T>>>,
    H: FnMut(&[T]) -> bool,
{
    let mut cursor = None;
    loop {
        let page = fetch(cursor).await?;
        let keep_going = on_page(&page.items);
        if !keep_going || page.next.is_none() {
            break;
        }
        cursor = page.next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn collects_all_pages_until_next_is_none() {
        let call = AtomicUsize::new(0);
        let items: Vec<u32> = collect_pages(|_cursor| {
            let n = call.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(match n {
                    0 => Page { items: vec![1, 2], next: Some("p2".into()) },
                    1 => Page { items: vec![3], next: None },
                    _ => unreachable!(),
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn for_each_page_can_stop_early() {
        let mut seen = Vec::new();
        for_each_page(
            |_cursor: Option<String>| async move {
                Ok::<_, ingest_core::IngestError>(Page { items: vec![1], next: Some("p2".into()) })
            },
            |items| {
                seen.extend_from_slice(items);
                false
            },
        )
        .await
        .unwrap();
        assert_eq!(seen, vec![1]);
    }
}
