//! Descending moving-upper-bound search sweep, grounded on
//! `asana_client.py::search_tasks`.
//!
//! A search endpoint sorted descending by a "modified at" timestamp is swept
//! page by page, narrowing an exclusive upper bound (`before`) after each
//! page so the next request starts just past the oldest item already seen.
//! Two duplicate safeguards are needed and neither subsumes the other:
//!
//! 1. A whole page can come back entirely duplicate, when more than one
//!    page's worth of items share the same millisecond-precision timestamp.
//!    When that happens the upper bound is decremented by 1ms instead of
//!    being set from the last item (there is no "last item" left to anchor
//!    on) and the previous-page memory is cleared.
//! 2. Otherwise the upper bound is set to `last_item.modified_at + 1ms`
//!    (exclusive, respecting 1ms granularity), which reliably produces at
//!    least one overlapping item with the next page — that overlap is
//!    removed by diffing the new page against the previous one.

use chrono::{DateTime, Duration, Utc};
use ingest_core::IngestResult;
use std::collections::HashSet;
use std::future::Future;

/// An item yielded by a descending search sweep.
pub trait SweepItem {
    fn sweep_id(&self) -> &str;
    fn modified_at(&self) -> DateTime<Utc>;
}

/// Sweep a descending search endpoint from `initial_before` (exclusive) down
/// to `after` (inclusive, if given), yielding deduplicated pages via
/// `on_page`. `fetch` is called with the current `before` bound and must
/// return items sorted descending by `modified_at`; an empty result ends
/// the sweep.
pub async fn sweep_descending<T, F, Fut, H>(
    initial_before: DateTime<Utc>,
    mut fetch: F,
    mut on_page: H,
) -> IngestResult<()>
where
    T: SweepItem,
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = IngestResult<Vec<T>>>,
    H: FnMut(&[T]),
{
    let mut before = initial_before;
    let mut previous_ids: HashSet<String> = HashSet::new();

    loop {
        let mut page = fetch(before).await?;

        if page.is_empty() {
            break;
        }

        page.retain(|item| !previous_ids.contains(item.sweep_id()));

        if page.is_empty() {
            // Whole page was duplicate: nothing to anchor the next bound on,
            // so step back by the search endpoint's timestamp granularity.
            before -= Duration::milliseconds(1);
            previous_ids.clear();
            continue;
        }

        let last = page.last().expect("non-empty after retain");
        before = last.modified_at() + Duration::milliseconds(1);

        previous_ids = page.iter().map(|item| item.sweep_id().to_string()).collect();
        on_page(&page);
    }

    Ok(())
}

/// Like [`sweep_descending`], but `on_page` is async and returns whether the
/// sweep should continue. Used where each page drives further I/O (upserts,
/// downstream indexing triggers) and the caller may need to stop early, e.g.
/// on a backfill's time budget.
pub async fn sweep_descending_until<T, F, Fut, H, HFut>(
    initial_before: DateTime<Utc>,
    mut fetch: F,
    mut on_page: H,
) -> IngestResult<()>
where
    T: SweepItem,
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = IngestResult<Vec<T>>>,
    H: FnMut(Vec<T>) -> HFut,
    HFut: Future<Output = IngestResult<bool>>,
{
    let mut before = initial_before;
    let mut previous_ids: HashSet<String> = HashSet::new();

    loop {
        let mut page = fetch(before).await?;

        if page.is_empty() {
            break;
        }

        page.retain(|item| !previous_ids.contains(item.sweep_id()));

        if page.is_empty() {
            before -= Duration::milliseconds(1);
            previous_ids.clear();
            continue;
        }

        let last = page.last().expect("non-empty after retain");
        before = last.modified_at() + Duration::milliseconds(1);
        previous_ids = page.iter().map(|item| item.sweep_id().to_string()).collect();

        let keep_going = on_page(page).await?;
        if !keep_going {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct Item {
        id: String,
        modified_at: DateTime<Utc>,
    }

    impl SweepItem for Item {
        fn sweep_id(&self) -> &str {
            &self.id
        }
        fn modified_at(&self) -> DateTime<Utc> {
            self.modified_at
        }
    }

    fn ts(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
    }

    #[tokio::test]
    async fn dedups_straddling_item_across_page_boundary() {
        let call = AtomicUsize::new(0);
        let mut seen = Vec::new();
        sweep_descending(
            ts(1000),
            |_before| {
                let n = call.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(match n {
                        0 => vec![
                            Item { id: "a".into(), modified_at: ts(900) },
                            Item { id: "b".into(), modified_at: ts(800) },
                        ],
                        // "b" straddles: same modified_at as the last item
                        // of the previous page, returned again here.
                        1 => vec![
                            Item { id: "b".into(), modified_at: ts(800) },
                            Item { id: "c".into(), modified_at: ts(700) },
                        ],
                        2 => vec![],
                        _ => unreachable!(),
                    })
                }
            },
            |page| seen.extend(page.iter().map(|i| i.id.clone())),
        )
        .await
        .unwrap();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn whole_duplicate_page_steps_upper_bound_back_one_ms() {
        let call = AtomicUsize::new(0);
        let mut seen = Vec::new();
        sweep_descending(
            ts(1000),
            |before| {
                let n = call.fetch_add(1, Ordering::SeqCst);
                let before_ms = before.timestamp_millis();
                async move {
                    Ok(match n {
                        0 => vec![
                            Item { id: "a".into(), modified_at: ts(900) },
                            Item { id: "b".into(), modified_at: ts(900) },
                        ],
                        // Entirely duplicate page: both items already seen.
                        // The bound must have stepped back by exactly 1ms
                        // from 900 + 1ms = 901.
                        1 => {
                            assert_eq!(before_ms, 901);
                            vec![
                                Item { id: "a".into(), modified_at: ts(900) },
                                Item { id: "b".into(), modified_at: ts(900) },
                            ]
                        }
                        2 => vec![Item { id: "c".into(), modified_at: ts(700) }],
                        3 => vec![],
                        _ => unreachable!(),
                    })
                }
            },
            |page| seen.extend(page.iter().map(|i| i.id.clone())),
        )
        .await
        .unwrap();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }
}
