use crate::error::PlatformResult;
use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;

/// One page of remote results. `next` carries the cursor for the
/// following page; `None` means the platform reported no further pages,
/// which is the sole termination condition for [`collect_pages`].
pub struct Page<T, C> {
    pub items: Vec<T>,
    pub next: Option<C>,
}

/// Drive a paginated remote listing to completion, accumulating every
/// page in order. The cursor type is chosen by the caller: a numeric
/// offset, an opaque cursor token, or the full "next" URL the platform
/// returned, whichever matches the endpoint's pagination idiom.
pub async fn collect_pages<T, C, F, Fut>(first: C, mut fetch_page: F) -> PlatformResult<Vec<T>>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = PlatformResult<Page<T, C>>>,
{
    let mut items = Vec::new();
    let mut cursor = Some(first);
    while let Some(c) = cursor {
        let page = fetch_page(c).await?;
        items.extend(page.items);
        cursor = page.next;
    }
    Ok(items)
}

/// Deduplicate by identity while preserving first-seen order. Used where
/// a fetch can legitimately return the same item twice, e.g. one track
/// appearing in several playlists.
pub fn dedup_by_key<T, K, F>(items: &mut Vec<T>, mut key: F)
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(key(item)));
}
