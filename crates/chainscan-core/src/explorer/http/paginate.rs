use std::future::Future;

use tracing::debug;

use crate::error::ExplorerError;

/// One window of a limit/offset listing.
#[derive(Debug, Clone)]
pub struct Page<R> {
    pub records: Vec<R>,
    /// Side-list that only the first page carries (e.g. unconfirmed
    /// transactions); merged ahead of the paged records.
    pub leading: Vec<R>,
    /// Total record count, for listings that report one.
    pub total: Option<u64>,
}

impl<R> Page<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records,
            leading: Vec::new(),
            total: None,
        }
    }

    pub fn with_leading(mut self, leading: Vec<R>) -> Self {
        self.leading = leading;
        self
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

/// Fetch pages at offsets `0, P, 2P, …` until a page holds fewer than
/// `page_size` records.
///
/// Pages are fetched one at a time in offset order. The first failure is
/// returned and everything accumulated so far is dropped.
pub async fn collect_until_short<R, F, Fut>(
    page_size: usize,
    mut fetch: F,
) -> Result<Vec<R>, ExplorerError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Page<R>, ExplorerError>>,
{
    if page_size == 0 {
        return Err(ExplorerError::InvalidConfig("page size must be at least 1".to_owned()));
    }

    let mut collected = Vec::new();
    let mut page_index = 0usize;
    loop {
        let offset = page_index * page_size;
        let page = fetch(offset).await?;
        let count = page.records.len();
        debug!(offset, count, page_size, "fetched page");

        if page_index == 0 {
            collected.extend(page.leading);
        }
        collected.extend(page.records);

        if count < page_size {
            return Ok(collected);
        }
        page_index += 1;
    }
}

/// Fetch a listing whose first page reports the total record count.
///
/// Issues exactly `ceil(total / page_size)` requests when `total > 0`; an
/// empty listing still costs the one request that discovered it was empty.
pub async fn collect_counted<R, F, Fut>(
    page_size: usize,
    mut fetch: F,
) -> Result<Vec<R>, ExplorerError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Page<R>, ExplorerError>>,
{
    if page_size == 0 {
        return Err(ExplorerError::InvalidConfig("page size must be at least 1".to_owned()));
    }

    let first = fetch(0).await?;
    let total = first.total.ok_or_else(|| {
        ExplorerError::MalformedResponse("first page is missing the total record count".to_owned())
    })?;
    let page_count = usize::try_from(total)
        .map_err(|_| ExplorerError::MalformedResponse(format!("record count {total} out of range")))?
        .div_ceil(page_size);
    debug!(total, page_size, page_count, "counted listing");

    let mut collected = first.leading;
    collected.extend(first.records);
    for page_index in 1..page_count {
        let page = fetch(page_index * page_size).await?;
        debug!(offset = page_index * page_size, count = page.records.len(), "fetched page");
        collected.extend(page.records);
    }
    Ok(collected)
}
