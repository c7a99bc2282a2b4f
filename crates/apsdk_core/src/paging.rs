//! Paged results.
//!
//! A [`PagedList`] holds one page of results plus a [`Continuation`] that can
//! fetch the pages after it. A [`PagedCursor`] stitches the pages into a
//! single forward-only sequence.
//!
//! The continuation is a plain value: the page source (query plus the call
//! that runs it) and the page number the list was produced from. Advancing
//! with `skip` fetches page `page_number + skip + 1`. Nothing here touches
//! the network directly, so a stub [`PageSource`] is enough to test it.

use crate::error::SdkResult;
use apsdk_protocol::PagingInfo;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Produces a page of results for a fixed query.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Fetches the given 1-based page.
    async fn fetch_page(&self, page_number: u32) -> SdkResult<PagedList<T>>;
}

/// Fetches the pages that follow a given page.
pub struct Continuation<T> {
    source: Arc<dyn PageSource<T>>,
    page_number: u32,
}

impl<T> Continuation<T> {
    /// Creates a continuation for the page `page_number` of `source`.
    pub fn new(source: Arc<dyn PageSource<T>>, page_number: u32) -> Self {
        Self {
            source,
            page_number,
        }
    }

    /// The page number the continuation was produced from.
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// The page number `advance(skip)` fetches.
    pub fn target_page(&self, skip: u32) -> u32 {
        self.page_number.saturating_add(skip).saturating_add(1)
    }

    /// Fetches page `page_number + skip + 1`.
    pub async fn advance(&self, skip: u32) -> SdkResult<PagedList<T>> {
        self.source.fetch_page(self.target_page(skip)).await
    }
}

impl<T> Clone for Continuation<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            page_number: self.page_number,
        }
    }
}

impl<T> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("page_number", &self.page_number)
            .finish_non_exhaustive()
    }
}

/// One page of results.
#[derive(Debug)]
pub struct PagedList<T> {
    items: Vec<T>,
    page_number: u32,
    page_size: u32,
    total_records: u64,
    continuation: Option<Continuation<T>>,
}

impl<T> PagedList<T> {
    /// Creates a page without a continuation.
    pub fn new(items: Vec<T>, paging: PagingInfo) -> Self {
        Self {
            items,
            page_number: paging.page_number,
            page_size: paging.page_size,
            total_records: paging.total_records,
            continuation: None,
        }
    }

    /// Attaches the continuation for the following pages.
    pub fn with_continuation(mut self, continuation: Continuation<T>) -> Self {
        self.continuation = Some(continuation);
        self
    }

    /// Items on this page.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Takes the items on this page.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Number of items on this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if this page is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 1-based page number.
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Page size.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Total records across all pages.
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// The continuation, if more pages can be fetched.
    pub fn continuation(&self) -> Option<&Continuation<T>> {
        self.continuation.as_ref()
    }

    /// Returns true if no records exist beyond this page.
    pub fn is_last_page(&self) -> bool {
        PagingInfo::new(self.page_number, self.page_size, self.total_records).is_last_page()
    }

    /// Fetches the page after this one. Returns `None` on the last page.
    pub async fn next_page(&self) -> SdkResult<Option<PagedList<T>>> {
        match &self.continuation {
            Some(continuation) if !self.is_last_page() => Ok(Some(continuation.advance(0).await?)),
            _ => Ok(None),
        }
    }

    /// Turns this page into a cursor over all pages.
    pub fn into_cursor(self) -> PagedCursor<T> {
        let offset = (u64::from(self.page_number.saturating_sub(1)) * u64::from(self.page_size))
            .min(self.total_records);
        PagedCursor {
            buffer: self.items.into(),
            continuation: self.continuation,
            skip: 0,
            offset,
            yielded: 0,
            total_records: self.total_records,
            pages_fetched: 0,
        }
    }
}

/// Forward-only sequence over every page of a result.
///
/// The cursor keeps the continuation of the first page and calls it with
/// skip 0, 1, 2 and so on. Records on pages before the starting page count
/// as already seen, so the cursor stops once it has reached `total_records`
/// or when a page comes back empty.
#[derive(Debug)]
pub struct PagedCursor<T> {
    buffer: VecDeque<T>,
    continuation: Option<Continuation<T>>,
    skip: u32,
    offset: u64,
    yielded: u64,
    total_records: u64,
    pages_fetched: u32,
}

impl<T> PagedCursor<T> {
    /// Yields the next item, fetching the next page when the buffer runs out.
    pub async fn next(&mut self) -> SdkResult<Option<T>> {
        if self.offset + self.yielded >= self.total_records {
            return Ok(None);
        }

        if self.buffer.is_empty() {
            let Some(continuation) = &self.continuation else {
                return Ok(None);
            };
            let page = continuation.advance(self.skip).await?;
            self.skip += 1;
            self.pages_fetched += 1;

            if page.is_empty() {
                warn!(
                    page = page.page_number,
                    seen = self.offset + self.yielded,
                    total_records = self.total_records,
                    "empty page before total records reached"
                );
                self.continuation = None;
                return Ok(None);
            }
            self.buffer.extend(page.items);
        }

        let item = self.buffer.pop_front();
        if item.is_some() {
            self.yielded += 1;
        }
        Ok(item)
    }

    /// Drains the cursor into a vector.
    pub async fn collect_all(mut self) -> SdkResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Items yielded so far by this cursor.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Total records reported by the server.
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Pages fetched through the continuation.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }
}
