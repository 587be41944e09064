//! Walks successive result pages through a single [`ResultExtractor`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extraction::{ResultExtractor, ResultTable};
use crate::settings::DEFAULT_MAX_PAGES;
use crate::types::AidRecord;
use crate::DeMinimisResult;

/// Supplier of result pages. Page numbers are 1-based.
pub trait PageSource {
    /// Snapshot of the page currently displayed.
    fn fetch_page(&mut self, page: u32) -> DeMinimisResult<ResultTable>;

    /// Move past `page`. `Ok(false)` means there is no further page.
    fn advance(&mut self, page: u32) -> DeMinimisResult<bool>;
}

/// Adapts a pair of closures to [`PageSource`].
pub struct FnPageSource<S, A> {
    source: S,
    advance: A,
}

impl<S, A> FnPageSource<S, A>
where
    S: FnMut(u32) -> DeMinimisResult<ResultTable>,
    A: FnMut(u32) -> DeMinimisResult<bool>,
{
    pub fn new(source: S, advance: A) -> Self {
        FnPageSource { source, advance }
    }
}

impl<S, A> PageSource for FnPageSource<S, A>
where
    S: FnMut(u32) -> DeMinimisResult<ResultTable>,
    A: FnMut(u32) -> DeMinimisResult<bool>,
{
    fn fetch_page(&mut self, page: u32) -> DeMinimisResult<ResultTable> {
        (self.source)(page)
    }

    fn advance(&mut self, page: u32) -> DeMinimisResult<bool> {
        (self.advance)(page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The extractor saw enough consecutive out-of-window rows.
    EarlyTermination,
    NoMorePages,
    PageLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkOutcome {
    pub records: Vec<AidRecord>,
    pub pages_visited: u32,
    pub stop_reason: StopReason,
}

/// Drives a [`ResultExtractor`] across pages.
///
/// The extractor's consecutive-old-row count is shared by all pages of one
/// walk. Pages are assumed disjoint; no deduplication is performed.
#[derive(Debug, Clone)]
pub struct PaginationWalker {
    extractor: ResultExtractor,
    max_pages: u32,
}

impl PaginationWalker {
    pub fn new(extractor: ResultExtractor, max_pages: u32) -> Self {
        PaginationWalker {
            extractor,
            max_pages: max_pages.max(1),
        }
    }

    pub fn extractor(&self) -> &ResultExtractor {
        &self.extractor
    }

    /// Walk until the extractor stops, pages run out, or `max_pages` is hit.
    ///
    /// Errors from the page source abort the walk; they are navigation
    /// failures, not parse failures.
    pub fn walk<P: PageSource>(&mut self, pages: &mut P) -> DeMinimisResult<WalkOutcome> {
        let mut records = Vec::new();
        let mut page = 1;

        let stop_reason = loop {
            let table = pages.fetch_page(page)?;
            let extraction = self.extractor.extract_page(&table);
            debug!(
                page,
                rows = extraction.rows_examined,
                records = extraction.records.len(),
                "page extracted"
            );
            records.extend(extraction.records);

            if !extraction.should_continue {
                break StopReason::EarlyTermination;
            }
            if page >= self.max_pages {
                break StopReason::PageLimit;
            }
            if !pages.advance(page)? {
                break StopReason::NoMorePages;
            }
            page += 1;
        };

        Ok(WalkOutcome {
            records,
            pages_visited: page,
            stop_reason,
        })
    }
}

/// Walk pages produced by `page_source_fn`, advancing with `advance_fn`,
/// using a fresh three-year window ending at `reference_date`.
///
/// `max_pages` defaults to 10 when `None`.
pub fn walk<S, A>(
    page_source_fn: S,
    advance_fn: A,
    max_pages: Option<u32>,
    reference_date: NaiveDate,
) -> DeMinimisResult<WalkOutcome>
where
    S: FnMut(u32) -> DeMinimisResult<ResultTable>,
    A: FnMut(u32) -> DeMinimisResult<bool>,
{
    let mut walker = PaginationWalker::new(
        ResultExtractor::for_reference_date(reference_date),
        max_pages.unwrap_or(DEFAULT_MAX_PAGES),
    );
    walker.walk(&mut FnPageSource::new(page_source_fn, advance_fn))
}
