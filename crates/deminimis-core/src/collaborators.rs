//! Interfaces to the systems the core drives but does not implement.

use std::time::Duration;

use crate::aggregation::Associate;
use crate::extraction::ResultTable;
use crate::DeMinimisResult;

/// A stateful, blocking browser session on the registry site.
///
/// Selector strategy lives entirely behind this trait; the core only passes
/// selector strings through. Every waiting call carries an explicit upper
/// bound and must fail with [`crate::DeMinimisError::Timeout`] rather than
/// hang.
pub trait BrowserDriver {
    fn navigate(&mut self, url: &str, timeout: Duration) -> DeMinimisResult<()>;

    /// Fill a text input or choose an option of a select by its label.
    fn fill_field(&mut self, selector: &str, value: &str) -> DeMinimisResult<()>;

    fn submit(&mut self) -> DeMinimisResult<()>;

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> DeMinimisResult<()>;

    /// Snapshot of the table currently rendered under `table_selector`.
    fn get_rows(&mut self, table_selector: &str) -> DeMinimisResult<ResultTable>;

    /// Click `selector` when it is present and enabled. `Ok(false)` when it
    /// is absent or disabled, e.g. the last page's "next" button.
    fn click_if_enabled(&mut self, selector: &str, timeout: Duration) -> DeMinimisResult<bool>;

    /// Trigger the bulk export and return its raw bytes.
    fn download_export(&mut self) -> DeMinimisResult<Vec<u8>>;
}

/// Source of company-group membership (companies controlled above 50%).
pub trait AssociateFinder {
    fn find_associates(&mut self, tax_id: &str) -> DeMinimisResult<Vec<Associate>>;
}

impl<F> AssociateFinder for F
where
    F: FnMut(&str) -> DeMinimisResult<Vec<Associate>>,
{
    fn find_associates(&mut self, tax_id: &str) -> DeMinimisResult<Vec<Associate>> {
        self(tax_id)
    }
}
