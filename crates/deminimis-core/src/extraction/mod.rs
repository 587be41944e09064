pub mod extractor;
pub mod strategy;
pub mod table;

pub use extractor::{extract, PageExtraction, RecencyWindow, ResultExtractor};
pub use strategy::{
    default_strategies, export_strategies, extract_snapshot, extract_with_strategies, strategies_with_limit,
    ExtractionStrategy, RawSnapshot, SnapshotExtraction,
};
pub use table::{Column, ColumnMap, ResultTable};

#[cfg(feature = "csv_export")]
pub use strategy::CsvExportStrategy;
#[cfg(feature = "html")]
pub use strategy::HtmlTableStrategy;
