//! xlsxbulk - Bulk CSV import/export for Excel workbooks
//!
//! This crate moves many CSV payloads into, or many worksheets out of, a single
//! XLSX workbook in one batch call. Each item succeeds or fails on its own; the
//! batch reports per-item results in request order and saves the workbook once.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xlsxbulk::{BatchProcessorBuilder, ImportItemSpec, MergeMode};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let processor = BatchProcessorBuilder::from_env().build()?;
//!
//!     let items = vec![
//!         ImportItemSpec::new("sku,qty\nA-1,10\nB-2,4").with_sheet("Stock"),
//!         ImportItemSpec::new("C-3,7")
//!             .with_sheet("Stock")
//!             .with_merge_mode(MergeMode::Append),
//!     ];
//!
//!     let result = processor.import_batch("inventory.xlsx", &items, true)?;
//!     println!("{}", result.message); // Processed 2 operations (2 successful, 0 failed)
//!     Ok(())
//! }
//! ```
//!
//! # Export
//!
//! ```rust,no_run
//! use xlsxbulk::{BatchProcessorBuilder, ExportItemSpec};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let processor = BatchProcessorBuilder::new().build()?;
//!     let result = processor.export_batch(
//!         "inventory.xlsx",
//!         &[ExportItemSpec::new().with_sheet("Stock").with_delimiter(';')],
//!     )?;
//!
//!     for item in &result.items {
//!         if let Some(csv) = item.csv_content() {
//!             println!("{}", csv?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Failure model
//!
//! Problems with a single item (undecodable base64, a `NewSheet` name that is
//! already taken, a missing export sheet) are reported in that item's
//! [`ItemResult`] and never stop the batch. Only batch-level problems, such as
//! a missing workbook or a failed final save, are returned as `Err`.

mod api;
mod batch;
mod builder;
pub mod codec;
mod error;
mod formatter;
pub mod logging;
mod merge;
mod operation;
mod parser;
mod security;
mod store;
mod transport;
mod types;
mod workbook;

// 公開API
pub use api::MergeMode;
pub use builder::{
    BatchProcessor, BatchProcessorBuilder, DEFAULT_FILES_ROOT, DEFAULT_SHEET_NAME,
    FILES_ROOT_ENV,
};
pub use error::{ErrorKind, XlsxBulkError};
pub use security::SecurityConfig;
pub use store::{WorkbookStore, XlsxStore};
pub use transport::{
    BulkCsvExportRequest, BulkCsvImportRequest, BulkResponse, CsvExportRequest, CsvImportRequest,
};
pub use types::{BatchResult, CellValue, ExportItemSpec, ImportItemSpec, ItemResult, Payload};
pub use workbook::{Workbook, Worksheet, MAX_COLS, MAX_ROWS, MAX_STRING_LEN};
