//! Parser Module
//!
//! XLSXファイルをメモリ上の`Workbook`に読み込むモジュール。
//! セル値はcalamineで、calamineが提供しないワークブック情報は
//! ZIP内のXMLを直接解析して取得します。

mod metadata;
mod workbook;

pub(crate) use metadata::WorkbookMetadata;
pub(crate) use workbook::WorkbookLoader;
