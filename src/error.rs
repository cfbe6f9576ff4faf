//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::BatchResult;

/// xlsxbulkクレート全体で使用するエラー型
///
/// バッチ処理におけるエラーは2つの層に分かれます。
///
/// - アイテム単位のエラー（`MalformedInput`, `SheetNotFound`,
///   `SheetAlreadyExists`など）: 単一アイテム処理の境界で捕捉され、
///   `ItemResult`（`success = false`）に変換されます。バッチは中断されません。
/// - バッチ単位のエラー（`WorkbookNotFound`, `Persistence`など）:
///   `import_batch` / `export_batch`から`Err`として返されます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxbulk::{BatchProcessorBuilder, XlsxBulkError};
///
/// # fn main() -> Result<(), XlsxBulkError> {
/// let processor = BatchProcessorBuilder::new().build()?;
/// match processor.export_batch("missing.xlsx", &[]) {
///     Err(XlsxBulkError::WorkbookNotFound(path)) => println!("not found: {}", path),
///     Err(e) => return Err(e),
///     Ok(result) => println!("{}", result.message),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum XlsxBulkError {
    /// I/O操作中に発生したエラー
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Excelファイルの解析中に発生したエラー（calamine由来）
    #[error("Failed to parse Excel file: {0}")]
    Parse(#[from] calamine::Error),

    /// Excelファイルの書き出し中に発生したエラー（rust_xlsxwriter由来）
    #[error("Failed to write Excel file: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// ペイロードをテキストまたは区切り文字形式として解釈できない
    ///
    /// base64デコード失敗、UTF-8として不正なバイト列、CSVの構文エラーなど。
    /// アイテム単位で回復され、バッチは継続します。
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// 対象ワークブックが存在せず、作成も許可されていない
    #[error("Excel file {0} does not exist")]
    WorkbookNotFound(String),

    /// 参照されたシートが存在しない
    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    /// `NewSheet`モードで既存のシート名を指定した
    ///
    /// 既存シートを上書きせず、アイテムを失敗として報告します。
    #[error("Sheet '{0}' already exists")]
    SheetAlreadyExists(String),

    /// Excelのシート名規則に違反している
    #[error("Invalid sheet name '{name}': {reason}")]
    InvalidSheetName {
        /// 指定されたシート名
        name: String,
        /// 違反内容
        reason: String,
    },

    /// ワークシートの最大行数・最大列数を超える書き込み
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// バッチ終了時の保存に失敗した
    ///
    /// 各アイテムはメモリ上では処理済みですが、ファイルには保存されていません。
    /// `batch`にはメモリ上の処理結果（`persisted = false`）が格納されます。
    #[error("Failed to save workbook {path}: {message}")]
    Persistence {
        /// 保存先のパス
        path: String,
        /// 失敗の詳細
        message: String,
        /// 保存前に確定していたバッチ結果
        batch: Box<BatchResult>,
    },

    /// 設定の検証に失敗したエラー
    ///
    /// `BatchProcessorBuilder::build()`時に無効な設定が検出された場合に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ペイロードサイズ上限、ZIP bomb、パストラバーサルなど。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

/// エラーの分類
///
/// `ItemResult`に記録され、呼び出し側がメッセージ文字列を解析せずに
/// 失敗理由を判別できるようにします。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedInput,
    WorkbookNotFound,
    SheetNotFound,
    SheetAlreadyExists,
    InvalidSheetName,
    CapacityExceeded,
    Persistence,
    Config,
    SecurityViolation,
    Io,
    Spreadsheet,
}

impl XlsxBulkError {
    /// エラーの分類を返す
    pub fn kind(&self) -> ErrorKind {
        match self {
            XlsxBulkError::Io(_) => ErrorKind::Io,
            XlsxBulkError::Parse(_) | XlsxBulkError::Write(_) | XlsxBulkError::Zip(_) => {
                ErrorKind::Spreadsheet
            }
            XlsxBulkError::MalformedInput(_) => ErrorKind::MalformedInput,
            XlsxBulkError::WorkbookNotFound(_) => ErrorKind::WorkbookNotFound,
            XlsxBulkError::SheetNotFound(_) => ErrorKind::SheetNotFound,
            XlsxBulkError::SheetAlreadyExists(_) => ErrorKind::SheetAlreadyExists,
            XlsxBulkError::InvalidSheetName { .. } => ErrorKind::InvalidSheetName,
            XlsxBulkError::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            XlsxBulkError::Persistence { .. } => ErrorKind::Persistence,
            XlsxBulkError::Config(_) => ErrorKind::Config,
            XlsxBulkError::SecurityViolation(_) => ErrorKind::SecurityViolation,
        }
    }

    /// バッチ全体を中断させるエラーかどうか
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::WorkbookNotFound | ErrorKind::Persistence | ErrorKind::Config
        )
    }
}

impl From<csv::Error> for XlsxBulkError {
    fn from(err: csv::Error) -> Self {
        match err.into_kind() {
            csv::ErrorKind::Io(e) => XlsxBulkError::Io(e),
            csv::ErrorKind::Utf8 { pos, err } => XlsxBulkError::MalformedInput(format!(
                "invalid UTF-8 in CSV{}: {}",
                pos.map(|p| format!(" at line {}", p.line()))
                    .unwrap_or_default(),
                err
            )),
            other => XlsxBulkError::MalformedInput(format!("CSV error: {:?}", other)),
        }
    }
}

impl From<base64::DecodeError> for XlsxBulkError {
    fn from(err: base64::DecodeError) -> Self {
        XlsxBulkError::MalformedInput(format!("invalid base64 payload: {}", err))
    }
}

impl From<std::str::Utf8Error> for XlsxBulkError {
    fn from(err: std::str::Utf8Error) -> Self {
        XlsxBulkError::MalformedInput(format!("payload is not valid UTF-8: {}", err))
    }
}

impl From<zip::result::ZipError> for XlsxBulkError {
    fn from(err: zip::result::ZipError) -> Self {
        XlsxBulkError::Zip(err.to_string())
    }
}
