//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。
//! リクエスト単位のエンティティ（アイテム仕様・結果）と、
//! ワークブックモデルが保持するセル値を含みます。

use std::borrow::Cow;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::api::MergeMode;
use crate::error::{ErrorKind, XlsxBulkError};

/// CSVペイロード
///
/// トランスポート層から渡されるCSVデータ。base64文字列のまま渡された場合は、
/// 単一アイテム処理の内部でデコードされ、失敗はそのアイテムのみの失敗になります。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// デコード済みのバイト列
    Bytes(Vec<u8>),
    /// base64エンコードされた文字列
    Base64(String),
}

impl Payload {
    /// ペイロードのバイト列を取得（必要ならbase64デコード）
    ///
    /// base64文字列中の空白・改行は無視します。
    pub(crate) fn decode(&self) -> Result<Cow<'_, [u8]>, XlsxBulkError> {
        match self {
            Payload::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            Payload::Base64(text) => {
                let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                let bytes = general_purpose::STANDARD.decode(compact.as_bytes())?;
                Ok(Cow::Owned(bytes))
            }
        }
    }

    /// エンコード状態のままのおおよそのサイズ（バイト）
    pub(crate) fn encoded_len(&self) -> usize {
        match self {
            Payload::Bytes(bytes) => bytes.len(),
            Payload::Base64(text) => text.len() / 4 * 3,
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Bytes(text.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Bytes(text.into_bytes())
    }
}

/// インポート1件分の要求
///
/// # 使用例
///
/// ```rust
/// use xlsxbulk::{ImportItemSpec, MergeMode};
///
/// let spec = ImportItemSpec::new("a;b\n1;2")
///     .with_sheet("Data")
///     .with_delimiter(';')
///     .with_merge_mode(MergeMode::Append);
/// assert_eq!(spec.target_sheet.as_deref(), Some("Data"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportItemSpec {
    /// CSVペイロード
    pub content: Payload,
    /// 書き込み先シート名（Noneの場合はアクティブシート）
    pub target_sheet: Option<String>,
    /// 区切り文字（任意の1文字）
    pub delimiter: char,
    /// マージモード
    pub merge_mode: MergeMode,
    /// ワークブックが存在しない場合に作成してよいか
    pub create_if_missing: bool,
}

impl ImportItemSpec {
    /// デフォルト設定（カンマ区切り、Replace、作成許可）でアイテムを生成
    pub fn new(content: impl Into<Payload>) -> Self {
        Self {
            content: content.into(),
            target_sheet: None,
            delimiter: ',',
            merge_mode: MergeMode::default(),
            create_if_missing: true,
        }
    }

    /// base64エンコードされたCSVからアイテムを生成
    pub fn from_base64(encoded: impl Into<String>) -> Self {
        Self::new(Payload::Base64(encoded.into()))
    }

    pub fn with_sheet(mut self, name: impl Into<String>) -> Self {
        self.target_sheet = Some(name.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_merge_mode(mut self, mode: MergeMode) -> Self {
        self.merge_mode = mode;
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

/// エクスポート1件分の要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportItemSpec {
    /// 出力元シート名（Noneの場合はアクティブシート）
    pub source_sheet: Option<String>,
    /// 区切り文字
    pub delimiter: char,
    /// 先頭行をヘッダーとして扱うか
    ///
    /// 出力内容には影響しません。`true`の場合、先頭行が
    /// `ItemResult::header_row`として追加で報告されます。
    pub include_header_row: bool,
}

impl Default for ExportItemSpec {
    fn default() -> Self {
        Self {
            source_sheet: None,
            delimiter: ',',
            include_header_row: true,
        }
    }
}

impl ExportItemSpec {
    /// アクティブシートをカンマ区切りで出力する設定
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: impl Into<String>) -> Self {
        self.source_sheet = Some(name.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header_row(mut self, include: bool) -> Self {
        self.include_header_row = include;
        self
    }
}

/// アイテム1件の処理結果
///
/// 単一アイテム処理で生成され、以後変更されません。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub success: bool,

    /// 解決されたシート名（失敗時も判明していれば設定）
    pub sheet_name: Option<String>,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_imported: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns_imported: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_exported: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns_exported: Option<usize>,

    /// エクスポートされたCSV（base64）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_content_base64: Option<String>,

    /// ヘッダー行（`include_header_row = true`のエクスポートのみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_row: Option<Vec<String>>,
}

impl ItemResult {
    pub(crate) fn imported(sheet_name: String, rows: usize, columns: usize) -> Self {
        Self {
            success: true,
            message: format!("Imported {} rows x {} columns into '{}'", rows, columns, sheet_name),
            sheet_name: Some(sheet_name),
            error_kind: None,
            rows_imported: Some(rows),
            columns_imported: Some(columns),
            rows_exported: None,
            columns_exported: None,
            csv_content_base64: None,
            header_row: None,
        }
    }

    pub(crate) fn exported(
        sheet_name: String,
        rows: usize,
        columns: usize,
        csv_content_base64: String,
        header_row: Option<Vec<String>>,
    ) -> Self {
        let message = if rows == 0 {
            format!("Exported empty sheet '{}' to CSV", sheet_name)
        } else {
            format!("Exported '{}' to CSV ({} rows x {} columns)", sheet_name, rows, columns)
        };
        Self {
            success: true,
            message,
            sheet_name: Some(sheet_name),
            error_kind: None,
            rows_imported: None,
            columns_imported: None,
            rows_exported: Some(rows),
            columns_exported: Some(columns),
            csv_content_base64: Some(csv_content_base64),
            header_row,
        }
    }

    pub(crate) fn failed(sheet_name: Option<String>, context: &str, error: &XlsxBulkError) -> Self {
        Self {
            success: false,
            message: format!("{}: {}", context, error),
            sheet_name,
            error_kind: Some(error.kind()),
            rows_imported: None,
            columns_imported: None,
            rows_exported: None,
            columns_exported: None,
            csv_content_base64: None,
            header_row: None,
        }
    }

    /// エクスポートされたCSVをデコードしてテキストで取得
    pub fn csv_content(&self) -> Option<Result<String, XlsxBulkError>> {
        self.csv_content_base64.as_ref().map(|encoded| {
            let bytes = general_purpose::STANDARD.decode(encoded)?;
            String::from_utf8(bytes)
                .map_err(|e| XlsxBulkError::MalformedInput(format!("export is not UTF-8: {}", e)))
        })
    }
}

/// バッチ全体の処理結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// 要求順に並んだアイテム結果
    pub items: Vec<ItemResult>,
    pub success_count: usize,
    pub failure_count: usize,
    pub workbook_path: String,
    /// "Processed N operations (S successful, F failed)"
    pub message: String,
    /// ワークブックがファイルに保存されたかどうか
    pub persisted: bool,
}

impl BatchResult {
    pub(crate) fn new(items: Vec<ItemResult>, workbook_path: String, persisted: bool) -> Self {
        let success_count = items.iter().filter(|item| item.success).count();
        let failure_count = items.len() - success_count;
        let message = format!(
            "Processed {} operations ({} successful, {} failed)",
            items.len(),
            success_count,
            failure_count
        );
        Self {
            items,
            success_count,
            failure_count,
            workbook_path,
            message,
            persisted,
        }
    }

    /// すべてのアイテムが成功したかどうか
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }
}

/// セルの値を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// 日付時刻（Excelシリアル値）
    DateTime(f64),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// CSVのフィールドからセル値を生成（空文字列は空セル）
    pub(crate) fn from_field(field: &str) -> Self {
        if field.is_empty() {
            CellValue::Empty
        } else {
            CellValue::String(field.to_string())
        }
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    pub fn to_a1_notation(self) -> String {
        format!("{}{}", Self::col_index_to_letter(self.col), self.row as u64 + 1)
    }

    /// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
    fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}
