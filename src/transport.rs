//! Transport Shapes Module
//!
//! HTTPやツール呼び出しなどのトランスポート層でやり取りされる要求・応答の形を
//! serdeで定義するモジュール。要求はアイテム仕様に変換してバッチ処理に渡します。

use serde::{Deserialize, Serialize};

use crate::api::MergeMode;
use crate::error::XlsxBulkError;
use crate::types::{BatchResult, ExportItemSpec, ImportItemSpec, ItemResult, Payload};

fn default_true() -> bool {
    true
}

/// CSVインポート要求（1件）
///
/// ```rust
/// use xlsxbulk::CsvImportRequest;
///
/// let request: CsvImportRequest =
///     serde_json::from_str(r#"{"csv_content_base64": "YSxiCjEsMg=="}"#).unwrap();
/// assert!(request.sheet_name.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvImportRequest {
    pub csv_content_base64: String,
    #[serde(default)]
    pub sheet_name: Option<String>,
    /// 省略時はプロセッサのデフォルト区切り文字
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub merge_mode: MergeMode,
}

impl CsvImportRequest {
    pub(crate) fn into_spec(self, default_delimiter: char, create_if_missing: bool) -> ImportItemSpec {
        ImportItemSpec {
            content: Payload::Base64(self.csv_content_base64),
            target_sheet: self.sheet_name,
            delimiter: self.delimiter.unwrap_or(default_delimiter),
            merge_mode: self.merge_mode,
            create_if_missing,
        }
    }
}

/// CSV一括インポート要求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCsvImportRequest {
    pub csv_data_list: Vec<CsvImportRequest>,
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
}

/// CSVエクスポート要求（1件）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvExportRequest {
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default = "default_true")]
    pub include_header_row: bool,
}

impl CsvExportRequest {
    pub(crate) fn into_spec(self, default_delimiter: char) -> ExportItemSpec {
        ExportItemSpec {
            source_sheet: self.sheet_name,
            delimiter: self.delimiter.unwrap_or(default_delimiter),
            include_header_row: self.include_header_row,
        }
    }
}

/// CSV一括エクスポート要求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCsvExportRequest {
    pub worksheet_list: Vec<CsvExportRequest>,
}

/// 一括処理の応答
///
/// バッチ単位のエラーは`success = false`とエラーメッセージで表現されます。
/// 保存に失敗した場合でも、メモリ上で処理されたアイテム結果は`results`に含まれます。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub success: bool,
    pub message: String,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<ItemResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excel_path: Option<String>,
    pub persisted: bool,
}

impl BulkResponse {
    pub fn from_result(result: Result<BatchResult, XlsxBulkError>) -> Self {
        match result {
            Ok(batch) => Self {
                success: true,
                message: batch.message,
                success_count: batch.success_count,
                failure_count: batch.failure_count,
                results: batch.items,
                excel_path: Some(batch.workbook_path),
                persisted: batch.persisted,
            },
            Err(XlsxBulkError::Persistence {
                path,
                message,
                batch,
            }) => Self {
                success: false,
                message: format!("Failed to save workbook {}: {}", path, message),
                success_count: batch.success_count,
                failure_count: batch.failure_count,
                results: batch.items,
                excel_path: Some(path),
                persisted: false,
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
                success_count: 0,
                failure_count: 0,
                results: Vec::new(),
                excel_path: None,
                persisted: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_request_defaults() {
        let request: BulkCsvImportRequest = serde_json::from_str(
            r#"{"csv_data_list": [{"csv_content_base64": "YQ==", "sheet_name": "S"}]}"#,
        )
        .unwrap();
        assert!(request.create_if_missing);
        let item = &request.csv_data_list[0];
        assert_eq!(item.merge_mode, MergeMode::Replace);
        assert!(item.delimiter.is_none());

        let spec = request.csv_data_list[0].clone().into_spec(';', true);
        assert_eq!(spec.delimiter, ';');
        assert_eq!(spec.target_sheet.as_deref(), Some("S"));
        assert_eq!(spec.content, Payload::Base64("YQ==".to_string()));
    }

    #[test]
    fn test_import_request_rejects_unknown_merge_mode() {
        let result: Result<CsvImportRequest, _> = serde_json::from_str(
            r#"{"csv_content_base64": "YQ==", "merge_mode": "overwrite"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_export_request_defaults() {
        let request: BulkCsvExportRequest =
            serde_json::from_str(r#"{"worksheet_list": [{}, {"delimiter": "\t"}]}"#).unwrap();
        let specs: Vec<_> = request
            .worksheet_list
            .into_iter()
            .map(|item| item.into_spec(','))
            .collect();
        assert!(specs[0].include_header_row);
        assert_eq!(specs[0].delimiter, ',');
        assert_eq!(specs[1].delimiter, '\t');
    }

    #[test]
    fn test_response_from_batch_error() {
        let response = BulkResponse::from_result(Err(XlsxBulkError::WorkbookNotFound(
            "missing.xlsx".to_string(),
        )));
        assert!(!response.success);
        assert_eq!(response.message, "Excel file missing.xlsx does not exist");
        assert!(response.results.is_empty());
        assert_eq!((response.success_count, response.failure_count), (0, 0));

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("excel_path").is_none());
        assert_eq!(json["success_count"], 0);
        assert_eq!(json["failure_count"], 0);
    }

    #[test]
    fn test_response_from_persistence_error_keeps_results() {
        let batch = BatchResult::new(
            vec![
                ItemResult::imported("S1".to_string(), 1, 1),
                ItemResult::failed(
                    Some("S2".to_string()),
                    "Failed to import CSV to sheet 'S2'",
                    &XlsxBulkError::MalformedInput("bad".to_string()),
                ),
            ],
            "book.xlsx".to_string(),
            false,
        );
        let response = BulkResponse::from_result(Err(XlsxBulkError::Persistence {
            path: "book.xlsx".to_string(),
            message: "disk full".to_string(),
            batch: Box::new(batch),
        }));
        assert!(!response.success);
        assert!(!response.persisted);
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.success_count, 1);
        assert_eq!(response.failure_count, 1);
        assert!(response.message.contains("disk full"));
    }
}
