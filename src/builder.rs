//! Builder Module
//!
//! Fluent Builder APIを提供し、`BatchProcessor`インスタンスを段階的に構築する。

use std::path::{Path, PathBuf};

use crate::batch;
use crate::codec;
use crate::error::XlsxBulkError;
use crate::security::{resolve_workbook_path, SecurityConfig};
use crate::store::{WorkbookStore, XlsxStore};
use crate::transport::{BulkCsvExportRequest, BulkCsvImportRequest, BulkResponse};
use crate::types::{BatchResult, ExportItemSpec, ImportItemSpec, ItemResult};
use crate::workbook::validate_sheet_name;

/// ワークブックの保存先ディレクトリを指定する環境変数
pub const FILES_ROOT_ENV: &str = "EXCEL_FILES_PATH";

/// `EXCEL_FILES_PATH`が未設定の場合の保存先ディレクトリ
pub const DEFAULT_FILES_ROOT: &str = "./excel_files";

/// シートが1枚もないワークブックにインポートする際のシート名
pub const DEFAULT_SHEET_NAME: &str = "CSV_Import";

/// バッチ処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ProcessorConfig {
    /// 区切り文字が省略された要求に使用する区切り文字
    pub default_delimiter: char,

    /// シートがない場合に作成するシート名
    pub default_sheet_name: String,

    /// 相対パスのワークブック名を解決する基準ディレクトリ
    pub files_root: PathBuf,

    /// セキュリティ制限
    pub security: SecurityConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            default_delimiter: ',',
            default_sheet_name: DEFAULT_SHEET_NAME.to_string(),
            files_root: PathBuf::from(DEFAULT_FILES_ROOT),
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxbulk::BatchProcessorBuilder;
///
/// # fn main() -> Result<(), xlsxbulk::XlsxBulkError> {
/// let processor = BatchProcessorBuilder::new()
///     .with_files_root("/srv/excel_files")
///     .with_default_delimiter(';')
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchProcessorBuilder<S = XlsxStore> {
    config: ProcessorConfig,
    store: S,
}

impl Default for BatchProcessorBuilder<XlsxStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchProcessorBuilder<XlsxStore> {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 区切り文字: `,`
    /// - デフォルトシート名: `CSV_Import`
    /// - 基準ディレクトリ: `./excel_files`
    /// - ペイロード上限: 100MB
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            store: XlsxStore::default(),
        }
    }

    /// 環境変数`EXCEL_FILES_PATH`から基準ディレクトリを設定したビルダーを生成する
    pub fn from_env() -> Self {
        let root = std::env::var_os(FILES_ROOT_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILES_ROOT));
        Self::new().with_files_root(root)
    }

    /// セキュリティ制限を指定する
    ///
    /// ペイロードの上限に加えて、ワークブック読み込み時のZIP検証にも適用されます。
    pub fn with_security_config(mut self, security: SecurityConfig) -> Self {
        self.store = XlsxStore::new(security.clone());
        self.config.security = security;
        self
    }
}

impl<S: WorkbookStore> BatchProcessorBuilder<S> {
    /// 区切り文字が省略された要求に使用する区切り文字を指定する
    pub fn with_default_delimiter(mut self, delimiter: char) -> Self {
        self.config.default_delimiter = delimiter;
        self
    }

    /// シートが1枚もないワークブックに作成するシート名を指定する
    pub fn with_default_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.default_sheet_name = name.into();
        self
    }

    /// CSVペイロード1件あたりの最大サイズ（バイト）を指定する
    pub fn with_max_payload_size(mut self, bytes: usize) -> Self {
        self.config.security.max_payload_size = bytes;
        self
    }

    /// 相対パスのワークブック名を解決する基準ディレクトリを指定する
    pub fn with_files_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.files_root = root.into();
        self
    }

    /// ワークブックストアを差し替える
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxbulk::{BatchProcessorBuilder, SecurityConfig, XlsxStore};
    ///
    /// # fn main() -> Result<(), xlsxbulk::XlsxBulkError> {
    /// let store = XlsxStore::new(SecurityConfig {
    ///     max_input_file_size: 50 * 1024 * 1024,
    ///     ..Default::default()
    /// });
    /// let processor = BatchProcessorBuilder::new().with_store(store).build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_store<T: WorkbookStore>(self, store: T) -> BatchProcessorBuilder<T> {
        BatchProcessorBuilder {
            config: self.config,
            store,
        }
    }

    /// 設定を検証して`BatchProcessor`を生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(BatchProcessor)` - 設定が有効な場合
    /// * `Err(XlsxBulkError::Config)` - デフォルトシート名・区切り文字・ペイロード上限が無効な場合
    pub fn build(self) -> Result<BatchProcessor<S>, XlsxBulkError> {
        // 1. デフォルトシート名の検証
        validate_sheet_name(&self.config.default_sheet_name).map_err(|e| {
            XlsxBulkError::Config(format!("Invalid default sheet name: {}", e))
        })?;

        // 2. 区切り文字の検証
        codec::validate_delimiter(self.config.default_delimiter).map_err(|_| {
            XlsxBulkError::Config(format!(
                "Invalid default delimiter: {:?}",
                self.config.default_delimiter
            ))
        })?;

        // 3. ペイロード上限の検証
        if self.config.security.max_payload_size == 0 {
            return Err(XlsxBulkError::Config(
                "Maximum payload size must be greater than zero".to_string(),
            ));
        }

        Ok(BatchProcessor {
            config: self.config,
            store: self.store,
        })
    }
}

/// バッチ処理のファサード
///
/// CSVのインポート・エクスポートを1つのワークブックに対してまとめて実行する
/// メインエントリーポイントです。状態を持たないため、異なるワークブックへの
/// バッチは並行して実行できます。同じファイルへの同時書き込みは調停しません。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxbulk::{BatchProcessorBuilder, ExportItemSpec, ImportItemSpec, MergeMode};
///
/// # fn main() -> Result<(), xlsxbulk::XlsxBulkError> {
/// let processor = BatchProcessorBuilder::new().build()?;
///
/// let items = vec![
///     ImportItemSpec::new("id,name\n1,Alice").with_sheet("Users"),
///     ImportItemSpec::new("2,Bob")
///         .with_sheet("Users")
///         .with_merge_mode(MergeMode::Append),
/// ];
/// let result = processor.import_batch("users.xlsx", &items, true)?;
/// println!("{}", result.message);
///
/// let exported = processor.export_batch("users.xlsx", &[ExportItemSpec::new()])?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchProcessor<S = XlsxStore> {
    config: ProcessorConfig,
    store: S,
}

impl<S: WorkbookStore> BatchProcessor<S> {
    /// ワークブック名を実際のパスに解決する
    ///
    /// 絶対パスはそのまま、相対パスは基準ディレクトリからの相対として扱います。
    pub fn resolve_path(&self, workbook: &str) -> Result<PathBuf, XlsxBulkError> {
        resolve_workbook_path(&self.config.files_root, workbook)
    }

    pub fn files_root(&self) -> &Path {
        &self.config.files_root
    }

    pub fn default_delimiter(&self) -> char {
        self.config.default_delimiter
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 複数のCSVを1つのワークブックにインポートする
    ///
    /// # 引数
    ///
    /// * `workbook` - ワークブック名（基準ディレクトリからの相対パス、または絶対パス）
    /// * `items` - インポートアイテム（この順序で処理される）
    /// * `create_if_missing` - ワークブックが存在しない場合に新規作成するか
    ///
    /// # 戻り値
    ///
    /// * `Ok(BatchResult)` - 処理結果。個々のアイテムの失敗は`items`に記録される
    /// * `Err(XlsxBulkError)` - ワークブックが存在しない場合や保存に失敗した場合
    pub fn import_batch(
        &self,
        workbook: &str,
        items: &[ImportItemSpec],
        create_if_missing: bool,
    ) -> Result<BatchResult, XlsxBulkError> {
        let path = self.resolve_path(workbook)?;
        batch::import_batch(&self.store, &path, items, create_if_missing, &self.config)
    }

    /// 複数のシートをCSVとしてエクスポートする
    pub fn export_batch(
        &self,
        workbook: &str,
        items: &[ExportItemSpec],
    ) -> Result<BatchResult, XlsxBulkError> {
        let path = self.resolve_path(workbook)?;
        batch::export_batch(&self.store, &path, items)
    }

    /// CSVを1件インポートする
    ///
    /// アイテム単位の失敗も`Err`として返します。
    pub fn import_csv(&self, workbook: &str, item: ImportItemSpec) -> Result<ItemResult, XlsxBulkError> {
        let create_if_missing = item.create_if_missing;
        let batch = self.import_batch(workbook, std::slice::from_ref(&item), create_if_missing)?;
        single_item(batch)
    }

    /// シートを1件エクスポートする
    ///
    /// アイテム単位の失敗も`Err`として返します。
    pub fn export_csv(&self, workbook: &str, item: ExportItemSpec) -> Result<ItemResult, XlsxBulkError> {
        let batch = self.export_batch(workbook, std::slice::from_ref(&item))?;
        single_item(batch)
    }

    /// トランスポート層の一括インポート要求を処理する
    pub fn import_requests(&self, workbook: &str, request: BulkCsvImportRequest) -> BulkResponse {
        let create_if_missing = request.create_if_missing;
        let items: Vec<ImportItemSpec> = request
            .csv_data_list
            .into_iter()
            .map(|item| item.into_spec(self.config.default_delimiter, create_if_missing))
            .collect();
        BulkResponse::from_result(self.import_batch(workbook, &items, create_if_missing))
    }

    /// トランスポート層の一括エクスポート要求を処理する
    pub fn export_requests(&self, workbook: &str, request: BulkCsvExportRequest) -> BulkResponse {
        let items: Vec<ExportItemSpec> = request
            .worksheet_list
            .into_iter()
            .map(|item| item.into_spec(self.config.default_delimiter))
            .collect();
        BulkResponse::from_result(self.export_batch(workbook, &items))
    }
}

/// 1件だけのバッチ結果からアイテム結果を取り出す
fn single_item(batch: BatchResult) -> Result<ItemResult, XlsxBulkError> {
    let item = batch
        .items
        .into_iter()
        .next()
        .ok_or_else(|| XlsxBulkError::Config("batch produced no result".to_string()))?;
    if item.success {
        return Ok(item);
    }
    Err(item_error(item))
}

/// 失敗したアイテム結果をエラーに戻す
fn item_error(item: ItemResult) -> XlsxBulkError {
    use crate::error::ErrorKind;

    let message = item.message;
    match item.error_kind {
        Some(ErrorKind::SheetNotFound) => {
            XlsxBulkError::SheetNotFound(item.sheet_name.unwrap_or(message))
        }
        Some(ErrorKind::SheetAlreadyExists) => {
            XlsxBulkError::SheetAlreadyExists(item.sheet_name.unwrap_or(message))
        }
        Some(ErrorKind::WorkbookNotFound) => XlsxBulkError::WorkbookNotFound(message),
        Some(ErrorKind::InvalidSheetName) => XlsxBulkError::InvalidSheetName {
            name: item.sheet_name.unwrap_or_default(),
            reason: message,
        },
        Some(ErrorKind::CapacityExceeded) => XlsxBulkError::CapacityExceeded(message),
        Some(ErrorKind::SecurityViolation) => XlsxBulkError::SecurityViolation(message),
        _ => XlsxBulkError::MalformedInput(message),
    }
}
