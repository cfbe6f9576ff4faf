//! Batch Orchestrator Module
//!
//! 1つのワークブックに対する複数アイテムの処理を統括するモジュール。
//! ワークブックはバッチごとに1回だけ読み込まれ、全アイテムで共有され、
//! インポートの場合は最後に1回だけ保存されます。

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::builder::ProcessorConfig;
use crate::error::XlsxBulkError;
use crate::operation::{self, ImportContext};
use crate::store::WorkbookStore;
use crate::types::{BatchResult, ExportItemSpec, ImportItemSpec};
use crate::workbook::Workbook;

/// インポートバッチを実行する
///
/// # 引数
///
/// * `store` - ワークブックの読み込み・保存に使用するストア
/// * `path` - 解決済みのワークブックのパス
/// * `items` - 要求順のインポートアイテム
/// * `create_if_missing` - ワークブックが存在しない場合に新規作成するか
/// * `config` - プロセッサ設定
///
/// # 戻り値
///
/// * `Ok(BatchResult)` - 各アイテムの結果（アイテムの失敗は結果に含まれる）
/// * `Err(XlsxBulkError::WorkbookNotFound)` - ワークブックが存在せず作成も許可されていない場合
/// * `Err(XlsxBulkError::Persistence)` - 最後の保存に失敗した場合（処理結果を含む）
pub(crate) fn import_batch<S: WorkbookStore + ?Sized>(
    store: &S,
    path: &Path,
    items: &[ImportItemSpec],
    create_if_missing: bool,
    config: &ProcessorConfig,
) -> Result<BatchResult, XlsxBulkError> {
    let workbook_path = path.display().to_string();
    info!(path = %workbook_path, items = items.len(), "starting CSV import batch");

    let (mut workbook, workbook_is_new) = if store.exists(path) {
        (store.load(path)?, false)
    } else if create_if_missing {
        debug!(path = %workbook_path, "workbook does not exist, starting from an empty one");
        (Workbook::new(), true)
    } else {
        return Err(XlsxBulkError::WorkbookNotFound(workbook_path));
    };

    let ctx = ImportContext {
        workbook_path: &workbook_path,
        workbook_is_new,
        default_sheet_name: &config.default_sheet_name,
        security: &config.security,
    };

    let mut results = Vec::with_capacity(items.len());
    let mut modified = false;
    for (index, spec) in items.iter().enumerate() {
        let result = operation::import_item(spec, &mut workbook, &ctx);
        if result.success {
            modified = true;
            debug!(item = index, sheet = ?result.sheet_name, "{}", result.message);
        } else {
            warn!(item = index, sheet = ?result.sheet_name, error = %result.message, "import item failed");
        }
        results.push(result);
    }

    if modified {
        if let Err(e) = store.save(&workbook, path) {
            error!(path = %workbook_path, error = %e, "failed to save workbook");
            return Err(XlsxBulkError::Persistence {
                message: e.to_string(),
                batch: Box::new(BatchResult::new(results, workbook_path.clone(), false)),
                path: workbook_path,
            });
        }
    }

    let batch = BatchResult::new(results, workbook_path, modified);
    info!(
        path = %batch.workbook_path,
        succeeded = batch.success_count,
        failed = batch.failure_count,
        persisted = batch.persisted,
        "{}",
        batch.message
    );
    Ok(batch)
}

/// エクスポートバッチを実行する
///
/// ワークブックは読み取り専用で使用し、保存は行いません。
pub(crate) fn export_batch<S: WorkbookStore + ?Sized>(
    store: &S,
    path: &Path,
    items: &[ExportItemSpec],
) -> Result<BatchResult, XlsxBulkError> {
    let workbook_path = path.display().to_string();
    info!(path = %workbook_path, items = items.len(), "starting CSV export batch");

    if !store.exists(path) {
        return Err(XlsxBulkError::WorkbookNotFound(workbook_path));
    }
    let workbook = store.load(path)?;

    let results = items
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let result = operation::export_item(spec, &workbook);
            if !result.success {
                warn!(item = index, sheet = ?result.sheet_name, error = %result.message, "export item failed");
            }
            result
        })
        .collect();

    let batch = BatchResult::new(results, workbook_path, false);
    info!(
        path = %batch.workbook_path,
        succeeded = batch.success_count,
        failed = batch.failure_count,
        "{}",
        batch.message
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::path::PathBuf;

    use crate::api::MergeMode;
    use crate::error::ErrorKind;

    /// メモリ上のストア（保存回数を記録し、保存失敗を再現できる）
    #[derive(Default)]
    struct MemoryStore {
        saved: RefCell<Option<Workbook>>,
        save_calls: Cell<usize>,
        fail_save: bool,
    }

    impl WorkbookStore for MemoryStore {
        fn exists(&self, _path: &Path) -> bool {
            self.saved.borrow().is_some()
        }

        fn load(&self, path: &Path) -> Result<Workbook, XlsxBulkError> {
            self.saved
                .borrow()
                .clone()
                .ok_or_else(|| XlsxBulkError::WorkbookNotFound(path.display().to_string()))
        }

        fn save(&self, workbook: &Workbook, _path: &Path) -> Result<(), XlsxBulkError> {
            self.save_calls.set(self.save_calls.get() + 1);
            if self.fail_save {
                return Err(XlsxBulkError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only volume",
                )));
            }
            *self.saved.borrow_mut() = Some(workbook.clone());
            Ok(())
        }
    }

    fn path() -> PathBuf {
        PathBuf::from("book.xlsx")
    }

    #[test]
    fn test_two_item_scenario_saves_once() {
        let store = MemoryStore::default();
        let items = vec![
            ImportItemSpec::new("a,b\n1,2").with_sheet("S1"),
            ImportItemSpec::from_base64("not base64!").with_sheet("S2"),
        ];
        let batch =
            import_batch(&store, &path(), &items, true, &ProcessorConfig::default()).unwrap();

        assert_eq!(batch.success_count, 1);
        assert_eq!(batch.failure_count, 1);
        assert!(batch.persisted);
        assert_eq!(store.save_calls.get(), 1);
        assert_eq!(batch.items[0].rows_imported, Some(2));
        assert_eq!(batch.items[1].error_kind, Some(ErrorKind::MalformedInput));

        let saved = store.saved.borrow();
        let saved = saved.as_ref().unwrap();
        assert_eq!(saved.sheet_names(), vec!["S1"]);
    }

    #[test]
    fn test_nothing_saved_when_every_item_fails() {
        let store = MemoryStore::default();
        let items = vec![ImportItemSpec::from_base64("@@@")];
        let batch =
            import_batch(&store, &path(), &items, true, &ProcessorConfig::default()).unwrap();
        assert!(!batch.persisted);
        assert_eq!(store.save_calls.get(), 0);
    }

    #[test]
    fn test_missing_workbook_without_create() {
        let store = MemoryStore::default();
        let err = import_batch(&store, &path(), &[], false, &ProcessorConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WorkbookNotFound);
        assert_eq!(err.to_string(), "Excel file book.xlsx does not exist");
    }

    #[test]
    fn test_save_failure_returns_unsaved_batch() {
        let store = MemoryStore {
            fail_save: true,
            ..Default::default()
        };
        let items = vec![ImportItemSpec::new("x").with_sheet("Only")];
        let err = import_batch(&store, &path(), &items, true, &ProcessorConfig::default())
            .unwrap_err();

        match err {
            XlsxBulkError::Persistence { path, message, batch } => {
                assert_eq!(path, "book.xlsx");
                assert!(message.contains("read-only volume"));
                assert!(!batch.persisted);
                assert_eq!(batch.success_count, 1);
            }
            other => panic!("Expected Persistence error, got {:?}", other),
        }
    }

    #[test]
    fn test_items_share_one_workbook() {
        let store = MemoryStore::default();
        let items = vec![
            ImportItemSpec::new("h\n1").with_sheet("Log"),
            ImportItemSpec::new("2")
                .with_sheet("Log")
                .with_merge_mode(MergeMode::Append),
            ImportItemSpec::new("new")
                .with_sheet("Log")
                .with_merge_mode(MergeMode::NewSheet),
        ];
        let batch =
            import_batch(&store, &path(), &items, true, &ProcessorConfig::default()).unwrap();
        assert_eq!(batch.success_count, 2);
        assert_eq!(batch.items[2].error_kind, Some(ErrorKind::SheetAlreadyExists));

        let exported = export_batch(&store, &path(), &[ExportItemSpec::new()]).unwrap();
        assert_eq!(
            exported.items[0].csv_content().unwrap().unwrap(),
            "h\n1\n2\n"
        );
        assert!(!exported.persisted);
    }

    #[test]
    fn test_export_missing_workbook() {
        let store = MemoryStore::default();
        let err = export_batch(&store, &path(), &[ExportItemSpec::new()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WorkbookNotFound);
    }
}
