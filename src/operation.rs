//! Single-Item Operation Module
//!
//! インポート・エクスポート1件分の処理を行うモジュール。
//! この境界の内側で発生したエラーはすべて`ItemResult`（`success = false`）に
//! 変換され、呼び出し元のバッチ処理には伝播しません。

use base64::{engine::general_purpose, Engine as _};

use crate::codec;
use crate::error::XlsxBulkError;
use crate::formatter::CellFormatter;
use crate::merge;
use crate::security::SecurityConfig;
use crate::types::{ExportItemSpec, ImportItemSpec, ItemResult};
use crate::workbook::Workbook;

/// インポート処理に必要なバッチ側の情報
#[derive(Debug, Clone, Copy)]
pub(crate) struct ImportContext<'a> {
    /// エラーメッセージに使用するワークブックのパス
    pub workbook_path: &'a str,
    /// ワークブックがこのバッチで新規に作成されたか
    pub workbook_is_new: bool,
    /// シートが1枚もない場合に作成するシート名
    pub default_sheet_name: &'a str,
    pub security: &'a SecurityConfig,
}

/// 失敗したアイテムのエラーと、判明していればシート名
struct ItemFailure {
    sheet_name: Option<String>,
    error: XlsxBulkError,
}

impl ItemFailure {
    fn on_sheet(sheet_name: impl Into<String>, error: XlsxBulkError) -> Self {
        Self {
            sheet_name: Some(sheet_name.into()),
            error,
        }
    }
}

impl From<XlsxBulkError> for ItemFailure {
    fn from(error: XlsxBulkError) -> Self {
        Self {
            sheet_name: None,
            error,
        }
    }
}

/// CSVを1件インポートする
///
/// 処理の流れ: ペイロードのデコード → CSV解析 → 書き込み計画の作成 →
/// 容量・セル文字数の検証 → 計画の適用 → 行の書き込み。
/// 容量検証までに失敗した場合、ワークブックは変更されません。
pub(crate) fn import_item(
    spec: &ImportItemSpec,
    workbook: &mut Workbook,
    ctx: &ImportContext<'_>,
) -> ItemResult {
    match try_import(spec, workbook, ctx) {
        Ok(result) => result,
        Err(failure) => {
            let context = match &spec.target_sheet {
                Some(name) => format!("Failed to import CSV to sheet '{}'", name),
                None => "Failed to import CSV".to_string(),
            };
            let sheet_name = failure.sheet_name.or_else(|| spec.target_sheet.clone());
            ItemResult::failed(sheet_name, &context, &failure.error)
        }
    }
}

fn try_import(
    spec: &ImportItemSpec,
    workbook: &mut Workbook,
    ctx: &ImportContext<'_>,
) -> Result<ItemResult, ItemFailure> {
    ctx.security.check_payload_size(spec.content.encoded_len())?;
    let bytes = spec.content.decode()?;
    ctx.security.check_payload_size(bytes.len())?;
    let rows = codec::parse(&bytes, spec.delimiter)?;

    if ctx.workbook_is_new && workbook.is_empty() && !spec.create_if_missing {
        return Err(XlsxBulkError::WorkbookNotFound(ctx.workbook_path.to_string()).into());
    }

    let plan = merge::resolve(
        workbook,
        spec.target_sheet.as_deref(),
        spec.merge_mode,
        ctx.default_sheet_name,
    )?;
    let columns = codec::grid_width(&rows);
    plan.check_capacity(rows.len(), columns)
        .and_then(|_| plan.check_cell_lengths(&rows))
        .map_err(|e| ItemFailure::on_sheet(&plan.sheet_name, e))?;

    let index = plan
        .apply(workbook)
        .map_err(|e| ItemFailure::on_sheet(&plan.sheet_name, e))?;
    let sheet = workbook
        .worksheet_mut(index)
        .ok_or_else(|| ItemFailure::on_sheet(&plan.sheet_name, XlsxBulkError::SheetNotFound(plan.sheet_name.clone())))?;
    for (offset, row) in rows.iter().enumerate() {
        sheet
            .write_row(plan.start_row + offset as u32, row)
            .map_err(|e| ItemFailure::on_sheet(&plan.sheet_name, e))?;
    }

    Ok(ItemResult::imported(plan.sheet_name, rows.len(), columns))
}

/// シートを1件CSVとしてエクスポートする
///
/// A1から最終行・最終列までの矩形範囲を出力します。
/// ワークブックは変更しません。
pub(crate) fn export_item(spec: &ExportItemSpec, workbook: &Workbook) -> ItemResult {
    match try_export(spec, workbook) {
        Ok(result) => result,
        Err(failure) => {
            let context = match &spec.source_sheet {
                Some(name) => format!("Failed to export sheet '{}' to CSV", name),
                None => "Failed to export CSV".to_string(),
            };
            let sheet_name = failure.sheet_name.or_else(|| spec.source_sheet.clone());
            ItemResult::failed(sheet_name, &context, &failure.error)
        }
    }
}

fn try_export(spec: &ExportItemSpec, workbook: &Workbook) -> Result<ItemResult, ItemFailure> {
    codec::validate_delimiter(spec.delimiter)?;

    let index = match &spec.source_sheet {
        Some(name) => workbook
            .sheet_index(name)
            .ok_or_else(|| XlsxBulkError::SheetNotFound(name.clone()))?,
        None => workbook.active_index().ok_or_else(|| {
            XlsxBulkError::SheetNotFound("(active sheet: workbook has no worksheets)".to_string())
        })?,
    };
    let sheet = workbook
        .worksheet(index)
        .ok_or_else(|| XlsxBulkError::SheetNotFound(format!("#{}", index)))?;
    let sheet_name = sheet.name().to_string();

    let formatter = CellFormatter::new();
    let rows = sheet
        .read_grid()
        .iter()
        .map(|row| formatter.format_row(row, workbook.is_1904()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ItemFailure::on_sheet(&sheet_name, e))?;
    let columns = codec::grid_width(&rows);

    let text = codec::serialize(&rows, spec.delimiter)
        .map_err(|e| ItemFailure::on_sheet(&sheet_name, e))?;
    let encoded = general_purpose::STANDARD.encode(text.as_bytes());

    let header_row = if spec.include_header_row {
        rows.first().cloned()
    } else {
        None
    };

    Ok(ItemResult::exported(
        sheet_name,
        rows.len(),
        columns,
        encoded,
        header_row,
    ))
}
