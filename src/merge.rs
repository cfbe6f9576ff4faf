//! Merge Strategy Module
//!
//! インポート先シートの決定と、マージモードに応じた書き込み計画の作成を行うモジュール。
//!
//! 計画の作成（[`resolve`]）はワークブックを変更しません。取り込むデータの
//! 容量検証に成功した後で[`MergePlan::apply`]を呼び出すことで、失敗した
//! アイテムがワークブックに中途半端な変更を残さないようにしています。

use crate::api::MergeMode;
use crate::error::XlsxBulkError;
use crate::types::CellCoord;
use crate::workbook::{validate_sheet_name, Workbook, MAX_COLS, MAX_ROWS, MAX_STRING_LEN};

/// 書き込み先シート
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SheetTarget {
    /// 既存シート（インデックス）
    Existing(usize),
    /// 新規作成するシート
    Create,
}

/// 書き込み計画
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MergePlan {
    pub target: SheetTarget,
    /// 解決済みのシート名（既存シートの場合はワークブック上の表記）
    pub sheet_name: String,
    /// 書き込み前に既存の内容を消去するか
    pub clear: bool,
    /// 最初の行を書き込む行インデックス（0始まり）
    pub start_row: u32,
}

/// 書き込み計画を作成する
///
/// # 引数
///
/// * `workbook` - バッチで共有しているワークブック
/// * `target_sheet` - 指定されたシート名（`None`の場合はアクティブシート）
/// * `mode` - マージモード
/// * `default_sheet_name` - シートが1枚もない場合に作成するシート名
///
/// # 戻り値
///
/// * `Ok(MergePlan)` - 書き込み計画
/// * `Err(XlsxBulkError::SheetAlreadyExists)` - `NewSheet`で既存のシート名を指定した場合
/// * `Err(XlsxBulkError::InvalidSheetName)` - 作成するシート名がExcelの規則に違反する場合
pub(crate) fn resolve(
    workbook: &Workbook,
    target_sheet: Option<&str>,
    mode: MergeMode,
    default_sheet_name: &str,
) -> Result<MergePlan, XlsxBulkError> {
    let requested = match target_sheet {
        Some(name) => name,
        None => workbook.active_sheet_name().unwrap_or(default_sheet_name),
    };

    let Some(index) = workbook.sheet_index(requested) else {
        validate_sheet_name(requested)?;
        return Ok(MergePlan {
            target: SheetTarget::Create,
            sheet_name: requested.to_string(),
            clear: false,
            start_row: 0,
        });
    };

    let sheet = workbook
        .worksheet(index)
        .ok_or_else(|| XlsxBulkError::SheetNotFound(requested.to_string()))?;
    let sheet_name = sheet.name().to_string();

    match mode {
        MergeMode::Replace => Ok(MergePlan {
            target: SheetTarget::Existing(index),
            sheet_name,
            clear: true,
            start_row: 0,
        }),
        MergeMode::Append => Ok(MergePlan {
            target: SheetTarget::Existing(index),
            sheet_name,
            clear: false,
            start_row: sheet.last_populated_row().map_or(0, |row| row + 1),
        }),
        MergeMode::NewSheet => Err(XlsxBulkError::SheetAlreadyExists(sheet_name)),
    }
}

impl MergePlan {
    /// `rows`行 x `columns`列のデータを書き込めるか検証
    pub fn check_capacity(&self, rows: usize, columns: usize) -> Result<(), XlsxBulkError> {
        if columns > MAX_COLS as usize {
            return Err(XlsxBulkError::CapacityExceeded(format!(
                "{} columns do not fit in sheet '{}' (max: {})",
                columns, self.sheet_name, MAX_COLS
            )));
        }
        let last_row = self.start_row as u64 + rows as u64;
        if last_row > MAX_ROWS as u64 {
            return Err(XlsxBulkError::CapacityExceeded(format!(
                "{} rows starting at row {} do not fit in sheet '{}' (max: {})",
                rows,
                self.start_row as u64 + 1,
                self.sheet_name,
                MAX_ROWS
            )));
        }
        Ok(())
    }

    /// すべてのセル文字列がExcelの文字数上限に収まるか検証
    pub fn check_cell_lengths<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> Result<(), XlsxBulkError> {
        for (offset, row) in rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                let cell = cell.as_ref();
                // バイト数が上限以下なら文字数も上限以下
                if cell.len() <= MAX_STRING_LEN {
                    continue;
                }
                let chars = cell.chars().count();
                if chars > MAX_STRING_LEN {
                    let coord = CellCoord::new(self.start_row + offset as u32, col as u32);
                    return Err(XlsxBulkError::CapacityExceeded(format!(
                        "cell {} in sheet '{}' has {} characters (max: {})",
                        coord.to_a1_notation(),
                        self.sheet_name,
                        chars,
                        MAX_STRING_LEN
                    )));
                }
            }
        }
        Ok(())
    }

    /// 計画をワークブックに適用し、書き込み先シートのインデックスを返す
    pub fn apply(&self, workbook: &mut Workbook) -> Result<usize, XlsxBulkError> {
        let index = match self.target {
            SheetTarget::Existing(index) => index,
            SheetTarget::Create => workbook.add_sheet(&self.sheet_name)?,
        };
        if self.clear {
            workbook
                .worksheet_mut(index)
                .ok_or_else(|| XlsxBulkError::SheetNotFound(self.sheet_name.clone()))?
                .clear();
        }
        Ok(index)
    }
}
