//! Workbook Store Module
//!
//! ワークブックの読み込み・保存を抽象化するモジュール。
//! バッチ処理は`WorkbookStore`トレイトを介してのみファイルにアクセスします。

use std::io::Write;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};
use tempfile::NamedTempFile;

use crate::error::XlsxBulkError;
use crate::parser::WorkbookLoader;
use crate::security::SecurityConfig;
use crate::types::CellValue;
use crate::workbook::{Workbook, Worksheet};

/// 1904年システムと1900年システムのシリアル値の差（日数）
const EPOCH_1904_OFFSET: f64 = 1462.0;

/// 保存時に日付セルへ適用する表示形式
const DATE_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// ワークブックの永続化を担うトレイト
///
/// デフォルト実装は[`XlsxStore`]です。テストでは保存に失敗するストアなどを
/// 差し替えて使用できます。
pub trait WorkbookStore {
    /// 指定パスにワークブックが存在するか
    fn exists(&self, path: &Path) -> bool;

    /// ワークブックを読み込む
    fn load(&self, path: &Path) -> Result<Workbook, XlsxBulkError>;

    /// ワークブックを保存する
    ///
    /// 保存に失敗した場合、既存のファイルは変更されていてはなりません。
    fn save(&self, workbook: &Workbook, path: &Path) -> Result<(), XlsxBulkError>;
}

/// XLSXファイルのストア
///
/// 読み込みはcalamine、書き出しはrust_xlsxwriterで行います。
/// 保存は同じディレクトリの一時ファイルに書き出してから置き換えるため、
/// 途中で失敗しても既存のファイルは壊れません。
#[derive(Debug, Clone, Default)]
pub struct XlsxStore {
    security: SecurityConfig,
}

impl XlsxStore {
    pub fn new(security: SecurityConfig) -> Self {
        Self { security }
    }

    pub fn security_config(&self) -> &SecurityConfig {
        &self.security
    }

    /// ワークブックをXLSXのバイト列に変換
    fn render(&self, workbook: &Workbook) -> Result<Vec<u8>, XlsxBulkError> {
        let mut output = XlsxWorkbook::new();
        let date_format = Format::new().set_num_format(DATE_NUM_FORMAT);
        let active = workbook.active_index();

        for (index, sheet) in workbook.worksheets().iter().enumerate() {
            let target = output.add_worksheet();
            target.set_name(sheet.name())?;
            if active == Some(index) {
                target.set_active(true);
            }
            write_cells(target, sheet, &date_format, workbook.is_1904())?;
        }

        Ok(output.save_to_buffer()?)
    }
}

fn write_cells(
    target: &mut rust_xlsxwriter::Worksheet,
    sheet: &Worksheet,
    date_format: &Format,
    is_1904: bool,
) -> Result<(), XlsxBulkError> {
    for (row, col, value) in sheet.populated_cells() {
        let col = u16::try_from(col).map_err(|_| {
            XlsxBulkError::CapacityExceeded(format!("column {} cannot be written", col))
        })?;
        match value {
            CellValue::Number(n) => {
                target.write_number(row, col, *n)?;
            }
            CellValue::String(s) | CellValue::Error(s) => {
                target.write_string(row, col, s)?;
            }
            CellValue::Bool(b) => {
                target.write_boolean(row, col, *b)?;
            }
            CellValue::DateTime(serial) => {
                // rust_xlsxwriterは常に1900年システムで書き出す
                let serial = if is_1904 {
                    serial + EPOCH_1904_OFFSET
                } else {
                    *serial
                };
                target.write_number_with_format(row, col, serial, date_format)?;
            }
            CellValue::Empty => {}
        }
    }
    Ok(())
}

impl WorkbookStore for XlsxStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load(&self, path: &Path) -> Result<Workbook, XlsxBulkError> {
        if !self.exists(path) {
            return Err(XlsxBulkError::WorkbookNotFound(path.display().to_string()));
        }
        let buffer = std::fs::read(path)?;
        WorkbookLoader::new(&self.security).load(buffer)
    }

    fn save(&self, workbook: &Workbook, path: &Path) -> Result<(), XlsxBulkError> {
        let buffer = self.render(workbook)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&buffer)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| XlsxBulkError::Io(e.error))?;

        tracing::debug!(path = %path.display(), bytes = buffer.len(), "workbook written");
        Ok(())
    }
}
