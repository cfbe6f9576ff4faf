//! Workbook Loader Module
//!
//! calamineを使用してXLSXファイルを読み込み、メモリ上の`Workbook`に変換します。

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};

use crate::error::XlsxBulkError;
use crate::parser::WorkbookMetadata;
use crate::security::SecurityConfig;
use crate::types::CellValue;
use crate::workbook::{Workbook, Worksheet};

/// ワークブックローダー
///
/// calamineのラッパーとして、XLSXのバイト列から`Workbook`を構築します。
pub(crate) struct WorkbookLoader<'a> {
    security_config: &'a SecurityConfig,
}

impl<'a> WorkbookLoader<'a> {
    pub fn new(security_config: &'a SecurityConfig) -> Self {
        Self { security_config }
    }

    /// XLSXのバイト列を読み込む
    ///
    /// # 戻り値
    ///
    /// * `Ok(Workbook)` - 全シートの値を読み込んだワークブック
    /// * `Err(XlsxBulkError::SecurityViolation)` - サイズ制限・ZIP検証に違反した場合
    /// * `Err(XlsxBulkError::Parse)` - XLSXとして解析できない場合
    pub fn load(&self, buffer: Vec<u8>) -> Result<Workbook, XlsxBulkError> {
        if buffer.len() as u64 > self.security_config.max_input_file_size {
            return Err(XlsxBulkError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                buffer.len(),
                self.security_config.max_input_file_size
            )));
        }

        let metadata =
            WorkbookMetadata::parse(Cursor::new(buffer.as_slice()), self.security_config)?;

        let sheets =
            open_workbook_auto_from_rs(Cursor::new(buffer)).map_err(XlsxBulkError::Parse)?;
        let mut workbook = match sheets {
            Sheets::Xlsx(workbook) => workbook,
            _ => {
                return Err(XlsxBulkError::Parse(calamine::Error::Msg(
                    "Only XLSX format is supported",
                )))
            }
        };

        let mut worksheets = Vec::new();
        for name in workbook.sheet_names().to_vec() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| XlsxBulkError::Parse(e.into()))?;
            worksheets.push(Self::build_worksheet(name, &range)?);
        }

        Ok(Workbook::from_parts(
            worksheets,
            metadata.active_tab,
            metadata.is_1904,
        ))
    }

    /// calamineのRangeからワークシートを構築
    ///
    /// Rangeは最初に値を持つセルから始まるため、開始位置をオフセットとして加算します。
    fn build_worksheet(name: String, range: &Range<Data>) -> Result<Worksheet, XlsxBulkError> {
        let mut worksheet = Worksheet::new(name);
        let Some((start_row, start_col)) = range.start() else {
            return Ok(worksheet);
        };

        for (row_offset, row) in range.rows().enumerate() {
            for (col_offset, cell) in row.iter().enumerate() {
                let value = Self::convert_cell(cell);
                if value.is_empty() {
                    continue;
                }
                worksheet.set_cell(
                    start_row + row_offset as u32,
                    start_col + col_offset as u32,
                    value,
                )?;
            }
        }
        Ok(worksheet)
    }

    fn convert_cell(cell: &Data) -> CellValue {
        match cell {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::String(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
            Data::Error(e) => CellValue::Error(format!("{}", e)),
            Data::Empty => CellValue::Empty,
        }
    }
}
