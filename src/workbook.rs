//! Workbook Model Module
//!
//! バッチ処理中に共有されるメモリ上のワークブック表現。
//! セルは値のみを保持し、書式・数式・グラフなどは保持しません。

use crate::error::XlsxBulkError;
use crate::types::{CellCoord, CellValue};

/// ワークシートの最大行数（Excel仕様）
pub const MAX_ROWS: u32 = 1_048_576;

/// ワークシートの最大列数（Excel仕様: XFD列）
pub const MAX_COLS: u32 = 16_384;

/// セル文字列の最大文字数（Excel仕様）
pub const MAX_STRING_LEN: usize = 32_767;

/// シート名の最大文字数
const MAX_SHEET_NAME_LEN: usize = 31;

/// シート名に使用できない文字
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Excelのシート名規則に従っているか検証する
pub(crate) fn validate_sheet_name(name: &str) -> Result<(), XlsxBulkError> {
    let invalid = |reason: String| XlsxBulkError::InvalidSheetName {
        name: name.to_string(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(invalid("name must not be empty".to_string()));
    }
    let len = name.chars().count();
    if len > MAX_SHEET_NAME_LEN {
        return Err(invalid(format!(
            "name is {} characters long (max: {})",
            len, MAX_SHEET_NAME_LEN
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_SHEET_CHARS.contains(c)) {
        return Err(invalid(format!("contains '{}'", c)));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid("must not begin or end with an apostrophe".to_string()));
    }
    Ok(())
}

/// 1枚のワークシート
///
/// 行データは0行目から密に保持します（空行は空の`Vec`）。
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Worksheet {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 指定セルの値を取得
    pub fn cell(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.rows
            .get(row as usize)
            .and_then(|cells| cells.get(col as usize))
            .filter(|value| !value.is_empty())
    }

    /// すべてのセルを消去
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// 値を持つ最後の行のインデックス（0始まり）。空シートは`None`
    pub fn last_populated_row(&self) -> Option<u32> {
        self.rows
            .iter()
            .rposition(|cells| cells.iter().any(|value| !value.is_empty()))
            .map(|idx| idx as u32)
    }

    /// 値を持つ最後の列のインデックス（0始まり）。空シートは`None`
    pub fn last_populated_col(&self) -> Option<u32> {
        self.rows
            .iter()
            .filter_map(|cells| cells.iter().rposition(|value| !value.is_empty()))
            .max()
            .map(|idx| idx as u32)
    }

    /// セルに値を設定
    pub(crate) fn set_cell(
        &mut self,
        row: u32,
        col: u32,
        value: CellValue,
    ) -> Result<(), XlsxBulkError> {
        if row >= MAX_ROWS || col >= MAX_COLS {
            return Err(XlsxBulkError::CapacityExceeded(format!(
                "cell {} is outside the worksheet '{}'",
                CellCoord::new(row, col).to_a1_notation(),
                self.name
            )));
        }
        let (row, col) = (row as usize, col as usize);
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value;
        Ok(())
    }

    /// 1行分の文字列を`row`行目のA列から書き込む
    ///
    /// 行内の既存セルのうち、書き込み範囲外のものはそのまま残ります。
    pub fn write_row<S: AsRef<str>>(&mut self, row: u32, cells: &[S]) -> Result<(), XlsxBulkError> {
        if cells.len() > MAX_COLS as usize {
            return Err(XlsxBulkError::CapacityExceeded(format!(
                "row has {} columns (max: {})",
                cells.len(),
                MAX_COLS
            )));
        }
        if row >= MAX_ROWS {
            return Err(XlsxBulkError::CapacityExceeded(format!(
                "row {} is beyond the last worksheet row ({})",
                row as u64 + 1,
                MAX_ROWS
            )));
        }
        for (col, cell) in cells.iter().enumerate() {
            self.set_cell(row, col as u32, CellValue::from_field(cell.as_ref()))?;
        }
        Ok(())
    }

    /// A1から最終行・最終列までの矩形グリッドを取得
    pub fn read_grid(&self) -> Vec<Vec<CellValue>> {
        let (Some(last_row), Some(last_col)) = (self.last_populated_row(), self.last_populated_col())
        else {
            return Vec::new();
        };
        let width = last_col as usize + 1;
        self.rows[..=last_row as usize]
            .iter()
            .map(|cells| {
                let mut row: Vec<CellValue> = cells.iter().take(width).cloned().collect();
                row.resize(width, CellValue::Empty);
                row
            })
            .collect()
    }

    /// 値を持つセルを(行, 列, 値)で列挙
    pub(crate) fn populated_cells(&self) -> impl Iterator<Item = (u32, u32, &CellValue)> {
        self.rows.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.is_empty())
                .map(move |(col, value)| (row as u32, col as u32, value))
        })
    }
}

/// メモリ上のワークブック
///
/// `WorkbookStore`で読み込まれ、バッチ処理の間だけ`&mut`で共有されます。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
    active: usize,
    is_1904: bool,
}

impl Workbook {
    /// シートを持たない新規ワークブック
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(sheets: Vec<Worksheet>, active: usize, is_1904: bool) -> Self {
        let active = if active < sheets.len() { active } else { 0 };
        Self {
            sheets,
            active,
            is_1904,
        }
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// 1904年エポックを使用するかどうか
    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// アクティブシートのインデックス（シートがない場合は`None`）
    pub fn active_index(&self) -> Option<usize> {
        (!self.sheets.is_empty()).then_some(self.active)
    }

    pub fn active_sheet_name(&self) -> Option<&str> {
        self.active_index().map(|idx| self.sheets[idx].name())
    }

    pub fn set_active(&mut self, index: usize) {
        if index < self.sheets.len() {
            self.active = index;
        }
    }

    /// シート名からインデックスを検索（大文字小文字を区別しない）
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.name == name)
            .or_else(|| {
                let lower = name.to_lowercase();
                self.sheets.iter().position(|s| s.name.to_lowercase() == lower)
            })
    }

    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.sheets.get(index)
    }

    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).and_then(|idx| self.sheets.get(idx))
    }

    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.sheets.get_mut(index)
    }

    pub(crate) fn worksheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// シートを末尾に追加してインデックスを返す
    ///
    /// 最初のシートは自動的にアクティブシートになります。
    pub fn add_sheet(&mut self, name: &str) -> Result<usize, XlsxBulkError> {
        validate_sheet_name(name)?;
        if self.sheet_index(name).is_some() {
            return Err(XlsxBulkError::SheetAlreadyExists(name.to_string()));
        }
        self.sheets.push(Worksheet::new(name));
        let index = self.sheets.len() - 1;
        if index == 0 {
            self.active = 0;
        }
        Ok(index)
    }
}
