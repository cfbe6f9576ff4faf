//! Formatter Module
//!
//! エクスポート時にセル値をCSVのフィールド文字列へ変換するモジュール。

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::XlsxBulkError;
use crate::types::CellValue;

/// 日付時刻の出力書式
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 1900年システムのうるう年バグ（1900-02-29）より前のシリアル値の上限
const LEAP_BUG_SERIAL: f64 = 61.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Excelで表現できる最後の日（9999-12-31）の翌日のシリアル値
const MAX_SERIAL: f64 = 2_958_466.0;

/// セルフォーマッター
///
/// セル値のフォーマット処理のファサードとして機能します。
#[derive(Debug, Default)]
pub(crate) struct CellFormatter {
    date_formatter: DateFormatter,
}

impl CellFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// セル値をフォーマット
    ///
    /// # 引数
    ///
    /// * `value` - セル値
    /// * `is_1904` - 1904年エポックを使用するかどうか
    ///
    /// # 戻り値
    ///
    /// * `Ok(String)` - フォーマット済み文字列（空セルは空文字列）
    /// * `Err(XlsxBulkError)` - 日付の範囲外など変換できない場合
    pub fn format_cell(&self, value: &CellValue, is_1904: bool) -> Result<String, XlsxBulkError> {
        Ok(match value {
            CellValue::Number(n) => format_number(*n),
            CellValue::String(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::DateTime(serial) => self.date_formatter.format(*serial, is_1904)?,
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        })
    }

    /// 行単位でフォーマット
    pub fn format_row(&self, row: &[CellValue], is_1904: bool) -> Result<Vec<String>, XlsxBulkError> {
        row.iter()
            .map(|value| self.format_cell(value, is_1904))
            .collect()
    }
}

/// 数値を文字列に変換
///
/// 整数値は小数点なし（`3`）、それ以外は最短表現（`1.5`）になります。
fn format_number(value: f64) -> String {
    value.to_string()
}

/// 日付フォーマッター
///
/// Excelのシリアル日付値を`YYYY-MM-DD HH:MM:SS`形式の文字列に変換します。
///
/// # エポックシステム
///
/// - 1900年システム（デフォルト）: 1899年12月30日起算
///   - シリアル値60（存在しない1900-02-29）以前は1日ずれるため補正する
///   - シリアル値1 = 1900年1月1日
/// - 1904年システム: 1904年1月1日起算
///   - シリアル値0 = 1904年1月1日
#[derive(Debug, Default)]
pub(crate) struct DateFormatter;

impl DateFormatter {
    pub fn format(&self, serial_value: f64, is_1904: bool) -> Result<String, XlsxBulkError> {
        Ok(serial_to_datetime(serial_value, is_1904)?
            .format(DATETIME_FORMAT)
            .to_string())
    }
}

/// シリアル値を日付時刻に変換
pub(crate) fn serial_to_datetime(
    serial_value: f64,
    is_1904: bool,
) -> Result<NaiveDateTime, XlsxBulkError> {
    let out_of_range = || {
        XlsxBulkError::MalformedInput(format!(
            "date serial {} is out of range (1904 system: {})",
            serial_value, is_1904
        ))
    };
    if !(0.0..MAX_SERIAL).contains(&serial_value) {
        return Err(out_of_range());
    }

    let epoch = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    }
    .and_then(|date| date.and_hms_opt(0, 0, 0))
    .ok_or_else(out_of_range)?;

    let mut days = serial_value.floor();
    if !is_1904 && serial_value < LEAP_BUG_SERIAL {
        days += 1.0;
    }
    // 秒未満は四捨五入（23:59:59.9999 → 翌日0:00:00）
    let seconds = ((serial_value - serial_value.floor()) * SECONDS_PER_DAY).round() as i64;

    epoch
        .checked_add_signed(Duration::days(days as i64))
        .and_then(|dt| dt.checked_add_signed(Duration::seconds(seconds)))
        .ok_or_else(out_of_range)
}
