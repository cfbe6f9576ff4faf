//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::XlsxBulkError;

/// インポート時のマージモード
///
/// 取り込むCSVデータと既存シートの内容をどのように組み合わせるかを指定します。
/// 未知のモード文字列は`FromStr`・serdeのどちらでもエラーになります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// 既存シートの内容をすべて消去してから書き込む（デフォルト）
    ///
    /// シートが存在しない場合は新規作成します。
    #[default]
    Replace,

    /// 既存シートの最終行の次の行から書き込む
    ///
    /// 例: 3行のデータがあるシートには4行目（インデックス3）から追記します。
    /// シートが存在しない場合は新規作成し、先頭行から書き込みます。
    Append,

    /// 常に新しいシートを作成する
    ///
    /// 同名のシートが既に存在する場合は上書きせず、
    /// `XlsxBulkError::SheetAlreadyExists`で失敗します。
    NewSheet,
}

impl MergeMode {
    /// ワイヤ形式の名前（`replace` / `append` / `new_sheet`）
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Replace => "replace",
            MergeMode::Append => "append",
            MergeMode::NewSheet => "new_sheet",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMode {
    type Err = XlsxBulkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(MergeMode::Replace),
            "append" => Ok(MergeMode::Append),
            "new_sheet" | "newsheet" => Ok(MergeMode::NewSheet),
            other => Err(XlsxBulkError::Config(format!(
                "Unknown merge mode '{}' (expected replace, append or new_sheet)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_mode_default_is_replace() {
        assert_eq!(MergeMode::default(), MergeMode::Replace);
    }

    #[test]
    fn test_merge_mode_from_str() {
        assert_eq!("replace".parse::<MergeMode>().unwrap(), MergeMode::Replace);
        assert_eq!("Append".parse::<MergeMode>().unwrap(), MergeMode::Append);
        assert_eq!(" new_sheet ".parse::<MergeMode>().unwrap(), MergeMode::NewSheet);
        assert!(matches!(
            "merge".parse::<MergeMode>(),
            Err(XlsxBulkError::Config(msg)) if msg.contains("merge")
        ));
    }

    #[test]
    fn test_merge_mode_serde() {
        assert_eq!(
            serde_json::to_string(&MergeMode::NewSheet).unwrap(),
            "\"new_sheet\""
        );
        let mode: MergeMode = serde_json::from_str("\"append\"").unwrap();
        assert_eq!(mode, MergeMode::Append);
        assert!(serde_json::from_str::<MergeMode>("\"upsert\"").is_err());
    }

    #[test]
    fn test_merge_mode_display_round_trips() {
        for mode in [MergeMode::Replace, MergeMode::Append, MergeMode::NewSheet] {
            assert_eq!(mode.to_string().parse::<MergeMode>().unwrap(), mode);
        }
    }
}
