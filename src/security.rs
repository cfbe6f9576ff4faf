//! Security Module
//!
//! セキュリティ対策を実装するモジュール。
//! ペイロードサイズ制限、ZIP bomb攻撃・パストラバーサル攻撃への対策を提供します。

use std::path::{Component, Path, PathBuf};

use crate::error::XlsxBulkError;

/// セキュリティ設定
///
/// ファイル処理時のセキュリティ制限を定義します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// CSVペイロード1件あたりの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_payload_size: usize,
    /// 展開後の最大サイズ（バイト）
    /// デフォルト: 1GB (1_073_741_824 bytes)
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大ファイル数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 単一ファイルの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_file_size: u64,
    /// 入力ワークブックの最大サイズ（バイト）
    /// デフォルト: 2GB (2_147_483_648 bytes)
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 104_857_600,        // 100MB
            max_decompressed_size: 1_073_741_824, // 1GB
            max_file_count: 10_000,
            max_file_size: 104_857_600,         // 100MB
            max_input_file_size: 2_147_483_648, // 2GB
        }
    }
}

impl SecurityConfig {
    /// ペイロードサイズを検証
    pub(crate) fn check_payload_size(&self, size: usize) -> Result<(), XlsxBulkError> {
        if size > self.max_payload_size {
            return Err(XlsxBulkError::SecurityViolation(format!(
                "Payload size exceeds maximum: {} bytes (max: {} bytes)",
                size, self.max_payload_size
            )));
        }
        Ok(())
    }
}

/// ZIP内ファイルパスの検証
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.contains("..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}

/// ワークブック名をファイルパスに解決する
///
/// 絶対パスはそのまま使用し、相対パスは`root`からの相対として解決します。
/// 相対パスに`..`が含まれる場合は`root`の外を指す可能性があるため拒否します。
pub(crate) fn resolve_workbook_path(root: &Path, name: &str) -> Result<PathBuf, XlsxBulkError> {
    if name.trim().is_empty() {
        return Err(XlsxBulkError::SecurityViolation(
            "Workbook name must not be empty".to_string(),
        ));
    }

    let candidate = Path::new(name);
    if candidate.is_absolute() {
        return Ok(candidate.to_path_buf());
    }

    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir))
    {
        return Err(XlsxBulkError::SecurityViolation(format!(
            "Path traversal detected in workbook name: {}",
            name
        )));
    }

    Ok(root.join(candidate))
}
