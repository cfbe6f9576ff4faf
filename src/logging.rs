//! Logging Module
//!
//! `tracing`のサブスクライバーを初期化するヘルパー。
//! ライブラリ自身はイベントを発行するだけで、サブスクライバーの設定は
//! アプリケーション側（またはテスト）で行います。

use tracing_subscriber::{fmt, EnvFilter};

/// ログ出力を初期化する
///
/// 環境変数`RUST_LOG`でレベルを指定できます（デフォルト: `info`）。
/// 例: `RUST_LOG=xlsxbulk=debug`
///
/// ```rust,no_run
/// xlsxbulk::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// テスト用のログ出力を初期化する
///
/// 複数回呼び出しても安全です。
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("xlsxbulk=debug"))
        .with_test_writer()
        .try_init();
}
