//! ログ初期化
//!
//! 標準出力に加えて、ファイル指定があれば追記モードで同じ内容を書く。
//! ターゲットが [`CONSOLE_ONLY_TARGET`] のイベントは標準出力にだけ出す。

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ArchiveError;

/// 既定のフィルタ（RUST_LOG があればそちらを優先）
pub const DEFAULT_DIRECTIVES: &str = "info";

/// ログファイルには書かないイベントのターゲット
pub const CONSOLE_ONLY_TARGET: &str = "console";

pub fn build(
    directives: &str,
    log_file: Option<&Path>,
) -> Result<impl Subscriber + Send + Sync + 'static, ArchiveError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter_fn(|meta| meta.target() != CONSOLE_ONLY_TARGET)),
            )
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer))
}

pub fn init(log_file: Option<&Path>) -> Result<(), ArchiveError> {
    build(DEFAULT_DIRECTIVES, log_file)?
        .try_init()
        .map_err(|e| ArchiveError::Logging(e.to_string()))
}
