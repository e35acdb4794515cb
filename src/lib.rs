//! Weather Underground 観測履歴スクレイパー
//!
//! - 観測地点の日別観測テーブルをブラウザで取得（内容が出るまで再試行）
//! - テーブルをヘッダー + データ行に正規化（12時間表記 → 24時間表記、単位はヘッダーへ）
//! - 月が替わるたびに、その月の分を1ファイルに書き出す
//!
//! # 使用例
//!
//! ```rust,ignore
//! use wunderground_archive::{ArchiveRequest, ArchiveService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ArchiveService::default();
//!
//!     let request = ArchiveRequest::new("KCACAMPO13", "2018-01-30", "2018-02-02")
//!         .with_output_dir("./archive");
//!
//!     let report = service.call(request).await.unwrap();
//!     println!("files: {:?}", report.files);
//! }
//! ```
//!
//! # 取得器・書き出し先を差し替える例
//!
//! ```rust,ignore
//! use wunderground_archive::{ArchiveRunner, ChromeFetcher, CsvTableWriter, ArchiveConfig, DateRange};
//!
//! let config = ArchiveConfig::new("KCACAMPO13");
//! let mut runner = ArchiveRunner::new(
//!     &config.station_id,
//!     ChromeFetcher::new(&config),
//!     CsvTableWriter::new("./archive"),
//! );
//! let report = runner.run(DateRange::parse("2018-01-30", "2018-02-02")?).await?;
//! ```

pub mod accumulator;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod parse;
pub mod retry;
pub mod runner;
pub mod service;
pub mod traits;
pub mod types;
pub mod writer;
pub mod wunderground;

// 主要な型をリエクスポート
pub use accumulator::MonthAccumulator;
pub use config::{ArchiveConfig, SmtpSettings};
pub use error::ArchiveError;
pub use notify::{SmtpNotifier, TracingNotifier};
pub use parse::{Header, RowParser};
pub use retry::{Backoff, RetryPolicy};
pub use runner::ArchiveRunner;
pub use service::{ArchiveRequest, ArchiveService};
pub use traits::{Notifier, PageFetcher, TableWriter};
pub use types::{ArchiveReport, DateRange, ObservationTable, OutputFile, Segment};
pub use writer::CsvTableWriter;
pub use wunderground::ChromeFetcher;

// キャンセル用トークン
pub use tokio_util::sync::CancellationToken;
