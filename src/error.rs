use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("観測テーブルが空です: {station} {date}")]
    EmptyTable { station: String, date: NaiveDate },

    #[error("{name} の日付が不正です: '{value}'（YYYY-MM-DD 形式）")]
    InvalidDate {
        name: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("日付範囲が不正です: 開始 {start} が終了 {end} より後")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("ファイル書き込みエラー: {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV変換エラー: {destination}")]
    Csv {
        destination: String,
        #[source]
        source: csv::Error,
    },

    #[error("再試行上限: {station} {date} を {attempts} 回試行して取得できません")]
    RetryExhausted {
        station: String,
        date: NaiveDate,
        attempts: u32,
    },

    #[error("キャンセルされました")]
    Cancelled,

    #[error("通知エラー: {0}")]
    Notify(String),

    #[error("ログ初期化エラー: {0}")]
    Logging(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ArchiveError {
    /// 再取得で回復しうるエラーか（取得系のみ）
    ///
    /// ブラウザが起動できない場合は再試行しても直らないので即終了する。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArchiveError::Navigation(_)
                | ArchiveError::Timeout(_)
                | ArchiveError::ElementNotFound(_)
                | ArchiveError::EmptyTable { .. }
        )
    }
}
