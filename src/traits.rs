use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ArchiveError;
use crate::types::ObservationTable;

#[async_trait]
pub trait PageFetcher: Send {
    /// 1回分の取得（セッションの起動から破棄まで）
    async fn fetch(
        &mut self,
        station: &str,
        date: NaiveDate,
    ) -> Result<ObservationTable, ArchiveError>;
}

pub trait TableWriter: Send + Sync {
    /// ヘッダー先頭の行列を `destination` に書き出し、書いたパスを返す
    fn write(&self, rows: &[Vec<String>], destination: &str) -> Result<PathBuf, ArchiveError>;
}

pub trait Notifier: Send + Sync {
    /// 通知送信
    fn send(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
        attachments: &[&Path],
    ) -> Result<(), ArchiveError>;
}
