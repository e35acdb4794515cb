use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{info, warn};

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::notify;
use crate::runner::ArchiveRunner;
use crate::traits::Notifier;
use crate::types::{ArchiveReport, DateRange};
use crate::wunderground::ChromeFetcher;

/// アーカイブ取得リクエスト
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub station_id: String,
    pub start: String,
    pub end: String,
    pub output_dir: PathBuf,
    pub headless: bool,
}

impl ArchiveRequest {
    pub fn new(
        station_id: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            start: start.into(),
            end: end.into(),
            output_dir: PathBuf::from("."),
            headless: true,
        }
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn range(&self) -> Result<DateRange, ArchiveError> {
        DateRange::parse(&self.start, &self.end)
    }
}

impl From<ArchiveRequest> for ArchiveConfig {
    fn from(req: ArchiveRequest) -> Self {
        ArchiveConfig::new(req.station_id)
            .with_output_dir(req.output_dir)
            .with_headless(req.headless)
    }
}

/// tower::Serviceを実装したアーカイブサービス
#[derive(Clone)]
pub struct ArchiveService {
    base: ArchiveConfig,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
}

impl Default for ArchiveService {
    fn default() -> Self {
        Self::new(ArchiveConfig::default())
    }
}

impl ArchiveService {
    /// `base` のブラウザ・リトライ・通知設定をリクエストに引き継ぐ
    pub fn new(base: ArchiveConfig) -> Self {
        Self {
            notifier: notify::notifier_for(&base),
            base,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn config_for(&self, req: ArchiveRequest) -> ArchiveConfig {
        let request: ArchiveConfig = req.into();
        ArchiveConfig {
            station_id: request.station_id,
            output_dir: request.output_dir,
            headless: request.headless,
            ..self.base.clone()
        }
    }
}

/// 完了通知（失敗しても実行結果には影響させない）
fn notify_completion(notifier: &dyn Notifier, recipients: &[String], report: &ArchiveReport) {
    if recipients.is_empty() {
        return;
    }
    let subject = format!(
        "Weather archive for {} ({} to {})",
        report.station, report.range.start, report.range.end
    );
    let body = report
        .files
        .iter()
        .map(|f| format!("{} to {}: {} rows", f.first_day, f.last_day, f.rows))
        .collect::<Vec<_>>()
        .join("\n");
    let attachments: Vec<&Path> = report.files.iter().map(|f| f.path.as_path()).collect();

    if let Err(e) = notifier.send(recipients, &subject, &body, &attachments) {
        warn!("Failed to send completion notice: {}", e);
    }
}

impl Service<ArchiveRequest> for ArchiveService {
    type Response = ArchiveReport;
    type Error = ArchiveError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ArchiveRequest) -> Self::Future {
        info!(
            "Archive request received: station={} {}..{}",
            req.station_id, req.start, req.end
        );

        let notifier = Arc::clone(&self.notifier);
        let cancel = self.cancel.clone();
        let range = req.range();
        let config = self.config_for(req);

        Box::pin(async move {
            // 不正な日付は取得前に弾く
            let range = range?;

            let fetcher = ChromeFetcher::new(&config);
            let writer = crate::writer::CsvTableWriter::new(&config.output_dir);
            let mut runner = ArchiveRunner::new(&config.station_id, fetcher, writer)
                .with_retry_policy(config.retry)
                .with_cancellation(cancel)
                .with_file_prefix(&config.file_prefix);

            let report = runner.run(range).await?;

            info!(
                "Archive complete: station={}, files={}",
                report.station,
                report.files.len()
            );
            // SMTP 送信はブロッキングなので専用スレッドで
            let recipients = config.notify_recipients.clone();
            let notice = report.clone();
            let sent = tokio::task::spawn_blocking(move || {
                notify_completion(notifier.as_ref(), &recipients, &notice)
            })
            .await;
            if let Err(e) = sent {
                warn!("Completion notice task failed: {}", e);
            }

            Ok(report)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::NaiveDate;

    use crate::retry::RetryPolicy;
    use crate::types::OutputFile;

    #[test]
    fn test_archive_request_builder() {
        let req = ArchiveRequest::new("KCACAMPO13", "2018-01-30", "2018-02-02")
            .with_output_dir("/tmp/wx")
            .with_headless(false);

        assert_eq!(req.station_id, "KCACAMPO13");
        assert_eq!(req.output_dir, PathBuf::from("/tmp/wx"));
        assert!(!req.headless);
        assert_eq!(req.range().unwrap().days().count(), 4);
    }

    #[test]
    fn test_request_inherits_base_config() {
        let base = ArchiveConfig::default()
            .with_timeout(Duration::from_secs(12))
            .with_retry(RetryPolicy::unlimited().with_max_attempts(4));
        let service = ArchiveService::new(base);

        let config = service.config_for(
            ArchiveRequest::new("KCACAMPO13", "2018-01-30", "2018-02-02").with_output_dir("out"),
        );

        assert_eq!(config.station_id, "KCACAMPO13");
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.retry.max_attempts, Some(4));
    }

    #[tokio::test]
    async fn test_invalid_range_rejected_before_fetch() {
        let mut service = ArchiveService::default();
        let err = service
            .call(ArchiveRequest::new("KCACAMPO13", "2018-02-02", "2018-01-30"))
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::InvalidRange { .. }));
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(Vec<String>, String, usize)>>,
    }

    impl Notifier for RecordingNotifier {
        fn send(
            &self,
            recipients: &[String],
            subject: &str,
            _body: &str,
            attachments: &[&Path],
        ) -> Result<(), ArchiveError> {
            self.sent.lock().unwrap().push((
                recipients.to_vec(),
                subject.to_string(),
                attachments.len(),
            ));
            Err(ArchiveError::Notify("smtp unavailable".into()))
        }
    }

    #[test]
    fn test_completion_notice_failure_is_swallowed() {
        let notifier = RecordingNotifier::default();
        let day = NaiveDate::from_ymd_opt(2018, 1, 31).unwrap();
        let report = ArchiveReport {
            station: "KCACAMPO13".into(),
            range: DateRange::new(day, day).unwrap(),
            days: 1,
            files: vec![OutputFile {
                path: PathBuf::from("wunderground_KCACAMPO13_20180101to20180131.csv"),
                first_day: day,
                last_day: day,
                rows: 24,
            }],
        };

        notify_completion(&notifier, &["ops@example.com".to_string()], &report);
        notify_completion(&notifier, &[], &report);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Weather archive for KCACAMPO13 (2018-01-31 to 2018-01-31)");
        assert_eq!(sent[0].2, 1);
    }
}
