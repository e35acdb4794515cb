use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::retry::RetryPolicy;

/// 日別観測履歴ページのURL（`{station}` と `{date}` を置換）
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://www.wunderground.com/history/daily/us/ca/campo/{station}/date/{date}";

/// 観測テーブル要素のID
pub const OBSERVATION_TABLE_ID: &str = "history-observation-table";

pub const DEFAULT_FILE_PREFIX: &str = "wunderground";

/// 完了通知の送信元（未指定時）
pub const DEFAULT_NOTIFY_SENDER: &str = "wunderground-archive@localhost";

/// 完了通知を送る SMTP サーバー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub server: String,
    /// 未指定ならトランスポートの既定ポート
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: String,
}

impl SmtpSettings {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: None,
            username: None,
            password: None,
            sender: DEFAULT_NOTIFY_SENDER.to_string(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub station_id: String,
    pub url_template: String,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub headless: bool,
    /// 観測テーブルが現れるまでの待機上限
    pub timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub notify_recipients: Vec<String>,
    /// 未設定なら通知はログに出すだけ
    pub smtp: Option<SmtpSettings>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            station_id: String::new(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            output_dir: PathBuf::from("."),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            headless: true,
            timeout: Duration::from_secs(30),
            chrome_executable: None,
            retry: RetryPolicy::unlimited(),
            notify_recipients: Vec::new(),
            smtp: None,
        }
    }
}

impl ArchiveConfig {
    pub fn new(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            ..Default::default()
        }
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_notify_recipients(mut self, recipients: Vec<String>) -> Self {
        self.notify_recipients = recipients;
        self
    }

    pub fn with_smtp(mut self, smtp: SmtpSettings) -> Self {
        self.smtp = Some(smtp);
        self
    }

    /// Chrome パス（未指定なら CHROME_PATH / CHROMIUM_PATH 環境変数）
    pub fn resolved_chrome_executable(&self) -> Option<PathBuf> {
        self.chrome_executable.clone().or_else(|| {
            std::env::var_os("CHROME_PATH")
                .or_else(|| std::env::var_os("CHROMIUM_PATH"))
                .map(PathBuf::from)
        })
    }

    pub fn page_url(&self, date: NaiveDate) -> String {
        page_url(&self.url_template, &self.station_id, date)
    }
}

pub fn page_url(template: &str, station: &str, date: NaiveDate) -> String {
    template
        .replace("{station}", station)
        .replace("{date}", &date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;

    #[test]
    fn test_config_builder() {
        let config = ArchiveConfig::new("KCACAMPO13")
            .with_headless(false)
            .with_output_dir("/tmp/archive")
            .with_timeout(Duration::from_secs(45))
            .with_retry(RetryPolicy::unlimited().with_max_attempts(5))
            .with_chrome_executable("/usr/bin/chromium");

        assert_eq!(config.station_id, "KCACAMPO13");
        assert!(!config.headless);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/archive"));
        assert_eq!(config.timeout, Duration::from_secs(45));
        assert_eq!(config.retry.max_attempts, Some(5));
        assert_eq!(config.retry.backoff, Backoff::None);
        assert_eq!(
            config.resolved_chrome_executable(),
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }

    #[test]
    fn test_default_timeout_and_retry() {
        let config = ArchiveConfig::new("KCACAMPO13");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry, RetryPolicy::unlimited());
        assert_eq!(config.file_prefix, "wunderground");
    }

    #[test]
    fn test_smtp_settings() {
        let config = ArchiveConfig::new("KCACAMPO13").with_smtp(
            SmtpSettings::new("smtp.example.com")
                .with_port(587)
                .with_credentials("archiver", "secret"),
        );

        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.server, "smtp.example.com");
        assert_eq!(smtp.port, Some(587));
        assert_eq!(smtp.username.as_deref(), Some("archiver"));
        assert_eq!(smtp.sender, DEFAULT_NOTIFY_SENDER);
        assert!(ArchiveConfig::default().smtp.is_none());
    }

    #[test]
    fn test_page_url() {
        let config = ArchiveConfig::new("KCACAMPO13");
        let date = NaiveDate::from_ymd_opt(2018, 1, 30).unwrap();
        assert_eq!(
            config.page_url(date),
            "https://www.wunderground.com/history/daily/us/ca/campo/KCACAMPO13/date/2018-01-30"
        );
    }
}
