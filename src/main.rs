use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tower::Service;
use tracing::warn;

use wunderground_archive::config::{
    DEFAULT_FILE_PREFIX, DEFAULT_NOTIFY_SENDER, DEFAULT_URL_TEMPLATE,
};
use wunderground_archive::{
    logging, ArchiveConfig, ArchiveRequest, ArchiveService, Backoff, CancellationToken,
    DateRange, RetryPolicy, SmtpSettings,
};

/// Scrape daily Weather Underground history tables into one CSV per month.
#[derive(Parser, Debug)]
#[command(name = "wunderground-archive", version)]
struct Args {
    /// Weather station id (e.g. KCACAMPO13)
    station: String,

    /// First day, YYYY-MM-DD
    start: String,

    /// Last day (inclusive), YYYY-MM-DD
    end: String,

    /// Directory for the monthly files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// File name prefix
    #[arg(long, default_value = DEFAULT_FILE_PREFIX)]
    prefix: String,

    /// History page URL with {station} and {date} placeholders
    #[arg(long, default_value = DEFAULT_URL_TEMPLATE)]
    url_template: String,

    /// Seconds to wait for the observation table per attempt
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Give up on a day after this many attempts (default: never)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Fixed delay between attempts
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Chrome/Chromium executable (default: CHROME_PATH, CHROMIUM_PATH, or auto-detect)
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Also append log lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Completion notice recipient (repeatable); mailed when --smtp-server is set
    #[arg(long = "notify")]
    notify: Vec<String>,

    /// SMTP server for completion notices (without it, notices are only logged)
    #[arg(long)]
    smtp_server: Option<String>,

    /// SMTP port (default: transport default)
    #[arg(long, requires = "smtp_server")]
    smtp_port: Option<u16>,

    /// SMTP login; the password is read from SMTP_PASSWORD
    #[arg(long, requires = "smtp_server")]
    smtp_user: Option<String>,

    /// Sender address for completion notices
    #[arg(long, default_value = DEFAULT_NOTIFY_SENDER)]
    smtp_from: String,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::unlimited();
        if let Some(max) = self.max_attempts {
            policy = policy.with_max_attempts(max);
        }
        if let Some(ms) = self.retry_delay_ms {
            policy = policy.with_backoff(Backoff::Fixed(Duration::from_millis(ms)));
        }
        policy
    }

    fn config(&self) -> ArchiveConfig {
        let mut config = ArchiveConfig::new(&self.station)
            .with_url_template(&self.url_template)
            .with_output_dir(&self.output_dir)
            .with_file_prefix(&self.prefix)
            .with_headless(!self.headful)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry(self.retry_policy())
            .with_notify_recipients(self.notify.clone());
        if let Some(chrome) = &self.chrome {
            config = config.with_chrome_executable(chrome);
        }
        if let Some(smtp) = self.smtp() {
            config = config.with_smtp(smtp);
        }
        config
    }

    fn smtp(&self) -> Option<SmtpSettings> {
        let server = self.smtp_server.as_ref()?;
        let mut smtp = SmtpSettings::new(server).with_sender(&self.smtp_from);
        if let Some(port) = self.smtp_port {
            smtp = smtp.with_port(port);
        }
        if let Some(user) = &self.smtp_user {
            let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
            smtp = smtp.with_credentials(user, password);
        }
        Some(smtp)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 取得を始める前に引数を検証
    DateRange::parse(&args.start, &args.end)?;

    logging::init(args.log_file.as_deref()).context("failed to initialise logging")?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current attempt");
            trigger.cancel();
        }
    });

    let mut service = ArchiveService::new(args.config()).with_cancellation(cancel);
    let request = ArchiveRequest::new(&args.station, &args.start, &args.end)
        .with_output_dir(&args.output_dir)
        .with_headless(!args.headful);

    let report = service
        .call(request)
        .await
        .with_context(|| format!("archive run for {} failed", args.station))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for file in &report.files {
            println!("{}", file.path.display());
        }
    }

    Ok(())
}
