use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{self, ArchiveConfig, OBSERVATION_TABLE_ID};
use crate::error::ArchiveError;
use crate::traits::PageFetcher;
use crate::types::ObservationTable;

/// 要素ポーリングの間隔（ミリ秒）
const ELEMENT_POLL_INTERVAL_MS: u64 = 500;

/// ブラウザプロセス終了待ちの上限
const EXIT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// chromiumoxide で観測テーブルを取得する
#[derive(Debug, Clone)]
pub struct ChromeFetcher {
    url_template: String,
    headless: bool,
    timeout: Duration,
    chrome_executable: Option<PathBuf>,
}

impl ChromeFetcher {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            url_template: config.url_template.clone(),
            headless: config.headless,
            timeout: config.timeout,
            chrome_executable: config.resolved_chrome_executable(),
        }
    }

    fn browser_config(&self, profile: &TempDir) -> Result<BrowserConfig, ArchiveError> {
        let mut builder = BrowserConfig::builder().user_data_dir(profile.path());

        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if !self.headless {
            builder = builder.with_head();
        }

        builder
            .no_sandbox()
            .request_timeout(self.timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .build()
            .map_err(ArchiveError::BrowserInit)
    }

    /// ページを開いて観測テーブルの outerHTML を返す
    async fn load_table(
        &self,
        browser: &Browser,
        station: &str,
        date: NaiveDate,
    ) -> Result<String, ArchiveError> {
        let url = config::page_url(&self.url_template, station, date);
        debug!("Opening {}", url);

        let page = browser
            .new_page(url.as_str())
            .await
            .map_err(|e| ArchiveError::Navigation(format!("{url}: {e}")))?;

        let selector = format!("#{OBSERVATION_TABLE_ID}");
        let element = tokio::time::timeout(self.timeout, wait_for_element(&page, &selector))
            .await
            .map_err(|_| {
                ArchiveError::Timeout(format!(
                    "{selector} did not appear within {:?}",
                    self.timeout
                ))
            })?;

        let html = element
            .outer_html()
            .await
            .map_err(|e| ArchiveError::ElementNotFound(format!("{selector}: {e}")))?
            .unwrap_or_default();

        Ok(html)
    }
}

/// 要素が見つかるまでポーリング（上限は呼び出し側の timeout）
async fn wait_for_element(page: &Page, selector: &str) -> Element {
    loop {
        match page.find_element(selector).await {
            Ok(element) => return element,
            Err(e) => debug!("Waiting for {}: {}", selector, e),
        }
        sleep(Duration::from_millis(ELEMENT_POLL_INTERVAL_MS)).await;
    }
}

/// 終了待ちに上限をかける。時間内に終わらなければ `false`
async fn wait_bounded<W, T, E>(exit: W, limit: Duration) -> bool
where
    W: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(limit, exit).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Failed to wait for browser exit: {}", e);
            true
        }
        Err(_) => false,
    }
}

/// 1回の試行分のブラウザ
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

impl BrowserSession {
    async fn launch(fetcher: &ChromeFetcher) -> Result<Self, ArchiveError> {
        let profile = tempfile::Builder::new()
            .prefix("wunderground-archive-")
            .tempdir()
            .map_err(|e| ArchiveError::BrowserInit(format!("profile directory: {e}")))?;
        let config = fetcher.browser_config(&profile)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ArchiveError::BrowserInit(e.to_string()))?;

        // ハンドラータスクを起動
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        Ok(Self {
            browser,
            handler,
            _profile: profile,
        })
    }

    async fn teardown(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser, killing it: {}", e);
            self.kill().await;
        }
        if !wait_bounded(self.browser.wait(), EXIT_WAIT_TIMEOUT).await {
            warn!("Browser did not exit within {:?}, killing it", EXIT_WAIT_TIMEOUT);
            self.kill().await;
        }
        self.handler.abort();
    }

    async fn kill(&mut self) {
        if let Some(Err(e)) = self.browser.kill().await {
            debug!("Failed to kill browser: {}", e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(
        &mut self,
        station: &str,
        date: NaiveDate,
    ) -> Result<ObservationTable, ArchiveError> {
        let mut session = BrowserSession::launch(self).await?;
        let result = self.load_table(&session.browser, station, date).await;
        session.teardown().await;
        drop(session);

        let html = result?;
        if html.trim().is_empty() {
            return Err(ArchiveError::EmptyTable {
                station: station.to_string(),
                date,
            });
        }

        let table = ObservationTable::from_html(&html);
        if table.is_empty() {
            return Err(ArchiveError::EmptyTable {
                station: station.to_string(),
                date,
            });
        }
        info!(
            "Fetched {} observation rows for {} on {}",
            table.rows.len(),
            station,
            date
        );
        Ok(table)
    }
}
