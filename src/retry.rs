//! 取得リトライ
//!
//! 既定は無制限・待機なし。上限回数・経過時間・待機間隔は `RetryPolicy` で指定し、
//! キャンセルは試行の境目と待機中に確認する。

use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ArchiveError;
use crate::logging::CONSOLE_ONLY_TARGET;
use crate::traits::PageFetcher;
use crate::types::ObservationTable;

/// 試行間の待機
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    #[default]
    None,
    Fixed(Duration),
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// `attempt` 回目（1始まり）の失敗後の待機時間
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub max_elapsed: Option<Duration>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// 成功するまで試行し続ける
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = Some(elapsed);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn exhausted(&self, attempts: u32, started: Instant) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.max_elapsed.is_some_and(|max| started.elapsed() >= max)
    }
}

/// テーブルが取れるまで `fetcher` を呼び直す
pub async fn fetch_with_retry<F>(
    fetcher: &mut F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    station: &str,
    date: NaiveDate,
) -> Result<ObservationTable, ArchiveError>
where
    F: PageFetcher + ?Sized,
{
    let started = Instant::now();
    let mut attempt: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }

        if attempt == 1 {
            info!("Getting day {} for weather station {}", date, station);
        } else {
            info!(
                target: CONSOLE_ONLY_TARGET,
                "Getting day {} for weather station {} (attempt #{})",
                date,
                station,
                attempt
            );
        }

        match fetcher.fetch(station, date).await {
            Ok(table) => return Ok(table),
            Err(e) if e.is_retryable() => {
                warn!("Attempt {} for {} failed: {}", attempt, date, e);
                if policy.exhausted(attempt, started) {
                    return Err(ArchiveError::RetryExhausted {
                        station: station.to_string(),
                        date,
                        attempts: attempt,
                    });
                }
            }
            Err(e) => return Err(e),
        }

        let delay = policy.backoff.delay(attempt);
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ArchiveError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
        attempt += 1;
    }
}
