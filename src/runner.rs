//! 日付範囲を1日ずつ処理し、月替わりと最後に月別ファイルを書き出す

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::accumulator::MonthAccumulator;
use crate::config::DEFAULT_FILE_PREFIX;
use crate::error::ArchiveError;
use crate::parse::RowParser;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::traits::{PageFetcher, TableWriter};
use crate::types::{ArchiveReport, DateRange, OutputFile, Segment};

pub struct ArchiveRunner<F, W> {
    station: String,
    fetcher: F,
    writer: W,
    parser: RowParser,
    retry: RetryPolicy,
    cancel: CancellationToken,
    file_prefix: String,
    extension: String,
}

impl<F, W> ArchiveRunner<F, W>
where
    F: PageFetcher,
    W: TableWriter,
{
    pub fn new(station: impl Into<String>, fetcher: F, writer: W) -> Self {
        Self {
            station: station.into(),
            fetcher,
            writer,
            parser: RowParser::new(),
            retry: RetryPolicy::unlimited(),
            cancel: CancellationToken::new(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            extension: "csv".to_string(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// `<prefix>_<station>_<YYYYMMDD>to<YYYYMMDD>.<ext>`
    pub fn destination_name(&self, month_start: NaiveDate, last_day: NaiveDate) -> String {
        format!(
            "{}_{}_{}to{}.{}",
            self.file_prefix,
            self.station,
            month_start.format("%Y%m%d"),
            last_day.format("%Y%m%d"),
            self.extension
        )
    }

    /// 範囲全体を処理する
    pub async fn run(&mut self, range: DateRange) -> Result<ArchiveReport, ArchiveError> {
        info!(
            "Archiving weather station {} from {} to {}",
            self.station, range.start, range.end
        );

        let mut accumulator = MonthAccumulator::new();
        let mut files = Vec::new();
        let mut days = 0;

        for date in range.days() {
            if let Some(file) = self.step(&mut accumulator, date).await? {
                files.push(file);
            }
            days += 1;
        }

        // 残りを最後に書き出す（1日分しかなくても書く）
        if let Some(segment) = accumulator.snapshot_and_reset() {
            files.push(self.flush(segment, range.end)?);
        }

        info!(
            " -- DONE -- {} days, {} files for {}",
            days,
            files.len(),
            self.station
        );

        Ok(ArchiveReport {
            station: self.station.clone(),
            range,
            days,
            files,
        })
    }

    /// 1日分: 取得 → 取り込み。月が替わったら前月分を書き出す
    pub async fn step(
        &mut self,
        accumulator: &mut MonthAccumulator,
        date: NaiveDate,
    ) -> Result<Option<OutputFile>, ArchiveError> {
        let table = fetch_with_retry(
            &mut self.fetcher,
            &self.retry,
            &self.cancel,
            &self.station,
            date,
        )
        .await?;

        match accumulator.ingest(date, &table, &self.parser) {
            Some(segment) => {
                let last_day = segment.last_day;
                self.flush(segment, last_day).map(Some)
            }
            None => Ok(None),
        }
    }

    fn flush(&self, segment: Segment, last_day: NaiveDate) -> Result<OutputFile, ArchiveError> {
        let destination = self.destination_name(segment.month_start, last_day);
        info!(
            "Flushing cache to CSV for {} to {} ({} observed from {})",
            segment.month_start, last_day, segment.rows.len(), segment.first_day
        );

        let first_day = segment.first_day;
        let rows = segment.rows.len();
        let path = self.writer.write(&segment.into_rows(), &destination)?;

        Ok(OutputFile {
            path,
            first_day,
            last_day,
            rows,
        })
    }
}
