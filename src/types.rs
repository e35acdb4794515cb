//! 日付範囲・観測テーブル・出力セグメントの型定義

use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::error::ArchiveError;

/// 行の先頭セルに入る日付の書式
pub const ROW_DATE_FORMAT: &str = "%m/%d/%Y";

/// 1日分のデータ行（ヘッダーと位置で対応）
pub type DataRow = Vec<String>;

/// 取得対象の日付範囲（両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ArchiveError> {
        if start > end {
            return Err(ArchiveError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// `YYYY-MM-DD` 形式の引数から範囲を作る
    pub fn parse(start: &str, end: &str) -> Result<Self, ArchiveError> {
        let start = parse_date("start", start)?;
        let end = parse_date("end", end)?;
        Self::new(start, end)
    }

    /// 開始日から終了日まで1日ずつ
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

fn parse_date(name: &'static str, value: &str) -> Result<NaiveDate, ArchiveError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|source| {
        ArchiveError::InvalidDate {
            name,
            value: value.to_string(),
            source,
        }
    })
}

/// テーブルセルの生データ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCell {
    pub text: String,
    /// セル内の単位ラベル（例: "F", "mph"）
    pub unit: Option<String>,
}

impl RawCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// 1日分の観測テーブル
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

struct TableSelectors {
    header_row: Selector,
    header_cell: Selector,
    body_row: Selector,
    cell: Selector,
    unit: Selector,
}

fn selectors() -> &'static TableSelectors {
    static SELECTORS: OnceLock<TableSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |css: &str| Selector::parse(css).expect("static selector");
        TableSelectors {
            header_row: parse("thead tr"),
            header_cell: parse("th"),
            body_row: parse("tbody tr"),
            cell: parse("td"),
            unit: parse("span"),
        }
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

impl ObservationTable {
    /// 取得した要素のouterHTMLからテーブルを組み立てる
    ///
    /// ヘッダーは最初の `thead tr` のみ。単位は各 `td` 内の最初の `span`。
    pub fn from_html(html: &str) -> Self {
        let fragment = Html::parse_fragment(html);
        let sel = selectors();

        let header: Vec<String> = fragment
            .select(&sel.header_row)
            .next()
            .map(|tr| tr.select(&sel.header_cell).map(|th| element_text(&th)).collect())
            .unwrap_or_default();

        let rows: Vec<Vec<RawCell>> = fragment
            .select(&sel.body_row)
            .map(|tr| {
                tr.select(&sel.cell)
                    .map(|td| RawCell {
                        text: element_text(&td),
                        unit: td
                            .select(&sel.unit)
                            .next()
                            .map(|span| element_text(&span).trim().to_string())
                            .filter(|unit| !unit.is_empty()),
                    })
                    .collect()
            })
            .collect();

        Self { header, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.rows.is_empty()
    }
}

/// 1か月分の蓄積結果（フラッシュ単位）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 月初日（出力ファイル名に使う）
    pub month_start: NaiveDate,
    /// 実際に取得した最初の日
    pub first_day: NaiveDate,
    /// 実際に取得した最後の日
    pub last_day: NaiveDate,
    pub header: Vec<String>,
    pub rows: Vec<DataRow>,
}

impl Segment {
    pub fn month_start_of(date: NaiveDate) -> NaiveDate {
        date.with_day(1).unwrap_or(date)
    }

    /// ヘッダーを先頭にした全行
    pub fn into_rows(self) -> Vec<Vec<String>> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(self.header);
        out.extend(self.rows);
        out
    }
}

/// 書き出したファイル
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub path: PathBuf,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub rows: usize,
}

/// 実行結果
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub station: String,
    pub range: DateRange,
    pub days: usize,
    pub files: Vec<OutputFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_days_inclusive() {
        let range = DateRange::parse("2018-01-30", "2018-02-02").unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(
            days,
            vec![
                date(2018, 1, 30),
                date(2018, 1, 31),
                date(2018, 2, 1),
                date(2018, 2, 2)
            ]
        );
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::parse("2018-03-05", "2018-03-05").unwrap();
        assert_eq!(range.days().count(), 1);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let err = DateRange::parse("2018-02-02", "2018-01-30").unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidRange { .. }));
    }

    #[test]
    fn test_unparseable_date_names_argument() {
        let err = DateRange::parse("2018-01-30", "02/02/2018").unwrap_err();
        match err {
            ArchiveError::InvalidDate { name, value, .. } => {
                assert_eq!(name, "end");
                assert_eq!(value, "02/02/2018");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_table_from_html() {
        let html = r#"
            <table id="history-observation-table">
              <thead>
                <tr><th>Time</th><th>
                  Temperature
                </th><th>Condition</th></tr>
                <tr><th>ignored</th></tr>
              </thead>
              <tbody>
                <tr>
                  <td>12:53 AM</td>
                  <td>62 <span class="wu-unit">F</span></td>
                  <td>Fair</td>
                </tr>
                <tr><td>1:53 AM</td><td>60</td><td>Cloudy</td></tr>
              </tbody>
            </table>
        "#;
        let table = ObservationTable::from_html(html);

        assert_eq!(table.header.len(), 3);
        assert_eq!(table.header[0], "Time");
        assert_eq!(table.header[1].trim(), "Temperature");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0].text, "12:53 AM");
        assert_eq!(table.rows[0][1].text, "62 F");
        assert_eq!(table.rows[0][1].unit.as_deref(), Some("F"));
        assert_eq!(table.rows[1][1].unit, None);
        assert_eq!(table.rows[1][2].text, "Cloudy");
    }

    #[test]
    fn test_table_from_empty_html() {
        assert!(ObservationTable::from_html("").is_empty());
    }

    #[test]
    fn test_segment_rows_header_first() {
        let segment = Segment {
            month_start: date(2018, 1, 1),
            first_day: date(2018, 1, 30),
            last_day: date(2018, 1, 31),
            header: vec!["Date".into(), "Temp (F)".into()],
            rows: vec![vec!["01/30/2018".into(), "62".into()]],
        };
        let rows = segment.into_rows();
        assert_eq!(rows[0], vec!["Date", "Temp (F)"]);
        assert_eq!(rows[1], vec!["01/30/2018", "62"]);
    }
}
