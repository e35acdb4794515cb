//! 月単位の蓄積と月替わり検知

use chrono::{Datelike, NaiveDate};

use crate::parse::{Header, RowParser, DATE_COLUMN};
use crate::types::{DataRow, ObservationTable, Segment, ROW_DATE_FORMAT};

#[derive(Debug, Default)]
pub struct MonthAccumulator {
    month: Option<(i32, u32)>,
    first_day: Option<NaiveDate>,
    last_day: Option<NaiveDate>,
    header: Header,
    rows: Vec<DataRow>,
}

impl MonthAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `date` が現在のセグメントと別の月か
    pub fn crosses_boundary(&self, date: NaiveDate) -> bool {
        self.month
            .is_some_and(|month| month != (date.year(), date.month()))
    }

    /// 1日分のテーブルを取り込む
    ///
    /// 月が替わった場合は前月のセグメントを返してから新しいセグメントで取り込む。
    pub fn ingest(
        &mut self,
        date: NaiveDate,
        table: &ObservationTable,
        parser: &RowParser,
    ) -> Option<Segment> {
        let flushed = if self.crosses_boundary(date) {
            self.snapshot_and_reset()
        } else {
            None
        };

        self.month = Some((date.year(), date.month()));
        self.first_day.get_or_insert(date);
        self.last_day = Some(date);

        if self.header.is_empty() {
            self.header.populate(parser.parse_header(table));
        }
        let formatted = date.format(ROW_DATE_FORMAT).to_string();
        let rows = parser.parse_rows(table, &formatted, &mut self.header);
        self.rows.extend(rows);

        flushed
    }

    /// 現在のセグメントを取り出して状態をリセットする
    pub fn snapshot_and_reset(&mut self) -> Option<Segment> {
        let state = std::mem::take(self);
        let (first_day, last_day) = (state.first_day?, state.last_day?);
        Some(Segment {
            month_start: Segment::month_start_of(first_day),
            first_day,
            last_day,
            header: match state.header {
                Header::Empty => vec![DATE_COLUMN.to_string()],
                Header::Populated(columns) | Header::UnitsAttached(columns) => columns,
            },
            rows: state.rows,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.first_day.is_none()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawCell;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day_table(temp: &str) -> ObservationTable {
        ObservationTable {
            header: vec!["Time".into(), "Temperature".into()],
            rows: vec![vec![
                RawCell::new("12:53 AM"),
                RawCell::new(format!("{temp} F")).with_unit("F"),
            ]],
        }
    }

    #[test]
    fn test_same_month_accumulates() {
        let parser = RowParser::new();
        let mut acc = MonthAccumulator::new();

        assert!(acc.ingest(date(2018, 1, 30), &day_table("62"), &parser).is_none());
        assert!(acc.ingest(date(2018, 1, 31), &day_table("60"), &parser).is_none());

        assert_eq!(acc.row_count(), 2);
        assert_eq!(acc.header().columns(), &["Date", "Time", "Temperature (F)"]);
    }

    #[test]
    fn test_month_boundary_flushes_prior_segment() {
        let parser = RowParser::new();
        let mut acc = MonthAccumulator::new();
        acc.ingest(date(2018, 1, 30), &day_table("62"), &parser);
        acc.ingest(date(2018, 1, 31), &day_table("60"), &parser);

        assert!(acc.crosses_boundary(date(2018, 2, 1)));
        let segment = acc
            .ingest(date(2018, 2, 1), &day_table("58"), &parser)
            .expect("january segment");

        assert_eq!(segment.month_start, date(2018, 1, 1));
        assert_eq!(segment.first_day, date(2018, 1, 30));
        assert_eq!(segment.last_day, date(2018, 1, 31));
        assert_eq!(segment.rows.len(), 2);
        assert_eq!(segment.rows[0], vec!["01/30/2018", "00:53", "62"]);

        // 新しいセグメントは2月の1行だけ、ヘッダーも作り直し
        assert_eq!(acc.row_count(), 1);
        assert_eq!(acc.header().columns(), &["Date", "Time", "Temperature (F)"]);
    }

    #[test]
    fn test_same_month_different_year_is_boundary() {
        let parser = RowParser::new();
        let mut acc = MonthAccumulator::new();
        acc.ingest(date(2017, 1, 31), &day_table("62"), &parser);

        assert!(acc.crosses_boundary(date(2018, 1, 31)));
    }

    #[test]
    fn test_snapshot_resets_state() {
        let parser = RowParser::new();
        let mut acc = MonthAccumulator::new();
        acc.ingest(date(2018, 2, 1), &day_table("58"), &parser);

        let rows = acc.snapshot_and_reset().unwrap().into_rows();
        assert_eq!(rows[0], vec!["Date", "Time", "Temperature (F)"]);
        assert_eq!(rows.len(), 2);

        assert!(acc.is_empty());
        assert!(acc.header().is_empty());
        assert!(acc.snapshot_and_reset().is_none());
    }

    #[test]
    fn test_header_only_day_still_opens_segment() {
        let parser = RowParser::new();
        let mut acc = MonthAccumulator::new();
        let empty_body = ObservationTable {
            header: vec!["Time".into(), "Temperature".into()],
            rows: vec![],
        };
        acc.ingest(date(2018, 2, 1), &empty_body, &parser);
        acc.ingest(date(2018, 2, 2), &day_table("58"), &parser);

        // 2日目のセルで単位が付く（ヘッダーは1日目のまま）
        assert_eq!(acc.header().columns(), &["Date", "Time", "Temperature (F)"]);
        assert_eq!(acc.row_count(), 1);
    }
}
