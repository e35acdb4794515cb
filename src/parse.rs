//! 観測テーブル → ヘッダー + データ行 への変換

use chrono::NaiveTime;

use crate::types::{DataRow, ObservationTable};

/// ヘッダー先頭の日付列名
pub const DATE_COLUMN: &str = "Date";

/// セグメントのヘッダー
///
/// `Empty → Populated → UnitsAttached` の順にしか遷移しない。
/// 順序違反は `assert!` で即座に落とす。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Header {
    #[default]
    Empty,
    Populated(Vec<String>),
    UnitsAttached(Vec<String>),
}

impl Header {
    pub fn is_empty(&self) -> bool {
        matches!(self, Header::Empty)
    }

    /// 単位の付与をまだ受け付けるか
    pub fn accepts_units(&self) -> bool {
        matches!(self, Header::Populated(_))
    }

    pub fn columns(&self) -> &[String] {
        match self {
            Header::Empty => &[],
            Header::Populated(columns) | Header::UnitsAttached(columns) => columns,
        }
    }

    pub fn populate(&mut self, columns: Vec<String>) {
        assert!(self.is_empty(), "header populated twice in one segment");
        assert!(
            columns.first().map(String::as_str) == Some(DATE_COLUMN),
            "header must start with the {DATE_COLUMN} column"
        );
        *self = Header::Populated(columns);
    }

    /// 列名に " (<unit>)" を付ける。変更があれば `true`
    ///
    /// 同じ単位が既に付いている列、範囲外の列、単位確定後は何もしない。
    pub fn attach_unit(&mut self, index: usize, unit: &str) -> bool {
        match self {
            Header::Empty => panic!("units attached before the header was populated"),
            Header::UnitsAttached(_) => false,
            Header::Populated(columns) => {
                let Some(column) = columns.get_mut(index) else {
                    return false;
                };
                let suffix = format!(" ({unit})");
                if column.ends_with(&suffix) {
                    return false;
                }
                column.push_str(&suffix);
                true
            }
        }
    }

    pub fn mark_units_attached(&mut self) {
        match std::mem::take(self) {
            Header::Populated(columns) => *self = Header::UnitsAttached(columns),
            other => {
                *self = other;
                panic!("units marked attached from state {}", self.state_name());
            }
        }
    }

    fn state_name(&self) -> &'static str {
        match self {
            Header::Empty => "Empty",
            Header::Populated(_) => "Populated",
            Header::UnitsAttached(_) => "UnitsAttached",
        }
    }
}

/// 本文中に紛れ込んだヘッダー行の判定
///
/// 値に "time" を含む行をヘッダーの繰り返しとみなす（互換のための経験則）。
pub fn is_inline_header(value: &str) -> bool {
    value.to_lowercase().contains("time")
}

/// セル文字列を1つの値に正規化する
///
/// 2番目のトークンが AM/PM なら24時間表記 "HH:MM" に変換し、
/// それ以外は最初のトークンだけを残す（単位トークンは捨てる）。
pub fn normalize_cell(text: &str) -> String {
    let mut tokens = text.split_whitespace();
    let first = tokens.next().unwrap_or_default();
    match tokens.next() {
        Some(meridiem)
            if meridiem.eq_ignore_ascii_case("am") || meridiem.eq_ignore_ascii_case("pm") =>
        {
            to_24_hour(first, meridiem)
        }
        _ => first.to_string(),
    }
}

fn to_24_hour(clock: &str, meridiem: &str) -> String {
    let raw = format!("{} {}", clock, meridiem.to_ascii_uppercase());
    NaiveTime::parse_from_str(&raw, "%I:%M %p")
        .map(|time| time.format("%H:%M").to_string())
        .unwrap_or(raw)
}

/// テーブルパーサー
#[derive(Debug, Clone, Copy, Default)]
pub struct RowParser;

impl RowParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 日付列 + 各列名（改行除去・前後空白除去）
    pub fn parse_header(&self, table: &ObservationTable) -> Vec<String> {
        std::iter::once(DATE_COLUMN.to_string())
            .chain(
                table
                    .header
                    .iter()
                    .map(|label| label.replace('\n', "").trim().to_string()),
            )
            .collect()
    }

    /// データ行を取り出す。ヘッダーが `Populated` の間は単位を付与する
    pub fn parse_rows(
        &self,
        table: &ObservationTable,
        formatted_date: &str,
        header: &mut Header,
    ) -> Vec<DataRow> {
        let mut rows = Vec::with_capacity(table.rows.len());

        for cells in &table.rows {
            let mut row = Vec::with_capacity(cells.len() + 1);
            row.push(formatted_date.to_string());
            let mut discard = false;

            for (index, cell) in cells.iter().enumerate() {
                let value = normalize_cell(&cell.text);
                if is_inline_header(&value) {
                    discard = true;
                    break;
                }
                row.push(value);

                if header.accepts_units() {
                    if let Some(unit) = cell.unit.as_deref() {
                        header.attach_unit(index + 1, unit);
                    }
                }
            }

            if header.accepts_units() {
                header.mark_units_attached();
            }
            if !discard {
                rows.push(row);
            }
        }

        rows
    }
}
