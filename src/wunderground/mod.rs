//! Weather Underground 日別観測履歴ページの取得
//!
//! 1回の試行ごとにブラウザを起動し、観測テーブル要素が現れるのを待って
//! outerHTML を取り出す。ブラウザは成否に関わらず試行の終わりに破棄する。

mod fetcher;

pub use fetcher::ChromeFetcher;
