// src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Point-in-time view of one stock, computed fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub symbol: String,
    pub ltp: f64,
    pub prev_close: f64,
    pub change: f64,
    pub all_time_high: f64,
    pub all_time_low: f64,
    /// `YYYY-MM` of the bar that set `all_time_high`.
    pub high_date: String,
}

/// One row of a category table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub symbol: String,
    pub industry: String,
}

/// Daily OHLCV bar from the market-data provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// 15-minute bar, timestamped in exchange-local time.
#[derive(Debug, Clone, PartialEq)]
pub struct IntradayBar {
    pub time: NaiveTime,
    pub close: f64,
}

/// Supplementary quote fields. The provider may omit any of them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInfo {
    #[serde(rename = "regularMarketOpen")]
    pub open: Option<f64>,
    pub market_cap: Option<f64>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    /// Percent.
    #[serde(rename = "dividendYield")]
    pub dividend_yield: Option<f64>,
    /// Fraction of price, not percent.
    #[serde(rename = "trailingAnnualDividendYield")]
    pub trailing_dividend_yield: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

impl QuoteInfo {
    /// Dividend yield in percent, falling back to the trailing yield.
    pub fn dividend_yield_pct(&self) -> Option<f64> {
        self.dividend_yield
            .or_else(|| self.trailing_dividend_yield.map(|f| round2(f * 100.0)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movers {
    pub gainers: Vec<StockSnapshot>,
    pub losers: Vec<StockSnapshot>,
}

/// Everything the stock details page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockDetails {
    pub stock: StockSnapshot,
    pub chart_time: Vec<String>,
    pub chart_prices: Vec<f64>,
    pub open_price: Option<f64>,
    /// Crores (1e7 rupees).
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub div_yield: Option<f64>,
    pub wk52_high: Option<f64>,
    pub wk52_low: Option<f64>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
