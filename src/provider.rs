// src/provider.rs
//! Market-data provider seam and its Yahoo Finance implementation.
//!
//! Bars come from the v8 chart API and supplementary quote fields from the
//! v7 quote API. Every lookup takes the bare exchange symbol; the configured
//! market suffix is appended here.
//!
//! The quote API only answers requests that carry a session cookie and the
//! matching crumb. The crumb is fetched on first use and refreshed once when
//! the provider rejects it with 401.

use crate::error::FetchError;
use crate::models::{Bar, IntradayBar, QuoteInfo};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

/// Sets the session cookie the crumb is bound to.
pub const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryRange {
    OneDay,
    SixMonths,
    FiveYears,
}

impl HistoryRange {
    pub fn as_param(self) -> &'static str {
        match self {
            HistoryRange::OneDay => "1d",
            HistoryRange::SixMonths => "6mo",
            HistoryRange::FiveYears => "5y",
        }
    }
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Daily bars over `range`, oldest first.
    async fn daily_history(&self, symbol: &str, range: HistoryRange)
        -> Result<Vec<Bar>, FetchError>;

    /// Today's 15-minute bars in exchange-local time.
    async fn intraday(&self, symbol: &str) -> Result<Vec<IntradayBar>, FetchError>;

    async fn quote_info(&self, symbol: &str) -> Result<QuoteInfo, FetchError>;
}

/// Trim, uppercase and append the exchange suffix.
pub fn normalize_symbol(symbol: &str, suffix: &str) -> String {
    format!("{}{}", symbol.trim().to_uppercase(), suffix)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    quote_response: QuoteResult,
}

#[derive(Debug, Deserialize)]
struct QuoteResult {
    result: Vec<QuoteInfo>,
}

/// Timestamped bar before it is shaped into a daily or intraday bar.
struct RawPoint {
    time: DateTime<FixedOffset>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<u64>,
}

fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<RawPoint>, FetchError> {
    let data = match resp.chart.result {
        Some(result) => result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::EmptySeries(symbol.to_string()))?,
        None => {
            return Err(match resp.chart.error {
                Some(err) if err.code == "Not Found" => {
                    FetchError::SymbolNotFound(symbol.to_string())
                }
                Some(err) => FetchError::Malformed(format!("{}: {}", err.code, err.description)),
                None => FetchError::Malformed("empty result with no error".to_string()),
            })
        }
    };

    let offset_secs = data.meta.map(|m| m.gmtoffset).unwrap_or(0);
    let offset = FixedOffset::east_opt(offset_secs)
        .ok_or_else(|| FetchError::Malformed(format!("invalid gmtoffset {offset_secs}")))?;

    // A symbol with no trading in the window comes back without timestamps.
    let timestamps = data.timestamp.unwrap_or_default();
    let quote = match data.indicators.quote.into_iter().next() {
        Some(q) => q,
        None if timestamps.is_empty() => return Ok(Vec::new()),
        None => return Err(FetchError::Malformed("no quote data".to_string())),
    };

    let mut points = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let time = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| FetchError::Malformed(format!("invalid timestamp: {ts}")))?
            .with_timezone(&offset);
        let point = RawPoint {
            time,
            open: quote.open.get(i).copied().flatten(),
            high: quote.high.get(i).copied().flatten(),
            low: quote.low.get(i).copied().flatten(),
            close: quote.close.get(i).copied().flatten(),
            volume: quote.volume.get(i).copied().flatten(),
        };
        // Holidays show up as all-null rows.
        if point.open.is_none()
            && point.high.is_none()
            && point.low.is_none()
            && point.close.is_none()
        {
            continue;
        }
        points.push(point);
    }
    Ok(points)
}

fn daily_bars(points: Vec<RawPoint>) -> Vec<Bar> {
    points
        .into_iter()
        .filter_map(|p| {
            let close = p.close?;
            Some(Bar {
                date: p.time.date_naive(),
                open: p.open.unwrap_or(close),
                high: p.high?,
                low: p.low?,
                close,
                volume: p.volume.unwrap_or(0),
            })
        })
        .collect()
}

fn intraday_bars(points: Vec<RawPoint>) -> Vec<IntradayBar> {
    points
        .into_iter()
        .filter_map(|p| {
            Some(IntradayBar {
                time: p.time.time(),
                close: p.close?,
            })
        })
        .collect()
}

fn status_error(ticker: &str, status: StatusCode) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::SymbolNotFound(ticker.to_string()),
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        status => FetchError::Status(status.as_u16()),
    }
}

pub struct YahooClient {
    client: Client,
    base_url: String,
    cookie_url: String,
    suffix: String,
    crumb: Mutex<Option<String>>,
}

impl YahooClient {
    pub fn new(
        base_url: &str,
        cookie_url: &str,
        suffix: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: cookie_url.to_string(),
            suffix: suffix.to_string(),
            crumb: Mutex::new(None),
        })
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, ticker)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        ticker: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        debug!("GET {} {:?}", url, query);
        let response = self.client.get(url).query(query).send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.json::<T>().await?),
            status => Err(status_error(ticker, status)),
        }
    }

    /// Cached crumb, fetched on first use.
    async fn crumb(&self) -> Result<String, FetchError> {
        let mut slot = self.crumb.lock().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }

        // Only the cookie matters here; the cookie host answers 404.
        self.client.get(&self.cookie_url).send().await?;

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            status => return Err(FetchError::Status(status.as_u16())),
        }
        let crumb = response.text().await?.trim().to_string();
        if crumb.is_empty() {
            return Err(FetchError::Malformed("empty crumb".to_string()));
        }
        debug!("Obtained quote crumb");
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    async fn quote(&self, ticker: &str) -> Result<QuoteInfo, FetchError> {
        let crumb = self.crumb().await?;
        let url = format!("{}/v7/finance/quote", self.base_url);
        let query = [("symbols", ticker), ("crumb", crumb.as_str())];
        let response: QuoteResponse = self.get_json(ticker, &url, &query).await?;
        response
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::SymbolNotFound(ticker.to_string()))
    }

    async fn chart(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> Result<Vec<RawPoint>, FetchError> {
        let ticker = normalize_symbol(symbol, &self.suffix);
        let url = self.chart_url(&ticker);
        let query = [("range", range), ("interval", interval)];
        let response: ChartResponse = self.get_json(&ticker, &url, &query).await?;
        parse_chart(&ticker, response)
    }
}

#[async_trait]
impl MarketData for YahooClient {
    async fn daily_history(
        &self,
        symbol: &str,
        range: HistoryRange,
    ) -> Result<Vec<Bar>, FetchError> {
        let points = self.chart(symbol, range.as_param(), "1d").await?;
        Ok(daily_bars(points))
    }

    async fn intraday(&self, symbol: &str) -> Result<Vec<IntradayBar>, FetchError> {
        let points = self.chart(symbol, "1d", "15m").await?;
        Ok(intraday_bars(points))
    }

    async fn quote_info(&self, symbol: &str) -> Result<QuoteInfo, FetchError> {
        let ticker = normalize_symbol(symbol, &self.suffix);
        match self.quote(&ticker).await {
            Err(FetchError::Status(401)) => {
                debug!("Quote crumb rejected, refreshing");
                self.crumb.lock().await.take();
                self.quote(&ticker).await
            }
            outcome => outcome,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use warp::{Filter, Reply};

    /// In-memory provider. Symbols without a script fail with `SymbolNotFound`.
    #[derive(Default)]
    pub(crate) struct ScriptedMarket {
        pub history: HashMap<(String, HistoryRange), Result<Vec<Bar>, FetchError>>,
        pub intraday: HashMap<String, Vec<IntradayBar>>,
        pub info: HashMap<String, QuoteInfo>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedMarket {
        pub(crate) fn with_history(
            mut self,
            symbol: &str,
            range: HistoryRange,
            bars: Result<Vec<Bar>, FetchError>,
        ) -> Self {
            self.history.insert((symbol.to_string(), range), bars);
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MarketData for ScriptedMarket {
        async fn daily_history(
            &self,
            symbol: &str,
            range: HistoryRange,
        ) -> Result<Vec<Bar>, FetchError> {
            self.calls.lock().unwrap().push(symbol.to_string());
            self.history
                .get(&(symbol.to_string(), range))
                .cloned()
                .unwrap_or_else(|| Err(FetchError::SymbolNotFound(symbol.to_string())))
        }

        async fn intraday(&self, symbol: &str) -> Result<Vec<IntradayBar>, FetchError> {
            Ok(self.intraday.get(symbol).cloned().unwrap_or_default())
        }

        async fn quote_info(&self, symbol: &str) -> Result<QuoteInfo, FetchError> {
            self.info
                .get(symbol)
                .cloned()
                .ok_or_else(|| FetchError::SymbolNotFound(symbol.to_string()))
        }
    }

    /// Daily bar with a small high/low band around `close`.
    pub(crate) fn bar(date: &str, close: f64, volume: u64) -> Bar {
        Bar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume,
        }
    }

    #[test]
    fn normalize_trims_uppercases_and_suffixes() {
        assert_eq!(normalize_symbol("  reliance ", ".NS"), "RELIANCE.NS");
        assert_eq!(normalize_symbol("M&M", ".NS"), "M&M.NS");
    }

    #[test]
    fn parse_chart_skips_null_rows_and_applies_offset() {
        // 2024-03-01 03:45 UTC is 09:15 IST.
        let body = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":19800},
            "timestamp":[1709264700,1709265600,1709266500],
            "indicators":{"quote":[{
                "open":[100.0,null,102.0],
                "high":[101.0,null,103.0],
                "low":[99.0,null,101.0],
                "close":[100.5,null,102.5],
                "volume":[1000,null,1200]
            }]}
        }],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let points = parse_chart("TCS.NS", resp).unwrap();
        assert_eq!(points.len(), 2);

        let intraday = intraday_bars(points);
        assert_eq!(intraday[0].time, NaiveTime::from_hms_opt(9, 15, 0).unwrap());
        assert_eq!(intraday[1].close, 102.5);
    }

    #[test]
    fn daily_bars_drop_rows_without_close_high_or_low() {
        let body = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":19800},
            "timestamp":[1704166200,1704252600],
            "indicators":{"quote":[{
                "open":[100.0,101.0],
                "high":[101.0,null],
                "low":[99.0,100.0],
                "close":[100.5,100.8],
                "volume":[null,500]
            }]}
        }],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let bars = daily_bars(parse_chart("TCS.NS", resp).unwrap());
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].volume, 0);
    }

    #[test]
    fn chart_not_found_error_maps_to_symbol_not_found() {
        let body = r#"{"chart":{"result":null,"error":{
            "code":"Not Found","description":"No data found, symbol may be delisted"
        }}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parse_chart("NOPE.NS", resp).err(),
            Some(FetchError::SymbolNotFound("NOPE.NS".into()))
        );
    }

    #[test]
    fn chart_without_timestamps_is_an_empty_series() {
        let body = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":19800},
            "indicators":{"quote":[{}]}
        }],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(parse_chart("TCS.NS", resp).unwrap().is_empty());
    }

    #[test]
    fn quote_response_takes_first_result() {
        let body = r#"{"quoteResponse":{"result":[{
            "symbol":"TCS.NS","regularMarketOpen":3900.0,"marketCap":14250000000000,
            "fiftyTwoWeekHigh":4254.75,"fiftyTwoWeekLow":3311.0
        }],"error":null}}"#;
        let resp: QuoteResponse = serde_json::from_str(body).unwrap();
        let info = resp.quote_response.result.into_iter().next().unwrap();
        assert_eq!(info.open, Some(3900.0));
        assert_eq!(info.market_cap, Some(14_250_000_000_000.0));
        assert_eq!(info.trailing_pe, None);
    }

    #[test]
    fn chart_url_strips_trailing_slash_from_base() {
        let client = YahooClient::new(
            "http://localhost:9/",
            DEFAULT_COOKIE_URL,
            ".NS",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            client.chart_url("TCS.NS"),
            "http://localhost:9/v8/finance/chart/TCS.NS"
        );
        assert_eq!(HistoryRange::FiveYears.as_param(), "5y");
    }

    /// Local stand-in for the provider. Quote requests need a crumb; with
    /// `stale_first_crumb` the first crumb issued is refused with 401.
    struct Upstream {
        crumbs_issued: AtomicUsize,
        stale_first_crumb: bool,
    }

    async fn spawn_upstream(stale_first_crumb: bool) -> (YahooClient, Arc<Upstream>) {
        let upstream = Arc::new(Upstream {
            crumbs_issued: AtomicUsize::new(0),
            stale_first_crumb,
        });

        let cookie = warp::path!("cookie").map(|| {
            warp::reply::with_header(
                warp::reply::with_status("", StatusCode::NOT_FOUND),
                "set-cookie",
                "A3=session; Path=/",
            )
            .into_response()
        });

        let issuer = upstream.clone();
        let crumb = warp::path!("v1" / "test" / "getcrumb").map(move || {
            let n = issuer.crumbs_issued.fetch_add(1, Ordering::SeqCst) + 1;
            format!("crumb{n}").into_response()
        });

        let chart = warp::path!("v8" / "finance" / "chart" / String).map(|ticker: String| {
            let status = match ticker.as_str() {
                "NOPE.NS" => StatusCode::NOT_FOUND,
                "BUSY.NS" => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warp::reply::with_status("", status).into_response()
        });

        let checker = upstream.clone();
        let quote = warp::path!("v7" / "finance" / "quote")
            .and(warp::query::<HashMap<String, String>>())
            .map(move |q: HashMap<String, String>| {
                let crumb = q.get("crumb").map(String::as_str).unwrap_or("");
                if crumb.is_empty() || (checker.stale_first_crumb && crumb == "crumb1") {
                    return warp::reply::with_status("", StatusCode::UNAUTHORIZED).into_response();
                }
                let result = match q.get("symbols").map(String::as_str) {
                    Some("EMPTY.NS") | None => json!([]),
                    Some(ticker) => json!([{ "symbol": ticker, "regularMarketOpen": 100.0 }]),
                };
                warp::reply::json(&json!({ "quoteResponse": { "result": result, "error": null } }))
                    .into_response()
            });

        let routes = warp::get().and(
            cookie
                .or(crumb)
                .unify()
                .or(chart)
                .unify()
                .or(quote)
                .unify(),
        );
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let base = format!("http://{addr}");
        let client = YahooClient::new(
            &base,
            &format!("{base}/cookie"),
            ".NS",
            Duration::from_secs(5),
        )
        .unwrap();
        (client, upstream)
    }

    #[tokio::test]
    async fn http_statuses_map_to_fetch_errors() {
        let (client, _) = spawn_upstream(false).await;
        assert_eq!(
            client.daily_history("nope", HistoryRange::FiveYears).await,
            Err(FetchError::SymbolNotFound("NOPE.NS".into()))
        );
        assert_eq!(
            client.daily_history("busy", HistoryRange::OneDay).await,
            Err(FetchError::RateLimited)
        );
        assert_eq!(client.intraday("boom").await, Err(FetchError::Status(500)));
    }

    #[tokio::test]
    async fn quote_uses_a_cached_crumb() {
        let (client, upstream) = spawn_upstream(false).await;
        let info = client.quote_info("tcs").await.unwrap();
        assert_eq!(info.open, Some(100.0));
        assert_eq!(
            client.quote_info("empty").await,
            Err(FetchError::SymbolNotFound("EMPTY.NS".into()))
        );
        assert_eq!(upstream.crumbs_issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_crumb_is_refreshed_once() {
        let (client, upstream) = spawn_upstream(true).await;
        let info = client.quote_info("infy").await.unwrap();
        assert_eq!(info.open, Some(100.0));
        assert_eq!(upstream.crumbs_issued.load(Ordering::SeqCst), 2);
    }
}
