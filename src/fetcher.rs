// src/fetcher.rs
use crate::error::FetchError;
use crate::models::{round2, Bar, StockDetails, StockSnapshot};
use crate::provider::{HistoryRange, MarketData};
use log::{info, warn};

/// Success snapshot or the typed reason the symbol produced none.
pub type SnapshotOutcome = Result<StockSnapshot, FetchError>;

#[derive(Debug, Clone, PartialEq)]
pub enum VolumeOutcome {
    Traded(u64),
    NoData,
    Failed(FetchError),
}

impl VolumeOutcome {
    pub fn volume(&self) -> u64 {
        match self {
            VolumeOutcome::Traded(v) => *v,
            VolumeOutcome::NoData | VolumeOutcome::Failed(_) => 0,
        }
    }
}

/// Build a snapshot from daily bars, oldest first. Returns `None` for an
/// empty series.
///
/// With a single bar the previous close is that same bar, so the change is
/// zero. A zero previous close also reports a zero change.
pub fn compute_snapshot(symbol: &str, bars: &[Bar]) -> Option<StockSnapshot> {
    let last = bars.last()?;
    let prev = bars.len().checked_sub(2).map_or(last, |i| &bars[i]);

    let ltp = round2(last.close);
    let prev_close = round2(prev.close);
    let change = if prev_close == 0.0 {
        0.0
    } else {
        round2((ltp - prev_close) / prev_close * 100.0)
    };

    // First occurrence wins when the high is repeated.
    let mut high_bar = &bars[0];
    let mut low = bars[0].low;
    for bar in &bars[1..] {
        if bar.high > high_bar.high {
            high_bar = bar;
        }
        low = low.min(bar.low);
    }

    Some(StockSnapshot {
        symbol: symbol.to_string(),
        ltp,
        prev_close,
        change,
        all_time_high: round2(high_bar.high),
        all_time_low: round2(low),
        high_date: high_bar.date.format("%Y-%m").to_string(),
    })
}

pub async fn fetch_snapshot(provider: &dyn MarketData, symbol: &str) -> SnapshotOutcome {
    let outcome = provider
        .daily_history(symbol, HistoryRange::FiveYears)
        .await
        .and_then(|bars| {
            compute_snapshot(symbol, &bars)
                .ok_or_else(|| FetchError::EmptySeries(symbol.to_string()))
        });
    if let Err(e) = &outcome {
        warn!("Error fetching data for {}: {}", symbol, e);
    }
    outcome
}

/// Snapshots for every symbol, in order, skipping the ones that failed.
pub async fn fetch_snapshots(
    provider: &dyn MarketData,
    symbols: &[String],
) -> Vec<StockSnapshot> {
    let mut snapshots = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if let Ok(snapshot) = fetch_snapshot(provider, symbol).await {
            snapshots.push(snapshot);
        }
    }
    info!(
        "Fetched {} of {} snapshots ({} failed)",
        snapshots.len(),
        symbols.len(),
        symbols.len() - snapshots.len()
    );
    snapshots
}

pub async fn fetch_volume_outcome(provider: &dyn MarketData, symbol: &str) -> VolumeOutcome {
    match provider.daily_history(symbol, HistoryRange::OneDay).await {
        Ok(bars) => match bars.last() {
            Some(bar) => VolumeOutcome::Traded(bar.volume),
            None => VolumeOutcome::NoData,
        },
        Err(e) => {
            warn!("Error fetching trading volume for {}: {}", symbol, e);
            VolumeOutcome::Failed(e)
        }
    }
}

/// Today's traded volume, zero when unavailable.
pub async fn fetch_today_volume(provider: &dyn MarketData, symbol: &str) -> u64 {
    fetch_volume_outcome(provider, symbol).await.volume()
}

/// Six months of daily closes for the chart endpoint.
pub async fn fetch_chart_bars(
    provider: &dyn MarketData,
    symbol: &str,
) -> Result<Vec<Bar>, FetchError> {
    let bars = provider
        .daily_history(symbol, HistoryRange::SixMonths)
        .await?;
    if bars.is_empty() {
        return Err(FetchError::EmptySeries(symbol.to_string()));
    }
    Ok(bars)
}

/// Snapshot plus intraday series and quote fields. Only the snapshot is
/// required; the rest degrade to empty or absent.
pub async fn fetch_details(
    provider: &dyn MarketData,
    symbol: &str,
) -> Result<StockDetails, FetchError> {
    let symbol = symbol.trim().to_uppercase();
    let stock = fetch_snapshot(provider, &symbol).await?;

    let intraday = provider.intraday(&symbol).await.unwrap_or_else(|e| {
        warn!("Error fetching intraday data for {}: {}", symbol, e);
        Vec::new()
    });
    let info = provider.quote_info(&symbol).await.unwrap_or_else(|e| {
        warn!("Error fetching quote info for {}: {}", symbol, e);
        Default::default()
    });

    Ok(StockDetails {
        stock,
        chart_time: intraday
            .iter()
            .map(|b| b.time.format("%H:%M").to_string())
            .collect(),
        chart_prices: intraday.iter().map(|b| round2(b.close)).collect(),
        open_price: info.open,
        market_cap: info.market_cap.map(|cap| round2(cap / 1e7)),
        pe_ratio: info.trailing_pe,
        div_yield: info.dividend_yield_pct(),
        wk52_high: info.fifty_two_week_high,
        wk52_low: info.fifty_two_week_low,
    })
}
