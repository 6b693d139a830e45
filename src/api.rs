// src/api.rs
use crate::aggregate::{
    aggregate_sector_volumes, collect_volume_samples, partition_by_high_date, rank_movers,
    SectorReport,
};
use crate::catalog::{Category, SymbolCatalog};
use crate::chart::render_close_chart;
use crate::error::{handle_rejection, ApiError};
use crate::fetcher::{fetch_chart_bars, fetch_details, fetch_snapshots};
use crate::pages::{page_path, render_details};
use crate::provider::{normalize_symbol, MarketData};
use log::{error, info, warn};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

const NO_CHART_DATA: &str = "No data available";
const NO_DETAILS: &str = "Stock not found or no data available";

pub struct AppState {
    pub catalog: SymbolCatalog,
    pub provider: Arc<dyn MarketData>,
    pub pages_dir: PathBuf,
    pub market_suffix: String,
    pub default_category: String,
    pub default_date: String,
}

#[derive(Debug, Deserialize)]
struct StocksQuery {
    category: Option<String>,
    date: Option<String>,
}

pub fn routes(
    state: Arc<AppState>,
    static_dir: PathBuf,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(index_handler);

    let stocks = warp::path!("stocks")
        .and(warp::get())
        .and(warp::query::<StocksQuery>())
        .and(with_state(state.clone()))
        .and_then(stocks_handler);

    let sector_data = warp::path!("sector-data")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(sector_data_handler);

    let top_stocks = warp::path!("top-stocks")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(top_stocks_handler);

    let chart = warp::path!("stock-chart" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(stock_chart_handler);

    let details = warp::path!("stock-details" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(stock_details_handler);

    let assets = warp::path("static").and(warp::fs::dir(static_dir));

    // Single-segment catch-all, so it goes after every fixed route.
    let category_page = warp::path!(String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(category_page_handler);

    index
        .or(stocks)
        .or(sector_data)
        .or(top_stocks)
        .or(chart)
        .or(details)
        .or(assets)
        .or(category_page)
        .recover(handle_rejection)
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn serve_page(
    state: &AppState,
    category: Option<Category>,
) -> Result<impl Reply, Rejection> {
    let path = page_path(&state.pages_dir, category);
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Ok(warp::reply::html(body)),
        Err(e) => {
            error!("Failed to read page {}: {}", path.display(), e);
            Err(warp::reject::custom(ApiError::NotFound(
                "404 Not Found".to_string(),
            )))
        }
    }
}

async fn index_handler(state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    serve_page(&state, None).await
}

async fn category_page_handler(
    key: String,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let category = key
        .parse::<Category>()
        .map_err(|_| warp::reject::custom(ApiError::NotFound("404 Not Found".to_string())))?;
    serve_page(&state, Some(category)).await
}

async fn stocks_handler(
    query: StocksQuery,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let key = query
        .category
        .unwrap_or_else(|| state.default_category.clone());
    let date = query.date.unwrap_or_else(|| state.default_date.clone());

    let category = key.parse::<Category>().map_err(|e| {
        warn!("Rejected /stocks request for category {:?}", key);
        warp::reject::custom(ApiError::from(e))
    })?;
    let symbols = state
        .catalog
        .list_symbols(category)
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;

    info!(
        "Fetching {} snapshots for {} (highs since {})",
        symbols.len(),
        category,
        date
    );
    let snapshots = fetch_snapshots(state.provider.as_ref(), &symbols).await;
    let selected = partition_by_high_date(snapshots, &date);
    Ok(warp::reply::json(&selected))
}

async fn sector_data_handler(state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let samples = collect_volume_samples(&state.catalog, state.provider.as_ref())
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;

    match aggregate_sector_volumes(&samples) {
        SectorReport::ProviderUnavailable => {
            error!("Every volume lookup failed; reporting provider unavailable");
            Err(warp::reject::custom(ApiError::ProviderUnavailable))
        }
        report => {
            if matches!(report, SectorReport::MarketClosed { .. }) {
                info!("Total traded volume is zero; market closed");
            }
            Ok(warp::reply::json(&report))
        }
    }
}

async fn top_stocks_handler(state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let symbols = state
        .catalog
        .list_symbols(Category::Nifty50)
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    let snapshots = fetch_snapshots(state.provider.as_ref(), &symbols).await;
    let movers = rank_movers(snapshots);
    info!(
        "Top stocks: {} gainers, {} losers",
        movers.gainers.len(),
        movers.losers.len()
    );
    Ok(warp::reply::json(&movers))
}

/// Path segments arrive percent-encoded (`M%26M` for `M&M`).
fn decode_symbol(raw: &str, not_found: &str) -> Result<String, Rejection> {
    match percent_decode_str(raw).decode_utf8() {
        Ok(symbol) => Ok(symbol.trim().to_uppercase()),
        Err(e) => {
            warn!("Undecodable symbol segment {:?}: {}", raw, e);
            Err(warp::reject::custom(ApiError::NotFound(
                not_found.to_string(),
            )))
        }
    }
}

async fn stock_chart_handler(
    raw: String,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let symbol = decode_symbol(&raw, NO_CHART_DATA)?;
    let bars = match fetch_chart_bars(state.provider.as_ref(), &symbol).await {
        Ok(bars) => bars,
        Err(e) => {
            warn!("No chart data for {}: {}", symbol, e);
            return Err(warp::reject::custom(ApiError::NotFound(
                NO_CHART_DATA.to_string(),
            )));
        }
    };

    let ticker = normalize_symbol(&symbol, &state.market_suffix);
    let png = render_close_chart(&ticker, &bars).map_err(|e| {
        error!("Failed to render chart for {}: {}", ticker, e);
        warp::reject::custom(ApiError::Chart(e.to_string()))
    })?;
    Ok(warp::reply::with_header(png, "content-type", "image/png"))
}

async fn stock_details_handler(
    raw: String,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let symbol = decode_symbol(&raw, NO_DETAILS)?;
    match fetch_details(state.provider.as_ref(), &symbol).await {
        Ok(details) => {
            info!("Stock details retrieved for {}", details.stock.symbol);
            Ok(warp::reply::html(render_details(&details)))
        }
        Err(e) => {
            warn!("Stock details unavailable for {}: {}", symbol, e);
            Err(warp::reject::custom(ApiError::NotFound(
                NO_DETAILS.to_string(),
            )))
        }
    }
}
