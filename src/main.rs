// src/main.rs
use clap::Parser;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use nse_dashboard::api::{self, AppState};
use nse_dashboard::catalog::{Category, SymbolCatalog};
use nse_dashboard::chart;
use nse_dashboard::config::Config;
use nse_dashboard::provider::{MarketData, YahooClient};
use std::sync::Arc;
use warp::Filter;

#[tokio::main]
async fn main() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let config = Config::parse();
    info!("Starting the NSE dashboard...");

    if let Err(e) = config.default_category.parse::<Category>() {
        error!("{}: default category {:?}", e, config.default_category);
        return;
    }

    if let Some(path) = &config.chart_font {
        match chart::load_font(path) {
            Ok(()) => info!("Chart font loaded from {}", path.display()),
            Err(e) => warn!("Charts will be drawn without text: {}", e),
        }
    }

    let provider: Arc<dyn MarketData> = match YahooClient::new(
        &config.provider_url,
        &config.cookie_url,
        &config.market_suffix,
        config.request_timeout(),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build market-data client: {}", e);
            return;
        }
    };
    info!("Market data from {}", config.provider_url);
    info!("Category tables in {}", config.data_dir.display());

    let state = Arc::new(AppState {
        catalog: SymbolCatalog::new(config.category_table()),
        provider,
        pages_dir: config.pages_dir.clone(),
        market_suffix: config.market_suffix.clone(),
        default_category: config.default_category.clone(),
        default_date: config.default_date.clone(),
    });

    let api = api::routes(state, config.static_dir.clone()).with(warp::log("nse_dashboard"));

    let addr = config.bind_addr();
    info!("Server running on http://{}", addr);
    warp::serve(api).run(addr).await;
}
