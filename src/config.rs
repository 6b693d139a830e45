// src/config.rs
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::CategoryTable;
use crate::provider::DEFAULT_COOKIE_URL;

#[derive(Parser, Debug, Clone)]
#[command(name = "nse_dashboard")]
#[command(about = "Indian equity market dashboard", long_about = None)]
pub struct Config {
    /// Address to bind the HTTP server to
    #[arg(long, env = "DASHBOARD_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(long, env = "DASHBOARD_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding the category CSV tables
    #[arg(long, env = "DASHBOARD_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory holding index.html and the per-category pages
    #[arg(long, env = "DASHBOARD_PAGES_DIR", default_value = "templates")]
    pub pages_dir: PathBuf,

    #[arg(long, env = "DASHBOARD_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Base URL of the Yahoo Finance compatible market-data API
    #[arg(
        long,
        env = "DASHBOARD_PROVIDER_URL",
        default_value = "https://query2.finance.yahoo.com"
    )]
    pub provider_url: String,

    /// Page that hands out the session cookie the quote crumb is bound to
    #[arg(long, env = "DASHBOARD_COOKIE_URL", default_value = DEFAULT_COOKIE_URL)]
    pub cookie_url: String,

    /// Exchange suffix appended to every symbol before lookup
    #[arg(long, env = "DASHBOARD_MARKET_SUFFIX", default_value = ".NS")]
    pub market_suffix: String,

    /// TrueType font used for chart captions and axis labels
    #[arg(long, env = "DASHBOARD_CHART_FONT")]
    pub chart_font: Option<PathBuf>,

    #[arg(long, env = "DASHBOARD_REQUEST_TIMEOUT_SECS", default_value_t = 20)]
    pub request_timeout_secs: u64,

    /// Category used by /stocks when none is given
    #[arg(long, env = "DASHBOARD_DEFAULT_CATEGORY", default_value = "nifty500")]
    pub default_category: String,

    /// Month threshold (YYYY-MM) used by /stocks when none is given
    #[arg(long, env = "DASHBOARD_DEFAULT_DATE", default_value = "2024-01")]
    pub default_date: String,
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn category_table(&self) -> CategoryTable {
        CategoryTable::in_dir(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_conventions() {
        let config = Config::parse_from(["nse_dashboard"]);
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:5000");
        assert_eq!(config.market_suffix, ".NS");
        assert_eq!(config.default_category, "nifty500");
        assert_eq!(config.default_date, "2024-01");
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert!(config.chart_font.is_none());
        assert_eq!(config.cookie_url, "https://fc.yahoo.com");
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "nse_dashboard",
            "--port",
            "8080",
            "--data-dir",
            "/srv/tables",
            "--market-suffix",
            ".BO",
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_dir, PathBuf::from("/srv/tables"));
        assert_eq!(config.market_suffix, ".BO");
    }
}
