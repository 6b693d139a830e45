// src/pages.rs
use crate::catalog::Category;
use crate::models::StockDetails;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::json;
use std::path::{Path, PathBuf};

const NOT_AVAILABLE: &str = "N/A";

/// HTML page file for the landing page (`None`) or a category page.
pub fn page_path(pages_dir: &Path, category: Option<Category>) -> PathBuf {
    match category {
        Some(c) => pages_dir.join(format!("{}.html", c.key())),
        None => pages_dir.join("index.html"),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn or_na(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Standalone details page. The intraday series is embedded as JSON for the
/// page script to plot.
pub fn render_details(details: &StockDetails) -> String {
    let stock = &details.stock;
    let symbol = escape(&stock.symbol);
    let chart_src = utf8_percent_encode(&stock.symbol, NON_ALPHANUMERIC).to_string();
    let rows = [
        ("Last Traded Price", stock.ltp.to_string()),
        ("Previous Close", stock.prev_close.to_string()),
        ("Change (%)", stock.change.to_string()),
        ("Open", or_na(details.open_price)),
        ("Market Cap (Cr)", or_na(details.market_cap)),
        ("P/E Ratio", or_na(details.pe_ratio)),
        ("Dividend Yield", or_na(details.div_yield)),
        ("52 Week High", or_na(details.wk52_high)),
        ("52 Week Low", or_na(details.wk52_low)),
        ("All Time High", stock.all_time_high.to_string()),
        ("All Time Low", stock.all_time_low.to_string()),
        ("ATH Month", escape(&stock.high_date)),
    ];

    let mut table = String::new();
    for (label, value) in rows {
        table.push_str(&format!("<tr><th>{label}</th><td>{value}</td></tr>\n"));
    }

    // `</` is escaped so the payload cannot close the script element.
    let series = json!({ "time": details.chart_time, "price": details.chart_prices })
        .to_string()
        .replace("</", "<\\/");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{symbol} | Stock Details</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<h1>{symbol}</h1>
<table class="details">
{table}</table>
<h2>Intraday (15 min)</h2>
<div id="intraday-chart"></div>
<img src="/stock-chart/{chart_src}" alt="{symbol} 6 month chart">
<script id="intraday-data" type="application/json">{series}</script>
<script src="/static/details.js"></script>
</body>
</html>
"#
    )
}
