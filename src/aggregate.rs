// src/aggregate.rs
use crate::catalog::{Category, SymbolCatalog, UNKNOWN_INDUSTRY};
use crate::error::CatalogError;
use crate::fetcher::{fetch_volume_outcome, VolumeOutcome};
use crate::models::{Movers, StockSnapshot};
use crate::provider::MarketData;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;

/// Snapshots whose all-time high falls in or after `threshold` (`YYYY-MM`,
/// compared as strings). When none qualify, every snapshot is returned.
pub fn partition_by_high_date(
    snapshots: Vec<StockSnapshot>,
    threshold: &str,
) -> Vec<StockSnapshot> {
    let (primary, fallback): (Vec<_>, Vec<_>) = snapshots
        .into_iter()
        .partition(|s| s.high_date.as_str() >= threshold);
    if primary.is_empty() {
        fallback
    } else {
        primary
    }
}

/// Gainers by descending change, losers by ascending change. Unchanged
/// stocks are in neither list.
pub fn rank_movers(snapshots: Vec<StockSnapshot>) -> Movers {
    let mut gainers = Vec::new();
    let mut losers = Vec::new();
    for snapshot in snapshots {
        if snapshot.change > 0.0 {
            gainers.push(snapshot);
        } else if snapshot.change < 0.0 {
            losers.push(snapshot);
        }
    }
    gainers.sort_by(|a, b| b.change.total_cmp(&a.change));
    losers.sort_by(|a, b| a.change.total_cmp(&b.change));
    Movers { gainers, losers }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectorReport {
    Volumes(BTreeMap<String, u64>),
    MarketClosed { market_closed: bool },
    /// Every volume lookup failed, so nothing is known about the market.
    /// Never sent as a body; the HTTP layer answers 503 for it.
    #[serde(skip)]
    ProviderUnavailable,
}

impl SectorReport {
    pub fn market_closed() -> Self {
        SectorReport::MarketClosed {
            market_closed: true,
        }
    }
}

/// One volume lookup for a catalog row.
#[derive(Debug, Clone)]
pub struct VolumeSample {
    pub industry: String,
    pub outcome: VolumeOutcome,
}

pub fn aggregate_sector_volumes(samples: &[VolumeSample]) -> SectorReport {
    let mut volumes: BTreeMap<String, u64> = BTreeMap::new();
    for sample in samples {
        let industry = match sample.industry.trim() {
            "" => UNKNOWN_INDUSTRY,
            name => name,
        };
        *volumes.entry(industry.to_string()).or_insert(0) += sample.outcome.volume();
    }

    let total: u64 = volumes.values().sum();
    if total > 0 {
        return SectorReport::Volumes(volumes);
    }

    let all_failed = !samples.is_empty()
        && samples
            .iter()
            .all(|s| matches!(s.outcome, VolumeOutcome::Failed(_)));
    if all_failed {
        SectorReport::ProviderUnavailable
    } else {
        SectorReport::market_closed()
    }
}

/// Fetch today's volume for every row of every category, in catalog order.
pub async fn collect_volume_samples(
    catalog: &SymbolCatalog,
    provider: &dyn MarketData,
) -> Result<Vec<VolumeSample>, CatalogError> {
    let mut samples = Vec::new();
    for category in Category::ALL {
        for entry in catalog.list_symbols_with_industry(category)? {
            let outcome = fetch_volume_outcome(provider, &entry.symbol).await;
            samples.push(VolumeSample {
                industry: entry.industry,
                outcome,
            });
        }
    }
    let failed = samples
        .iter()
        .filter(|s| matches!(s.outcome, VolumeOutcome::Failed(_)))
        .count();
    info!(
        "Collected {} volume samples ({} failed)",
        samples.len(),
        failed
    );
    Ok(samples)
}
