//! Listing filters and price selection.
//!
//! Pure functions over a fetched listing set:
//! trust filter → sort ascending → outlier rejection → price selection.

use rust_decimal::Decimal;
use tracing::debug;

use crate::config::{OutlierConfig, TrustConfig};
use crate::types::{Listing, NoPriceReason, PriceResult};

/// Keep listings from trusted sellers whose title names the target item
/// under any of `item_names` (canonical name and marketplace spelling).
pub fn trust_filter(listings: Vec<Listing>, item_names: &[&str], cfg: &TrustConfig) -> Vec<Listing> {
    let needles: Vec<String> = item_names.iter().map(|n| n.to_lowercase()).collect();
    listings
        .into_iter()
        .filter(|l| {
            let title = l.title.to_lowercase();
            l.seller_feedback_score >= cfg.min_feedback_score
                && l.seller_rating_count >= cfg.min_rating_count
                && needles.iter().any(|n| title.contains(n.as_str()))
        })
        .collect()
}

/// Sort listings ascending by price (stable for equal prices).
pub fn sort_by_price(listings: &mut [Listing]) {
    listings.sort_by(|a, b| a.price.cmp(&b.price));
}

/// Median of a price-ascending set, taken at index `floor(n / 2)`.
///
/// For even `n` this is the upper of the two middle values.
pub fn median_price(sorted: &[Listing]) -> Option<Decimal> {
    sorted.get(sorted.len() / 2).map(|l| l.price)
}

/// Drop listings priced under `floor_ratio × median`. Input must be
/// sorted ascending. Sets smaller than `min_sample` pass through as-is.
pub fn reject_outliers(sorted: Vec<Listing>, cfg: &OutlierConfig) -> Vec<Listing> {
    if sorted.len() < cfg.min_sample {
        return sorted;
    }
    let Some(median) = median_price(&sorted) else {
        return sorted;
    };
    let floor = median * cfg.floor_ratio;
    let before = sorted.len();
    let kept: Vec<Listing> = sorted.into_iter().filter(|l| l.price >= floor).collect();
    if kept.len() < before {
        debug!(
            median = %median,
            floor = %floor,
            dropped = before - kept.len(),
            "Rejected low-priced outliers"
        );
    }
    kept
}

/// Cheapest listing of a price-ascending set and the set's size.
pub fn select_price(sorted: &[Listing]) -> PriceResult {
    match sorted.first() {
        Some(cheapest) => PriceResult::found(cheapest.price, sorted.len()),
        None => PriceResult::absent(NoPriceReason::NoValidListings),
    }
}

/// Run the full filter pipeline over a raw listing set.
pub fn evaluate(
    raw: Vec<Listing>,
    item_names: &[&str],
    trust: &TrustConfig,
    outliers: &OutlierConfig,
) -> PriceResult {
    if raw.is_empty() {
        return PriceResult::absent(NoPriceReason::NoListings);
    }
    let raw_count = raw.len();

    let mut trusted = trust_filter(raw, item_names, trust);
    if trusted.is_empty() {
        debug!(items = ?item_names, raw_count, "No listings passed the trust filter");
        return PriceResult::absent(NoPriceReason::NoTrustedSellers);
    }

    sort_by_price(&mut trusted);
    let valid = reject_outliers(trusted, outliers);
    select_price(&valid)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
