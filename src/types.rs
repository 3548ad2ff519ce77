//! Shared types for the APPRAISER engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that market, engine, valuation
//! and api modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Rarity
// ---------------------------------------------------------------------------

/// Rarity tier of a collectible. Drives query construction (OG price
/// floor) and suspect-flagging thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
    Mythic,
    #[serde(rename = "Brainrot God")]
    BrainrotGod,
    Secret,
    #[serde(rename = "OG")]
    Og,
}

impl Rarity {
    /// All known tiers, lowest first.
    pub const ALL: &'static [Rarity] = &[
        Rarity::Common,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
        Rarity::BrainrotGod,
        Rarity::Secret,
        Rarity::Og,
    ];

    /// The rarest tier, whose listings are attacked by cheap decoys.
    pub fn is_rarest(&self) -> bool {
        matches!(self, Rarity::Og)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rarity::Common => write!(f, "Common"),
            Rarity::Rare => write!(f, "Rare"),
            Rarity::Epic => write!(f, "Epic"),
            Rarity::Legendary => write!(f, "Legendary"),
            Rarity::Mythic => write!(f, "Mythic"),
            Rarity::BrainrotGod => write!(f, "Brainrot God"),
            Rarity::Secret => write!(f, "Secret"),
            Rarity::Og => write!(f, "OG"),
        }
    }
}

/// Parse a rarity tier (case-insensitive, spaces/underscores optional).
impl std::str::FromStr for Rarity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match norm.as_str() {
            "common" => Ok(Rarity::Common),
            "rare" => Ok(Rarity::Rare),
            "epic" => Ok(Rarity::Epic),
            "legendary" => Ok(Rarity::Legendary),
            "mythic" => Ok(Rarity::Mythic),
            "brainrotgod" | "god" => Ok(Rarity::BrainrotGod),
            "secret" => Ok(Rarity::Secret),
            "og" => Ok(Rarity::Og),
            _ => Err(anyhow::anyhow!("Unknown rarity: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Queries & listings
// ---------------------------------------------------------------------------

/// Input to one price fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuery {
    /// Canonical (internal) item name.
    pub item_name: String,
    pub rarity: Rarity,
    /// Lowercase mutation key, e.g. "gold".
    pub mutation_key: String,
}

impl ItemQuery {
    pub fn new(item_name: impl Into<String>, rarity: Rarity, mutation_key: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            rarity,
            mutation_key: mutation_key.into().to_lowercase(),
        }
    }
}

impl fmt::Display for ItemQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] ({})", self.item_name, self.rarity, self.mutation_key)
    }
}

/// One external offer. Fetched fresh per call, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub offer_id: String,
    pub title: String,
    /// Unit price in `currency`.
    pub price: Decimal,
    pub currency: String,
    pub quantity: u32,
    /// Seller feedback percentage (0–100).
    pub seller_feedback_score: f64,
    pub seller_rating_count: u32,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} {} (seller {:.1}% / {} ratings)",
            self.title, self.price, self.currency, self.seller_feedback_score, self.seller_rating_count,
        )
    }
}

// ---------------------------------------------------------------------------
// Price results
// ---------------------------------------------------------------------------

/// Why a fetch that completed produced no trustworthy price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoPriceReason {
    /// The query succeeded but returned zero raw results.
    NoListings,
    /// Raw listings existed but none passed the trust filter.
    NoTrustedSellers,
    /// Trusted listings existed but all were rejected as outliers.
    NoValidListings,
}

impl fmt::Display for NoPriceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoPriceReason::NoListings => write!(f, "no listings found"),
            NoPriceReason::NoTrustedSellers => write!(f, "no listings from trusted sellers"),
            NoPriceReason::NoValidListings => write!(f, "all trusted listings rejected as outliers"),
        }
    }
}

/// Outcome of pricing one (item, rarity, mutation) combination.
///
/// "No price" and "zero listings" are the same outcome: `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceResult {
    Found { price: Decimal, listing_count: usize },
    Absent { reason: NoPriceReason },
}

impl PriceResult {
    pub fn found(price: Decimal, listing_count: usize) -> Self {
        PriceResult::Found { price, listing_count }
    }

    pub fn absent(reason: NoPriceReason) -> Self {
        PriceResult::Absent { reason }
    }

    pub fn price(&self) -> Option<Decimal> {
        match self {
            PriceResult::Found { price, .. } => Some(*price),
            PriceResult::Absent { .. } => None,
        }
    }

    pub fn listing_count(&self) -> usize {
        match self {
            PriceResult::Found { listing_count, .. } => *listing_count,
            PriceResult::Absent { .. } => 0,
        }
    }

    pub fn reason(&self) -> Option<NoPriceReason> {
        match self {
            PriceResult::Found { .. } => None,
            PriceResult::Absent { reason } => Some(*reason),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PriceResult::Found { .. })
    }
}

impl fmt::Display for PriceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceResult::Found { price, listing_count } => {
                write!(f, "{price} ({listing_count} listings)")
            }
            PriceResult::Absent { reason } => write!(f, "no price: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sweep output
// ---------------------------------------------------------------------------

/// Advisory annotation on a sweep entry. Never alters the price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuspectFlag {
    /// Fewer listings than the rarity tier's minimum.
    LowListingCount { count: usize, minimum: usize },
    /// Price is more than `max_ratio` × the default-mutation price.
    FarAboveDefault { price: Decimal, default_price: Decimal, max_ratio: Decimal },
    /// Price is less than `min_ratio` × the default-mutation price.
    FarBelowDefault { price: Decimal, default_price: Decimal, min_ratio: Decimal },
    /// No default-mutation price to compare against.
    NoBaseline,
}

impl fmt::Display for SuspectFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspectFlag::LowListingCount { count, minimum } => {
                write!(f, "only {count} listings (< {minimum})")
            }
            SuspectFlag::FarAboveDefault { price, default_price, max_ratio } => {
                write!(f, "{price} > {max_ratio}x default {default_price}")
            }
            SuspectFlag::FarBelowDefault { price, default_price, min_ratio } => {
                write!(f, "{price} < {min_ratio}x default {default_price}")
            }
            SuspectFlag::NoBaseline => write!(f, "no default price to compare against"),
        }
    }
}

/// A mutation that produced a price during a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub mutation: String,
    pub mutation_id: u32,
    pub price: Decimal,
    pub listing_count: usize,
    #[serde(default)]
    pub suspect: Vec<SuspectFlag>,
}

impl SweepEntry {
    pub fn is_suspect(&self) -> bool {
        !self.suspect.is_empty()
    }

    pub fn result(&self) -> PriceResult {
        PriceResult::found(self.price, self.listing_count)
    }
}

/// A mutation that produced no price during a sweep, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedMutation {
    pub mutation: String,
    pub reason: String,
}

/// Full result of sweeping one item+rarity across mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub item: String,
    pub rarity: Rarity,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Priced mutations, in catalog (ascending id) order.
    pub entries: Vec<SweepEntry>,
    pub skipped: Vec<SkippedMutation>,
    /// True when the sweep stopped early on its deadline.
    #[serde(default)]
    pub deadline_exceeded: bool,
}

impl SweepReport {
    pub fn entry(&self, mutation: &str) -> Option<&SweepEntry> {
        self.entries.iter().find(|e| e.mutation == mutation)
    }

    pub fn suspect_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_suspect()).count()
    }

    /// Collapse the priced entries into a mutation → price table.
    pub fn price_table(&self) -> MutationPriceTable {
        MutationPriceTable {
            item: self.item.clone(),
            rarity: self.rarity,
            fetched_at: self.finished_at,
            prices: self
                .entries
                .iter()
                .map(|e| (e.mutation.clone(), e.result()))
                .collect(),
        }
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {} priced, {} skipped, {} suspect",
            self.item,
            self.rarity,
            self.entries.len(),
            self.skipped.len(),
            self.suspect_count(),
        )
    }
}

/// Mutation → price for one item+rarity at one point in time.
/// Storage and staleness policy belong to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationPriceTable {
    pub item: String,
    pub rarity: Rarity,
    pub fetched_at: DateTime<Utc>,
    pub prices: BTreeMap<String, PriceResult>,
}

impl MutationPriceTable {
    /// Storage key for this table.
    pub fn key(&self) -> String {
        table_key(&self.item, self.rarity)
    }
}

/// Key used to index tables and reports by item+rarity.
pub fn table_key(item: &str, rarity: Rarity) -> String {
    format!("{}::{}", item.to_lowercase(), rarity)
}

// ---------------------------------------------------------------------------
// Catalog source records
// ---------------------------------------------------------------------------

/// An item as provided by the surrounding catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    pub rarity: Rarity,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
