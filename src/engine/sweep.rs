//! Mutation sweep orchestrator.
//!
//! Prices one item+rarity across every catalog mutation, strictly one
//! request at a time with a fixed pause between requests, then annotates
//! statistically odd results. Different items may be swept in parallel
//! (`sweep_items`); the mutations of one item never are.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::fetcher::OfferFetcher;
use super::PriceError;
use crate::catalog::{Mutation, DEFAULT_MUTATION};
use crate::config::SweepConfig;
use crate::storage::PriceTableSink;
use crate::types::{
    ItemQuery, ItemRecord, PriceResult, Rarity, SkippedMutation, SuspectFlag, SweepEntry,
    SweepReport,
};

/// Drives the offer fetcher across mutations.
pub struct SweepOrchestrator {
    fetcher: Arc<OfferFetcher>,
    config: SweepConfig,
}

/// Outcome of refreshing one item.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub item: ItemRecord,
    pub result: Result<SweepReport, PriceError>,
}

impl SweepOrchestrator {
    pub fn new(fetcher: Arc<OfferFetcher>, config: SweepConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn fetcher(&self) -> &OfferFetcher {
        &self.fetcher
    }

    /// Sweep every mutation in the catalog.
    pub async fn sweep_item(
        &self,
        item: &str,
        rarity: Rarity,
        deadline: Option<Instant>,
    ) -> Result<SweepReport, PriceError> {
        let mutations: Vec<Mutation> = self.fetcher.mutations().iter().cloned().collect();
        Ok(self.run(item, rarity, &mutations, deadline).await)
    }

    /// Sweep a chosen subset of mutations. Any unknown key aborts the
    /// sweep before a request is sent. Results still follow catalog order.
    pub async fn sweep_item_mutations<S: AsRef<str>>(
        &self,
        item: &str,
        rarity: Rarity,
        keys: &[S],
        deadline: Option<Instant>,
    ) -> Result<SweepReport, PriceError> {
        let mut mutations = Vec::with_capacity(keys.len());
        for key in keys {
            let mutation = self
                .fetcher
                .mutations()
                .resolve(key.as_ref())
                .ok_or_else(|| PriceError::UnknownMutation(key.as_ref().to_lowercase()))?;
            if !mutations.iter().any(|m: &Mutation| m.id == mutation.id) {
                mutations.push(mutation.clone());
            }
        }
        mutations.sort_by_key(|m| m.id);
        Ok(self.run(item, rarity, &mutations, deadline).await)
    }

    async fn run(
        &self,
        item: &str,
        rarity: Rarity,
        mutations: &[Mutation],
        deadline: Option<Instant>,
    ) -> SweepReport {
        let started_at = Utc::now();
        let sweep_id = Uuid::new_v4();
        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        let mut deadline_exceeded = false;

        info!(%sweep_id, item, rarity = %rarity, mutations = mutations.len(), "Starting sweep");

        for (i, mutation) in mutations.iter().enumerate() {
            if i > 0 {
                let pacing = self.config.pacing();
                if deadline.is_some_and(|d| Instant::now() + pacing >= d) {
                    deadline_exceeded = true;
                    break;
                }
                tokio::time::sleep(pacing).await;
            }

            let query = ItemQuery::new(item, rarity, mutation.key.clone());
            match self.fetcher.fetch_price(&query, deadline).await {
                Ok(PriceResult::Found { price, listing_count }) => entries.push(SweepEntry {
                    mutation: mutation.key.clone(),
                    mutation_id: mutation.id,
                    price,
                    listing_count,
                    suspect: Vec::new(),
                }),
                Ok(PriceResult::Absent { reason }) => skipped.push(SkippedMutation {
                    mutation: mutation.key.clone(),
                    reason: reason.to_string(),
                }),
                Err(e) => {
                    warn!(item, mutation = %mutation.key, error = %e, "Mutation fetch failed");
                    skipped.push(SkippedMutation {
                        mutation: mutation.key.clone(),
                        reason: e.to_string(),
                    });
                    if e == PriceError::DeadlineExceeded {
                        deadline_exceeded = true;
                        break;
                    }
                }
            }
        }

        flag_suspects(&mut entries, rarity, &self.config);

        let report = SweepReport {
            sweep_id,
            item: item.to_string(),
            rarity,
            started_at,
            finished_at: Utc::now(),
            entries,
            skipped,
            deadline_exceeded,
        };
        if deadline_exceeded {
            warn!(%sweep_id, item, "Sweep stopped at deadline");
        }
        info!(%sweep_id, summary = %report, "Sweep complete");
        report
    }

    /// Sweep several items, at most `max_parallel_items` at once.
    /// Inactive items are skipped.
    pub async fn sweep_items(&self, items: &[ItemRecord]) -> Vec<RefreshOutcome> {
        let active: Vec<ItemRecord> = items.iter().filter(|i| i.active).cloned().collect();
        let parallel = self.config.max_parallel_items.max(1);

        stream::iter(active)
            .map(|item| async move {
                let result = self.sweep_item(&item.name, item.rarity, None).await;
                RefreshOutcome { item, result }
            })
            .buffer_unordered(parallel)
            .collect()
            .await
    }

    /// Sweep items and hand each resulting price table to `sink`.
    /// Returns the reports that were produced.
    pub async fn refresh(&self, items: &[ItemRecord], sink: &dyn PriceTableSink) -> Vec<SweepReport> {
        let mut reports = Vec::new();
        for outcome in self.sweep_items(items).await {
            match outcome.result {
                Ok(report) => {
                    if let Err(e) = sink.store(&report.price_table()).await {
                        warn!(item = %outcome.item.name, error = %e, "Failed to store price table");
                    }
                    reports.push(report);
                }
                Err(e) => {
                    warn!(item = %outcome.item.name, error = %e, "Sweep aborted");
                }
            }
        }
        reports
    }
}

/// Attach advisory suspect flags to non-default entries.
pub fn flag_suspects(entries: &mut [SweepEntry], rarity: Rarity, cfg: &SweepConfig) {
    let default_price = entries
        .iter()
        .find(|e| e.mutation == DEFAULT_MUTATION)
        .map(|e| e.price)
        .unwrap_or(Decimal::ZERO);
    let minimum = cfg.min_listings(rarity);

    for entry in entries.iter_mut().filter(|e| e.mutation != DEFAULT_MUTATION) {
        if entry.listing_count < minimum {
            entry.suspect.push(SuspectFlag::LowListingCount {
                count: entry.listing_count,
                minimum,
            });
        }

        if default_price > Decimal::ZERO {
            if entry.price > default_price * cfg.max_default_ratio {
                entry.suspect.push(SuspectFlag::FarAboveDefault {
                    price: entry.price,
                    default_price,
                    max_ratio: cfg.max_default_ratio,
                });
            }
            if entry.price < default_price * cfg.min_default_ratio {
                entry.suspect.push(SuspectFlag::FarBelowDefault {
                    price: entry.price,
                    default_price,
                    min_ratio: cfg.min_default_ratio,
                });
            }
        } else {
            entry.suspect.push(SuspectFlag::NoBaseline);
        }

        if entry.is_suspect() {
            warn!(
                mutation = %entry.mutation,
                price = %entry.price,
                listings = entry.listing_count,
                flags = entry.suspect.len(),
                "Suspect mutation price"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
