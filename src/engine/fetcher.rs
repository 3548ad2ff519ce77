//! Offer fetcher.
//!
//! Resolves a query into one listings search, retries 404/429 and
//! transport failures with linear backoff, then runs the filter pipeline
//! to a single `PriceResult`. Stateless apart from its shared catalogs.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::filters;
use super::PriceError;
use crate::catalog::{MutationCatalog, NameAliases};
use crate::config::{AppConfig, FetchConfig, OutlierConfig, TrustConfig};
use crate::market::{ListingSource, SearchReply, SearchRequest};
use crate::types::{ItemQuery, Listing, PriceResult};

/// HTTP statuses meaning "rate limited" or "not indexed yet".
fn is_retryable_status(status: u16) -> bool {
    status == 404 || status == 429
}

/// Last retryable failure seen, used to pick the terminal error.
enum RetryCause {
    Status(u16),
    Transport(String),
}

/// Fetches and prices one (item, rarity, mutation) combination.
pub struct OfferFetcher {
    source: Arc<dyn ListingSource>,
    mutations: Arc<MutationCatalog>,
    aliases: Arc<NameAliases>,
    category: String,
    page_size: u32,
    fetch: FetchConfig,
    trust: TrustConfig,
    outliers: OutlierConfig,
}

impl OfferFetcher {
    pub fn new(
        source: Arc<dyn ListingSource>,
        mutations: Arc<MutationCatalog>,
        aliases: Arc<NameAliases>,
        config: &AppConfig,
    ) -> Self {
        Self {
            source,
            mutations,
            aliases,
            category: config.listings_api.category.clone(),
            page_size: config.listings_api.page_size,
            fetch: config.fetch.clone(),
            trust: config.trust.clone(),
            outliers: config.outliers.clone(),
        }
    }

    pub fn mutations(&self) -> &MutationCatalog {
        &self.mutations
    }

    /// Build the search for a query. Fails on unknown mutations.
    pub fn build_request(&self, query: &ItemQuery) -> Result<SearchRequest, PriceError> {
        let mutation = self
            .mutations
            .resolve(&query.mutation_key)
            .ok_or_else(|| PriceError::UnknownMutation(query.mutation_key.clone()))?;

        Ok(SearchRequest {
            category: self.category.clone(),
            rarity: query.rarity,
            name: self.aliases.external_name(&query.item_name).to_string(),
            attribute_id: mutation.id,
            page_size: self.page_size,
            min_price: query.rarity.is_rarest().then_some(self.fetch.og_price_floor),
        })
    }

    /// Price one combination, optionally bounded by a deadline.
    pub async fn fetch_price(
        &self,
        query: &ItemQuery,
        deadline: Option<Instant>,
    ) -> Result<PriceResult, PriceError> {
        let request = self.build_request(query)?;
        let raw = self.fetch_listings(&request, deadline).await?;
        let raw_count = raw.len();

        let names = [query.item_name.as_str(), request.name.as_str()];
        let result = filters::evaluate(raw, &names, &self.trust, &self.outliers);
        info!(
            item = %query.item_name,
            rarity = %query.rarity,
            mutation = %query.mutation_key,
            raw_count,
            result = %result,
            "Priced variant"
        );
        Ok(result)
    }

    /// Send the search, retrying retryable failures.
    async fn fetch_listings(
        &self,
        request: &SearchRequest,
        deadline: Option<Instant>,
    ) -> Result<Vec<Listing>, PriceError> {
        let max_attempts = self.fetch.max_attempts.max(1);
        let mut last_cause = RetryCause::Status(429);

        for attempt in 1..=max_attempts {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(PriceError::DeadlineExceeded);
            }

            let reply = match deadline {
                Some(d) => tokio::time::timeout_at(d, self.source.search(request))
                    .await
                    .map_err(|_| PriceError::DeadlineExceeded)?,
                None => self.source.search(request).await,
            };

            match reply {
                Ok(SearchReply::Listings(listings)) => {
                    debug!(attempt, count = listings.len(), name = %request.name, "Listings fetched");
                    return Ok(listings);
                }
                Ok(SearchReply::Status(status)) if is_retryable_status(status) => {
                    warn!(status, attempt, name = %request.name, "Retryable listings API status");
                    last_cause = RetryCause::Status(status);
                }
                Ok(SearchReply::Status(status)) => {
                    warn!(status, name = %request.name, "Listings API error");
                    return Err(PriceError::HttpError(status));
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, error = %e, name = %request.name, "Listings request failed");
                    last_cause = RetryCause::Transport(e.to_string());
                }
                Err(e) => return Err(PriceError::FetchError(e.to_string())),
            }

            if attempt < max_attempts {
                let delay = self.backoff_delay(attempt);
                if deadline.is_some_and(|d| Instant::now() + delay >= d) {
                    return Err(PriceError::DeadlineExceeded);
                }
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }

        Err(match last_cause {
            RetryCause::Status(_) => PriceError::RateLimited { attempts: max_attempts },
            RetryCause::Transport(msg) => PriceError::FetchError(msg),
        })
    }

    /// Wait after failed attempt `attempt` (1-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.fetch.backoff_step() * attempt
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
