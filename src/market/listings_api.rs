//! Offer-listing marketplace API client.
//!
//! Issues one GET per search against `{base_url}/offers/search` and maps
//! the JSON body into `Listing`s. Transport failures and non-2xx
//! statuses are reported back to the engine, which owns retry policy.
//!
//! Auth: optional `Authorization: Bearer {token}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ListingSource, SearchReply, SearchRequest, TransportError};
use crate::config::ListingsApiConfig;
use crate::types::Listing;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ApiResult>,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    offer: ApiOffer,
    #[serde(default)]
    seller: ApiSeller,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiOffer {
    id: String,
    #[serde(default)]
    title: String,
    unit_price: ApiMoney,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct ApiMoney {
    amount: Decimal,
    #[serde(default)]
    currency: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSeller {
    #[serde(default)]
    feedback_score: f64,
    #[serde(default)]
    rating_count: u32,
}

fn default_quantity() -> u32 {
    1
}

impl From<ApiResult> for Listing {
    fn from(r: ApiResult) -> Self {
        Listing {
            offer_id: r.offer.id,
            title: r.offer.title,
            price: r.offer.unit_price.amount,
            currency: r.offer.unit_price.currency,
            quantity: r.offer.quantity,
            seller_feedback_score: r.seller.feedback_score,
            seller_rating_count: r.seller.rating_count,
        }
    }
}

/// Parse a listings response body.
fn parse_listings(body: &str) -> Result<Vec<Listing>, TransportError> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))?;
    debug!(
        returned = resp.results.len(),
        total = ?resp.total_count,
        "Parsed listings response"
    );
    Ok(resp.results.into_iter().map(Listing::from).collect())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Live listings API client.
pub struct ListingsApiClient {
    http: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl ListingsApiClient {
    /// Create a client. `token` is only needed if the deployment requires auth.
    pub fn new(config: &ListingsApiConfig, token: Option<SecretString>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client for listings API")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Full search URL for a request.
    fn search_url(&self, req: &SearchRequest) -> String {
        let mut url = format!(
            "{}/offers/search?category={}&rarity={}&name={}&attributeId={}&pageSize={}&sort=price_asc",
            self.base_url,
            urlencoding::encode(&req.category),
            urlencoding::encode(&req.rarity.to_string()),
            urlencoding::encode(&req.name),
            req.attribute_id,
            req.page_size,
        );
        if let Some(floor) = req.min_price {
            url.push_str(&format!("&minPrice={floor}"));
        }
        url
    }
}

#[async_trait]
impl ListingSource for ListingsApiClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchReply, TransportError> {
        let url = self.search_url(request);
        debug!(url = %url, "Querying listings API");

        let mut builder = self.http.get(&url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(SearchReply::Status(status.as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        parse_listings(&body).map(SearchReply::Listings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
