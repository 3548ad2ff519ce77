//! External marketplace integration.
//!
//! Defines the `ListingSource` trait the engine fetches offers through,
//! and the reqwest-backed client for the live listings API.

pub mod listings_api;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{Listing, Rarity};

/// One search against the listings endpoint. Built by the fetcher after
/// mutation and alias resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub category: String,
    pub rarity: Rarity,
    /// External (post-alias) item name.
    pub name: String,
    /// External mutation attribute id.
    pub attribute_id: u32,
    pub page_size: u32,
    /// Only set for the rarest tier.
    pub min_price: Option<Decimal>,
}

/// What the listings endpoint answered.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchReply {
    /// 2xx with a parsed body, ascending by price as requested.
    Listings(Vec<Listing>),
    /// Any non-2xx status.
    Status(u16),
}

/// Failure below the HTTP status level.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out")]
    Timeout,
    #[error("failed to decode listings response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether the same request may succeed when sent again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Decode(_))
    }
}

/// Abstraction over the offer-listing service.
///
/// Implementors issue exactly one request per call; retry and backoff
/// live in the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchReply, TransportError>;
}
