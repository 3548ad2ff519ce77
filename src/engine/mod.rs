//! Core engine: fetch, filter and select, swept across mutations.

pub mod fetcher;
pub mod filters;
pub mod sweep;

use thiserror::Error;

/// Why a single price fetch failed outright.
///
/// "No trustworthy price" outcomes are not errors; they come back as
/// `PriceResult::Absent`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PriceError {
    /// Mutation key absent from the catalog. No request was sent.
    #[error("unknown mutation: {0}")]
    UnknownMutation(String),
    /// Non-2xx status other than 404/429. Not retried.
    #[error("listings API returned HTTP {0}")]
    HttpError(u16),
    /// 404/429 on every attempt.
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    /// Transport failure on the final attempt, or an undecodable body.
    #[error("fetch failed: {0}")]
    FetchError(String),
    /// The caller's deadline passed before a result was available.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl PriceError {
    /// Whether this error must abort a whole sweep.
    pub fn aborts_sweep(&self) -> bool {
        matches!(self, PriceError::UnknownMutation(_) | PriceError::DeadlineExceeded)
    }
}
