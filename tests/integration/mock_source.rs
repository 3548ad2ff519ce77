//! Mock listing source for integration testing.
//!
//! Provides a deterministic `ListingSource` that answers from scripted
//! per-mutation replies and records every request it receives. Entirely
//! in-memory with no network.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use appraiser::market::{ListingSource, SearchReply, SearchRequest, TransportError};
use appraiser::types::Listing;

pub type Reply = Result<SearchReply, TransportError>;

/// A request as seen by the mock, with its (virtual) arrival time.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: SearchRequest,
    pub at: Instant,
}

/// Scripted listing source.
///
/// Replies are queued per mutation attribute id; once a queue is empty
/// the id's fallback (or the global fallback) is returned.
pub struct MockSource {
    scripted: Mutex<HashMap<u32, VecDeque<Reply>>>,
    fallbacks: Mutex<HashMap<u32, Reply>>,
    default_reply: Reply,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockSource {
    /// A source that answers every search with no listings.
    pub fn new() -> Self {
        Self::with_default(Ok(SearchReply::Listings(Vec::new())))
    }

    pub fn with_default(default_reply: Reply) -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            fallbacks: Mutex::new(HashMap::new()),
            default_reply,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue one-shot replies for a mutation id, in order.
    pub fn script(self, attribute_id: u32, replies: Vec<Reply>) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .entry(attribute_id)
            .or_default()
            .extend(replies);
        self
    }

    /// Reply returned for a mutation id once its script runs out.
    pub fn always(self, attribute_id: u32, reply: Reply) -> Self {
        self.fallbacks.lock().unwrap().insert(attribute_id, reply);
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ListingSource for MockSource {
    async fn search(&self, request: &SearchRequest) -> Result<SearchReply, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            request: request.clone(),
            at: Instant::now(),
        });

        if let Some(reply) = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&request.attribute_id)
            .and_then(|q| q.pop_front())
        {
            return reply;
        }
        if let Some(reply) = self.fallbacks.lock().unwrap().get(&request.attribute_id) {
            return reply.clone();
        }
        self.default_reply.clone()
    }
}

/// Build a listing with the given price and seller reputation.
pub fn listing(price: Decimal, feedback: f64, ratings: u32, title: &str) -> Listing {
    Listing {
        offer_id: format!("offer-{price}-{ratings}"),
        title: title.to_string(),
        price,
        currency: "USD".to_string(),
        quantity: 1,
        seller_feedback_score: feedback,
        seller_rating_count: ratings,
    }
}

/// `count` trusted listings for `title`, starting at `price` and rising by 1.
pub fn trusted_listings(title: &str, price: Decimal, count: usize) -> Vec<Listing> {
    (0..count)
        .map(|i| listing(price + Decimal::from(i as u64), 99.0, 50, title))
        .collect()
}

pub fn listings(v: Vec<Listing>) -> Reply {
    Ok(SearchReply::Listings(v))
}

pub fn status(code: u16) -> Reply {
    Ok(SearchReply::Status(code))
}

// ---------------------------------------------------------------------------
// Self-tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_mock_scripts_then_falls_back() {
    let source = MockSource::new()
        .script(1, vec![status(429)])
        .always(1, status(500));

    let req = SearchRequest {
        category: "c".into(),
        rarity: appraiser::types::Rarity::Og,
        name: "Foo".into(),
        attribute_id: 1,
        page_size: 10,
        min_price: None,
    };
    assert_eq!(source.search(&req).await.unwrap(), SearchReply::Status(429));
    assert_eq!(source.search(&req).await.unwrap(), SearchReply::Status(500));

    let other = SearchRequest { attribute_id: 2, ..req };
    assert_eq!(source.search(&other).await.unwrap(), SearchReply::Listings(vec![]));
    assert_eq!(source.call_count(), 3);
}
