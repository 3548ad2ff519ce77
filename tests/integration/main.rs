//! End-to-end tests driving the appraiser through a scripted listing source.

mod mock_source;
mod pipeline;
