use std::sync::Arc;

use crate::interests::aggregator::InterestAggregator;
use crate::store::PostStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<InterestAggregator>,
    /// Raw store access for the debug endpoint; scoring goes through the aggregator.
    pub store: Arc<dyn PostStore>,
}
