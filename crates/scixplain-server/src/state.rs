use scixplain::communicator::CommunicatorConfig;
use scixplain::datasources::{DatasourceEngine, PageStore};
use scixplain::providers::base::Provider;
use scixplain::token_counter::TokenCount;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state. Everything in here is read-only once the server starts.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
    pub wiki: Arc<dyn PageStore>,
    pub token_counter: Arc<dyn TokenCount>,
    pub communicator: CommunicatorConfig,
    pub request_timeout: Duration,
}

impl AppState {
    /// Page store serving the first requested engine; wiki when none is requested
    pub fn page_store(&self, engines: &[DatasourceEngine]) -> Arc<dyn PageStore> {
        match engines.first() {
            Some(DatasourceEngine::Wiki) | None => self.wiki.clone(),
        }
    }
}
