use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::GatewayError;
use crate::model::RetrievedDocument;

/// Capability interface to literature/search services.
///
/// A single implementation may serve several sources; the engine passes the
/// source id on every call and treats all sources the same way.
#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    async fn search(
        &self,
        source_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievedDocument>, GatewayError>;
}

/// Dispatches searches to the gateway registered for each source id.
///
/// # Examples
///
/// ```no_run
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use clinflow::{RetrievalRouter, WebSearchGateway};
///
/// let router = RetrievalRouter::new()
///     .register("web", WebSearchGateway::from_env()?.build());
/// # Ok(())
/// # }
/// ```
#[derive(Default, Clone)]
pub struct RetrievalRouter {
    routes: BTreeMap<String, Arc<dyn RetrievalGateway>>,
}

impl RetrievalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        source_id: impl Into<String>,
        gateway: impl RetrievalGateway + 'static,
    ) -> Self {
        let source_id = source_id.into();
        debug!(source_id, "Registering retrieval source");
        self.routes.insert(source_id, Arc::new(gateway));
        self
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

#[async_trait]
impl RetrievalGateway for RetrievalRouter {
    #[instrument(name = "router_search", skip(self, query))]
    async fn search(
        &self,
        source_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievedDocument>, GatewayError> {
        match self.routes.get(source_id) {
            Some(gateway) => gateway.search(source_id, query, max_results).await,
            None => {
                warn!(source_id, "No retrieval gateway registered for source");
                Err(GatewayError::UnknownSource(source_id.to_string()))
            }
        }
    }
}
