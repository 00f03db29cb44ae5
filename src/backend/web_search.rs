use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::RetrievalGateway;
use crate::backend::utils::{check_response_status, handle_http_error};
use crate::error::GatewayError;
use crate::model::{Citation, RetrievedDocument};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Retrieval gateway for a Tavily-style web search API.
///
/// Results are keyed by URL. The raw page content is used as the document's
/// full text when the service provides it, otherwise the result snippet.
pub struct WebSearchGateway {
    api_key: String,
    base_url: String,
    /// Source recorded in citations; defaults to the id the engine searched
    source_label: Option<String>,
    search_depth: &'static str,
    timeout: Option<Duration>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    include_raw_content: bool,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    raw_content: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

impl SearchResult {
    fn into_document(self, source: &str) -> RetrievedDocument {
        let full_text = match self.raw_content {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => self.content,
        };
        // published_date looks like "2024-03-18" or an RFC 2822 date; keep the year only
        let year = self
            .published_date
            .as_deref()
            .and_then(|d| d.split(|c: char| !c.is_ascii_digit()).find(|p| p.len() == 4))
            .map(str::to_string);
        RetrievedDocument {
            external_id: self.url.clone(),
            title: self.title,
            full_text,
            citation: Citation {
                source: source.to_string(),
                year,
                external_id: self.url.clone(),
                url: Some(self.url),
                authors: Vec::new(),
            },
        }
    }
}

impl WebSearchGateway {
    #[instrument(name = "web_search_gateway_new", skip(api_key))]
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(GatewayError::Rejected {
                status: 401,
                message: "web search API key is empty".to_string(),
            });
        }
        info!("Creating new web search gateway");
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            source_label: None,
            search_depth: "advanced",
            timeout: None,
            client: reqwest::Client::new(),
        })
    }

    /// Create a gateway reading the API key from `TAVILY_API_KEY`.
    #[instrument(name = "web_search_gateway_from_env")]
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = std::env::var("TAVILY_API_KEY").map_err(|_| GatewayError::Rejected {
            status: 401,
            message: "TAVILY_API_KEY is not set".to_string(),
        })?;
        Self::new(api_key)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        debug!(new_base_url = %base_url, "Setting base URL");
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Record this label as the citation source instead of the searched source id.
    pub fn source_id(mut self, source: impl Into<String>) -> Self {
        self.source_label = Some(source.into());
        self
    }

    /// Use the cheaper "basic" search depth
    pub fn basic_depth(mut self) -> Self {
        self.search_depth = "basic";
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        debug!(new_timeout = ?timeout, "Setting timeout");
        self.timeout = Some(timeout);
        self
    }

    pub fn build(mut self) -> Self {
        let mut client_builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        self.client = client_builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build reqwest client with timeout, using default");
            reqwest::Client::new()
        });
        info!(base_url = %self.base_url, depth = self.search_depth, "Web search gateway configuration complete");
        self
    }
}

#[async_trait]
impl RetrievalGateway for WebSearchGateway {
    #[instrument(name = "web_search", skip(self, query), fields(query_len = query.len()))]
    async fn search(
        &self,
        source_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievedDocument>, GatewayError> {
        let request = SearchRequest {
            query,
            max_results,
            include_raw_content: true,
            search_depth: self.search_depth,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| handle_http_error(e, "web search"))?;
        let response = check_response_status(response, "web search").await?;

        let body: SearchResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse web search response");
            GatewayError::MalformedOutput(e.to_string())
        })?;

        let source = self.source_label.as_deref().unwrap_or(source_id);
        let documents: Vec<RetrievedDocument> = body
            .results
            .into_iter()
            .take(max_results)
            .map(|r| r.into_document(source))
            .collect();
        debug!(source, count = documents.len(), "Web search returned documents");
        Ok(documents)
    }
}
