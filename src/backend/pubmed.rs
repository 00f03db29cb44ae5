use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::RetrievalGateway;
use crate::backend::utils::{check_response_status, handle_http_error};
use crate::error::GatewayError;
use crate::model::{Citation, RetrievedDocument};

const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Retrieval gateway for PubMed through the NCBI E-utilities.
///
/// A search is three steps: `esearch` for the PMIDs, `esummary` for titles,
/// journals, dates and authors, and one `efetch` per article for the plain
/// text abstract. An article whose abstract cannot be fetched is still
/// returned, with its bibliographic header as the full text.
pub struct PubMedGateway {
    base_url: String,
    api_key: Option<String>,
    tool: String,
    email: Option<String>,
    timeout: Option<Duration>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    esearchresult: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    result: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ArticleSummary {
    uid: String,
    #[serde(default)]
    title: String,
    /// Journal abbreviation
    #[serde(default)]
    source: String,
    /// e.g. "2024 Mar 18" or "2019"
    #[serde(default)]
    pubdate: String,
    #[serde(default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

impl ArticleSummary {
    fn year(&self) -> Option<String> {
        self.pubdate
            .split(|c: char| !c.is_ascii_digit())
            .find(|p| p.len() == 4)
            .map(str::to_string)
    }

    fn header(&self) -> String {
        match self.year() {
            Some(year) => format!("{}\n{} ({year})", self.title, self.source),
            None => format!("{}\n{}", self.title, self.source),
        }
    }

    fn into_document(self, source: &str, abstract_text: Option<String>) -> RetrievedDocument {
        let full_text = match abstract_text {
            Some(text) if !text.trim().is_empty() => format!("{}\n\n{}", self.header(), text.trim()),
            _ => self.header(),
        };
        RetrievedDocument {
            external_id: self.uid.clone(),
            title: self.title.clone(),
            full_text,
            citation: Citation {
                source: source.to_string(),
                year: self.year(),
                url: Some(format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.uid)),
                external_id: self.uid,
                authors: self.authors.into_iter().map(|a| a.name).collect(),
            },
        }
    }
}

impl PubMedGateway {
    /// E-utilities work without a key at a lower rate limit.
    #[instrument(name = "pubmed_gateway_new")]
    pub fn new() -> Self {
        info!("Creating new PubMed gateway");
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            tool: "clinflow".to_string(),
            email: None,
            timeout: None,
            client: reqwest::Client::new(),
        }
    }

    /// Create a gateway using `NCBI_API_KEY` when it is set.
    #[instrument(name = "pubmed_gateway_from_env")]
    pub fn from_env() -> Self {
        let gateway = Self::new();
        match std::env::var("NCBI_API_KEY") {
            Ok(key) if !key.is_empty() => gateway.api_key(key),
            _ => {
                debug!("NCBI_API_KEY not set, using unauthenticated rate limit");
                gateway
            }
        }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        debug!("Setting NCBI API key");
        self.api_key = Some(api_key.into());
        self
    }

    /// Contact address NCBI asks E-utilities clients to send.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        debug!(new_base_url = %base_url, "Setting base URL");
        self.base_url = base_url.trim_end_matches('/').to_string();
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
        info!(base_url = %self.base_url, keyed = self.api_key.is_some(), "PubMed gateway configuration complete");
        self
    }

    /// Parameters every E-utilities request carries.
    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string()), ("tool", self.tool.clone())];
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    async fn get(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .get(format!("{}/{endpoint}", self.base_url))
            .query(&self.common_params())
            .query(params)
            .send()
            .await
            .map_err(|e| handle_http_error(e, "PubMed"))?;
        check_response_status(response, "PubMed").await
    }

    async fn search_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>, GatewayError> {
        let params = [
            ("term", query.to_string()),
            ("retmax", max_results.to_string()),
            ("retmode", "json".to_string()),
            ("sort", "relevance".to_string()),
        ];
        let body: SearchResponse = self.get("esearch.fcgi", &params).await?.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse esearch response");
            GatewayError::MalformedOutput(e.to_string())
        })?;
        Ok(body.esearchresult.idlist)
    }

    async fn summaries(&self, ids: &[String]) -> Result<Vec<ArticleSummary>, GatewayError> {
        let params = [("id", ids.join(",")), ("retmode", "json".to_string())];
        let mut body: SummaryResponse = self.get("esummary.fcgi", &params).await?.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse esummary response");
            GatewayError::MalformedOutput(e.to_string())
        })?;

        let mut articles = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(entry) = body.result.remove(id.as_str()) else {
                warn!(pmid = %id, "No summary returned for article");
                continue;
            };
            let article: ArticleSummary = serde_json::from_value(entry)?;
            articles.push(article);
        }
        Ok(articles)
    }

    async fn abstract_text(&self, pmid: &str) -> Result<String, GatewayError> {
        let params = [
            ("id", pmid.to_string()),
            ("rettype", "abstract".to_string()),
            ("retmode", "text".to_string()),
        ];
        self.get("efetch.fcgi", &params)
            .await?
            .text()
            .await
            .map_err(|e| handle_http_error(e, "PubMed"))
    }
}

impl Default for PubMedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RetrievalGateway for PubMedGateway {
    #[instrument(name = "pubmed_search", skip(self, query), fields(query_len = query.len()))]
    async fn search(
        &self,
        source_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievedDocument>, GatewayError> {
        let ids = self.search_ids(query, max_results).await?;
        if ids.is_empty() {
            debug!("PubMed search matched no articles");
            return Ok(Vec::new());
        }

        let articles = self.summaries(&ids).await?;
        let mut documents = Vec::with_capacity(articles.len());
        for article in articles {
            let abstract_text = match self.abstract_text(&article.uid).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(pmid = %article.uid, error = %e, "Abstract unavailable, keeping summary only");
                    None
                }
            };
            documents.push(article.into_document(source_id, abstract_text));
        }
        debug!(source = source_id, count = documents.len(), "PubMed returned documents");
        Ok(documents)
    }
}
