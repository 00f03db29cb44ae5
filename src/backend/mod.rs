pub mod prompt;
pub mod reasoning;
pub mod retrieval;
pub mod utils;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pubmed")]
pub mod pubmed;
#[cfg(feature = "web-search")]
pub mod web_search;

pub use reasoning::{CaseSummary, DocumentExcerpt, PromptContext, ReasoningGateway, RequestKind};
pub use retrieval::{RetrievalGateway, RetrievalRouter};

#[cfg(feature = "openai")]
pub use openai::{Model as OpenAiModel, OpenAiGateway};
#[cfg(feature = "pubmed")]
pub use pubmed::PubMedGateway;
#[cfg(feature = "web-search")]
pub use web_search::WebSearchGateway;
