use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an evidence document: `<source>:<external id>`.
///
/// The same source and external id always produce the same id, which is what
/// makes concurrent store writes idempotent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(source: &str, external_id: &str) -> Self {
        Self(format!("{source}:{external_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Retrieval source that produced the document
    pub source: String,
    #[serde(default)]
    pub year: Option<String>,
    /// Identifier within the source (PMID, URL, ...)
    pub external_id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl Citation {
    /// Short reference line, e.g. `Smith J et al. pubmed. 2024. ID: 12345678`.
    pub fn format(&self) -> String {
        let mut out = match self.authors.first() {
            Some(first) => format!("{first} et al. {}", self.source),
            None => self.source.clone(),
        };
        if let Some(year) = &self.year {
            out.push_str(&format!(". {year}"));
        }
        out.push_str(&format!(". ID: {}", self.external_id));
        out
    }
}

/// A document as returned by a retrieval source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub external_id: String,
    pub title: String,
    pub full_text: String,
    pub citation: Citation,
}

/// A retrieved document with its full text, owned by the evidence store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceDocument {
    pub id: DocumentId,
    pub title: String,
    pub full_text: String,
    pub citation: Citation,
}

impl EvidenceDocument {
    pub fn from_retrieved(source: &str, document: RetrievedDocument) -> Self {
        Self {
            id: DocumentId::new(source, &document.external_id),
            title: document.title,
            full_text: document.full_text,
            citation: document.citation,
        }
    }
}

/// What the pipeline state keeps of a document: a reference and a summary,
/// never the full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub document_id: DocumentId,
    pub title: String,
    pub summary: String,
    pub citation: Citation,
}
