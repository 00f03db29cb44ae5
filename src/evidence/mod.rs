//! Evidence store: where full retrieved documents live.
//!
//! The pipeline state only ever carries an [`EvidenceRef`](crate::EvidenceRef)
//! (id, title, summary, citation). The full text is written here once and
//! read back on demand by downstream consumers.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

use crate::error::EvidenceError;
use crate::model::{DocumentId, EvidenceDocument};

/// Shared, append-only document cache keyed by [`DocumentId`].
///
/// Cloning the store is cheap and every clone sees the same documents, so
/// one store can outlive many pipeline runs. Writes are insert-if-absent:
/// the id scheme guarantees that two writers racing on the same id carry the
/// same content, so the first write wins and later ones are no-ops.
///
/// # Examples
///
/// ```
/// use clinflow::{Citation, EvidenceDocument, EvidenceStore, DocumentId};
///
/// let store = EvidenceStore::new();
/// let doc = EvidenceDocument {
///     id: DocumentId::new("pubmed", "12345678"),
///     title: "Clinical Review".into(),
///     full_text: "Full abstract text".into(),
///     citation: Citation {
///         source: "pubmed".into(),
///         year: Some("2024".into()),
///         external_id: "12345678".into(),
///         url: None,
///         authors: vec![],
///     },
/// };
/// assert!(store.insert(doc));
/// let read = store.get(&DocumentId::new("pubmed", "12345678")).unwrap();
/// assert_eq!(read.full_text, "Full abstract text");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EvidenceStore {
    documents: Arc<RwLock<HashMap<DocumentId, Arc<EvidenceDocument>>>>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document unless one with the same id is already present.
    ///
    /// Returns `true` when this call inserted the document.
    pub fn insert(&self, document: EvidenceDocument) -> bool {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if documents.contains_key(&document.id) {
            trace!(id = %document.id, "Evidence document already stored");
            return false;
        }
        debug!(
            id = %document.id,
            text_len = document.full_text.len(),
            "Storing evidence document"
        );
        documents.insert(document.id.clone(), Arc::new(document));
        true
    }

    pub fn get(&self, id: &DocumentId) -> Result<Arc<EvidenceDocument>, EvidenceError> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| EvidenceError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
