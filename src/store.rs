//! Storage and transport of documents. Implemented outside this crate.

use crate::attestation::SignatureAttestation;
use crate::document::{Document, DocumentStatus};
use crate::Error;
use async_trait::async_trait;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch stored bytes. Fails with [`Error::Transport`].
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, Error>;

    /// Record the signer's approval. `composited` is `None` when no visual
    /// artifact could be produced; the approval is recorded anyway.
    async fn persist_signed_document(
        &self,
        document_id: &str,
        attestation: &SignatureAttestation,
        composited: Option<Vec<u8>>,
    ) -> Result<Document, Error>;

    /// Store the uploader's review outcome.
    async fn update_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        reason: Option<String>,
    ) -> Result<Document, Error>;
}
