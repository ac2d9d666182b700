use crate::{
    DocumentRecord, DocumentStatus, IntakeError, TagEntry, UniversityCatalog,
};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_file_name(
        &self,
        file_name: &str,
    ) -> Result<Option<DocumentRecord>, IntakeError>;

    async fn create_document(
        &self,
        file_name: &str,
        status: DocumentStatus,
    ) -> Result<DocumentRecord, IntakeError>;

    async fn update_status(
        &self,
        document_id: i64,
        status: DocumentStatus,
    ) -> Result<(), IntakeError>;

    /// Records the archived file name when collision suffixing renamed it.
    async fn update_file_name(
        &self,
        document_id: i64,
        file_name: &str,
    ) -> Result<(), IntakeError>;

    /// Conditional transition: succeeds only when the stored status still
    /// equals `expected`. Returns false when another worker won the race.
    async fn claim_status(
        &self,
        document_id: i64,
        expected: DocumentStatus,
        next: DocumentStatus,
    ) -> Result<bool, IntakeError>;

    async fn list_awaiting_pull(&self) -> Result<Vec<DocumentRecord>, IntakeError>;

    async fn resume_exists(&self, document_id: i64) -> Result<bool, IntakeError>;

    async fn insert_resume(&self, row: &Value) -> Result<(), IntakeError>;
}

/// Completion oracle seam. `None` means the model had nothing usable and the
/// caller takes its rule-based fallback path.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str, text: &str, max_tokens: Option<u32>) -> Option<String>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load_tags(&self) -> Result<Vec<TagEntry>, IntakeError>;

    async fn load_universities(&self) -> Result<UniversityCatalog, IntakeError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads the bytes under `object_key` and returns the public URL.
    async fn put_object(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, IntakeError>;

    async fn get_object(&self, location: &str) -> Result<Vec<u8>, IntakeError>;
}
