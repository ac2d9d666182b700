use crate::models::{DocumentRecord, DocumentStatus, TagEntry, UniversityCatalog};
use crate::traits::{CatalogStore, DocumentStore};
use crate::IntakeError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DOCUMENTS_TABLE: &str = "documents";
const RESUMES_TABLE: &str = "resumes";
const TAGS_TABLE: &str = "tags";
const UNIVERSITIES_TABLE: &str = "universities";

/// PostgREST-backed implementation of the document and catalog stores.
/// Conditional updates are expressed as filtered PATCHes with
/// `Prefer: return=representation`, so an empty result body means the
/// row no longer matched and another worker won the race.
pub struct RestStore {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, IntakeError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        url::Url::parse(&base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client: Arc::new(client),
            base_url,
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows(&self, response: reqwest::Response, table: &str) -> Result<Vec<Value>, IntakeError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IntakeError::BackendResponse {
                backend: table.to_string(),
                details: format!("{status}: {body}"),
            });
        }
        let parsed: Value = response.json().await?;
        Ok(parsed.as_array().cloned().unwrap_or_default())
    }
}

fn record_from_row(row: &Value) -> Option<DocumentRecord> {
    let id = row.get("id").and_then(Value::as_i64)?;
    let file_name = row.get("file_name").and_then(Value::as_str)?.to_string();
    let status = row
        .get("status")
        .and_then(Value::as_str)
        .and_then(DocumentStatus::from_str_opt)
        .unwrap_or(DocumentStatus::Pending);
    Some(DocumentRecord {
        id,
        file_name,
        source_location: row
            .get("source_location")
            .and_then(Value::as_str)
            .map(str::to_string),
        status,
        uploaded_by: row
            .get("uploaded_by")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn find_by_file_name(
        &self,
        file_name: &str,
    ) -> Result<Option<DocumentRecord>, IntakeError> {
        let response = self
            .request(self.client.get(self.table_url(DOCUMENTS_TABLE)))
            .query(&[
                ("file_name", format!("eq.{file_name}")),
                ("select", "*".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let rows = self.rows(response, DOCUMENTS_TABLE).await?;
        Ok(rows.first().and_then(record_from_row))
    }

    async fn create_document(
        &self,
        file_name: &str,
        status: DocumentStatus,
    ) -> Result<DocumentRecord, IntakeError> {
        let response = self
            .request(self.client.post(self.table_url(DOCUMENTS_TABLE)))
            .header("Prefer", "return=representation")
            .json(&json!({
                "file_name": file_name,
                "status": status.as_str(),
            }))
            .send()
            .await?;

        let rows = self.rows(response, DOCUMENTS_TABLE).await?;
        rows.first()
            .and_then(record_from_row)
            .ok_or_else(|| IntakeError::BackendResponse {
                backend: DOCUMENTS_TABLE.to_string(),
                details: "insert returned no representation".to_string(),
            })
    }

    async fn update_status(
        &self,
        document_id: i64,
        status: DocumentStatus,
    ) -> Result<(), IntakeError> {
        let response = self
            .request(self.client.patch(self.table_url(DOCUMENTS_TABLE)))
            .query(&[("id", format!("eq.{document_id}"))])
            .json(&json!({ "status": status.as_str() }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntakeError::BackendResponse {
                backend: DOCUMENTS_TABLE.to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn update_file_name(
        &self,
        document_id: i64,
        file_name: &str,
    ) -> Result<(), IntakeError> {
        let response = self
            .request(self.client.patch(self.table_url(DOCUMENTS_TABLE)))
            .query(&[("id", format!("eq.{document_id}"))])
            .json(&json!({ "file_name": file_name }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntakeError::BackendResponse {
                backend: DOCUMENTS_TABLE.to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn claim_status(
        &self,
        document_id: i64,
        expected: DocumentStatus,
        next: DocumentStatus,
    ) -> Result<bool, IntakeError> {
        let response = self
            .request(self.client.patch(self.table_url(DOCUMENTS_TABLE)))
            .header("Prefer", "return=representation")
            .query(&[
                ("id", format!("eq.{document_id}")),
                ("status", format!("eq.{}", expected.as_str())),
            ])
            .json(&json!({ "status": next.as_str() }))
            .send()
            .await?;

        let rows = self.rows(response, DOCUMENTS_TABLE).await?;
        Ok(!rows.is_empty())
    }

    async fn list_awaiting_pull(&self) -> Result<Vec<DocumentRecord>, IntakeError> {
        let response = self
            .request(self.client.get(self.table_url(DOCUMENTS_TABLE)))
            .query(&[
                ("status", format!("eq.{}", DocumentStatus::Pending.as_str())),
                ("source_location", "not.is.null".to_string()),
                ("select", "*".to_string()),
            ])
            .send()
            .await?;

        let rows = self.rows(response, DOCUMENTS_TABLE).await?;
        Ok(rows.iter().filter_map(record_from_row).collect())
    }

    async fn resume_exists(&self, document_id: i64) -> Result<bool, IntakeError> {
        let response = self
            .request(self.client.get(self.table_url(RESUMES_TABLE)))
            .query(&[
                ("resume_file_id", format!("eq.{document_id}")),
                ("select", "id".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let rows = self.rows(response, RESUMES_TABLE).await?;
        Ok(!rows.is_empty())
    }

    async fn insert_resume(&self, row: &Value) -> Result<(), IntakeError> {
        let response = self
            .request(self.client.post(self.table_url(RESUMES_TABLE)))
            .json(row)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IntakeError::BackendResponse {
                backend: RESUMES_TABLE.to_string(),
                details: format!("{status}: {body}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for RestStore {
    async fn load_tags(&self) -> Result<Vec<TagEntry>, IntakeError> {
        let response = self
            .request(self.client.get(self.table_url(TAGS_TABLE)))
            .query(&[("select", "tag_name,category")])
            .send()
            .await?;

        let rows = self.rows(response, TAGS_TABLE).await?;
        let mut tags = Vec::new();
        for row in &rows {
            let Some(tag_name) = row.get("tag_name").and_then(Value::as_str) else {
                continue;
            };
            if tag_name.trim().is_empty() {
                continue;
            }
            tags.push(TagEntry {
                tag_name: tag_name.trim().to_string(),
                category: row
                    .get("category")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        Ok(tags)
    }

    async fn load_universities(&self) -> Result<UniversityCatalog, IntakeError> {
        let response = self
            .request(self.client.get(self.table_url(UNIVERSITIES_TABLE)))
            .query(&[("select", "name,tier")])
            .send()
            .await?;

        let rows = self.rows(response, UNIVERSITIES_TABLE).await?;
        let mut catalog = UniversityCatalog::default();
        for row in &rows {
            let Some(name) = row.get("name").and_then(Value::as_str) else {
                continue;
            };
            let name = name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            match row.get("tier").and_then(Value::as_str) {
                Some("985") => catalog.universities_985.push(name),
                Some("211") => catalog.universities_211.push(name),
                Some("double_first_class") => catalog.universities_double_first_class.push(name),
                _ => {}
            }
        }
        Ok(catalog)
    }
}
