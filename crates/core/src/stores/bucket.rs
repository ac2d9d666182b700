use crate::traits::ObjectStore;
use crate::IntakeError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Object storage over the backend's HTTP storage API. Uploads land in a
/// fixed bucket; the returned URL is the public object path.
pub struct BucketObjectStore {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl BucketObjectStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self, IntakeError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        url::Url::parse(&base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client: Arc::new(client),
            base_url,
            api_key: api_key.into(),
            bucket: bucket.into(),
        })
    }

    fn object_url(&self, object_key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, object_key
        )
    }

    fn public_url(&self, object_key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, object_key
        )
    }
}

#[async_trait]
impl ObjectStore for BucketObjectStore {
    async fn put_object(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, IntakeError> {
        let response = self
            .client
            .post(self.object_url(object_key))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IntakeError::BackendResponse {
                backend: "storage".to_string(),
                details: format!("{status}: {body}"),
            });
        }
        Ok(self.public_url(object_key))
    }

    async fn get_object(&self, location: &str) -> Result<Vec<u8>, IntakeError> {
        let response = self
            .client
            .get(location)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntakeError::BackendResponse {
                backend: "storage".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
