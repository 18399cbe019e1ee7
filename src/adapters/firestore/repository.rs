use super::auth::{ServiceAccount, TokenProvider};
use super::values::{document_to_json, encode_fields};
use crate::domain::moderation::{ModerationResult, ModerationStatus};
use crate::domain::records::{MalformedRecord, PendingRecord, VideoRecord};
use crate::error::StoreError;
use crate::ports::repository::RecordStore;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Fields written by `save_moderation`, besides the server-side transforms.
const UPDATED_FIELDS: [&str; 4] = [
    "aiVideoModerationOutput",
    "aiVideoModerationStatus",
    "updateSource",
    "updateSourceCF",
];

/// FirestoreStore implements RecordStore over the Firestore REST API.
pub struct FirestoreStore {
    http: reqwest::Client,
    tokens: TokenProvider,
    collection: String,
    update_source: String,
    update_source_cf: String,
}

impl FirestoreStore {
    pub async fn from_credentials(
        credentials: &Path,
        collection: &str,
        update_source: &str,
        update_source_cf: &str,
    ) -> Result<Self, StoreError> {
        let account = ServiceAccount::from_file(credentials).await?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            tokens: TokenProvider::new(http.clone(), account),
            http,
            collection: collection.to_string(),
            update_source: update_source.to_string(),
            update_source_cf: update_source_cf.to_string(),
        })
    }

    fn database(&self) -> String {
        format!("projects/{}/databases/(default)", self.tokens.project_id())
    }

    async fn post(&self, action: &str, body: &Value) -> Result<reqwest::Response, StoreError> {
        let url = format!("{}/{}/documents:{}", FIRESTORE_API, self.database(), action);
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

fn send_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::DeadlineExceeded(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> StoreError {
    let message = format!("{}: {}", status, body);
    if status == StatusCode::GATEWAY_TIMEOUT || body.contains("DEADLINE_EXCEEDED") {
        StoreError::DeadlineExceeded(message)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        StoreError::Auth(message)
    } else {
        StoreError::Backend(message)
    }
}

fn pending_query(collection: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "aiVideoModerationStatus" },
                    "op": "EQUAL",
                    "value": { "stringValue": ModerationStatus::Failed.as_str() }
                }
            }
        }
    })
}

/// Turns a `runQuery` response into records. Documents that do not decode
/// are kept as malformed entries.
fn decode_query_results(results: &[Value]) -> Vec<PendingRecord> {
    results
        .iter()
        .filter_map(|entry| entry.get("document"))
        .map(|document| {
            let name = document.get("name").and_then(Value::as_str).unwrap_or_default();
            let record = match document_to_json(document) {
                Ok(flat) => VideoRecord::from_document(flat),
                Err(e) => Err(MalformedRecord {
                    id: name.rsplit('/').next().unwrap_or_default().to_string(),
                    error: e.to_string(),
                }),
            };
            if let Err(malformed) = &record {
                warn!("Document {} does not decode: {}", name, malformed.error);
            }
            record
        })
        .collect()
}

fn commit_body(
    document_name: &str,
    result: &ModerationResult,
    update_source: &str,
    update_source_cf: &str,
) -> Result<Value, StoreError> {
    let output = serde_json::to_value(result).map_err(|e| StoreError::Decode(e.to_string()))?;

    let mut fields = Map::new();
    fields.insert("aiVideoModerationOutput".into(), output);
    fields.insert(
        "aiVideoModerationStatus".into(),
        json!(result.moderation_status.as_str()),
    );
    fields.insert("updateSource".into(), json!(update_source));
    fields.insert("updateSourceCF".into(), json!(update_source_cf));

    Ok(json!({
        "writes": [{
            "update": { "name": document_name, "fields": encode_fields(&fields) },
            "updateMask": { "fieldPaths": UPDATED_FIELDS },
            "updateTransforms": [
                { "fieldPath": "updatedAt", "setToServerValue": "REQUEST_TIME" },
                { "fieldPath": "version", "increment": { "integerValue": "1" } }
            ],
            "currentDocument": { "exists": true }
        }]
    }))
}

#[async_trait]
impl RecordStore for FirestoreStore {
    async fn fetch_pending(&self) -> Result<Vec<PendingRecord>, StoreError> {
        let response = self
            .post("runQuery", &pending_query(&self.collection))
            .await?;
        let results: Vec<Value> = response.json().await.map_err(send_error)?;
        let records = decode_query_results(&results);
        debug!(
            "Fetched {} pending records from {}",
            records.len(),
            self.collection
        );
        Ok(records)
    }

    async fn save_moderation(
        &self,
        record_id: &str,
        result: &ModerationResult,
    ) -> Result<(), StoreError> {
        let name = format!("{}/documents/{}/{}", self.database(), self.collection, record_id);
        let body = commit_body(&name, result, &self.update_source, &self.update_source_cf)?;
        self.post("commit", &body).await?;
        Ok(())
    }
}
