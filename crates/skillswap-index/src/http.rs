//! HTTP adapter for a Qdrant-style vector search service.
//!
//! Collection layout: one collection with two named vectors per point
//! (`offer_vec`, `need_vec`), cosine distance, HNSW-backed. Point ids must be
//! UUID-shaped, so the profile uid is hashed into a stable synthetic id; the
//! real uid travels in the payload.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use skillswap_core::SwapError;

use crate::{IndexPayload, SearchHit, VectorField, VectorIndex};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    dimension: usize,
}

/// Stable UUID-shaped point id derived from the profile uid.
fn point_id(uid: &str) -> String {
    let digest = blake3::hash(uid.as_bytes());
    let b = digest.as_bytes();
    format!(
        "{}-{}-{}-{}-{}",
        hex::encode(&b[0..4]),
        hex::encode(&b[4..6]),
        hex::encode(&b[6..8]),
        hex::encode(&b[8..10]),
        hex::encode(&b[10..16]),
    )
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f64,
    payload: IndexPayload,
}

impl HttpVectorIndex {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        collection: String,
        dimension: usize,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            collection,
            dimension,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        req
    }

    fn index_err(e: impl std::fmt::Display) -> SwapError {
        SwapError::VectorIndex(e.to_string())
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn ensure_index(&self) -> Result<(), SwapError> {
        let exists = self
            .request(
                reqwest::Method::GET,
                &format!("/collections/{}", self.collection),
            )
            .send()
            .await
            .map_err(Self::index_err)?
            .status()
            .is_success();
        if exists {
            return Ok(());
        }

        let schema = json!({
            "vectors": {
                "offer_vec": { "size": self.dimension, "distance": "Cosine" },
                "need_vec":  { "size": self.dimension, "distance": "Cosine" },
            }
        });
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}", self.collection),
            )
            .json(&schema)
            .send()
            .await
            .map_err(Self::index_err)?;
        if !resp.status().is_success() {
            return Err(Self::index_err(format!(
                "collection create returned {}",
                resp.status()
            )));
        }
        info!(collection = %self.collection, dim = self.dimension, "vector index created");
        Ok(())
    }

    async fn upsert(
        &self,
        uid: &str,
        offer_vec: Vec<f32>,
        need_vec: Vec<f32>,
        payload: IndexPayload,
    ) -> Result<(), SwapError> {
        let body = json!({
            "points": [{
                "id": point_id(uid),
                "vector": {
                    "offer_vec": offer_vec,
                    "need_vec": need_vec,
                },
                "payload": payload,
            }]
        });
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", self.collection),
            )
            .json(&body)
            .send()
            .await
            .map_err(Self::index_err)?;
        if !resp.status().is_success() {
            return Err(Self::index_err(format!(
                "upsert returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn search(
        &self,
        field: VectorField,
        query: &[f32],
        k: usize,
        threshold: f64,
    ) -> Result<Vec<SearchHit>, SwapError> {
        let body = json!({
            "vector": { "name": field.as_str(), "vector": query },
            "limit": k,
            "score_threshold": threshold,
            "with_payload": true,
        });
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/search", self.collection),
            )
            .json(&body)
            .send()
            .await
            .map_err(Self::index_err)?;
        if !resp.status().is_success() {
            return Err(Self::index_err(format!(
                "search returned {}",
                resp.status()
            )));
        }
        let parsed: SearchResponse = resp.json().await.map_err(Self::index_err)?;
        Ok(parsed
            .result
            .into_iter()
            .map(|p| SearchHit {
                uid: p.payload.uid.clone(),
                score: p.score.clamp(0.0, 1.0),
                payload: p.payload,
            })
            .collect())
    }

    async fn delete(&self, uid: &str) -> Result<(), SwapError> {
        let body = json!({ "points": [point_id(uid)] });
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/delete?wait=true", self.collection),
            )
            .json(&body)
            .send()
            .await
            .map_err(Self::index_err)?;
        if !resp.status().is_success() {
            return Err(Self::index_err(format!(
                "delete returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
