//! Embedding client.
//!
//! Converts free-text skill strings into fixed-dimension unit vectors via an
//! external embedding provider. Normalisation is part of the contract, not a
//! convenience: downstream cosine similarity reduces to a dot product only
//! because every vector leaving this module has unit L2 norm.
//!
//! The client treats the provider as an opaque HTTP service and fails fast;
//! retries are the caller's concern.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use skillswap_core::SwapError;

/// Per-call deadline for the embedding provider.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Encode one text into a unit vector of the configured dimension.
    async fn encode(&self, text: &str) -> Result<Vec<f32>, SwapError>;

    /// Encode a batch; result order matches input order.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SwapError>;

    /// The configured vector dimension `d`.
    fn dimension(&self) -> usize;
}

/// Scale a vector to unit L2 norm. Zero vectors are returned unchanged.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

// ── HTTP client ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `POST {endpoint}/embeddings` API.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: String, api_key: String, model: String, dimension: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model,
            dimension,
        }
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, SwapError> {
        let url = format!("{}/embeddings", self.endpoint);
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SwapError::Embedding(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SwapError::Embedding(format!(
                "provider returned {}",
                resp.status()
            )));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| SwapError::Embedding(e.to_string()))?;

        if parsed.data.len() != inputs.len() {
            return Err(SwapError::Embedding(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }

        // The provider indexes results; order them explicitly.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        let mut out = Vec::with_capacity(data.len());
        for datum in data {
            if datum.embedding.len() != self.dimension {
                return Err(SwapError::Embedding(format!(
                    "expected dimension {}, got {}",
                    self.dimension,
                    datum.embedding.len()
                )));
            }
            let mut vec = datum.embedding;
            l2_normalize(&mut vec);
            out.push(vec);
        }
        Ok(out)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, SwapError> {
        let inputs = [text.to_string()];
        let mut vecs = self.request(&inputs).await?;
        vecs.pop()
            .ok_or_else(|| SwapError::Embedding("empty response".into()))
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SwapError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
