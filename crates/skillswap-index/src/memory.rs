//! In-process vector index: a brute-force cosine scan over the stored unit
//! vectors. Used in single-process deployments with no index endpoint
//! configured, and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use skillswap_core::SwapError;

use crate::{IndexPayload, SearchHit, VectorField, VectorIndex};

struct StoredDoc {
    offer_vec: Vec<f32>,
    need_vec: Vec<f32>,
    payload: IndexPayload,
}

#[derive(Default)]
pub struct MemoryVectorIndex {
    docs: RwLock<HashMap<String, StoredDoc>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

/// Dot product. Both sides are unit vectors, so this is cosine similarity.
fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x * y) as f64).sum()
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_index(&self) -> Result<(), SwapError> {
        Ok(())
    }

    async fn upsert(
        &self,
        uid: &str,
        offer_vec: Vec<f32>,
        need_vec: Vec<f32>,
        payload: IndexPayload,
    ) -> Result<(), SwapError> {
        self.docs.write().await.insert(
            uid.to_string(),
            StoredDoc {
                offer_vec,
                need_vec,
                payload,
            },
        );
        Ok(())
    }

    async fn search(
        &self,
        field: VectorField,
        query: &[f32],
        k: usize,
        threshold: f64,
    ) -> Result<Vec<SearchHit>, SwapError> {
        let docs = self.docs.read().await;
        let mut hits: Vec<SearchHit> = docs
            .iter()
            .filter_map(|(uid, doc)| {
                let vec = match field {
                    VectorField::Offer => &doc.offer_vec,
                    VectorField::Need => &doc.need_vec,
                };
                if vec.len() != query.len() {
                    return None;
                }
                let score = dot(query, vec).clamp(0.0, 1.0);
                (score >= threshold).then(|| SearchHit {
                    uid: uid.clone(),
                    score,
                    payload: doc.payload.clone(),
                })
            })
            .collect();

        // Descending score; uid as a deterministic tie-break.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.uid.cmp(&b.uid))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete(&self, uid: &str) -> Result<(), SwapError> {
        self.docs.write().await.remove(uid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(uid: &str) -> IndexPayload {
        IndexPayload {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            bio: None,
            city: None,
            timezone: None,
            skills_to_offer: String::new(),
            services_needed: String::new(),
            dm_open: true,
            show_city: true,
        }
    }

    #[tokio::test]
    async fn search_orders_by_score_and_applies_threshold() {
        let index = MemoryVectorIndex::new();
        index
            .upsert("a", vec![1.0, 0.0], vec![0.0, 1.0], payload("a"))
            .await
            .unwrap();
        index
            .upsert(
                "b",
                vec![0.6, 0.8],
                vec![0.8, 0.6],
                payload("b"),
            )
            .await
            .unwrap();
        index
            .upsert("c", vec![0.0, 1.0], vec![1.0, 0.0], payload("c"))
            .await
            .unwrap();

        let hits = index
            .search(VectorField::Offer, &[1.0, 0.0], 10, 0.5)
            .await
            .unwrap();
        let uids: Vec<_> = hits.iter().map(|h| h.uid.as_str()).collect();
        assert_eq!(uids, vec!["a", "b"]); // c scores 0.0, filtered
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn upsert_replaces_and_delete_removes() {
        let index = MemoryVectorIndex::new();
        index
            .upsert("a", vec![1.0, 0.0], vec![1.0, 0.0], payload("a"))
            .await
            .unwrap();
        index
            .upsert("a", vec![0.0, 1.0], vec![0.0, 1.0], payload("a"))
            .await
            .unwrap();
        assert_eq!(index.len().await, 1);

        let hits = index
            .search(VectorField::Offer, &[1.0, 0.0], 10, 0.5)
            .await
            .unwrap();
        assert!(hits.is_empty());

        index.delete("a").await.unwrap();
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn need_field_searches_the_other_vector() {
        let index = MemoryVectorIndex::new();
        index
            .upsert("a", vec![1.0, 0.0], vec![0.0, 1.0], payload("a"))
            .await
            .unwrap();
        let offer_hits = index
            .search(VectorField::Offer, &[0.0, 1.0], 10, 0.5)
            .await
            .unwrap();
        assert!(offer_hits.is_empty());
        let need_hits = index
            .search(VectorField::Need, &[0.0, 1.0], 10, 0.5)
            .await
            .unwrap();
        assert_eq!(need_hits.len(), 1);
    }
}
