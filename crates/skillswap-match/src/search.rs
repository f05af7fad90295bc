//! Semantic profile search with read-through caching.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use skillswap_cache::{fingerprint_key, get_json, set_json, Cache};
use skillswap_core::{Score, SwapError, Uid, SEARCH_CACHE_TTL_SECS, SEARCH_DEFAULT_THRESHOLD};
use skillswap_embed::Embedder;
use skillswap_index::{IndexPayload, VectorField, VectorIndex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Offers,
    Needs,
    Both,
}

impl SearchMode {
    fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Offers => "offers",
            SearchMode::Needs => "needs",
            SearchMode::Both => "both",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    pub mode: Option<SearchMode>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub uid: Uid,
    pub score: Score,
    pub payload: IndexPayload,
}

pub struct SearchService {
    embedder: Option<Arc<dyn Embedder>>,
    index: Arc<dyn VectorIndex>,
    cache: Arc<dyn Cache>,
}

impl SearchService {
    pub fn new(
        embedder: Option<Arc<dyn Embedder>>,
        index: Arc<dyn VectorIndex>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            embedder,
            index,
            cache,
        }
    }

    pub(crate) fn embedder(&self) -> Result<&Arc<dyn Embedder>, SwapError> {
        self.embedder
            .as_ref()
            .ok_or_else(|| SwapError::Embedding("no embedding provider configured".into()))
    }

    pub(crate) fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub(crate) fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Semantic search over profile skills.
    ///
    /// `offers` ranks teachers for the query, `needs` ranks learners, `both`
    /// keeps the higher-scored hit per uid. Results are cached for an hour
    /// under a fingerprint of the canonical request.
    pub async fn search(&self, request: SearchQuery) -> Result<Vec<SearchResult>, SwapError> {
        if request.query.trim().is_empty() {
            return Err(SwapError::Validation("query must not be empty".into()));
        }
        let limit = request.limit.unwrap_or(10).clamp(1, 100);
        let threshold = request.threshold.unwrap_or(SEARCH_DEFAULT_THRESHOLD);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SwapError::Validation("threshold must be in [0, 1]".into()));
        }
        let mode = request.mode.unwrap_or(SearchMode::Offers);

        let cache_key = fingerprint_key(
            "search",
            &json!({
                "query": request.query,
                "limit": limit,
                "threshold": threshold,
                "mode": mode.as_str(),
            }),
        );
        if let Some(cached) = get_json::<Vec<SearchResult>>(self.cache.as_ref(), &cache_key) {
            debug!(%cache_key, "search cache hit");
            return Ok(cached);
        }

        let query_vec = self.embedder()?.encode(&request.query).await?;

        let results = match mode {
            SearchMode::Offers => {
                self.search_field(VectorField::Offer, &query_vec, limit, threshold)
                    .await?
            }
            SearchMode::Needs => {
                self.search_field(VectorField::Need, &query_vec, limit, threshold)
                    .await?
            }
            SearchMode::Both => {
                let offers = self
                    .search_field(VectorField::Offer, &query_vec, limit, threshold)
                    .await?;
                let needs = self
                    .search_field(VectorField::Need, &query_vec, limit, threshold)
                    .await?;

                // Higher score wins per uid.
                let mut by_uid: HashMap<Uid, SearchResult> = HashMap::new();
                for item in offers.into_iter().chain(needs) {
                    match by_uid.get(&item.uid) {
                        Some(prev) if prev.score >= item.score => {}
                        _ => {
                            by_uid.insert(item.uid.clone(), item);
                        }
                    }
                }
                let mut combined: Vec<SearchResult> = by_uid.into_values().collect();
                combined.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.uid.cmp(&b.uid))
                });
                combined.truncate(limit);
                combined
            }
        };

        set_json(self.cache.as_ref(), &cache_key, &results, SEARCH_CACHE_TTL_SECS);
        Ok(results)
    }

    async fn search_field(
        &self,
        field: VectorField,
        query_vec: &[f32],
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>, SwapError> {
        Ok(self
            .index
            .search(field, query_vec, limit, threshold)
            .await?
            .into_iter()
            .map(|h| SearchResult {
                uid: h.uid,
                score: h.score,
                payload: h.payload,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use skillswap_cache::MemoryCache;
    use skillswap_index::MemoryVectorIndex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds everything to a constant unit vector and counts calls.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn encode(&self, _text: &str) -> Result<Vec<f32>, SwapError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }
        async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SwapError> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn dimension(&self) -> usize {
            2
        }
    }

    fn payload(uid: &str, offers: &str, needs: &str) -> IndexPayload {
        IndexPayload {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            bio: None,
            city: None,
            timezone: None,
            skills_to_offer: offers.into(),
            services_needed: needs.into(),
            dm_open: true,
            show_city: true,
        }
    }

    async fn service() -> (Arc<CountingEmbedder>, Arc<MemoryVectorIndex>, SearchService) {
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let index = Arc::new(MemoryVectorIndex::new());
        index
            .upsert(
                "teacher",
                vec![0.95, 0.312],
                vec![0.0, 1.0],
                payload("teacher", "Guitar lessons and music theory", ""),
            )
            .await
            .unwrap();
        index
            .upsert(
                "learner",
                vec![0.0, 1.0],
                vec![0.9, 0.436],
                payload("learner", "", "wants to learn guitar"),
            )
            .await
            .unwrap();
        let svc = SearchService::new(
            Some(embedder.clone()),
            index.clone(),
            Arc::new(MemoryCache::new()),
        );
        (embedder, index, svc)
    }

    fn q(mode: SearchMode) -> SearchQuery {
        SearchQuery {
            query: "guitar".into(),
            limit: Some(10),
            threshold: Some(0.3),
            mode: Some(mode),
        }
    }

    #[tokio::test]
    async fn offers_mode_finds_teachers_only() {
        let (_, _, svc) = service().await;
        let results = svc.search(q(SearchMode::Offers)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].uid, "teacher");
    }

    #[tokio::test]
    async fn both_mode_keeps_higher_score_per_uid() {
        let (_, _, svc) = service().await;
        let results = svc.search(q(SearchMode::Both)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].uid, "teacher"); // 0.95 beats learner's 0.9
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn second_identical_search_hits_the_cache() {
        let (embedder, _, svc) = service().await;
        svc.search(q(SearchMode::Offers)).await.unwrap();
        let calls_after_first = embedder.calls.load(Ordering::SeqCst);
        let again = svc.search(q(SearchMode::Offers)).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(again.len(), 1);

        // A different mode is a different cache key.
        svc.search(q(SearchMode::Needs)).await.unwrap();
        assert!(embedder.calls.load(Ordering::SeqCst) > calls_after_first);
    }

    #[tokio::test]
    async fn validation_errors() {
        let (_, _, svc) = service().await;
        let err = svc
            .search(SearchQuery {
                query: " ".into(),
                limit: None,
                threshold: None,
                mode: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Validation(_)));

        let err = svc
            .search(SearchQuery {
                query: "x".into(),
                limit: None,
                threshold: Some(1.5),
                mode: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_embedder_is_dependency_unavailable() {
        let index = Arc::new(MemoryVectorIndex::new());
        let svc = SearchService::new(None, index, Arc::new(MemoryCache::new()));
        let err = svc.search(q(SearchMode::Offers)).await.unwrap_err();
        assert_eq!(err.kind(), skillswap_core::ErrorKind::DependencyUnavailable);
    }
}
