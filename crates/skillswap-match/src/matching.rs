//! Reciprocal harmonic-mean matching.
//!
//! Two directional searches over the index, fused on their intersection:
//! users whose needs resemble what I offer AND whose offers resemble what I
//! need. The harmonic mean `2ab/(a+b)` punishes lopsided fits — a (0.9, 0.1)
//! pair scores 0.18, not 0.5.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use skillswap_core::{
    Score, SwapError, Uid, MATCH_DEFAULT_LIMIT, MATCH_K_WIDE, MATCH_MAX_LIMIT,
    MATCH_NOTIFY_MIN_SCORE, MATCH_SCORE_THRESHOLD,
};
use skillswap_embed::Embedder;
use skillswap_index::{IndexPayload, VectorField, VectorIndex};
use skillswap_notify::NotificationService;
use skillswap_store::StoreDb;

use crate::round4;

#[derive(Clone, Debug, Deserialize)]
pub struct MatchQuery {
    pub my_offer_text: String,
    pub my_need_text: String,
    pub limit: Option<usize>,
    /// Caller's own uid; enables self-filtering, block filtering and
    /// notifications.
    pub my_uid: Option<Uid>,
    /// Opt-in: email high-score matches who have updates enabled.
    #[serde(default)]
    pub notify_matches: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchResult {
    pub uid: Uid,
    pub reciprocal_score: Score,
    /// How well their offer matches my need.
    pub offer_match_score: Score,
    /// How well their need matches my offer.
    pub need_match_score: Score,
    pub payload: IndexPayload,
}

pub struct Matcher {
    store: Arc<StoreDb>,
    embedder: Option<Arc<dyn Embedder>>,
    index: Arc<dyn VectorIndex>,
    notify: Arc<NotificationService>,
}

impl Matcher {
    pub fn new(
        store: Arc<StoreDb>,
        embedder: Option<Arc<dyn Embedder>>,
        index: Arc<dyn VectorIndex>,
        notify: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            notify,
        }
    }

    pub async fn reciprocal_match(&self, query: MatchQuery) -> Result<Vec<MatchResult>, SwapError> {
        if query.my_offer_text.trim().is_empty() || query.my_need_text.trim().is_empty() {
            return Err(SwapError::Validation(
                "both offer and need text are required".into(),
            ));
        }
        let limit = query
            .limit
            .unwrap_or(MATCH_DEFAULT_LIMIT)
            .clamp(1, MATCH_MAX_LIMIT);

        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| SwapError::Embedding("no embedding provider configured".into()))?;

        let my_offer_vec = embedder.encode(&query.my_offer_text).await?;
        let my_need_vec = embedder.encode(&query.my_need_text).await?;

        // A: they want what I teach. B: they teach what I want.
        let they_need = self
            .index
            .search(
                VectorField::Need,
                &my_offer_vec,
                MATCH_K_WIDE,
                MATCH_SCORE_THRESHOLD,
            )
            .await?;
        let they_offer = self
            .index
            .search(
                VectorField::Offer,
                &my_need_vec,
                MATCH_K_WIDE,
                MATCH_SCORE_THRESHOLD,
            )
            .await?;

        let offer_scores: HashMap<&str, Score> = they_offer
            .iter()
            .map(|h| (h.uid.as_str(), h.score))
            .collect();

        let mut matches = Vec::new();
        for hit in &they_need {
            let Some(&offer_score) = offer_scores.get(hit.uid.as_str()) else {
                continue;
            };
            let need_score = hit.score;
            if need_score + offer_score == 0.0 {
                continue;
            }
            if query.my_uid.as_deref() == Some(hit.uid.as_str()) {
                continue;
            }
            if let Some(my_uid) = &query.my_uid {
                if self.store.either_blocked(my_uid, &hit.uid)? {
                    continue;
                }
            }
            let harmonic = 2.0 * need_score * offer_score / (need_score + offer_score);
            matches.push(MatchResult {
                uid: hit.uid.clone(),
                reciprocal_score: round4(harmonic),
                offer_match_score: round4(offer_score),
                need_match_score: round4(need_score),
                payload: hit.payload.clone(),
            });
        }

        // Harmonic descending, then the stronger weak side, then uid.
        matches.sort_by(|a, b| {
            b.reciprocal_score
                .partial_cmp(&a.reciprocal_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let min_a = a.offer_match_score.min(a.need_match_score);
                    let min_b = b.offer_match_score.min(b.need_match_score);
                    min_b.partial_cmp(&min_a).unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.uid.cmp(&b.uid))
        });
        matches.truncate(limit);

        if query.notify_matches {
            if let Some(my_uid) = &query.my_uid {
                self.send_match_notifications(my_uid, &matches).await;
            }
        }

        Ok(matches)
    }

    /// Email every high-score match whose owner opted into updates. Failures
    /// and dedupe suppressions only affect logging.
    async fn send_match_notifications(&self, my_uid: &str, matches: &[MatchResult]) {
        let Ok(Some(my_profile)) = self.store.get_profile(my_uid) else {
            return;
        };
        let my_name = my_profile
            .display_name
            .clone()
            .unwrap_or_else(|| "Someone".into());

        for m in matches {
            if m.reciprocal_score < MATCH_NOTIFY_MIN_SCORE {
                continue;
            }
            let Ok(Some(match_profile)) = self.store.get_profile(&m.uid) else {
                continue;
            };
            if !match_profile.email_updates || match_profile.email.is_empty() {
                continue;
            }
            let sent = self
                .notify
                .send_match_notification(
                    &match_profile.email,
                    my_uid,
                    &m.uid,
                    match_profile.display_name.as_deref().unwrap_or("there"),
                    &my_name,
                    my_profile.skills_to_offer.as_deref().unwrap_or_default(),
                    my_profile.services_needed.as_deref().unwrap_or_default(),
                    m.reciprocal_score,
                )
                .await;
            debug!(match_uid = %m.uid, sent, "match notification attempted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use skillswap_cache::MemoryCache;
    use skillswap_index::MemoryVectorIndex;
    use skillswap_notify::{NotificationService, Notifier};
    use std::collections::HashMap as Map;

    /// Deterministic embedder for tests: fixed vectors per known phrase.
    struct TableEmbedder {
        table: Map<String, Vec<f32>>,
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>, SwapError> {
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| SwapError::Embedding(format!("no vector for '{text}'")))
        }
        async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SwapError> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.encode(t).await?);
            }
            Ok(out)
        }
        fn dimension(&self) -> usize {
            2
        }
    }

    struct Silent;

    #[async_trait]
    impl Notifier for Silent {
        async fn deliver(&self, _to: &str, _c: skillswap_notify::EmailContent) -> bool {
            true
        }
    }

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

    async fn matcher_with(
        docs: Vec<(&str, Vec<f32>, Vec<f32>)>,
        table: Map<String, Vec<f32>>,
    ) -> Matcher {
        let store = Arc::new(StoreDb::open_temporary().unwrap());
        let index = Arc::new(MemoryVectorIndex::new());
        for (uid, offer, need) in docs {
            index.upsert(uid, offer, need, payload(uid)).await.unwrap();
        }
        let notify = Arc::new(NotificationService::new(
            Arc::new(Silent),
            Arc::new(MemoryCache::new()),
            "https://app".into(),
        ));
        Matcher::new(store, Some(Arc::new(TableEmbedder { table })), index, notify)
    }

    fn query(offer: &str, need: &str) -> MatchQuery {
        MatchQuery {
            my_offer_text: offer.into(),
            my_need_text: need.into(),
            limit: None,
            my_uid: None,
            notify_matches: false,
        }
    }

    #[tokio::test]
    async fn intersection_required_and_harmonic_ranks() {
        let mut table = Map::new();
        table.insert("python".to_string(), vec![1.0, 0.0]);
        table.insert("guitar".to_string(), vec![0.0, 1.0]);

        // bob: teaches guitar-ish, wants python-ish (strong both ways).
        // carol: wants python but teaches something unrelated (one-way only).
        // dan: weaker reciprocal fit than bob.
        let matcher = matcher_with(
            vec![
                ("bob", vec![0.0, 1.0], vec![1.0, 0.0]),
                ("carol", vec![1.0, 0.0], vec![0.96, 0.28]),
                ("dan", vec![0.28, 0.96], vec![0.6, 0.8]),
            ],
            table,
        )
        .await;

        let results = matcher
            .reciprocal_match(query("python", "guitar"))
            .await
            .unwrap();

        let uids: Vec<_> = results.iter().map(|r| r.uid.as_str()).collect();
        assert_eq!(uids, vec!["bob", "dan"]); // carol's offer never matches guitar
        assert!(results[0].reciprocal_score > results[1].reciprocal_score);
        assert!((results[0].reciprocal_score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn harmonic_mean_punishes_imbalance() {
        // need 0.9 / offer ~0.2-equivalent: harmonic stays below the average.
        let mut table = Map::new();
        table.insert("a".to_string(), vec![1.0, 0.0]);
        table.insert("b".to_string(), vec![0.0, 1.0]);

        let matcher = matcher_with(
            vec![("eve", vec![0.3, 0.954], vec![0.9, 0.436])],
            table,
        )
        .await;

        let results = matcher.reciprocal_match(query("a", "b")).await.unwrap();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        let (a, b) = (r.need_match_score, r.offer_match_score);
        let min = a.min(b);
        // P5: 2ab/(a+b) ≤ min(a,b)·√2 and ≤ (a+b)/2.
        assert!(r.reciprocal_score <= min * std::f64::consts::SQRT_2 + 1e-9);
        assert!(r.reciprocal_score <= (a + b) / 2.0 + 1e-9);
    }

    #[tokio::test]
    async fn self_match_is_filtered() {
        let mut table = Map::new();
        table.insert("x".to_string(), vec![1.0, 0.0]);
        table.insert("y".to_string(), vec![0.0, 1.0]);

        let matcher = matcher_with(
            vec![("me", vec![0.0, 1.0], vec![1.0, 0.0])],
            table,
        )
        .await;

        let mut q = query("x", "y");
        let results = matcher.reciprocal_match(q.clone()).await.unwrap();
        assert_eq!(results.len(), 1);

        q.my_uid = Some("me".into());
        let results = matcher.reciprocal_match(q).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn blocked_pairs_are_filtered() {
        let mut table = Map::new();
        table.insert("x".to_string(), vec![1.0, 0.0]);
        table.insert("y".to_string(), vec![0.0, 1.0]);

        let matcher = matcher_with(
            vec![("stranger", vec![0.0, 1.0], vec![1.0, 0.0])],
            table,
        )
        .await;
        matcher
            .store
            .put_block(&skillswap_core::Block {
                id: "b1".into(),
                blocker_uid: "stranger".into(),
                blocked_uid: "me".into(),
                created_at: 0,
                reason: None,
            })
            .unwrap();

        let mut q = query("x", "y");
        q.my_uid = Some("me".into());
        let results = matcher.reciprocal_match(q).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn empty_texts_are_rejected() {
        let matcher = matcher_with(vec![], Map::new()).await;
        let err = matcher
            .reciprocal_match(query("  ", "guitar"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Validation(_)));
    }
}
