//! Complementary-skill recommendations.
//!
//! Mines the skill texts of profiles similar to the caller's: phrases that
//! recur among neighbours rank by a blend of frequency and similarity,
//! with needs-side phrases (what people want to learn) weighted below
//! offers-side phrases (what people already teach).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use skillswap_cache::{fingerprint_key, get_json, set_json};
use skillswap_core::{
    SwapError, RECOMMEND_CACHE_TTL_SECS, RECOMMEND_K, RECOMMEND_MIN_PHRASE_CHARS,
    RECOMMEND_NEED_WEIGHT, RECOMMEND_PHRASES_PER_PROFILE, RECOMMEND_THRESHOLD,
};
use skillswap_index::VectorField;

use crate::round3;
use crate::search::SearchService;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkillRecommendation {
    pub skill: String,
    pub score: f64,
    pub reason: String,
}

#[derive(Default)]
struct PhraseStats {
    count: u32,
    total_score: f64,
}

/// Split a skill text into candidate phrases: comma/period separated,
/// trimmed, longer than the noise floor, first few per profile.
fn candidate_phrases(text: &str) -> Vec<String> {
    text.replace(',', ".")
        .split('.')
        .map(str::trim)
        .filter(|p| p.len() > RECOMMEND_MIN_PHRASE_CHARS)
        .take(RECOMMEND_PHRASES_PER_PROFILE)
        .map(str::to_string)
        .collect()
}

impl SearchService {
    /// Recommend skills complementary to `current_skills`.
    pub async fn recommend_skills(
        &self,
        current_skills: &str,
        limit: usize,
    ) -> Result<Vec<SkillRecommendation>, SwapError> {
        if current_skills.trim().is_empty() {
            return Err(SwapError::Validation(
                "current_skills must not be empty".into(),
            ));
        }
        let limit = limit.clamp(1, 20);

        let cache_key = fingerprint_key(
            "skill_recommend",
            &json!({ "skills": current_skills, "limit": limit }),
        );
        if let Some(cached) =
            get_json::<Vec<SkillRecommendation>>(self.cache().as_ref(), &cache_key)
        {
            debug!(%cache_key, "skill recommendation cache hit");
            return Ok(cached);
        }

        let query_vec = self.embedder()?.encode(current_skills).await?;

        let similar_offers = self
            .index()
            .search(
                VectorField::Offer,
                &query_vec,
                RECOMMEND_K,
                RECOMMEND_THRESHOLD,
            )
            .await?;
        let similar_needs = self
            .index()
            .search(
                VectorField::Need,
                &query_vec,
                RECOMMEND_K,
                RECOMMEND_THRESHOLD,
            )
            .await?;

        let mut stats: HashMap<String, PhraseStats> = HashMap::new();
        for hit in &similar_offers {
            for phrase in candidate_phrases(&hit.payload.skills_to_offer) {
                let entry = stats.entry(phrase).or_default();
                entry.count += 1;
                entry.total_score += hit.score;
            }
        }
        for hit in &similar_needs {
            for phrase in candidate_phrases(&hit.payload.services_needed) {
                let entry = stats.entry(phrase).or_default();
                entry.count += 1;
                entry.total_score += hit.score * RECOMMEND_NEED_WEIGHT;
            }
        }

        let mut recommendations: Vec<SkillRecommendation> = stats
            .into_iter()
            .map(|(skill, s)| {
                let avg_score = s.total_score / s.count.max(1) as f64;
                let combined = s.count as f64 * 0.3 + avg_score * 0.7;
                SkillRecommendation {
                    skill,
                    score: round3(combined),
                    reason: format!("Common among {} similar profiles", s.count),
                }
            })
            .collect();

        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.skill.cmp(&b.skill))
        });
        recommendations.truncate(limit);

        set_json(
            self.cache().as_ref(),
            &cache_key,
            &recommendations,
            RECOMMEND_CACHE_TTL_SECS,
        );
        Ok(recommendations)
    }
}
