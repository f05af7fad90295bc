//! Profile CRUD and the profile → embeddings → index write pipeline.
//!
//! Write ordering (spec'd): (1) store write, (2) embeddings + index upsert
//! when both skill texts are present, (3) cache invalidation. Failures in
//! (2) or (3) are logged and surfaced as warnings but never roll back (1);
//! `reindex` is the recovery tool for drift.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use skillswap_cache::Cache;
use skillswap_core::{
    skills_to_text, Profile, ProfilePatch, SkillEntry, SwapError, Timestamp, Uid,
};
use skillswap_embed::Embedder;
use skillswap_index::{IndexPayload, VectorIndex};
use skillswap_notify::NotificationService;
use skillswap_store::{LockMap, StoreDb};

/// Placeholder texts used by `reindex` when a profile has sparse skills, so
/// recovery never fails on incomplete profiles.
const FALLBACK_OFFER_TEXT: &str = "general help";
const FALLBACK_NEED_TEXT: &str = "general services";

/// Skill text accepted at the edge: either free text or a structured list
/// that is rendered to the canonical comma-joined string before embedding.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkillInput {
    Text(String),
    Structured(Vec<SkillEntry>),
}

impl SkillInput {
    pub fn into_text(self) -> Option<String> {
        match self {
            SkillInput::Text(t) => {
                let trimmed = t.trim().to_string();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            SkillInput::Structured(entries) => skills_to_text(&entries),
        }
    }
}

/// Create-or-update input for `upsert`.
#[derive(Clone, Debug, Deserialize)]
pub struct ProfileUpsert {
    pub uid: Uid,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub skills_to_offer: Option<SkillInput>,
    pub services_needed: Option<SkillInput>,
    pub dm_open: Option<bool>,
    pub email_updates: Option<bool>,
    pub show_city: Option<bool>,
}

pub struct ProfileService {
    store: Arc<StoreDb>,
    locks: Arc<LockMap>,
    embedder: Option<Arc<dyn Embedder>>,
    index: Arc<dyn VectorIndex>,
    cache: Arc<dyn Cache>,
    notify: Arc<NotificationService>,
}

impl ProfileService {
    pub fn new(
        store: Arc<StoreDb>,
        locks: Arc<LockMap>,
        embedder: Option<Arc<dyn Embedder>>,
        index: Arc<dyn VectorIndex>,
        cache: Arc<dyn Cache>,
        notify: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            locks,
            embedder,
            index,
            cache,
            notify,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn get(&self, uid: &str) -> Result<Profile, SwapError> {
        self.store
            .get_profile(uid)?
            .ok_or_else(|| SwapError::ProfileNotFound(uid.to_string()))
    }

    pub fn get_by_email(&self, email: &str) -> Result<Profile, SwapError> {
        self.store
            .get_profile_by_email(email)?
            .ok_or_else(|| SwapError::ProfileNotFound(email.to_string()))
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Create or update a profile, then (re)index and invalidate caches.
    pub async fn upsert(&self, input: ProfileUpsert, now: Timestamp) -> Result<Profile, SwapError> {
        if input.uid.trim().is_empty() {
            return Err(SwapError::Validation("uid must not be empty".into()));
        }
        if input.email.trim().is_empty() {
            return Err(SwapError::Validation("email must not be empty".into()));
        }

        let uid = input.uid.clone();
        let _guard = self.locks.lock(&uid).await;

        let existing = self.store.get_profile(&uid)?;
        let is_new = existing.is_none();

        // Identity and preference fields come from the input; economy
        // counters survive from the existing document.
        let mut profile =
            existing.unwrap_or_else(|| Profile::new(uid.clone(), input.email.clone(), now));
        profile.email = input.email;
        profile.display_name = input.display_name;
        profile.photo_url = input.photo_url;
        profile.bio = input.bio;
        profile.city = input.city;
        profile.timezone = input.timezone;
        profile.skills_to_offer = input.skills_to_offer.and_then(SkillInput::into_text);
        profile.services_needed = input.services_needed.and_then(SkillInput::into_text);
        profile.dm_open = input.dm_open.unwrap_or(true);
        profile.email_updates = input.email_updates.unwrap_or(true);
        profile.show_city = input.show_city.unwrap_or(true);
        profile.updated_at = now;

        self.store.put_profile(&profile)?;
        drop(_guard);

        self.sync_index(&profile).await;
        self.invalidate_search_caches();

        if is_new && profile.email_updates {
            self.notify
                .send_welcome(
                    &profile.email,
                    profile.display_name.as_deref().unwrap_or_default(),
                    profile.skills_to_offer.as_deref().unwrap_or_default(),
                    profile.services_needed.as_deref().unwrap_or_default(),
                )
                .await;
        }

        Ok(profile)
    }

    /// Partial update; reindexes only when a skill text changed.
    pub async fn patch(
        &self,
        uid: &str,
        patch: ProfilePatch,
        now: Timestamp,
    ) -> Result<Profile, SwapError> {
        let _guard = self.locks.lock(uid).await;

        let mut profile = self
            .store
            .get_profile(uid)?
            .ok_or_else(|| SwapError::ProfileNotFound(uid.to_string()))?;

        let skills_changed = patch.touches_skills();
        patch.apply(&mut profile);
        profile.updated_at = now;
        self.store.put_profile(&profile)?;
        drop(_guard);

        if skills_changed {
            self.sync_index(&profile).await;
        }
        self.invalidate_search_caches();

        Ok(profile)
    }

    /// Remove the profile from the store and the vector index.
    pub async fn delete(&self, uid: &str) -> Result<(), SwapError> {
        let _guard = self.locks.lock(uid).await;
        if self.store.get_profile(uid)?.is_none() {
            return Err(SwapError::ProfileNotFound(uid.to_string()));
        }
        self.store.delete_profile(uid)?;
        drop(_guard);

        if let Err(e) = self.index.delete(uid).await {
            warn!(uid, error = %e, "index delete failed; reindex will reconcile");
        }
        self.invalidate_search_caches();
        info!(uid, "profile deleted");
        Ok(())
    }

    /// Recovery tool: re-embed and re-upsert one profile, substituting
    /// placeholder texts for missing skills.
    pub async fn reindex(&self, uid: &str) -> Result<String, SwapError> {
        let mut profile = self.get(uid)?;
        if profile.skills_to_offer.as_deref().unwrap_or("").trim().is_empty() {
            profile.skills_to_offer = Some(FALLBACK_OFFER_TEXT.to_string());
        }
        if profile.services_needed.as_deref().unwrap_or("").trim().is_empty() {
            profile.services_needed = Some(FALLBACK_NEED_TEXT.to_string());
        }

        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| SwapError::Embedding("no embedding provider configured".into()))?;

        let offer_text = profile.skills_to_offer.clone().unwrap_or_default();
        let need_text = profile.services_needed.clone().unwrap_or_default();
        let offer_vec = embedder.encode(&offer_text).await?;
        let need_vec = embedder.encode(&need_text).await?;
        self.index
            .upsert(uid, offer_vec, need_vec, IndexPayload::from_profile(&profile))
            .await?;

        self.invalidate_search_caches();
        info!(uid, "profile reindexed");
        Ok(offer_text)
    }

    // ── Pipeline steps ───────────────────────────────────────────────────────

    /// Step (2): best-effort index synchronisation. Profiles with incomplete
    /// skill texts are removed from the index (an IndexedProfile exists iff
    /// both texts are present).
    async fn sync_index(&self, profile: &Profile) {
        if !profile.indexable() {
            if let Err(e) = self.index.delete(&profile.uid).await {
                warn!(uid = %profile.uid, error = %e, "index delete failed");
            }
            return;
        }
        let Some(embedder) = &self.embedder else {
            warn!(uid = %profile.uid, "embedding provider not configured; profile not indexed");
            return;
        };

        let offer_text = profile.skills_to_offer.clone().unwrap_or_default();
        let need_text = profile.services_needed.clone().unwrap_or_default();
        let texts = [offer_text, need_text];
        match embedder.encode_batch(&texts).await {
            Ok(mut vecs) if vecs.len() == 2 => {
                let need_vec = vecs.pop().unwrap_or_default();
                let offer_vec = vecs.pop().unwrap_or_default();
                if let Err(e) = self
                    .index
                    .upsert(
                        &profile.uid,
                        offer_vec,
                        need_vec,
                        IndexPayload::from_profile(profile),
                    )
                    .await
                {
                    warn!(uid = %profile.uid, error = %e, "index upsert failed; reindex will reconcile");
                }
            }
            Ok(_) => warn!(uid = %profile.uid, "embedding batch returned wrong arity"),
            Err(e) => warn!(uid = %profile.uid, error = %e, "embedding failed; profile not indexed"),
        }
    }

    /// Step (3): drop any cached search result that could depend on this
    /// profile. Runs before the write returns to the caller.
    fn invalidate_search_caches(&self) {
        let cleared =
            self.cache.clear_prefix("search:") + self.cache.clear_prefix("skill_recommend:");
        if cleared > 0 {
            info!(cleared, "search caches invalidated after profile change");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_input_text_trims_and_rejects_empty() {
        assert_eq!(
            SkillInput::Text("  Python ".into()).into_text().as_deref(),
            Some("Python")
        );
        assert_eq!(SkillInput::Text("   ".into()).into_text(), None);
    }

    #[test]
    fn skill_input_structured_renders() {
        let input = SkillInput::Structured(vec![
            SkillEntry { name: "Guitar".into(), level: Some("beginner".into()) },
            SkillEntry { name: "Songwriting".into(), level: None },
        ]);
        assert_eq!(
            input.into_text().as_deref(),
            Some("Guitar (beginner), Songwriting")
        );
    }

    #[test]
    fn skill_input_deserializes_both_shapes() {
        let text: SkillInput = serde_json::from_str("\"Python, FastAPI\"").unwrap();
        assert_eq!(text.into_text().as_deref(), Some("Python, FastAPI"));

        let structured: SkillInput =
            serde_json::from_str(r#"[{"name": "Python", "level": "advanced"}]"#).unwrap();
        assert_eq!(structured.into_text().as_deref(), Some("Python (advanced)"));
    }
}
