//! Vector index adapter.
//!
//! One index holds a document per indexable profile: a string key (the
//! profile uid), a projected payload of profile fields, and two named dense
//! vectors `offer_vec` / `need_vec` over the configured dimension with
//! cosine similarity.
//!
//! The index is not the source of truth. Writes are best-effort retriable by
//! the caller, and a profile may legitimately lack an entry while its skill
//! fields are empty.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use skillswap_core::{Profile, Score, SwapError, Uid};

pub use http::HttpVectorIndex;
pub use memory::MemoryVectorIndex;

/// Which named vector a search runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorField {
    Offer,
    Need,
}

impl VectorField {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorField::Offer => "offer_vec",
            VectorField::Need => "need_vec",
        }
    }
}

/// Profile fields projected into the index payload and returned with hits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexPayload {
    pub uid: Uid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub skills_to_offer: String,
    pub services_needed: String,
    pub dm_open: bool,
    pub show_city: bool,
}

impl IndexPayload {
    /// Project a profile into its index payload. Caller guarantees the
    /// profile is indexable (both skill texts present).
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            uid: profile.uid.clone(),
            email: Some(profile.email.clone()),
            display_name: profile.display_name.clone(),
            photo_url: profile.photo_url.clone(),
            bio: profile.bio.clone(),
            city: profile.city.clone(),
            timezone: profile.timezone.clone(),
            skills_to_offer: profile.skills_to_offer.clone().unwrap_or_default(),
            services_needed: profile.services_needed.clone().unwrap_or_default(),
            dm_open: profile.dm_open,
            show_city: profile.show_city,
        }
    }
}

/// One k-NN hit, score in `[0, 1]`, descending order in result lists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub uid: Uid,
    pub score: Score,
    pub payload: IndexPayload,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent schema creation; safe to call on every process start.
    async fn ensure_index(&self) -> Result<(), SwapError>;

    /// Insert or replace the document for `uid`.
    async fn upsert(
        &self,
        uid: &str,
        offer_vec: Vec<f32>,
        need_vec: Vec<f32>,
        payload: IndexPayload,
    ) -> Result<(), SwapError>;

    /// k-NN over the chosen vector, filtered to `score >= threshold`,
    /// sorted by score descending.
    async fn search(
        &self,
        field: VectorField,
        query: &[f32],
        k: usize,
        threshold: f64,
    ) -> Result<Vec<SearchHit>, SwapError>;

    async fn delete(&self, uid: &str) -> Result<(), SwapError>;
}
