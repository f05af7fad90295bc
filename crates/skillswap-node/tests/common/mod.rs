//! Shared in-process stack for integration tests: temporary store, memory
//! index, a deterministic vocabulary embedder and a recording notifier.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use skillswap_cache::{Cache, MemoryCache};
use skillswap_core::SwapError;
use skillswap_economy::{EconomyEngine, FlatDemand};
use skillswap_embed::{l2_normalize, Embedder};
use skillswap_index::MemoryVectorIndex;
use skillswap_match::{Matcher, SearchService};
use skillswap_messaging::{MessagingService, ModerationService};
use skillswap_notify::{EmailContent, NotificationService, Notifier};
use skillswap_portfolio::{PortfolioService, ReviewService};
use skillswap_profiles::ProfileService;
use skillswap_store::{LockMap, StoreDb};
use skillswap_swaps::{CompletionService, SwapService};

pub const DIM: usize = 64;

/// Deterministic test embedder: every distinct lowercase token gets the next
/// free dimension, so related texts overlap exactly on shared words and
/// unrelated texts are orthogonal.
pub struct VocabEmbedder {
    vocab: Mutex<HashMap<String, usize>>,
}

impl VocabEmbedder {
    pub fn new() -> Self {
        Self {
            vocab: Mutex::new(HashMap::new()),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vocab = self.vocab.lock().unwrap();
        let mut vec = vec![0.0f32; DIM];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let next = vocab.len() % DIM;
            let idx = *vocab.entry(token.to_string()).or_insert(next);
            vec[idx] += 1.0;
        }
        l2_normalize(&mut vec);
        vec
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, SwapError> {
        Ok(self.embed(text))
    }
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SwapError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
    fn dimension(&self) -> usize {
        DIM
    }
}

/// Captures every delivered email as (to, subject).
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn subjects_for(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == to)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, to: &str, content: EmailContent) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), content.subject));
        true
    }
}

pub struct TestStack {
    pub store: Arc<StoreDb>,
    pub cache: Arc<MemoryCache>,
    pub index: Arc<MemoryVectorIndex>,
    pub emails: Arc<RecordingNotifier>,
    pub profiles: Arc<ProfileService>,
    pub matcher: Arc<Matcher>,
    pub search: Arc<SearchService>,
    pub economy: Arc<EconomyEngine>,
    pub swaps: Arc<SwapService>,
    pub completion: Arc<CompletionService>,
    pub messaging: Arc<MessagingService>,
    pub moderation: Arc<ModerationService>,
    pub reviews: Arc<ReviewService>,
    pub portfolio: Arc<PortfolioService>,
}

pub fn stack() -> TestStack {
    let store = Arc::new(StoreDb::open_temporary().unwrap());
    let locks = Arc::new(LockMap::new());
    let cache = Arc::new(MemoryCache::new());
    let cache_dyn: Arc<dyn Cache> = cache.clone();
    let index = Arc::new(MemoryVectorIndex::new());
    let emails = Arc::new(RecordingNotifier::new());
    let embedder: Arc<dyn Embedder> = Arc::new(VocabEmbedder::new());

    let notify = Arc::new(NotificationService::new(
        emails.clone(),
        cache_dyn.clone(),
        "https://app.test".into(),
    ));
    let economy = Arc::new(EconomyEngine::new(
        store.clone(),
        locks.clone(),
        Arc::new(FlatDemand),
    ));
    let profiles = Arc::new(ProfileService::new(
        store.clone(),
        locks.clone(),
        Some(embedder.clone()),
        index.clone(),
        cache_dyn.clone(),
        notify.clone(),
    ));
    let matcher = Arc::new(Matcher::new(
        store.clone(),
        Some(embedder.clone()),
        index.clone(),
        notify.clone(),
    ));
    let search = Arc::new(SearchService::new(
        Some(embedder),
        index.clone(),
        cache_dyn,
    ));
    let messaging = Arc::new(MessagingService::new(
        store.clone(),
        locks.clone(),
        notify.clone(),
    ));
    let moderation = Arc::new(ModerationService::new(store.clone()));
    let swaps = Arc::new(SwapService::new(
        store.clone(),
        locks.clone(),
        economy.clone(),
        messaging.clone(),
        notify.clone(),
    ));
    let completion = Arc::new(CompletionService::new(
        store.clone(),
        locks.clone(),
        economy.clone(),
        notify,
    ));
    let reviews = Arc::new(ReviewService::new(
        store.clone(),
        locks.clone(),
        economy.clone(),
    ));
    let portfolio = Arc::new(PortfolioService::new(store.clone(), locks));

    TestStack {
        store,
        cache,
        index,
        emails,
        profiles,
        matcher,
        search,
        economy,
        swaps,
        completion,
        messaging,
        moderation,
        reviews,
        portfolio,
    }
}

/// Upsert a minimal profile with the given skill texts.
pub async fn upsert_profile(
    stack: &TestStack,
    uid: &str,
    offer: &str,
    need: &str,
    now: i64,
) -> skillswap_core::Profile {
    use skillswap_profiles::{ProfileUpsert, SkillInput};
    stack
        .profiles
        .upsert(
            ProfileUpsert {
                uid: uid.into(),
                email: format!("{uid}@example.com"),
                display_name: Some(uid.to_string()),
                photo_url: None,
                bio: None,
                city: None,
                timezone: None,
                skills_to_offer: Some(SkillInput::Text(offer.into())),
                services_needed: Some(SkillInput::Text(need.into())),
                dm_open: None,
                email_updates: Some(true),
                show_city: None,
            },
            now,
        )
        .await
        .unwrap()
}
