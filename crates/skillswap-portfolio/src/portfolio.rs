//! Derived per-user portfolio: verified skills, recent swaps and reviews.
//!
//! Everything here is computed from completed swaps and stored reviews; the
//! profile's cached counters are repaired when they have drifted from the
//! recomputed values.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use skillswap_core::{Profile, SwapError, SwapRequest, SwapStatus, Timestamp, Uid};
use skillswap_store::{LockMap, StoreDb};

/// A skill with exchange history backing it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifiedSkill {
    pub skill_name: String,
    pub times_exchanged: u32,
    pub total_hours: f64,
    pub average_rating: f64,
    pub last_used: Option<Timestamp>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletedSwapSummary {
    pub swap_request_id: String,
    pub partner_uid: Uid,
    pub partner_name: Option<String>,
    pub partner_photo: Option<String>,
    pub skill_taught: Option<String>,
    pub skill_learned: Option<String>,
    pub hours_exchanged: f64,
    pub rating_given: Option<u8>,
    pub rating_received: Option<u8>,
    pub completed_at: Option<Timestamp>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub uid: Uid,
    pub swap_credits: i64,
    pub swap_points: i64,
    pub completed_swap_count: u32,
    pub total_hours_traded: f64,
    pub average_rating: f64,
    pub review_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortfolioView {
    pub uid: Uid,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub stats: PortfolioStats,
    pub verified_skills_taught: Vec<VerifiedSkill>,
    pub verified_skills_learned: Vec<VerifiedSkill>,
    pub recent_swaps: Vec<CompletedSwapSummary>,
    pub member_since: Timestamp,
}

#[derive(Default)]
struct SkillAccumulator {
    times: u32,
    hours: f64,
    ratings: Vec<u8>,
    last_used: Option<Timestamp>,
}

impl SkillAccumulator {
    fn into_skill(self, name: String) -> VerifiedSkill {
        let average_rating = if self.ratings.is_empty() {
            0.0
        } else {
            let sum: u32 = self.ratings.iter().map(|&r| r as u32).sum();
            let avg = sum as f64 / self.ratings.len() as f64;
            (avg * 100.0).round() / 100.0
        };
        VerifiedSkill {
            skill_name: name,
            times_exchanged: self.times,
            total_hours: (self.hours * 10.0).round() / 10.0,
            average_rating,
            last_used: self.last_used,
        }
    }
}

pub struct PortfolioService {
    store: Arc<StoreDb>,
    locks: Arc<LockMap>,
}

impl PortfolioService {
    pub fn new(store: Arc<StoreDb>, locks: Arc<LockMap>) -> Self {
        Self { store, locks }
    }

    fn load_profile(&self, uid: &str) -> Result<Profile, SwapError> {
        self.store
            .get_profile(uid)?
            .ok_or_else(|| SwapError::ProfileNotFound(uid.to_string()))
    }

    /// Lightweight stats straight off the profile counters.
    pub fn stats(&self, uid: &str) -> Result<PortfolioStats, SwapError> {
        let profile = self.load_profile(uid)?;
        Ok(Self::stats_of(&profile))
    }

    fn stats_of(profile: &Profile) -> PortfolioStats {
        PortfolioStats {
            uid: profile.uid.clone(),
            swap_credits: profile.swap_credits,
            swap_points: profile.swap_points,
            completed_swap_count: profile.completed_swap_count,
            total_hours_traded: (profile.total_hours_traded * 10.0).round() / 10.0,
            average_rating: profile.average_rating,
            review_count: profile.review_count,
        }
    }

    /// Full portfolio aggregation over the user's completed swaps.
    pub async fn portfolio(
        &self,
        uid: &str,
        swap_limit: usize,
        now: Timestamp,
    ) -> Result<PortfolioView, SwapError> {
        let mut profile = self.load_profile(uid)?;
        let swap_limit = swap_limit.clamp(1, 50);

        let mut swaps: Vec<SwapRequest> = self.store.iter_swaps_for_requester(uid)?;
        swaps.extend(self.store.iter_swaps_for_recipient(uid)?);
        swaps.retain(|s| s.status == SwapStatus::Completed);
        swaps.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut taught: HashMap<String, SkillAccumulator> = HashMap::new();
        let mut learned: HashMap<String, SkillAccumulator> = HashMap::new();
        let mut summaries = Vec::new();
        let mut actual_count: u32 = 0;
        let mut actual_hours: f64 = 0.0;

        for swap in &swaps {
            let is_requester = swap.requester_uid == uid;
            let partner_uid = swap.other_party(uid).clone();
            let hours = swap.completion.final_hours.unwrap_or(1.0);
            let completed_at = swap.completion.completed_at.or(Some(swap.updated_at));

            actual_count += 1;
            actual_hours += hours;

            // What this user taught vs received in this swap.
            let (skill_taught, skill_learned) = if is_requester {
                (swap.requester_offer.clone(), Some(swap.requester_need.clone()))
            } else {
                (Some(swap.requester_need.clone()), swap.requester_offer.clone())
            };

            let mut rating_given = None;
            let mut rating_received = None;
            for review in self.store.iter_reviews_for_swap(&swap.id)? {
                if review.reviewer_uid == uid {
                    rating_given = Some(review.rating);
                } else {
                    rating_received = Some(review.rating);
                }
            }

            if let Some(skill) = &skill_taught {
                let acc = taught.entry(skill.clone()).or_default();
                acc.times += 1;
                acc.hours += hours;
                if let Some(r) = rating_received {
                    acc.ratings.push(r);
                }
                acc.last_used = acc.last_used.max(completed_at);
            }
            if let Some(skill) = &skill_learned {
                let acc = learned.entry(skill.clone()).or_default();
                acc.times += 1;
                acc.hours += hours;
                if let Some(r) = rating_given {
                    acc.ratings.push(r);
                }
                acc.last_used = acc.last_used.max(completed_at);
            }

            if summaries.len() < swap_limit {
                let partner = self.store.get_profile(&partner_uid)?;
                summaries.push(CompletedSwapSummary {
                    swap_request_id: swap.id.clone(),
                    partner_name: partner.as_ref().and_then(|p| p.display_name.clone()),
                    partner_photo: partner.and_then(|p| p.photo_url),
                    partner_uid,
                    skill_taught,
                    skill_learned,
                    hours_exchanged: hours,
                    rating_given,
                    rating_received,
                    completed_at,
                });
            }
        }

        // Repair drifted counters before reporting them.
        if actual_count != profile.completed_swap_count
            || (actual_hours - profile.total_hours_traded).abs() > 0.1
        {
            let _guard = self.locks.lock(uid).await;
            if let Some(mut fresh) = self.store.get_profile(uid)? {
                fresh.completed_swap_count = actual_count;
                fresh.total_hours_traded = actual_hours;
                fresh.updated_at = now;
                self.store.put_profile(&fresh)?;
                profile = fresh;
            }
            info!(uid, actual_count, actual_hours, "portfolio counters repaired");
        }

        let mut verified_skills_taught: Vec<VerifiedSkill> = taught
            .into_iter()
            .map(|(name, acc)| acc.into_skill(name))
            .collect();
        let mut verified_skills_learned: Vec<VerifiedSkill> = learned
            .into_iter()
            .map(|(name, acc)| acc.into_skill(name))
            .collect();
        verified_skills_taught.sort_by(|a, b| {
            b.times_exchanged
                .cmp(&a.times_exchanged)
                .then_with(|| a.skill_name.cmp(&b.skill_name))
        });
        verified_skills_learned.sort_by(|a, b| {
            b.times_exchanged
                .cmp(&a.times_exchanged)
                .then_with(|| a.skill_name.cmp(&b.skill_name))
        });

        Ok(PortfolioView {
            uid: uid.to_string(),
            display_name: profile.display_name.clone(),
            photo_url: profile.photo_url.clone(),
            stats: Self::stats_of(&profile),
            verified_skills_taught,
            verified_skills_learned,
            recent_swaps: summaries,
            member_since: profile.created_at,
        })
    }
}
