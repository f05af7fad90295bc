//! Review submission and listings.
//!
//! One review per participant per completed swap. Submitting a review
//! rewrites the reviewed user's rating aggregates from the full review set
//! and grants them a credits bonus through the economy engine, so the
//! balance change is ledgered like every other.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use skillswap_core::{
    Review, SwapError, SwapStatus, Timestamp, Uid, MAX_REVIEW_TEXT_CHARS,
};
use skillswap_economy::EconomyEngine;
use skillswap_store::{LockMap, StoreDb};

#[derive(Clone, Debug, Deserialize)]
pub struct ReviewCreate {
    pub swap_request_id: String,
    pub rating: u8,
    pub review_text: Option<String>,
}

/// A review enriched with the reviewer's public identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewView {
    pub id: String,
    pub swap_request_id: String,
    pub reviewer_uid: Uid,
    pub reviewed_uid: Uid,
    pub rating: u8,
    pub review_text: Option<String>,
    pub skill_exchanged: Option<String>,
    pub hours_exchanged: f64,
    pub created_at: Timestamp,
    pub reviewer_name: Option<String>,
    pub reviewer_photo: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewListPage {
    pub reviews: Vec<ReviewView>,
    pub total: usize,
    pub average_rating: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapReviews {
    pub swap_request_id: String,
    pub reviews: Vec<ReviewView>,
    pub user_has_reviewed: bool,
    pub can_review: bool,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub struct ReviewService {
    store: Arc<StoreDb>,
    locks: Arc<LockMap>,
    economy: Arc<EconomyEngine>,
}

impl ReviewService {
    pub fn new(store: Arc<StoreDb>, locks: Arc<LockMap>, economy: Arc<EconomyEngine>) -> Self {
        Self {
            store,
            locks,
            economy,
        }
    }

    fn enrich(&self, review: Review) -> ReviewView {
        let reviewer = self.store.get_profile(&review.reviewer_uid).ok().flatten();
        ReviewView {
            reviewer_name: reviewer.as_ref().and_then(|p| p.display_name.clone()),
            reviewer_photo: reviewer.and_then(|p| p.photo_url),
            id: review.id,
            swap_request_id: review.swap_request_id,
            reviewer_uid: review.reviewer_uid,
            reviewed_uid: review.reviewed_uid,
            rating: review.rating,
            review_text: review.review_text,
            skill_exchanged: review.skill_exchanged,
            hours_exchanged: review.hours_exchanged,
            created_at: review.created_at,
        }
    }

    pub async fn submit(
        &self,
        reviewer_uid: &str,
        input: ReviewCreate,
        now: Timestamp,
    ) -> Result<ReviewView, SwapError> {
        if !(1..=5).contains(&input.rating) {
            return Err(SwapError::Validation("rating must be 1..=5".into()));
        }
        if let Some(text) = &input.review_text {
            if text.chars().count() > MAX_REVIEW_TEXT_CHARS {
                return Err(SwapError::Validation(format!(
                    "review text must be at most {MAX_REVIEW_TEXT_CHARS} characters"
                )));
            }
        }

        let swap = self
            .store
            .get_swap(&input.swap_request_id)?
            .ok_or_else(|| SwapError::SwapRequestNotFound(input.swap_request_id.clone()))?;
        if !swap.is_participant(reviewer_uid) {
            return Err(SwapError::NotParticipant);
        }
        if swap.status != SwapStatus::Completed {
            return Err(SwapError::SwapNotCompleted);
        }
        if self.store.review_exists(&swap.id, reviewer_uid)? {
            return Err(SwapError::AlreadyReviewed);
        }

        let is_requester = swap.requester_uid == reviewer_uid;
        let reviewed_uid = swap.other_party(reviewer_uid).clone();
        // The skill the reviewer received.
        let skill_exchanged = if is_requester {
            Some(swap.requester_need.clone())
        } else {
            swap.requester_offer.clone()
        };
        let hours = swap.completion.final_hours.unwrap_or(1.0);

        let review = Review {
            id: self.store.new_id(),
            swap_request_id: swap.id.clone(),
            reviewer_uid: reviewer_uid.to_string(),
            reviewed_uid: reviewed_uid.clone(),
            rating: input.rating,
            review_text: input.review_text,
            skill_exchanged: skill_exchanged.clone(),
            hours_exchanged: hours,
            created_at: now,
        };
        self.store.put_review(&review)?;

        self.refresh_rating_aggregates(&reviewed_uid, now).await?;
        self.economy
            .award_review_bonus(
                &reviewed_uid,
                &swap.id,
                hours,
                input.rating,
                skill_exchanged,
                now,
            )
            .await?;

        info!(swap_id = %swap.id, reviewer_uid, reviewed_uid = %reviewed_uid, "review submitted");
        Ok(self.enrich(review))
    }

    /// Recompute `average_rating` / `review_count` from the stored reviews.
    async fn refresh_rating_aggregates(&self, uid: &str, now: Timestamp) -> Result<(), SwapError> {
        let reviews = self.store.iter_reviews_received(uid)?;
        if reviews.is_empty() {
            return Ok(());
        }
        let count = reviews.len() as u32;
        let avg = reviews.iter().map(|r| r.rating as f64).sum::<f64>() / count as f64;

        let _guard = self.locks.lock(uid).await;
        if let Some(mut profile) = self.store.get_profile(uid)? {
            profile.average_rating = round2(avg);
            profile.review_count = count;
            profile.updated_at = now;
            self.store.put_profile(&profile)?;
        }
        Ok(())
    }

    fn page(&self, mut reviews: Vec<Review>, limit: usize, offset: usize) -> ReviewListPage {
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = reviews.len();
        let average_rating = if total == 0 {
            0.0
        } else {
            round2(reviews.iter().map(|r| r.rating as f64).sum::<f64>() / total as f64)
        };
        let reviews = reviews
            .into_iter()
            .skip(offset)
            .take(limit.clamp(1, 100))
            .map(|r| self.enrich(r))
            .collect();
        ReviewListPage {
            reviews,
            total,
            average_rating,
        }
    }

    /// Reviews received by a user, newest first.
    pub fn received(
        &self,
        uid: &str,
        limit: usize,
        offset: usize,
    ) -> Result<ReviewListPage, SwapError> {
        Ok(self.page(self.store.iter_reviews_received(uid)?, limit, offset))
    }

    /// Reviews written by a user, newest first.
    pub fn given(
        &self,
        uid: &str,
        limit: usize,
        offset: usize,
    ) -> Result<ReviewListPage, SwapError> {
        Ok(self.page(self.store.iter_reviews_given(uid)?, limit, offset))
    }

    /// Both participants' reviews for one swap, with the caller's state.
    pub fn for_swap(&self, swap_request_id: &str, uid: &str) -> Result<SwapReviews, SwapError> {
        let swap = self
            .store
            .get_swap(swap_request_id)?
            .ok_or_else(|| SwapError::SwapRequestNotFound(swap_request_id.to_string()))?;
        if !swap.is_participant(uid) {
            return Err(SwapError::NotParticipant);
        }

        let reviews: Vec<ReviewView> = self
            .store
            .iter_reviews_for_swap(swap_request_id)?
            .into_iter()
            .map(|r| self.enrich(r))
            .collect();
        let user_has_reviewed = reviews.iter().any(|r| r.reviewer_uid == uid);
        Ok(SwapReviews {
            swap_request_id: swap_request_id.to_string(),
            can_review: swap.status == SwapStatus::Completed && !user_has_reviewed,
            user_has_reviewed,
            reviews,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillswap_core::{Completion, Profile, SwapRequest, SwapType, TransactionReason};
    use skillswap_economy::FlatDemand;

    struct Stack {
        store: Arc<StoreDb>,
        reviews: ReviewService,
    }

    fn stack() -> Stack {
        let store = Arc::new(StoreDb::open_temporary().unwrap());
        let locks = Arc::new(LockMap::new());
        let economy = Arc::new(EconomyEngine::new(
            store.clone(),
            locks.clone(),
            Arc::new(FlatDemand),
        ));
        let reviews = ReviewService::new(store.clone(), locks, economy);
        Stack { store, reviews }
    }

    fn seed_completed_swap(stack: &Stack, id: &str, hours: f64) {
        for uid in ["alice", "bob"] {
            stack
                .store
                .put_profile(&Profile::new(uid.into(), format!("{uid}@x.com"), 0))
                .unwrap();
        }
        stack
            .store
            .put_swap(&SwapRequest {
                id: id.into(),
                requester_uid: "alice".into(),
                recipient_uid: "bob".into(),
                status: SwapStatus::Completed,
                swap_type: SwapType::Direct,
                requester_offer: Some("Python".into()),
                requester_need: "Guitar".into(),
                points_offered: None,
                points_reserved: 0,
                message: None,
                created_at: 0,
                updated_at: 0,
                responded_at: None,
                conversation_id: None,
                completion: Completion {
                    final_hours: Some(hours),
                    ..Default::default()
                },
            })
            .unwrap();
    }

    #[tokio::test]
    async fn submit_updates_aggregates_and_awards_bonus() {
        let stack = stack();
        seed_completed_swap(&stack, "s1", 3.0);

        let view = stack
            .reviews
            .submit(
                "alice",
                ReviewCreate {
                    swap_request_id: "s1".into(),
                    rating: 5,
                    review_text: Some("great teacher".into()),
                },
                100,
            )
            .await
            .unwrap();
        assert_eq!(view.reviewed_uid, "bob");
        assert_eq!(view.skill_exchanged.as_deref(), Some("Guitar"));
        assert_eq!(view.hours_exchanged, 3.0);

        let bob = stack.store.get_profile("bob").unwrap().unwrap();
        assert_eq!(bob.average_rating, 5.0);
        assert_eq!(bob.review_count, 1);
        // Bonus credits: round(3.0 · 5/3) = 5, ledgered.
        assert_eq!(bob.swap_credits, 5);
        let txs = stack.store.iter_credits_txs("bob").unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].reason, TransactionReason::Bonus);
        assert_eq!(txs[0].balance_after, 5);
    }

    #[tokio::test]
    async fn one_review_per_reviewer_per_swap() {
        let stack = stack();
        seed_completed_swap(&stack, "s1", 1.0);
        let create = ReviewCreate {
            swap_request_id: "s1".into(),
            rating: 4,
            review_text: None,
        };
        stack.reviews.submit("alice", create.clone(), 100).await.unwrap();
        let err = stack.reviews.submit("alice", create, 101).await.unwrap_err();
        assert!(matches!(err, SwapError::AlreadyReviewed));

        // The other participant can still review.
        stack
            .reviews
            .submit(
                "bob",
                ReviewCreate {
                    swap_request_id: "s1".into(),
                    rating: 3,
                    review_text: None,
                },
                102,
            )
            .await
            .unwrap();
        let swap_reviews = stack.reviews.for_swap("s1", "bob").unwrap();
        assert_eq!(swap_reviews.reviews.len(), 2);
        assert!(swap_reviews.user_has_reviewed);
        assert!(!swap_reviews.can_review);
    }

    #[tokio::test]
    async fn only_completed_swaps_can_be_reviewed() {
        let stack = stack();
        seed_completed_swap(&stack, "s1", 1.0);
        let mut swap = stack.store.get_swap("s1").unwrap().unwrap();
        swap.status = SwapStatus::Accepted;
        stack.store.put_swap(&swap).unwrap();

        let err = stack
            .reviews
            .submit(
                "alice",
                ReviewCreate {
                    swap_request_id: "s1".into(),
                    rating: 5,
                    review_text: None,
                },
                100,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::SwapNotCompleted));
    }

    #[tokio::test]
    async fn outsiders_cannot_review() {
        let stack = stack();
        seed_completed_swap(&stack, "s1", 1.0);
        let err = stack
            .reviews
            .submit(
                "mallory",
                ReviewCreate {
                    swap_request_id: "s1".into(),
                    rating: 1,
                    review_text: None,
                },
                100,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::NotParticipant));
    }

    #[tokio::test]
    async fn listings_sort_and_average() {
        let stack = stack();
        seed_completed_swap(&stack, "s1", 2.0);
        seed_completed_swap(&stack, "s2", 2.0);
        stack
            .reviews
            .submit(
                "alice",
                ReviewCreate {
                    swap_request_id: "s1".into(),
                    rating: 5,
                    review_text: None,
                },
                100,
            )
            .await
            .unwrap();
        stack
            .reviews
            .submit(
                "alice",
                ReviewCreate {
                    swap_request_id: "s2".into(),
                    rating: 2,
                    review_text: None,
                },
                200,
            )
            .await
            .unwrap();

        let received = stack.reviews.received("bob", 10, 0).unwrap();
        assert_eq!(received.total, 2);
        assert_eq!(received.average_rating, 3.5);
        assert_eq!(received.reviews[0].swap_request_id, "s2"); // newest first

        let given = stack.reviews.given("alice", 10, 0).unwrap();
        assert_eq!(given.total, 2);
        assert!(stack.reviews.received("alice", 10, 0).unwrap().reviews.is_empty());
    }
}
