//! Pure economy math: trust scoring, points and credits per completed swap.

use skillswap_core::{SkillLevel, BASE_CREDITS_PER_HOUR, BASE_POINTS_PER_HOUR};

/// Trust score in `[0, 0.5]` from completion volume and rating.
///
/// Swap-volume component (0 to 0.35):
///   0 swaps → 0; 1..=5 → 0.10..0.25; 6..=20 → 0.25..0.35; 21+ → 0.35.
/// Rating bonus: `((avg − 1) / 4) · 0.15`, clamped to `[0, 0.15]`.
pub fn trust_score(completed_swaps: u32, average_rating: f64) -> f64 {
    let swap_trust = if completed_swaps == 0 {
        0.0
    } else if completed_swaps <= 5 {
        0.1 + (completed_swaps as f64 / 5.0) * 0.15
    } else if completed_swaps <= 20 {
        0.25 + ((completed_swaps - 5) as f64 / 15.0) * 0.10
    } else {
        0.35
    };

    let rating_bonus = (((average_rating - 1.0) / 4.0) * 0.15).clamp(0.0, 0.15);

    (swap_trust + rating_bonus).min(0.5)
}

/// Points earned for a completed swap, floored at 1.
///
/// Weighted over a base of 10 points per hour:
///   time 50%, skill level 25%, trust 15%, skill demand 10%.
pub fn calculate_points(
    hours: f64,
    level: SkillLevel,
    trust: f64,
    demand_multiplier: f64,
) -> i64 {
    let base = hours * BASE_POINTS_PER_HOUR;

    let time_component = base * 0.50;
    let skill_component = base * 0.25 * level.points_multiplier();
    let trust_component = base * 0.15 * (0.5 + trust);
    let demand_component = base * 0.10 * demand_multiplier;

    let total = time_component + skill_component + trust_component + demand_component;
    (total.round() as i64).max(1)
}

/// Credits earned for a completed swap, floored at 1. `rate_multiplier` is
/// 1.0 for full credits, 0.5 for the requester side of an indirect swap.
pub fn calculate_credits(hours: f64, level: SkillLevel, rate_multiplier: f64) -> i64 {
    let base = hours * BASE_CREDITS_PER_HOUR;
    let total = base * level.credits_multiplier() * rate_multiplier;
    (total.round() as i64).max(1)
}

/// Credits bonus for a received review: `hours · rating / 3`, floored at 1.
pub fn review_bonus_credits(hours: f64, rating: u8) -> i64 {
    let rating_factor = rating as f64 / 3.0;
    ((hours * rating_factor).round() as i64).max(1)
}
