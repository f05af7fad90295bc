//! User profile — the primary document of the platform.
//!
//! A profile is created on first upsert and destroyed only by explicit
//! delete (which cascades to the vector index entry). Balance fields are
//! mutated exclusively through the economy engine so that they stay in
//! lockstep with the append-only ledgers.

use serde::{Deserialize, Serialize};

use crate::types::{Credits, Hours, Points, Timestamp, Uid};

fn default_true() -> bool {
    true
}

/// Full profile document as stored under the `profiles` tree, key = `uid`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub uid: Uid,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,

    /// Free text describing what this user can teach. Canonical embedding input.
    pub skills_to_offer: Option<String>,
    /// Free text describing what this user wants to learn.
    pub services_needed: Option<String>,

    #[serde(default = "default_true")]
    pub dm_open: bool,
    #[serde(default = "default_true")]
    pub email_updates: bool,
    #[serde(default = "default_true")]
    pub show_city: bool,

    // ── Economy counters (maintained by the economy engine) ──────────────────
    #[serde(default)]
    pub swap_points: Points,
    #[serde(default)]
    pub lifetime_points_earned: Points,
    #[serde(default)]
    pub swap_credits: Credits,

    // ── Completion stats ─────────────────────────────────────────────────────
    #[serde(default)]
    pub completed_swap_count: u32,
    #[serde(default)]
    pub total_hours_traded: Hours,

    // ── Review aggregates ────────────────────────────────────────────────────
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub review_count: u32,

    /// Percentage of received requests this user has responded to.
    #[serde(default)]
    pub response_rate: Option<f64>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Profile {
    /// A fresh profile with zeroed counters.
    pub fn new(uid: Uid, email: String, now: Timestamp) -> Self {
        Self {
            uid,
            email,
            display_name: None,
            photo_url: None,
            bio: None,
            city: None,
            timezone: None,
            skills_to_offer: None,
            services_needed: None,
            dm_open: true,
            email_updates: true,
            show_city: true,
            swap_points: 0,
            lifetime_points_earned: 0,
            swap_credits: 0,
            completed_swap_count: 0,
            total_hours_traded: 0.0,
            average_rating: 0.0,
            review_count: 0,
            response_rate: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when both skill texts are present and non-empty — the condition
    /// for this profile to exist in the vector index.
    pub fn indexable(&self) -> bool {
        fn filled(s: &Option<String>) -> bool {
            s.as_deref().map(|t| !t.trim().is_empty()).unwrap_or(false)
        }
        filled(&self.skills_to_offer) && filled(&self.services_needed)
    }
}

/// Partial update: only provided fields are applied.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub skills_to_offer: Option<String>,
    pub services_needed: Option<String>,
    pub dm_open: Option<bool>,
    pub email_updates: Option<bool>,
    pub show_city: Option<bool>,
}

impl ProfilePatch {
    /// Whether applying this patch can change the embedded skill texts.
    pub fn touches_skills(&self) -> bool {
        self.skills_to_offer.is_some() || self.services_needed.is_some()
    }

    pub fn apply(&self, profile: &mut Profile) {
        if let Some(v) = &self.display_name {
            profile.display_name = Some(v.clone());
        }
        if let Some(v) = &self.photo_url {
            profile.photo_url = Some(v.clone());
        }
        if let Some(v) = &self.bio {
            profile.bio = Some(v.clone());
        }
        if let Some(v) = &self.city {
            profile.city = Some(v.clone());
        }
        if let Some(v) = &self.timezone {
            profile.timezone = Some(v.clone());
        }
        if let Some(v) = &self.skills_to_offer {
            profile.skills_to_offer = Some(v.clone());
        }
        if let Some(v) = &self.services_needed {
            profile.services_needed = Some(v.clone());
        }
        if let Some(v) = self.dm_open {
            profile.dm_open = v;
        }
        if let Some(v) = self.email_updates {
            profile.email_updates = v;
        }
        if let Some(v) = self.show_city {
            profile.show_city = v;
        }
    }
}

/// Structured skill accepted at the edge; rendered to text before embedding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

/// Render a structured skill list to the comma-joined canonical string that
/// keeps the embedding contract stable.
pub fn skills_to_text(skills: &[SkillEntry]) -> Option<String> {
    let parts: Vec<String> = skills
        .iter()
        .filter(|s| !s.name.trim().is_empty())
        .map(|s| match s.level.as_deref().filter(|l| !l.is_empty()) {
            Some(level) => format!("{} ({})", s.name.trim(), level),
            None => s.name.trim().to_string(),
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexable_requires_both_texts() {
        let mut p = Profile::new("u1".into(), "u1@example.com".into(), 0);
        assert!(!p.indexable());
        p.skills_to_offer = Some("Python".into());
        assert!(!p.indexable());
        p.services_needed = Some("  ".into());
        assert!(!p.indexable());
        p.services_needed = Some("Guitar".into());
        assert!(p.indexable());
    }

    #[test]
    fn patch_applies_only_provided_fields() {
        let mut p = Profile::new("u1".into(), "u1@example.com".into(), 0);
        p.bio = Some("old bio".into());
        let patch = ProfilePatch {
            city: Some("Lisbon".into()),
            dm_open: Some(false),
            ..Default::default()
        };
        patch.apply(&mut p);
        assert_eq!(p.city.as_deref(), Some("Lisbon"));
        assert_eq!(p.bio.as_deref(), Some("old bio"));
        assert!(!p.dm_open);
    }

    #[test]
    fn structured_skills_render_with_levels() {
        let skills = vec![
            SkillEntry { name: "Python".into(), level: Some("advanced".into()) },
            SkillEntry { name: "Cooking".into(), level: None },
            SkillEntry { name: " ".into(), level: None },
        ];
        assert_eq!(
            skills_to_text(&skills).as_deref(),
            Some("Python (advanced), Cooking")
        );
        assert_eq!(skills_to_text(&[]), None);
    }
}
