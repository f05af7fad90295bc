//! Reviews and derived portfolio statistics.

pub mod portfolio;
pub mod reviews;

pub use portfolio::{
    CompletedSwapSummary, PortfolioService, PortfolioStats, PortfolioView, VerifiedSkill,
};
pub use reviews::{ReviewCreate, ReviewListPage, ReviewService, ReviewView, SwapReviews};
