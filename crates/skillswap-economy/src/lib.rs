pub mod engine;
pub mod formulas;

pub use engine::{
    BalanceInfo, BoostView, DemandIndex, EconomyEngine, FlatDemand, HistoryPage, SettlementOutcome,
    SpendReason, SpendResult,
};
pub use formulas::{calculate_credits, calculate_points, review_bonus_credits, trust_score};
