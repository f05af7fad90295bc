use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use skillswap_core::{Block, Message, Profile, ProfilePatch, Report, SwapRequest};
use skillswap_economy::{BalanceInfo, BoostView, HistoryPage, SpendResult};
use skillswap_match::{MatchQuery, MatchResult, SearchQuery, SearchResult, SkillRecommendation};
use skillswap_messaging::{ConversationListPage, ConversationView};
use skillswap_messaging::moderation::ReportCreate;
use skillswap_portfolio::{
    PortfolioStats, PortfolioView, ReviewCreate, ReviewListPage, ReviewView, SwapReviews,
};
use skillswap_profiles::ProfileUpsert;
use skillswap_swaps::{
    CompletionInput, CompletionStatus, RespondAction, SwapRequestCreate, VerifyAction,
};

use crate::types::{
    RpcHealth, RpcMessage, RpcReindexResult, RpcSpendRequest, RpcUnreadCount,
};

/// SkillSwap JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "swap_" via `namespace = "swap"`.
/// Each method corresponds to one endpoint of the HTTP surface; the acting
/// user arrives as an explicit `uid` parameter (authentication is resolved
/// by the transport layer in front of this API).
#[rpc(server, namespace = "swap")]
pub trait SwapApi {
    // ── Profiles ─────────────────────────────────────────────────────────────

    /// Create or update a profile and (re)index its skill vectors.
    #[method(name = "upsertProfile")]
    async fn upsert_profile(&self, profile: ProfileUpsert) -> RpcResult<Profile>;

    #[method(name = "getProfile")]
    async fn get_profile(&self, uid: String) -> RpcResult<Profile>;

    #[method(name = "getProfileByEmail")]
    async fn get_profile_by_email(&self, email: String) -> RpcResult<Profile>;

    /// Partial update; reindexes when a skill text changed.
    #[method(name = "updateProfile")]
    async fn update_profile(&self, uid: String, patch: ProfilePatch) -> RpcResult<Profile>;

    /// Remove from the store and the vector index.
    #[method(name = "deleteProfile")]
    async fn delete_profile(&self, uid: String) -> RpcResult<RpcMessage>;

    /// Recovery tool: re-embed and re-upsert one profile.
    #[method(name = "reindexProfile")]
    async fn reindex_profile(&self, uid: String) -> RpcResult<RpcReindexResult>;

    // ── Search & matching ────────────────────────────────────────────────────

    /// Semantic profile search (offers / needs / both).
    #[method(name = "search")]
    async fn search(&self, request: SearchQuery) -> RpcResult<Vec<SearchResult>>;

    /// Complementary-skill recommendations.
    #[method(name = "recommendSkills")]
    async fn recommend_skills(
        &self,
        current_skills: String,
        limit: Option<usize>,
    ) -> RpcResult<Vec<SkillRecommendation>>;

    /// Reciprocal harmonic-mean matching.
    #[method(name = "reciprocalMatch")]
    async fn reciprocal_match(&self, request: MatchQuery) -> RpcResult<Vec<MatchResult>>;

    // ── Swap requests ────────────────────────────────────────────────────────

    #[method(name = "createSwapRequest")]
    async fn create_swap_request(
        &self,
        requester_uid: String,
        request: SwapRequestCreate,
    ) -> RpcResult<SwapRequest>;

    /// Requests sent TO the user, newest first; optional status filter.
    #[method(name = "incomingRequests")]
    async fn incoming_requests(
        &self,
        uid: String,
        status: Option<String>,
    ) -> RpcResult<Vec<SwapRequest>>;

    /// Requests sent BY the user, newest first.
    #[method(name = "outgoingRequests")]
    async fn outgoing_requests(
        &self,
        uid: String,
        status: Option<String>,
    ) -> RpcResult<Vec<SwapRequest>>;

    #[method(name = "getSwapRequest")]
    async fn get_swap_request(&self, request_id: String, uid: String) -> RpcResult<SwapRequest>;

    /// Accept or decline a pending request (recipient only).
    #[method(name = "respondSwapRequest")]
    async fn respond_swap_request(
        &self,
        request_id: String,
        uid: String,
        action: RespondAction,
    ) -> RpcResult<SwapRequest>;

    /// Cancel a pending request (requester only).
    #[method(name = "cancelSwapRequest")]
    async fn cancel_swap_request(&self, request_id: String, uid: String) -> RpcResult<RpcMessage>;

    // ── Completion ───────────────────────────────────────────────────────────

    /// Mark one side of a swap complete; second mark finalizes and settles.
    #[method(name = "markComplete")]
    async fn mark_complete(
        &self,
        request_id: String,
        uid: String,
        completion: CompletionInput,
    ) -> RpcResult<CompletionStatus>;

    /// Verify (adopt their claim) or dispute a pending completion.
    #[method(name = "verifyCompletion")]
    async fn verify_completion(
        &self,
        request_id: String,
        uid: String,
        action: VerifyAction,
    ) -> RpcResult<CompletionStatus>;

    #[method(name = "completionStatus")]
    async fn completion_status(
        &self,
        request_id: String,
        uid: String,
    ) -> RpcResult<CompletionStatus>;

    /// Completed swaps for a user in either role.
    #[method(name = "completedSwaps")]
    async fn completed_swaps(
        &self,
        uid: String,
        limit: Option<usize>,
    ) -> RpcResult<Vec<SwapRequest>>;

    // ── Reviews ──────────────────────────────────────────────────────────────

    #[method(name = "submitReview")]
    async fn submit_review(&self, uid: String, review: ReviewCreate) -> RpcResult<ReviewView>;

    /// Reviews received by a user.
    #[method(name = "userReviews")]
    async fn user_reviews(
        &self,
        uid: String,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> RpcResult<ReviewListPage>;

    /// Reviews written by a user.
    #[method(name = "reviewsGiven")]
    async fn reviews_given(
        &self,
        uid: String,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> RpcResult<ReviewListPage>;

    /// Both reviews for one swap plus the caller's review state.
    #[method(name = "swapReviews")]
    async fn swap_reviews(&self, swap_request_id: String, uid: String) -> RpcResult<SwapReviews>;

    // ── Points ───────────────────────────────────────────────────────────────

    /// Balance plus recent transactions.
    #[method(name = "pointsBalance")]
    async fn points_balance(&self, uid: String, limit: Option<usize>) -> RpcResult<BalanceInfo>;

    /// Full transaction history, paginated, optional earned/spent filter.
    #[method(name = "pointsHistory")]
    async fn points_history(
        &self,
        uid: String,
        limit: Option<usize>,
        offset: Option<usize>,
        kind: Option<String>,
    ) -> RpcResult<HistoryPage>;

    /// Spend points on priority boosts or reciprocity-free requests.
    #[method(name = "spendPoints")]
    async fn spend_points(&self, uid: String, request: RpcSpendRequest) -> RpcResult<SpendResult>;

    #[method(name = "activeBoosts")]
    async fn active_boosts(&self, uid: String) -> RpcResult<Vec<BoostView>>;

    // ── Portfolio ────────────────────────────────────────────────────────────

    #[method(name = "portfolio")]
    async fn portfolio(&self, uid: String, swap_limit: Option<usize>) -> RpcResult<PortfolioView>;

    #[method(name = "portfolioStats")]
    async fn portfolio_stats(&self, uid: String) -> RpcResult<PortfolioStats>;

    // ── Messaging ────────────────────────────────────────────────────────────

    #[method(name = "listConversations")]
    async fn list_conversations(
        &self,
        uid: String,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> RpcResult<ConversationListPage>;

    #[method(name = "getConversation")]
    async fn get_conversation(
        &self,
        conversation_id: String,
        uid: String,
    ) -> RpcResult<ConversationView>;

    /// Messages newest-first; cursor pagination via `before` (unix seconds).
    #[method(name = "getMessages")]
    async fn get_messages(
        &self,
        conversation_id: String,
        uid: String,
        limit: Option<usize>,
        before: Option<i64>,
    ) -> RpcResult<Vec<Message>>;

    #[method(name = "sendMessage")]
    async fn send_message(
        &self,
        conversation_id: String,
        uid: String,
        content: String,
    ) -> RpcResult<Message>;

    #[method(name = "markRead")]
    async fn mark_read(&self, conversation_id: String, uid: String) -> RpcResult<RpcMessage>;

    #[method(name = "unreadCount")]
    async fn unread_count(&self, uid: String) -> RpcResult<RpcUnreadCount>;

    // ── Moderation ───────────────────────────────────────────────────────────

    #[method(name = "blockUser")]
    async fn block_user(
        &self,
        uid: String,
        blocked_uid: String,
        reason: Option<String>,
    ) -> RpcResult<Block>;

    #[method(name = "unblockUser")]
    async fn unblock_user(&self, uid: String, blocked_uid: String) -> RpcResult<RpcMessage>;

    #[method(name = "listBlocked")]
    async fn list_blocked(&self, uid: String) -> RpcResult<Vec<Block>>;

    #[method(name = "reportUser")]
    async fn report_user(&self, uid: String, report: ReportCreate) -> RpcResult<Report>;

    #[method(name = "myReports")]
    async fn my_reports(&self, uid: String) -> RpcResult<Vec<Report>>;

    // ── Health ───────────────────────────────────────────────────────────────

    /// Liveness plus per-subsystem status.
    #[method(name = "health")]
    async fn health(&self) -> RpcResult<RpcHealth>;
}
