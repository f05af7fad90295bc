use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use skillswap_core::{
    Block, ErrorKind, Message, Profile, ProfilePatch, Report, SwapError, SwapRequest, SwapStatus,
    Timestamp, TransactionKind,
};
use skillswap_economy::{
    BalanceInfo, BoostView, EconomyEngine, HistoryPage, SpendResult,
};
use skillswap_match::{
    MatchQuery, MatchResult, Matcher, SearchQuery, SearchResult, SearchService,
    SkillRecommendation,
};
use skillswap_messaging::moderation::ReportCreate;
use skillswap_messaging::{
    ConversationListPage, ConversationView, MessagingService, ModerationService,
};
use skillswap_portfolio::{
    PortfolioService, PortfolioStats, PortfolioView, ReviewCreate, ReviewListPage, ReviewService,
    ReviewView, SwapReviews,
};
use skillswap_profiles::{ProfileService, ProfileUpsert};
use skillswap_store::StoreDb;
use skillswap_swaps::{
    CompletionInput, CompletionService, CompletionStatus, RespondAction, SwapRequestCreate,
    SwapService, VerifyAction,
};

use crate::api::SwapApiServer;
use crate::types::{RpcHealth, RpcMessage, RpcReindexResult, RpcSpendRequest, RpcUnreadCount};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

/// Map a domain error onto a JSON-RPC error code by its taxonomy kind.
fn to_rpc(e: SwapError) -> ErrorObject<'static> {
    let code = match e.kind() {
        ErrorKind::NotFound => -32001,
        ErrorKind::Conflict => -32002,
        ErrorKind::Forbidden => -32003,
        ErrorKind::InsufficientFunds => -32004,
        ErrorKind::Validation => -32602,
        ErrorKind::DependencyUnavailable => -32010,
        ErrorKind::Internal => -32603,
    };
    rpc_err(code, e.to_string())
}

fn now_ts() -> Timestamp {
    chrono::Utc::now().timestamp()
}

/// All subsystem handles the RPC surface dispatches into.
pub struct RpcServerState {
    pub store: Arc<StoreDb>,
    pub profiles: Arc<ProfileService>,
    pub matcher: Arc<Matcher>,
    pub search: Arc<SearchService>,
    pub swaps: Arc<SwapService>,
    pub completion: Arc<CompletionService>,
    pub economy: Arc<EconomyEngine>,
    pub messaging: Arc<MessagingService>,
    pub moderation: Arc<ModerationService>,
    pub reviews: Arc<ReviewService>,
    pub portfolio: Arc<PortfolioService>,
    /// (name, status) pairs reported by `swap_health`, wired at startup.
    pub subsystem_status: Vec<(String, String)>,
}

pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

fn parse_status(status: Option<String>) -> RpcResult<Option<SwapStatus>> {
    match status {
        None => Ok(None),
        Some(s) => s
            .parse::<SwapStatus>()
            .map(Some)
            .map_err(|_| rpc_err(-32602, format!("unknown status '{s}'"))),
    }
}

#[async_trait]
impl SwapApiServer for RpcServer {
    // ── Profiles ─────────────────────────────────────────────────────────────

    async fn upsert_profile(&self, profile: ProfileUpsert) -> RpcResult<Profile> {
        self.state
            .profiles
            .upsert(profile, now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn get_profile(&self, uid: String) -> RpcResult<Profile> {
        self.state.profiles.get(&uid).map_err(to_rpc)
    }

    async fn get_profile_by_email(&self, email: String) -> RpcResult<Profile> {
        self.state.profiles.get_by_email(&email).map_err(to_rpc)
    }

    async fn update_profile(&self, uid: String, patch: ProfilePatch) -> RpcResult<Profile> {
        self.state
            .profiles
            .patch(&uid, patch, now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn delete_profile(&self, uid: String) -> RpcResult<RpcMessage> {
        self.state.profiles.delete(&uid).await.map_err(to_rpc)?;
        Ok(RpcMessage::new("Profile deleted successfully"))
    }

    async fn reindex_profile(&self, uid: String) -> RpcResult<RpcReindexResult> {
        let skills = self.state.profiles.reindex(&uid).await.map_err(to_rpc)?;
        Ok(RpcReindexResult {
            success: true,
            message: format!("Successfully reindexed user {uid}"),
            skills_indexed: Some(skills),
        })
    }

    // ── Search & matching ────────────────────────────────────────────────────

    async fn search(&self, request: SearchQuery) -> RpcResult<Vec<SearchResult>> {
        self.state.search.search(request).await.map_err(to_rpc)
    }

    async fn recommend_skills(
        &self,
        current_skills: String,
        limit: Option<usize>,
    ) -> RpcResult<Vec<SkillRecommendation>> {
        self.state
            .search
            .recommend_skills(&current_skills, limit.unwrap_or(5))
            .await
            .map_err(to_rpc)
    }

    async fn reciprocal_match(&self, request: MatchQuery) -> RpcResult<Vec<MatchResult>> {
        self.state
            .matcher
            .reciprocal_match(request)
            .await
            .map_err(to_rpc)
    }

    // ── Swap requests ────────────────────────────────────────────────────────

    async fn create_swap_request(
        &self,
        requester_uid: String,
        request: SwapRequestCreate,
    ) -> RpcResult<SwapRequest> {
        self.state
            .swaps
            .create(&requester_uid, request, now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn incoming_requests(
        &self,
        uid: String,
        status: Option<String>,
    ) -> RpcResult<Vec<SwapRequest>> {
        let status = parse_status(status)?;
        self.state.swaps.incoming(&uid, status).map_err(to_rpc)
    }

    async fn outgoing_requests(
        &self,
        uid: String,
        status: Option<String>,
    ) -> RpcResult<Vec<SwapRequest>> {
        let status = parse_status(status)?;
        self.state.swaps.outgoing(&uid, status).map_err(to_rpc)
    }

    async fn get_swap_request(&self, request_id: String, uid: String) -> RpcResult<SwapRequest> {
        self.state.swaps.get(&request_id, &uid).map_err(to_rpc)
    }

    async fn respond_swap_request(
        &self,
        request_id: String,
        uid: String,
        action: RespondAction,
    ) -> RpcResult<SwapRequest> {
        self.state
            .swaps
            .respond(&request_id, &uid, action, now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn cancel_swap_request(&self, request_id: String, uid: String) -> RpcResult<RpcMessage> {
        self.state
            .swaps
            .cancel(&request_id, &uid, now_ts())
            .await
            .map_err(to_rpc)?;
        Ok(RpcMessage::new("Swap request cancelled"))
    }

    // ── Completion ───────────────────────────────────────────────────────────

    async fn mark_complete(
        &self,
        request_id: String,
        uid: String,
        completion: CompletionInput,
    ) -> RpcResult<CompletionStatus> {
        self.state
            .completion
            .mark_complete(&request_id, &uid, completion, now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn verify_completion(
        &self,
        request_id: String,
        uid: String,
        action: VerifyAction,
    ) -> RpcResult<CompletionStatus> {
        self.state
            .completion
            .verify(&request_id, &uid, action, now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn completion_status(
        &self,
        request_id: String,
        uid: String,
    ) -> RpcResult<CompletionStatus> {
        self.state
            .completion
            .completion_status(&request_id, &uid)
            .map_err(to_rpc)
    }

    async fn completed_swaps(
        &self,
        uid: String,
        limit: Option<usize>,
    ) -> RpcResult<Vec<SwapRequest>> {
        self.state
            .swaps
            .completed(&uid, limit.unwrap_or(20))
            .map_err(to_rpc)
    }

    // ── Reviews ──────────────────────────────────────────────────────────────

    async fn submit_review(&self, uid: String, review: ReviewCreate) -> RpcResult<ReviewView> {
        self.state
            .reviews
            .submit(&uid, review, now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn user_reviews(
        &self,
        uid: String,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> RpcResult<ReviewListPage> {
        self.state
            .reviews
            .received(&uid, limit.unwrap_or(20), offset.unwrap_or(0))
            .map_err(to_rpc)
    }

    async fn reviews_given(
        &self,
        uid: String,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> RpcResult<ReviewListPage> {
        self.state
            .reviews
            .given(&uid, limit.unwrap_or(20), offset.unwrap_or(0))
            .map_err(to_rpc)
    }

    async fn swap_reviews(&self, swap_request_id: String, uid: String) -> RpcResult<SwapReviews> {
        self.state
            .reviews
            .for_swap(&swap_request_id, &uid)
            .map_err(to_rpc)
    }

    // ── Points ───────────────────────────────────────────────────────────────

    async fn points_balance(&self, uid: String, limit: Option<usize>) -> RpcResult<BalanceInfo> {
        self.state
            .economy
            .balance(&uid, limit.unwrap_or(10).clamp(1, 50))
            .map_err(to_rpc)
    }

    async fn points_history(
        &self,
        uid: String,
        limit: Option<usize>,
        offset: Option<usize>,
        kind: Option<String>,
    ) -> RpcResult<HistoryPage> {
        let kind = match kind.as_deref() {
            None => None,
            Some("earned") => Some(TransactionKind::Earned),
            Some("spent") => Some(TransactionKind::Spent),
            Some(other) => {
                return Err(rpc_err(-32602, format!("unknown kind '{other}'")));
            }
        };
        self.state
            .economy
            .history(&uid, limit.unwrap_or(20).clamp(1, 100), offset.unwrap_or(0), kind)
            .map_err(to_rpc)
    }

    async fn spend_points(&self, uid: String, request: RpcSpendRequest) -> RpcResult<SpendResult> {
        self.state
            .economy
            .spend(&uid, request.reason, request.duration_hours, now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn active_boosts(&self, uid: String) -> RpcResult<Vec<BoostView>> {
        self.state.economy.active_boosts(&uid, now_ts()).map_err(to_rpc)
    }

    // ── Portfolio ────────────────────────────────────────────────────────────

    async fn portfolio(&self, uid: String, swap_limit: Option<usize>) -> RpcResult<PortfolioView> {
        self.state
            .portfolio
            .portfolio(&uid, swap_limit.unwrap_or(10), now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn portfolio_stats(&self, uid: String) -> RpcResult<PortfolioStats> {
        self.state.portfolio.stats(&uid).map_err(to_rpc)
    }

    // ── Messaging ────────────────────────────────────────────────────────────

    async fn list_conversations(
        &self,
        uid: String,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> RpcResult<ConversationListPage> {
        self.state
            .messaging
            .list_conversations(&uid, limit.unwrap_or(20), offset.unwrap_or(0))
            .map_err(to_rpc)
    }

    async fn get_conversation(
        &self,
        conversation_id: String,
        uid: String,
    ) -> RpcResult<ConversationView> {
        self.state
            .messaging
            .get_conversation(&conversation_id, &uid)
            .map_err(to_rpc)
    }

    async fn get_messages(
        &self,
        conversation_id: String,
        uid: String,
        limit: Option<usize>,
        before: Option<i64>,
    ) -> RpcResult<Vec<Message>> {
        self.state
            .messaging
            .get_messages(&conversation_id, &uid, limit.unwrap_or(50), before)
            .map_err(to_rpc)
    }

    async fn send_message(
        &self,
        conversation_id: String,
        uid: String,
        content: String,
    ) -> RpcResult<Message> {
        self.state
            .messaging
            .send_message(&conversation_id, &uid, &content, now_ts())
            .await
            .map_err(to_rpc)
    }

    async fn mark_read(&self, conversation_id: String, uid: String) -> RpcResult<RpcMessage> {
        self.state
            .messaging
            .mark_read(&conversation_id, &uid, now_ts())
            .await
            .map_err(to_rpc)?;
        Ok(RpcMessage::new("Marked as read"))
    }

    async fn unread_count(&self, uid: String) -> RpcResult<RpcUnreadCount> {
        let total_unread = self.state.messaging.unread_total(&uid).map_err(to_rpc)?;
        Ok(RpcUnreadCount { total_unread })
    }

    // ── Moderation ───────────────────────────────────────────────────────────

    async fn block_user(
        &self,
        uid: String,
        blocked_uid: String,
        reason: Option<String>,
    ) -> RpcResult<Block> {
        self.state
            .moderation
            .block(&uid, &blocked_uid, reason, now_ts())
            .map_err(to_rpc)
    }

    async fn unblock_user(&self, uid: String, blocked_uid: String) -> RpcResult<RpcMessage> {
        self.state
            .moderation
            .unblock(&uid, &blocked_uid, now_ts())
            .map_err(to_rpc)?;
        Ok(RpcMessage::new("User unblocked"))
    }

    async fn list_blocked(&self, uid: String) -> RpcResult<Vec<Block>> {
        self.state.moderation.list_blocked(&uid).map_err(to_rpc)
    }

    async fn report_user(&self, uid: String, report: ReportCreate) -> RpcResult<Report> {
        self.state
            .moderation
            .report(&uid, report, now_ts())
            .map_err(to_rpc)
    }

    async fn my_reports(&self, uid: String) -> RpcResult<Vec<Report>> {
        self.state.moderation.list_reports(&uid).map_err(to_rpc)
    }

    // ── Health ───────────────────────────────────────────────────────────────

    async fn health(&self) -> RpcResult<RpcHealth> {
        let mut services: std::collections::BTreeMap<String, String> = self
            .state
            .subsystem_status
            .iter()
            .cloned()
            .collect();
        services.insert(
            "store".into(),
            format!("ok ({} profiles)", self.state.store.count_profiles()),
        );
        Ok(RpcHealth {
            status: "ok".into(),
            services,
        })
    }
}
