//! Notification orchestration: template rendering plus the two send-rate
//! guards (message debounce, match-pair dedupe).

use std::sync::Arc;

use skillswap_cache::Cache;
use skillswap_core::{MATCH_NOTIFY_DEDUPE_SECS, MESSAGE_NOTIFY_DEBOUNCE_SECS};
use tracing::debug;

use crate::templates;
use crate::Notifier;

pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    cache: Arc<dyn Cache>,
    app_url: String,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, cache: Arc<dyn Cache>, app_url: String) -> Self {
        Self {
            notifier,
            cache,
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.notifier.enabled()
    }

    pub async fn send_welcome(
        &self,
        to: &str,
        user_name: &str,
        skills_to_offer: &str,
        services_needed: &str,
    ) -> bool {
        let content =
            templates::welcome_email(user_name, skills_to_offer, services_needed, &self.app_url);
        self.notifier.deliver(to, content).await
    }

    /// Match notification, deduped per unordered uid pair. The dedupe key
    /// lives in the cache so multi-process deployments share it.
    pub async fn send_match_notification(
        &self,
        to: &str,
        my_uid: &str,
        match_uid: &str,
        user_name: &str,
        match_name: &str,
        match_offers: &str,
        match_needs: &str,
        score: f64,
    ) -> bool {
        let (lo, hi) = if my_uid <= match_uid {
            (my_uid, match_uid)
        } else {
            (match_uid, my_uid)
        };
        let dedupe_key = format!("match_notify:{lo}:{hi}");
        if self.cache.get(&dedupe_key).is_some() {
            debug!(%dedupe_key, "match notification suppressed (already sent)");
            return false;
        }

        let content = templates::match_notification_email(
            user_name,
            match_name,
            match_offers,
            match_needs,
            score,
            &self.app_url,
        );
        let sent = self.notifier.deliver(to, content).await;
        if sent {
            self.cache
                .set(&dedupe_key, "1".into(), MATCH_NOTIFY_DEDUPE_SECS);
        }
        sent
    }

    pub async fn send_swap_request(
        &self,
        to: &str,
        recipient_name: &str,
        requester_name: &str,
        requester_offers: &str,
        requester_needs: &str,
        message: &str,
    ) -> bool {
        let content = templates::swap_request_email(
            recipient_name,
            requester_name,
            requester_offers,
            requester_needs,
            message,
            &self.app_url,
        );
        self.notifier.deliver(to, content).await
    }

    pub async fn send_swap_response(
        &self,
        to: &str,
        requester_name: &str,
        recipient_name: &str,
        accepted: bool,
    ) -> bool {
        let content =
            templates::swap_response_email(requester_name, recipient_name, accepted, &self.app_url);
        self.notifier.deliver(to, content).await
    }

    pub async fn send_completion_pending(
        &self,
        to: &str,
        user_name: &str,
        partner_name: &str,
        hours_claimed: f64,
        deadline: &str,
    ) -> bool {
        let content = templates::completion_pending_email(
            user_name,
            partner_name,
            hours_claimed,
            deadline,
            &self.app_url,
        );
        self.notifier.deliver(to, content).await
    }

    pub async fn send_completion_disputed(
        &self,
        to: &str,
        user_name: &str,
        dispute_reason: &str,
    ) -> bool {
        let content =
            templates::completion_disputed_email(user_name, dispute_reason, &self.app_url);
        self.notifier.deliver(to, content).await
    }

    /// New-message notification, debounced to at most one per recipient per
    /// conversation per 15 minutes.
    pub async fn send_new_message(
        &self,
        to: &str,
        recipient_uid: &str,
        conversation_id: &str,
        recipient_name: &str,
        sender_name: &str,
        preview: &str,
    ) -> bool {
        let debounce_key = format!("msg_notify:{recipient_uid}:{conversation_id}");
        if self.cache.get(&debounce_key).is_some() {
            debug!(%debounce_key, "message notification debounced");
            return false;
        }

        let content =
            templates::new_message_email(recipient_name, sender_name, preview, &self.app_url);
        let sent = self.notifier.deliver(to, content).await;
        if sent {
            self.cache
                .set(&debounce_key, "1".into(), MESSAGE_NOTIFY_DEBOUNCE_SECS);
        }
        sent
    }
}
