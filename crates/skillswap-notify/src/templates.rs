//! Plain-text email templates.
//!
//! Every template takes pre-resolved display strings; no lookups happen here.

use crate::EmailContent;

fn name_or(name: &str, fallback: &str) -> String {
    if name.trim().is_empty() {
        fallback.to_string()
    } else {
        name.to_string()
    }
}

pub fn welcome_email(
    user_name: &str,
    skills_to_offer: &str,
    services_needed: &str,
    app_url: &str,
) -> EmailContent {
    let name = name_or(user_name, "there");
    EmailContent {
        subject: "Welcome to SkillSwap!".into(),
        text: format!(
            "Hi {name},\n\n\
             Your profile is live. You're offering: {skills_to_offer}\n\
             You're looking for: {services_needed}\n\n\
             We'll let you know when we find people whose skills line up with yours.\n\
             Browse matches any time: {app_url}/matches\n"
        ),
    }
}

pub fn match_notification_email(
    user_name: &str,
    match_name: &str,
    match_offers: &str,
    match_needs: &str,
    score: f64,
    app_url: &str,
) -> EmailContent {
    let name = name_or(user_name, "there");
    let pct = (score * 100.0).round() as i64;
    EmailContent {
        subject: format!("{match_name} looks like a great swap match ({pct}%)"),
        text: format!(
            "Hi {name},\n\n\
             {match_name} wants to learn what you teach, and teaches what you want to learn.\n\n\
             They offer: {match_offers}\n\
             They're looking for: {match_needs}\n\
             Mutual fit: {pct}%\n\n\
             Send them a swap request: {app_url}/matches\n"
        ),
    }
}

pub fn swap_request_email(
    recipient_name: &str,
    requester_name: &str,
    requester_offers: &str,
    requester_needs: &str,
    message: &str,
    app_url: &str,
) -> EmailContent {
    let name = name_or(recipient_name, "there");
    let intro = if message.is_empty() {
        String::new()
    } else {
        format!("\nTheir message: \"{message}\"\n")
    };
    EmailContent {
        subject: format!("{requester_name} sent you a swap request"),
        text: format!(
            "Hi {name},\n\n\
             {requester_name} would like to swap skills with you.\n\n\
             They offer: {requester_offers}\n\
             They want: {requester_needs}\n\
             {intro}\n\
             Respond here: {app_url}/requests\n"
        ),
    }
}

pub fn swap_response_email(
    requester_name: &str,
    recipient_name: &str,
    accepted: bool,
    app_url: &str,
) -> EmailContent {
    let name = name_or(requester_name, "there");
    if accepted {
        EmailContent {
            subject: format!("{recipient_name} accepted your swap request!"),
            text: format!(
                "Hi {name},\n\n\
                 {recipient_name} accepted your swap request. A conversation has been\n\
                 opened so you can arrange the details.\n\n\
                 Start chatting: {app_url}/messages\n"
            ),
        }
    } else {
        EmailContent {
            subject: format!("{recipient_name} declined your swap request"),
            text: format!(
                "Hi {name},\n\n\
                 {recipient_name} declined your swap request this time. Any reserved\n\
                 points have been returned to your balance.\n\n\
                 Find other matches: {app_url}/matches\n"
            ),
        }
    }
}

pub fn completion_pending_email(
    user_name: &str,
    partner_name: &str,
    hours_claimed: f64,
    deadline: &str,
    app_url: &str,
) -> EmailContent {
    let name = name_or(user_name, "there");
    EmailContent {
        subject: format!("{partner_name} marked your swap as complete"),
        text: format!(
            "Hi {name},\n\n\
             {partner_name} marked your swap as complete ({hours_claimed} hours).\n\
             Please confirm or dispute before {deadline} — after that the swap\n\
             finalizes automatically with their claim.\n\n\
             Review it here: {app_url}/swaps\n"
        ),
    }
}

pub fn completion_disputed_email(
    user_name: &str,
    dispute_reason: &str,
    app_url: &str,
) -> EmailContent {
    let name = name_or(user_name, "there");
    EmailContent {
        subject: "Your swap completion was disputed".into(),
        text: format!(
            "Hi {name},\n\n\
             Your swap partner disputed the completion you reported.\n\
             Reason: \"{dispute_reason}\"\n\n\
             Our team will review the dispute. Details: {app_url}/swaps\n"
        ),
    }
}

pub fn new_message_email(
    recipient_name: &str,
    sender_name: &str,
    preview: &str,
    app_url: &str,
) -> EmailContent {
    let name = name_or(recipient_name, "there");
    EmailContent {
        subject: format!("New message from {sender_name}"),
        text: format!(
            "Hi {name},\n\n\
             {sender_name} sent you a message:\n\
             \"{preview}\"\n\n\
             Reply here: {app_url}/messages\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_fall_back_to_generic_greeting() {
        let email = welcome_email("", "Python", "Guitar", "https://app.example");
        assert!(email.text.contains("Hi there,"));
        assert!(email.text.contains("Python"));
    }

    #[test]
    fn match_email_renders_percentage() {
        let email =
            match_notification_email("Alice", "Bob", "Guitar", "Python", 0.82, "https://app");
        assert!(email.subject.contains("82%"));
        assert!(email.text.contains("82%"));
    }

    #[test]
    fn response_email_differs_by_outcome() {
        let yes = swap_response_email("Alice", "Bob", true, "https://app");
        let no = swap_response_email("Alice", "Bob", false, "https://app");
        assert!(yes.subject.contains("accepted"));
        assert!(no.subject.contains("declined"));
        assert!(no.text.contains("reserved"));
    }
}
