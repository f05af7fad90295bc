//! Environment-driven configuration for the external subsystems.
//!
//! A missing variable disables the corresponding subsystem gracefully
//! instead of failing startup: no embedding endpoint means search/match
//! report the dependency as unavailable, no index URL selects the
//! in-process index, no email key selects the null notifier.

use std::env;

const DEFAULT_VECTOR_DIM: usize = 384;

#[derive(Clone, Debug)]
pub struct EmbedConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
}

#[derive(Clone, Debug)]
pub struct IndexConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub dimension: usize,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub embed: Option<EmbedConfig>,
    pub index: Option<IndexConfig>,
    pub email: Option<EmailConfig>,
    pub app_url: String,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let dimension = var("VECTOR_DIM")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_VECTOR_DIM);

        let embed = match (var("EMBED_ENDPOINT"), var("EMBED_API_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(EmbedConfig {
                endpoint,
                api_key,
                model: var("EMBED_MODEL").unwrap_or_else(|| "text-embedding-3-small".into()),
                dimension,
            }),
            _ => None,
        };

        let index = var("VECTOR_INDEX_URL").map(|url| IndexConfig {
            url,
            api_key: var("VECTOR_INDEX_API_KEY"),
            collection: var("VECTOR_INDEX_COLLECTION").unwrap_or_else(|| "swap_profiles".into()),
            dimension,
        });

        let email_enabled = var("EMAIL_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let email = if email_enabled {
            match (var("EMAIL_API_KEY"), var("EMAIL_FROM")) {
                (Some(api_key), Some(from)) => Some(EmailConfig {
                    api_url: var("EMAIL_API_URL")
                        .unwrap_or_else(|| "https://api.resend.com/emails".into()),
                    api_key,
                    from,
                }),
                _ => None,
            }
        } else {
            None
        };

        Self {
            embed,
            index,
            email,
            app_url: var("APP_URL").unwrap_or_else(|| "http://localhost:3000".into()),
        }
    }
}
