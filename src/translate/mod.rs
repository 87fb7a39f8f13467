//! Translation client: cache lookup, settings, one HTTP call, bounded 429 retry.

pub mod cache;
pub mod gemini;
pub mod http;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::{ClientConfig, SettingsStore};
use cache::TranslationCache;
use http::{HttpReply, Transport};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("empty source text")]
    EmptyInput,
    #[error("API key not configured")]
    MissingCredential,
    #[error("request failed with status {status}")]
    RequestFailed { status: u16 },
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Translates text through the remote generation endpoint.
/// Only completed results are cached; concurrent requests for the same
/// text are not coalesced.
pub struct TranslationClient {
    transport: Arc<dyn Transport>,
    settings: Arc<dyn SettingsStore>,
    cache: Arc<TranslationCache>,
    config: ClientConfig,
}

impl TranslationClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: Arc<dyn SettingsStore>,
        cache: Arc<TranslationCache>,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            settings,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    /// Drop the cached translation so the next call goes to the network.
    pub fn evict(&self, text: &str) -> bool {
        let evicted = self.cache.remove(text).is_some();
        debug!(evicted, len = text.len(), "cache_evict");
        evicted
    }

    /// Translate, collapsing every failure to `None` after logging it.
    pub async fn translate(&self, text: &str) -> Option<String> {
        match self.try_translate(text).await {
            Ok(translated) => Some(translated),
            Err(TranslateError::MissingCredential) => {
                error!("API key not found, set it in the extension settings");
                None
            }
            Err(e) => {
                warn!(error = %e, "translation failed");
                None
            }
        }
    }

    pub async fn try_translate(&self, text: &str) -> Result<String, TranslateError> {
        if text.is_empty() {
            return Err(TranslateError::EmptyInput);
        }
        if let Some(hit) = self.cache.get(text) {
            debug!(len = text.len(), "cache_hit");
            return Ok(hit);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("translate", %request_id);
        self.fetch_and_store(text).instrument(span).await
    }

    async fn fetch_and_store(&self, text: &str) -> Result<String, TranslateError> {
        let settings = self.settings.load().await;
        let api_key = settings.credential().ok_or(TranslateError::MissingCredential)?;

        let url = gemini::endpoint_url(&self.config, api_key)?;
        let body = gemini::request_body(&settings.render_prompt(text));

        let reply = self.send_with_retry(&url, &body).await?;
        let translated = gemini::extract_text(&reply.body)?;

        self.cache.insert(text.to_string(), translated.clone());
        info!(src_len = text.len(), out_len = translated.len(), "translated");
        Ok(translated)
    }

    /// 429: wait `retry.delay` and resend, at most `retry.max_retries` times.
    /// Any other non-2xx status is terminal.
    async fn send_with_retry(
        &self,
        url: &reqwest::Url,
        body: &serde_json::Value,
    ) -> Result<HttpReply, TranslateError> {
        let policy = self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(attempt, endpoint = %gemini::redacted(url), "request_send");
            let reply = self.transport.post_json(url, body).await?;

            if reply.is_success() {
                return Ok(reply);
            }
            if reply.is_rate_limited() {
                if attempt > policy.max_retries {
                    return Err(TranslateError::RateLimited { attempts: attempt });
                }
                warn!(
                    attempt,
                    wait_ms = u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
                    "429 rate limited, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                continue;
            }
            return Err(TranslateError::RequestFailed {
                status: reply.status,
            });
        }
    }
}
