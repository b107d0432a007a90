use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::HubError;
use crate::wire::{EventsPage, HubInfo, Message, Page};

const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Tunables the config layer recognizes for this client: the minimum spacing
/// between requests, the number of full hub rotations attempted before
/// giving up, and the per-request timeout. Defaults match the semantic
/// defaults documented for `rate_limit_delay_ms`, `max_retries`, and
/// `request_timeout_ms`.
#[derive(Debug, Clone, Copy)]
pub struct HubClientSettings {
    pub min_request_spacing: Duration,
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

impl Default for HubClientSettings {
    fn default() -> Self {
        Self {
            min_request_spacing: Duration::from_millis(1000),
            max_attempts: 3,
            request_timeout: Duration::from_millis(30_000),
        }
    }
}

/// One upstream hub endpoint. `transform` lets a caller attach
/// per-hub authentication headers without the client needing to know
/// anything about how a given hub authenticates.
pub struct HubEndpoint {
    pub url: String,
    pub transform: Option<Box<dyn Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync>>,
}

impl HubEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), transform: None }
    }

    pub fn with_transform(
        mut self,
        transform: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }
}

struct RateLimitState {
    rate_limit_until: Option<Instant>,
    last_request_at: Option<Instant>,
}

/// Fault-tolerant client over an ordered list of hub endpoints.
///
/// A single instance serializes its own requests (to respect the minimum
/// inter-request spacing below) -- callers that want concurrency should
/// give each worker its own `HubClient`, exactly as the teacher's `Chron`
/// gives each fetch task its own `reqwest::Client` clone.
pub struct HubClient {
    http: reqwest::Client,
    endpoints: Vec<HubEndpoint>,
    current: AtomicUsize,
    rate_limit: Mutex<RateLimitState>,
    settings: HubClientSettings,
}

impl HubClient {
    pub fn new(endpoints: Vec<HubEndpoint>) -> Self {
        Self::with_settings(endpoints, HubClientSettings::default())
    }

    pub fn with_settings(endpoints: Vec<HubEndpoint>, settings: HubClientSettings) -> Self {
        assert!(!endpoints.is_empty(), "HubClient requires at least one hub endpoint");
        Self {
            http: reqwest::Client::builder()
                .timeout(settings.request_timeout)
                .build()
                .expect("failed to build reqwest client"),
            endpoints,
            current: AtomicUsize::new(0),
            rate_limit: Mutex::new(RateLimitState { rate_limit_until: None, last_request_at: None }),
            settings,
        }
    }

    fn endpoint_at(&self, offset: usize) -> &HubEndpoint {
        let idx = (self.current.load(Ordering::SeqCst) + offset) % self.endpoints.len();
        &self.endpoints[idx]
    }

    async fn pace(&self) {
        let mut state = self.rate_limit.lock().await;
        let now = Instant::now();

        if let Some(until) = state.rate_limit_until {
            if now < until {
                let delay = until - now;
                debug!("hub client sleeping {delay:?} to respect rate limit");
                tokio::time::sleep(delay).await;
            }
        }

        if let Some(last) = state.last_request_at {
            let elapsed = Instant::now().saturating_duration_since(last);
            let spacing = self.settings.min_request_spacing;
            if elapsed < spacing {
                tokio::time::sleep(spacing - elapsed).await;
            }
        }

        state.last_request_at = Some(Instant::now());
    }

    async fn note_rate_limited(&self, retry_after: Option<Duration>) {
        let mut state = self.rate_limit.lock().await;
        state.rate_limit_until = Some(Instant::now() + retry_after.unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF));
    }

    /// Performs one logical GET against the current hub, failing over to the
    /// next configured hub on any error, and retrying the whole rotation with
    /// exponential backoff up to `max_attempts` times.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, HubError> {
        let mut last_err: Option<HubError> = None;
        let max_attempts = self.settings.max_attempts;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let backoff = Duration::from_secs(1 << (attempt - 1));
                debug!("hub client backing off {backoff:?} before attempt {}", attempt + 1);
                tokio::time::sleep(backoff).await;
            }
            self.current.store(0, Ordering::SeqCst);

            for offset in 0..self.endpoints.len() {
                self.pace().await;

                let endpoint = self.endpoint_at(offset);
                let url = format!("{}{}", endpoint.url.trim_end_matches('/'), path);
                let mut builder = self.http.get(&url).query(query);
                if let Some(transform) = &endpoint.transform {
                    builder = transform(builder);
                }

                match self.execute::<T>(builder).await {
                    Ok(value) => {
                        self.current.store(
                            (self.current.load(Ordering::SeqCst) + offset) % self.endpoints.len(),
                            Ordering::SeqCst,
                        );
                        return Ok(value);
                    }
                    Err(err) => {
                        warn!("hub request to {url} failed: {err}; advancing to next hub");
                        last_err = Some(err);
                    }
                }
            }
        }

        Err(HubError::AllHubsFailed {
            attempted: self.endpoints.len(),
            attempts: max_attempts,
            source: Box::new(last_err.unwrap_or(HubError::Timeout)),
        })
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, HubError> {
        let request = builder.build().map_err(HubError::RequestBuild)?;

        let response = tokio::time::timeout(self.settings.request_timeout, self.http.execute(request))
            .await
            .map_err(|_| HubError::Timeout)?
            .map_err(HubError::RequestExecute)?;

        if response.status().as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            self.note_rate_limited(retry_after).await;
            return Err(HubError::RateLimited);
        }

        let remaining = response.headers().get("x-ratelimit-remaining").and_then(|v| v.to_str().ok());
        let reset = response.headers().get("x-ratelimit-reset").and_then(|v| v.to_str().ok());
        if let Some(delay) = rate_limit_delay_from_headers(remaining, reset, Utc::now().timestamp()) {
            self.note_rate_limited(Some(delay)).await;
        }

        if !response.status().is_success() {
            return Err(HubError::Status { status: response.status() });
        }

        let body = response.text().await.map_err(HubError::RequestBody)?;
        serde_json::from_str(&body).map_err(HubError::Decode)
    }

    pub async fn get_hub_info(&self) -> Result<HubInfo, HubError> {
        self.get("/v1/info", &[]).await
    }

    pub async fn get_events(
        &self,
        from_event_id: Option<u64>,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<EventsPage, HubError> {
        let mut query = Vec::new();
        if let Some(from) = from_event_id {
            query.push(("from_event_id", from.to_string()));
        }
        if let Some(size) = page_size {
            query.push(("pageSize", size.to_string()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        self.get("/v1/events", &query).await
    }

    async fn get_by_fid(
        &self,
        path: &str,
        fid: u64,
        page_size: Option<u32>,
        page_token: Option<&str>,
        reverse: bool,
    ) -> Result<Page<Message>, HubError> {
        let mut query = vec![("fid", fid.to_string())];
        if let Some(size) = page_size {
            query.push(("pageSize", size.to_string()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        if reverse {
            query.push(("reverse", "1".to_string()));
        }
        self.get(path, &query).await
    }

    pub async fn get_casts_by_fid(
        &self,
        fid: u64,
        page_size: Option<u32>,
        page_token: Option<&str>,
        reverse: bool,
    ) -> Result<Page<Message>, HubError> {
        self.get_by_fid("/v1/castsByFid", fid, page_size, page_token, reverse).await
    }

    pub async fn get_reactions_by_fid(
        &self,
        fid: u64,
        page_size: Option<u32>,
        page_token: Option<&str>,
        reverse: bool,
    ) -> Result<Page<Message>, HubError> {
        self.get_by_fid("/v1/reactionsByFid", fid, page_size, page_token, reverse).await
    }

    pub async fn get_links_by_fid(
        &self,
        fid: u64,
        page_size: Option<u32>,
        page_token: Option<&str>,
        reverse: bool,
    ) -> Result<Page<Message>, HubError> {
        self.get_by_fid("/v1/linksByFid", fid, page_size, page_token, reverse).await
    }

    pub async fn get_verifications_by_fid(
        &self,
        fid: u64,
        page_size: Option<u32>,
        page_token: Option<&str>,
        reverse: bool,
    ) -> Result<Page<Message>, HubError> {
        self.get_by_fid("/v1/verificationsByFid", fid, page_size, page_token, reverse).await
    }

    pub async fn get_user_data_by_fid(
        &self,
        fid: u64,
        page_size: Option<u32>,
        page_token: Option<&str>,
        reverse: bool,
    ) -> Result<Page<Message>, HubError> {
        self.get_by_fid("/v1/userDataByFid", fid, page_size, page_token, reverse).await
    }

    pub async fn get_on_chain_signers_by_fid(
        &self,
        fid: u64,
        page_size: Option<u32>,
        page_token: Option<&str>,
        reverse: bool,
    ) -> Result<Page<crate::wire::OnChainEvent>, HubError> {
        let mut query = vec![("fid", fid.to_string())];
        if let Some(size) = page_size {
            query.push(("pageSize", size.to_string()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        if reverse {
            query.push(("reverse", "1".to_string()));
        }
        self.get("/v1/onChainSignersByFid", &query).await
    }

    /// Drives pagination of a `*ByFid` endpoint to completion, concatenating
    /// pages in hub-returned order. Mirrors the teacher's
    /// `get_all_<kind>_by_fid` convenience wrappers: callers that want lazy,
    /// one-page-at-a-time iteration can call the paged methods above
    /// directly instead.
    const PAGE_SIZE: u32 = 1000;

    pub async fn get_all_casts_by_fid(&self, fid: u64) -> Result<Vec<Message>, HubError> {
        self.drain_pages(fid, |fid, token| self.get_casts_by_fid(fid, Some(Self::PAGE_SIZE), token, false)).await
    }

    pub async fn get_all_reactions_by_fid(&self, fid: u64) -> Result<Vec<Message>, HubError> {
        self.drain_pages(fid, |fid, token| self.get_reactions_by_fid(fid, Some(Self::PAGE_SIZE), token, false)).await
    }

    pub async fn get_all_links_by_fid(&self, fid: u64) -> Result<Vec<Message>, HubError> {
        self.drain_pages(fid, |fid, token| self.get_links_by_fid(fid, Some(Self::PAGE_SIZE), token, false)).await
    }

    pub async fn get_all_verifications_by_fid(&self, fid: u64) -> Result<Vec<Message>, HubError> {
        self.drain_pages(fid, |fid, token| self.get_verifications_by_fid(fid, Some(Self::PAGE_SIZE), token, false)).await
    }

    pub async fn get_all_user_data_by_fid(&self, fid: u64) -> Result<Vec<Message>, HubError> {
        self.drain_pages(fid, |fid, token| self.get_user_data_by_fid(fid, Some(Self::PAGE_SIZE), token, false)).await
    }

    pub async fn get_all_on_chain_signers_by_fid(&self, fid: u64) -> Result<Vec<crate::wire::OnChainEvent>, HubError> {
        let mut out = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.get_on_chain_signers_by_fid(fid, Some(Self::PAGE_SIZE), token.as_deref(), false).await?;
            out.extend(page.messages);
            match page.next_page_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn drain_pages<'a, F, Fut>(&'a self, fid: u64, fetch: F) -> Result<Vec<Message>, HubError>
    where
        F: Fn(u64, Option<&str>) -> Fut,
        Fut: std::future::Future<Output = Result<Page<Message>, HubError>> + 'a,
    {
        let mut out = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = fetch(fid, token.as_deref()).await?;
            out.extend(page.messages);
            match page.next_page_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }
        Ok(out)
    }
}

/// Computes how long to suspend requests given a response's rate-limit
/// headers, or `None` if the response didn't indicate exhaustion. Pulled out
/// as a pure function so the header-parsing edge cases are testable without
/// a live hub.
fn rate_limit_delay_from_headers(remaining: Option<&str>, reset: Option<&str>, now_epoch: i64) -> Option<Duration> {
    let remaining = remaining?;
    let reset = reset?;
    if remaining != "0" {
        return None;
    }
    let reset_epoch: i64 = reset.parse().ok()?;
    let delay = (reset_epoch - now_epoch).max(0) as u64;
    Some(Duration::from_secs(delay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_header_with_remaining_requests_is_ignored() {
        assert_eq!(rate_limit_delay_from_headers(Some("5"), Some("1000"), 900), None);
    }

    #[test]
    fn rate_limit_header_missing_reset_is_ignored() {
        assert_eq!(rate_limit_delay_from_headers(Some("0"), None, 900), None);
    }

    #[test]
    fn rate_limit_header_exhausted_computes_delay_until_reset() {
        let delay = rate_limit_delay_from_headers(Some("0"), Some("1000"), 900);
        assert_eq!(delay, Some(Duration::from_secs(100)));
    }

    #[test]
    fn rate_limit_header_reset_in_the_past_clamps_to_zero() {
        let delay = rate_limit_delay_from_headers(Some("0"), Some("500"), 900);
        assert_eq!(delay, Some(Duration::from_secs(0)));
    }

    #[test]
    fn current_hub_rotation_wraps_around() {
        let client = HubClient::new(vec![HubEndpoint::new("http://a"), HubEndpoint::new("http://b")]);
        assert_eq!(client.endpoint_at(0).url, "http://a");
        assert_eq!(client.endpoint_at(1).url, "http://b");
        assert_eq!(client.endpoint_at(2).url, "http://a");
    }
}
