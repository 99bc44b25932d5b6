use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{Backend, Settings};

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("spider error: {0}")]
    Spider(String),
    #[error("empty body from {0}")]
    EmptyBody(String),
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

impl FetchError {
    /// Rate limiting, server errors and transport failures are worth another try.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            FetchError::Spider(msg) => {
                msg.contains("429")
                    || msg.contains("rate")
                    || msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503")
            }
            FetchError::EmptyBody(_) | FetchError::RetriesExhausted { .. } => false,
        }
    }
}

/// Source of page bodies.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Runs `attempt` until it succeeds, fails permanently, or `max_retries` retries
/// are used up, doubling the wait after each retryable failure.
async fn with_retry<F, Fut>(
    url: &str,
    max_retries: u32,
    backoff_ms: u64,
    mut attempt: F,
) -> Result<String, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, FetchError>>,
{
    let mut tries = 0u32;
    loop {
        let err = match attempt().await {
            Ok(body) => return Ok(body),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };
        if tries == max_retries {
            return Err(FetchError::RetriesExhausted {
                url: url.to_string(),
                attempts: tries + 1,
                last: err.to_string(),
            });
        }
        let backoff = Duration::from_millis(backoff_ms * 2u64.pow(tries));
        warn!(
            "{} on {} (attempt {}/{}), backing off {:.1}s",
            err,
            url,
            tries + 1,
            max_retries,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
        tries += 1;
    }
}

// ── Politeness ──

/// Enforces a random gap in `[min, max]` between consecutive requests.
pub struct RateLimiter {
    min: Duration,
    max: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min: Duration, max: Duration) -> Self {
        RateLimiter {
            min,
            max: max.max(min),
            last: Mutex::new(None),
        }
    }

    fn next_delay(&self) -> Duration {
        let spread = (self.max - self.min).as_millis() as u64;
        if spread == 0 {
            return self.min;
        }
        self.min + Duration::from_millis(rand::random::<u64>() % (spread + 1))
    }

    pub async fn wait(&self) {
        let delay = self.next_delay();
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Hands out user agents round-robin.
pub struct UserAgentRotator {
    agents: Vec<String>,
    next: AtomicUsize,
}

impl UserAgentRotator {
    pub fn new(agents: Vec<String>) -> Self {
        let agents = if agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|a| a.to_string()).collect()
        } else {
            agents
        };
        UserAgentRotator {
            agents,
            next: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> &str {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        &self.agents[i]
    }
}

impl Default for UserAgentRotator {
    fn default() -> Self {
        UserAgentRotator::new(Vec::new())
    }
}

// ── Backends ──

pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
    agents: UserAgentRotator,
    max_retries: u32,
    backoff_ms: u64,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(HttpFetcher {
            client,
            limiter: RateLimiter::new(
                Duration::from_millis(settings.min_delay_ms),
                Duration::from_millis(settings.max_delay_ms),
            ),
            agents: UserAgentRotator::default(),
            max_retries: settings.max_retries,
            backoff_ms: settings.backoff_ms,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        self.limiter.wait().await;
        let start = Instant::now();
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, self.agents.next())
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.text().await?;
        debug!("GET {} -> {} bytes in {}ms", url, body.len(), start.elapsed().as_millis());
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody(url.to_string()));
        }
        Ok(body)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        with_retry(url, self.max_retries, self.backoff_ms, || self.fetch_once(url)).await
    }
}

/// Fetches raw HTML through the Spider API.
pub struct SpiderFetcher {
    spider: Spider,
    max_retries: u32,
    backoff_ms: u64,
}

impl SpiderFetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let key = settings
            .spider_api_key
            .clone()
            .ok_or_else(|| FetchError::Spider("no API key configured".to_string()))?;
        let spider = Spider::new(Some(key))
            .map_err(|e| FetchError::Spider(format!("Failed to create Spider client: {}", e)))?;
        Ok(SpiderFetcher {
            spider,
            max_retries: settings.max_retries,
            backoff_ms: settings.backoff_ms,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let value = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| FetchError::Spider(e.to_string()))?;

        let parsed: serde_json::Value = match value.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(value.clone()),
            None => value,
        };
        let first = parsed.as_array().and_then(|arr| arr.first());

        if let Some(status) = first
            .and_then(|obj| obj.get("status"))
            .and_then(|s| s.as_u64())
        {
            if status >= 400 {
                return Err(FetchError::Status {
                    status: status as u16,
                    url: url.to_string(),
                });
            }
        }

        first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| FetchError::EmptyBody(url.to_string()))
    }
}

impl Fetcher for SpiderFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        with_retry(url, self.max_retries, self.backoff_ms, || self.fetch_once(url)).await
    }
}

/// Backend picked by configuration.
pub enum AnyFetcher {
    Http(HttpFetcher),
    Spider(SpiderFetcher),
}

impl AnyFetcher {
    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        Ok(match settings.backend {
            Backend::Http => AnyFetcher::Http(HttpFetcher::new(settings)?),
            Backend::Spider => AnyFetcher::Spider(SpiderFetcher::new(settings)?),
        })
    }
}

impl Fetcher for AnyFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        match self {
            AnyFetcher::Http(f) => f.fetch(url).await,
            AnyFetcher::Spider(f) => f.fetch(url).await,
        }
    }
}

/// Serves canned pages by URL; anything else is a 404.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryFetcher {
    pages: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MemoryFetcher {
    pub fn with(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[cfg(test)]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[test]
    fn user_agents_rotate() {
        let ua = UserAgentRotator::new(vec!["a".into(), "b".into()]);
        assert_eq!(ua.next(), "a");
        assert_eq!(ua.next(), "b");
        assert_eq!(ua.next(), "a");
        assert_eq!(UserAgentRotator::default().next(), DEFAULT_USER_AGENTS[0]);
    }

    #[test]
    fn delay_stays_in_window() {
        let limiter = RateLimiter::new(Duration::from_millis(100), Duration::from_millis(300));
        for _ in 0..50 {
            let d = limiter.next_delay();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(300));
        }
        let fixed = RateLimiter::new(Duration::from_millis(50), Duration::from_millis(50));
        assert_eq!(fixed.next_delay(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(40), Duration::from_millis(40));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn retry_classification() {
        let status = |s| FetchError::Status { status: s, url: "u".into() };
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(FetchError::Spider("429 Too Many Requests".into()).is_retryable());
        assert!(!FetchError::EmptyBody("u".into()).is_retryable());
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let body = with_retry("u", 3, 1, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FetchError::Status { status: 503, url: "u".into() })
            } else {
                Ok("<html></html>".to_string())
            }
        })
        .await
        .unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = with_retry("u", 2, 1, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<String, _>(FetchError::Status { status: 429, url: "u".into() })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = with_retry("u", 3, 1, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<String, _>(FetchError::Status { status: 404, url: "u".into() })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memory_fetcher_serves_pages() {
        let f = MemoryFetcher::default().with("https://x.test/a", "<h1>A</h1>");
        assert_eq!(f.fetch("https://x.test/a").await.unwrap(), "<h1>A</h1>");
        assert!(matches!(
            f.fetch("https://x.test/b").await,
            Err(FetchError::Status { status: 404, .. })
        ));
    }
}
