use fscore_core::SourceError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; fscore/0.1; +https://github.com/fscore)";
const MAX_ATTEMPTS: u32 = 3;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub(crate) async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }
            let oldest = ts.front().copied().unwrap_or(now);

            // Wait until the oldest request falls out of the window
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for a request slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }

    #[cfg(test)]
    async fn in_window(&self) -> usize {
        self.timestamps.lock().await.len()
    }
}

/// Shared HTTP client for every web-backed source
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    rate_limiter: RateLimiter,
    retry_wait: Duration,
}

impl HttpFetcher {
    pub fn new(requests_per_minute: usize, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::Http(e.to_string()))?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(requests_per_minute, Duration::from_secs(60)),
            retry_wait: Duration::from_secs(15),
        })
    }

    pub fn with_retry_wait(mut self, retry_wait: Duration) -> Self {
        self.retry_wait = retry_wait;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request with rate limiting and automatic 429 retry.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, SourceError> {
        let request = builder.build().map_err(|e| SourceError::Http(e.to_string()))?;

        for attempt in 0..MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| SourceError::Http("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await.map_err(map_reqwest)?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            tracing::warn!(
                "{} rate limited us, waiting {}s before retry {}/{}",
                request.url().host_str().unwrap_or("host"),
                self.retry_wait.as_secs(),
                attempt + 1,
                MAX_ATTEMPTS
            );
            tokio::time::sleep(self.retry_wait).await;
        }

        Err(SourceError::Unavailable(format!(
            "Rate limited by {} after {} retries",
            request.url(),
            MAX_ATTEMPTS
        )))
    }

    /// GET a page as text. A 404 is "no data", other non-success statuses are errors.
    pub async fn get_text(&self, url: &str) -> Result<Option<String>, SourceError> {
        let response = self.send(self.client.get(url)).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            tracing::debug!("{} returned {}", url, status);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SourceError::Http(format!("HTTP {} for {}", status, url)));
        }

        response.text().await.map(Some).map_err(map_reqwest)
    }
}

fn map_reqwest(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Unavailable(format!("request timed out: {}", e))
    } else if e.is_decode() {
        SourceError::Malformed(e.to_string())
    } else {
        SourceError::Http(e.to_string())
    }
}
