use crate::error::MirrorError;
use crate::mirror::config::MirrorConfig;
use crate::mirror::item::{Item, RawArticle};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use serde_json::Value;
use std::env;
use std::thread;
use std::time::Duration;

const FOREM_ACCEPT: &str = "application/vnd.forem.api-v1+json";
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Where articles come from. Pages are 1-based and newest-first.
pub trait ArticleSource {
    fn fetch_page(&mut self, page: u32) -> Result<Vec<Item>>;

    /// Complete a list-endpoint summary (which lacks the body) into the
    /// full record.
    fn fetch_full(&mut self, summary: Item) -> Result<Item> {
        Ok(summary)
    }

    fn label(&self) -> &'static str;
}

/// Validate one list page. Any bad record rejects the whole page.
pub fn parse_page(page: u32, body: &str) -> Result<Vec<Item>> {
    let origin = format!("page {page}");
    let value: Value = serde_json::from_str(body).map_err(|err| MirrorError::MalformedPayload {
        origin: origin.clone(),
        reason: format!("invalid JSON: {err}"),
    })?;
    let Value::Array(entries) = value else {
        return Err(MirrorError::MalformedPayload {
            origin,
            reason: "expected a JSON array of articles".to_string(),
        }
        .into());
    };

    let mut out = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        out.push(parse_article(&format!("{origin} entry {idx}"), entry)?);
    }
    Ok(out)
}

fn parse_article(origin: &str, value: Value) -> Result<Item> {
    let raw: RawArticle =
        serde_json::from_value(value).map_err(|err| MirrorError::MalformedPayload {
            origin: origin.to_string(),
            reason: err.to_string(),
        })?;
    let item = raw
        .into_item()
        .map_err(|reason| MirrorError::MalformedPayload {
            origin: origin.to_string(),
            reason,
        })?;
    Ok(item)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling from `base_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn retry_after(resp: &Response) -> Option<Duration> {
    let secs = resp
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

fn running_in_ci() -> bool {
    ["CI", "GITHUB_ACTIONS"]
        .iter()
        .any(|var| env::var(var).is_ok_and(|v| v.trim() == "true"))
}

fn user_agent(ci: bool) -> String {
    let base = format!("devto-mirror/{}", env!("CARGO_PKG_VERSION"));
    if ci {
        format!("{base} (GitHub-Actions)")
    } else {
        base
    }
}

pub struct DevToClient {
    http: Client,
    api_base: String,
    username: String,
    page_size: u32,
    retry: RetryPolicy,
    page_delay: Duration,
    requests: u32,
}

impl DevToClient {
    pub fn from_config(cfg: &MirrorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FOREM_ACCEPT));
        let agent = HeaderValue::from_str(&user_agent(running_in_ci()))
            .context("invalid user agent header")?;
        headers.insert(USER_AGENT, agent);
        if let Some(key) = cfg.source.api_key.as_deref() {
            let value = HeaderValue::from_str(key).map_err(|_| {
                MirrorError::InvalidConfig("DEVTO_KEY contains invalid header bytes".to_string())
            })?;
            headers.insert("api-key", value);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.retry.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base: cfg.source.api_base.trim_end_matches('/').to_string(),
            username: cfg.source.username.clone(),
            page_size: cfg.source.page_size,
            retry: RetryPolicy {
                max_attempts: cfg.retry.max_attempts,
                base_delay: Duration::from_millis(cfg.retry.base_delay_ms),
            },
            page_delay: Duration::from_millis(cfg.retry.page_delay_ms),
            requests: 0,
        })
    }

    /// HTTP requests sent so far, retries included.
    pub fn requests_sent(&self) -> u32 {
        self.requests
    }

    fn get_text(&mut self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let mut last_reason = String::new();
        for attempt in 1..=self.retry.max_attempts {
            self.requests += 1;
            let mut wait = self.retry.backoff(attempt);
            match self.http.get(url).query(query).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.text() {
                            Ok(body) => return Ok(body),
                            Err(err) => last_reason = format!("failed to read body: {err}"),
                        }
                    } else if is_transient_status(status) {
                        if let Some(hint) = retry_after(&resp) {
                            wait = hint;
                        }
                        last_reason = format!("status {status}");
                    } else {
                        return Err(MirrorError::RemoteRejected {
                            status: status.as_u16(),
                            url: url.to_string(),
                        }
                        .into());
                    }
                }
                Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                    last_reason = err.to_string();
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("request to {url} failed"));
                }
            }

            if attempt < self.retry.max_attempts {
                eprintln!(
                    "devto-mirror: {url} attempt {attempt}/{} failed ({last_reason}); retrying in {}ms",
                    self.retry.max_attempts,
                    wait.as_millis()
                );
                thread::sleep(wait);
            }
        }

        Err(MirrorError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            reason: format!("{url}: {last_reason}"),
        }
        .into())
    }

    fn fetch_article_value(&mut self, url: &str, origin: &str) -> Result<Item> {
        let body = self.get_text(url, &[])?;
        let value: Value =
            serde_json::from_str(&body).map_err(|err| MirrorError::MalformedPayload {
                origin: origin.to_string(),
                reason: format!("invalid JSON: {err}"),
            })?;
        parse_article(origin, value)
    }

    /// Single article by its slug under the configured account.
    pub fn fetch_by_slug(&mut self, slug: &str) -> Result<Item> {
        let slug = slug.trim().trim_matches('/');
        if slug.is_empty() || slug.contains('/') {
            anyhow::bail!("invalid article slug `{slug}`");
        }
        let url = format!("{}/articles/{}/{}", self.api_base, self.username, slug);
        self.fetch_article_value(&url, &format!("article {slug}"))
    }
}

impl ArticleSource for DevToClient {
    fn fetch_page(&mut self, page: u32) -> Result<Vec<Item>> {
        if page > 1 && !self.page_delay.is_zero() {
            thread::sleep(self.page_delay);
        }
        let url = format!("{}/articles", self.api_base);
        let query = [
            ("username", self.username.clone()),
            ("page", page.to_string()),
            ("per_page", self.page_size.to_string()),
        ];
        let body = self.get_text(&url, &query)?;
        parse_page(page, &body)
    }

    fn fetch_full(&mut self, summary: Item) -> Result<Item> {
        let url = format!("{}/articles/{}", self.api_base, summary.id);
        let full = self.fetch_article_value(&url, &format!("article {}", summary.id))?;
        if full.id != summary.id {
            return Err(MirrorError::MalformedPayload {
                origin: format!("article {}", summary.id),
                reason: format!("response carried id {}", full.id),
            }
            .into());
        }
        Ok(full)
    }

    fn label(&self) -> &'static str {
        "api"
    }
}

/// Offline stand-in used by dry runs: one fixed article, or nothing.
pub struct FixtureSource {
    username: String,
    empty: bool,
}

impl FixtureSource {
    pub fn new(username: &str, empty: bool) -> Self {
        Self {
            username: username.to_string(),
            empty,
        }
    }
}

impl ArticleSource for FixtureSource {
    fn fetch_page(&mut self, page: u32) -> Result<Vec<Item>> {
        if self.empty || page > 1 {
            return Ok(Vec::new());
        }
        let fixture = serde_json::json!([{
            "id": 1,
            "title": "Test Article",
            "url": format!("https://dev.to/{}/test-article", self.username),
            "published_at": "2024-01-01T00:00:00Z",
            "body_html": "<p>Test content</p>",
            "description": "Test description",
            "cover_image": "",
            "tag_list": ["test", "validation"],
            "slug": "test-article",
        }]);
        parse_page(page, &fixture.to_string())
    }

    fn label(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_code;

    #[test]
    fn parse_page_rejects_non_array_and_bad_records() {
        let err = parse_page(2, r#"{"error":"nope"}"#).expect_err("object");
        assert_eq!(error_code(&err), "E004_MALFORMED_PAYLOAD");
        assert!(format!("{err:#}").contains("page 2"));

        let err = parse_page(
            1,
            r#"[{"id":1,"title":"ok","url":"https://dev.to/a/ok","published_at":"2024-01-01T00:00:00Z"},
                {"id":"two"}]"#,
        )
        .expect_err("bad record");
        assert!(format!("{err:#}").contains("page 1 entry 1"));
    }

    #[test]
    fn parse_page_accepts_empty_array() {
        assert!(parse_page(4, "[]").expect("empty").is_empty());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(10), MAX_BACKOFF);
    }

    #[test]
    fn user_agent_marks_ci_runs() {
        assert!(user_agent(true).ends_with("(GitHub-Actions)"));
        assert!(user_agent(false).starts_with("devto-mirror/"));
    }

    #[test]
    fn fixture_serves_one_page_then_stops() {
        let mut source = FixtureSource::new("alice", false);
        let first = source.fetch_page(1).expect("page 1");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].slug, "test-article");
        assert_eq!(first[0].link, "https://dev.to/alice/test-article");
        assert!(source.fetch_page(2).expect("page 2").is_empty());
        assert!(FixtureSource::new("alice", true).fetch_page(1).expect("empty").is_empty());
    }
}
