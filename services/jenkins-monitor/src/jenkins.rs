//! Jenkins REST and Atom feed client

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::DateTime;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::io::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::model::{current_epoch_ms, BuildStatus, FeedEntry, JobSnapshot, JobTable, ServerEndpoint};
use crate::source::{RemoteJobSource, SourceFactory};
use crate::MonitorError;

const JOBS_PATH: &str = "api/json?tree=jobs[name,color,lastBuild[number]]";
const FEED_PATH: &str = "rssLatest";
const VERIFY_PATH: &str = "api/json?tree=mode";
const CRUMB_PATH: &str = "crumbIssuer/api/json";
const DEFAULT_CRUMB_FIELD: &str = "Jenkins-Crumb";

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobEntry {
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    last_build: Option<BuildRef>,
}

#[derive(Debug, Deserialize)]
struct BuildRef {
    number: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrumbResponse {
    crumb: String,
    crumb_request_field: String,
}

/// [`RemoteJobSource`] backed by a Jenkins server
pub struct JenkinsJobSource {
    endpoint: ServerEndpoint,
    http: Arc<dyn HttpClient>,
    /// Crumb issued by the server, as (header name, value)
    issued_crumb: RwLock<Option<(String, String)>>,
}

impl std::fmt::Debug for JenkinsJobSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JenkinsJobSource")
            .field("base_url", &self.endpoint.base_url)
            .field("crumb_required", &self.endpoint.crumb_required)
            .finish()
    }
}

impl JenkinsJobSource {
    pub fn new(endpoint: ServerEndpoint, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created Jenkins job source for {}", endpoint.base_url);
        Self {
            endpoint,
            http,
            issued_crumb: RwLock::new(None),
        }
    }

    async fn crumb_header(&self) -> crate::Result<Option<(String, String)>> {
        if !self.endpoint.crumb_required {
            return Ok(None);
        }
        if let Some(crumb) = &self.endpoint.crumb {
            return Ok(Some((DEFAULT_CRUMB_FIELD.to_string(), crumb.clone())));
        }
        if let Some(issued) = self.issued_crumb.read().await.clone() {
            return Ok(Some(issued));
        }

        let url = self.endpoint.url(CRUMB_PATH);
        let request = HttpRequest::get(&url).credentials(self.endpoint.credentials.clone());
        let response = self.http.get(&request).await?;
        if !response.is_success() {
            return Err(MonitorError::from_status(response.status, &url));
        }
        let parsed: CrumbResponse = serde_json::from_str(&response.body).map_err(|e| {
            MonitorError::MalformedResponse(format!("Crumb from {}: {}", url, e))
        })?;
        tracing::debug!("Obtained crumb from {}", url);

        let header = (parsed.crumb_request_field, parsed.crumb);
        *self.issued_crumb.write().await = Some(header.clone());
        Ok(Some(header))
    }

    /// GET a server-relative path and return the body of a successful response
    async fn get_body(&self, path: &str) -> crate::Result<String> {
        let url = self.endpoint.url(path);
        let mut request = HttpRequest::get(&url).credentials(self.endpoint.credentials.clone());
        if let Some((field, value)) = self.crumb_header().await? {
            request = request.header(field, value);
        }

        let response = self.http.get(&request).await?;
        if response.status == 403 {
            // an expired issued crumb is refetched on the next request
            *self.issued_crumb.write().await = None;
        }
        if !response.is_success() {
            return Err(MonitorError::from_status(response.status, &url));
        }
        Ok(response.body)
    }
}

#[async_trait]
impl RemoteJobSource for JenkinsJobSource {
    async fn fetch_jobs(&self) -> crate::Result<JobTable> {
        let body = self.get_body(JOBS_PATH).await?;
        let table = parse_jobs(&body, current_epoch_ms())?;
        tracing::debug!("Fetched {} jobs from {}", table.len(), self.endpoint.base_url);
        Ok(table)
    }

    async fn fetch_recent_builds(&self) -> crate::Result<Vec<FeedEntry>> {
        let body = self.get_body(FEED_PATH).await?;
        let entries = parse_feed(&body)?;
        tracing::debug!(
            "Fetched {} feed entries from {}",
            entries.len(),
            self.endpoint.base_url
        );
        Ok(entries)
    }

    async fn verify(&self) -> crate::Result<()> {
        let body = self.get_body(VERIFY_PATH).await?;
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            MonitorError::MalformedResponse(format!(
                "{} does not look like a Jenkins server: {}",
                self.endpoint.base_url, e
            ))
        })?;
        if !value.is_object() {
            return Err(MonitorError::MalformedResponse(format!(
                "{} returned {} instead of an object",
                self.endpoint.base_url, value
            )));
        }
        Ok(())
    }
}

/// Creates a [`JenkinsJobSource`] per configuration epoch
#[derive(Default)]
pub struct JenkinsSourceFactory {
    http: Option<Arc<dyn HttpClient>>,
}

impl JenkinsSourceFactory {
    /// Share one HTTP client across epochs instead of building one per endpoint
    pub fn with_http(http: Arc<dyn HttpClient>) -> Self {
        Self { http: Some(http) }
    }
}

impl SourceFactory for JenkinsSourceFactory {
    fn create(&self, endpoint: &ServerEndpoint) -> crate::Result<Arc<dyn RemoteJobSource>> {
        let http: Arc<dyn HttpClient> = match &self.http {
            Some(http) => Arc::clone(http),
            None => Arc::new(ReqwestHttpClient::with_timeout(endpoint.timeout)?),
        };
        Ok(Arc::new(JenkinsJobSource::new(endpoint.clone(), http)))
    }
}

/// Parse the `api/json` job listing
pub fn parse_jobs(body: &str, fetched_at_epoch_ms: u64) -> crate::Result<JobTable> {
    let parsed: JobsResponse = serde_json::from_str(body)
        .map_err(|e| MonitorError::MalformedResponse(format!("Job listing: {}", e)))?;

    Ok(parsed
        .jobs
        .into_iter()
        .map(|job| JobSnapshot {
            status: job
                .color
                .as_deref()
                .map(BuildStatus::from_color)
                .unwrap_or(BuildStatus::Unknown),
            build_number: job.last_build.map(|b| b.number),
            name: job.name,
            fetched_at_epoch_ms,
        })
        .collect())
}

fn entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("entry pattern is valid"))
}

fn element_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}>")).expect("element pattern is valid")
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| element_regex("title"))
}

fn published_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| element_regex("published"))
}

fn build_title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<job>.+?) #(?P<number>\d+)(?: \((?P<message>.*)\))?$")
            .expect("build title pattern is valid")
    })
}

/// Parse the `rssLatest` Atom feed into entries in document order
pub fn parse_feed(body: &str) -> crate::Result<Vec<FeedEntry>> {
    if !body.contains("<feed") {
        return Err(MonitorError::MalformedResponse(
            "Feed is not an Atom document".to_string(),
        ));
    }

    let mut entries = Vec::new();
    for entry in entry_regex().captures_iter(body) {
        let content = &entry[1];
        let title = title_regex()
            .captures(content)
            .map(|c| unescape_xml(c[1].trim()))
            .ok_or_else(|| MonitorError::MalformedResponse("Feed entry without title".into()))?;

        let Some(parts) = build_title_regex().captures(&title) else {
            return Err(MonitorError::MalformedResponse(format!(
                "Unexpected feed title {:?}",
                title
            )));
        };
        let build_number = parts["number"].parse::<u64>().map_err(|e| {
            MonitorError::MalformedResponse(format!("Build number in {:?}: {}", title, e))
        })?;
        let status = parts
            .name("message")
            .map(|m| status_from_message(m.as_str()))
            .unwrap_or(BuildStatus::Unknown);
        let published = published_regex()
            .captures(content)
            .and_then(|c| DateTime::parse_from_rfc3339(c[1].trim()).ok());

        entries.push(FeedEntry {
            job_name: parts["job"].to_string(),
            build_number,
            status,
            published,
        });
    }
    Ok(entries)
}

/// Status from the parenthesised summary Jenkins appends to feed titles
pub fn status_from_message(message: &str) -> BuildStatus {
    let message = message.to_lowercase();
    if message.contains("broken") {
        BuildStatus::Failure
    } else if message.contains("aborted") {
        BuildStatus::Aborted
    } else if message.contains("unstable") || message.contains("test") {
        BuildStatus::Unstable
    } else if message.contains("fail") {
        BuildStatus::Failure
    } else if message.contains("stable")
        || message.contains("normal")
        || message.contains("success")
    {
        BuildStatus::Success
    } else if message.trim() == "?" {
        BuildStatus::Building
    } else {
        BuildStatus::Unknown
    }
}

fn char_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&#(?:[xX](?P<hex>[0-9a-fA-F]+)|(?P<dec>[0-9]+));")
            .expect("character reference pattern is valid")
    })
}

/// Decode the predefined XML entities and numeric character references.
/// References that do not name a valid character are kept as written.
fn unescape_xml(text: &str) -> String {
    let decoded = char_ref_regex().replace_all(text, |caps: &regex::Captures| {
        let code = match (caps.name("hex"), caps.name("dec")) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            (None, None) => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
