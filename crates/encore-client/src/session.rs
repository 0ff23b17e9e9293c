//! Cookie-scoped request execution
//!
//! One [`Session`] per shadow account: its cookie jar carries the login
//! state, so a user's requests look like one browser. Playing an action
//! classifies the outcome into the benchmarker's error taxonomy, feeds the
//! request counters and flags slow responses for the level-up gate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use tracing::{debug, warn};

use encore_core::counter::Counters;
use encore_core::error::{BenchError, Result};
use encore_core::params;

use crate::action::{Action, Method, Played};
use crate::cache::ResponseCache;
use crate::telemetry::Telemetry;

const USER_AGENT: &str = concat!("encore-bench/", env!("CARGO_PKG_VERSION"));

/// Shared context every session plays against.
#[derive(Clone)]
pub struct ClientConfig {
    /// `host:port` targets; each session pins one at random.
    pub targets: Vec<String>,
    pub counters: Arc<Counters>,
    pub telemetry: Arc<Telemetry>,
    /// Attach shadow-identity debug headers to every request.
    pub debug: bool,
}

pub struct Session {
    base: String,
    client: RwLock<reqwest::Client>,
    counters: Arc<Counters>,
    telemetry: Arc<Telemetry>,
    cache: ResponseCache,
    debug_header: Option<(&'static str, String)>,
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_provider(Arc::new(Jar::default()))
        .user_agent(USER_AGENT)
        .redirect(Policy::none())
        .build()
        .expect("reqwest client construction cannot fail with these options")
}

impl Session {
    pub fn new(config: &ClientConfig, debug_header: Option<(&'static str, String)>) -> Self {
        let host = config
            .targets
            .choose(&mut rand::thread_rng())
            .expect("at least one target host")
            .clone();
        Self {
            base: format!("http://{host}"),
            client: RwLock::new(build_client()),
            counters: Arc::clone(&config.counters),
            telemetry: Arc::clone(&config.telemetry),
            cache: ResponseCache::new(),
            debug_header: debug_header.filter(|_| config.debug),
        }
    }

    /// Drop every cookie; the next request starts logged out.
    pub fn reset(&self) {
        *self.client.write() = build_client();
    }

    fn default_timeout(method: Method) -> Duration {
        match method {
            Method::Get => params::GET_TIMEOUT,
            Method::Post | Method::Delete => params::POST_TIMEOUT,
        }
    }

    /// Play one action: send the request, classify the outcome, and return
    /// the response body for scenario-side validation.
    pub async fn play(&self, action: &Action) -> Result<Played> {
        let url = format!("{}{}", self.base, action.path);
        let client = self.client.read().clone();

        let mut request = match action.method {
            Method::Get => client.get(&url),
            Method::Post => client.post(&url),
            Method::Delete => client.delete(&url),
        }
        .timeout(action.timeout.unwrap_or_else(|| Self::default_timeout(action.method)));

        if let Some(body) = &action.json {
            request = request.json(body);
        }
        if let Some((name, value)) = &self.debug_header {
            request = request.header(*name, value);
        }
        if action.cache {
            for (name, value) in self.cache.validators(&action.path) {
                request = request.header(name, value);
            }
        }

        let started = Instant::now();
        let outcome = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let etag = header_string(&response, "etag");
            let last_modified = header_string(&response, "last-modified");
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>((status, etag, last_modified, body))
        }
        .await;

        let elapsed = started.elapsed();
        if elapsed > params::SLOW_THRESHOLD {
            warn!(path = %action.path, ?elapsed, "slow response");
            self.telemetry.record_slow(&action.path);
        }

        let (status, etag, last_modified, body) = outcome.map_err(|e| {
            if e.is_timeout() {
                BenchError::Timeout(format!("{} {}", action.method, action.path))
            } else {
                BenchError::unexpected(format!(
                    "{}: request failed ({} {}): {e}",
                    action.description, action.method, action.path
                ))
            }
        })?;

        debug!(method = %action.method, path = %action.path, status, ?elapsed, "played");

        let body = if action.cache {
            match status {
                200 => {
                    self.cache.store(&action.path, etag, last_modified, body.clone());
                    body
                }
                304 => self.cache.body(&action.path).unwrap_or(body),
                other => {
                    return Err(BenchError::unexpected(format!(
                        "{}: unexpected status code {other} (GET {})",
                        action.description, action.path
                    )));
                }
            }
        } else {
            if status != action.expected_status {
                return Err(BenchError::unexpected(format!(
                    "{}: expected status code {}, got {} ({} {})",
                    action.description,
                    action.expected_status,
                    status,
                    action.method,
                    action.path
                )));
            }
            body
        };

        self.counters
            .inc(&format!("{}|{}", action.method, action.path));

        Ok(Played { status, body })
    }
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
