//! HTTP client for the student-records portal.
//!
//! Importing is two sequential calls:
//! 1. POST the login form; the portal answers with a `SESSID` cookie
//! 2. POST the week-at-a-glance form with that cookie to get the timetable HTML
//!
//! The second call needs the cookie from the first, so they never run in
//! parallel. Both run under one caller-supplied deadline.

use super::cache::{ImportCacheState, SessionKey};
use super::error::ImportError;
use super::{parse_timetable_with, MeridiemPolicy, RawSessionRecord};
use chrono::NaiveDate;
use rand::Rng;
use reqwest::header::{HeaderMap, COOKIE, REFERER, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

const LOGIN_PATH: &str = "twbkwbis.P_ValLogin";
const SCHEDULE_PATH: &str = "bwskfshd.p_proc_crse_schd";
const SCHEDULE_REFERER_PATH: &str = "bwskfshd.P_CrseSchd";
const SESSION_COOKIE: &str = "SESSID";

/// Portal connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Base URL all portal paths are joined onto; must end with `/`
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Deadline for a whole import when the caller does not give one
    pub import_deadline_secs: u64,
    pub meridiem: MeridiemPolicy,
    /// How long a fetched timetable is reused for the same token and week
    pub cache_ttl_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dalonline.dal.ca/PROD/".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 20,
            import_deadline_secs: 45,
            meridiem: MeridiemPolicy::Respect,
            cache_ttl_secs: 5 * 60,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub netid: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("netid", &self.netid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Portal session id returned by a successful login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

pub struct PortalClient {
    client: Client,
    base_url: Url,
    config: PortalConfig,
    cache_state: Arc<ImportCacheState>,
}

impl PortalClient {
    pub fn new(config: PortalConfig) -> Result<Self, ImportError> {
        let cache_state = Arc::new(ImportCacheState::new(Duration::from_secs(
            config.cache_ttl_secs,
        )));
        Self::with_cache(config, cache_state)
    }

    pub fn with_cache(
        config: PortalConfig,
        cache_state: Arc<ImportCacheState>,
    ) -> Result<Self, ImportError> {
        let base_url = Url::parse(&config.base_url)?;
        // the login cookie arrives on a redirect response, so redirects stay manual
        let client = Client::builder()
            .redirect(Policy::none())
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ImportError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            config,
            cache_state,
        })
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn cache_state(&self) -> &Arc<ImportCacheState> {
        &self.cache_state
    }

    /// Default deadline for a whole import.
    pub fn default_deadline(&self) -> Duration {
        Duration::from_secs(self.config.import_deadline_secs)
    }

    /// Logs in and fetches the timetable for the week containing `week_of`.
    pub async fn import_schedule(
        &self,
        credentials: &Credentials,
        week_of: Option<NaiveDate>,
        deadline: Duration,
    ) -> Result<Vec<RawSessionRecord>, ImportError> {
        let correlation_id = generate_correlation_id();
        info!(
            correlation_id = %correlation_id,
            netid = %credentials.netid,
            "Starting schedule import"
        );
        self.run_with_deadline(&correlation_id, deadline, async {
            let token = self.authenticate(credentials, &correlation_id).await?;
            self.fetch_records(&token, week_of, &correlation_id).await
        })
        .await
    }

    /// Fetches the timetable with a token from an earlier [`PortalClient::login`].
    pub async fn import_with_token(
        &self,
        token: &SessionToken,
        week_of: Option<NaiveDate>,
        deadline: Duration,
    ) -> Result<Vec<RawSessionRecord>, ImportError> {
        let correlation_id = generate_correlation_id();
        info!(correlation_id = %correlation_id, "Starting schedule import with existing token");
        self.run_with_deadline(
            &correlation_id,
            deadline,
            self.fetch_records(token, week_of, &correlation_id),
        )
        .await
    }

    async fn run_with_deadline<F>(
        &self,
        correlation_id: &str,
        deadline: Duration,
        flow: F,
    ) -> Result<Vec<RawSessionRecord>, ImportError>
    where
        F: Future<Output = Result<Vec<RawSessionRecord>, ImportError>>,
    {
        if self.cache_state.circuit_breaker.is_open() {
            warn!(correlation_id = %correlation_id, "Circuit breaker is open, rejecting import");
            return Err(ImportError::CircuitBreakerOpen);
        }

        let start = Instant::now();
        let result = match tokio::time::timeout(deadline, flow).await {
            Ok(result) => result,
            Err(_) => Err(ImportError::Timeout(deadline)),
        };

        match &result {
            Ok(records) => {
                self.cache_state.circuit_breaker.record_success();
                info!(
                    correlation_id = %correlation_id,
                    records = records.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Schedule import completed"
                );
            }
            Err(e) => {
                if e.counts_against_portal() {
                    self.cache_state.circuit_breaker.record_failure();
                }
                error!(
                    correlation_id = %correlation_id,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Schedule import failed"
                );
            }
        }
        result
    }

    /// Logs in to the portal and returns the session id for later imports.
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionToken, ImportError> {
        let correlation_id = generate_correlation_id();
        info!(correlation_id = %correlation_id, netid = %credentials.netid, "Portal login requested");
        self.authenticate(credentials, &correlation_id).await
    }

    /// Posts the login form and returns the portal session id.
    async fn authenticate(
        &self,
        credentials: &Credentials,
        correlation_id: &str,
    ) -> Result<SessionToken, ImportError> {
        let url = self.base_url.join(LOGIN_PATH)?;
        let referer = self.base_url.join(SCHEDULE_REFERER_PATH)?;
        debug!(correlation_id = %correlation_id, url = %url, "Logging in to portal");

        let response = self
            .client
            .post(url)
            .header(COOKIE, "TESTID=set")
            .header(REFERER, referer.as_str())
            .form(&[
                ("sid", credentials.netid.as_str()),
                ("PIN", credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ImportError::UnexpectedResponse {
                message: format!("Login returned status {}", status),
            });
        }

        match extract_session_id(response.headers()) {
            Some(token) => {
                info!(correlation_id = %correlation_id, "Portal login succeeded");
                Ok(SessionToken(token))
            }
            None => {
                warn!(correlation_id = %correlation_id, status = %status, "Portal login issued no session");
                Err(ImportError::Authentication {
                    message: "Invalid credentials".to_string(),
                })
            }
        }
    }

    /// Fetches and parses the timetable, reusing a recent result for the same token and week.
    async fn fetch_records(
        &self,
        token: &SessionToken,
        week_of: Option<NaiveDate>,
        correlation_id: &str,
    ) -> Result<Vec<RawSessionRecord>, ImportError> {
        let today = chrono::Local::now().date_naive();
        let week_of = portal_date(week_of.unwrap_or(today));
        let key = SessionKey::new(&token.0, &week_of);

        if let Some(records) = self.cache_state.cache.get(&key) {
            info!(correlation_id = %correlation_id, session = %key, "Returning cached timetable");
            return Ok(records);
        }

        let html = self
            .fetch_timetable(token, &week_of, &portal_date(today), correlation_id)
            .await?;
        let records = parse_timetable_with(&html, self.config.meridiem)?;
        self.cache_state.cache.insert(key, records.clone());
        Ok(records)
    }

    /// Posts the week-at-a-glance form and returns the raw HTML.
    pub async fn fetch_timetable(
        &self,
        token: &SessionToken,
        week_of: &str,
        start_date: &str,
        correlation_id: &str,
    ) -> Result<String, ImportError> {
        let url = self.base_url.join(SCHEDULE_PATH)?;
        let referer = self.base_url.join(SCHEDULE_REFERER_PATH)?;
        debug!(correlation_id = %correlation_id, url = %url, week_of = %week_of, "Fetching timetable");

        let response = self
            .client
            .post(url)
            .header(COOKIE, format!("TESTID=set; {}={};", SESSION_COOKIE, token.0))
            .header(REFERER, referer.as_str())
            .form(&[("goto_date_in", week_of), ("start_date_in", start_date)])
            .send()
            .await?;

        let status = response.status();
        if status.is_redirection() {
            // an expired session bounces back to the login page
            return Err(ImportError::Authentication {
                message: "Portal session expired".to_string(),
            });
        }
        if !status.is_success() {
            return Err(ImportError::UnexpectedResponse {
                message: format!("Timetable page returned status {}", status),
            });
        }

        Ok(response.text().await?)
    }
}

/// Finds a non-empty `SESSID` value among the `Set-Cookie` headers.
fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next()?.split_once('='))
        .find(|(name, _)| name.trim().contains(SESSION_COOKIE))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Dates in the portal's form fields are `MM/DD/YYYY`.
fn portal_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// Generates a short correlation id for tracing one import.
fn generate_correlation_id() -> String {
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", chrono::Utc::now().timestamp_micros() & 0xFFFF_FFFF, random)
}
