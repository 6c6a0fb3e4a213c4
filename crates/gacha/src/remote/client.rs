//! Gacha record HTTP client
//!
//! Uses synchronous HTTP (ureq). Requests are strictly sequential, the
//! service hands out the next cursor only with the previous page.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use url::Url;

use super::api::{AccountInfo, Envelope, RecordList};
use super::{FetchError, RecordPage, RemoteApi};
use crate::models::PoolCategory;

/// Client for one account's gacha record endpoint
pub struct GachaClient {
    agent: ureq::Agent,
    gacha_url: Url,
    account_url: Url,
    access_token: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl GachaClient {
    /// Account info endpoint, shared by every server region
    const ACCOUNT_INFO_URL: &'static str = "https://gf2-zoneinfo.sunborngame.com/account/info";

    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a client for the given record endpoint and access token
    pub fn new(gacha_url: &str, access_token: impl Into<String>) -> Result<Self> {
        let gacha_url = Url::parse(gacha_url.trim())
            .with_context(|| format!("Invalid gacha record url: {:?}", gacha_url))?;
        let account_url = Url::parse(Self::ACCOUNT_INFO_URL)?;

        Ok(Self {
            agent: Self::build_agent(Self::DEFAULT_TIMEOUT),
            gacha_url,
            account_url,
            access_token: access_token.into(),
            max_attempts: 3,
            retry_delay: Duration::from_millis(200),
        })
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = Self::build_agent(timeout);
        self
    }

    /// Set how many times a transient failure is attempted (minimum 1)
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Override the account info endpoint
    pub fn with_account_url(mut self, account_url: &str) -> Result<Self> {
        self.account_url = Url::parse(account_url)
            .with_context(|| format!("Invalid account info url: {:?}", account_url))?;
        Ok(self)
    }

    fn build_agent(timeout: Duration) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into()
    }

    /// POST a form and unwrap the response envelope
    fn post_form<T: DeserializeOwned>(
        &self,
        url: &Url,
        form: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let mut response = self
            .agent
            .post(url.as_str())
            .header("Authorization", self.access_token.as_str())
            .send_form(form.iter().copied())?;

        let envelope: Envelope<T> = response.body_mut().read_json()?;

        if envelope.code != 0 {
            return Err(FetchError::api(envelope.code, envelope.message));
        }

        envelope
            .data
            .ok_or_else(|| FetchError::decode("response has no data field"))
    }
}

impl RemoteApi for GachaClient {
    fn fetch_page(
        &self,
        category: PoolCategory,
        cursor: Option<&str>,
    ) -> Result<RecordPage, FetchError> {
        let type_id = category.id().to_string();
        let next = cursor.unwrap_or("");
        debug!("Fetching {} page (cursor {:?})", category, next);

        let list: RecordList = retry_transient(self.max_attempts, self.retry_delay, || {
            self.post_form(&self.gacha_url, &[("type_id", type_id.as_str()), ("next", next)])
        })?;

        Ok(RecordPage {
            records: list
                .list
                .into_iter()
                .map(|record| record.into_pull(category))
                .collect(),
            next: list.next,
        })
    }

    fn fetch_uid(&self) -> Result<String, FetchError> {
        let info: AccountInfo = retry_transient(self.max_attempts, self.retry_delay, || {
            self.post_form(&self.account_url, &[])
        })?;

        info.uid()
            .ok_or_else(|| FetchError::decode("account info has no usable uid"))
    }
}

/// Run `op`, repeating it with exponential backoff while it fails transiently
///
/// Non-transient errors (API codes, rejected credentials, bad bodies) are
/// returned immediately.
pub fn retry_transient<T, F>(max_attempts: u32, initial_delay: Duration, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Result<T, FetchError>,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = initial_delay;
    let mut attempt = 1;

    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    "Request failed ({}), retrying in {:?} (attempt {}/{})",
                    e, delay, attempt, max_attempts
                );
                std::thread::sleep(delay);
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
