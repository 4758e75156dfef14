//! Remote API connector
//!
//! Pages through the athlete's activities, optionally fetches each
//! activity's streams, and emits one candidate per activity. The listing
//! always carries an `after` bound so the API returns it oldest first; each
//! page is one batch.
//!
//! | Status | Handling |
//! |--------|----------|
//! | 401 / 403 | fatal `AuthFailed` |
//! | 429 | `ItemError`, pause for `Retry-After` (capped), retry the same call |
//! | 5xx, timeouts | retried with exponential backoff |
//! | malformed item | `ItemError`, pass continues |

mod models;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use stride_protocol::{
    ActivityStreams, ConnectorType, ErrorCode, RemoteConnectorInfo, SyncErrorInfo,
};

use crate::error::{ConnectorError, Result};
use crate::resilience::{DEFAULT_RETRY_AFTER_SECS, ResilienceConfig, execute_with_retry};
use crate::traits::{Connector, ConnectorEvent, EventSink, StopSignal, SyncOutcome, SyncRequest};

use models::{ApiActivity, STREAM_KEYS, TokenResponse, parse_streams};

/// Connector for the remote fitness-tracking API
pub struct RemoteConnector {
    info: RwLock<RemoteConnectorInfo>,
    client: reqwest::Client,
    resilience: ResilienceConfig,
    stop: StopSignal,
}

impl RemoteConnector {
    /// Create a connector from connection parameters
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails (e.g., TLS misconfiguration)
    pub fn new(info: RemoteConnectorInfo, resilience: ResilienceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("stride/", env!("CARGO_PKG_VERSION")))
            .timeout(resilience.timeout())
            .build()
            .map_err(|e| ConnectorError::Init(format!("remote HTTP client: {}", e)))?;

        Ok(Self {
            info: RwLock::new(info),
            client,
            resilience,
            stop: StopSignal::new(),
        })
    }

    /// Current connection parameters (reflects token refreshes)
    pub fn info(&self) -> RemoteConnectorInfo {
        self.info.read().clone()
    }

    fn access_token(&self) -> Result<String> {
        self.info
            .read()
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConnectorError::AuthFailed("remote connector is not linked".into()))
    }

    /// Refresh the access token when it has expired
    async fn ensure_fresh_token(&self, events: &EventSink) -> Result<()> {
        let current = self.info();
        if !current.is_linked() {
            return Err(ConnectorError::AuthFailed(
                "remote connector is not linked".into(),
            ));
        }
        if !current.is_expired(Utc::now()) {
            return Ok(());
        }
        if !current.can_refresh() {
            return Err(ConnectorError::AuthFailed(
                "access token expired and no refresh credentials are configured".into(),
            ));
        }

        info!(connector = "remote", "access token expired, refreshing");
        let refreshed =
            execute_with_retry(&self.resilience, "token refresh", || self.refresh_once(&current))
                .await?;

        *self.info.write() = refreshed.clone();
        events
            .send(ConnectorEvent::CredentialsRefreshed(refreshed))
            .await
    }

    async fn refresh_once(&self, current: &RemoteConnectorInfo) -> Result<RemoteConnectorInfo> {
        let url = format!("{}/oauth/token", current.api_url);
        let params = [
            ("client_id", current.client_id.clone().unwrap_or_default()),
            ("client_secret", current.client_secret.clone().unwrap_or_default()),
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", current.refresh_token.clone().unwrap_or_default()),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();

        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(ConnectorError::AuthFailed(format!(
                "token refresh rejected ({})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(status_error(&response, &url));
        }

        let token: TokenResponse = response.json().await?;
        Ok(RemoteConnectorInfo {
            access_token: Some(token.access_token),
            refresh_token: token.refresh_token.or_else(|| current.refresh_token.clone()),
            expires_at: Some(token.expires_at),
            ..current.clone()
        })
    }

    /// Single GET attempt
    async fn get_once(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let token = self.access_token()?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(status_error(&response, url))
        }
    }

    /// GET with retries and rate-limit pauses
    ///
    /// A rate limit never fails the call: each pause is reported as a
    /// non-fatal `rate_limited` error (tied to `item` when given) and the
    /// request is repeated until it gets through. Returns `None` when a stop
    /// request interrupted a pause.
    async fn get_json(
        &self,
        events: &EventSink,
        operation: &str,
        item: Option<&str>,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Value>> {
        loop {
            let result =
                execute_with_retry(&self.resilience, operation, || self.get_once(url, query))
                    .await;

            match result {
                Err(e @ ConnectorError::RateLimited { retry_after_secs }) => {
                    let wait = self.resilience.rate_limit_wait(retry_after_secs);
                    warn!(
                        connector = "remote",
                        operation,
                        retry_after_secs,
                        wait_secs = wait.as_secs(),
                        "rate limited, pausing"
                    );

                    let description = format!("{}: {}", operation, e);
                    let error = match item {
                        Some(id) => SyncErrorInfo::for_item(e.code(), id, description),
                        None => SyncErrorInfo::new(e.code(), description),
                    };
                    events.item_error(error).await?;
                    events
                        .progress(format!("Rate limited, resuming in {}s", wait.as_secs()))
                        .await?;

                    if self.stop.sleep(wait).await {
                        return Ok(None);
                    }
                }
                other => return other.map(Some),
            }
        }
    }

    /// Fetch the streams of one activity
    ///
    /// Failures other than authentication are reported as item errors and
    /// yield no streams; the activity itself is still emitted.
    async fn fetch_streams(
        &self,
        events: &EventSink,
        api_url: &str,
        activity_id: &str,
    ) -> Result<Option<ActivityStreams>> {
        let url = format!("{}/activities/{}/streams", api_url, activity_id);
        let query = [
            ("keys", STREAM_KEYS.to_string()),
            ("key_by_type", "true".to_string()),
        ];

        match self
            .get_json(events, "fetch streams", Some(activity_id), &url, &query)
            .await
        {
            Ok(Some(body)) => match parse_streams(&body) {
                Ok(streams) => Ok(Some(streams)),
                Err(reason) => {
                    warn!(connector = "remote", activity_id, %reason, "discarding invalid streams");
                    Ok(None)
                }
            },
            Ok(None) => Ok(None),
            Err(e @ ConnectorError::AuthFailed(_)) | Err(e @ ConnectorError::SinkClosed) => Err(e),
            Err(e) => {
                warn!(connector = "remote", activity_id, error = %e, "streams unavailable");
                events
                    .item_error(SyncErrorInfo::for_item(
                        e.code(),
                        activity_id,
                        format!("streams unavailable: {}", e),
                    ))
                    .await?;
                Ok(None)
            }
        }
    }
}

/// Map a non-success response to an error
fn status_error(response: &reqwest::Response, url: &str) -> ConnectorError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ConnectorError::AuthFailed(format!(
            "access token rejected ({})",
            status.as_u16()
        )),
        StatusCode::NOT_FOUND => ConnectorError::NotFound(url.to_string()),
        StatusCode::TOO_MANY_REQUESTS => ConnectorError::RateLimited {
            retry_after_secs: response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        _ => ConnectorError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        },
    }
}

#[async_trait]
impl Connector for RemoteConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Remote
    }

    async fn sync(&self, request: SyncRequest, events: EventSink) -> Result<SyncOutcome> {
        self.ensure_fresh_token(&events).await?;

        let (api_url, per_page, fetch_streams) = {
            let info = self.info.read();
            (info.api_url.clone(), info.per_page, info.fetch_streams)
        };
        let list_url = format!("{}/athlete/activities", api_url);
        let since = request.since();
        // without `after` the API lists newest first
        let after = since.unwrap_or(DateTime::<Utc>::UNIX_EPOCH).timestamp();

        info!(
            connector = "remote",
            fast_sync = request.fast_sync,
            force_sync = request.force_sync,
            since = ?since,
            "starting remote sync"
        );

        let mut page: u32 = 1;
        let mut fetched: usize = 0;
        let mut newest: Option<DateTime<Utc>> = None;
        let mut ascending = true;

        loop {
            if self.stop.is_stopped() {
                info!(connector = "remote", page, "stop requested");
                return Ok(SyncOutcome::Stopped);
            }

            events
                .progress(format!("Fetching activities page {}", page))
                .await?;

            let query = [
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
                ("after", after.to_string()),
            ];

            let Some(body) = self
                .get_json(&events, "list activities", None, &list_url, &query)
                .await?
            else {
                return Ok(SyncOutcome::Stopped);
            };

            let items = match body {
                Value::Array(items) => items,
                _ => {
                    return Err(ConnectorError::InvalidResponse(
                        "activity listing is not an array".to_string(),
                    ));
                }
            };

            if items.is_empty() {
                debug!(connector = "remote", page, "empty page, listing complete");
                break;
            }

            for item in items {
                if self.stop.is_stopped() {
                    info!(connector = "remote", page, "stop requested");
                    return Ok(SyncOutcome::Stopped);
                }

                let item_id = item
                    .get("id")
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "unknown".to_string());

                let api_activity = match serde_json::from_value::<ApiActivity>(item) {
                    Ok(a) => a,
                    Err(e) => {
                        warn!(connector = "remote", id = %item_id, error = %e, "skipping malformed activity");
                        events
                            .item_error(SyncErrorInfo::for_item(
                                ErrorCode::ParseFailed,
                                item_id,
                                e.to_string(),
                            ))
                            .await?;
                        continue;
                    }
                };

                let activity = api_activity.into_activity(Utc::now());
                let streams = if fetch_streams {
                    let streams = self
                        .fetch_streams(&events, &api_url, &activity.key.source_id)
                        .await?;
                    if self.stop.is_stopped() {
                        return Ok(SyncOutcome::Stopped);
                    }
                    streams
                } else {
                    None
                };

                if ascending && newest.is_some_and(|n| activity.start_time < n) {
                    warn!(
                        connector = "remote",
                        page,
                        "listing is not ordered by start time, no batch watermarks for this pass"
                    );
                    ascending = false;
                }
                newest = Some(newest.map_or(activity.start_time, |n| n.max(activity.start_time)));
                fetched += 1;
                events.candidate(activity, streams).await?;
            }

            // `after` is exclusive and the next page may share this start time
            if ascending && let Some(newest) = newest {
                events
                    .batch_completed(newest - chrono::Duration::seconds(1))
                    .await?;
            }
            page += 1;
        }

        info!(connector = "remote", fetched, pages = page - 1, "remote sync complete");
        events
            .info(format!("{} activities fetched from remote API", fetched))
            .await?;

        Ok(SyncOutcome::Completed)
    }

    fn stop(&self) {
        self.stop.stop();
    }
}
