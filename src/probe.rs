//! # Connection Probe
//!
//! Verifies a marketplace connection by calling the identity endpoint and
//! then the privileges endpoint with the account's bearer token. A 401 from
//! either endpoint may trigger a refresh-and-retry, but at most one refresh
//! happens per health-check invocation: the budget is a value threaded
//! through every call site, shared with the orchestrator's pre-emptive
//! refresh, so the invariant is visible wherever a refresh can occur.

use metrics::{counter, histogram};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info, instrument};

use crate::credentials::ClientCredentials;
use crate::marketplace::{Environment, MarketplaceClient, MarketplaceError};
use crate::models::{marketplace_account, oauth_token};
use crate::refresh::{RefreshError, TokenRefresher};

/// The single refresh allowed within one health-check invocation.
#[derive(Debug, Default)]
pub struct RefreshBudget {
    used: bool,
}

impl RefreshBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the budget; returns false when a refresh already happened
    pub fn try_consume(&mut self) -> bool {
        if self.used {
            false
        } else {
            self.used = true;
            true
        }
    }

    /// Refreshes consumed so far (0 or 1), reported as the audit retry count
    pub fn consumed(&self) -> i32 {
        i32::from(self.used)
    }
}

/// Classification of one finished probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Both endpoints answered successfully
    Ok,
    /// The grant is valid but lacks the required authorization scope
    SoftFail,
    /// A transport-level failure; the caller may retry the whole check later
    HardFail,
}

/// Ephemeral result of one probe invocation.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub http_status: Option<u16>,
    pub message: Option<String>,
    pub identity: Option<serde_json::Value>,
    pub privileges: Option<serde_json::Value>,
}

/// Failures that abort a probe before it can produce an outcome.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("provider unreachable: {0}")]
    Upstream(#[from] MarketplaceError),
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

/// Probes the two provider endpoints with at-most-one refresh per invocation.
#[derive(Debug, Clone)]
pub struct ConnectionProbe {
    client: MarketplaceClient,
    refresher: TokenRefresher,
}

impl ConnectionProbe {
    pub fn new(client: MarketplaceClient, refresher: TokenRefresher) -> Self {
        Self { client, refresher }
    }

    /// Run the identity and privileges checks sequentially.
    ///
    /// `record` must carry a usable access token; `budget` limits refreshes
    /// across both phases and any pre-emptive refresh already performed.
    #[instrument(skip_all, fields(account_id = %account.id))]
    #[allow(clippy::too_many_arguments)]
    pub async fn probe(
        &self,
        account: &marketplace_account::Model,
        environment: Environment,
        mut record: oauth_token::Model,
        credentials: &ClientCredentials,
        ru_name: &str,
        budget: &mut RefreshBudget,
    ) -> Result<ProbeOutcome, ProbeError> {
        let probe_start = std::time::Instant::now();

        // Identity phase: one refresh-and-retry on 401, then hard failure.
        let mut response = self
            .client
            .get_identity(environment, access_token(&record))
            .await?;

        if response.status == StatusCode::UNAUTHORIZED && budget.try_consume() {
            info!(account_id = %account.id, "Identity call unauthorized, refreshing once");
            record = self
                .refresher
                .refresh(account, environment, &record, credentials, ru_name)
                .await?;
            response = self
                .client
                .get_identity(environment, access_token(&record))
                .await?;
        }

        if !response.status.is_success() {
            counter!("marketplace_probe_hard_failure_total").increment(1);
            return Ok(ProbeOutcome {
                status: ProbeStatus::HardFail,
                http_status: Some(response.status.as_u16()),
                message: Some(format!(
                    "identity endpoint returned {}",
                    response.status.as_u16()
                )),
                identity: None,
                privileges: None,
            });
        }

        let identity = response.body;

        // Privileges phase: identical 401 pattern against the same budget,
        // so a refresh consumed by the identity phase is not repeated here.
        let mut response = self
            .client
            .get_privileges(environment, access_token(&record))
            .await?;

        if response.status == StatusCode::UNAUTHORIZED && budget.try_consume() {
            info!(account_id = %account.id, "Privileges call unauthorized, refreshing once");
            record = self
                .refresher
                .refresh(account, environment, &record, credentials, ru_name)
                .await?;
            response = self
                .client
                .get_privileges(environment, access_token(&record))
                .await?;
        }

        if response.status == StatusCode::UNAUTHORIZED || response.status == StatusCode::FORBIDDEN {
            // The grant works but lacks the privilege scope. Reported as a
            // successful check with a negative business outcome so an
            // administrator can tell "re-consent with broader scope" apart
            // from "reconnect required".
            counter!("marketplace_probe_soft_failure_total").increment(1);
            return Ok(ProbeOutcome {
                status: ProbeStatus::SoftFail,
                http_status: Some(response.status.as_u16()),
                message: Some("insufficient_permissions".to_string()),
                identity: Some(identity),
                privileges: None,
            });
        }

        if !response.status.is_success() {
            counter!("marketplace_probe_hard_failure_total").increment(1);
            return Ok(ProbeOutcome {
                status: ProbeStatus::HardFail,
                http_status: Some(response.status.as_u16()),
                message: Some(format!(
                    "privileges endpoint returned {}",
                    response.status.as_u16()
                )),
                identity: Some(identity),
                privileges: None,
            });
        }

        histogram!("marketplace_probe_latency_ms")
            .record(probe_start.elapsed().as_secs_f64() * 1_000.0);
        counter!("marketplace_probe_success_total").increment(1);

        Ok(ProbeOutcome {
            status: ProbeStatus::Ok,
            http_status: Some(response.status.as_u16()),
            message: None,
            identity: Some(identity),
            privileges: Some(response.body),
        })
    }
}

fn access_token(record: &oauth_token::Model) -> &str {
    record.access_token.as_deref().unwrap_or_default()
}
