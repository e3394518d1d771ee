//! Audit logging for probe attempts
//!
//! Every health-check invocation appends one structured outcome record to
//! sync_logs. Audit is best-effort observability: a failed write is logged
//! and swallowed, never altering or rolling back the probe result.

use uuid::Uuid;

use crate::repositories::SyncLogRepository;

/// Operation name recorded for health-check invocations
pub const OP_HEALTH_CHECK: &str = "health_check";

/// Outcome classification recorded with each audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Ok,
    SoftFail,
    Fail,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::SoftFail => "soft_fail",
            Self::Fail => "fail",
        }
    }
}

/// Fire-and-forget writer of audit records.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    repo: SyncLogRepository,
}

impl AuditLogger {
    pub fn new(repo: SyncLogRepository) -> Self {
        Self { repo }
    }

    /// Append one outcome record; failures never propagate
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        account_id: Uuid,
        operation: &str,
        outcome: AuditOutcome,
        http_status: Option<i32>,
        message: Option<String>,
        retry_count: i32,
        provider: &str,
    ) {
        if let Err(err) = self
            .repo
            .append(
                account_id,
                operation,
                outcome.as_str(),
                http_status,
                message,
                retry_count,
                provider,
            )
            .await
        {
            tracing::warn!(
                account_id = %account_id,
                operation = operation,
                error = ?err,
                "Failed to append audit record"
            );
        }
    }
}
