//! Security side-channel for refresh-token reuse.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::claims::PrincipalType;

/// A compromised family, as reported to the alert hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReuseIncident {
    pub family_id: String,
    pub user_id: Uuid,
    /// The record that was presented again
    pub record_id: Uuid,
    pub principal: PrincipalType,
    /// How many still-live records the family-wide revoke caught
    pub revoked_records: u64,
    pub detected_at: DateTime<Utc>,
}

/// Receives reuse incidents; the client response is unaffected
pub trait ReuseAlert: Send + Sync {
    fn token_reuse_detected(&self, incident: &ReuseIncident);
}

/// Default hook: a structured error on the `security` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReuseAlert;

impl ReuseAlert for TracingReuseAlert {
    fn token_reuse_detected(&self, incident: &ReuseIncident) {
        tracing::error!(
            target: "security",
            family_id = %incident.family_id,
            user_id = %incident.user_id,
            record_id = %incident.record_id,
            principal = %incident.principal,
            revoked_records = incident.revoked_records,
            detected_at = %incident.detected_at.to_rfc3339(),
            "Refresh token reuse detected; family revoked"
        );
    }
}
