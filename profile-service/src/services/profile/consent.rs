use chrono::{DateTime, Utc};

use crate::dtos::ConsentState;
use crate::models::{ConfigSnapshot, TncConfig};
use crate::services::metrics;

/// Terms-of-service state of a user against the current snapshot.
pub struct ConsentTracker;

impl ConsentTracker {
    /// `None` when the snapshot has no usable terms configuration.
    pub fn compute(
        snapshot: &ConfigSnapshot,
        accepted_version: Option<&str>,
        accepted_on: Option<DateTime<Utc>>,
    ) -> Option<ConsentState> {
        let Some(raw) = snapshot.tnc_config.as_deref() else {
            return Self::left_out(snapshot, "No terms configuration in snapshot");
        };
        let config = match TncConfig::parse(raw) {
            Ok(Some(config)) => config,
            Ok(None) => return Self::left_out(snapshot, "Empty terms configuration"),
            Err(e) => {
                tracing::warn!(
                    snapshot_version = snapshot.version,
                    error = %e,
                    "Unreadable terms configuration, consent left out"
                );
                metrics::record_degraded("consent");
                return None;
            }
        };

        let Some(latest) = config.latest_version() else {
            return Some(ConsentState::default());
        };
        let known = config.is_known_version(latest);
        let outdated = match accepted_version.filter(|v| !v.trim().is_empty()) {
            Some(accepted) => !accepted.eq_ignore_ascii_case(latest) || accepted_on.is_none(),
            None => true,
        };

        Some(ConsentState {
            latest_version: Some(latest.to_string()),
            latest_version_url: config.url_for(latest).map(str::to_string),
            prompt: known && outdated,
        })
    }

    fn left_out(snapshot: &ConfigSnapshot, reason: &'static str) -> Option<ConsentState> {
        tracing::warn!(
            snapshot_version = snapshot.version,
            reason,
            "Terms configuration unavailable, consent left out"
        );
        metrics::record_degraded("consent");
        None
    }
}
