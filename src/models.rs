//! Domain models shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, ValidationError};

/// One probeable venue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub name: String,
    /// Booking platform hosting this venue's widget ("sevenrooms", "chope", ...).
    /// Used to look up the matching checker in the registry.
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// Raw query parameters as they arrive from the outer boundary (HTTP/CLI).
///
/// All three fields are required; [`RawQuery::validate`] rejects the request
/// before any probing begins.
#[derive(Clone, Debug, Default)]
pub struct RawQuery {
    pub date: Option<String>,
    pub party_size: Option<String>,
    pub time: Option<String>,
}

impl RawQuery {
    /// Validates the raw parameters into a [`Query`].
    ///
    /// Missing or empty parameters yield a [`ValidationError`] naming every
    /// absent field at once.
    pub fn validate(&self) -> AppResult<Query> {
        let date = non_empty(&self.date);
        let party_size = non_empty(&self.party_size);
        let time = non_empty(&self.time);

        let mut missing = Vec::new();
        if date.is_none() {
            missing.push("date");
        }
        if party_size.is_none() {
            missing.push("partySize");
        }
        if time.is_none() {
            missing.push("time");
        }

        match (date, party_size, time) {
            (Some(date), Some(party_size), Some(time)) => Ok(Query {
                date,
                party_size,
                time,
            }),
            _ => Err(AppError::Validation(ValidationError::MissingParameters {
                missing,
            })),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Validated search criteria, passed by value to every probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub date: String,
    pub party_size: String,
    pub time: String,
}

/// Terminal status of one probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Available,
    Unavailable,
    /// No checker registered for the target's platform; no resource acquired.
    Skipped,
    /// Timeout, checker failure, or a pool-level crash.
    Error,
}

impl ProbeStatus {
    pub fn is_available(self) -> bool {
        matches!(self, ProbeStatus::Available)
    }
}

/// Terminal outcome of one target for one run.
///
/// Created exactly once per target by a worker and consumed once by the
/// aggregator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub target_id: String,
    pub name: String,
    pub status: ProbeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProbeResult {
    pub fn available(target: &Target, url: impl Into<String>) -> Self {
        Self::with_status(target, ProbeStatus::Available, Some(url.into()), None)
    }

    pub fn unavailable(target: &Target, url: Option<String>) -> Self {
        Self::with_status(target, ProbeStatus::Unavailable, url, None)
    }

    pub fn skipped(target: &Target) -> Self {
        Self::with_status(
            target,
            ProbeStatus::Skipped,
            target.url.clone(),
            Some("no checker found for this platform".to_owned()),
        )
    }

    pub fn error(target: &Target, reason: impl Into<String>) -> Self {
        Self::with_status(
            target,
            ProbeStatus::Error,
            target.url.clone(),
            Some(reason.into()),
        )
    }

    pub fn timeout(target: &Target) -> Self {
        Self::error(target, "timeout")
    }

    fn with_status(
        target: &Target,
        status: ProbeStatus,
        url: Option<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            target_id: target.id.clone(),
            name: target.name.clone(),
            status,
            url,
            reason,
        }
    }
}

/// Mutable aggregate of one run.
///
/// Mutated only inside the aggregator's serialization boundary, then frozen
/// (timestamped) at completion. The serialized shape is the buffered JSON
/// aggregate `{available, unavailable, generatedAt, totalRestaurants}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub total_restaurants: usize,
    pub available: Vec<ProbeResult>,
    /// Unavailable bucket; skipped and error outcomes land here too but keep
    /// their original status for reporting.
    pub unavailable: Vec<ProbeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(total_restaurants: usize) -> Self {
        Self {
            total_restaurants,
            available: Vec::new(),
            unavailable: Vec::new(),
            generated_at: None,
        }
    }

    /// Number of targets that have resolved so far. Monotonically
    /// non-decreasing; equals `total_restaurants` exactly once, at completion.
    pub fn completed_count(&self) -> usize {
        self.available.len() + self.unavailable.len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_count() == self.total_restaurants
    }

    /// Whether the run finished and was stamped with a generation timestamp.
    pub fn is_frozen(&self) -> bool {
        self.generated_at.is_some()
    }

    pub(crate) fn record(&mut self, result: ProbeResult) {
        if result.status.is_available() {
            self.available.push(result);
        } else {
            self.unavailable.push(result);
        }
    }

    pub(crate) fn freeze(&mut self) {
        self.generated_at = Some(Utc::now());
    }
}
