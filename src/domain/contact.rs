//! Contact domain model.
//!
//! This module contains the only entity of the service, `Contact`, together
//! with its value objects and the validated `ContactCandidate` that create
//! and update operations consume.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Unique identifier for a contact.
///
/// Identifiers are opaque strings. New contacts receive a hyphenated UUID v4,
/// but records already present in the document store may carry any id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    /// Generates a new random identifier (UUID v4).
    ///
    /// **Note**: This is an impure function (side effect: random number generation).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for ids reserved by the document store (`_design/...`, `_local/...`).
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.0.starts_with('_')
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<String> for ContactId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ContactId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A UTC timestamp with microsecond precision.
///
/// Serialized as RFC 3339 with a `Z` suffix, e.g. `2024-05-01T12:30:00.123456Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` from a `DateTime<Utc>`, truncated to microseconds.
    #[must_use]
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.trunc_subsecs(6))
    }

    /// Returns the inner `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the current time as a `Timestamp`.
    ///
    /// **Note**: This is an impure function (side effect: system clock).
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Parses an ISO-8601 timestamp.
    ///
    /// Accepts RFC 3339 values with an offset as well as offset-less values
    /// (`2024-05-01T12:30:00.123456`), which are read as UTC.
    ///
    /// # Errors
    ///
    /// Returns `chrono::ParseError` when neither form matches.
    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(value)
            .map(|datetime| Self::from_datetime(datetime.with_timezone(&Utc)))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| Self::from_datetime(naive.and_utc()))
            })
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Contact Candidate
// =============================================================================

/// Validated contact data submitted for create or update.
///
/// All fields are already trimmed; `name` and `email` are non-empty and the
/// email contains an `@`. Construction is the request layer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactCandidate {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
}

// =============================================================================
// Contact Entity
// =============================================================================

/// A persisted contact record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub contact_id: ContactId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Contact {
    /// Creates a new contact from a candidate.
    ///
    /// Both timestamps are set to `now`. This is a pure function; the caller
    /// supplies the generated id and the clock reading.
    #[must_use]
    pub fn create(contact_id: ContactId, candidate: ContactCandidate, now: Timestamp) -> Self {
        Self {
            contact_id,
            name: candidate.name,
            email: candidate.email,
            phone: candidate.phone,
            company: candidate.company,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a copy with every mutable field replaced by the candidate's.
    ///
    /// `contact_id` and `created_at` are preserved. `updated_at` never moves
    /// backwards, even if the clock does.
    #[must_use]
    pub fn apply_update(self, candidate: ContactCandidate, now: Timestamp) -> Self {
        Self {
            name: candidate.name,
            email: candidate.email,
            phone: candidate.phone,
            company: candidate.company,
            updated_at: now.max(self.updated_at),
            ..self
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
