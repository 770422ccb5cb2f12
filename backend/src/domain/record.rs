//! Walk-in visit records and their embedded documents.
//!
//! Records are persisted as loosely structured JSON documents but every
//! field access in the service goes through the strong types below. Input
//! arrives as [`StudentPayload`], a permissive shape that is validated into
//! [`Student`] before anything else happens.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::identity::Claims;

/// Fixed `type` value written into record details.
pub const WALKIN_DETAILS_TYPE: &str = "walkin";

/// Store-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validation failures for record documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordValidationError {
    /// The student name was missing or blank.
    #[error("student.name must not be empty")]
    EmptyName,
    /// An email entry was missing or blank.
    #[error("student.emails[{index}].email must not be empty")]
    EmptyEmail {
        /// Position of the offending entry.
        index: usize,
    },
    /// A number entry was missing or blank.
    #[error("student.numbers[{index}].number must not be empty")]
    EmptyNumber {
        /// Position of the offending entry.
        index: usize,
    },
    /// A number entry had no country code.
    #[error("student.numbers[{index}].country_code is required")]
    MissingCountryCode {
        /// Position of the offending entry.
        index: usize,
    },
    /// A verification entry named no number.
    #[error("verified[{index}].number must not be empty")]
    EmptyVerificationNumber {
        /// Position of the offending entry.
        index: usize,
    },
}

impl RecordValidationError {
    /// Dotted path of the field that failed validation.
    #[must_use]
    pub fn field(&self) -> String {
        match self {
            Self::EmptyName => "student.name".to_owned(),
            Self::EmptyEmail { index } => format!("student.emails[{index}].email"),
            Self::EmptyNumber { index } => format!("student.numbers[{index}].number"),
            Self::MissingCountryCode { index } => format!("student.numbers[{index}].country_code"),
            Self::EmptyVerificationNumber { index } => format!("verified[{index}].number"),
        }
    }
}

/// Incoming student document before validation.
///
/// Accepts the legacy singular keys `email` and `number` as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentPayload {
    /// Visitor name.
    #[serde(default)]
    pub name: Option<String>,
    /// Contact email entries.
    #[serde(default, alias = "email")]
    pub emails: Vec<EmailPayload>,
    /// Contact number entries.
    #[serde(default, alias = "number")]
    pub numbers: Vec<PhoneNumberPayload>,
}

/// Incoming email entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPayload {
    /// Email address text.
    #[serde(default)]
    pub email: Option<String>,
}

/// Incoming phone number entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumberPayload {
    /// Number text used as the lookup key.
    #[serde(default)]
    pub number: Option<String>,
    /// Dialling prefix.
    #[serde(default)]
    pub country_code: Option<String>,
    /// Verification state; omitted means unset.
    #[serde(default)]
    pub verified: Option<bool>,
}

/// Email contact entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEntry {
    /// Email address text.
    pub email: String,
}

/// Phone contact entry.
///
/// `verified` is tri-state: `None` until someone explicitly verifies or
/// rejects the number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Number text used as the lookup key.
    pub number: String,
    /// Dialling prefix.
    pub country_code: String,
    /// Verification state.
    pub verified: Option<bool>,
}

/// Validated student document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Visitor name.
    pub name: String,
    /// Contact emails in the order supplied.
    #[serde(default, alias = "email")]
    pub emails: Vec<EmailEntry>,
    /// Contact numbers in the order supplied.
    #[serde(default, alias = "number")]
    pub numbers: Vec<PhoneNumber>,
}

impl TryFrom<StudentPayload> for Student {
    type Error = RecordValidationError;

    fn try_from(value: StudentPayload) -> Result<Self, Self::Error> {
        let name = non_blank(value.name).ok_or(RecordValidationError::EmptyName)?;
        let emails = value
            .emails
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                non_blank(entry.email)
                    .map(|email| EmailEntry { email })
                    .ok_or(RecordValidationError::EmptyEmail { index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let numbers = value
            .numbers
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let number =
                    non_blank(entry.number).ok_or(RecordValidationError::EmptyNumber { index })?;
                let country_code = entry
                    .country_code
                    .ok_or(RecordValidationError::MissingCountryCode { index })?;
                Ok(PhoneNumber {
                    number,
                    country_code,
                    verified: entry.verified,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            emails,
            numbers,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

impl Student {
    /// Whether any number entry matches `number` exactly.
    #[must_use]
    pub fn has_number(&self, number: &str) -> bool {
        self.numbers.iter().any(|entry| entry.number == number)
    }

    /// Merge verification states into matching number entries.
    ///
    /// Only the `verified` field of entries whose `number` matches is
    /// touched. Unknown numbers are ignored. Returns how many entries were
    /// written.
    pub fn apply_verifications(&mut self, updates: &[NumberVerification]) -> usize {
        let mut applied = 0;
        for update in updates {
            for entry in self
                .numbers
                .iter_mut()
                .filter(|entry| entry.number == update.number)
            {
                entry.verified = update.verified;
                applied += 1;
            }
        }
        applied
    }
}

/// Requested verification state for one number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberVerification {
    /// Number to match.
    pub number: String,
    /// New verification state; `None` resets it.
    #[serde(default)]
    pub verified: Option<bool>,
}

impl NumberVerification {
    /// Validate a batch of entries, rejecting blank numbers.
    pub fn validate_all(entries: Vec<Self>) -> Result<Vec<Self>, RecordValidationError> {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                if entry.number.trim().is_empty() {
                    Err(RecordValidationError::EmptyVerificationNumber { index })
                } else {
                    Ok(entry)
                }
            })
            .collect()
    }
}

/// Stable author identifier used for ownership checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorUid(String);

impl AuthorUid {
    /// Author uid text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AuthorUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error raised when claims cannot identify an author.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token claims carry no usable uid")]
pub struct MissingUid;

/// Author of a record: the full claim set plus the uid read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    uid: AuthorUid,
    claims: Claims,
}

impl Author {
    /// Build an author from verified claims.
    pub fn from_claims(claims: Claims) -> Result<Self, MissingUid> {
        let uid = claims
            .uid()
            .filter(|uid| !uid.trim().is_empty())
            .map(|uid| AuthorUid(uid.to_owned()))
            .ok_or(MissingUid)?;
        Ok(Self { uid, claims })
    }

    /// Ownership key.
    #[must_use]
    pub fn uid(&self) -> &AuthorUid {
        &self.uid
    }

    /// Claims as issued.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

impl Serialize for Author {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.claims.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Author {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let claims = Claims::deserialize(deserializer)?;
        Self::from_claims(claims).map_err(serde::de::Error::custom)
    }
}

/// Free-text metadata overwritten by each update that supplies a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDetails {
    /// Staff comment.
    pub comment: String,
    /// Record kind; always [`WALKIN_DETAILS_TYPE`].
    #[serde(rename = "type")]
    pub kind: String,
}

impl RecordDetails {
    /// Details for a walk-in update.
    pub fn walkin(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            kind: WALKIN_DETAILS_TYPE.to_owned(),
        }
    }
}

/// Reference to a stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentRef(String);

impl AttachmentRef {
    /// Wrap a storage path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Storage path text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// One append-only audit log entry, written per update call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Verification entries supplied with the update.
    pub verified: Vec<NumberVerification>,
    /// Comment supplied with the update, if any.
    pub comment: Option<String>,
    /// Attachment stored by the update, if any.
    pub attachment_ref: Option<AttachmentRef>,
    /// When the update was applied.
    pub created_at: DateTime<Utc>,
    /// Who applied the update.
    pub author: AuthorUid,
}

/// Values needed to create a record; the store assigns the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    /// Validated student document.
    pub student: Student,
    /// Creator identity.
    pub author: Author,
    /// Creation time, also used as the initial `updated_at`.
    pub created_at: DateTime<Utc>,
}

/// Persisted walk-in record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// Visitor document.
    pub student: Student,
    /// Creator identity; fixed for the record's lifetime.
    pub author: Author,
    /// Latest stored attachment.
    pub attachment: Option<AttachmentRef>,
    /// Latest details written by an update.
    pub details: Option<RecordDetails>,
    /// Update history, oldest first.
    pub audit_log: Vec<AuditEntry>,
    /// Optimistic concurrency token; starts at 1.
    pub revision: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Whether `uid` owns this record.
    #[must_use]
    pub fn is_owned_by(&self, uid: &AuthorUid) -> bool {
        self.author.uid() == uid
    }
}

/// How an update identifies its target record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLocator {
    /// Explicit identifier.
    Id(RecordId),
    /// Latest record containing this number.
    Number(String),
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
