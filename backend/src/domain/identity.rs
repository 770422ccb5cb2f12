//! Bearer token identity extraction.
//!
//! [`TokenVerifier`] is the only way to turn a bearer token into trusted
//! [`Claims`]. It always checks the HS256 signature against the configured
//! secret before any claim is read, and reports the outcome as an
//! [`Authentication`] value rather than a bare decode.

use std::fmt;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// URL-safe alphabet that tolerates padded and unpadded input.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const SUPPORTED_ALGORITHM: &str = "HS256";
const FINGERPRINT_BYTES: usize = 8;

/// Raw bearer token supplied by a client.
///
/// The token text is wiped from memory on drop and never printed by
/// `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(Zeroizing<String>);

impl BearerToken {
    /// Wrap raw token text.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// Token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Decoded token payload.
///
/// Claims are kept exactly as the token carried them so they can be stored
/// verbatim as the author document of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Wrap an already-decoded claim map.
    #[must_use]
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// The `uid` claim, when it is a string.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.0.get("uid").and_then(Value::as_str)
    }

    /// Look up an arbitrary claim.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the underlying claim map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// Why a token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    /// The token is not a three-segment JWS or a segment failed to decode.
    #[error("malformed bearer token")]
    MalformedToken,
    /// The header names an algorithm other than HS256.
    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,
    /// The signature does not match the configured secret.
    #[error("invalid token signature")]
    InvalidSignature,
    /// The `exp` claim lies in the past.
    #[error("token is expired")]
    TokenExpired,
}

impl RejectionReason {
    /// Stable machine-readable code for error details.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "token_expired",
        }
    }
}

/// Outcome of verifying a bearer token.
#[derive(Debug, Clone, PartialEq)]
pub enum Authentication {
    /// Signature and expiry checks passed.
    Authenticated {
        /// Claims carried by the token, unmodified.
        claims: Claims,
    },
    /// The token must not be trusted.
    Rejected {
        /// Which check failed.
        reason: RejectionReason,
    },
}

impl Authentication {
    /// Convert into a `Result` for `?`-style propagation.
    pub fn into_result(self) -> Result<Claims, RejectionReason> {
        match self {
            Self::Authenticated { claims } => Ok(claims),
            Self::Rejected { reason } => Err(reason),
        }
    }
}

impl From<Result<Claims, RejectionReason>> for Authentication {
    fn from(value: Result<Claims, RejectionReason>) -> Self {
        match value {
            Ok(claims) => Self::Authenticated { claims },
            Err(reason) => Self::Rejected { reason },
        }
    }
}

/// Errors raised while constructing a [`TokenVerifier`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenVerifierError {
    /// The configured secret was empty.
    #[error("token signing secret must not be empty")]
    EmptySecret,
}

#[derive(Deserialize)]
struct TokenHeader {
    alg: String,
}

/// HS256 bearer token verifier.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use walkin::domain::{Authentication, BearerToken, RejectionReason, TokenVerifier};
///
/// let verifier = TokenVerifier::new(b"s3cret".to_vec()).expect("secret is set");
/// let outcome = verifier.authenticate(&BearerToken::new("not-a-token"), Utc::now());
/// assert_eq!(
///     outcome,
///     Authentication::Rejected { reason: RejectionReason::MalformedToken }
/// );
/// ```
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl TokenVerifier {
    /// Build a verifier for the given shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, TokenVerifierError> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(TokenVerifierError::EmptySecret);
        }
        Ok(Self { secret })
    }

    /// Truncated SHA-256 fingerprint of the secret, safe to log.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.secret.as_slice());
        digest
            .get(..FINGERPRINT_BYTES)
            .map(hex::encode)
            .unwrap_or_default()
    }

    /// Verify the token and return its claims when it can be trusted.
    #[must_use]
    pub fn authenticate(&self, token: &BearerToken, now: DateTime<Utc>) -> Authentication {
        self.verify(token.as_str(), now).into()
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, RejectionReason> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(RejectionReason::MalformedToken);
        };

        let parsed_header: TokenHeader = decode_json(header)?;
        if parsed_header.alg != SUPPORTED_ALGORITHM {
            return Err(RejectionReason::UnsupportedAlgorithm);
        }

        let signature = TOKEN_ENGINE
            .decode(signature)
            .map_err(|_| RejectionReason::MalformedToken)?;
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| RejectionReason::InvalidSignature)?;

        let claims: Map<String, Value> = decode_json(payload)?;
        check_expiry(&claims, now)?;
        Ok(Claims::new(claims))
    }

    fn mac(&self) -> Result<HmacSha256, RejectionReason> {
        HmacSha256::new_from_slice(self.secret.as_slice())
            .map_err(|_| RejectionReason::InvalidSignature)
    }

    /// Issue an HS256 token carrying `claims`, signed with this secret.
    #[cfg(any(test, feature = "test-support"))]
    #[must_use]
    pub fn sign(&self, claims: &Claims) -> String {
        let header = TOKEN_ENGINE.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = TOKEN_ENGINE.encode(serde_json::to_vec(claims).unwrap_or_default());
        let input = format!("{header}.{payload}");
        let signature = match self.mac() {
            Ok(mut mac) => {
                mac.update(input.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            Err(_) => Vec::new(),
        };
        format!("{input}.{}", TOKEN_ENGINE.encode(signature))
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, RejectionReason> {
    let bytes = TOKEN_ENGINE
        .decode(segment)
        .map_err(|_| RejectionReason::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| RejectionReason::MalformedToken)
}

fn check_expiry(claims: &Map<String, Value>, now: DateTime<Utc>) -> Result<(), RejectionReason> {
    let Some(exp) = claims.get("exp") else {
        return Ok(());
    };
    let Some(exp) = exp.as_f64() else {
        return Err(RejectionReason::MalformedToken);
    };
    #[expect(
        clippy::cast_precision_loss,
        reason = "Unix timestamps in seconds fit well inside f64 precision"
    )]
    let now_secs = now.timestamp() as f64;
    if exp < now_secs {
        return Err(RejectionReason::TokenExpired);
    }
    Ok(())
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
