//! REST response envelope decoding
//!
//! Every management endpoint answers with the same shape:
//!
//! ```json
//! {"data": <object | list | {}>, "error": {"code": 0, "description": "", "suggestion": ""}}
//! ```
//!
//! `code == 0` is success. A small set of codes means the session token is no
//! longer valid and the request may be replayed after a re-login; every other
//! non-zero code is a terminal domain error carrying the vendor description.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

// =============================================================================
// Vendor Error Codes
// =============================================================================

/// Stale or unknown session token
pub(crate) const CODE_UNAUTHORIZED: i64 = -401;
/// The array force-logged the user out (inactivity, controller failover)
pub(crate) const CODE_USER_OFFLINE: i64 = 1_077_949_069;
/// Login while the same account holds a session elsewhere; the response still
/// carries a usable token
pub(crate) const CODE_USER_ALREADY_ONLINE: i64 = 1_077_949_061;

// =============================================================================
// Envelope
// =============================================================================

/// `error` member of the response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub code: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
}

impl ErrorBody {
    pub(crate) fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Session invalidation codes trigger the re-login/replay path.
    pub(crate) fn is_session_expired(&self) -> bool {
        matches!(self.code, CODE_UNAUTHORIZED | CODE_USER_OFFLINE)
    }

    pub(crate) fn into_error(self) -> Error {
        Error::Array {
            code: self.code,
            description: self.description,
            suggestion: self.suggestion,
        }
    }
}

/// Response envelope with a statically typed payload
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "Option::default")]
    data: Option<T>,
    error: ErrorBody,
}

impl<T: DeserializeOwned> Envelope<T> {
    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

impl<T> Envelope<T> {
    pub(crate) fn error(&self) -> &ErrorBody {
        &self.error
    }

    /// Split into the payload or the typed array error.
    pub(crate) fn into_data(self) -> Result<Option<T>> {
        if self.error.is_ok() {
            Ok(self.data)
        } else {
            Err(self.error.into_error())
        }
    }

    /// Raw parts, for the one caller (login) that must inspect the error code
    /// before deciding whether the payload is usable.
    pub(crate) fn into_parts(self) -> (Option<T>, ErrorBody) {
        (self.data, self.error)
    }
}

// =============================================================================
// Numeric-String Adapters
// =============================================================================
// The array encodes most numbers and booleans as JSON strings ("ID": "11",
// "ISCLONE": "false"). These adapters accept both the string and the native
// form.

pub(crate) fn string_i64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

pub(crate) fn string_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

pub(crate) fn string_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
