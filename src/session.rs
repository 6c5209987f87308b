//! Auth session reader.
//!
//! Login and logout live behind an external auth boundary; this module only
//! reads the session endpoint. A 401 (or an empty session payload) means "no
//! session" and is not reported as an error.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::cache::{ItemId, rw_read, rw_write};
use crate::client::{FetchError, Fetcher};

const SOURCE: &str = "session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Museum managed by an admin account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub museum_id: Option<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires: Option<OffsetDateTime>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        matches!(self.user.role, Some(Role::Admin | Role::SuperAdmin))
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self.user.role, Some(Role::SuperAdmin))
    }

    /// Expired when `expires` is at or before `now`; sessions without expiry never expire.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// Decode a session payload. `null`, `{}` and payloads without a `user` are "no session".
pub fn parse_session(raw: Value) -> Result<Option<Session>, FetchError> {
    let has_user = raw
        .get("user")
        .is_some_and(|user| !user.is_null());
    if !has_user {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(raw)?))
}

/// Reads and remembers the current session.
pub struct SessionReader {
    fetcher: Arc<dyn Fetcher>,
    path: String,
    current: RwLock<Option<Session>>,
}

impl SessionReader {
    pub fn new(fetcher: Arc<dyn Fetcher>, path: impl Into<String>) -> Self {
        Self {
            fetcher,
            path: path.into(),
            current: RwLock::new(None),
        }
    }

    /// Last session seen by [`refresh`](Self::refresh).
    pub fn current(&self) -> Option<Session> {
        rw_read(&self.current, SOURCE, "current").clone()
    }

    pub fn is_authenticated(&self) -> bool {
        rw_read(&self.current, SOURCE, "is_authenticated").is_some()
    }

    /// Re-read the session endpoint.
    ///
    /// Unauthenticated responses clear the session and return `Ok(None)`.
    /// Any other failure keeps the previous session and is returned.
    #[instrument(skip(self), fields(path = %self.path))]
    pub async fn refresh(&self) -> Result<Option<Session>, FetchError> {
        let session = match self.fetcher.fetch_json(&self.path).await {
            Ok(raw) => parse_session(raw).inspect_err(|err| {
                warn!(error = %err, "Session payload could not be decoded");
            })?,
            Err(err) if err.is_unauthorized() => {
                debug!("Session endpoint reported no session");
                None
            }
            Err(err) => {
                warn!(error = %err, error_kind = err.kind(), "Session refresh failed");
                return Err(err);
            }
        };

        *rw_write(&self.current, SOURCE, "refresh") = session.clone();
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn empty_payloads_mean_no_session() {
        assert_eq!(parse_session(Value::Null).expect("null"), None);
        assert_eq!(parse_session(json!({})).expect("empty"), None);
        assert_eq!(parse_session(json!({"user": null})).expect("null user"), None);
    }

    #[test]
    fn session_roles_and_expiry() {
        let session = parse_session(json!({
            "user": {"id": "u1", "email": "curator@example.org", "role": "super_admin"},
            "expires": "2026-01-01T00:00:00Z"
        }))
        .expect("decode")
        .expect("session");

        assert!(session.is_admin());
        assert!(session.is_super_admin());
        assert!(session.is_expired_at(datetime!(2026-06-01 0:00 UTC)));
        assert!(!session.is_expired_at(datetime!(2025-06-01 0:00 UTC)));
        assert!(session.is_expired_at(datetime!(2026-01-01 0:00 UTC)));
    }

    #[test]
    fn unknown_role_is_tolerated() {
        let session = parse_session(json!({"user": {"id": 3, "role": "volunteer"}}))
            .expect("decode")
            .expect("session");
        assert_eq!(session.user.role, Some(Role::Unknown));
        assert!(!session.is_admin());
    }

    #[test]
    fn malformed_user_is_a_decode_error() {
        let err = parse_session(json!({"user": {"email": "missing id"}})).expect_err("no id");
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
