//! Session and authentication lifecycle.
//!
//! Sessions are short-lived: one per logical operation, released on
//! every exit path through [`ShimClient::with_session`]. The auth token
//! outlives sessions and is acquired lazily on the first TLS exchange.

use crate::client::ShimClient;
use crate::http::{
    ENDPOINT_LOGIN, ENDPOINT_LOGOUT, ENDPOINT_NEW_SESSION, ENDPOINT_RELEASE_SESSION,
};
use scidb_common::{ShimError, ShimResult};
use tracing::{debug, warn};

/// Token adopted on dialects without a login endpoint; the gateway
/// ignores its value but some front ends require the parameter.
const OPAQUE_TOKEN: &str = "UNUSED";

impl ShimClient {
    /// Acquire an auth token.
    ///
    /// Dialects without a login endpoint adopt the opaque token; the
    /// rest exchange credentials for a real one. An empty response body
    /// means the credentials were rejected.
    pub(crate) fn login(&mut self) -> ShimResult<()> {
        if !self.dialect()?.has_login {
            debug!("Shim has no login endpoint, adopting opaque auth token");
            self.auth = Some(OPAQUE_TOKEN.to_string());
            return Ok(());
        }

        let query = [
            ("username", self.params.user.clone()),
            ("password", self.params.password.clone()),
        ];
        let body = self.transport.get_text(ENDPOINT_LOGIN, &query)?;
        let token = body.trim().to_string();
        if token.is_empty() {
            return Err(ShimError::AuthFailed(format!(
                "user '{}' rejected by shim",
                self.params.user
            )));
        }
        debug!(token = %mask(&token), "Logged in");
        self.auth = Some(token);
        Ok(())
    }

    /// Invalidate the held token. A no-op on dialects whose logout
    /// endpoint is gone; the token is dropped either way.
    pub(crate) fn logout(&mut self) -> ShimResult<()> {
        let Some(token) = self.auth.take() else {
            return Ok(());
        };
        if !self.dialect()?.has_logout {
            return Ok(());
        }
        let _ = self.transport.get_text(ENDPOINT_LOGOUT, &[("auth", token)])?;
        debug!("Logged out");
        Ok(())
    }

    /// Open a session, logging in first when TLS is on and no token is
    /// held yet. Non-positive session ids are rejected.
    pub(crate) fn new_session(&mut self) -> ShimResult<i64> {
        if self.params.ssl && self.auth.is_none() {
            self.login()?;
        }
        let query = self.auth_query(Vec::new());
        let body = self.transport.get_text(ENDPOINT_NEW_SESSION, &query)?;
        let id: i64 = body.trim().parse().unwrap_or(-1);
        if id <= 0 {
            return Err(ShimError::InvalidSession(id));
        }
        debug!(session = id, "Session acquired");
        Ok(id)
    }

    /// Best effort release; a failure is logged, never propagated, so
    /// the operation's own result survives.
    pub(crate) fn release_session(&mut self, id: i64) {
        let query = self.auth_query(vec![("id", id.to_string())]);
        if let Err(e) = self.transport.get_text(ENDPOINT_RELEASE_SESSION, &query) {
            warn!(session = id, error = %e, "Failed to release session");
        }
    }

    /// Run an operation inside a fresh session. The session is released
    /// on every exit path, including the error ones.
    pub(crate) fn with_session<T>(
        &mut self,
        f: impl FnOnce(&mut Self, i64) -> ShimResult<T>,
    ) -> ShimResult<T> {
        let id = self.new_session()?;
        let result = f(self, id);
        self.release_session(id);
        result
    }

    /// Query parameter list with the auth token appended when held.
    pub(crate) fn auth_query(
        &self,
        mut query: Vec<(&'static str, String)>,
    ) -> Vec<(&'static str, String)> {
        if let Some(token) = &self.auth {
            query.push(("auth", token.clone()));
        }
        query
    }
}

/// First four characters of a token, for log lines.
fn mask(token: &str) -> String {
    let head: String = token.chars().take(4).collect();
    format!("{head}****")
}
