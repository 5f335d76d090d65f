//! Authentication against the hosted store's auth endpoint.
//!
//! Password-based sign-up/sign-in returning a bearer session, plus sign-out,
//! current-session lookup, and a polling session watch that surfaces
//! sign-in/sign-out transitions as events. The session's access token is
//! what [`super::rest::RestStore::with_session`] attaches to row requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::StoreError;

use super::StoreResult;
use super::rest::RestConfig;

/// An authenticated user.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A signed-in session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

/// Client for the auth endpoint.
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: RestConfig,
}

impl AuthClient {
    pub fn new(config: RestConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> StoreResult<Self> {
        Ok(Self::new(RestConfig::from_env()?))
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
    }

    fn auth_url(&self, path: &str) -> String {
        format!(
            "{}/auth/v1/{path}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Register a new user with email and password.
    pub fn sign_up(&self, email: &str, password: &str) -> StoreResult<Session> {
        self.credential_request("signup", email, password)
    }

    /// Sign in an existing user.
    pub fn sign_in(&self, email: &str, password: &str) -> StoreResult<Session> {
        self.credential_request("token?grant_type=password", email, password)
    }

    /// Invalidate a session's access token.
    pub fn sign_out(&self, access_token: &str) -> StoreResult<()> {
        self.agent()
            .post(&self.auth_url("logout"))
            .set("apikey", &self.config.anon_key)
            .set("Authorization", &format!("Bearer {access_token}"))
            .call()
            .map_err(map_auth_err)?;
        Ok(())
    }

    /// The user owning an access token, if the session is still valid.
    pub fn current_user(&self, access_token: &str) -> StoreResult<AuthUser> {
        let resp = self
            .agent()
            .get(&self.auth_url("user"))
            .set("apikey", &self.config.anon_key)
            .set("Authorization", &format!("Bearer {access_token}"))
            .call()
            .map_err(map_auth_err)?;
        resp.into_json().map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })
    }

    fn credential_request(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> StoreResult<Session> {
        let resp = self
            .agent()
            .post(&self.auth_url(path))
            .set("apikey", &self.config.anon_key)
            .set("Content-Type", "application/json")
            .send_json(serde_json::json!({
                "email": email,
                "password": password,
            }))
            .map_err(map_auth_err)?;
        resp.into_json().map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })
    }
}

/// A change in session state observed by [`AuthClient::watch_session`].
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
}

/// Handle to a polling session watch.
///
/// The polling thread stops when the handle is dropped.
pub struct SessionWatch {
    events: mpsc::Receiver<AuthEvent>,
    stop: Arc<AtomicBool>,
}

impl SessionWatch {
    /// Next pending event, if any.
    pub fn try_next(&self) -> Option<AuthEvent> {
        self.events.try_recv().ok()
    }

    /// Block up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<AuthEvent> {
        self.events.recv_timeout(timeout).ok()
    }
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl AuthClient {
    /// Watch an access token for session-state changes.
    ///
    /// Polls the auth endpoint on its own thread and emits an event on each
    /// transition: the first successful lookup surfaces as `SignedIn`, a
    /// rejected token as `SignedOut`, and a token re-bound to a different
    /// user as a fresh `SignedIn`. Transient transport failures are logged
    /// and skipped rather than reported as sign-outs.
    pub fn watch_session(
        &self,
        access_token: impl Into<String>,
        interval: Duration,
    ) -> SessionWatch {
        let client = self.clone();
        let access_token = access_token.into();
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let stop_flag = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut known: Option<AuthUser> = None;
            while !stop_flag.load(Ordering::Acquire) {
                let current = match client.current_user(&access_token) {
                    Ok(user) => Some(user),
                    // Rejected credentials: the session is gone.
                    Err(StoreError::AuthFailed { .. }) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "session poll failed, will retry");
                        std::thread::sleep(interval);
                        continue;
                    }
                };
                if let Some(event) = session_transition(known.as_ref(), current.as_ref()) {
                    if tx.send(event).is_err() {
                        return; // receiver gone
                    }
                }
                known = current;
                std::thread::sleep(interval);
            }
        });

        SessionWatch { events: rx, stop }
    }
}

fn session_transition(
    known: Option<&AuthUser>,
    current: Option<&AuthUser>,
) -> Option<AuthEvent> {
    match (known, current) {
        (None, Some(user)) => Some(AuthEvent::SignedIn(user.clone())),
        (Some(_), None) => Some(AuthEvent::SignedOut),
        (Some(prev), Some(user)) if prev.id != user.id => {
            Some(AuthEvent::SignedIn(user.clone()))
        }
        _ => None,
    }
}

fn map_auth_err(e: ureq::Error) -> StoreError {
    match e {
        // Credential problems come back as 4xx with a JSON body.
        ureq::Error::Status(status @ 400..=499, resp) => {
            let message = resp
                .into_json::<serde_json::Value>()
                .ok()
                .and_then(|v| {
                    v.get("error_description")
                        .or_else(|| v.get("msg"))
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| format!("status {status}"));
            StoreError::AuthFailed { message }
        }
        ureq::Error::Status(status, _) => StoreError::Http { status },
        ureq::Error::Transport(t) => StoreError::Transport {
            message: t.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> RestConfig {
        RestConfig {
            base_url: "http://127.0.0.1:1".into(), // unreachable port
            anon_key: "anon".into(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn sign_in_against_unreachable_host_is_a_transport_error() {
        let client = AuthClient::new(local_config());
        let result = client.sign_in("a@example.com", "pw");
        assert!(matches!(result, Err(StoreError::Transport { .. })));
    }

    #[test]
    fn auth_urls_are_joined_without_double_slashes() {
        let client = AuthClient::new(RestConfig {
            base_url: "http://host/".into(),
            anon_key: "anon".into(),
            timeout_secs: 1,
        });
        assert_eq!(client.auth_url("signup"), "http://host/auth/v1/signup");
    }

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.into(),
            email: None,
        }
    }

    #[test]
    fn session_transitions_cover_sign_in_and_sign_out() {
        let u = user("u1");
        assert!(matches!(
            session_transition(None, Some(&u)),
            Some(AuthEvent::SignedIn(got)) if got.id == "u1"
        ));
        assert!(matches!(
            session_transition(Some(&u), None),
            Some(AuthEvent::SignedOut)
        ));
        assert!(session_transition(Some(&u), Some(&u)).is_none());
        assert!(session_transition(None, None).is_none());
    }

    #[test]
    fn rebound_token_surfaces_as_a_fresh_sign_in() {
        let old = user("u1");
        let new = user("u2");
        assert!(matches!(
            session_transition(Some(&old), Some(&new)),
            Some(AuthEvent::SignedIn(got)) if got.id == "u2"
        ));
    }

    #[test]
    fn transport_failures_emit_no_session_events() {
        // The host is unreachable, so every poll is a transport error and
        // the watch must stay silent rather than report a sign-out.
        let client = AuthClient::new(local_config());
        let watch = client.watch_session("tok", Duration::from_millis(10));
        assert!(watch.next_timeout(Duration::from_millis(100)).is_none());
    }

    #[test]
    fn session_deserializes_from_auth_payload() {
        let session: Session = serde_json::from_str(
            r#"{"access_token":"tok","user":{"id":"u1","email":"a@example.com"}}"#,
        )
        .unwrap();
        assert_eq!(session.access_token, "tok");
        assert_eq!(session.user.id, "u1");
        assert!(session.refresh_token.is_none());
    }
}
