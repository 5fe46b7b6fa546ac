//! HTTP client wrapper for the fleet backend.
//!
//! Every request reads the current token from the credential store at dispatch
//! time and sends it verbatim in the `Authorization` header. A rotated token in
//! a successful response is written back to the store before the call returns.
//! A 401/403 on an authenticated call clears the store and fires the session
//! signal, once per session.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::envelope::Envelope;
use super::{ApiError, Operation};
use crate::auth::{CredentialStore, Credentials, LoginGrant, SessionSignal, UserIdentity};
use crate::config::Config;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &[&str] = &["login"];
const LOGOUT_PATH: &[&str] = &["logout"];

/// Where the token for a request comes from
enum TokenSource<'a> {
    /// Whatever the credential store holds right now
    Stored,
    /// A token the caller already holds (the store may be cleared)
    Given(&'a str),
    None,
}

/// Raw successful response
struct Reply {
    body: String,
    token: Option<String>,
}

/// API client for the fleet backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    store: Arc<dyn CredentialStore>,
    signal: SessionSignal,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        signal: SessionSignal,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.api_base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            store,
            signal,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// URL for `segments` below the base, each percent-encoded as one segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn signal(&self) -> &SessionSignal {
        &self.signal
    }

    /// Authenticate and return the identity plus the issued token.
    ///
    /// Nothing is persisted here; the session controller decides what to keep.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, ApiError> {
        credentials.validate()?;

        let reply = self
            .dispatch(
                Operation::Login,
                LOGIN_PATH,
                &[],
                Some(credentials),
                TokenSource::None,
            )
            .await?;

        let user: UserIdentity = Self::decode(Operation::Login, &reply.body)?;
        let token = reply.token.ok_or_else(|| {
            ApiError::InvalidResponse("login response carried no authorization header".into())
        })?;

        Ok(LoginGrant { user, token })
    }

    /// Tell the backend a session ended. Callers treat failure as harmless.
    pub async fn notify_logout(&self, token: &str) -> Result<(), ApiError> {
        self.dispatch(
            Operation::Logout,
            LOGOUT_PATH,
            &[],
            None::<&()>,
            TokenSource::Given(token),
        )
        .await?;
        Ok(())
    }

    /// Issue an authenticated request and unwrap the envelope's `data`.
    pub async fn request<T, B>(
        &self,
        operation: Operation,
        path: &[&str],
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let reply = self
            .dispatch(operation, path, query, body, TokenSource::Stored)
            .await?;
        Self::decode(operation, &reply.body)
    }

    /// Issue an authenticated request whose payload is not needed.
    pub async fn request_unit<B>(
        &self,
        operation: Operation,
        path: &[&str],
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let reply = self
            .dispatch(operation, path, &[], body, TokenSource::Stored)
            .await?;
        let envelope: Envelope<Value> = Self::parse(operation, &reply.body)?;
        envelope.into_unit(operation)
    }

    fn parse<T: DeserializeOwned>(operation: Operation, body: &str) -> Result<Envelope<T>, ApiError> {
        serde_json::from_str(body).map_err(|e| {
            debug!(op = %operation, body = %ApiError::truncate_body(body), "Unparsable response");
            ApiError::InvalidResponse(format!("{}: {}", operation, e))
        })
    }

    fn decode<T: DeserializeOwned>(operation: Operation, body: &str) -> Result<T, ApiError> {
        Self::parse(operation, body)?.into_data(operation)
    }

    async fn dispatch<B>(
        &self,
        operation: Operation,
        path: &[&str],
        query: &[(&str, &str)],
        body: Option<&B>,
        token: TokenSource<'_>,
    ) -> Result<Reply, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let authenticated = operation.requires_auth();
        // The session this request belongs to, captured before sending
        let epoch = if authenticated { self.signal.epoch() } else { None };

        let url = self.endpoint(path)?;
        debug!(op = %operation, method = %operation.method(), path = url.path(), "Sending request");
        let mut request = self.client.request(operation.method(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let token = match token {
            TokenSource::Stored => self.store.token()?,
            TokenSource::Given(token) => Some(token.to_string()),
            TokenSource::None => None,
        };
        if let Some(ref token) = token {
            request = request.header(header::AUTHORIZATION, header::HeaderValue::from_str(token)?);
        }

        let response = request.send().await?;
        let status = response.status();
        let rotated = response
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let text = response.text().await?;
        debug!(op = %operation, status = status.as_u16(), "Received response");

        if status.is_success() {
            if authenticated {
                if let Some(ref new_token) = rotated {
                    self.persist_rotated(epoch, new_token)?;
                }
            }
            return Ok(Reply {
                body: text,
                token: rotated,
            });
        }

        if authenticated && is_auth_failure(status) {
            if let Some(epoch) = epoch {
                self.signal.invalidate(epoch, status.as_u16(), || {
                    if let Err(e) = self.store.clear() {
                        warn!(error = %e, "Failed to clear credentials after auth failure");
                    }
                });
            }
        } else {
            debug!(
                op = %operation,
                status = status.as_u16(),
                body = %ApiError::truncate_body(&text),
                "Request failed"
            );
        }

        Err(ApiError::from_status(status, &text))
    }

    /// Store a rotated token, unless the session it belongs to already ended.
    ///
    /// The write happens inside the session gate, so a concurrent 401 either
    /// sees the new token and clears it or runs before the write is skipped.
    fn persist_rotated(&self, epoch: Option<u64>, token: &str) -> Result<(), ApiError> {
        let stored = epoch.and_then(|epoch| {
            self.signal
                .while_current(epoch, || self.store.set_token(token))
        });
        match stored {
            Some(result) => {
                result?;
                debug!("Stored rotated token");
            }
            None => debug!("Ignoring rotated token for an ended session"),
        }
        Ok(())
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
