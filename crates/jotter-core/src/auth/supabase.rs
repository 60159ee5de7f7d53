//! Supabase (GoTrue) auth client.
//!
//! Speaks the password grant, refresh grant, `/signup`, `/logout` and
//! `/settings` endpoints and keeps the resulting session in an
//! [`SessionPersistence`] store.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    validate_credentials, AuthError, AuthProvider, AuthResult, AuthSession, AuthUser,
    SessionPersistence, SignUpOutcome,
};
use crate::util::{compact_text, is_http_url, unix_timestamp_now};

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
            store,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.auth_url)
    }

    /// Request authorized with the project's anon key only.
    fn anonymous(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> AuthResult<T> {
        let response = ensure_success(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn grant(&self, grant_type: &str, body: &impl Serialize) -> AuthResult<GrantResponse> {
        let request = self
            .client
            .post(self.endpoint("token"))
            .query(&[("grant_type", grant_type)])
            .json(body);
        self.fetch(self.anonymous(request)).await
    }

    /// Public auth settings of the project, e.g. whether sign-ups are open.
    pub async fn fetch_settings(&self) -> AuthResult<AuthSettings> {
        self.fetch(self.anonymous(self.client.get(self.endpoint("settings"))))
            .await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub disable_signup: bool,
    /// Sign-ups are confirmed without an email round-trip.
    #[serde(default)]
    pub mailer_autoconfirm: bool,
}

impl<S: SessionPersistence> AuthProvider for SupabaseAuthClient<S> {
    async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(persisted) = self.store.load_session()? else {
            return Ok(None);
        };
        if !persisted.is_expired() {
            return Ok(Some(persisted));
        }

        tracing::debug!("Persisted session expired; refreshing");
        match self.refresh_session(&persisted.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        let credentials = Credentials {
            email: email.trim(),
            password,
        };
        let session = self
            .grant("password", &credentials)
            .await?
            .require_session("sign-in")?;
        self.store.save_session(&session)?;
        tracing::info!("Signed in as user {}", session.user.id);
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;
        let credentials = Credentials {
            email: email.trim(),
            password,
        };
        let request = self.client.post(self.endpoint("signup")).json(&credentials);
        let response: GrantResponse = self.fetch(self.anonymous(request)).await?;

        let Some(session) = response.into_session()? else {
            tracing::info!("Sign-up awaits email confirmation");
            return Ok(SignUpOutcome::ConfirmationRequired);
        };
        self.store.save_session(&session)?;
        Ok(SignUpOutcome::SignedIn(session))
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }
        let session = self
            .grant("refresh_token", &RefreshGrant { refresh_token })
            .await?
            .require_session("refresh")?;
        self.store.save_session(&session)?;
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        // An already-revoked token still counts as signed out.
        if response.status() != StatusCode::UNAUTHORIZED {
            ensure_success(response).await?;
        }
        self.store.clear_session()
    }

    fn clear_local_session(&self) -> AuthResult<()> {
        self.store.clear_session()
    }
}

async fn ensure_success(response: Response) -> AuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AuthError::Api(describe_error(status, &body)))
}

/// Project URL to its `/auth/v1` base.
pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let base = url.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !is_http_url(base) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    let base = base.strip_suffix("/auth/v1").unwrap_or(base);
    Ok(format!("{base}/auth/v1"))
}

/// Token fields GoTrue returns either at the top level or under `session`.
#[derive(Debug, Deserialize)]
struct TokenFields {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<UserPayload>,
}

impl TokenFields {
    fn or(self, fallback: Self) -> Self {
        Self {
            access_token: self.access_token.or(fallback.access_token),
            refresh_token: self.refresh_token.or(fallback.refresh_token),
            expires_at: self.expires_at.or(fallback.expires_at),
            expires_in: self.expires_in.or(fallback.expires_in),
            user: self.user.or(fallback.user),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GrantResponse {
    #[serde(flatten)]
    fields: TokenFields,
    #[serde(default)]
    session: Option<TokenFields>,
}

impl GrantResponse {
    /// `Ok(None)` when GoTrue returned a user but no tokens, which is how a
    /// sign-up pending email confirmation looks.
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let fields = match self.session {
            Some(nested) => self.fields.or(nested),
            None => self.fields,
        };
        let tokenless = fields.access_token.is_none() && fields.refresh_token.is_none();
        if tokenless && fields.user.is_some() {
            return Ok(None);
        }

        let expires_at = fields.expires_at.or_else(|| {
            fields
                .expires_in
                .map(|seconds| unix_timestamp_now().saturating_add(seconds))
        });
        let (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) =
            (fields.access_token, fields.refresh_token, expires_at, fields.user)
        else {
            return Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            ));
        };
        Ok(Some(AuthSession {
            access_token,
            refresh_token,
            expires_at,
            user: user.into(),
        }))
    }

    fn require_session(self, action: &str) -> AuthResult<AuthSession> {
        self.into_session()?.ok_or_else(|| {
            AuthError::Api(format!("{action} response did not include an active session"))
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    email: Option<String>,
    #[serde(default)]
    last_sign_in_at: Option<DateTime<Utc>>,
}

impl From<UserPayload> for AuthUser {
    fn from(user: UserPayload) -> Self {
        Self {
            id: user.id,
            email: user.email,
            last_sign_in_at: user.last_sign_in_at,
        }
    }
}

/// Error body shapes used by GoTrue and PostgREST.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Render a Supabase error body (auth or REST) as `message (status)`.
pub(crate) fn describe_error(status: StatusCode, body: &str) -> String {
    let code = status.as_u16();
    let described = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| {
            [body.message, body.msg, body.error_description, body.error]
                .into_iter()
                .flatten()
                .next()
        });
    match described {
        Some(message) => format!("{} ({code})", message.trim()),
        None if body.trim().is_empty() => format!("HTTP {code}"),
        None => format!("{} ({code})", compact_text(body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_auth_url_appends_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co/").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn normalize_auth_url_keeps_existing_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co/auth/v1").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn normalize_auth_url_requires_scheme() {
        assert!(normalize_auth_url("demo.supabase.co").is_err());
    }

    #[test]
    fn response_without_session_fields_means_confirmation_required() {
        let response: GrantResponse = serde_json::from_str(
            r#"{"user":{"id":"user","email":"user@example.com"}}"#,
        )
        .unwrap();
        assert!(response.into_session().unwrap().is_none());
    }

    #[test]
    fn password_grant_response_carries_last_sign_in() {
        let response: GrantResponse = serde_json::from_str(
            r#"{
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": 3600,
                "user": {
                    "id": "user",
                    "email": "user@example.com",
                    "last_sign_in_at": "2025-02-01T08:30:00.123456Z"
                }
            }"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert!(session.expires_at > unix_timestamp_now());
        assert!(session.user.last_sign_in_at.is_some());
    }

    #[test]
    fn nested_session_fields_are_used() {
        let response: GrantResponse = serde_json::from_str(
            r#"{
                "user": {"id": "user"},
                "session": {"access_token": "a", "refresh_token": "r", "expires_at": 1900000000}
            }"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert_eq!(session.access_token, "a");
        assert_eq!(session.expires_at, 1_900_000_000);
        assert_eq!(session.user.id, "user");
    }

    #[test]
    fn partial_tokens_are_rejected() {
        let response: GrantResponse =
            serde_json::from_str(r#"{"access_token":"a","user":{"id":"user"}}"#).unwrap();
        assert!(matches!(response.into_session(), Err(AuthError::Api(_))));
    }

    #[test]
    fn settings_ignore_unrelated_fields() {
        let settings: AuthSettings = serde_json::from_str(
            r#"{"external":{"email":true,"google":false},"disable_signup":false,"mailer_autoconfirm":true,"sms_provider":""}"#,
        )
        .unwrap();
        assert_eq!(
            settings,
            AuthSettings {
                disable_signup: false,
                mailer_autoconfirm: true,
            }
        );
    }

    #[test]
    fn describe_error_prefers_message_fields() {
        let rendered = describe_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(rendered, "Invalid login credentials (400)");
        assert_eq!(describe_error(StatusCode::BAD_GATEWAY, " "), "HTTP 502");
    }
}
