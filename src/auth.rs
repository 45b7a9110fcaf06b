use std::{fmt, sync::Arc};

use async_trait::async_trait;
use axum::http::header;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    config::AppConfig,
    error::{ErrorKind, HttpError},
    request::{RouteRequest, Session},
};

/// Pulls a raw token out of a request, replacing the default header lookup.
pub type TokenExtractor = Arc<dyn Fn(&RouteRequest) -> Option<String> + Send + Sync>;

/// AuthMode
///
/// `Require` forwards a session failure to the error pipeline; `Load` attaches the
/// session when one can be loaded and otherwise lets the request through without one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Require,
    Load,
}

/// AuthOptions
///
/// What a route declares in its `auth` slot. `AuthOptions::default()` is the plain
/// "auth: true" declaration.
#[derive(Clone, Default)]
pub struct AuthOptions {
    pub mode: AuthMode,
    pub get_token: Option<TokenExtractor>,
}

impl AuthOptions {
    pub fn require() -> Self {
        Self::default()
    }

    pub fn load() -> Self {
        Self {
            mode: AuthMode::Load,
            get_token: None,
        }
    }

    pub fn with_token<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&RouteRequest) -> Option<String> + Send + Sync + 'static,
    {
        self.get_token = Some(Arc::new(extractor));
        self
    }
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("mode", &self.mode)
            .field("get_token", &self.get_token.is_some())
            .finish()
    }
}

/// SessionLoader
///
/// The authentication capability a route's auth guard delegates to. Implementations
/// either return the session for the request or fail with one of the credential /
/// session error kinds.
#[async_trait]
pub trait SessionLoader: Send + Sync {
    async fn load_session(
        &self,
        request: &RouteRequest,
        get_token: Option<&TokenExtractor>,
    ) -> Result<Session, HttpError>;
}

/// Type alias for the shared, thread-safe loader handed to the route registrar.
pub type SessionState = Arc<dyn SessionLoader>;

/// Build the loader the configuration asks for.
pub fn session_loader(config: &AppConfig) -> SessionState {
    if config.has_proxy {
        Arc::new(ProxySessions)
    } else {
        Arc::new(JwtSessions::from_config(config))
    }
}

fn has_user_id(session: &Value) -> bool {
    match session.get("userId") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

/// Claims
///
/// The JWT payload: the caller's session object plus the registered time claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub session: Map<String, Value>,
    pub exp: usize,
    pub iat: usize,
}

/// JwtSessions
///
/// Loads sessions from a signed bearer token and issues new tokens.
#[derive(Clone)]
pub struct JwtSessions {
    secret: String,
    header_key: String,
    expires_in_secs: u64,
}

impl JwtSessions {
    pub fn new(secret: impl Into<String>, header_key: impl Into<String>, expires_in_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            header_key: header_key.into().to_lowercase(),
            expires_in_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, &config.jwt_header, config.jwt_expires_in_secs)
    }

    /// Sign `session` into a token valid for the configured lifetime.
    pub fn generate_jwt(&self, session: Option<&Value>) -> Result<String, HttpError> {
        let session = match session {
            Some(Value::Object(map)) if !map.is_empty() => map,
            _ => return Err(HttpError::kind(ErrorKind::SessionIsEmpty)),
        };
        if !has_user_id(&Value::Object(session.clone())) {
            return Err(HttpError::kind(ErrorKind::SessionHasNoUserId).with_status(400));
        }

        let now = Utc::now().timestamp().max(0) as usize;
        let mut session = session.clone();
        session.remove("exp");
        session.remove("iat");
        let claims = Claims {
            session,
            iat: now,
            exp: now + self.expires_in_secs as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to sign session token");
            HttpError::message("token-signing-failed")
        })
    }

    fn token_from_header(&self, request: &RouteRequest) -> Result<Option<String>, HttpError> {
        let Some(value) = request.header(&self.header_key) else {
            return Ok(None);
        };
        let parts: Vec<&str> = value.split(' ').collect();
        match parts.as_slice() {
            [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => Ok(Some(token.to_string())),
            _ => Err(HttpError::kind(ErrorKind::CredentialsBadSchema).with_context(json!({
                "message": format!("Format is {}: Bearer [token]", self.header_key)
            }))),
        }
    }
}

/// Strip a leading `Bearer ` from tokens handed back by a custom extractor.
fn sanitize_token(token: Option<String>) -> String {
    let token = token.unwrap_or_default();
    let mut parts = token.split(' ');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.to_string(),
        _ => token,
    }
}

#[async_trait]
impl SessionLoader for JwtSessions {
    async fn load_session(
        &self,
        request: &RouteRequest,
        get_token: Option<&TokenExtractor>,
    ) -> Result<Session, HttpError> {
        let token = match get_token {
            Some(extract) => extract(request),
            None => self.token_from_header(request)?,
        };
        let token = sanitize_token(token);
        if token.is_empty() {
            return Err(HttpError::kind(ErrorKind::CredentialsRequired));
        }

        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = decode::<Claims>(&token, &decoding_key, &validation)
            .map_err(|_| HttpError::kind(ErrorKind::InvalidToken))?
            .claims;

        let mut session = claims.session;
        session.insert("exp".to_string(), json!(claims.exp));
        session.insert("iat".to_string(), json!(claims.iat));
        let session = Value::Object(session);
        if !has_user_id(&session) {
            return Err(HttpError::kind(ErrorKind::SessionHasNoUserId));
        }
        Ok(session)
    }
}

/// ProxySessions
///
/// Trusts a JSON `session` header set by an authenticating proxy in front of the
/// service.
#[derive(Clone, Copy, Default)]
pub struct ProxySessions;

pub const SESSION_HEADER: &str = "session";

#[async_trait]
impl SessionLoader for ProxySessions {
    async fn load_session(
        &self,
        request: &RouteRequest,
        _get_token: Option<&TokenExtractor>,
    ) -> Result<Session, HttpError> {
        let raw = request
            .header(SESSION_HEADER)
            .ok_or_else(|| HttpError::kind(ErrorKind::SessionRequired))?;
        let session: Value = serde_json::from_str(raw)
            .map_err(|_| HttpError::kind(ErrorKind::SessionHeaderIsInvalid))?;
        if !has_user_id(&session) {
            return Err(HttpError::kind(ErrorKind::SessionHeaderHasNoUserId));
        }
        Ok(session)
    }
}

/// Convenience extractor for routes that read the token from a query parameter.
pub fn token_from_query(name: &'static str) -> impl Fn(&RouteRequest) -> Option<String> + Send + Sync {
    move |request| request.query(name).map(str::to_string)
}

/// The default header name for bearer tokens.
pub fn default_header() -> String {
    header::AUTHORIZATION.as_str().to_string()
}
