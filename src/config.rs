use std::env;

/// Env
///
/// The deployment environment. It decides how much of an error reaches the client
/// (see `pipeline`) and which log format is used.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Development,
    Production,
}

impl Env {
    /// Anything other than `production` is treated as a development-like environment.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" => Env::Production,
            _ => Env::Development,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be set in production")]
    Missing { var: &'static str },
    #[error("{var} has an invalid value `{value}`: expected {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

const DEV_JWT_SECRET: &str = "micro-routes-development-secret";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_JWT_EXPIRES_IN_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// AppConfig
///
/// Immutable configuration, loaded once at startup and shared through the app state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub env: Env,
    /// Returned by `GET /` for discovery.
    pub name: String,
    pub port: u16,
    /// When set, sessions come from the `session` header written by an upstream proxy
    /// instead of a bearer token.
    pub has_proxy: bool,
    pub jwt_secret: String,
    pub jwt_header: String,
    pub jwt_expires_in_secs: u64,
    pub body_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: Env::Development,
            name: env!("CARGO_PKG_NAME").to_string(),
            port: DEFAULT_PORT,
            has_proxy: false,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_header: crate::auth::default_header(),
            jwt_expires_in_secs: DEFAULT_JWT_EXPIRES_IN_SECS,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var,
                value,
                expected,
            }),
        Err(_) => Ok(None),
    }
}

fn parse_bool(var: &'static str) -> Result<Option<bool>, ConfigError> {
    match env::var(var) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" | "" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid {
                var,
                value,
                expected: "a boolean",
            }),
        },
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the process environment. Call `dotenv` first if
    /// a `.env` file should be honoured.
    ///
    /// Production refuses to start without `JWT_SECRET` unless sessions come from a
    /// proxy; development falls back to a fixed secret.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let env = Env::parse(&env::var("APP_ENV").unwrap_or_default());
        let has_proxy = parse_bool("HAS_PROXY")?.unwrap_or(defaults.has_proxy);

        let jwt_secret = match (env::var("JWT_SECRET"), env) {
            (Ok(secret), _) if !secret.is_empty() => secret,
            (_, Env::Production) if !has_proxy => {
                return Err(ConfigError::Missing { var: "JWT_SECRET" });
            }
            _ => defaults.jwt_secret,
        };

        Ok(Self {
            env,
            name: env::var("SERVICE_NAME").unwrap_or(defaults.name),
            port: parse_var("PORT", "a port number")?.unwrap_or(defaults.port),
            has_proxy,
            jwt_secret,
            jwt_header: env::var("JWT_HEADER").unwrap_or(defaults.jwt_header),
            jwt_expires_in_secs: parse_var("JWT_EXPIRES_IN_SECS", "a number of seconds")?
                .unwrap_or(defaults.jwt_expires_in_secs),
            body_limit: parse_var("BODY_LIMIT_BYTES", "a number of bytes")?
                .unwrap_or(defaults.body_limit),
        })
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}
