use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::chapa::DEFAULT_BASE_URL;
use crate::utils::sanitize::mask_str;

pub const MAX_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone)]
pub struct Config {
    pub server_port: u16,
    pub hasura_graphql_endpoint: String,
    pub hasura_admin_secret: String,
    pub chapa_base_url: String,
    pub chapa_secret_key: String,
    pub chapa_webhook_secret: String,
    pub backend_public_url: Url,
    pub frontend_url: Url,
    pub payment_currency: String,
    pub checkout_title: String,
    pub http_timeout_secs: u64,
    pub verify_max_attempts: u32,
    pub ledger_max_attempts: u32,
    pub push_reverify: bool,
    pub action_secret: Option<String>,
    pub log_request_body: bool,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| anyhow::anyhow!("missing required environment variable: {}", key))
        };

        let hasura_graphql_endpoint = required("HASURA_GRAPHQL_ENDPOINT")?;
        parse_url("HASURA_GRAPHQL_ENDPOINT", &hasura_graphql_endpoint)?;
        let chapa_base_url = get("CHAPA_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        parse_url("CHAPA_BASE_URL", &chapa_base_url)?;

        Ok(Config {
            server_port: get("SERVER_PORT")
                .unwrap_or_else(|| "8002".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            hasura_graphql_endpoint,
            hasura_admin_secret: required("HASURA_ADMIN_SECRET")?,
            chapa_base_url,
            chapa_secret_key: required("CHAPA_SECRET_KEY")?,
            chapa_webhook_secret: required("CHAPA_WEBHOOK_SECRET")?,
            backend_public_url: parse_url("BACKEND_PUBLIC_URL", &required("BACKEND_PUBLIC_URL")?)?,
            frontend_url: parse_url("FRONTEND_URL", &required("FRONTEND_URL")?)?,
            payment_currency: get("PAYMENT_CURRENCY").unwrap_or_else(|| "ETB".to_string()),
            checkout_title: get("CHECKOUT_TITLE")
                .unwrap_or_else(|| "BiteSized Recipe Purchase".to_string()),
            http_timeout_secs: get("HTTP_TIMEOUT_SECS")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("HTTP_TIMEOUT_SECS must be a whole number of seconds")?
                .unwrap_or(MAX_HTTP_TIMEOUT_SECS)
                .clamp(1, MAX_HTTP_TIMEOUT_SECS),
            verify_max_attempts: parse_attempts(get("VERIFY_MAX_ATTEMPTS"), "VERIFY_MAX_ATTEMPTS")?,
            ledger_max_attempts: parse_attempts(get("LEDGER_MAX_ATTEMPTS"), "LEDGER_MAX_ATTEMPTS")?,
            push_reverify: parse_bool(get("PUSH_REVERIFY")),
            action_secret: get("ACTION_SECRET"),
            log_request_body: parse_bool(get("LOG_REQUEST_BODY")),
            log_format: match get("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Provider push target; the GET twin of this route is the browser redirect target.
    pub fn webhook_url(&self) -> Url {
        join_path(&self.backend_public_url, "payments/webhook")
    }

    pub fn status_page_url(&self) -> Url {
        join_path(&self.frontend_url, "payment/status")
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field("hasura_graphql_endpoint", &self.hasura_graphql_endpoint)
            .field("hasura_admin_secret", &mask_str(&self.hasura_admin_secret))
            .field("chapa_base_url", &self.chapa_base_url)
            .field("chapa_secret_key", &mask_str(&self.chapa_secret_key))
            .field("chapa_webhook_secret", &mask_str(&self.chapa_webhook_secret))
            .field("backend_public_url", &self.backend_public_url.as_str())
            .field("frontend_url", &self.frontend_url.as_str())
            .field("payment_currency", &self.payment_currency)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("verify_max_attempts", &self.verify_max_attempts)
            .field("ledger_max_attempts", &self.ledger_max_attempts)
            .field("push_reverify", &self.push_reverify)
            .field("action_secret", &self.action_secret.as_deref().map(mask_str))
            .field("log_request_body", &self.log_request_body)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("{} is not a valid URL", key))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("{} must be an http(s) URL", key);
    }
    Ok(url)
}

fn parse_bool(raw: Option<String>) -> bool {
    matches!(
        raw.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("true" | "1" | "yes")
    )
}

fn parse_attempts(raw: Option<String>, key: &str) -> Result<u32> {
    match raw {
        None => Ok(3),
        Some(v) => {
            let n: u32 = v
                .parse()
                .with_context(|| format!("{} must be a positive integer", key))?;
            if n == 0 {
                anyhow::bail!("{} must be at least 1", key);
            }
            Ok(n)
        }
    }
}

fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!("{}/{}", base.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url.set_query(None);
    url
}
