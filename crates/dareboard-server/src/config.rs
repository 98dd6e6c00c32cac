use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use dareboard_core::SocialConfig;
use dareboard_core::rate_limit::{DEFAULT_FRIEND_REQUEST_LIMIT, DEFAULT_FRIEND_REQUEST_WINDOW, RateLimitConfig};

/// Secrets that ship in examples and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

#[derive(Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub social: SocialConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("DAREBOARD_JWT_SECRET")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if jwt_secret.is_empty() {
            bail!("DAREBOARD_JWT_SECRET must be set");
        }
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("DAREBOARD_JWT_SECRET is a placeholder value; set a real secret");
        }

        let db_path = lookup("DAREBOARD_DB_PATH").unwrap_or_else(|| "dareboard.db".into());
        let host = lookup("DAREBOARD_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "DAREBOARD_PORT", 3000)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let max_requests = parse_or(&lookup, "DAREBOARD_FRIEND_REQUEST_LIMIT", DEFAULT_FRIEND_REQUEST_LIMIT)?;
        let window_secs = parse_or(
            &lookup,
            "DAREBOARD_FRIEND_REQUEST_WINDOW_SECS",
            DEFAULT_FRIEND_REQUEST_WINDOW.as_secs(),
        )?;
        if max_requests == 0 || window_secs == 0 {
            bail!("friend request limit and window must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(db_path),
            addr,
            social: SocialConfig {
                friend_requests: RateLimitConfig {
                    max_requests,
                    window: Duration::from_secs(window_secs),
                },
            },
        })
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("jwt_secret", &"<redacted>")
            .field("db_path", &self.db_path)
            .field("addr", &self.addr)
            .field("social", &self.social)
            .finish()
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let cfg = config(&[("DAREBOARD_JWT_SECRET", "a-long-random-value")]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("dareboard.db"));
        assert_eq!(cfg.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.social.friend_requests, RateLimitConfig::default());
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let cfg = config(&[("DAREBOARD_JWT_SECRET", "a-long-random-value")]).unwrap();
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("a-long-random-value"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("dareboard.db"));
    }

    #[test]
    fn missing_or_placeholder_secret_is_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("DAREBOARD_JWT_SECRET", "  ")]).is_err());
        assert!(config(&[("DAREBOARD_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("DAREBOARD_JWT_SECRET", "a-long-random-value"),
            ("DAREBOARD_HOST", "127.0.0.1"),
            ("DAREBOARD_PORT", "8080"),
            ("DAREBOARD_FRIEND_REQUEST_LIMIT", "5"),
            ("DAREBOARD_FRIEND_REQUEST_WINDOW_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.social.friend_requests.max_requests, 5);
        assert_eq!(cfg.social.friend_requests.window, Duration::from_secs(60));

        assert!(config(&[("DAREBOARD_JWT_SECRET", "x1"), ("DAREBOARD_PORT", "nope")]).is_err());
        assert!(config(&[("DAREBOARD_JWT_SECRET", "x1"), ("DAREBOARD_FRIEND_REQUEST_LIMIT", "0")]).is_err());
    }
}
