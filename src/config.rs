use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

/// One year.
const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is not set")?;

        let secret = lookup("JWT_SECRET").context("JWT_SECRET is not set")?;
        anyhow::ensure!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let ttl_minutes = parse_or(&lookup, "JWT_TTL_MINUTES", 24 * 60)?;
        anyhow::ensure!(
            (1..=MAX_TTL_MINUTES).contains(&ttl_minutes),
            "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}"
        );

        let jwt = JwtConfig {
            secret,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "todo-service".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "todo-service-users".into()),
            ttl_minutes,
        };

        Ok(Self {
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            jwt,
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "APP_PORT", 8080)?,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    /// `DATABASE_URL=memory` runs against the in-memory stores.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url == "memory"
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/todos"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .expect("config should load");

        assert_eq!(cfg.jwt.ttl_minutes, 1440);
        assert_eq!(cfg.jwt.issuer, "todo-service");
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.bind_addr().unwrap().to_string(), "0.0.0.0:8080");
        assert!(!cfg.uses_memory_store());
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "memory")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let res = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory"),
            ("JWT_SECRET", ""),
        ]));
        assert!(res.is_err());
    }

    #[test]
    fn invalid_ttl_is_rejected() {
        for ttl in ["0", "-5", "soon", "525601", "10000000000"] {
            let res = AppConfig::from_lookup(lookup_from(&[
                ("DATABASE_URL", "memory"),
                ("JWT_SECRET", "x"),
                ("JWT_TTL_MINUTES", ttl),
            ]));
            assert!(res.is_err(), "ttl {ttl} should be rejected");
        }
    }

    #[test]
    fn ttl_of_one_year_is_accepted() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory"),
            ("JWT_SECRET", "x"),
            ("JWT_TTL_MINUTES", "525600"),
        ]))
        .unwrap();
        assert_eq!(cfg.jwt.ttl_minutes, 525_600);
    }

    #[test]
    fn memory_url_selects_memory_store() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory"),
            ("JWT_SECRET", "x"),
            ("APP_PORT", "3000"),
        ]))
        .unwrap();
        assert!(cfg.uses_memory_store());
        assert_eq!(cfg.port, 3000);
    }
}
