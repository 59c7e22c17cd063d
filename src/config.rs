//! Service settings from the environment (after `.env` is loaded by the binary).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/distributor";
pub const DEFAULT_SCHEMA: &str = "distributor";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_UPLOADS_DIR: &str = "Uploads";
/// 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 52_428_800;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::UnknownStore(other.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub store: StoreBackend,
    pub schema: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from any variable source; unset or blank variables take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());
        let schema = get("DISTRIBUTOR_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.into());
        if !is_identifier(&schema) {
            return Err(ConfigError::Invalid {
                var: "DISTRIBUTOR_SCHEMA",
                value: schema,
                reason: "expected a lowercase SQL identifier".into(),
            });
        }
        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            store: get("DISTRIBUTOR_STORE")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(StoreBackend::Postgres),
            schema,
            max_connections: parse_var(&get, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            bind_addr: parse_var(&get, "BIND_ADDR", parse_default(DEFAULT_BIND_ADDR)?)?,
            uploads_dir: get("UPLOADS_DIR").unwrap_or_else(|| DEFAULT_UPLOADS_DIR.into()).into(),
            max_upload_bytes: parse_var(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }
}

fn parse_var<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&'static str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_default(addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
        var: "BIND_ADDR",
        value: addr.to_string(),
        reason: e.to_string(),
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&'static str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<&str, String> = vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        Settings::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(s.store, StoreBackend::Postgres);
        assert_eq!(s.schema, "distributor");
        assert_eq!(s.max_connections, 5);
        assert_eq!(s.bind_addr.port(), 3000);
        assert_eq!(s.uploads_dir, PathBuf::from("Uploads"));
        assert_eq!(s.max_upload_bytes, 52_428_800);
    }

    #[test]
    fn overrides_are_parsed() {
        let s = settings(&[
            ("DISTRIBUTOR_STORE", "Memory"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("MAX_UPLOAD_BYTES", " 1024 "),
            ("UPLOADS_DIR", "/var/lib/distributor"),
        ])
        .unwrap();
        assert_eq!(s.store, StoreBackend::Memory);
        assert_eq!(s.max_connections, 12);
        assert_eq!(s.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(s.max_upload_bytes, 1024);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(matches!(settings(&[("DISTRIBUTOR_STORE", "redis")]), Err(ConfigError::UnknownStore(_))));
        assert!(matches!(
            settings(&[("DB_MAX_CONNECTIONS", "many")]),
            Err(ConfigError::Invalid { var: "DB_MAX_CONNECTIONS", .. })
        ));
        assert!(matches!(
            settings(&[("DISTRIBUTOR_SCHEMA", "drop table")]),
            Err(ConfigError::Invalid { var: "DISTRIBUTOR_SCHEMA", .. })
        ));
    }
}
