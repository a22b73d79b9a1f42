//! Runtime configuration loaded from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::db::Database;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug)]
pub struct Config {
    /// Database file (from CREWLEDGER_DB). `None` uses the platform data dir.
    pub database_path: Option<PathBuf>,
    /// Listen address (from CREWLEDGER_BIND)
    pub bind: IpAddr,
    /// Listen port (from CREWLEDGER_PORT)
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_path = lookup("CREWLEDGER_DB")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let bind = match lookup("CREWLEDGER_BIND") {
            Some(s) => s
                .trim()
                .parse()
                .with_context(|| format!("Invalid CREWLEDGER_BIND address: {}", s))?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let port = match lookup("CREWLEDGER_PORT") {
            Some(s) => s
                .trim()
                .parse()
                .with_context(|| format!("Invalid CREWLEDGER_PORT: {}", s))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            database_path,
            bind,
            port,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Open the configured database and bring its schema up to date.
    pub fn open_database(&self) -> Result<Database> {
        let path = match &self.database_path {
            Some(path) => path.clone(),
            None => Database::default_path()?,
        };
        tracing::debug!("Opening database at {}", path.display());

        let db = Database::open(path.clone())
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        db.migrate().context("Failed to run migrations")?;
        Ok(db)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.database_path.is_none());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn reads_all_variables() {
        let config = Config::from_lookup(lookup(&[
            ("CREWLEDGER_DB", "/tmp/ledger.db"),
            ("CREWLEDGER_BIND", "0.0.0.0"),
            ("CREWLEDGER_PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/ledger.db")));
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Config::from_lookup(lookup(&[("CREWLEDGER_PORT", "http")])).is_err());
    }
}
