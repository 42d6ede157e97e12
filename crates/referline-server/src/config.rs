//! Server configuration from command-line flags and environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use referline_chain::ChainConfig;
use referline_db::DbConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "referline-server")]
#[command(about = "Referral hierarchy and loan-audit sign-off service")]
pub struct ServerConfig {
    /// Listen address
    #[arg(long, env = "REFERLINE_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// SurrealDB endpoint (`ws://host:port`, `mem://`, ...)
    #[arg(long, env = "REFERLINE_DB_URL", default_value = "ws://127.0.0.1:8000")]
    pub db_url: String,

    #[arg(long, env = "REFERLINE_DB_NAMESPACE", default_value = "referline")]
    pub db_namespace: String,

    #[arg(long, env = "REFERLINE_DB_DATABASE", default_value = "main")]
    pub db_database: String,

    #[arg(long, env = "REFERLINE_DB_USERNAME")]
    pub db_username: Option<String>,

    #[arg(long, env = "REFERLINE_DB_PASSWORD")]
    pub db_password: Option<String>,

    /// PEM-encoded Ed25519 public key used to verify caller tokens
    #[arg(long, env = "REFERLINE_JWT_PUBLIC_KEY")]
    pub jwt_public_key: Option<String>,

    /// File holding the PEM public key (used when the inline key is unset)
    #[arg(long, env = "REFERLINE_JWT_PUBLIC_KEY_FILE")]
    pub jwt_public_key_file: Option<PathBuf>,

    /// Expected `iss` claim
    #[arg(long, env = "REFERLINE_JWT_ISSUER", default_value = "referline")]
    pub jwt_issuer: String,

    /// Maximum number of ancestors walked for one actor
    #[arg(long, env = "REFERLINE_MAX_CHAIN_DEPTH", default_value_t = 50)]
    pub max_chain_depth: usize,

    #[arg(long, env = "REFERLINE_ALLOW_MULTIPLE_ROOTS")]
    pub allow_multiple_roots: bool,

    /// Create a root admin on startup if none exists
    #[arg(long, env = "REFERLINE_BOOTSTRAP_ADMIN_NAME", requires = "bootstrap_admin_email")]
    pub bootstrap_admin_name: Option<String>,

    #[arg(long, env = "REFERLINE_BOOTSTRAP_ADMIN_EMAIL", requires = "bootstrap_admin_name")]
    pub bootstrap_admin_email: Option<String>,
}

impl ServerConfig {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            max_chain_depth: self.max_chain_depth,
            allow_multiple_roots: self.allow_multiple_roots,
            ..ChainConfig::default()
        }
    }

    /// The verification key, inline value first.
    pub fn jwt_public_key_pem(&self) -> anyhow::Result<String> {
        if let Some(pem) = &self.jwt_public_key {
            return Ok(pem.clone());
        }
        match &self.jwt_public_key_file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading JWT public key from {}", path.display())),
            None => bail!("set REFERLINE_JWT_PUBLIC_KEY or REFERLINE_JWT_PUBLIC_KEY_FILE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config = ServerConfig::parse_from(["referline-server", "--jwt-public-key", "pem"]);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.chain_config().max_chain_depth, 50);
        assert!(!config.chain_config().allow_multiple_roots);
        assert_eq!(config.db_config().namespace, "referline");
        assert_eq!(config.jwt_public_key_pem().unwrap(), "pem");
    }

    #[test]
    fn bootstrap_flags_must_come_together() {
        let result = ServerConfig::try_parse_from([
            "referline-server",
            "--bootstrap-admin-name",
            "Root",
        ]);
        assert!(result.is_err());
    }
}
