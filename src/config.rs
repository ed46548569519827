use std::net::SocketAddr;

use anyhow::{Context as _, Result};

pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LOG_FILTER: &str = "rollcall=info,tower_http=info";

/// Settings read from the environment, after loading any `.env` file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// When unset, the ledger lives in memory and is lost on exit
    pub database_url: Option<String>,
    pub addr: SocketAddr,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let addr = var("ROLLCALL_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_owned());

        Ok(Self {
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            addr: addr
                .parse()
                .with_context(|| format!("ROLLCALL_ADDR is not a socket address: {}", addr))?,
            log_filter: var("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned()),
        })
    }
}
