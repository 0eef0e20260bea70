use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_pool_size: u32,
    pub page_size: i64,
    pub choice_slots: usize,
    pub jwt_secret: String,
    pub login_url: String,
    pub public_url: Option<String>,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let jwt_secret = var("POLLS_JWT_SECRET").unwrap_or_else(|| {
            warn!("POLLS_JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        let config = Self {
            database_url: try_load("DATABASE_URL", "approval_polls.db")?,
            host: try_load("POLLS_HOST", "0.0.0.0")?,
            port: try_load("POLLS_PORT", "3000")?,
            db_pool_size: try_load("POLLS_DB_POOL_SIZE", "8")?,
            page_size: try_load("POLLS_PAGE_SIZE", "5")?,
            choice_slots: try_load("POLLS_CHOICE_SLOTS", "10")?,
            jwt_secret,
            login_url: try_load("POLLS_LOGIN_URL", "/accounts/login/")?,
            public_url: var("POLLS_PUBLIC_URL").map(|url| url.trim_end_matches('/').to_string()),
            static_dir: try_load("POLLS_STATIC_DIR", "static")?,
        };

        if config.page_size < 1 {
            anyhow::bail!("POLLS_PAGE_SIZE must be at least 1, got {}", config.page_size);
        }
        if config.choice_slots < 1 {
            anyhow::bail!("POLLS_CHOICE_SLOTS must be at least 1, got {}", config.choice_slots);
        }
        if config.db_pool_size < 1 {
            anyhow::bail!("POLLS_DB_POOL_SIZE must be at least 1, got {}", config.db_pool_size);
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::from("approval_polls.db"),
            host: String::from("0.0.0.0"),
            port: 3000,
            db_pool_size: 8,
            page_size: 5,
            choice_slots: 10,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            login_url: String::from("/accounts/login/"),
            public_url: None,
            static_dir: PathBuf::from("static"),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}"))
}
