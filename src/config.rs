use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};

use crate::{cache::DEFAULT_TTL, slot::SameSlotPolicy};

/// Relay used for outgoing notification mail.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub cache_ttl: Duration,
    pub mail: Option<MailConfig>,
    pub same_slot: SameSlotPolicy,
}

impl Config {
    /// Reads the process environment, after `.env` has been loaded.
    pub fn from_env() -> anyhow::Result<Config> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let database_url = var("DATABASE_URL").ok_or(anyhow!("DATABASE_URL is not set"))?;
        let jwt_secret = var("JWT_SECRET_KEY")
            .filter(|secret| !secret.is_empty())
            .ok_or(anyhow!("JWT_SECRET_KEY is not set"))?;

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:5000".to_owned())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let cache_ttl = match var("CACHE_DEFAULT_TIMEOUT") {
            Some(secs) => Duration::from_secs(
                secs.parse().context("CACHE_DEFAULT_TIMEOUT must be a number of seconds")?,
            ),
            None => DEFAULT_TTL,
        };

        let mail = match var("MAIL_API_URL") {
            Some(api_url) => Some(MailConfig {
                api_url,
                api_key: var("MAIL_API_KEY"),
                sender: var("MAIL_DEFAULT_SENDER")
                    .ok_or(anyhow!("MAIL_DEFAULT_SENDER is required with MAIL_API_URL"))?,
            }),
            None => None,
        };

        let same_slot = match var("RESCHEDULE_SAME_SLOT") {
            Some(policy) => SameSlotPolicy::from_str(&policy)?,
            None => SameSlotPolicy::default(),
        };

        Ok(Config {
            database_url,
            jwt_secret,
            bind_addr,
            cache_ttl,
            mail,
            same_slot,
        })
    }
}
