//! Process configuration, loaded from the environment once at startup.

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a valid port number")?,
            Err(_) => 8080,
        };
        let nats_url = std::env::var("NATS_URL").ok();
        Ok(Self {
            database_url,
            port,
            nats_url,
        })
    }
}
