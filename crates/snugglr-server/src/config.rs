use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, bail};
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-secret-change-me";
const PLACEHOLDER_SECRETS: &[&str] = &[DEV_JWT_SECRET, "changeme", "change-me", "secret", "your-secret-key"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub development: bool,
    pub token_days: i64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let environment: String = try_load("SNUGGLR_ENV", "development")?;
        let development = match environment.as_str() {
            "development" => true,
            "production" => false,
            other => bail!("SNUGGLR_ENV must be 'development' or 'production', got '{other}'"),
        };

        Ok(Self {
            host: try_load("SNUGGLR_HOST", "0.0.0.0")?,
            port: try_load("SNUGGLR_PORT", "8081")?,
            db_path: try_load("SNUGGLR_DB_PATH", "snugglr.db")?,
            jwt_secret: jwt_secret(development)?,
            development,
            token_days: try_load("SNUGGLR_TOKEN_DAYS", "30")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value '{raw}'"))
}

fn jwt_secret(development: bool) -> anyhow::Result<String> {
    match env::var("SNUGGLR_JWT_SECRET") {
        Ok(secret) if !development && PLACEHOLDER_SECRETS.contains(&secret.as_str()) => {
            bail!("SNUGGLR_JWT_SECRET is a placeholder value; set a real secret in production")
        }
        Ok(secret) if secret.trim().is_empty() => bail!("SNUGGLR_JWT_SECRET is empty"),
        Ok(secret) => Ok(secret),
        Err(_) if development => {
            warn!("SNUGGLR_JWT_SECRET not set, using the development secret");
            Ok(DEV_JWT_SECRET.to_string())
        }
        Err(_) => bail!("SNUGGLR_JWT_SECRET must be set in production"),
    }
}
