use std::env;

use crate::pricing::DeliveryPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub delivery: DeliveryPolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let delivery = DeliveryPolicy {
            flat_charge: parse_amount("DELIVERY_CHARGE")?.unwrap_or(0),
            free_above: parse_amount("FREE_DELIVERY_ABOVE")?,
        };
        Ok(Self {
            port,
            database_url,
            host,
            delivery,
        })
    }
}

// Amounts are minor currency units and must not be negative.
fn parse_amount(key: &str) -> anyhow::Result<Option<i64>> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            let value: i64 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{key} must be an integer amount"))?;
            if value < 0 {
                anyhow::bail!("{key} must not be negative");
            }
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}
