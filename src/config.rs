use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub api_bearer_token: String,
    pub ringba_api_key: Option<String>,
    pub ringba_campaign_id: Option<String>,
    pub ringba_ping_url: String,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            api_bearer_token: std::env::var("API_BEARER_TOKEN")
                .map_err(|_| anyhow::anyhow!("API_BEARER_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("API_BEARER_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            ringba_api_key: std::env::var("RINGBA_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            ringba_campaign_id: std::env::var("RINGBA_CAMPAIGN_ID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            ringba_ping_url: std::env::var("RINGBA_PING_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "https://api.ringba.com/ping".to_string()),
            rate_limit_per_second: std::env::var("RATE_LIMIT_PER_SECOND")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_PER_SECOND must be a number"))?,
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_BURST must be a number"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Ringba ping URL: {}", config.ringba_ping_url);
        tracing::debug!("Server Port: {}", config.port);
        if config.ringba_api_key.is_none() || config.ringba_campaign_id.is_none() {
            tracing::warn!(
                "Ringba credentials not fully configured; ping triggers will return 500"
            );
        }

        Ok(config)
    }
}
