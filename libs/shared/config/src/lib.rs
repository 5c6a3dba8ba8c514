use std::env;
use tracing::warn;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub seed_demo_doctors: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            seed_demo_doctors: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            host: env::var("HOST")
                .unwrap_or_else(|_| {
                    warn!("HOST not set, using default {}", DEFAULT_HOST);
                    DEFAULT_HOST.to_string()
                }),
            port: match env::var("PORT") {
                Ok(raw) => raw.parse().unwrap_or_else(|_| {
                    warn!("PORT '{}' is not a valid port, using default {}", raw, DEFAULT_PORT);
                    DEFAULT_PORT
                }),
                Err(_) => {
                    warn!("PORT not set, using default {}", DEFAULT_PORT);
                    DEFAULT_PORT
                }
            },
            seed_demo_doctors: env::var("SEED_DEMO_DOCTORS")
                .map(|raw| parse_flag(&raw))
                .unwrap_or(false),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - empty host");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
