//! Environment-based configuration

use serde::Deserialize;
use std::env;

use crate::error::BillingError;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Switches to attach to, `host:port:password` comma separated
    pub freeswitch_servers: Vec<FreeSwitchServer>,
    /// Base URL of the dashboard collaborator API; None disables publication
    pub dashboard_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeSwitchServer {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl FreeSwitchServer {
    pub fn server_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, BillingError> {
        dotenvy::dotenv().ok();

        let freeswitch_servers =
            Self::parse_freeswitch_servers(&env::var("FREESWITCH_SERVERS").unwrap_or_default())?;

        Ok(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "9000".to_string())
                .parse()
                .map_err(|e| BillingError::InvalidInput(format!("PORT: {}", e)))?,
            dashboard_url: env::var("DASHBOARD_URL").ok().filter(|s| !s.is_empty()),
            freeswitch_servers,
        })
    }

    fn parse_freeswitch_servers(servers_str: &str) -> Result<Vec<FreeSwitchServer>, BillingError> {
        if servers_str.is_empty() {
            return Ok(Vec::new());
        }

        let mut servers = Vec::new();

        for server_config in servers_str.split(',') {
            let parts: Vec<&str> = server_config.trim().split(':').collect();
            if parts.len() != 3 {
                return Err(BillingError::InvalidInput(format!(
                    "FREESWITCH_SERVERS entry must be host:port:password, got {:?}",
                    server_config
                )));
            }
            servers.push(FreeSwitchServer {
                host: parts[0].to_string(),
                port: parts[1]
                    .parse()
                    .map_err(|e| BillingError::InvalidInput(format!("port: {}", e)))?,
                password: parts[2].to_string(),
            });
        }

        Ok(servers)
    }
}
