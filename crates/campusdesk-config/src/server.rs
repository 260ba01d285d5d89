use std::env;

/// HTTP listener and metrics exporter settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub metrics_enabled: bool,
    pub log_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            metrics_port: 9090,
            metrics_enabled: true,
            log_dir: "storage/logs".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            metrics_port: env::var("METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metrics_port),
            metrics_enabled: env::var("METRICS_ENABLED")
                .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "off"))
                .unwrap_or(defaults.metrics_enabled),
            log_dir: env::var("LOG_DIR").unwrap_or(defaults.log_dir),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
