/// Process configuration, read once at startup. The engine and orchestrator
/// never touch the environment; whatever they need flows in from here.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub allow_memory_store: bool,
    pub persistence_enabled: bool,
    pub cors_origins: Vec<String>,
    pub production: bool,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = std::env::var("PORT").unwrap_or_else(|_| "8080".into());
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{}", port));
        let production = std::env::var("RUST_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);
        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_default(),
        );
        if production && cors_origins.is_empty() {
            anyhow::bail!("CORS_ORIGINS must be set in production");
        }
        if production && cors_origins.iter().any(|o| o == "*") {
            anyhow::bail!("wildcard CORS origin is not allowed in production");
        }
        Ok(Self {
            bind_addr,
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            allow_memory_store: truthy(
                &std::env::var("ALLOW_IN_MEMORY_ROOM_STORE").unwrap_or_default(),
            ),
            persistence_enabled: truthy(
                &std::env::var("ENABLE_DB_PERSISTENCE").unwrap_or_default(),
            ),
            cors_origins,
            production,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn truthy(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn origins_split_and_trim() {
        assert_eq!(
            parse_origins("https://a.example , https://b.example,"),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(parse_origins("").is_empty());
    }
    #[test]
    fn truthy_flags() {
        assert!(truthy("true"));
        assert!(truthy(" 1 "));
        assert!(truthy("YES"));
        assert!(!truthy("false"));
        assert!(!truthy(""));
    }
}
