//! Configuration loading for the gateway.
//!
//! Loads [`GatewayConfig`] from a YAML file on disk, falling back to
//! defaults when no file is specified, then applies environment variable
//! overrides for the backend and credential surface (the pieces that vary
//! per deployment and usually arrive via `.env`).

use promptgate_core::GatewayConfig;
use std::path::Path;
use tracing::warn;

/// Load a [`GatewayConfig`] from a YAML file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn load_config(path: &Path) -> anyhow::Result<GatewayConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: GatewayConfig = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {}", e))?;
    Ok(config)
}

/// Apply environment variable overrides on top of a loaded configuration.
///
/// Recognized variables: `APP_ENV`, `OPENAI_API_KEY`, `OPENAI_BASE_URL`,
/// `OLLAMA_BASE_URL`, `DATABASE_URL`, `RISK_THRESHOLD`.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    if let Ok(v) = std::env::var("APP_ENV") {
        config.environment = v;
    }
    if let Ok(v) = std::env::var("OPENAI_API_KEY") {
        config.openai_api_key = v;
    }
    if let Ok(v) = std::env::var("OPENAI_BASE_URL") {
        config.openai_base_url = v;
    }
    if let Ok(v) = std::env::var("OLLAMA_BASE_URL") {
        config.ollama_base_url = v;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        config.database_url = v;
    }
    if let Ok(v) = std::env::var("RISK_THRESHOLD") {
        match v.parse::<f64>() {
            Ok(threshold) => config.risk_threshold = threshold,
            Err(_) => warn!(value = %v, "Ignoring non-numeric RISK_THRESHOLD"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(yaml: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_config_minimal() {
        let yaml = r#"
listen_addr: "127.0.0.1:9090"
ollama_base_url: "http://localhost:11434"
risk_threshold: 60
"#;
        let f = write_yaml(yaml);
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.risk_threshold, 60.0);
        // Unspecified fields fall back to defaults.
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/config.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let f = write_yaml("not: [valid: yaml: {{{}}}");
        let result = load_config(f.path());
        assert!(result.is_err());
    }
}
