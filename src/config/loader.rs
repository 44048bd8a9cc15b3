use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Starter configuration written by `nado init`.
pub const STARTER_CONFIG: &str = include_str!("starter.toml");

/// Load configuration from a file using the config crate
/// Supports multiple formats: YAML, JSON, TOML, etc.
///
/// Scalar settings can be overridden from the environment with the `NADO_`
/// prefix and `__` as the nesting separator (e.g. `NADO_AUTH__LOGIN_URL`).
pub async fn load_config(config_path: &str) -> Result<ServerConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<ServerConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml,
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .add_source(
            Environment::with_prefix("NADO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let server_config: ServerConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(server_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::core::route::Visibility;

    #[tokio::test]
    async fn test_load_toml_config_keeps_route_order() {
        let toml_content = r#"
listen_addr = "127.0.0.1:5000"

[auth]
login_url = "/login"

[[routes]]
pattern = '/api/v1/plan/(\w+)'
handler = "documents"
config = { collection = "plans" }

[[routes]]
pattern = "/api/v1/plan/?"
handler = "documents"
config = { collection = "plans" }
public = ["/api/v2/plan/?"]

[[routes]]
pattern = "/signin"
handler = "signin"
authenticated = false
"#;

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:5000");
        assert_eq!(config.auth.login_url, "/login");
        assert_eq!(config.auth.session_cookie, "user");

        let patterns: Vec<_> = config.routes.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec![r"/api/v1/plan/(\w+)", "/api/v1/plan/?", "/signin"]);
        assert_eq!(config.routes[1].public, vec!["/api/v2/plan/?".to_string()]);
        assert_eq!(config.routes[0].visibility, Visibility::Private);
        assert!(config.routes[0].authenticated);
        assert!(!config.routes[2].authenticated);
    }

    #[tokio::test]
    async fn test_load_yaml_config() {
        let yaml_content = r#"
listen_addr: "127.0.0.1:3000"
routes:
  - pattern: "/connection-test"
    handler: "connection_test"
    authenticated: false
  - pattern: "/api/v2/export/?"
    handler: "documents"
    visibility: "public"
    config:
      collection: "exports"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[1].visibility, Visibility::Public);
        assert_eq!(
            config.routes[1].config.get("collection"),
            Some(&serde_json::json!("exports"))
        );
    }
}
