use conduit_protocol::chunk::Environment;
use serde::Deserialize;
use std::io;
use std::path::Path;

/// Which version-translation unit this proxy instance applies. One unit per
/// running proxy; wider gaps are covered by chaining proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationUnit {
    /// Text components: JSON strings to tag trees.
    Text,
    /// Terrain: chunk packets re-encoded per environment.
    World,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address clients connect to.
    pub listen_addr: String,
    /// Address of the server being fronted.
    pub upstream_addr: String,
    /// Default environment for connections, until a join packet overrides it.
    pub environment: String,
    pub unit: TranslationUnit,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:25565".to_string(),
            upstream_addr: "127.0.0.1:25566".to_string(),
            environment: "normal".to_string(),
            unit: TranslationUnit::Text,
        }
    }
}

impl ProxyConfig {
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Loads the config file if present, falling back to defaults otherwise.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(_) => Self::default(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
            .parse()
            .unwrap_or(Environment::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:25565");
        assert_eq!(config.unit, TranslationUnit::Text);
        assert_eq!(config.environment(), Environment::Normal);
    }

    #[test]
    fn test_parse_overrides() {
        let config: ProxyConfig = serde_json::from_str(
            r#"{"listen_addr": "127.0.0.1:7777", "unit": "world", "environment": "nether"}"#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:7777");
        assert_eq!(config.upstream_addr, "127.0.0.1:25566");
        assert_eq!(config.unit, TranslationUnit::World);
        assert_eq!(config.environment(), Environment::Nether);
    }

    #[test]
    fn test_unknown_environment_falls_back_to_normal() {
        let config: ProxyConfig =
            serde_json::from_str(r#"{"environment": "moon"}"#).unwrap();
        assert_eq!(config.environment(), Environment::Normal);
    }
}
