use cypherloop_core::config::EngineConfig;

/// Utility for building URLs consistently across engines
pub struct UrlBuilder;

impl UrlBuilder {
    /// Build a complete URL from engine config and path
    pub fn build_url(config: &EngineConfig, path: &str) -> String {
        let base_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        format!(
            "{}://{}:{}{}",
            config.connection.protocol,
            config.connection.hostname,
            config.connection.port,
            base_path
        )
    }

    /// Build URL using the request_path from config
    pub fn build_default_url(config: &EngineConfig) -> String {
        Self::build_url(config, &config.connection.request_path)
    }
}
