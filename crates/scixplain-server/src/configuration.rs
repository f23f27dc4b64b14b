use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use scixplain::communicator::{CommunicatorConfig, DEFAULT_MODEL, DEFAULT_TOKEN_LIMIT};
use scixplain::datasources::wiki::{WikiConfig, WIKIPEDIA_HOST};
use scixplain::prompt_template::{read_prompt_file, DEFAULT_SYSTEM_TEMPLATE};
use scixplain::providers::configs::OpenAiProviderConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ProviderSettings {
    pub fn into_config(self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: self.host,
            api_key: self.api_key,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WikiSettings {
    #[serde(default = "default_wiki_host")]
    pub host: String,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for WikiSettings {
    fn default() -> Self {
        Self {
            host: default_wiki_host(),
            search_limit: default_search_limit(),
        }
    }
}

impl WikiSettings {
    pub fn into_config(self) -> WikiConfig {
        WikiConfig {
            host: self.host,
            search_limit: self.search_limit,
            ..WikiConfig::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommunicatorSettings {
    #[serde(default = "default_n_pages")]
    pub n_pages: usize,
    #[serde(default = "default_n_sections")]
    pub n_sections: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
    #[serde(default = "default_search_terms_max_tokens")]
    pub search_terms_max_tokens: i32,
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_answers_dir")]
    pub answers_dir: String,
    /// Path to a system prompt template replacing the built-in one
    #[serde(default)]
    pub system_template: Option<String>,
}

impl Default for CommunicatorSettings {
    fn default() -> Self {
        Self {
            n_pages: default_n_pages(),
            n_sections: default_n_sections(),
            max_tokens: default_max_tokens(),
            search_terms_max_tokens: default_search_terms_max_tokens(),
            token_limit: default_token_limit(),
            max_tool_rounds: default_max_tool_rounds(),
            answers_dir: default_answers_dir(),
            system_template: None,
        }
    }
}

impl CommunicatorSettings {
    /// Resolve paths and read the template file, if one is configured
    pub fn into_config(self, model: String) -> anyhow::Result<CommunicatorConfig> {
        let system_template = match &self.system_template {
            Some(path) => read_prompt_file(expand_path(path))?,
            None => DEFAULT_SYSTEM_TEMPLATE.to_string(),
        };

        Ok(CommunicatorConfig {
            model,
            n_pages: self.n_pages,
            n_sections: self.n_sections,
            max_tokens: self.max_tokens,
            search_terms_max_tokens: self.search_terms_max_tokens,
            token_limit: self.token_limit,
            max_tool_rounds: self.max_tool_rounds,
            answers_dir: expand_path(&self.answers_dir),
            system_template,
        })
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub wiki: WikiSettings,
    #[serde(default)]
    pub communicator: CommunicatorSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            .add_source(
                Environment::with_prefix("SCIXPLAIN")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Handle both NotFound and missing field message variants
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // "missing field `api_key`" only names the leaf, every required field lives under provider
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(&format!("provider.{}", field)),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_wiki_host() -> String {
    WIKIPEDIA_HOST.to_string()
}

fn default_search_limit() -> usize {
    10
}

fn default_n_pages() -> usize {
    1
}

fn default_n_sections() -> usize {
    3
}

fn default_max_tokens() -> i32 {
    300
}

fn default_search_terms_max_tokens() -> i32 {
    50
}

fn default_token_limit() -> usize {
    DEFAULT_TOKEN_LIMIT
}

fn default_max_tool_rounds() -> usize {
    5
}

fn default_answers_dir() -> String {
    "./answers".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("SCIXPLAIN_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("SCIXPLAIN_PROVIDER__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.cors_origins, vec!["*"]);
        assert_eq!(settings.server.request_timeout(), Duration::from_secs(120));

        assert_eq!(settings.provider.host, "https://api.openai.com");
        assert_eq!(settings.provider.api_key, "test-key");
        assert_eq!(settings.provider.model, "gpt-4o");
        assert_eq!(settings.provider.temperature, None);

        assert_eq!(settings.wiki.host, "https://en.wikipedia.org");
        assert_eq!(settings.communicator.n_pages, 1);
        assert_eq!(settings.communicator.n_sections, 3);
        assert_eq!(settings.communicator.max_tokens, 300);
        assert_eq!(settings.communicator.token_limit, 50_000);
        assert_eq!(settings.communicator.max_tool_rounds, 5);

        env::remove_var("SCIXPLAIN_PROVIDER__API_KEY");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("SCIXPLAIN_SERVER__PORT", "8080");
        env::set_var("SCIXPLAIN_SERVER__CORS_ORIGINS", "http://localhost:3000,https://example.com");
        env::set_var("SCIXPLAIN_PROVIDER__API_KEY", "test-key");
        env::set_var("SCIXPLAIN_PROVIDER__HOST", "https://custom.openai.com");
        env::set_var("SCIXPLAIN_PROVIDER__MODEL", "gpt-4");
        env::set_var("SCIXPLAIN_PROVIDER__TEMPERATURE", "0.8");
        env::set_var("SCIXPLAIN_COMMUNICATOR__N_PAGES", "3");
        env::set_var("SCIXPLAIN_COMMUNICATOR__MAX_TOOL_ROUNDS", "2");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(
            settings.server.cors_origins,
            vec!["http://localhost:3000", "https://example.com"]
        );
        assert_eq!(settings.provider.host, "https://custom.openai.com");
        assert_eq!(settings.provider.model, "gpt-4");
        assert_eq!(settings.provider.temperature, Some(0.8));
        assert_eq!(settings.communicator.n_pages, 3);
        assert_eq!(settings.communicator.max_tool_rounds, 2);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        clean_env();

        let err = Settings::new().unwrap_err();
        match err {
            ConfigError::MissingEnvVar { env_var } => {
                assert_eq!(env_var, "SCIXPLAIN_PROVIDER__API_KEY")
            }
            other => panic!("Expected MissingEnvVar, got {:?}", other),
        }
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 8000,
            ..ServerSettings::default()
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn test_communicator_settings_with_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("system.md");
        std::fs::write(&template, "{{ data }} for a {{ age }} year old").unwrap();

        let settings = CommunicatorSettings {
            system_template: Some(template.display().to_string()),
            answers_dir: dir.path().join("answers").display().to_string(),
            ..CommunicatorSettings::default()
        };
        let config = settings.into_config("gpt-4o".to_string()).unwrap();

        assert_eq!(config.system_template, "{{ data }} for a {{ age }} year old");
        assert_eq!(config.answers_dir, dir.path().join("answers"));
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn test_communicator_settings_missing_template_file() {
        let settings = CommunicatorSettings {
            system_template: Some("/nonexistent/system.md".to_string()),
            ..CommunicatorSettings::default()
        };
        assert!(settings.into_config("gpt-4o".to_string()).is_err());
    }
}
