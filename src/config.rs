use anyhow::{anyhow, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A parsed target: model@backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub model: String,
    pub backend: String,
}

impl Target {
    /// Parse a target string like "gpt-4@chatgpt" into model and backend
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.rsplitn(2, '@').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            Some(Target {
                model: parts[1].to_string(),
                backend: parts[0].to_string(),
            })
        } else {
            None
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.model, self.backend)
    }
}

/// Wire protocol spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAiCompatible,
    Anthropic,
}

/// Configuration for a single backend (API provider)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl BackendConfig {
    /// Resolve the API key from config or environment
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        // Direct key takes priority
        if let Some(key) = &self.api_key {
            return Some(SecretString::from(key.clone()));
        }
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
            .map(SecretString::from)
    }

    pub fn kind(&self) -> BackendKind {
        if self.base_url.contains("anthropic") {
            BackendKind::Anthropic
        } else {
            BackendKind::OpenAiCompatible
        }
    }
}

/// Mailbox access for both directions
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default = "default_imap_host")]
    pub imap_host: String,
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    #[serde(default = "default_subject_filter")]
    pub subject_filter: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    /// Where the digest goes; defaults to `address`
    #[serde(default)]
    pub recipient: Option<String>,
}

fn default_password_env() -> String {
    "EMAIL_PASSWORD".to_string()
}
fn default_imap_host() -> String {
    "imap.gmail.com".to_string()
}
fn default_imap_port() -> u16 {
    993
}
fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}
fn default_smtp_port() -> u16 {
    465
}
fn default_mailbox() -> String {
    "INBOX".to_string()
}
fn default_subject_filter() -> String {
    "ChatBot".to_string()
}
fn default_sender_name() -> String {
    "Messej".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            address: None,
            password_env: default_password_env(),
            imap_host: default_imap_host(),
            imap_port: default_imap_port(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            mailbox: default_mailbox(),
            subject_filter: default_subject_filter(),
            sender_name: default_sender_name(),
            recipient: None,
        }
    }
}

impl MailConfig {
    pub fn address(&self) -> Result<&str> {
        self.address
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| anyhow!("No mail address configured (set EMAIL_ADDRESS)"))
    }

    pub fn password(&self) -> Result<SecretString> {
        std::env::var(&self.password_env)
            .ok()
            .filter(|p| !p.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| anyhow!("No mail password found in ${}", self.password_env))
    }

    pub fn recipient(&self) -> Result<&str> {
        match self.recipient.as_deref() {
            Some(r) if !r.is_empty() => Ok(r),
            _ => self.address(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "default_news_url")]
    pub base_url: String,
    #[serde(default = "default_news_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_news_url() -> String {
    "https://newsapi.org/v2".to_string()
}
fn default_news_key_env() -> String {
    "NEWS_API_KEY".to_string()
}
fn default_country() -> String {
    "us".to_string()
}
fn default_page_size() -> usize {
    5
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: default_news_url(),
            api_key_env: default_news_key_env(),
            country: default_country(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_geo_url")]
    pub geo_url: String,
    #[serde(default = "default_weather_url")]
    pub weather_url: String,
    #[serde(default = "default_weather_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_units")]
    pub units: String,
}

fn default_geo_url() -> String {
    "http://api.openweathermap.org/geo/1.0/direct".to_string()
}
fn default_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5/weather".to_string()
}
fn default_weather_key_env() -> String {
    "WEATHER_API_KEY".to_string()
}
fn default_units() -> String {
    "metric".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geo_url: default_geo_url(),
            weather_url: default_weather_url(),
            api_key_env: default_weather_key_env(),
            units: default_units(),
        }
    }
}

/// Where run state lives on disk
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_profile_path")]
    pub profile_path: PathBuf,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Prometheus text exposition written at the end of a run
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
}

fn default_profile_path() -> PathBuf {
    PathBuf::from("chatbot_memory.json")
}
fn default_log_path() -> PathBuf {
    PathBuf::from("chat_log.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profile_path: default_profile_path(),
            log_path: default_log_path(),
            metrics_path: None,
        }
    }
}

/// Read a secret named by an environment variable, if set and non-empty
pub fn secret_from_env(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

/// Shape of a config file on disk. Sections present in a file replace the
/// earlier value wholesale; maps are merged key by key.
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    mail: Option<MailConfig>,
    #[serde(default)]
    backends: HashMap<String, BackendConfig>,
    #[serde(default)]
    routing: HashMap<String, String>,
    #[serde(default)]
    news: Option<NewsConfig>,
    #[serde(default)]
    weather: Option<WeatherConfig>,
    #[serde(default)]
    storage: Option<StorageConfig>,
}

/// Main configuration structure, built once at startup
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub mail: MailConfig,
    pub backends: HashMap<String, BackendConfig>,
    /// task name -> target string overrides
    pub routing: HashMap<String, String>,
    pub news: NewsConfig,
    pub weather: WeatherConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Create config with built-in default backends for all known providers
    pub fn with_builtin_backends() -> Self {
        let mut backends = HashMap::new();

        backends.insert(
            "chatgpt".to_string(),
            BackendConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key_env: Some("OPENAI_API_KEY".to_string()),
                api_key: None,
            },
        );

        backends.insert(
            "claude".to_string(),
            BackendConfig {
                base_url: "https://api.anthropic.com/v1".to_string(),
                api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
                api_key: None,
            },
        );

        backends.insert(
            "ollama".to_string(),
            BackendConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key_env: None,
                api_key: None,
            },
        );

        Config {
            backends,
            ..Config::default()
        }
    }

    /// Load configuration from default paths, then the environment.
    /// Priority: explicit path > project (./messej.toml) > user (~/.messej/config.toml)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::with_builtin_backends();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".messej").join("config.toml");
            if user_config.exists() {
                config.merge(Self::read_file(&user_config)?);
            }
        }

        let project_config = Path::new("messej.toml");
        if project_config.exists() {
            config.merge(Self::read_file(project_config)?);
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            config.merge(Self::read_file(path)?);
        }

        config.apply_env(|var| std::env::var(var).ok());
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<ConfigFile> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| anyhow!("{}: {}", path.display(), e))
    }

    fn parse(content: &str) -> Result<ConfigFile> {
        Ok(toml::from_str(content)?)
    }

    fn merge(&mut self, other: ConfigFile) {
        for (name, backend) in other.backends {
            self.backends.insert(name, backend);
        }
        for (task, target) in other.routing {
            self.routing.insert(task, target);
        }
        if let Some(mail) = other.mail {
            self.mail = mail;
        }
        if let Some(news) = other.news {
            self.news = news;
        }
        if let Some(weather) = other.weather {
            self.weather = weather;
        }
        if let Some(storage) = other.storage {
            self.storage = storage;
        }
    }

    /// Environment variables override file settings
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |var: &str| lookup(var).filter(|v| !v.is_empty());
        if let Some(address) = lookup("EMAIL_ADDRESS") {
            self.mail.address = Some(address);
        }
        if let Some(host) = lookup("IMAP_HOST") {
            self.mail.imap_host = host;
        }
        if let Some(host) = lookup("SMTP_HOST") {
            self.mail.smtp_host = host;
        }
    }

    pub fn backend(&self, name: &str) -> Result<&BackendConfig> {
        self.backends
            .get(name)
            .ok_or_else(|| anyhow!("Unknown backend '{}'", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        let target = Target::parse("gpt-4@chatgpt").unwrap();
        assert_eq!(target.model, "gpt-4");
        assert_eq!(target.backend, "chatgpt");

        // Model with @ in the name
        let target = Target::parse("model@with@signs@backend").unwrap();
        assert_eq!(target.model, "model@with@signs");
        assert_eq!(target.backend, "backend");

        assert!(Target::parse("no-backend").is_none());
        assert!(Target::parse("model@").is_none());
    }

    #[test]
    fn test_target_display() {
        let target = Target {
            model: "gpt-4o-mini".to_string(),
            backend: "chatgpt".to_string(),
        };
        assert_eq!(format!("{}", target), "gpt-4o-mini@chatgpt");
    }

    #[test]
    fn test_backend_kind() {
        let config = Config::with_builtin_backends();
        assert_eq!(
            config.backend("claude").unwrap().kind(),
            BackendKind::Anthropic
        );
        assert_eq!(
            config.backend("ollama").unwrap().kind(),
            BackendKind::OpenAiCompatible
        );
        assert!(config.backend("nope").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::with_builtin_backends();
        assert_eq!(config.mail.subject_filter, "ChatBot");
        assert_eq!(config.mail.smtp_port, 465);
        assert_eq!(config.news.page_size, 5);
        assert_eq!(config.weather.units, "metric");
        assert_eq!(config.storage.profile_path, PathBuf::from("chatbot_memory.json"));
    }

    #[test]
    fn test_merge_file() {
        let mut config = Config::with_builtin_backends();
        let file = Config::parse(
            r#"
[mail]
address = "me@example.com"
subject_filter = "Digest"

[routing]
compose = "claude-3-5-sonnet-latest@claude"

[backends.local]
base_url = "http://127.0.0.1:8080/v1"
"#,
        )
        .unwrap();
        config.merge(file);

        assert_eq!(config.mail.address.as_deref(), Some("me@example.com"));
        assert_eq!(config.mail.subject_filter, "Digest");
        assert_eq!(config.mail.imap_host, "imap.gmail.com");
        assert_eq!(
            config.routing.get("compose").map(String::as_str),
            Some("claude-3-5-sonnet-latest@claude")
        );
        assert!(config.backends.contains_key("local"));
        assert!(config.backends.contains_key("chatgpt"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::with_builtin_backends();
        config.mail.address = Some("file@example.com".into());
        config.apply_env(|var| match var {
            "EMAIL_ADDRESS" => Some("env@example.com".into()),
            "SMTP_HOST" => Some("smtp.example.com".into()),
            "IMAP_HOST" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.mail.address.as_deref(), Some("env@example.com"));
        assert_eq!(config.mail.smtp_host, "smtp.example.com");
        assert_eq!(config.mail.imap_host, "imap.gmail.com");
    }

    #[test]
    fn test_recipient_defaults_to_address() {
        let mut mail = MailConfig::default();
        assert!(mail.recipient().is_err());
        mail.address = Some("me@example.com".into());
        assert_eq!(mail.recipient().unwrap(), "me@example.com");
        mail.recipient = Some("friend@example.com".into());
        assert_eq!(mail.recipient().unwrap(), "friend@example.com");
    }

    #[test]
    fn test_direct_api_key_wins() {
        let backend = BackendConfig {
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: Some("MESSEJ_TEST_UNSET_KEY".into()),
            api_key: Some("sk-direct".into()),
        };
        assert!(backend.resolve_api_key().is_some());

        let backend = BackendConfig {
            api_key: None,
            ..backend
        };
        assert!(backend.resolve_api_key().is_none());
    }
}
