use crate::error::{Result, SubtransError};
use crate::language::{LanguageCode, LanguageResolver, SourceLanguage, DEFAULT_LANGUAGE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Self-hosted NLLB-style HTTP server.
    #[default]
    #[serde(rename = "local_nllb")]
    LocalServer,
    /// Hosted inference API with bearer-token auth.
    #[serde(rename = "huggingface")]
    HostedInference,
    /// Generative model prompted with numbered lines.
    #[serde(rename = "gemini")]
    Generative,
    /// Commercial machine translation API.
    #[serde(rename = "deepl")]
    CommercialMt,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::LocalServer,
        BackendKind::HostedInference,
        BackendKind::Generative,
        BackendKind::CommercialMt,
    ];

    /// Registry key.
    pub fn key(&self) -> &'static str {
        match self {
            BackendKind::LocalServer => "local_nllb",
            BackendKind::HostedInference => "huggingface",
            BackendKind::Generative => "gemini",
            BackendKind::CommercialMt => "deepl",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, BackendKind::LocalServer)
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            BackendKind::LocalServer => "http://localhost:8080/translate",
            BackendKind::HostedInference => "https://api-inference.huggingface.co",
            BackendKind::Generative => "https://generativelanguage.googleapis.com",
            BackendKind::CommercialMt => "https://api-free.deepl.com",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local_nllb" | "local" | "nllb" => Ok(BackendKind::LocalServer),
            "huggingface" | "hf" => Ok(BackendKind::HostedInference),
            "gemini" => Ok(BackendKind::Generative),
            "deepl" => Ok(BackendKind::CommercialMt),
            _ => Err(format!(
                "Unknown backend: {}. Use 'local_nllb', 'huggingface', 'gemini', or 'deepl'",
                s
            )),
        }
    }
}

/// Settings for one translation session. Built once and shared read-only.
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub backend: BackendKind,
    /// Base URL override. Backends fall back to their default endpoint.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub batch_size: usize,
    /// Applies to every individual network call.
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub source_language: SourceLanguage,
    pub target_language: LanguageCode,
    /// Substituted when detection fails.
    pub default_language: LanguageCode,
    pub prompt_template: Option<String>,
    pub tone: Option<String>,
}

impl TranslationConfig {
    pub fn new(backend: BackendKind, target_language: LanguageCode) -> Self {
        Self {
            backend,
            endpoint: None,
            api_key: None,
            model: None,
            batch_size: 5,
            timeout: Duration::from_secs(300),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            source_language: SourceLanguage::Auto,
            target_language,
            default_language: LanguageCode::new(DEFAULT_LANGUAGE),
            prompt_template: None,
            tone: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_source_language(mut self, source: SourceLanguage) -> Self {
        self.source_language = source;
        self
    }

    pub fn with_default_language(mut self, code: LanguageCode) -> Self {
        self.default_language = code;
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }

    /// Endpoint to use: the override or the backend default.
    pub fn endpoint_or_default(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.backend.default_endpoint())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SubtransError::Config(
                "Batch size must be greater than 0".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(SubtransError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persisted user settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub huggingface_api_key: Option<String>,
    pub deepl_api_key: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub source_language: String,
    pub target_language: String,
    pub default_language: String,
    pub prompt_template: Option<String>,
    pub tone: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            endpoint: None,
            model: None,
            gemini_api_key: None,
            huggingface_api_key: None,
            deepl_api_key: None,
            batch_size: 5,
            timeout_secs: 300,
            max_retries: 3,
            retry_delay_secs: 5,
            source_language: "auto".to_string(),
            target_language: "nld_Latn".to_string(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            prompt_template: None,
            tone: None,
        }
    }
}

impl Config {
    /// Load from the default config file, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a specific file. A file that fails to parse yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        match toml::from_str::<Config>(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path().ok_or_else(|| {
            SubtransError::Config("No configuration directory available".to_string())
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SubtransError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(backend) = lookup("SUBTRANS_BACKEND").and_then(|b| b.parse().ok()) {
            self.backend = backend;
        }
        if let Some(endpoint) = lookup("SUBTRANS_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")) {
            self.gemini_api_key = Some(key);
        }
        if let Some(key) = lookup("HF_API_TOKEN") {
            self.huggingface_api_key = Some(key);
        }
        if let Some(key) = lookup("DEEPL_API_KEY") {
            self.deepl_api_key = Some(key);
        }
        if let Some(key) = lookup("SUBTRANS_API_KEY") {
            self.set_api_key(self.backend, key);
        }
        if let Some(target) = lookup("SUBTRANS_TARGET_LANG") {
            self.target_language = target;
        }
        if let Some(size) = lookup("SUBTRANS_BATCH_SIZE").and_then(|s| s.parse().ok()) {
            self.batch_size = size;
        }
    }

    pub fn api_key(&self, backend: BackendKind) -> Option<&str> {
        match backend {
            BackendKind::LocalServer => None,
            BackendKind::HostedInference => self.huggingface_api_key.as_deref(),
            BackendKind::Generative => self.gemini_api_key.as_deref(),
            BackendKind::CommercialMt => self.deepl_api_key.as_deref(),
        }
    }

    pub fn set_api_key(&mut self, backend: BackendKind, key: String) {
        match backend {
            BackendKind::LocalServer => {}
            BackendKind::HostedInference => self.huggingface_api_key = Some(key),
            BackendKind::Generative => self.gemini_api_key = Some(key),
            BackendKind::CommercialMt => self.deepl_api_key = Some(key),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.requires_api_key() && self.api_key(self.backend).is_none() {
            return Err(SubtransError::Config(format!(
                "No API key configured for backend '{}'",
                self.backend
            )));
        }

        if self.batch_size == 0 {
            return Err(SubtransError::Config(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the immutable session config, resolving language names.
    pub fn translation_config(&self) -> Result<TranslationConfig> {
        let resolver = LanguageResolver::default();
        let resolve = |input: &str| {
            resolver
                .resolve(input)
                .ok_or_else(|| SubtransError::UnknownLanguage(input.to_string()))
        };

        let source = if self.source_language.eq_ignore_ascii_case("auto") {
            SourceLanguage::Auto
        } else {
            SourceLanguage::Code(resolve(&self.source_language)?)
        };

        let mut config = TranslationConfig::new(self.backend, resolve(&self.target_language)?)
            .with_source_language(source)
            .with_default_language(resolve(&self.default_language)?)
            .with_batch_size(self.batch_size)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retries(self.max_retries, Duration::from_secs(self.retry_delay_secs));

        config.endpoint = self.endpoint.clone();
        config.model = self.model.clone();
        config.api_key = self.api_key(self.backend).map(str::to_string);
        config.prompt_template = self.prompt_template.clone();
        config.tone = self.tone.clone();

        config.validate()?;
        Ok(config)
    }

    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("subtrans").join("config.toml"))
    }
}
