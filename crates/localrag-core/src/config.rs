//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g. `APP_RETRIEVAL__K=6`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

/// Hard cap on attempts for one external call (first try included).
pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub policy: PolicySettings,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub docs_dir: String,
    pub extensions: Vec<String>,
    pub snapshot_path: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            docs_dir: "./docs".to_string(),
            extensions: vec!["txt".to_string(), "md".to_string(), "pdf".to_string()],
            snapshot_path: "./data/index.json".to_string(),
        }
    }
}

impl DataSettings {
    pub fn docs_dir(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.docs_dir) }
    pub fn snapshot_path(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.snapshot_path) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { k: 4 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing, no model required.
    Hash,
    Ollama,
    /// Local sentence-transformers model (requires the `bert` feature).
    Bert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub base_url: String,
    /// Output dimension of the hash backend.
    pub dimension: usize,
    pub model_dir: String,
    pub max_tokens: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model: "all-minilm".to_string(),
            base_url: "http://localhost:11434".to_string(),
            dimension: 384,
            model_dir: "~/models/all-MiniLM-L6-v2".to_string(),
            max_tokens: 256,
            batch_size: 32,
        }
    }
}

impl EmbeddingSettings {
    pub fn model_dir(&self) -> PathBuf { expand_path(&self.model_dir) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub backend: GenerationBackend,
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            backend: GenerationBackend::Ollama,
            model: "llama3".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub embed_timeout_ms: u64,
    pub generate_timeout_ms: u64,
    pub max_attempts: u32,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self { embed_timeout_ms: 30_000, generate_timeout_ms: 120_000, max_attempts: MAX_ATTEMPTS }
    }
}

impl PolicySettings {
    pub fn embed_timeout(&self) -> Duration { Duration::from_millis(self.embed_timeout_ms) }
    pub fn generate_timeout(&self) -> Duration { Duration::from_millis(self.generate_timeout_ms) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Draw a progress bar on stderr while embedding.
    pub progress: bool,
}

impl Settings {
    /// Check every cross-field constraint, reporting all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if let Err(Error::Config(msg)) = self.chunking.validate() {
            problems.push(msg);
        }
        if self.retrieval.k == 0 {
            problems.push("retrieval.k must be greater than 0".to_string());
        }
        if self.embedding.batch_size == 0 {
            problems.push("embedding.batch_size must be greater than 0".to_string());
        }
        if self.embedding.backend == EmbeddingBackend::Hash && self.embedding.dimension == 0 {
            problems.push("embedding.dimension must be greater than 0".to_string());
        }
        if self.policy.embed_timeout_ms == 0 || self.policy.generate_timeout_ms == 0 {
            problems.push("policy timeouts must be greater than 0".to_string());
        }
        if !(1..=MAX_ATTEMPTS).contains(&self.policy.max_attempts) {
            problems.push(format!("policy.max_attempts must be between 1 and {}", MAX_ATTEMPTS));
        }
        if self.data.extensions.is_empty() {
            problems.push("data.extensions must not be empty".to_string());
        }
        if problems.is_empty() { Ok(()) } else { Err(Error::Config(problems.join("; "))) }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> { Self::load_from(Path::new("config.toml")) }

    /// Load `path`, then `config.<RUST_ENV>.toml` next to it, then `APP_*` overrides.
    /// Missing files are skipped.
    pub fn load_from(path: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut figment = Self::defaults().merge(Toml::file(path));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    /// Built-in defaults only, as a base for further merging.
    pub fn defaults() -> Figment { Figment::from(Serialized::defaults(Settings::default())) }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::config(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
