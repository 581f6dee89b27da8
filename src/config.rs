//! Configuration loading.
//!
//! Settings come from three layers, applied in order:
//!
//! 1. Built-in defaults (every section and key is optional).
//! 2. An optional TOML file passed with `--config`.
//! 3. Environment overrides (`HOST`, `PORT`, `LLM_MODEL`, `CHUNK_SIZE`, ...).
//!
//! The binary loads a `.env` file from the working directory into the
//! process environment before step 3; variables already set win over the
//! file. The merged result is validated before anything else starts. API
//! keys are never read from the TOML file; see [`gemini_api_key`] and
//! [`openai_api_key`], which also pick them up from `.env`.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//!
//! [document]
//! path = "data/ilaria-instructions.md"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [retrieval]
//! top_k = 4
//! index_path = "faiss_index"
//!
//! [embedding]
//! provider = "local"
//! model = "paraphrase-multilingual-minilm-l12-v2"
//!
//! [llm]
//! provider = "gemini"
//! model = "gemini-2.5-flash"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ilaria_rag_core::generation::GenerationParams;
use ilaria_rag_core::RagSettings;

/// File name of the knowledge-base document inside `DATA_PATH`.
pub const DOCUMENT_FILE_NAME: &str = "ilaria-instructions.md";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentConfig {
    #[serde(default = "default_document_path")]
    pub path: PathBuf,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: default_document_path(),
        }
    }
}

fn default_document_path() -> PathBuf {
    PathBuf::from("data").join(DOCUMENT_FILE_NAME)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_vector_store")]
    pub vector_store: String,
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            vector_store: default_vector_store(),
            index_path: default_index_path(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_vector_store() -> String {
    "flat-l2".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("faiss_index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector size. Derived from the model name for the local provider.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "paraphrase-multilingual-minilm-l12-v2".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Override for the provider's base URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            url: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_timeout() -> u64 {
    60
}

impl Config {
    /// Settings handed to the retrieval orchestrator.
    pub fn rag_settings(&self) -> RagSettings {
        RagSettings {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            top_k: self.retrieval.top_k,
            generation: GenerationParams {
                temperature: self.llm.temperature,
                max_tokens: self.llm.max_tokens,
            },
        }
    }
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with(path, env_var)
}

/// Load `KEY=value` pairs from a `.env` file into the process environment.
///
/// Variables already present in the environment are kept. A missing file
/// is not an error; returns whether a file was loaded.
pub fn load_dotenv(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    dotenvy::from_path(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;
    Ok(true)
}

/// [`load_config`] with a caller-supplied environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate(&config)?;
    Ok(config)
}

/// Environment lookup that accepts upper- or lower-case names.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .or_else(|_| std::env::var(name.to_lowercase()))
        .ok()
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: '{}' ({})", name, raw, e))
}

/// Format a socket address, bracketing IPv6 hosts.
fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Overlay environment variables onto `config`. `lookup` resolves a
/// variable name to its value.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("HOST");
    let port = lookup("PORT");
    if host.is_some() || port.is_some() {
        let (cur_host, cur_port) = config
            .server
            .bind
            .rsplit_once(':')
            .map(|(h, p)| (h.to_string(), p.to_string()))
            .unwrap_or_else(|| (config.server.bind.clone(), "8000".to_string()));
        let port = match port {
            Some(p) => parse_env::<u16>("PORT", &p)?.to_string(),
            None => cur_port,
        };
        config.server.bind = join_host_port(&host.unwrap_or(cur_host), &port);
    }

    if let Some(v) = lookup("LLM_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = lookup("EMBEDDING_MODEL") {
        config.embedding.model = v;
    }
    if let Some(v) = lookup("VECTOR_STORE") {
        config.retrieval.vector_store = v;
    }
    if let Some(v) = lookup("CHUNK_SIZE") {
        config.chunking.chunk_size = parse_env("CHUNK_SIZE", &v)?;
    }
    if let Some(v) = lookup("CHUNK_OVERLAP") {
        config.chunking.chunk_overlap = parse_env("CHUNK_OVERLAP", &v)?;
    }
    if let Some(v) = lookup("TOP_K_RESULTS") {
        config.retrieval.top_k = parse_env("TOP_K_RESULTS", &v)?;
    }
    if let Some(v) = lookup("TEMPERATURE") {
        config.llm.temperature = parse_env("TEMPERATURE", &v)?;
    }
    if let Some(v) = lookup("MAX_TOKENS") {
        config.llm.max_tokens = parse_env("MAX_TOKENS", &v)?;
    }
    if let Some(v) = lookup("DATA_PATH") {
        config.document.path = PathBuf::from(v).join(DOCUMENT_FILE_NAME);
    }
    if let Some(v) = lookup("INDEX_PATH") {
        config.retrieval.index_path = PathBuf::from(v);
    }

    Ok(())
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    match config.retrieval.vector_store.as_str() {
        "flat-l2" | "faiss" => {}
        other => bail!(
            "Unknown vector store: '{}'. Must be flat-l2 (or its alias faiss).",
            other
        ),
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "gemini" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be gemini or ollama.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        bail!("llm.max_tokens must be > 0");
    }

    Ok(())
}

/// Gemini key from `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`.
pub fn gemini_api_key() -> Option<String> {
    env_var("GEMINI_API_KEY").or_else(|| env_var("GOOGLE_API_KEY"))
}

pub fn openai_api_key() -> Option<String> {
    env_var("OPENAI_API_KEY")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(
            config.document.path,
            PathBuf::from("data/ilaria-instructions.md")
        );
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retrieval.index_path, PathBuf::from("faiss_index"));
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.max_tokens, 1024);
        validate(&config).unwrap();
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
[chunking]
chunk_size = 500

[llm]
provider = "ollama"
model = "llama3"
"#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.retrieval.top_k, 4);
        validate(&config).unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PORT", "9100"),
                ("CHUNK_SIZE", "800"),
                ("CHUNK_OVERLAP", "100"),
                ("TOP_K_RESULTS", "6"),
                ("TEMPERATURE", "0.2"),
                ("LLM_MODEL", "gemini-2.0-pro"),
                ("DATA_PATH", "/srv/kb"),
                ("INDEX_PATH", "/srv/idx"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9100");
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.model, "gemini-2.0-pro");
        assert_eq!(
            config.document.path,
            PathBuf::from("/srv/kb/ilaria-instructions.md")
        );
        assert_eq!(config.retrieval.index_path, PathBuf::from("/srv/idx"));
    }

    #[test]
    fn test_host_override_keeps_port() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[("HOST", "127.0.0.1")])).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_bad_env_number_rejected() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, env(&[("CHUNK_SIZE", "big")])).unwrap_err();
        assert!(err.to_string().contains("CHUNK_SIZE"));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = 1000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_temperature_range() {
        let mut config = Config::default();
        config.llm.temperature = 2.5;
        assert!(validate(&config).is_err());
        config.llm.temperature = 0.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_vector_store_alias() {
        let mut config = Config::default();
        config.retrieval.vector_store = "faiss".into();
        assert!(validate(&config).is_ok());
        config.retrieval.vector_store = "chroma".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_remote_embedding_requires_dims() {
        let mut config = Config::default();
        config.embedding.provider = "openai".into();
        assert!(validate(&config).is_err());
        config.embedding.dims = Some(1536);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_llm_provider() {
        let mut config = Config::default();
        config.llm.provider = "mystery".into();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn test_rag_settings_mapping() {
        let mut config = Config::default();
        config.llm.temperature = 0.3;
        config.retrieval.top_k = 2;
        let settings = config.rag_settings();
        assert_eq!(settings.top_k, 2);
        assert_eq!(settings.chunk_size, 1000);
        assert_eq!(settings.generation.temperature, 0.3);
        assert_eq!(settings.generation.max_tokens, 1024);
    }

    #[test]
    fn test_load_config_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("ilaria.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 3\n").unwrap();
        let config = load_config_with(Some(&path), env(&[])).unwrap();
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn test_load_config_applies_injected_env() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("ilaria.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 3\n").unwrap();
        let config = load_config_with(Some(&path), env(&[("TOP_K_RESULTS", "5")])).unwrap();
        assert_eq!(config.retrieval.top_k, 5);

        let err = load_config_with(Some(&path), env(&[("TOP_K_RESULTS", "0")])).unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_ipv6_host_override_is_bracketed() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[("HOST", "::"), ("PORT", "9000")])).unwrap();
        assert_eq!(config.server.bind, "[::]:9000");
        assert!(config.server.bind.parse::<std::net::SocketAddr>().is_ok());

        // An already bracketed bind keeps its host when only the port changes.
        apply_env_overrides(&mut config, env(&[("PORT", "9100")])).unwrap();
        assert_eq!(config.server.bind, "[::]:9100");
    }

    #[test]
    fn test_load_dotenv() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        assert!(!load_dotenv(&path).unwrap());

        std::fs::write(&path, "ILARIA_CONFIG_TEST_DOTENV=from-file\n").unwrap();
        assert!(load_dotenv(&path).unwrap());
        assert_eq!(
            std::env::var("ILARIA_CONFIG_TEST_DOTENV").as_deref(),
            Ok("from-file")
        );
    }

    #[test]
    fn test_zero_dims_rejected() {
        let mut config = Config::default();
        config.embedding.dims = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err =
            load_config_with(Some(Path::new("/nonexistent/ilaria.toml")), env(&[])).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
