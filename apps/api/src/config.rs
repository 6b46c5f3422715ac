use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Built once at startup and passed into component constructors —
/// no component reads ambient global state.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    /// Completion provider identity: "openai" or "groq".
    pub completion_provider: String,
    pub completion_model: String,
    pub groq_api_key: Option<String>,
    /// Characters per chunk at ingestion time.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Default number of evidence chunks retrieved per query.
    pub top_k: usize,
    /// Minimum cosine similarity for a job posting to count as a match.
    pub min_match_score: f32,
    /// Token budget for the assembled evidence context.
    pub max_context_tokens: usize,
    /// Sampling temperature for specialist completion calls.
    pub agent_temperature: f32,
    /// Max tokens for a specialist completion response.
    pub completion_max_tokens: u32,
    /// Classifier confidence below this falls back to the session's last intent.
    pub classifier_confidence_threshold: f32,
    /// Conversation turns kept per session before the oldest are evicted.
    pub history_max_turns: usize,
    /// Per-call timeout for external capability calls (embedding, completion).
    pub capability_timeout_secs: u64,
    /// Concurrent embedding batches during bulk ingestion.
    pub ingest_concurrency: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            completion_provider: env_or("COMPLETION_PROVIDER", "openai"),
            completion_model: env_or("COMPLETION_MODEL", "gpt-4o-mini"),
            groq_api_key: std::env::var("GROQ_API_KEY").ok(),
            chunk_size: parse_env("CHUNK_SIZE", 500)?,
            chunk_overlap: parse_env("CHUNK_OVERLAP", 50)?,
            top_k: parse_env("TOP_K_RETRIEVAL", 3)?,
            min_match_score: parse_env("MIN_JOB_MATCH_SCORE", 0.6)?,
            max_context_tokens: parse_env("MAX_CONTEXT_TOKENS", 3000)?,
            agent_temperature: parse_env("AGENT_TEMPERATURE", 0.7)?,
            completion_max_tokens: parse_env("COMPLETION_MAX_TOKENS", 2000)?,
            classifier_confidence_threshold: parse_env("CLASSIFIER_CONFIDENCE_THRESHOLD", 0.6)?,
            history_max_turns: parse_env("HISTORY_MAX_TURNS", 20)?,
            capability_timeout_secs: parse_env("CAPABILITY_TIMEOUT_SECS", 60)?,
            ingest_concurrency: parse_env("INGEST_CONCURRENCY", 4)?,
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Startup validation. Bad chunking parameters are fatal, not recoverable.
    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("Invalid config: CHUNK_SIZE must be positive");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "Invalid config: CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        match self.completion_provider.as_str() {
            "openai" => {}
            "groq" => {
                if self.groq_api_key.is_none() {
                    bail!("Invalid config: GROQ_API_KEY is required when COMPLETION_PROVIDER is 'groq'");
                }
            }
            other => bail!("Invalid config: unknown COMPLETION_PROVIDER '{other}'"),
        }
        if self.ingest_concurrency == 0 {
            bail!("Invalid config: INGEST_CONCURRENCY must be positive");
        }
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}
