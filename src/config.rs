//! Configuration types for batch page inference.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs across jobs and diff two runs to understand why their
//! outputs differ.
//!
//! [`PromptConfig`] is the one piece of process-wide state: a default prompt
//! loaded once at startup and replaceable wholesale on demand. Pipeline
//! components never read it ambiently — the active configuration is resolved
//! at job start and passed down explicitly.

use crate::error::NotemarkError;
use crate::pipeline::inference::VisionInference;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Base URL of the OpenAI-compatible inference endpoint.
pub const DEFAULT_API_BASE: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Vision-language model identifier sent with every request.
pub const DEFAULT_MODEL: &str = "qwen-vl-plus";

/// Concurrency ceiling for in-flight inference calls.
///
/// Bounds load on the external service and respects its rate limits; this is
/// the pipeline's one explicit backpressure mechanism.
pub const DEFAULT_CONCURRENCY: usize = 3;

// ── Prompt configuration ─────────────────────────────────────────────────

/// System instruction text plus an optional output-format exemplar.
///
/// Either the process-wide default or a caller-supplied override. There is no
/// partial-field merge: a replacement swaps the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// System instruction sent as the system-role message.
    pub prompt: String,
    /// Optional exemplar appended to the system prompt inside a fenced block.
    #[serde(default)]
    pub format_example: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            prompt: crate::prompts::DEFAULT_SYSTEM_PROMPT.to_string(),
            format_example: Some(crate::prompts::DEFAULT_FORMAT_EXAMPLE.to_string()),
        }
    }
}

impl PromptConfig {
    /// Read a prompt configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, NotemarkError> {
        let raw = std::fs::read_to_string(path).map_err(|e| NotemarkError::Internal(format!(
            "Failed to read prompt config '{}': {}",
            path.display(),
            e
        )))?;
        serde_json::from_str(&raw).map_err(|e| {
            NotemarkError::InvalidConfig(format!(
                "prompt config '{}' is not valid JSON: {}",
                path.display(),
                e
            ))
        })
    }

    /// Persist this prompt configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), NotemarkError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| NotemarkError::Internal(format!("serialise prompt config: {}", e)))?;
        std::fs::write(path, json).map_err(|e| NotemarkError::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

static ACTIVE_PROMPT: Lazy<RwLock<PromptConfig>> =
    Lazy::new(|| RwLock::new(PromptConfig::default()));

/// Snapshot of the process-wide default prompt configuration.
///
/// Returns a clone so a concurrent replacement can never mutate a prompt
/// mid-dispatch: jobs resolve their prompt once, at start.
pub fn active_prompt() -> PromptConfig {
    ACTIVE_PROMPT.read().expect("prompt lock poisoned").clone()
}

/// Replace the process-wide default prompt configuration wholesale.
pub fn replace_active_prompt(config: PromptConfig) {
    *ACTIVE_PROMPT.write().expect("prompt lock poisoned") = config;
}

/// Initialise the process-wide default from a JSON file, if it exists.
///
/// Called once at startup. A missing file leaves the built-in default in
/// place; a malformed file is an error rather than a silent fallback.
pub fn init_active_prompt(path: &Path) -> Result<(), NotemarkError> {
    if path.exists() {
        replace_active_prompt(PromptConfig::load(path)?);
    }
    Ok(())
}

// ── Batch configuration ──────────────────────────────────────────────────

/// Configuration for one batch inference run.
///
/// Built via [`BatchConfig::builder()`] or [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use notemark::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .api_key("sk-...")
///     .output_root("output")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// API credential for the inference endpoint. Required unless a
    /// pre-built [`VisionInference`] client is supplied.
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint. Default: [`DEFAULT_API_BASE`].
    pub api_base: String,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Number of concurrent inference calls. Default: [`DEFAULT_CONCURRENCY`].
    ///
    /// Every call flows through a single counting gate, so no component can
    /// exceed this by spawning uncoordinated requests.
    pub concurrency: usize,

    /// Sampling temperature. Default: 0.3 — non-zero but low, for
    /// reproducible, low-variance restructuring output.
    pub temperature: f32,

    /// Response-length cap per page. Default: 3000.
    pub max_tokens: u32,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Prompt override for this batch. `None` resolves the process-wide
    /// default at job start.
    pub prompt: Option<PromptConfig>,

    /// Root directory for job output directories. Default: `output`.
    pub output_root: PathBuf,

    /// Pre-built inference client. Takes precedence over `api_key`; the seam
    /// used by tests to substitute an instrumented double.
    pub client: Option<Arc<dyn VisionInference>>,

    /// Per-page progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            temperature: 0.3,
            max_tokens: 3000,
            api_timeout_secs: 120,
            prompt: None,
            output_root: PathBuf::from("output"),
            client: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("prompt", &self.prompt)
            .field("output_root", &self.output_root)
            .field("client", &self.client.as_ref().map(|_| "<dyn VisionInference>"))
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn prompt(mut self, prompt: PromptConfig) -> Self {
        self.config.prompt = Some(prompt);
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self
    }

    pub fn client(mut self, client: Arc<dyn VisionInference>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, NotemarkError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(NotemarkError::InvalidConfig("Concurrency must be >= 1".into()));
        }
        if c.api_base.is_empty() {
            return Err(NotemarkError::InvalidConfig("api_base must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(NotemarkError::InvalidConfig("max_tokens must be >= 1".into()));
        }
        Ok(self.config)
    }
}
