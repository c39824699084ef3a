//! Error types for template generation.
//!
//! Each stage of the pipeline has its own error enum so callers can decide
//! whether to propagate or degrade. [`ArmgenError`] wraps all of them for the
//! command layer.

use thiserror::Error;

/// Errors raised while loading, rendering or encoding a cloud-init fragment.
#[derive(Debug, Error)]
pub enum SubstitutionError {
    /// No embedded asset exists at the resolved path
    #[error("asset not found: {path}")]
    AssetNotFound { path: String },

    /// Inline payload of a component was not valid base64
    #[error("invalid base64 payload for {name}: {source}")]
    Base64Decode {
        name: String,
        #[source]
        source: base64::DecodeError,
    },

    /// Decoded payload was not valid UTF-8 text
    #[error("payload for {name} is not valid UTF-8")]
    Utf8 { name: String },

    /// The nested template failed to parse or execute
    #[error("error rendering {name}: {message}")]
    Render { name: String, message: String },

    /// Gzip compression failed
    #[error("failed to compress payload: {0}")]
    Compress(#[from] std::io::Error),
}

/// Errors raised while resolving VM extensions.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// A profile references an extension that has no extension profile
    #[error("{name} extension referenced was not found in the extension profile")]
    NotFound { name: String },

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The HTTP request for an extension resource failed
    #[error("unable to GET extension resource at {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The extension registry answered with a non-200 status
    #[error("unable to GET extension resource at {url}: status {status}")]
    Status { url: String, status: u16 },

    /// supported-orchestrators.json does not list the orchestrator
    #[error("orchestrator {orchestrator} is not supported by extension {name} version {version}")]
    UnsupportedOrchestrator {
        orchestrator: String,
        name: String,
        version: String,
    },

    /// supported-orchestrators.json could not be parsed
    #[error("unable to parse supported-orchestrators.json for extension {name} version {version}")]
    InvalidManifest { name: String, version: String },

    /// template-link.json is not a JSON document
    #[error("template-link.json of extension {name} is not valid JSON: {source}")]
    InvalidLinkedTemplate {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the top-level template generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("orchestrator {orchestrator} is not supported on RHEL")]
    UnsupportedDistro { orchestrator: String },

    #[error("orchestrator {orchestrator} is unsupported, only Kubernetes templates can be generated")]
    UnsupportedOrchestrator { orchestrator: String },

    #[error("'{0}' is an invalid IP address")]
    InvalidIpAddress(String),

    #[error("IP address '{address}' + {count} will overflow the fourth octet")]
    IpOverflow { address: String, count: usize },

    #[error("cluster has no master profile")]
    MissingMasterProfile,

    #[error("certificate profile is required to build a kubeconfig")]
    MissingCertificateProfile,

    /// The legacy document template failed to render
    #[error("template error: {0}")]
    Template(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Substitution(#[from] SubstitutionError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("failed to parse config: {0}")]
    ParsingFailed(String),
}

/// Crate-level error used by the command layer.
#[derive(Debug, Error)]
pub enum ArmgenError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid api model: {0}")]
    ApiModel(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExtensionError> for ArmgenError {
    fn from(err: ExtensionError) -> Self {
        ArmgenError::Generator(GeneratorError::Extension(err))
    }
}

impl From<SubstitutionError> for ArmgenError {
    fn from(err: SubstitutionError) -> Self {
        ArmgenError::Generator(GeneratorError::Substitution(err))
    }
}

pub type Result<T> = std::result::Result<T, ArmgenError>;
