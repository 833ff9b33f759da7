use thiserror::Error;
use weft_model::ReceiverError;

/// Unified error type for the execution core.
///
/// Variants split along the taxonomy the engine enforces: static errors
/// abort before execution starts, a handful of precondition violations are
/// unconditionally fatal, recoverable errors are routed through the
/// [`ErrorListener`](crate::controller::ErrorListener), and termination is a
/// distinguished variant that must reach the controller boundary exactly
/// once.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Static error: {0}")]
    Static(String),

    #[error("Unknown mode '{0}'")]
    UnknownMode(String),

    #[error("Call to unknown named template '{0}'")]
    UnknownTemplate(String),

    #[error("Ambiguous rule match for {item}: matches both \"{first}\" and \"{second}\"")]
    AmbiguousRuleMatch {
        item: String,
        first: String,
        second: String,
    },

    #[error("There is no current template rule")]
    NoCurrentTemplateRule,

    #[error("No context item is available for {0}")]
    NoContextItem(&'static str),

    #[error("Required parameter ${param} was not supplied to template {template}")]
    RequiredParamMissing { template: String, param: String },

    #[error("Circular global variable definition: {chain}")]
    CircularGlobalVariable { chain: String },

    #[error("Template {template} is not streamable but mode {mode} is declared streamable")]
    NotStreamable { mode: String, template: String },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Processing terminated: {message}")]
    Terminated {
        message: String,
        code: Option<String>,
    },

    #[error("Dynamic error [{code}]: {message}")]
    Dynamic { code: String, message: String },

    #[error("Output error: {0}")]
    Receiver(#[from] ReceiverError),
}

impl EngineError {
    pub fn static_error(msg: impl Into<String>) -> Self {
        Self::Static(msg.into())
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn dynamic(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dynamic {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn terminated(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Terminated {
            message: message.into(),
            code,
        }
    }

    /// The canonical XSLT error code for this error, where one exists.
    pub fn code(&self) -> Option<&str> {
        match self {
            EngineError::Static(_) => None,
            EngineError::UnknownMode(_) => Some("XTDE0045"),
            EngineError::UnknownTemplate(_) => Some("XTSE0650"),
            EngineError::AmbiguousRuleMatch { .. } => Some("XTRE0540"),
            EngineError::NoCurrentTemplateRule => Some("XTDE0560"),
            EngineError::NoContextItem(_) => Some("XTDE0565"),
            EngineError::RequiredParamMissing { .. } => Some("XTDE0700"),
            EngineError::CircularGlobalVariable { .. } => Some("XTDE0640"),
            EngineError::NotStreamable { .. } => Some("XTSE3430"),
            EngineError::Type(_) => Some("XPTY0004"),
            EngineError::Terminated { code, .. } => code.as_deref().or(Some("XTMM9000")),
            EngineError::Dynamic { code, .. } => Some(code.as_str()),
            EngineError::Receiver(_) => None,
        }
    }

    /// True for the distinguished termination error raised by
    /// `xsl:message terminate="yes"`.
    pub fn is_terminated(&self) -> bool {
        matches!(self, EngineError::Terminated { .. })
    }
}
