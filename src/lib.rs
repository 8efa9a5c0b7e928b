//! Trawl: declarative, recursive web extraction
//!
//! This crate fetches network resources and extracts structured data from their
//! content using a tree of selectors. Selectors marked as "follow" turn matched
//! values into new requests, so a single rule set can walk from an index page
//! into every page it links to.

pub mod config;
pub mod crawler;
pub mod decoders;
pub mod engine;
pub mod error_map;
pub mod robots;
pub mod rules;
pub mod state;
pub mod url;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

/// Main error type for Trawl operations
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("{0} is not configured")]
    MissingDependency(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("Page not accessible due to robots.txt restriction: {url}")]
    RobotsDenied { url: String },

    #[error("Expression type {expr_type:?} is not compatible with the element")]
    ExprType { expr_type: String },

    #[error("{0}")]
    Expression(String),

    #[error("Content-Type does not match any decoder: {content_type:?}")]
    NotMatch { content_type: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode content from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RequestState,
        to: state::RequestState,
    },

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Panic(String),

    #[error("{0}")]
    Aggregate(error_map::ErrorMap),
}

/// Errors produced while turning raw input into rule sets and selectors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("invalid selector")]
    InvalidSelector,

    #[error("invalid selectors")]
    InvalidSelectors,

    #[error("value is not assignable to field")]
    NotAssignable,

    #[error("must be a bool, string or number")]
    MustBeBool,

    #[error("must be a string or number")]
    MustBeDuration,

    #[error("must be a string")]
    MustBeString,

    #[error("invalid header")]
    InvalidHeader,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] ::url::ParseError),

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("invalid bool: {0:?}")]
    InvalidBool(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(#[from] ::url::ParseError),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

impl TrawlError {
    /// Short name of the error variant, recorded on failed requests
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingDependency(_) => "missing_dependency",
            Self::InvalidInput(_) => "invalid_input",
            Self::Rule(_) => "rule",
            Self::RobotsDenied { .. } => "robots_denied",
            Self::ExprType { .. } => "expr_type",
            Self::Expression(_) => "expression",
            Self::NotMatch { .. } => "not_match",
            Self::Transport(_) => "transport",
            Self::Decode { .. } => "decode",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Url(_) => "url",
            Self::Config(_) => "config",
            Self::Panic(_) => "panic",
            Self::Aggregate(_) => "aggregate",
        }
    }

    /// Returns the aggregated errors when this error carries several of them
    pub fn as_aggregate(&self) -> Option<&error_map::ErrorMap> {
        match self {
            Self::Aggregate(errs) => Some(errs),
            _ => None,
        }
    }
}

/// Result type alias for Trawl operations
pub type Result<T> = std::result::Result<T, TrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{build_coordinator, Coordinator, Extraction, Response};
pub use engine::Element;
pub use error_map::ErrorMap;
pub use rules::{RuleSet, Selector};
pub use state::RequestState;
