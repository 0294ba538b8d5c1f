use thiserror::Error;

/// Failures that are about this program rather than about GStreamer calls.
#[derive(Debug, Error)]
pub enum TutorialError {
    #[error("Tutorial {tutorial} was not compiled in, rebuild with --features {features}")]
    FeatureDisabled {
        tutorial: &'static str,
        features: &'static str,
    },

    #[error("Element factory not found: {0}")]
    MissingElement(String),

    #[error("Element {element} is not a {expected}")]
    NotBaseClass {
        element: String,
        expected: &'static str,
    },

    #[error("Invalid property filter {pattern:?}: {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Pipeline has no bus")]
    NoBus,

    #[error("Invalid configuration: {0}")]
    Config(String),
}
