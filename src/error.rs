// ABOUTME: Application-wide error types for karavi.
// ABOUTME: Uses thiserror for ergonomic error handling.

use thiserror::Error;

use crate::manifest::OverrideLevel;

/// Fatal configuration errors. These always fail the phase and are never
/// retried by this crate; any message must carry enough context to diagnose
/// without re-running the workflow.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no valid manifest files found at {0}")]
    NoManifestAtLevel(OverrideLevel),

    #[error("multiple manifest files found at {0}, expected exactly one")]
    AmbiguousManifest(OverrideLevel),

    #[error("manifest contains no application config")]
    NoApplications,

    #[error("manifest {0} contains no application name")]
    MissingApplicationName(String),

    #[error("invalid route format in manifest")]
    InvalidRouteFormat,

    #[error("no routing information available for {service}: neither manifest nor infrastructure declares routes")]
    MissingRoutes { service: String },

    #[error("no valid variable file found to resolve (({token})), verify a vars file is present and has valid structure")]
    UnresolvedVariable { token: String },

    #[error("instance count '{value}' in manifest is not a number")]
    InvalidInstanceCount { value: String },

    #[error("different infrastructure or service across workflow phases: {current_phase} does not match {previous_phase}")]
    InconsistentInfrastructure {
        current_phase: String,
        previous_phase: String,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
