//! Error types shared by every viewer subsystem.
//!
//! Construction-time failures (camera, controls, renderer) abort scene
//! initialization; per-operation failures are logged by the caller and leave
//! prior state intact.

use crate::loader::ModelFileType;

/// Result alias used throughout the crate
pub type ViewerResult<T> = Result<T, ViewerError>;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("no container mounted; mount a container before initializing the scene")]
    ContainerMissing,

    #[error("unsupported model format for '{url}'")]
    UnsupportedFormat { url: String },

    #[error("failed to create {file_type:?} loader: {reason}")]
    LoaderInitError {
        file_type: ModelFileType,
        reason: String,
    },

    #[error("failed to load asset '{url}': {source}")]
    AssetLoadError {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("material not found: {0}")]
    MaterialNotFound(String),

    #[error("light role not found: {0}")]
    LightRoleNotFound(String),

    #[error("{resource} is not initialized")]
    UninitializedResource { resource: &'static str },

    #[error("invalid camera parameters: {0}")]
    InvalidCamera(String),

    #[error("failed to create renderer: {0}")]
    RendererInit(String),

    #[error("invalid value for property '{property}': {reason}")]
    InvalidProperty { property: String, reason: String },

    #[error("failed to load texture '{url}': {source}")]
    TextureLoad {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to capture screenshot: {0}")]
    Screenshot(#[source] anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ViewerError {
    pub(crate) fn uninitialized(resource: &'static str) -> Self {
        ViewerError::UninitializedResource { resource }
    }

    pub(crate) fn invalid_property(property: impl Into<String>, reason: impl Into<String>) -> Self {
        ViewerError::InvalidProperty {
            property: property.into(),
            reason: reason.into(),
        }
    }
}
