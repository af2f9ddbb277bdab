//! Engine error types

use crate::backend::BackendError;
use crate::scene::EntityId;
use thiserror::Error;

/// Errors surfaced by the scene graph, renderer and resource loaders.
///
/// Per-frame failures (missing mesh/material/camera on a draw, constant
/// upload failures) are not represented here; they are logged and the
/// frame keeps running.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Renderer initialization failed: {0}")]
    InitializationFailure(String),
    #[error("Invalid hierarchy: {child:?} cannot be parented under {parent:?}")]
    InvalidHierarchy { child: EntityId, parent: EntityId },
    #[error("Entity {0:?} does not exist")]
    EntityNotFound(EntityId),
    #[error("Renderer is not initialized")]
    NotInitialized,
    #[error("A frame is already in progress")]
    FrameInProgress,
    #[error("No frame in progress")]
    NoFrameInProgress,
    #[error("Failed to load resource '{name}': {reason}")]
    ResourceLoad { name: String, reason: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type EngineResult<T> = Result<T, EngineError>;
