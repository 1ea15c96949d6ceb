//! Error types for entity, component and system operations.

use crate::component::ComponentTypeId;
use crate::entity::Entity;

/// Errors reported by the ECS for bad input.
///
/// Missing components are not errors: lookups return `Option` and removals
/// report `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The id was never handed out by the component registry.
    #[error("invalid component type {0}")]
    InvalidComponentType(ComponentTypeId),

    /// A blueprint value does not have the Rust type registered for the id.
    #[error("blueprint does not match component type {0}")]
    BlueprintMismatch(ComponentTypeId),

    /// `make_entity` was given slices of different lengths.
    #[error("{blueprints} blueprints given for {types} component types")]
    BlueprintCount {
        /// Number of blueprint values.
        blueprints: usize,
        /// Number of component type ids.
        types: usize,
    },

    /// An entity may own at most one instance of each component type.
    #[error("entity would own component type {0} twice")]
    DuplicateComponent(ComponentTypeId),

    /// The handle refers to an entity that was removed.
    #[error("{0:?} is not a live entity")]
    StaleEntity(Entity),

    /// Every system needs at least one mandatory component type to iterate.
    #[error("system `{0}` declares no mandatory component type")]
    NoMandatoryComponent(String),

    /// A system listed the same component type twice.
    #[error("system `{system}` declares component type {type_id} more than once")]
    DuplicateSystemComponent {
        /// Name of the rejected system.
        system: String,
        /// The repeated component type.
        type_id: ComponentTypeId,
    },
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, EcsError>;
