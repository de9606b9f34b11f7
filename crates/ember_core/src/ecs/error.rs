use thiserror::Error;

use super::entity::EntityIndex;

/// Errors surfaced by fallible ECS queries.
///
/// The reference behavior tolerated invalid access silently; these make the
/// failure distinct from the fast path without changing what succeeds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EcsError {
    #[error("entity handle is null")]
    NullEntity,

    #[error("entity {index} has no component '{component}'")]
    ComponentNotFound {
        index: EntityIndex,
        component: &'static str,
    },
}
