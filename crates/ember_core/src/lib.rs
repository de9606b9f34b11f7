//! Ember Engine Core
//!
//! Contains the fundamental scene runtime:
//! - Entity Component System (ECS) with sparse per-type storage
//! - Scene lifecycle with deferred structural mutation
//! - Message dispatch to systems
//! - Draw seam for external render backends

pub mod ecs;
pub mod message;
pub mod render;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
