//! Draw seam
//!
//! The scene exposes drawing as a walk over registered drawables; the
//! render target itself lives outside this crate. Backends implement
//! [`RenderTarget`] and drawables downcast it to the concrete type they
//! were written for.

use std::any::Any;

/// Marker for an engine-external render target.
pub trait RenderTarget: Any {}

/// Something a scene can draw: a direct-draw object or a rendering system.
pub trait Drawable {
    fn draw(&self, target: &mut dyn RenderTarget);
}
