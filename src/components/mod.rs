//! Data carried by scene nodes.
//!
//! Submodules overview:
//! - [`geometry`] – 2D vectors and axis-aligned rectangles
//! - [`entity`] – entity handles, transforms, sprites, behaviours and the entity itself
//! - [`animation`] – per-attribute interpolation state machine
//! - [`timeline`] – slot-sequenced activation of entity animations

pub mod animation;
pub mod entity;
pub mod geometry;
pub mod timeline;
