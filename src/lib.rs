//! tickscene library.
//!
//! A small real-time 2D engine core: a fixed-timestep game loop, a
//! hierarchical scene graph whose groups index their children with a list,
//! a uniform grid or a quadtree, and per-entity animation state machines
//! sequenced by timelines.
//!
//! Drawing, input and asset loading belong to the host; the engine talks to
//! them through [`systems::render::Surface`], the input events in
//! [`events::input`] and plain texture keys in
//! [`components::entity::SpriteRef`].
//!
//! # Quick start
//!
//! 1. Build an [`resources::context::EngineContext`] from an
//!    [`resources::gameconfig::EngineConfig`] and wrap it in an `Arc`.
//! 2. Register one or more [`resources::gamestate::AppState`]s.
//! 3. Hand the context and a surface to [`systems::gameloop::GameLoop`] and
//!    `run` or `spawn` it.

pub mod components;
pub mod events;
pub mod resources;
pub mod scene;
pub mod spatial;
pub mod systems;
