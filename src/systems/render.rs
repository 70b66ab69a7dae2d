//! Drawing surface interface and per-frame render pass.
//!
//! The engine does not rasterize anything. Once per frame the game loop asks
//! the host's [`Surface`] for its drawing target, has the active
//! [`AppState`](crate::resources::gamestate::AppState) emit one
//! [`DrawCommand`] per visible sprite, and hands the target back for
//! presentation.
//!
//! Culling happens in the scene graph: each group queries its spatial
//! backend with its view rectangle (widened by the group's cull margin), so
//! only entities whose indexed position falls in view are emitted.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::error;

use crate::components::entity::{Entity, EntityId, SpriteRef};
use crate::resources::gamestate::AppState;
use crate::resources::worldtime::WorldTime;

/// Everything a surface needs to draw one sprite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand<'a> {
    pub id: EntityId,
    /// Texture key supplied by the asset loader.
    pub texture: &'a str,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Rotation in degrees.
    pub angle: f32,
    pub scale: f32,
    pub alpha: u8,
}

impl<'a> DrawCommand<'a> {
    pub fn new(id: EntityId, entity: &Entity, sprite: &'a SpriteRef) -> Self {
        DrawCommand {
            id,
            texture: &sprite.texture,
            x: entity.transform.x,
            y: entity.transform.y,
            width: sprite.width,
            height: sprite.height,
            angle: entity.transform.angle,
            scale: entity.transform.scale(),
            alpha: entity.transform.alpha,
        }
    }
}

/// Host-provided drawing target.
pub trait Surface: Send {
    /// Acquire the target for this frame, returning its size in pixels.
    /// `None` means no target is available and the frame is skipped.
    fn lock(&mut self) -> Option<(u32, u32)>;

    /// Draw one sprite. An error aborts the rest of the frame.
    fn draw(&mut self, cmd: &DrawCommand<'_>, time: &WorldTime) -> Result<(), String>;

    /// Release the target and present what was drawn.
    fn unlock_and_present(&mut self);
}

/// Result of one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The frame was presented.
    Presented,
    /// The surface had no target to lock.
    NoTarget,
    /// Drawing failed; the target was still released.
    Failed,
}

/// Render the active state once: lock, draw, always unlock.
///
/// Draw failures are logged and reported as [`RenderOutcome::Failed`]; they
/// never propagate further so a single bad frame cannot stop the loop. A
/// panic inside [`AppState::render`] counts as a failed frame too.
pub fn render_frame(
    state: &mut dyn AppState,
    surface: &mut dyn Surface,
    time: &WorldTime,
) -> RenderOutcome {
    if surface.lock().is_none() {
        return RenderOutcome::NoTarget;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| state.render(&mut *surface, time)))
        .unwrap_or_else(|payload| Err(format!("render panicked: {}", panic_message(&*payload))));
    surface.unlock_and_present();
    match result {
        Ok(()) => RenderOutcome::Presented,
        Err(e) => {
            error!("Render failed on frame {}: {}", time.frame, e);
            RenderOutcome::Failed
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;
    use crate::spatial::SpatialBackend;

    struct Exploding {
        scene: Scene,
    }

    impl AppState for Exploding {
        fn scene(&self) -> &Scene {
            &self.scene
        }
        fn scene_mut(&mut self) -> &mut Scene {
            &mut self.scene
        }
        fn render(&mut self, _surface: &mut dyn Surface, time: &WorldTime) -> Result<(), String> {
            if time.frame % 2 == 0 {
                panic!("sprite sheet missing");
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counting {
        presented: u32,
    }

    impl Surface for Counting {
        fn lock(&mut self) -> Option<(u32, u32)> {
            Some((32, 32))
        }
        fn draw(&mut self, _cmd: &DrawCommand<'_>, _time: &WorldTime) -> Result<(), String> {
            Ok(())
        }
        fn unlock_and_present(&mut self) {
            self.presented += 1;
        }
    }

    #[test]
    fn test_render_panic_is_a_failed_frame() {
        let mut state = Exploding {
            scene: Scene::new(SpatialBackend::list()),
        };
        let mut surface = Counting::default();
        let mut time = WorldTime::new(20);
        assert_eq!(render_frame(&mut state, &mut surface, &time), RenderOutcome::Failed);
        time.frame += 1;
        assert_eq!(render_frame(&mut state, &mut surface, &time), RenderOutcome::Presented);
        assert_eq!(surface.presented, 2);
    }

    #[test]
    fn test_panic_message_reads_both_payloads() {
        let text: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*text), "static");
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*other), "unknown panic");
    }
}
