//! Per-frame execution of the channel passes and the main pass.
//!
//! Shader channels render into ping-pong targets: frame `n` writes side
//! `n % 2`. Channel passes sample the side written on the previous frame, so a
//! channel may read its own output. The main pass samples what the channel
//! passes produced this frame.

use std::time::Instant;

use thiserror::Error;
use tracing::trace;

use crate::clock::{FrameClock, FrameUniforms};
use crate::registry::{Bindings, ChannelBinding, ResourceRegistry};
use crate::resource::{OffscreenTarget, Resource, ResourceLoader, Slot, Viewport};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{slot} cannot be rendered: {reason}")]
    Unsupported { slot: Slot, reason: &'static str },
    #[error("render backend failed: {0}")]
    Backend(String),
}

/// Half of a ping-pong target pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn for_frame(frame: u64) -> Self {
        if frame % 2 == 0 {
            Side::A
        } else {
            Side::B
        }
    }

    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

/// What a pass samples for one channel slot.
pub enum ChannelInput<'a, L: ResourceLoader> {
    Texture(&'a L::Texture),
    Feedback { target: &'a L::Target, side: Side },
}

impl<L: ResourceLoader> Clone for ChannelInput<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L: ResourceLoader> Copy for ChannelInput<'_, L> {}

pub struct ChannelPass<'a, L: ResourceLoader> {
    pub index: usize,
    pub shader: &'a L::Shader,
    pub target: &'a L::Target,
    pub write: Side,
    pub inputs: &'a [ChannelInput<'a, L>],
    pub uniforms: &'a FrameUniforms,
}

pub struct MainPass<'a, L: ResourceLoader> {
    pub shader: &'a L::Shader,
    pub inputs: &'a [ChannelInput<'a, L>],
    pub uniforms: &'a FrameUniforms,
}

/// GPU side of a frame. Passes arrive in dependency order followed by one
/// `submit`.
pub trait RenderBackend {
    type Loader: ResourceLoader;

    fn draw_channel(&mut self, pass: &ChannelPass<'_, Self::Loader>) -> Result<(), RenderError>;

    fn draw_main(&mut self, pass: &MainPass<'_, Self::Loader>) -> Result<(), RenderError>;

    fn submit(&mut self) -> Result<(), RenderError>;
}

/// Per-frame inputs supplied by the window loop.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput {
    pub now: Instant,
    pub pointer: [f32; 4],
}

impl FrameInput {
    pub fn at(now: Instant) -> Self {
        Self {
            now,
            pointer: [0.0; 4],
        }
    }
}

/// Orders and issues the passes of each frame.
#[derive(Debug)]
pub struct RenderGraphExecutor {
    clock: FrameClock,
    viewport: Viewport,
}

impl RenderGraphExecutor {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            clock: FrameClock::new(),
            viewport,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frames(&self) -> u64 {
        self.clock.frames()
    }

    /// Adopts a new viewport and resizes every offscreen target before the
    /// next frame draws.
    pub fn resize<L: ResourceLoader>(&mut self, registry: &ResourceRegistry<L>, viewport: Viewport) {
        self.viewport = viewport;
        registry.resize_targets(viewport);
    }

    /// Renders one frame while holding the registry lock, so concurrent
    /// reloads land strictly between frames.
    pub fn render_frame<B: RenderBackend>(
        &mut self,
        registry: &ResourceRegistry<B::Loader>,
        backend: &mut B,
        input: FrameInput,
    ) -> Result<FrameUniforms, RenderError> {
        registry.with_resources(|bindings| self.render_locked(bindings, backend, input))
    }

    fn render_locked<B: RenderBackend>(
        &mut self,
        bindings: &Bindings<'_, B::Loader>,
        backend: &mut B,
        input: FrameInput,
    ) -> Result<FrameUniforms, RenderError> {
        let time = self.clock.tick(input.now);
        let uniforms = FrameUniforms {
            resolution: self.viewport,
            frame: time.frame,
            time: time.elapsed,
            delta: time.delta,
            pointer: input.pointer,
        };
        let write = Side::for_frame(time.frame);
        let channels = bindings.channels();

        let previous = channel_inputs(channels, write.other())?;
        for (index, binding) in channels.iter().enumerate() {
            let (Resource::Shader(shader), Some(target)) = (binding.resource(), binding.target())
            else {
                continue;
            };
            debug_assert_eq!(
                target.size(),
                self.viewport,
                "offscreen target for channel {index} was not resized"
            );
            trace!(index, ?write, "channel pass");
            backend.draw_channel(&ChannelPass {
                index,
                shader,
                target,
                write,
                inputs: &previous,
                uniforms: &uniforms,
            })?;
        }

        let current = channel_inputs(channels, write)?;
        let main = bindings.main();
        let Resource::Shader(shader) = main.resource() else {
            return Err(RenderError::Unsupported {
                slot: main.slot(),
                reason: "main binding must hold a shader",
            });
        };
        backend.draw_main(&MainPass {
            shader,
            inputs: &current,
            uniforms: &uniforms,
        })?;
        backend.submit()?;
        Ok(uniforms)
    }
}

fn channel_inputs<L: ResourceLoader>(
    channels: &[ChannelBinding<L>],
    side: Side,
) -> Result<Vec<ChannelInput<'_, L>>, RenderError> {
    channels
        .iter()
        .map(|binding| match (binding.resource(), binding.target()) {
            (Resource::Texture(texture), _) => Ok(ChannelInput::Texture(texture)),
            (Resource::Shader(_), Some(target)) => Ok(ChannelInput::Feedback { target, side }),
            (Resource::Shader(_), None) => Err(RenderError::Unsupported {
                slot: binding.slot(),
                reason: "shader channel has no offscreen target",
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sides_alternate_per_frame() {
        assert_eq!(Side::for_frame(0), Side::A);
        assert_eq!(Side::for_frame(1), Side::B);
        assert_eq!(Side::for_frame(2), Side::A);
        assert_eq!(Side::A.other(), Side::B);
        assert_eq!(Side::B.index(), 1);
    }

    #[test]
    fn unsupported_error_names_the_slot() {
        let err = RenderError::Unsupported {
            slot: Slot::Channel(2),
            reason: "shader channel has no offscreen target",
        };
        assert_eq!(
            err.to_string(),
            "iChannel2 cannot be rendered: shader channel has no offscreen target"
        );
    }
}
