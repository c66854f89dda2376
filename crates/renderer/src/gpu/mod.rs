//! GPU side of the preview.
//!
//! - `context` owns the wgpu instance, device and surface, and reconfigures
//!   the swapchain when the window resizes.
//! - `loader` implements the hot-reload [`ResourceLoader`](hotreload::ResourceLoader):
//!   shaders become pipelines, images become textures, shader channels get a
//!   ping-pong target pair from `targets`.
//! - `frame` records one frame's passes and implements
//!   [`RenderBackend`](hotreload::RenderBackend).
//! - `pipeline` holds the bind group layouts shared by every pass.

mod channels;
mod context;
mod frame;
mod loader;
mod pipeline;
mod targets;
mod uniforms;

pub(crate) use context::GpuContext;
pub(crate) use frame::{FrameEncoder, FrameResources};
pub use loader::{CompiledShader, GpuLoader};
pub(crate) use pipeline::PipelineLayouts;
pub use targets::FeedbackTarget;
pub use channels::ChannelTexture;
