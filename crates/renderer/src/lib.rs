//! Renderer crate for shaderlive.
//!
//! Glues the preview window, the `wgpu` pipelines and the hot-reload core
//! together. The overall flow is:
//!
//! ```text
//!   CLI
//!    │ RendererConfig
//!    ▼
//!   Renderer::run ──▶ winit event loop ──▶ RenderGraphExecutor ──▶ FrameEncoder ──▶ surface
//!                          │                       ▲
//!                          │ spawns                │ registry lock
//!                          ▼                       │
//!                   FileWatchService ──▶ ResourceRegistry ◀── GpuLoader (compile/upload)
//! ```
//!
//! Fragment shaders are written in the ShaderToy dialect (`mainImage`). They
//! are preprocessed, wrapped into Vulkan GLSL and compiled through naga. A
//! shader that fails to compile on reload is logged and the previous pipeline
//! keeps rendering.

mod compile;
mod gpu;
mod types;
mod window;

use anyhow::Result;
use hotreload::ShutdownToken;

pub use gpu::{ChannelTexture, CompiledShader, FeedbackTarget, GpuLoader};
pub use types::{is_shader_path, ChannelSource, RendererConfig, SHADER_EXTENSIONS};

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Opens the preview window and blocks until it is closed or `token` is
    /// cancelled.
    ///
    /// Returns an error if the window, GPU or any startup resource fails to
    /// initialise, or if a frame fails to render.
    pub fn run(&self, token: ShutdownToken) -> Result<()> {
        window::run_window_preview(&self.config, token)
    }
}
