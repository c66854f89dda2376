use std::sync::Arc;

use anyhow::{Context, Result};
use hotreload::{LoadRequest, ResourceLoader, Viewport};

use crate::compile::{compile_fragment_shader, wrap_fragment, PassKind};

use super::channels::{load_texture_channel, ChannelTexture};
use super::pipeline::{create_pipeline, PipelineLayouts};
use super::targets::{FeedbackTarget, FEEDBACK_FORMAT};

/// Fragment pipeline built for one pass.
pub struct CompiledShader {
    pub(crate) pipeline: wgpu::RenderPipeline,
}

/// Builds GPU resources from source bytes. Used from the window thread at
/// startup and from the watch thread on reload.
pub struct GpuLoader {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layouts: Arc<PipelineLayouts>,
    surface_format: wgpu::TextureFormat,
    allow_includes: bool,
}

impl GpuLoader {
    pub(crate) fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        layouts: Arc<PipelineLayouts>,
        surface_format: wgpu::TextureFormat,
        allow_includes: bool,
    ) -> Self {
        Self {
            device,
            queue,
            layouts,
            surface_format,
            allow_includes,
        }
    }
}

impl ResourceLoader for GpuLoader {
    type Shader = CompiledShader;
    type Texture = ChannelTexture;
    type Target = FeedbackTarget;

    fn load_shader(&self, request: LoadRequest<'_>) -> Result<CompiledShader> {
        let source =
            std::str::from_utf8(request.bytes).context("shader source is not valid UTF-8")?;
        let pass = PassKind::for_slot(request.slot);
        let wrapped = wrap_fragment(source, request.path, pass, self.allow_includes)
            .context("failed to preprocess shader")?;
        tracing::trace!(slot = %request.slot, source = %wrapped, "wrapped fragment shader");

        let format = match pass {
            PassKind::Main => self.surface_format,
            PassKind::Channel => FEEDBACK_FORMAT,
        };
        let label = format!("{} fragment", request.slot);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = compile_fragment_shader(&self.device, &label, wrapped);
        let pipeline = create_pipeline(&self.device, &self.layouts, &module, format, &label);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            anyhow::bail!("shader failed to compile: {error}");
        }

        tracing::debug!(slot = %request.slot, path = %request.path.display(), "compiled shader");
        Ok(CompiledShader { pipeline })
    }

    fn load_texture(&self, request: LoadRequest<'_>) -> Result<ChannelTexture> {
        let label = format!("{} texture", request.slot);
        let texture = load_texture_channel(&self.device, &self.queue, &label, request.bytes)
            .with_context(|| format!("failed to load texture {}", request.path.display()))?;
        tracing::debug!(
            slot = %request.slot,
            width = texture.resolution[0],
            height = texture.resolution[1],
            "uploaded texture"
        );
        Ok(texture)
    }

    fn create_target(&self, size: Viewport) -> FeedbackTarget {
        FeedbackTarget::new(&self.device, "feedback target".to_owned(), size)
    }

    fn resize_target(&self, target: &mut FeedbackTarget, size: Viewport) {
        target.resize(&self.device, size);
    }
}
