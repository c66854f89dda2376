use hotreload::{ChannelInput, ChannelPass, FrameUniforms, MainPass, RenderBackend, RenderError};
use preprocess::CHANNEL_COUNT;
use wgpu::util::DeviceExt;

use super::channels::{create_placeholder_texture, create_sampler, ChannelTexture};
use super::loader::GpuLoader;
use super::pipeline::{build_channel_entries, PipelineLayouts};
use super::uniforms::ShaderInputs;

/// GPU objects that live for the whole session and are shared by every pass.
pub(crate) struct FrameResources {
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    placeholder: ChannelTexture,
}

impl FrameResources {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue, layouts: &PipelineLayouts) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("shader inputs"),
            contents: bytemuck::bytes_of(&<ShaderInputs as bytemuck::Zeroable>::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        Self {
            uniform_buffer,
            uniform_bind_group,
            sampler: create_sampler(device),
            placeholder: create_placeholder_texture(device, queue),
        }
    }
}

/// Records one frame's passes into a single command encoder.
pub(crate) struct FrameEncoder<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    layouts: &'a PipelineLayouts,
    resources: &'a FrameResources,
    surface_view: &'a wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    uniforms_written: bool,
    scope_open: bool,
}

impl<'a> FrameEncoder<'a> {
    pub(crate) fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        layouts: &'a PipelineLayouts,
        resources: &'a FrameResources,
        surface_view: &'a wgpu::TextureView,
    ) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("shaderlive frame"),
        });
        Self {
            device,
            queue,
            layouts,
            resources,
            surface_view,
            encoder,
            uniforms_written: false,
            scope_open: true,
        }
    }

    fn write_uniforms(&mut self, inputs: &[ChannelInput<'_, GpuLoader>], frame: &FrameUniforms) {
        if self.uniforms_written {
            return;
        }
        let mut channel_resolution = [[1.0, 1.0, 1.0, 0.0]; CHANNEL_COUNT];
        for (slot, input) in channel_resolution.iter_mut().zip(inputs) {
            *slot = match input {
                ChannelInput::Texture(texture) => texture.resolution,
                ChannelInput::Feedback { target, .. } => target.resolution(),
            };
        }
        let uniforms = ShaderInputs::from_frame(frame, channel_resolution);
        self.queue
            .write_buffer(&self.resources.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.uniforms_written = true;
    }

    fn draw(
        &mut self,
        label: &str,
        pipeline: &wgpu::RenderPipeline,
        target: &wgpu::TextureView,
        inputs: &[ChannelInput<'_, GpuLoader>],
    ) {
        let mut views = [&self.resources.placeholder.view; CHANNEL_COUNT];
        for (slot, input) in views.iter_mut().zip(inputs) {
            *slot = match input {
                ChannelInput::Texture(texture) => &texture.view,
                ChannelInput::Feedback { target, side } => target.view(*side),
            };
        }
        let channel_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layouts.channel_layout,
            entries: &build_channel_entries(&views, &self.resources.sampler),
        });

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.resources.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &channel_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }

    fn close_scope(&mut self) -> Option<wgpu::Error> {
        if !self.scope_open {
            return None;
        }
        self.scope_open = false;
        pollster::block_on(self.device.pop_error_scope())
    }
}

impl RenderBackend for FrameEncoder<'_> {
    type Loader = GpuLoader;

    fn draw_channel(&mut self, pass: &ChannelPass<'_, GpuLoader>) -> Result<(), RenderError> {
        self.write_uniforms(pass.inputs, pass.uniforms);
        let label = format!("iChannel{} pass", pass.index);
        self.draw(
            &label,
            &pass.shader.pipeline,
            pass.target.view(pass.write),
            pass.inputs,
        );
        Ok(())
    }

    fn draw_main(&mut self, pass: &MainPass<'_, GpuLoader>) -> Result<(), RenderError> {
        self.write_uniforms(pass.inputs, pass.uniforms);
        let surface_view = self.surface_view;
        self.draw("main pass", &pass.shader.pipeline, surface_view, pass.inputs);
        Ok(())
    }

    fn submit(&mut self) -> Result<(), RenderError> {
        let encoder = std::mem::replace(
            &mut self.encoder,
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None }),
        );
        self.queue.submit(Some(encoder.finish()));
        match self.close_scope() {
            Some(error) => Err(RenderError::Backend(error.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for FrameEncoder<'_> {
    fn drop(&mut self) {
        if let Some(error) = self.close_scope() {
            tracing::warn!(%error, "GPU validation error in abandoned frame");
        }
    }
}
