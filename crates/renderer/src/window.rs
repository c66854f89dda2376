use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use hotreload::{
    FileWatchService, FrameInput, LoadRequest, NotifyBackend, PointerState, RegistryBuilder,
    RenderGraphExecutor, ResourceLoader, ResourceRegistry, ShutdownToken, Slot, Viewport,
    WatchBackend,
};
use tracing::{debug, error, info, trace, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::gpu::{
    CompiledShader, FrameEncoder, FrameResources, GpuContext, GpuLoader, PipelineLayouts,
};
use crate::types::RendererConfig;

/// Opens the preview window and renders until it closes or `token` is
/// cancelled. Startup failures and render failures are returned as errors.
pub(crate) fn run_window_preview(config: &RendererConfig, token: ShutdownToken) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut ctx = GpuContext::new(window.clone(), window.inner_size())?;
    let layouts = Arc::new(PipelineLayouts::new(&ctx.device));
    let resources = FrameResources::new(&ctx.device, &ctx.queue, &layouts);
    let loader = GpuLoader::new(
        ctx.device.clone(),
        ctx.queue.clone(),
        layouts.clone(),
        ctx.surface_format(),
        config.allow_includes,
    );
    let viewport = Viewport::new(ctx.size.width, ctx.size.height);

    let registry = Arc::new(build_registry(config, loader, viewport)?);
    let service = FileWatchService::spawn(registry.clone(), token.clone(), config.watch_interval)
        .context("failed to start file watch thread")?;
    info!(
        shader = %config.shader.display(),
        channels = registry.len() - 1,
        %viewport,
        "preview running"
    );

    let shared: &ResourceRegistry<GpuLoader> = &registry;
    let mut executor = RenderGraphExecutor::new(viewport);
    let mut pointer = PointerState::default();
    let mut failure: Option<anyhow::Error> = None;

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                token.cancel();
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                if new_size.width == 0 || new_size.height == 0 {
                    return;
                }
                ctx.resize(new_size);
                let viewport = Viewport::new(new_size.width, new_size.height);
                executor.resize(shared, viewport);
                debug!(%viewport, "viewport resized");
            }
            WindowEvent::CursorMoved { position, .. } => {
                pointer.moved(position.x, position.y);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => pointer.pressed(),
                ElementState::Released => pointer.released(),
            },
            WindowEvent::RedrawRequested => {
                let frame = match ctx.surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        ctx.reconfigure();
                        return;
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        warn!("surface timeout; retrying next frame");
                        return;
                    }
                    Err(err) => {
                        failure = Some(anyhow!("failed to acquire surface texture: {err}"));
                        elwt.exit();
                        return;
                    }
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let mut encoder =
                    FrameEncoder::new(&ctx.device, &ctx.queue, &layouts, &resources, &view);
                let input = FrameInput {
                    now: Instant::now(),
                    pointer: pointer.normalized(executor.viewport()),
                };
                let rendered = executor.render_frame(shared, &mut encoder, input);
                drop(encoder);
                match rendered {
                    Ok(uniforms) => {
                        frame.present();
                        trace!(frame = uniforms.frame, time = uniforms.time, "frame presented");
                    }
                    Err(err) => {
                        error!(error = %err, "render failed");
                        failure = Some(anyhow::Error::new(err).context("render failed"));
                        elwt.exit();
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if token.is_cancelled() {
                elwt.exit();
            } else {
                elwt.set_control_flow(ControlFlow::Poll);
                window.request_redraw();
            }
        }
        _ => {}
    });

    service.shutdown();
    info!(frames = executor.frames(), "preview stopped");

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Loads the main shader and every configured channel.
///
/// A main shader that fails to load is replaced by [`FALLBACK_SHADER`] under
/// the real path, so the first good save swaps it in. Channels that fail to
/// load are skipped. Only watch and file-watcher failures are fatal.
fn build_registry(
    config: &RendererConfig,
    loader: GpuLoader,
    viewport: Viewport,
) -> Result<ResourceRegistry<GpuLoader>> {
    let backend: Arc<dyn WatchBackend> =
        Arc::new(NotifyBackend::new().context("failed to initialise file watcher")?);

    let main_shader = load_main_shader(&loader, &config.shader)?;
    let mut builder = RegistryBuilder::new(
        loader,
        backend,
        viewport,
        &config.shader,
        main_shader,
        config.auto_reload,
    )?;

    for source in &config.channels {
        if let Some(handle) = builder.load(source.path(), source.kind(), config.auto_reload)? {
            debug!(%handle, kind = %source.kind(), path = %source.path().display(), "registered channel");
        }
    }

    Ok(builder.build())
}

/// Solid magenta, shown until the main shader compiles.
const FALLBACK_SHADER: &str = "void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = vec4(1.0, 0.0, 1.0, 1.0);
}
";

fn load_main_shader(loader: &GpuLoader, path: &Path) -> Result<CompiledShader> {
    let loaded = fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))
        .and_then(|bytes| {
            loader.load_shader(LoadRequest {
                slot: Slot::Main,
                path,
                bytes: &bytes,
            })
        });
    match loaded {
        Ok(shader) => Ok(shader),
        Err(err) => {
            error!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "main shader failed to load; showing fallback until the next save"
            );
            loader
                .load_shader(LoadRequest {
                    slot: Slot::Main,
                    path,
                    bytes: FALLBACK_SHADER.as_bytes(),
                })
                .context("failed to compile fallback shader")
        }
    }
}
