#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use crossbeam_channel::{Receiver, Sender};
use hotreload::{
    ChannelInput, ChannelPass, LoadRequest, MainPass, OffscreenTarget, RegistryBuilder,
    RenderBackend, RenderError, Resource, ResourceLoader, ResourceRegistry, Side, Viewport,
    WatchBackend, WatchError, WatchEvent, WatchId, WatchPoll,
};
use parking_lot::Mutex;

pub const MAIN_SOURCE: &str = "main v1";

/// Loads files as UTF-8 text. Shaders containing `#error` and textures
/// starting with `BAD` are rejected.
pub struct TextLoader;

#[derive(Debug)]
pub struct MemoryTarget {
    pub size: Viewport,
    pub resizes: u32,
}

impl OffscreenTarget for MemoryTarget {
    fn size(&self) -> Viewport {
        self.size
    }
}

impl ResourceLoader for TextLoader {
    type Shader = String;
    type Texture = String;
    type Target = MemoryTarget;

    fn load_shader(&self, request: LoadRequest<'_>) -> Result<String> {
        let text = std::str::from_utf8(request.bytes)?;
        if text.contains("#error") {
            bail!("{}: syntax error", request.path.display());
        }
        Ok(text.to_owned())
    }

    fn load_texture(&self, request: LoadRequest<'_>) -> Result<String> {
        if request.bytes.starts_with(b"BAD") {
            bail!("unreadable image");
        }
        Ok(String::from_utf8_lossy(request.bytes).into_owned())
    }

    fn create_target(&self, size: Viewport) -> MemoryTarget {
        MemoryTarget { size, resizes: 0 }
    }

    fn resize_target(&self, target: &mut MemoryTarget, size: Viewport) {
        target.size = size;
        target.resizes += 1;
    }
}

/// Watch backend driven by the test: subscriptions always succeed and events
/// are delivered only when pushed.
pub struct ScriptedBackend {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<(PathBuf, WatchId)>>,
    sender: Sender<WatchPoll>,
    receiver: Receiver<WatchPoll>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Arc::new(Self {
            next_id: AtomicU64::new(0),
            subscriptions: Mutex::new(Vec::new()),
            sender,
            receiver,
        })
    }

    pub fn ids_for(&self, path: &Path) -> Vec<WatchId> {
        let canonical = fs::canonicalize(path).expect("canonical path");
        self.subscriptions
            .lock()
            .iter()
            .filter(|(watched, _)| *watched == canonical)
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn push(&self, events: Vec<WatchEvent>) {
        self.sender.send(WatchPoll::Ready(events)).expect("push events");
    }

    pub fn changed(&self, id: WatchId) {
        self.push(vec![WatchEvent::Changed { id, name: None }]);
    }

    pub fn close(&self) {
        self.sender.send(WatchPoll::Closed).expect("close");
    }
}

impl WatchBackend for ScriptedBackend {
    fn subscribe(&self, path: &Path) -> Result<WatchId, WatchError> {
        let id = WatchId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscriptions.lock().push((path.to_path_buf(), id));
        Ok(id)
    }

    fn wait(&self, timeout: Duration) -> WatchPoll {
        self.receiver.recv_timeout(timeout).unwrap_or(WatchPoll::Idle)
    }
}

pub fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

/// Channel description for [`build_registry`].
pub enum Channel<'a> {
    Shader(&'a Path),
    Texture(&'a Path),
}

pub fn build_registry(
    backend: Arc<dyn WatchBackend>,
    viewport: Viewport,
    main: &Path,
    channels: &[Channel<'_>],
    auto_reload: bool,
) -> ResourceRegistry<TextLoader> {
    let main_source = fs::read_to_string(main).expect("read main");
    let mut builder = RegistryBuilder::new(
        TextLoader,
        backend,
        viewport,
        main,
        main_source,
        auto_reload,
    )
    .expect("registry builder");
    for channel in channels {
        let (path, resource) = match channel {
            Channel::Shader(path) => (*path, Resource::Shader(read(path))),
            Channel::Texture(path) => (*path, Resource::Texture(read(path))),
        };
        builder
            .register(path, resource, auto_reload)
            .expect("register channel");
    }
    builder.build()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read channel")
}

pub fn shader_text(registry: &ResourceRegistry<TextLoader>, handle: hotreload::BindingHandle) -> String {
    registry.with_resources(|bindings| {
        let binding = bindings.get(handle).expect("binding");
        match binding.resource() {
            Resource::Shader(text) | Resource::Texture(text) => text.clone(),
        }
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Texture(String),
    Feedback(Side),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Draw {
    Channel {
        index: usize,
        shader: String,
        write: Side,
        target: Viewport,
        inputs: Vec<Input>,
    },
    Main {
        shader: String,
        frame: u64,
        inputs: Vec<Input>,
    },
    Submit,
}

fn describe(inputs: &[ChannelInput<'_, TextLoader>]) -> Vec<Input> {
    inputs
        .iter()
        .map(|input| match input {
            ChannelInput::Texture(text) => Input::Texture((*text).clone()),
            ChannelInput::Feedback { side, .. } => Input::Feedback(*side),
        })
        .collect()
}

/// Records every call. Optionally signals and stalls inside each channel pass.
#[derive(Default)]
pub struct RecordingBackend {
    pub draws: Vec<Draw>,
    pub stall: Option<(Sender<()>, Duration)>,
}

impl RecordingBackend {
    pub fn take(&mut self) -> Vec<Draw> {
        std::mem::take(&mut self.draws)
    }
}

impl RenderBackend for RecordingBackend {
    type Loader = TextLoader;

    fn draw_channel(&mut self, pass: &ChannelPass<'_, TextLoader>) -> Result<(), RenderError> {
        if let Some((started, pause)) = &self.stall {
            let _ = started.send(());
            thread::sleep(*pause);
        }
        self.draws.push(Draw::Channel {
            index: pass.index,
            shader: pass.shader.clone(),
            write: pass.write,
            target: pass.target.size(),
            inputs: describe(pass.inputs),
        });
        Ok(())
    }

    fn draw_main(&mut self, pass: &MainPass<'_, TextLoader>) -> Result<(), RenderError> {
        self.draws.push(Draw::Main {
            shader: pass.shader.clone(),
            frame: pass.uniforms.frame,
            inputs: describe(pass.inputs),
        });
        Ok(())
    }

    fn submit(&mut self) -> Result<(), RenderError> {
        self.draws.push(Draw::Submit);
        Ok(())
    }
}
