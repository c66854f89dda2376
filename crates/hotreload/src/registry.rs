//! Ownership of every loaded resource and the watch identities pointing at them.
//!
//! The registry holds one binding for the main shader plus one per input
//! channel. All access goes through a single mutex: the render thread holds it
//! for a whole frame via [`ResourceRegistry::with_resources`], and the watch
//! thread takes it for the duration of a reload, so a frame never observes a
//! half-replaced resource.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::resource::{
    BindingHandle, LoadRequest, LoadedResource, OffscreenTarget, Resource, ResourceKind,
    ResourceLoader, Slot, Viewport,
};
use crate::watch::{WatchBackend, WatchError, WatchId};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to load {slot} from {path}: {reason}")]
    ResourceLoad {
        slot: Slot,
        path: PathBuf,
        reason: String,
    },
    #[error("failed to register file watch for {slot}")]
    WatchRegistration {
        slot: Slot,
        #[source]
        source: WatchError,
    },
    #[error("no binding for {0}")]
    UnknownBinding(BindingHandle),
}

/// Where a reload takes its bytes from.
#[derive(Clone, Debug)]
pub enum ReloadSource {
    /// Re-read the binding's path.
    Disk,
    /// Use the supplied bytes instead of touching the filesystem.
    Bytes(Vec<u8>),
}

/// What happened when a watch identity fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadOutcome {
    Reloaded {
        handle: BindingHandle,
        generation: u64,
    },
    /// The binding exists but has auto-reload disabled.
    Skipped(BindingHandle),
    /// No binding was registered under the identity.
    Unknown,
}

/// A loaded resource together with its origin and reload state.
pub struct ChannelBinding<L: ResourceLoader> {
    slot: Slot,
    path: PathBuf,
    resource: LoadedResource<L>,
    auto_reload: bool,
    target: Option<L::Target>,
    watch: Option<WatchId>,
    generation: u64,
}

impl<L: ResourceLoader> ChannelBinding<L> {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn handle(&self) -> BindingHandle {
        match self.slot {
            Slot::Main => BindingHandle::MAIN,
            Slot::Channel(index) => BindingHandle::channel(index),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }

    pub fn resource(&self) -> &LoadedResource<L> {
        &self.resource
    }

    pub fn auto_reload(&self) -> bool {
        self.auto_reload
    }

    pub fn set_auto_reload(&mut self, enabled: bool) {
        self.auto_reload = enabled;
    }

    /// Offscreen target for shader channels; `None` for textures and the main pass.
    pub fn target(&self) -> Option<&L::Target> {
        self.target.as_ref()
    }

    pub fn watch_id(&self) -> Option<WatchId> {
        self.watch
    }

    /// Number of successful reloads since registration.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Maps watch identities to the binding that should reload when they fire.
#[derive(Debug, Default)]
pub struct WatchTable {
    entries: HashMap<WatchId, BindingHandle>,
}

impl WatchTable {
    pub fn insert(&mut self, id: WatchId, handle: BindingHandle) {
        if let Some(previous) = self.entries.insert(id, handle) {
            warn!(watch = %id, %previous, %handle, "watch identity reassigned");
        }
    }

    pub fn resolve(&self, id: WatchId) -> Option<BindingHandle> {
        self.entries.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Store<L: ResourceLoader> {
    main: ChannelBinding<L>,
    channels: Vec<ChannelBinding<L>>,
    watches: WatchTable,
    viewport: Viewport,
}

impl<L: ResourceLoader> Store<L> {
    fn get(&self, handle: BindingHandle) -> Option<&ChannelBinding<L>> {
        match handle.slot() {
            Slot::Main => Some(&self.main),
            Slot::Channel(index) => self.channels.get(index),
        }
    }

    fn get_mut(&mut self, handle: BindingHandle) -> Option<&mut ChannelBinding<L>> {
        match handle.slot() {
            Slot::Main => Some(&mut self.main),
            Slot::Channel(index) => self.channels.get_mut(index),
        }
    }

    fn next_channel(&self) -> Slot {
        Slot::Channel(self.channels.len())
    }
}

/// View over the bindings handed out while the registry lock is held.
pub struct Bindings<'a, L: ResourceLoader> {
    store: &'a mut Store<L>,
}

impl<L: ResourceLoader> Bindings<'_, L> {
    pub fn main(&self) -> &ChannelBinding<L> {
        &self.store.main
    }

    /// Input channels in ascending index order.
    pub fn channels(&self) -> &[ChannelBinding<L>] {
        &self.store.channels
    }

    pub fn get(&self, handle: BindingHandle) -> Option<&ChannelBinding<L>> {
        self.store.get(handle)
    }

    pub fn get_mut(&mut self, handle: BindingHandle) -> Option<&mut ChannelBinding<L>> {
        self.store.get_mut(handle)
    }

    /// Main binding followed by every channel.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelBinding<L>> {
        std::iter::once(&self.store.main).chain(self.store.channels.iter())
    }

    /// Total binding count, main included.
    pub fn len(&self) -> usize {
        self.store.channels.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn viewport(&self) -> Viewport {
        self.store.viewport
    }

    pub fn watches(&self) -> &WatchTable {
        &self.store.watches
    }
}

/// Startup construction of a [`ResourceRegistry`]. Any watch failure here is fatal.
pub struct RegistryBuilder<L: ResourceLoader> {
    loader: L,
    backend: Arc<dyn WatchBackend>,
    store: Store<L>,
}

impl<L: ResourceLoader> RegistryBuilder<L> {
    /// Starts a registry around an already loaded main shader.
    pub fn new(
        loader: L,
        backend: Arc<dyn WatchBackend>,
        viewport: Viewport,
        main_path: &Path,
        main_shader: L::Shader,
        auto_reload: bool,
    ) -> Result<Self, RegistryError> {
        let (path, watch) = subscribe(backend.as_ref(), Slot::Main, main_path)?;
        let mut watches = WatchTable::default();
        watches.insert(watch, BindingHandle::MAIN);
        let main = ChannelBinding {
            slot: Slot::Main,
            path,
            resource: Resource::Shader(main_shader),
            auto_reload,
            target: None,
            watch: Some(watch),
            generation: 0,
        };
        Ok(Self {
            loader,
            backend,
            store: Store {
                main,
                channels: Vec::new(),
                watches,
                viewport,
            },
        })
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Appends the next input channel.
    pub fn register(
        &mut self,
        path: &Path,
        resource: LoadedResource<L>,
        auto_reload: bool,
    ) -> Result<BindingHandle, RegistryError> {
        let slot = self.store.next_channel();
        let (canonical, watch) = subscribe(self.backend.as_ref(), slot, path)?;
        let binding = new_channel(&self.loader, &self.store, slot, canonical, resource, auto_reload);
        Ok(push_channel(&mut self.store, binding, Some(watch)))
    }

    /// Reads and loads `path` into the next channel slot, then registers it.
    ///
    /// Content that fails to read or load is logged and skipped, leaving the
    /// slot for the next channel, and `Ok(None)` is returned. A watch failure
    /// is still fatal.
    pub fn load(
        &mut self,
        path: &Path,
        kind: ResourceKind,
        auto_reload: bool,
    ) -> Result<Option<BindingHandle>, RegistryError> {
        let slot = self.store.next_channel();
        match load_from_disk(&self.loader, slot, path, kind) {
            Ok(resource) => self.register(path, resource, auto_reload).map(Some),
            Err(err) => {
                error!(%slot, %kind, error = %err, "skipping channel");
                Ok(None)
            }
        }
    }

    pub fn build(self) -> ResourceRegistry<L> {
        debug!(
            bindings = self.store.channels.len() + 1,
            watches = self.store.watches.len(),
            "resource registry ready"
        );
        ResourceRegistry {
            loader: self.loader,
            backend: self.backend,
            store: Mutex::new(self.store),
        }
    }
}

/// Shared owner of the main shader and channel bindings.
pub struct ResourceRegistry<L: ResourceLoader> {
    loader: L,
    backend: Arc<dyn WatchBackend>,
    store: Mutex<Store<L>>,
}

impl<L: ResourceLoader> ResourceRegistry<L> {
    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub(crate) fn watch_backend(&self) -> Arc<dyn WatchBackend> {
        Arc::clone(&self.backend)
    }

    /// Runs `f` with exclusive access to every binding.
    ///
    /// Reloads from other threads wait until `f` returns. Calling back into the
    /// registry from inside `f` deadlocks.
    pub fn with_resources<R>(&self, f: impl FnOnce(&mut Bindings<'_, L>) -> R) -> R {
        let mut store = self.store.lock();
        let mut bindings = Bindings { store: &mut store };
        f(&mut bindings)
    }

    /// Total binding count, main included.
    pub fn len(&self) -> usize {
        self.store.lock().channels.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn viewport(&self) -> Viewport {
        self.store.lock().viewport
    }

    pub fn resolve_watch(&self, id: WatchId) -> Option<BindingHandle> {
        self.store.lock().watches.resolve(id)
    }

    /// Appends a channel while the preview is running.
    ///
    /// A watch failure only costs hot-reload for that channel; the binding is
    /// still created.
    pub fn register(
        &self,
        path: &Path,
        resource: LoadedResource<L>,
        auto_reload: bool,
    ) -> BindingHandle {
        let mut store = self.store.lock();
        let slot = store.next_channel();
        let (canonical, watch) = match subscribe(self.backend.as_ref(), slot, path) {
            Ok((canonical, watch)) => (canonical, Some(watch)),
            Err(err) => {
                warn!(%slot, path = %path.display(), error = %err, "registered without hot reload");
                (path.to_path_buf(), None)
            }
        };
        let binding = new_channel(&self.loader, &store, slot, canonical, resource, auto_reload);
        push_channel(&mut store, binding, watch)
    }

    /// Replaces a binding's content in place.
    ///
    /// The new content is fully loaded before anything is swapped; on failure
    /// the binding keeps its previous content and generation. Returns the new
    /// generation.
    pub fn reload(&self, handle: BindingHandle, source: ReloadSource) -> Result<u64, RegistryError> {
        let mut store = self.store.lock();
        let binding = store
            .get_mut(handle)
            .ok_or(RegistryError::UnknownBinding(handle))?;
        reload_binding(&self.loader, binding, source)
    }

    /// Reloads whatever binding `id` points at, honouring its auto-reload flag.
    pub fn reload_watched(&self, id: WatchId) -> Result<ReloadOutcome, RegistryError> {
        let mut guard = self.store.lock();
        let store = &mut *guard;
        let Some(handle) = store.watches.resolve(id) else {
            return Ok(ReloadOutcome::Unknown);
        };
        let binding = store
            .get_mut(handle)
            .ok_or(RegistryError::UnknownBinding(handle))?;
        if !binding.auto_reload {
            return Ok(ReloadOutcome::Skipped(handle));
        }
        let generation = reload_binding(&self.loader, binding, ReloadSource::Disk)?;
        Ok(ReloadOutcome::Reloaded { handle, generation })
    }

    /// Records the new viewport and resizes every offscreen target that differs.
    pub fn resize_targets(&self, viewport: Viewport) {
        let mut store = self.store.lock();
        store.viewport = viewport;
        for binding in &mut store.channels {
            if let Some(target) = binding.target.as_mut() {
                if target.size() != viewport {
                    self.loader.resize_target(target, viewport);
                }
            }
        }
    }
}

fn subscribe(
    backend: &dyn WatchBackend,
    slot: Slot,
    path: &Path,
) -> Result<(PathBuf, WatchId), RegistryError> {
    let canonical = fs::canonicalize(path).map_err(|err| RegistryError::WatchRegistration {
        slot,
        source: WatchError::Subscribe {
            path: path.to_path_buf(),
            source: Box::new(err),
        },
    })?;
    let watch = backend
        .subscribe(&canonical)
        .map_err(|source| RegistryError::WatchRegistration { slot, source })?;
    debug!(%slot, watch = %watch, path = %canonical.display(), "watching");
    Ok((canonical, watch))
}

fn new_channel<L: ResourceLoader>(
    loader: &L,
    store: &Store<L>,
    slot: Slot,
    path: PathBuf,
    resource: LoadedResource<L>,
    auto_reload: bool,
) -> ChannelBinding<L> {
    let target = match resource {
        Resource::Shader(_) => Some(loader.create_target(store.viewport)),
        Resource::Texture(_) => None,
    };
    ChannelBinding {
        slot,
        path,
        resource,
        auto_reload,
        target,
        watch: None,
        generation: 0,
    }
}

fn push_channel<L: ResourceLoader>(
    store: &mut Store<L>,
    mut binding: ChannelBinding<L>,
    watch: Option<WatchId>,
) -> BindingHandle {
    let handle = binding.handle();
    binding.watch = watch;
    if let Some(id) = watch {
        store.watches.insert(id, handle);
    }
    debug!(
        %handle,
        kind = %binding.kind(),
        path = %binding.path.display(),
        "registered channel"
    );
    store.channels.push(binding);
    handle
}

fn load_from_disk<L: ResourceLoader>(
    loader: &L,
    slot: Slot,
    path: &Path,
    kind: ResourceKind,
) -> Result<LoadedResource<L>, RegistryError> {
    let load_error = |reason: String| RegistryError::ResourceLoad {
        slot,
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path).map_err(|err| load_error(err.to_string()))?;
    let request = LoadRequest {
        slot,
        path,
        bytes: &bytes,
    };
    match kind {
        ResourceKind::Shader => loader.load_shader(request).map(Resource::Shader),
        ResourceKind::Texture => loader.load_texture(request).map(Resource::Texture),
    }
    .map_err(|err| load_error(format!("{err:#}")))
}

fn reload_binding<L: ResourceLoader>(
    loader: &L,
    binding: &mut ChannelBinding<L>,
    source: ReloadSource,
) -> Result<u64, RegistryError> {
    let load_error = |reason: String| RegistryError::ResourceLoad {
        slot: binding.slot,
        path: binding.path.clone(),
        reason,
    };
    let bytes = match source {
        ReloadSource::Disk => fs::read(&binding.path).map_err(|err| load_error(err.to_string()))?,
        ReloadSource::Bytes(bytes) => bytes,
    };
    let request = LoadRequest {
        slot: binding.slot,
        path: &binding.path,
        bytes: &bytes,
    };
    let fresh = match binding.resource {
        Resource::Shader(_) => loader.load_shader(request).map(Resource::Shader),
        Resource::Texture(_) => loader.load_texture(request).map(Resource::Texture),
    }
    .map_err(|err| load_error(format!("{err:#}")))?;

    binding.resource = fresh;
    binding.generation += 1;
    Ok(binding.generation)
}
