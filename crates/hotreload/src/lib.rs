//! Hot-reload core for the shaderlive preview.
//!
//! ```text
//!   NotifyBackend ──▶ FileWatchService (thread) ──▶ ResourceRegistry::reload_watched
//!                                                          │ (mutex)
//!   window loop ──▶ RenderGraphExecutor::render_frame ─────┘
//!                          │ channel passes (ascending), main pass, submit
//!                          ▼
//!                    RenderBackend
//! ```
//!
//! Nothing here touches the GPU directly. Resource creation goes through a
//! [`ResourceLoader`] and drawing through a [`RenderBackend`]; the renderer
//! crate supplies both.

mod clock;
mod graph;
mod notify_backend;
mod registry;
mod resource;
mod service;
mod watch;

pub use clock::{FrameClock, FrameTime, FrameUniforms, PointerState};
pub use graph::{
    ChannelInput, ChannelPass, FrameInput, MainPass, RenderBackend, RenderError,
    RenderGraphExecutor, Side,
};
pub use notify_backend::NotifyBackend;
pub use registry::{
    Bindings, ChannelBinding, RegistryBuilder, RegistryError, ReloadOutcome, ReloadSource,
    ResourceRegistry, WatchTable,
};
pub use resource::{
    BindingHandle, LoadRequest, LoadedResource, OffscreenTarget, Resource, ResourceKind,
    ResourceLoader, Slot, Viewport,
};
pub use service::{FileWatchService, Tick, WatchLoop};
pub use watch::{
    ShutdownToken, WatchBackend, WatchError, WatchEvent, WatchId, WatchPoll,
    DEFAULT_WAIT_INTERVAL,
};
