use std::fmt;
use std::path::Path;

use anyhow::Result;

/// Pixel dimensions shared by the window surface and every offscreen target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Builds a viewport, clamping each axis to at least one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn as_f32(self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Classification of a loaded resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Shader,
    Texture,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Shader => f.write_str("shader"),
            ResourceKind::Texture => f.write_str("texture"),
        }
    }
}

/// Loaded content held by a binding. Reloading replaces the payload but never
/// the variant.
#[derive(Debug)]
pub enum Resource<S, T> {
    Shader(S),
    Texture(T),
}

impl<S, T> Resource<S, T> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Shader(_) => ResourceKind::Shader,
            Resource::Texture(_) => ResourceKind::Texture,
        }
    }

    pub fn as_shader(&self) -> Option<&S> {
        match self {
            Resource::Shader(shader) => Some(shader),
            Resource::Texture(_) => None,
        }
    }

    pub fn as_texture(&self) -> Option<&T> {
        match self {
            Resource::Texture(texture) => Some(texture),
            Resource::Shader(_) => None,
        }
    }
}

/// Position of a binding in the render graph: the main pass or an input channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Main,
    Channel(usize),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Main => f.write_str("main"),
            Slot::Channel(index) => write!(f, "iChannel{index}"),
        }
    }
}

/// Stable handle to a binding owned by the registry.
///
/// Handles stay valid for the registry's lifetime because bindings are only
/// ever appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingHandle(Slot);

impl BindingHandle {
    pub const MAIN: BindingHandle = BindingHandle(Slot::Main);

    pub fn channel(index: usize) -> Self {
        Self(Slot::Channel(index))
    }

    pub fn slot(self) -> Slot {
        self.0
    }
}

impl fmt::Display for BindingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Input handed to a [`ResourceLoader`]: the raw bytes plus where they came from.
#[derive(Clone, Copy, Debug)]
pub struct LoadRequest<'a> {
    pub slot: Slot,
    pub path: &'a Path,
    pub bytes: &'a [u8],
}

/// Offscreen render target sized to the viewport.
pub trait OffscreenTarget: Send {
    fn size(&self) -> Viewport;
}

/// Turns bytes into GPU-ready resources.
///
/// Loaders must be side-effect free on failure so a rejected reload leaves the
/// previously bound content untouched. They are called from the watch thread
/// as well as the render thread.
pub trait ResourceLoader: Send + Sync {
    type Shader: Send;
    type Texture: Send;
    type Target: OffscreenTarget;

    fn load_shader(&self, request: LoadRequest<'_>) -> Result<Self::Shader>;

    fn load_texture(&self, request: LoadRequest<'_>) -> Result<Self::Texture>;

    fn create_target(&self, size: Viewport) -> Self::Target;

    fn resize_target(&self, target: &mut Self::Target, size: Viewport);
}

/// Resource type produced by a given loader.
pub type LoadedResource<L> =
    Resource<<L as ResourceLoader>::Shader, <L as ResourceLoader>::Texture>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_clamps_zero_axes() {
        assert_eq!(Viewport::new(0, 0), Viewport { width: 1, height: 1 });
        assert_eq!(Viewport::new(640, 0).to_string(), "640x1");
    }

    #[test]
    fn slots_order_main_before_channels() {
        let mut slots = vec![Slot::Channel(2), Slot::Main, Slot::Channel(0)];
        slots.sort();
        assert_eq!(slots, vec![Slot::Main, Slot::Channel(0), Slot::Channel(2)]);
        assert_eq!(BindingHandle::channel(1).to_string(), "iChannel1");
    }

    #[test]
    fn resource_accessors_follow_variant() {
        let shader: Resource<&str, u8> = Resource::Shader("void main() {}");
        assert_eq!(shader.kind(), ResourceKind::Shader);
        assert!(shader.as_texture().is_none());
        let texture: Resource<&str, u8> = Resource::Texture(7);
        assert_eq!(texture.as_texture(), Some(&7));
    }
}
