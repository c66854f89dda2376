use std::path::{Path, PathBuf};
use std::time::Duration;

use hotreload::{ResourceKind, DEFAULT_WAIT_INTERVAL};

/// File extensions treated as fragment shader sources; anything else on the
/// command line is loaded as an image.
pub const SHADER_EXTENSIONS: [&str; 5] = ["glsl", "frag", "fsh", "fs", "shader"];

/// Describes how a channel should be populated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelSource {
    Shader { path: PathBuf },
    Texture { path: PathBuf },
}

impl ChannelSource {
    /// Classifies `path` by extension (case-insensitive).
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_shader_path(&path) {
            ChannelSource::Shader { path }
        } else {
            ChannelSource::Texture { path }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ChannelSource::Shader { path } | ChannelSource::Texture { path } => path,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ChannelSource::Shader { .. } => ResourceKind::Shader,
            ChannelSource::Texture { .. } => ResourceKind::Texture,
        }
    }
}

pub fn is_shader_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SHADER_EXTENSIONS
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Configuration for the preview window.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub shader: PathBuf,
    pub channels: Vec<ChannelSource>,
    pub surface_size: (u32, u32),
    pub auto_reload: bool,
    pub watch_interval: Duration,
    pub allow_includes: bool,
    pub title: String,
}

impl RendererConfig {
    pub fn new(shader: impl Into<PathBuf>) -> Self {
        Self {
            shader: shader.into(),
            channels: Vec::new(),
            surface_size: (800, 800),
            auto_reload: true,
            watch_interval: DEFAULT_WAIT_INTERVAL,
            allow_includes: true,
            title: "shaderlive".to_owned(),
        }
    }
}
