use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "shaderlive",
    author,
    version,
    about = "Live ShaderToy-style fragment shader preview with hot reload"
)]
pub struct Args {
    /// Main fragment shader, written against `mainImage(out vec4, in vec2)`.
    #[arg(value_name = "SHADER")]
    pub shader: PathBuf,

    /// Inputs bound to `iChannel0..3` in order. Shader sources render into
    /// feedback buffers; anything else is loaded as an image.
    #[arg(value_name = "CHANNEL")]
    pub channels: Vec<PathBuf>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_surface_size,
        default_value = "800x800"
    )]
    pub size: (u32, u32),

    /// Keep watching files but do not reload them on change.
    #[arg(long)]
    pub no_auto_reload: bool,

    /// How long the watch thread blocks waiting for file events.
    #[arg(
        long,
        value_name = "MILLISECONDS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub watch_interval_ms: u64,

    /// Leave `#include` lines in shader sources untouched.
    #[arg(long)]
    pub no_includes: bool,

    /// Window title.
    #[arg(long, default_value = "shaderlive")]
    pub title: String,
}

impl Args {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

pub fn parse() -> Result<Args, clap::Error> {
    Args::try_parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}' in size specification", width.trim()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}' in size specification", height.trim()))?;

    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}
