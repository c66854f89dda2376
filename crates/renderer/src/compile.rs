use std::borrow::Cow;
use std::path::Path;

use hotreload::Slot;
use preprocess::{PreprocessError, Preprocessor, STANDARD_UNIFORM_NAMES};
use wgpu::naga::ShaderStage;

/// Which pass a fragment shader is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PassKind {
    /// Draws to the window; `fragCoord` is flipped to a bottom-left origin.
    Main,
    /// Draws into an offscreen feedback target in texture orientation.
    Channel,
}

impl PassKind {
    pub(crate) fn for_slot(slot: Slot) -> Self {
        match slot {
            Slot::Main => PassKind::Main,
            Slot::Channel(_) => PassKind::Channel,
        }
    }
}

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen triangle vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Compiles already wrapped GLSL. Validation errors surface through the
/// device error scope opened by the caller.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    label: &str,
    wrapped: String,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Produces a self-contained GLSL fragment shader from ShaderToy-style code.
///
/// 1. Strip the `#version` directive and user declarations of the standard
///    uniforms.
/// 2. Run the preprocessor: includes resolve relative to `origin`'s directory
///    and the standard uniform block is prepended.
/// 3. Prepend [`HEADER`] and append the footer for `pass`, which calls
///    `mainImage` and writes `outColor`.
pub(crate) fn wrap_fragment(
    source: &str,
    origin: &Path,
    pass: PassKind,
    allow_includes: bool,
) -> Result<String, PreprocessError> {
    let sanitized = sanitize(source);
    let mut preprocessor = Preprocessor::new()
        .allow_includes(allow_includes)
        .add_uniforms(true);
    if let Some(directory) = origin.parent() {
        preprocessor = preprocessor.include_root(directory);
    }
    let body = preprocessor.run(&sanitized)?;
    let footer = match pass {
        PassKind::Main => MAIN_FOOTER,
        PassKind::Channel => CHANNEL_FOOTER,
    };
    Ok(format!("{HEADER}\n{body}\n{footer}"))
}

fn sanitize(source: &str) -> String {
    let mut sanitized = String::with_capacity(source.len());
    let mut skipped_version = false;
    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            continue;
        }
        let redeclares_standard = trimmed.starts_with("uniform ")
            && trimmed
                .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .any(|token| STANDARD_UNIFORM_NAMES.contains(&token));
        if redeclares_standard {
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }
    sanitized
}

/// GLSL prologue placed ahead of the preprocessed shader.
const HEADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

vec4 shaderlive_gl_FragCoord;
#define gl_FragCoord shaderlive_gl_FragCoord
";

const MAIN_FOOTER: &str = r"void main() {
    #undef gl_FragCoord
    vec2 builtinFC = vec2(gl_FragCoord.x, gl_FragCoord.y);
    #define gl_FragCoord shaderlive_gl_FragCoord

    vec2 fragCoord = vec2(builtinFC.x, iResolution.y - builtinFC.y);
    shaderlive_gl_FragCoord = vec4(fragCoord, 0.0, 1.0);

    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    outColor = vec4(color.rgb, 1.0);
}
";

const CHANNEL_FOOTER: &str = r"void main() {
    #undef gl_FragCoord
    vec2 fragCoord = vec2(gl_FragCoord.x, gl_FragCoord.y);
    #define gl_FragCoord shaderlive_gl_FragCoord

    shaderlive_gl_FragCoord = vec4(fragCoord, 0.0, 1.0);

    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    outColor = color;
}
";

/// Minimal full-screen triangle vertex shader.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";
