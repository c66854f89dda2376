/// Number of sampler channels (`iChannel0-3`) declared by [`STANDARD_UNIFORMS`].
pub const CHANNEL_COUNT: usize = 4;

/// Declarations injected ahead of user code when uniforms are requested.
///
/// The uniform block layout must match `ShaderInputs` in the renderer's
/// `gpu/uniforms.rs`. ShaderToy names are macros over the block members so user
/// code that shadows them locally still compiles.
pub const STANDARD_UNIFORMS: &str = r"layout(std140, set = 0, binding = 0) uniform ShaderInputs {
    vec3 _iResolution;
    float _iTime;
    float _iTimeDelta;
    int _iFrame;
    vec2 _padding0;
    vec4 _iMouse;
    vec4 _iDate;
    vec4 _iChannelResolution[4];
} shaderlive_inputs;

#define iResolution shaderlive_inputs._iResolution
#define iTime shaderlive_inputs._iTime
#define iTimeDelta shaderlive_inputs._iTimeDelta
#define iFrame shaderlive_inputs._iFrame
#define iMouse shaderlive_inputs._iMouse
#define iDate shaderlive_inputs._iDate
#define iChannelResolution shaderlive_inputs._iChannelResolution

layout(set = 1, binding = 0) uniform texture2D shaderlive_channel0_texture;
layout(set = 1, binding = 1) uniform sampler shaderlive_channel0_sampler;
layout(set = 1, binding = 2) uniform texture2D shaderlive_channel1_texture;
layout(set = 1, binding = 3) uniform sampler shaderlive_channel1_sampler;
layout(set = 1, binding = 4) uniform texture2D shaderlive_channel2_texture;
layout(set = 1, binding = 5) uniform sampler shaderlive_channel2_sampler;
layout(set = 1, binding = 6) uniform texture2D shaderlive_channel3_texture;
layout(set = 1, binding = 7) uniform sampler shaderlive_channel3_sampler;

#define iChannel0 sampler2D(shaderlive_channel0_texture, shaderlive_channel0_sampler)
#define iChannel1 sampler2D(shaderlive_channel1_texture, shaderlive_channel1_sampler)
#define iChannel2 sampler2D(shaderlive_channel2_texture, shaderlive_channel2_sampler)
#define iChannel3 sampler2D(shaderlive_channel3_texture, shaderlive_channel3_sampler)
";

/// Uniform names provided by [`STANDARD_UNIFORMS`]; user declarations of these
/// clash with the injected macros.
pub const STANDARD_UNIFORM_NAMES: [&str; 11] = [
    "iResolution",
    "iTimeDelta",
    "iTime",
    "iFrame",
    "iMouse",
    "iDate",
    "iChannelResolution",
    "iChannel0",
    "iChannel1",
    "iChannel2",
    "iChannel3",
];
