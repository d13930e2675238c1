//! Wraps ShaderToy pass bodies into self-contained Vulkan GLSL and compiles
//! them through naga.
//!
//! Validation runs on the CPU before any module is handed to `wgpu`, so a
//! broken pass produces a captured diagnostic instead of a device error.

use std::borrow::Cow;

use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

/// Why a pass failed to compile. The embedded text is the naga diagnostic
/// rendered against the wrapped source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("GLSL parse error:\n{0}")]
    Parse(String),
    #[error("shader validation error:\n{0}")]
    Validation(String),
}

/// Produces a self-contained GLSL fragment shader from one pass of a
/// ShaderToy paste.
///
/// Steps performed:
///
/// 1. Strip `#version` directives and ShaderToy uniform declarations from the
///    common section and the pass body so our own definitions win.
/// 2. Prepend [`HEADER`], which declares the uniform block, the four channel
///    texture/sampler pairs, and macro aliases for the ShaderToy names.
/// 3. Inject the common section ahead of the pass body.
/// 4. Append [`FOOTER`], which remaps `gl_FragCoord` to ShaderToy's
///    bottom-left origin, calls `mainImage`, and writes `outColor`.
pub(crate) fn wrap_pass_fragment(common: &str, body: &str) -> String {
    let common = sanitize(common);
    let body = sanitize(body);
    format!("{HEADER}\n{common}\n#line 1\n{body}{FOOTER}")
}

/// Removes declarations the header re-introduces.
fn sanitize(source: &str) -> String {
    let mut kept = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") {
            continue;
        }
        let redeclares_builtin = trimmed.starts_with("uniform ")
            && [
                "iResolution",
                "iTimeDelta",
                "iTime",
                "iFrame",
                "iMouse",
                "iDate",
                "iSampleRate",
                "iChannelTime",
                "iChannelResolution",
                "iChannel0",
                "iChannel1",
                "iChannel2",
                "iChannel3",
            ]
            .iter()
            .any(|name| trimmed.contains(name));
        if redeclares_builtin {
            continue;
        }
        kept.push_str(line);
        kept.push('\n');
    }
    kept
}

/// Parses and validates a wrapped fragment shader without touching the GPU.
pub(crate) fn validate_fragment(wrapped: &str) -> Result<(), CompileError> {
    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(ShaderStage::Fragment), wrapped)
        .map_err(|errors| CompileError::Parse(errors.emit_to_string(wrapped)))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|error| CompileError::Validation(error.emit_to_string(wrapped)))?;
    Ok(())
}

/// Builds the shader module for an already-validated wrapped source.
pub(crate) fn create_fragment_module(
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

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn create_vertex_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen triangle vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// GLSL prologue injected ahead of every pass.
///
/// The uniform block layout must match `PassUniforms` in `uniforms.rs`. The
/// fourth component of `_iResolution` mirrors `iTime` so GLSL front-ends that
/// collapse vec3 padding still see an animating value.
const HEADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform PassParams {
    vec3 _iResolution;
    float _iTime;
    float _iTimeDelta;
    int _iFrame;
    float _iSampleRate;
    vec4 _iMouse;
    vec4 _iDate;
    float _iChannelTime[4];
    vec3 _iChannelResolution[4];
} ubo;

// Map ShaderToy names to our UBO fields via macros to avoid name clashes.
#define iResolution ubo._iResolution
#define iTime ubo._iTime
#define iTimeDelta ubo._iTimeDelta
#define iFrame ubo._iFrame
#define iMouse ubo._iMouse
#define iDate ubo._iDate
#define iSampleRate ubo._iSampleRate
#define iChannelTime ubo._iChannelTime
#define iChannelResolution ubo._iChannelResolution

layout(set = 1, binding = 0) uniform texture2D glowpaper_channel0_texture;
layout(set = 1, binding = 1) uniform sampler glowpaper_channel0_sampler;
layout(set = 1, binding = 2) uniform texture2D glowpaper_channel1_texture;
layout(set = 1, binding = 3) uniform sampler glowpaper_channel1_sampler;
layout(set = 1, binding = 4) uniform texture2D glowpaper_channel2_texture;
layout(set = 1, binding = 5) uniform sampler glowpaper_channel2_sampler;
layout(set = 1, binding = 6) uniform texture2D glowpaper_channel3_texture;
layout(set = 1, binding = 7) uniform sampler glowpaper_channel3_sampler;

#define iChannel0 sampler2D(glowpaper_channel0_texture, glowpaper_channel0_sampler)
#define iChannel1 sampler2D(glowpaper_channel1_texture, glowpaper_channel1_sampler)
#define iChannel2 sampler2D(glowpaper_channel2_texture, glowpaper_channel2_sampler)
#define iChannel3 sampler2D(glowpaper_channel3_texture, glowpaper_channel3_sampler)

vec4 glowpaper_gl_FragCoord;
#define gl_FragCoord glowpaper_gl_FragCoord
";

/// GLSL epilogue that remaps coordinates and delegates to `mainImage`.
const FOOTER: &str = r"void main() {
    // Capture the real builtin gl_FragCoord, then remap to ShaderToy's
    // bottom-left origin. The macro is undefined briefly so the hardware
    // builtin is readable.
    #undef gl_FragCoord
    vec2 builtinFC = vec2(gl_FragCoord.x, gl_FragCoord.y);
    #define gl_FragCoord glowpaper_gl_FragCoord

    vec2 fragCoord = vec2(builtinFC.x, iResolution.y - builtinFC.y);
    glowpaper_gl_FragCoord = vec4(fragCoord, 0.0, 1.0);

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_strips_version_and_builtin_uniforms() {
        let body = r#"
            #version 300 es
            uniform float iTime;
            uniform vec3 iResolution;
            void mainImage(out vec4 fragColor, in vec2 fragCoord) {
                fragColor = vec4(fragCoord, 0.0, 1.0);
            }
        "#;
        let wrapped = wrap_pass_fragment("", body);
        assert!(!wrapped.contains("uniform float iTime"));
        assert!(!wrapped.contains("uniform vec3 iResolution"));
        assert!(!wrapped.contains("#version 300 es"));
        assert!(wrapped.contains("mainImage"));
    }

    #[test]
    fn wrap_places_common_section_before_body() {
        let common = "float shared_gain() { return 0.5; }\n";
        let body = "void mainImage(out vec4 c, in vec2 f) { c = vec4(shared_gain()); }\n";
        let wrapped = wrap_pass_fragment(common, body);
        let common_at = wrapped.find("shared_gain()").unwrap();
        let body_at = wrapped.find("void mainImage").unwrap();
        assert!(common_at < body_at);
    }

    #[test]
    fn valid_pass_passes_validation() {
        let body = r#"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    vec3 tint = texture(iChannel0, uv).rgb;
    fragColor = vec4(tint * abs(sin(iTime)), 1.0);
}
"#;
        let wrapped = wrap_pass_fragment("", body);
        validate_fragment(&wrapped).expect("wrapped pass should validate");
    }

    #[test]
    fn syntax_error_is_captured_as_parse_error() {
        let wrapped = wrap_pass_fragment("", "void mainImage(out vec4 c, in vec2 f) { c = ; }");
        let error = validate_fragment(&wrapped).unwrap_err();
        assert!(matches!(error, CompileError::Parse(_)));
        assert!(!error.to_string().is_empty());
    }

    #[test]
    fn missing_entry_point_fails_validation() {
        let wrapped = wrap_pass_fragment("", "float lonely() { return 1.0; }");
        assert!(validate_fragment(&wrapped).is_err());
    }
}
