//! WGSL sources for the scene's pipelines.
//!
//! Every program shares the same bind group layout so the renderer can drive
//! them with one set of helpers:
//!
//! * group 0: per-frame globals (matrices, drawing-buffer resolution)
//! * group 1: per-object constants (model matrix, flat color)
//! * group 2: either a texture and sampler (basic materials) or the shader
//!   material's uniform block

/// Unlit textured or flat-colored meshes.
pub const BASIC: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    resolution: vec4<f32>,
}

struct Object {
    model: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> object: Object;

@group(2) @binding(0)
var base_texture: texture_2d<f32>;
@group(2) @binding(1)
var base_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = globals.view_proj * object.model * vec4<f32>(input.position, 1.0);
    out.uv = input.uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(base_texture, base_sampler, input.uv);
    return vec4<f32>(texel.rgb * object.color.rgb, 1.0);
}
"#;

/// Animated portal surface: Perlin-displaced glow blended between two colors.
pub const PORTAL: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    resolution: vec4<f32>,
}

struct Object {
    model: mat4x4<f32>,
    color: vec4<f32>,
}

struct Uniforms {
    color_start: vec4<f32>,
    color_end: vec4<f32>,
    // x: uTime, y: uPixelRatio, z: uSize
    params: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> object: Object;

@group(2) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

fn mod289_3(x: vec3<f32>) -> vec3<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn mod289_4(x: vec4<f32>) -> vec4<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn permute(x: vec4<f32>) -> vec4<f32> {
    return mod289_4(((x * 34.0) + 1.0) * x);
}

fn taylor_inv_sqrt(r: vec4<f32>) -> vec4<f32> {
    return 1.79284291400159 - 0.85373472095314 * r;
}

fn fade(t: vec3<f32>) -> vec3<f32> {
    return t * t * t * (t * (t * 6.0 - 15.0) + 10.0);
}

// Classic Perlin noise, 3D.
fn cnoise(p: vec3<f32>) -> f32 {
    let pi0 = mod289_3(floor(p));
    let pi1 = mod289_3(floor(p) + vec3<f32>(1.0));
    let pf0 = fract(p);
    let pf1 = pf0 - vec3<f32>(1.0);
    let ix = vec4<f32>(pi0.x, pi1.x, pi0.x, pi1.x);
    let iy = vec4<f32>(pi0.yy, pi1.yy);
    let iz0 = vec4<f32>(pi0.z);
    let iz1 = vec4<f32>(pi1.z);

    let ixy = permute(permute(ix) + iy);
    let ixy0 = permute(ixy + iz0);
    let ixy1 = permute(ixy + iz1);

    var gx0 = ixy0 * (1.0 / 7.0);
    var gy0 = fract(floor(gx0) * (1.0 / 7.0)) - 0.5;
    gx0 = fract(gx0);
    let gz0 = vec4<f32>(0.5) - abs(gx0) - abs(gy0);
    let sz0 = step(gz0, vec4<f32>(0.0));
    gx0 = gx0 - sz0 * (step(vec4<f32>(0.0), gx0) - 0.5);
    gy0 = gy0 - sz0 * (step(vec4<f32>(0.0), gy0) - 0.5);

    var gx1 = ixy1 * (1.0 / 7.0);
    var gy1 = fract(floor(gx1) * (1.0 / 7.0)) - 0.5;
    gx1 = fract(gx1);
    let gz1 = vec4<f32>(0.5) - abs(gx1) - abs(gy1);
    let sz1 = step(gz1, vec4<f32>(0.0));
    gx1 = gx1 - sz1 * (step(vec4<f32>(0.0), gx1) - 0.5);
    gy1 = gy1 - sz1 * (step(vec4<f32>(0.0), gy1) - 0.5);

    var g000 = vec3<f32>(gx0.x, gy0.x, gz0.x);
    var g100 = vec3<f32>(gx0.y, gy0.y, gz0.y);
    var g010 = vec3<f32>(gx0.z, gy0.z, gz0.z);
    var g110 = vec3<f32>(gx0.w, gy0.w, gz0.w);
    var g001 = vec3<f32>(gx1.x, gy1.x, gz1.x);
    var g101 = vec3<f32>(gx1.y, gy1.y, gz1.y);
    var g011 = vec3<f32>(gx1.z, gy1.z, gz1.z);
    var g111 = vec3<f32>(gx1.w, gy1.w, gz1.w);

    let norm0 = taylor_inv_sqrt(vec4<f32>(
        dot(g000, g000),
        dot(g010, g010),
        dot(g100, g100),
        dot(g110, g110),
    ));
    g000 = g000 * norm0.x;
    g010 = g010 * norm0.y;
    g100 = g100 * norm0.z;
    g110 = g110 * norm0.w;
    let norm1 = taylor_inv_sqrt(vec4<f32>(
        dot(g001, g001),
        dot(g011, g011),
        dot(g101, g101),
        dot(g111, g111),
    ));
    g001 = g001 * norm1.x;
    g011 = g011 * norm1.y;
    g101 = g101 * norm1.z;
    g111 = g111 * norm1.w;

    let n000 = dot(g000, pf0);
    let n100 = dot(g100, vec3<f32>(pf1.x, pf0.yz));
    let n010 = dot(g010, vec3<f32>(pf0.x, pf1.y, pf0.z));
    let n110 = dot(g110, vec3<f32>(pf1.xy, pf0.z));
    let n001 = dot(g001, vec3<f32>(pf0.xy, pf1.z));
    let n101 = dot(g101, vec3<f32>(pf1.x, pf0.y, pf1.z));
    let n011 = dot(g011, vec3<f32>(pf0.x, pf1.yz));
    let n111 = dot(g111, pf1);

    let fade_xyz = fade(pf0);
    let n_z = mix(
        vec4<f32>(n000, n100, n010, n110),
        vec4<f32>(n001, n101, n011, n111),
        vec4<f32>(fade_xyz.z),
    );
    let n_yz = mix(n_z.xy, n_z.zw, vec2<f32>(fade_xyz.y));
    let n_xyz = mix(n_yz.x, n_yz.y, fade_xyz.x);
    return 2.2 * n_xyz;
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = globals.view_proj * object.model * vec4<f32>(input.position, 1.0);
    out.uv = input.uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let time = uniforms.params.x;
    let displaced_uv = input.uv + cnoise(vec3<f32>(input.uv * 5.0, time * 0.1));
    var strength = cnoise(vec3<f32>(displaced_uv * 5.0, time * 0.2));

    let outer_glow = distance(input.uv, vec2<f32>(0.5)) * 5.0 - 1.4;
    strength = strength + outer_glow;
    strength = strength + step(-0.2, strength) * 0.8;
    strength = clamp(strength, 0.0, 1.0);

    let color = mix(uniforms.color_start.rgb, uniforms.color_end.rgb, vec3<f32>(strength));
    return vec4<f32>(color, 1.0);
}
"#;

/// Firefly sprites. Each instance is a camera-facing quad sized like a
/// perspective-attenuated point sprite.
pub const FIREFLIES: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    resolution: vec4<f32>,
}

struct Object {
    model: mat4x4<f32>,
    color: vec4<f32>,
}

struct Uniforms {
    color_start: vec4<f32>,
    color_end: vec4<f32>,
    // x: uTime, y: uPixelRatio, z: uSize
    params: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> object: Object;

@group(2) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) corner: vec2<f32>,
    @location(1) position: vec3<f32>,
    @location(2) scale: f32,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) point_coord: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    let time = uniforms.params.x;
    let pixel_ratio = uniforms.params.y;
    let size = uniforms.params.z;

    var model_position = object.model * vec4<f32>(input.position, 1.0);
    model_position.y = model_position.y + sin(time + model_position.x * 100.0) * input.scale * 0.2;
    let view_position = globals.view * model_position;
    var clip = globals.projection * view_position;

    // Point size in physical pixels, attenuated by view depth.
    let point_size = size * input.scale * pixel_ratio * (1.0 / -view_position.z);
    let offset = input.corner * point_size * 2.0 / max(globals.resolution.xy, vec2<f32>(1.0));
    clip = vec4<f32>(clip.xy + offset * clip.w, clip.zw);

    var out: VertexOutput;
    out.position = clip;
    out.point_coord = vec2<f32>(input.corner.x + 0.5, 0.5 - input.corner.y);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let distance_to_center = distance(input.point_coord, vec2<f32>(0.5));
    let strength = clamp(0.05 / distance_to_center - 0.1, 0.0, 1.0);
    return vec4<f32>(1.0, 1.0, 1.0, strength);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(label: &str, source: &str) {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|err| panic!("{label}: {}", err.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("{label}: {err:?}"));
    }

    #[test]
    fn programs_parse_and_validate() {
        for (label, source) in [("basic", BASIC), ("portal", PORTAL), ("fireflies", FIREFLIES)] {
            validate(label, source);
        }
    }

    #[test]
    fn every_program_exposes_both_entry_points() {
        for source in [BASIC, PORTAL, FIREFLIES] {
            assert!(source.contains("fn vs_main"));
            assert!(source.contains("fn fs_main"));
        }
    }

    #[test]
    fn shader_programs_read_the_uniform_block() {
        assert!(PORTAL.contains("uniforms.color_start"));
        assert!(FIREFLIES.contains("uniforms.params.z"));
    }
}
