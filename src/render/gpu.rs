use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::Mat4;
use log::{debug, warn};
use wgpu::util::DeviceExt;

use crate::camera::PerspectiveCamera;
use crate::color::Color;
use crate::fireflies::FireflyField;
use crate::frame::{RenderError, SceneRenderer};
use crate::material::{Blending, Material, ShaderKind, ShaderMaterial, Side};
use crate::scene::{MeshPrimitive, Scene};
use crate::shaders;
use crate::texture::{ColorSpace, TextureImage};
use crate::uniforms::{UniformValue, U_COLOR_END, U_COLOR_START, U_PIXEL_RATIO, U_SIZE, U_TIME};
use crate::viewport::{RenderSurface, ViewportState};

use super::collect_draws;

#[cfg(not(target_arch = "wasm32"))]
type Target = Arc<winit::window::Window>;
#[cfg(target_arch = "wasm32")]
type Target = web_sys::HtmlCanvasElement;

/// Object slot used by the firefly draw, which has no scene node.
const FIREFLY_OBJECT: usize = usize::MAX;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
const CORNER_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![1 => Float32x3, 2 => Float32];

const QUAD_CORNERS: [[f32; 2]; 6] = [
    [-0.5, -0.5],
    [0.5, -0.5],
    [0.5, 0.5],
    [-0.5, -0.5],
    [0.5, 0.5],
    [-0.5, 0.5],
];

const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// wgpu renderer for the portal scene: WebGL2 in the browser, the primary
/// native backend elsewhere.
pub struct GpuRenderer {
    target: Target,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    logical_size: (u32, u32),
    pixel_ratio: f32,
    surface_dirty: bool,
    clear_color: Color,
    layouts: Layouts,
    pipelines: Pipelines,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    white_texture: GpuTexture,
    textures: HashMap<usize, GpuTexture>,
    meshes: HashMap<(usize, usize), MeshBuffers>,
    objects: HashMap<usize, UniformBinding>,
    shader_uniforms: HashMap<ShaderKind, UniformBinding>,
    fireflies: Option<FireflyBuffers>,
}

impl GpuRenderer {
    /// Creates a renderer drawing into a native window.
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn new(window: Arc<winit::window::Window>) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create window surface")?;
        Self::init(instance, surface, window, (size.width, size.height)).await
    }

    /// Creates a renderer drawing into a canvas through WebGL2.
    #[cfg(target_arch = "wasm32")]
    pub async fn from_canvas(canvas: web_sys::HtmlCanvasElement) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::GL,
            ..Default::default()
        });
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .context("failed to create canvas surface")?;
        let size = (canvas.width(), canvas.height());
        Self::init(instance, surface, canvas, size).await
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn window(&self) -> &winit::window::Window {
        &self.target
    }

    async fn init(
        instance: wgpu::Instance,
        surface: wgpu::Surface<'static>,
        target: Target,
        (width, height): (u32, u32),
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let limits = if cfg!(target_arch = "wasm32") {
            wgpu::Limits::downlevel_webgl2_defaults()
        } else {
            wgpu::Limits::default()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("portal-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .context("surface reports no texture formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        debug!("surface configured as {format:?} {}x{}", config.width, config.height);

        let depth = DepthBuffer::create(&device, config.width, config.height);
        let layouts = Layouts::new(&device);
        let pipelines = Pipelines::new(&device, &layouts, format);

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals-uniform"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals-bind-group"),
            layout: &layouts.globals,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("baked-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let white = TextureImage {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        };
        let white_texture = GpuTexture::upload(
            &device,
            &queue,
            &layouts.texture,
            &sampler,
            &white,
            ColorSpace::Linear,
            "white-texture",
        );

        Ok(Self {
            target,
            surface,
            device,
            queue,
            logical_size: (config.width, config.height),
            config,
            depth,
            pixel_ratio: 1.0,
            surface_dirty: false,
            clear_color: Color::BLACK,
            layouts,
            pipelines,
            globals_buffer,
            globals_bind_group,
            sampler,
            white_texture,
            textures: HashMap::new(),
            meshes: HashMap::new(),
            objects: HashMap::new(),
            shader_uniforms: HashMap::new(),
            fireflies: None,
        })
    }

    /// Size of the drawing buffer in physical pixels.
    #[cfg(not(target_arch = "wasm32"))]
    fn drawing_buffer_size(&self) -> (u32, u32) {
        // The window system owns the native drawing buffer size.
        let size = self.target.inner_size();
        (size.width.max(1), size.height.max(1))
    }

    #[cfg(target_arch = "wasm32")]
    fn drawing_buffer_size(&self) -> (u32, u32) {
        clamped_buffer_size(self.logical_size, self.pixel_ratio)
    }

    fn reconfigure(&mut self) {
        let (width, height) = self.drawing_buffer_size();
        #[cfg(target_arch = "wasm32")]
        {
            self.target.set_width(width);
            self.target.set_height(height);
            let style = self.target.style();
            let (css_width, css_height) = self.logical_size;
            if let Err(err) = style
                .set_property("width", &format!("{css_width}px"))
                .and_then(|_| style.set_property("height", &format!("{css_height}px")))
            {
                warn!("failed to size canvas: {err:?}");
            }
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, width, height);
        self.surface_dirty = false;
        debug!("surface resized to {width}x{height}");
    }

    fn write_globals(&self, camera: &PerspectiveCamera) {
        let view = camera.view();
        let projection = camera.projection();
        let globals = Globals {
            view_proj: (projection * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            resolution: shading_resolution(self.logical_size, self.pixel_ratio),
        };
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytes_of(&globals));
    }

    fn write_object(&mut self, key: usize, model: Mat4, color: [f32; 4]) {
        let constants = ObjectConstants {
            model: model.to_cols_array_2d(),
            color,
        };
        let binding = self.objects.entry(key).or_insert_with(|| {
            UniformBinding::create::<ObjectConstants>(&self.device, &self.layouts.object, "object")
        });
        self.queue
            .write_buffer(&binding.buffer, 0, bytes_of(&constants));
    }

    fn write_shader_uniforms(&mut self, material: &ShaderMaterial) {
        let uniforms = ShaderUniforms::from_material(material);
        let binding = self.shader_uniforms.entry(material.kind()).or_insert_with(|| {
            UniformBinding::create::<ShaderUniforms>(
                &self.device,
                &self.layouts.shader,
                material.program().label,
            )
        });
        self.queue
            .write_buffer(&binding.buffer, 0, bytes_of(&uniforms));
    }

    fn prepare_mesh(&mut self, node_id: usize, index: usize, primitive: &MeshPrimitive) {
        self.meshes
            .entry((node_id, index))
            .or_insert_with(|| MeshBuffers::from_primitive(&self.device, primitive, node_id));
    }

    fn prepare_material(&mut self, material: &Material) -> [f32; 4] {
        match material {
            Material::Baked(baked) => {
                let id = baked.texture.id();
                if !self.textures.contains_key(&id) {
                    if let Some(image) = baked.texture.image() {
                        let texture = GpuTexture::upload(
                            &self.device,
                            &self.queue,
                            &self.layouts.texture,
                            &self.sampler,
                            &image,
                            baked.texture.color_space(),
                            baked.texture.path(),
                        );
                        self.textures.insert(id, texture);
                    }
                }
                [1.0; 4]
            }
            Material::Flat(flat) => {
                let [r, g, b] = flat.color.to_linear();
                [r, g, b, 1.0]
            }
            Material::Shader(shader) => {
                self.write_shader_uniforms(shader);
                [1.0; 4]
            }
        }
    }

    fn prepare_fireflies(&mut self, field: &FireflyField) {
        let stale = self
            .fireflies
            .as_ref()
            .map_or(true, |buffers| buffers.count as usize != field.len());
        if stale {
            self.fireflies = Some(FireflyBuffers::create(&self.device, field));
        }
    }

    fn wgpu_clear_color(&self) -> wgpu::Color {
        let [r, g, b] = if self.config.format.is_srgb() {
            self.clear_color.to_linear()
        } else {
            self.clear_color.to_array()
        };
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        }
    }
}

impl RenderSurface for GpuRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        if self.logical_size != (width, height) {
            self.logical_size = (width, height);
            self.surface_dirty = true;
        }
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        if (self.pixel_ratio - pixel_ratio).abs() > f32::EPSILON {
            self.pixel_ratio = pixel_ratio;
            self.surface_dirty = true;
        }
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }
}

impl SceneRenderer for GpuRenderer {
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError> {
        if self.surface_dirty {
            self.reconfigure();
        }
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(err) => return Err(RenderError::Backend(err.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_globals(camera);
        let draws = collect_draws(scene);
        for draw in &draws {
            for (index, primitive) in draw.node.primitives.iter().enumerate() {
                self.prepare_mesh(draw.node.id, index, primitive);
            }
            let color = self.prepare_material(draw.material);
            self.write_object(draw.node.id, draw.world, color);
        }
        let fireflies = scene.fireflies.as_ref().filter(|f| !f.field.is_empty());
        if let Some(fireflies) = fireflies {
            self.prepare_fireflies(&fireflies.field);
            self.write_shader_uniforms(&fireflies.material);
            self.write_object(FIREFLY_OBJECT, Mat4::IDENTITY, [1.0; 4]);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("portal-encoder"),
            });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("main-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.wgpu_clear_color()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, &self.globals_bind_group, &[]);

        for draw in &draws {
            let (pipeline, material_group) = match draw.material.as_ref() {
                Material::Baked(baked) => {
                    let Some(texture) = self.textures.get(&baked.texture.id()) else {
                        continue;
                    };
                    (self.pipelines.basic(Side::Front), &texture.bind_group)
                }
                Material::Flat(flat) => (
                    self.pipelines.basic(flat.side),
                    &self.white_texture.bind_group,
                ),
                Material::Shader(shader) => {
                    if shader.kind() != ShaderKind::Portal {
                        warn!("{} cannot shade mesh {}", shader.program().label, draw.node.name);
                        continue;
                    }
                    let Some(uniforms) = self.shader_uniforms.get(&shader.kind()) else {
                        continue;
                    };
                    (self.pipelines.portal(shader.side), &uniforms.bind_group)
                }
            };
            let Some(object) = self.objects.get(&draw.node.id) else {
                continue;
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(1, &object.bind_group, &[]);
            pass.set_bind_group(2, material_group, &[]);
            for index in 0..draw.node.primitives.len() {
                let Some(mesh) = self.meshes.get(&(draw.node.id, index)) else {
                    continue;
                };
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        if fireflies.is_some() {
            let buffers = self.fireflies.as_ref();
            let object = self.objects.get(&FIREFLY_OBJECT);
            let uniforms = self.shader_uniforms.get(&ShaderKind::Fireflies);
            if let (Some(buffers), Some(object), Some(uniforms)) = (buffers, object, uniforms) {
                pass.set_pipeline(&self.pipelines.fireflies);
                pass.set_bind_group(1, &object.bind_group, &[]);
                pass.set_bind_group(2, &uniforms.bind_group, &[]);
                pass.set_vertex_buffer(0, buffers.corners.slice(..));
                pass.set_vertex_buffer(1, buffers.instances.slice(..));
                pass.draw(0..QUAD_CORNERS.len() as u32, 0..buffers.count);
            }
        }

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

struct Layouts {
    globals: wgpu::BindGroupLayout,
    object: wgpu::BindGroupLayout,
    texture: wgpu::BindGroupLayout,
    shader: wgpu::BindGroupLayout,
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = |label: &str| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            })
        };
        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        Self {
            globals: uniform_layout("globals-bind-layout"),
            object: uniform_layout("object-bind-layout"),
            texture,
            shader: uniform_layout("shader-bind-layout"),
        }
    }
}

struct Pipelines {
    basic_front: wgpu::RenderPipeline,
    basic_double: wgpu::RenderPipeline,
    portal_front: wgpu::RenderPipeline,
    portal_double: wgpu::RenderPipeline,
    fireflies: wgpu::RenderPipeline,
}

impl Pipelines {
    fn new(device: &wgpu::Device, layouts: &Layouts, format: wgpu::TextureFormat) -> Self {
        let module = |label: &str, source: &str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let basic = module("basic-shader", shaders::BASIC);
        let portal = module("portal-shader", shaders::PORTAL);
        let fireflies = module("fireflies-shader", shaders::FIREFLIES);

        let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("textured-pipeline-layout"),
            bind_group_layouts: &[&layouts.globals, &layouts.object, &layouts.texture],
            push_constant_ranges: &[],
        });
        let shader_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shader-pipeline-layout"),
            bind_group_layouts: &[&layouts.globals, &layouts.object, &layouts.shader],
            push_constant_ranges: &[],
        });

        let mesh_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &MESH_ATTRIBUTES,
        }];
        let firefly_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &CORNER_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<FireflyInstance>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &INSTANCE_ATTRIBUTES,
            },
        ];

        let build = |spec: PipelineSpec<'_>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(spec.label),
                layout: Some(spec.layout),
                vertex: wgpu::VertexState {
                    module: spec.module,
                    entry_point: "vs_main",
                    buffers: spec.buffers,
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: match spec.side {
                        Side::Front => Some(wgpu::Face::Back),
                        Side::Double => None,
                    },
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: spec.depth_write,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: spec.module,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(match spec.blending {
                            Blending::Normal => wgpu::BlendState::REPLACE,
                            Blending::Additive => ADDITIVE_BLENDING,
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
        };

        let opaque = |label, module, layout, side| PipelineSpec {
            label,
            module,
            layout,
            buffers: &mesh_buffers,
            side,
            blending: Blending::Normal,
            depth_write: true,
        };
        Self {
            basic_front: build(opaque("basic-front", &basic, &textured_layout, Side::Front)),
            basic_double: build(opaque("basic-double", &basic, &textured_layout, Side::Double)),
            portal_front: build(opaque("portal-front", &portal, &shader_layout, Side::Front)),
            portal_double: build(opaque("portal-double", &portal, &shader_layout, Side::Double)),
            fireflies: build(PipelineSpec {
                label: "fireflies",
                module: &fireflies,
                layout: &shader_layout,
                buffers: &firefly_buffers,
                side: Side::Double,
                blending: Blending::Additive,
                depth_write: false,
            }),
        }
    }

    fn basic(&self, side: Side) -> &wgpu::RenderPipeline {
        match side {
            Side::Front => &self.basic_front,
            Side::Double => &self.basic_double,
        }
    }

    fn portal(&self, side: Side) -> &wgpu::RenderPipeline {
        match side {
            Side::Front => &self.portal_front,
            Side::Double => &self.portal_double,
        }
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    module: &'a wgpu::ShaderModule,
    layout: &'a wgpu::PipelineLayout,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    side: Side,
    blending: Blending,
    depth_write: bool,
}

struct UniformBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl UniformBinding {
    fn create<T: Pod>(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}-uniform")),
            size: std::mem::size_of::<T>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label}-bind-group")),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl GpuTexture {
    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        image: &TextureImage,
        color_space: ColorSpace,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: match color_space {
                ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
                ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
            },
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            _texture: texture,
            bind_group,
        }
    }
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_primitive(device: &wgpu::Device, primitive: &MeshPrimitive, node_id: usize) -> Self {
        let vertices = mesh_vertices(primitive);
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("node-{node_id}-vertices")),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("node-{node_id}-indices")),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: primitive.indices.len() as u32,
        }
    }
}

struct FireflyBuffers {
    corners: wgpu::Buffer,
    instances: wgpu::Buffer,
    count: u32,
}

impl FireflyBuffers {
    fn create(device: &wgpu::Device, field: &FireflyField) -> Self {
        let instances: Vec<FireflyInstance> = field
            .positions
            .iter()
            .zip(&field.scales)
            .map(|(position, scale)| FireflyInstance {
                position: *position,
                scale: *scale,
            })
            .collect();
        let corners = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("firefly-corners"),
            contents: bytemuck::cast_slice(&QUAD_CORNERS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("firefly-instances"),
            contents: bytemuck::cast_slice(&instances),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            corners,
            instances: instance_buffer,
            count: instances.len() as u32,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Logical size times the clamped pixel ratio.
fn clamped_buffer_size((width, height): (u32, u32), pixel_ratio: f32) -> (u32, u32) {
    ViewportState {
        width,
        height,
        pixel_ratio,
    }
    .physical_size()
}

/// `resolution` global: the clamped buffer size, never the native window's
/// raw physical size, so sprite sizes agree with `uPixelRatio`.
fn shading_resolution(logical: (u32, u32), pixel_ratio: f32) -> [f32; 4] {
    let (width, height) = clamped_buffer_size(logical, pixel_ratio);
    [width as f32, height as f32, pixel_ratio, 0.0]
}

fn mesh_vertices(primitive: &MeshPrimitive) -> Vec<MeshVertex> {
    primitive
        .positions
        .iter()
        .enumerate()
        .map(|(index, position)| MeshVertex {
            position: *position,
            uv: primitive.uvs.get(index).copied().unwrap_or([0.0, 0.0]),
        })
        .collect()
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct MeshVertex {
    position: [f32; 3],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FireflyInstance {
    position: [f32; 3],
    scale: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    resolution: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

/// CPU mirror of the WGSL `Uniforms` block shared by the shader programs.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
struct ShaderUniforms {
    color_start: [f32; 4],
    color_end: [f32; 4],
    /// time, pixel ratio, size
    params: [f32; 4],
}

impl ShaderUniforms {
    /// Packs the uniforms the material declares; undeclared slots stay zero.
    fn from_material(material: &ShaderMaterial) -> Self {
        let mut out = Self::default();
        for name in material.uniform_names() {
            let Ok(value) = material.uniform(name) else {
                continue;
            };
            match (*name, value) {
                (U_COLOR_START, UniformValue::Color(color)) => out.color_start = linear_rgba(color),
                (U_COLOR_END, UniformValue::Color(color)) => out.color_end = linear_rgba(color),
                (U_TIME, UniformValue::Float(value)) => out.params[0] = value,
                (U_PIXEL_RATIO, UniformValue::Float(value)) => out.params[1] = value,
                (U_SIZE, UniformValue::Float(value)) => out.params[2] = value,
                (name, value) => warn!("uniform {name} has no slot for a {} value", value.kind()),
            }
        }
        out
    }
}

fn linear_rgba(color: Color) -> [f32; 4] {
    let [r, g, b] = color.to_linear();
    [r, g, b, 1.0]
}
