//! Baked portal scene: a glTF model lit by a baked texture, an animated
//! noise portal and a field of additive fireflies.
//!
//! Everything that decides what is drawn lives here and runs without a
//! GPU: material bindings, the uniform bus, the resize protocol and the
//! frame loop. The wgpu renderer and the browser entry point sit at the
//! edges behind the [`SceneRenderer`] and [`RenderSurface`] traits.

pub mod app;
pub mod assets;
pub mod bindings;
pub mod camera;
pub mod clock;
pub mod color;
pub mod config;
pub mod controls;
pub mod debug_panel;
pub mod fireflies;
pub mod frame;
pub mod material;
pub mod model;
pub mod render;
pub mod scene;
pub mod shaders;
pub mod texture;
pub mod uniforms;
pub mod viewport;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::{build_bindings, PortalApp, SceneError};
pub use assets::{
    load_all, spawn_loads, AssetEvent, AssetInbox, AssetSource, LoadError, LoadRequest, LoadState,
};
pub use bindings::{BindError, MaterialBindings};
pub use camera::PerspectiveCamera;
pub use clock::{Clock, ManualClock, SystemClock};
pub use color::Color;
pub use config::{ConfigError, MaterialRef, SceneConfig};
pub use controls::{OrbitControls, OrbitSettings, PointerButton};
pub use debug_panel::{DebugPanel, PanelEdit, PanelEntry, PanelError, PanelRegistry};
pub use fireflies::{Fireflies, FireflyField};
pub use frame::{FrameLoop, RenderError, SceneRenderer};
pub use material::{Material, ShaderMaterial, Side};
pub use model::load_gltf;
pub use render::{DrawCall, GpuRenderer, HeadlessRenderer};
pub use scene::{MeshPrimitive, Scene, SceneNode};
pub use texture::{ColorSpace, TextureHandle, TextureImage};
pub use uniforms::{UniformBus, UniformError, UniformValue};
pub use viewport::{RenderSurface, ResizeEvent, Viewport, ViewportState};
