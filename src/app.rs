use std::sync::Arc;

use glam::Vec3;
use log::{error, info, warn};
use thiserror::Error;

use crate::assets::{AssetEvent, AssetInbox, LoadRequest, LoadState};
use crate::bindings::{BindError, MaterialBindings};
use crate::camera::PerspectiveCamera;
use crate::clock::Clock;
use crate::color::Color;
use crate::config::{MaterialRef, SceneConfig};
use crate::controls::{OrbitControls, OrbitSettings};
use crate::debug_panel::{self, DebugPanel, PanelEdit, PanelError, CLEAR_COLOR, PANEL_UNIFORMS};
use crate::fireflies::{Fireflies, FireflyField};
use crate::frame::{FrameLoop, RenderError, SceneRenderer};
use crate::material::{portal_material, Material, MaterialError, Side};
use crate::scene::{Scene, SceneNode};
use crate::texture::TextureHandle;
use crate::uniforms::{UniformBus, UniformError};
use crate::viewport::{RenderSurface, ResizeEvent, Viewport};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Uniform(#[from] UniformError),
    #[error(transparent)]
    Material(#[from] MaterialError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl SceneError {
    /// Configuration mistakes and unrecoverable GPU failures end the loop;
    /// a lost surface is retried on the next tick.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Render(err) => err.is_fatal(),
            _ => true,
        }
    }
}

/// Builds the `node -> material` table described by the config.
///
/// Rows naming the pole light share one material instance. With shaders
/// disabled the portal falls back to a double-sided white flat material.
pub fn build_bindings(
    config: &SceneConfig,
    bus: &UniformBus,
    baked_texture: &TextureHandle,
) -> Result<MaterialBindings, MaterialError> {
    let baked = Material::baked(baked_texture.clone());
    let pole_light = Material::flat(config.pole_light_color, Side::Front);
    let portal = if config.features.shaders {
        Material::shader(portal_material(bus)?)
    } else {
        Material::flat(Color::WHITE, Side::Double)
    };

    let mut bindings = MaterialBindings::new();
    for spec in &config.bindings {
        let material = match spec.material {
            MaterialRef::Baked => Arc::clone(&baked),
            MaterialRef::PoleLight => Arc::clone(&pole_light),
            MaterialRef::Portal => Arc::clone(&portal),
            MaterialRef::Flat { color, side } => Material::flat(color, side),
        };
        bindings.insert(spec.node.clone(), material);
    }
    Ok(bindings)
}

/// The whole running scene: the one object the frame loop, the resize
/// handler, the panel and the asset loaders talk to.
pub struct PortalApp<R> {
    config: SceneConfig,
    scene: Scene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    bus: UniformBus,
    viewport: Viewport,
    frame_loop: FrameLoop,
    renderer: R,
    bindings: MaterialBindings,
    baked_texture: TextureHandle,
    clear_color: Color,
    inbox: AssetInbox,
    model_state: LoadState,
    texture_state: LoadState,
}

impl<R: SceneRenderer + RenderSurface> PortalApp<R> {
    /// Assembles the scene and pushes the initial viewport into the camera,
    /// the renderer and the uniforms. Assets are not loaded here; post them
    /// to [`PortalApp::inbox`].
    pub fn new(
        config: SceneConfig,
        mut renderer: R,
        clock: Box<dyn Clock>,
        initial: ResizeEvent,
    ) -> Result<Self, SceneError> {
        let viewport = Viewport::new(initial, config.max_pixel_ratio);
        let state = viewport.state();
        let bus = UniformBus::portal(
            config.portal_color_start,
            config.portal_color_end,
            state.pixel_ratio,
            config.firefly_size,
        );

        let mut camera = PerspectiveCamera::new(
            config.camera.fov,
            state.aspect(),
            config.camera.near,
            config.camera.far,
        );
        camera.position = config.camera.position;
        camera.look_at(Vec3::ZERO);
        let mut controls = OrbitControls::new(&camera, OrbitSettings::default());
        controls.set_element_height(state.height as f32);

        let baked_texture = TextureHandle::new(
            config.texture.path.clone(),
            config.texture.flip_y,
            config.texture.color_space,
        );
        let bindings = build_bindings(&config, &bus, &baked_texture)?;

        let mut scene = Scene::new();
        if config.features.shaders {
            let field = match config.firefly_seed {
                Some(seed) => FireflyField::seeded(config.firefly_count, seed),
                None => FireflyField::random(config.firefly_count),
            };
            scene.fireflies = Some(Fireflies::new(field, &bus)?);
        }

        let clear_color = config.effective_clear_color();
        renderer.set_clear_color(clear_color);
        viewport.apply(&mut camera, &mut renderer, &bus)?;

        Ok(Self {
            config,
            scene,
            camera,
            controls,
            bus,
            viewport,
            frame_loop: FrameLoop::new(clock),
            renderer,
            bindings,
            baked_texture,
            clear_color,
            inbox: AssetInbox::new(),
            model_state: LoadState::Pending,
            texture_state: LoadState::Pending,
        })
    }

    /// Applies every finished load. A model is bound exactly once, when its
    /// event is drained; a failed load is recorded and never retried. The
    /// whole batch is applied before a bind error is returned.
    pub fn pump_assets(&mut self) -> Result<(), SceneError> {
        let mut bind_error = None;
        for event in self.inbox.drain() {
            match event {
                AssetEvent::Model(Ok(model)) => {
                    if let Err(err) = self.on_model_loaded(model) {
                        bind_error.get_or_insert(err);
                    }
                }
                AssetEvent::Model(Err(err)) => {
                    error!("model {} unavailable: {err}", self.config.model_path);
                    self.model_state = LoadState::Failed(err.to_string());
                }
                AssetEvent::Texture(Ok(image)) => {
                    self.baked_texture.set_image(image);
                    self.texture_state = LoadState::Loaded;
                }
                AssetEvent::Texture(Err(err)) => {
                    error!("texture {} unavailable: {err}", self.config.texture.path);
                    self.texture_state = LoadState::Failed(err.to_string());
                }
            }
        }
        match bind_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Binds materials to a freshly loaded model and adds it to the scene.
    pub fn on_model_loaded(&mut self, mut model: SceneNode) -> Result<(), SceneError> {
        match self.bindings.apply(&mut model) {
            Ok(count) => {
                info!(
                    "model {} ready: {} nodes, {count} materials bound",
                    self.config.model_path,
                    model.node_count()
                );
                self.scene.model = Some(model);
                self.model_state = LoadState::Loaded;
                Ok(())
            }
            Err(err) => {
                self.model_state = LoadState::Failed(err.to_string());
                Err(err.into())
            }
        }
    }

    /// The one resize path: camera, renderer and pixel-ratio uniforms are
    /// all updated before this returns.
    pub fn resize(&mut self, event: ResizeEvent) -> Result<bool, SceneError> {
        let changed = self
            .viewport
            .resize(event, &mut self.camera, &mut self.renderer, &self.bus)?;
        if changed {
            self.controls.set_element_height(event.height as f32);
        }
        Ok(changed)
    }

    /// One frame: drain loads, advance the controls, write `uTime`, render.
    pub fn tick(&mut self) -> Result<f32, SceneError> {
        self.pump_assets()?;
        self.controls.update(&mut self.camera);
        let elapsed = self.frame_loop.advance(&self.bus)?;
        self.renderer.render(&self.scene, &self.camera)?;
        Ok(elapsed)
    }

    pub fn register_panel(&self, panel: &mut impl DebugPanel) -> Result<(), UniformError> {
        debug_panel::register_panel(panel, &self.bus, self.clear_color)
    }

    /// Copies a panel value into the bus or the clear color. Slider values are
    /// held to their registered range; edits are refused while the panel is off.
    pub fn apply_panel_edit(&mut self, name: &str, edit: PanelEdit) -> Result<(), PanelError> {
        if !self.config.features.panel {
            warn!("panel edit for {name} while the panel is disabled");
            return Err(PanelError::Disabled);
        }
        if name == CLEAR_COLOR {
            let PanelEdit::Color(color) = edit else {
                return Err(UniformError::TypeMismatch {
                    name: name.to_string(),
                    expected: "color",
                    actual: "float",
                }
                .into());
            };
            self.clear_color = color;
            self.renderer.set_clear_color(color);
            return Ok(());
        }
        if !PANEL_UNIFORMS.iter().any(|entry| *entry == name) {
            warn!("panel edit for unknown entry {name}");
            return Err(UniformError::Unknown(name.to_string()).into());
        }
        self.bus.set(name, debug_panel::constrain_edit(name, edit))?;
        Ok(())
    }

    /// `(node, material)` pairs currently bound in the scene.
    pub fn bound_materials(&self) -> Vec<(String, String)> {
        self.scene
            .material_assignments()
            .into_iter()
            .map(|(node, material)| (node, material.describe()))
            .collect()
    }

    pub fn load_request(&self) -> LoadRequest {
        LoadRequest::from_config(&self.config)
    }

    pub fn inbox(&self) -> AssetInbox {
        self.inbox.clone()
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn bus(&self) -> &UniformBus {
        &self.bus
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn baked_texture(&self) -> &TextureHandle {
        &self.baked_texture
    }

    pub fn model_state(&self) -> &LoadState {
        &self.model_state
    }

    pub fn texture_state(&self) -> &LoadState {
        &self.texture_state
    }

    pub fn frames(&self) -> u64 {
        self.frame_loop.frames()
    }
}
