#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = desktop::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod desktop {
    use std::any::Any;
    use std::env;
    use std::fmt;
    use std::fs;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;

    use anyhow::{anyhow, bail, Context, Result};
    use glam::Vec2;
    use log::{info, warn};
    use pollster::block_on;
    use winit::dpi::LogicalSize;
    use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
    use winit::event_loop::{EventLoop, EventLoopWindowTarget};
    use winit::window::{Window, WindowBuilder};

    use portal_scene::{
        load_all, spawn_loads, AssetSource, GpuRenderer, HeadlessRenderer, LoadState,
        PanelRegistry, PointerButton, PortalApp, ResizeEvent, SceneConfig, SystemClock,
    };

    pub fn run() -> Result<()> {
        let options = CliOptions::parse()?;
        let config = options.load_config()?;

        if options.summary_only {
            run_summary(&options, config)
        } else {
            match run_interactive(&options, config.clone()) {
                Ok(()) => Ok(()),
                Err(err) => {
                    if err.downcast_ref::<WindowInitError>().is_some() {
                        eprintln!(
                            "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                        );
                        run_summary(&options, config)
                    } else {
                        Err(err)
                    }
                }
            }
        }
    }

    /// Loads both assets, binds materials and renders one headless frame.
    fn run_summary(options: &CliOptions, config: SceneConfig) -> Result<()> {
        let initial = ResizeEvent::new(1280, 720, 1.0);
        let mut app = PortalApp::new(
            config,
            HeadlessRenderer::new(),
            Box::new(SystemClock::new()),
            initial,
        )?;
        let source = AssetSource::new(options.assets_dir.clone());
        block_on(load_all(source, app.load_request(), app.inbox()));
        app.tick().context("failed to assemble the scene")?;

        if let LoadState::Failed(reason) = app.model_state() {
            bail!("model {} could not be loaded: {reason}", app.config().model_path);
        }
        let node_count = app
            .scene()
            .model
            .as_ref()
            .map_or(0, |model| model.node_count());
        println!(
            "Loaded model {} with {node_count} nodes",
            app.config().model_path
        );
        for (node, material) in app.bound_materials() {
            println!(" - {node} -> {material}");
        }
        match app.texture_state() {
            LoadState::Failed(reason) => println!(
                "Baked texture {} unavailable: {reason}",
                app.config().texture.path
            ),
            _ => println!("Baked texture {} ready", app.config().texture.path),
        }
        if let Some(fireflies) = &app.scene().fireflies {
            println!("Fireflies: {}", fireflies.field.len());
        }
        println!(
            "Drew {} meshes, clear color {}",
            app.renderer().last_frame().len(),
            app.clear_color()
        );
        if app.config().features.panel {
            let mut registry = PanelRegistry::new();
            app.register_panel(&mut registry)?;
            println!("Debug panel: {}", registry.names().join(", "));
        }
        Ok(())
    }

    fn run_interactive(options: &CliOptions, config: SceneConfig) -> Result<()> {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
        panic::set_hook(default_hook);
        let event_loop = event_loop
            .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
            .map_err(|err| WindowInitError::from_error("event loop", err))?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title("Portal")
                .with_inner_size(LogicalSize::new(1280.0, 720.0))
                .build(&event_loop)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let renderer = block_on(GpuRenderer::new(Arc::clone(&window)))?;
        let mut app = PortalApp::new(
            config,
            renderer,
            Box::new(SystemClock::new()),
            resize_event(&window),
        )?;
        if app.config().features.panel {
            let mut registry = PanelRegistry::new();
            app.register_panel(&mut registry)?;
            info!("debug panel: {}", registry.to_json()?);
        }
        let _loader = spawn_loads(
            AssetSource::new(options.assets_dir.clone()),
            app.load_request(),
            app.inbox(),
        );

        let mut state = WindowState {
            app,
            window,
            cursor: Vec2::ZERO,
        };
        let mut last_error = None;
        event_loop.run(|event, elwt| {
            if let Err(err) = state.process_event(event, elwt) {
                last_error = Some(err);
                elwt.exit();
            }
        })?;

        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    struct WindowState {
        app: PortalApp<GpuRenderer>,
        window: Arc<Window>,
        /// Logical pixels.
        cursor: Vec2,
    }

    impl WindowState {
        fn process_event(
            &mut self,
            event: Event<()>,
            elwt: &EventLoopWindowTarget<()>,
        ) -> Result<()> {
            match event {
                Event::WindowEvent { event, window_id } if window_id == self.window.id() => {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                            self.app.resize(resize_event(&self.window))?;
                        }
                        WindowEvent::MouseInput { state, button, .. } => match state {
                            ElementState::Pressed => self
                                .app
                                .controls_mut()
                                .pointer_down(map_button(button), self.cursor),
                            ElementState::Released => self.app.controls_mut().pointer_up(),
                        },
                        WindowEvent::CursorMoved { position, .. } => {
                            let logical = position.to_logical::<f32>(self.window.scale_factor());
                            self.cursor = Vec2::new(logical.x, logical.y);
                            self.app.controls_mut().pointer_move(self.cursor);
                        }
                        WindowEvent::MouseWheel { delta, .. } => {
                            let delta_y = match delta {
                                MouseScrollDelta::LineDelta(_, y) => -y,
                                MouseScrollDelta::PixelDelta(position) => -position.y as f32,
                            };
                            self.app.controls_mut().wheel(delta_y);
                        }
                        WindowEvent::RedrawRequested => {
                            if let Err(err) = self.app.tick() {
                                if err.is_fatal() {
                                    return Err(err.into());
                                }
                                warn!("frame skipped: {err}");
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => self.window.request_redraw(),
                _ => {}
            }
            Ok(())
        }
    }

    fn resize_event(window: &Window) -> ResizeEvent {
        let scale_factor = window.scale_factor();
        let logical = window.inner_size().to_logical::<f64>(scale_factor);
        ResizeEvent::new(
            logical.width.round() as u32,
            logical.height.round() as u32,
            scale_factor,
        )
    }

    /// Browser button numbering, which the controls expect.
    fn map_button(button: MouseButton) -> PointerButton {
        let index = match button {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
            MouseButton::Back => 3,
            MouseButton::Forward => 4,
            MouseButton::Other(value) => value.min(u8::MAX as u16) as u8,
        };
        PointerButton::new(index)
    }

    #[derive(Debug)]
    struct WindowInitError {
        message: String,
    }

    impl WindowInitError {
        fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
            Self {
                message: format!("failed to initialize {stage}: {}", panic_message(panic)),
            }
        }

        fn from_error(stage: &str, err: impl fmt::Display) -> Self {
            Self {
                message: format!("failed to initialize {stage}: {err}"),
            }
        }
    }

    impl fmt::Display for WindowInitError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl std::error::Error for WindowInitError {}

    fn panic_message(panic: Box<dyn Any + Send>) -> String {
        match panic.downcast::<String>() {
            Ok(msg) => *msg,
            Err(panic) => match panic.downcast::<&'static str>() {
                Ok(msg) => (*msg).to_string(),
                Err(_) => "unknown panic".into(),
            },
        }
    }

    struct CliOptions {
        assets_dir: String,
        config_path: Option<String>,
        summary_only: bool,
        no_shaders: bool,
    }

    impl CliOptions {
        fn parse() -> Result<Self> {
            let mut args = env::args().skip(1);
            let Some(assets_dir) = args.next() else {
                return Err(anyhow!(
                    "Usage: portal-scene <assets-dir> [--config scene.xml] [--summary-only] [--no-shaders]"
                ));
            };
            let mut config_path = None;
            let mut summary_only = false;
            let mut no_shaders = false;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--config" => {
                        let path = args
                            .next()
                            .ok_or_else(|| anyhow!("--config expects a file path"))?;
                        config_path = Some(path);
                    }
                    "--summary-only" => summary_only = true,
                    "--no-shaders" => no_shaders = true,
                    other => {
                        return Err(anyhow!(
                            "Unknown argument: {other}. Expected --config, --summary-only or --no-shaders"
                        ));
                    }
                }
            }
            Ok(Self {
                assets_dir,
                config_path,
                summary_only,
                no_shaders,
            })
        }

        fn load_config(&self) -> Result<SceneConfig> {
            let mut config = match &self.config_path {
                Some(path) => {
                    let xml = fs::read_to_string(path)
                        .with_context(|| format!("failed to read config {path}"))?;
                    SceneConfig::from_xml(&xml)
                        .with_context(|| format!("failed to parse config {path}"))?
                }
                None => SceneConfig::default(),
            };
            if self.no_shaders {
                config.features.shaders = false;
            }
            Ok(config)
        }
    }
}
