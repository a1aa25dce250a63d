#![cfg(target_arch = "wasm32")]

//! Browser entry point: canvas lookup, DOM listeners and the
//! `requestAnimationFrame` loop.

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use glam::Vec2;
use gloo_events::{EventListener, EventListenerOptions};
use log::{error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, PointerEvent, WheelEvent};

use crate::app::PortalApp;
use crate::assets::{spawn_loads, AssetSource};
use crate::clock::SystemClock;
use crate::config::SceneConfig;
use crate::controls::PointerButton;
use crate::debug_panel::{PanelEdit, PanelRegistry};
use crate::render::GpuRenderer;
use crate::viewport::ResizeEvent;

type SharedApp = Rc<RefCell<PortalApp<GpuRenderer>>>;

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Keeps the scene, its listeners and its panel alive for the page.
#[wasm_bindgen]
pub struct PortalHandle {
    app: SharedApp,
    panel: PanelRegistry,
    _listeners: Vec<EventListener>,
}

#[wasm_bindgen]
impl PortalHandle {
    /// Panel widgets as JSON, empty when the panel feature is off.
    #[wasm_bindgen(js_name = panelEntries)]
    pub fn panel_entries(&self) -> Result<String, JsValue> {
        self.panel.to_json().map_err(to_js)
    }

    /// Applies a slider value or a `#rrggbb` color from the panel.
    #[wasm_bindgen(js_name = setPanelValue)]
    pub fn set_panel_value(&self, name: &str, value: &str) -> Result<(), JsValue> {
        let edit = PanelEdit::parse(value)
            .ok_or_else(|| JsValue::from_str(&format!("invalid panel value `{value}`")))?;
        self.app
            .borrow_mut()
            .apply_panel_edit(name, edit)
            .map_err(to_js)
    }
}

/// Starts the scene on `<canvas id=canvas_id>`; `config_xml` overrides the
/// default scene config.
#[wasm_bindgen]
pub async fn start(canvas_id: String, config_xml: Option<String>) -> Result<PortalHandle, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("missing window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("missing document"))?;
    let canvas: HtmlCanvasElement = document
        .get_element_by_id(&canvas_id)
        .ok_or_else(|| JsValue::from_str("canvas element not found"))?
        .dyn_into()
        .map_err(|_| JsValue::from_str("element is not a canvas"))?;

    let config = match config_xml {
        Some(xml) => SceneConfig::from_xml(&xml).map_err(to_js)?,
        None => SceneConfig::default(),
    };

    let renderer = GpuRenderer::from_canvas(canvas.clone())
        .await
        .map_err(|err| JsValue::from_str(&format!("renderer error: {err:#}")))?;
    let initial = resize_event(&window)?;
    let app = PortalApp::new(config, renderer, Box::new(SystemClock::new()), initial)
        .map_err(to_js)?;

    let mut panel = PanelRegistry::new();
    if app.config().features.panel {
        app.register_panel(&mut panel).map_err(to_js)?;
    }
    spawn_loads(AssetSource::new(""), app.load_request(), app.inbox());
    info!("portal scene started on #{canvas_id}");

    let app = Rc::new(RefCell::new(app));
    let listeners = attach_listeners(&window, &canvas, &app);
    start_frame_loop(Rc::clone(&app))?;

    Ok(PortalHandle {
        app,
        panel,
        _listeners: listeners,
    })
}

fn attach_listeners(
    window: &web_sys::Window,
    canvas: &HtmlCanvasElement,
    app: &SharedApp,
) -> Vec<EventListener> {
    let mut listeners = Vec::new();

    {
        let app = Rc::clone(app);
        listeners.push(EventListener::new(window, "resize", move |_| {
            let Some(window) = web_sys::window() else {
                return;
            };
            let result = resize_event(&window)
                .map_err(|err| format!("{err:?}"))
                .and_then(|event| {
                    app.borrow_mut()
                        .resize(event)
                        .map_err(|err| err.to_string())
                });
            if let Err(err) = result {
                warn!("resize ignored: {err}");
            }
        }));
    }

    {
        let app = Rc::clone(app);
        listeners.push(EventListener::new(canvas, "pointerdown", move |event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else {
                return;
            };
            app.borrow_mut()
                .controls_mut()
                .pointer_down(PointerButton::new(event.button() as u8), offset(event));
        }));
    }

    {
        let app = Rc::clone(app);
        listeners.push(EventListener::new(canvas, "pointermove", move |event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else {
                return;
            };
            app.borrow_mut().controls_mut().pointer_move(offset(event));
        }));
    }

    // Released outside the canvas still ends the drag.
    {
        let app = Rc::clone(app);
        listeners.push(EventListener::new(window, "pointerup", move |_| {
            app.borrow_mut().controls_mut().pointer_up();
        }));
    }

    {
        let app = Rc::clone(app);
        listeners.push(EventListener::new_with_options(
            canvas,
            "wheel",
            EventListenerOptions::enable_prevent_default(),
            move |event| {
                let Some(event) = event.dyn_ref::<WheelEvent>() else {
                    return;
                };
                event.prevent_default();
                app.borrow_mut().controls_mut().wheel(event.delta_y() as f32);
            },
        ));
    }

    listeners
}

fn start_frame_loop(app: SharedApp) -> Result<(), JsValue> {
    let callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let next = Rc::clone(&callback);
    *callback.borrow_mut() = Some(Closure::new(move || {
        if let Err(err) = app.borrow_mut().tick() {
            if err.is_fatal() {
                error!("scene stopped: {err}");
                return;
            }
            warn!("frame skipped: {err}");
        }
        if let Some(callback) = next.borrow().as_ref() {
            if let Err(err) = request_animation_frame(callback) {
                error!("failed to schedule frame: {err:?}");
            }
        }
    }));
    let scheduled = callback.borrow();
    let first = scheduled
        .as_ref()
        .ok_or_else(|| JsValue::from_str("frame callback missing"))?;
    request_animation_frame(first)?;
    Ok(())
}

fn request_animation_frame(callback: &Closure<dyn FnMut()>) -> Result<i32, JsValue> {
    web_sys::window()
        .ok_or_else(|| JsValue::from_str("missing window"))?
        .request_animation_frame(callback.as_ref().unchecked_ref())
}

fn resize_event(window: &web_sys::Window) -> Result<ResizeEvent, JsValue> {
    let dimension = |value: Result<JsValue, JsValue>| -> Result<u32, JsValue> {
        value?
            .as_f64()
            .map(|pixels| pixels as u32)
            .ok_or_else(|| JsValue::from_str("window size is not a number"))
    };
    Ok(ResizeEvent::new(
        dimension(window.inner_width())?,
        dimension(window.inner_height())?,
        window.device_pixel_ratio(),
    ))
}

fn offset(event: &PointerEvent) -> Vec2 {
    Vec2::new(event.offset_x() as f32, event.offset_y() as f32)
}

fn to_js(err: impl Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}
