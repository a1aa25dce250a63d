mod common;

use std::sync::Arc;

use once_cell::sync::Lazy;

use portal_scene::fireflies::firefly_material;
use portal_scene::material::portal_material;
use portal_scene::uniforms::{U_COLOR_START, U_PIXEL_RATIO, U_SIZE, U_TIME};
use portal_scene::{
    build_bindings, load_gltf, AssetEvent, BindError, Color, HeadlessRenderer, LoadState,
    ManualClock, PanelEdit, PortalApp, ResizeEvent, SceneConfig, SceneError, SceneNode,
    TextureHandle, TextureImage, UniformBus,
};

use common::{portal_glb, PORTAL_NODES};

static PORTAL_GLB: Lazy<Vec<u8>> = Lazy::new(|| portal_glb(PORTAL_NODES));

fn portal_model() -> SceneNode {
    load_gltf(&PORTAL_GLB).expect("portal model")
}

fn app_with_clock(config: SceneConfig, initial: ResizeEvent) -> (PortalApp<HeadlessRenderer>, ManualClock) {
    let clock = ManualClock::new();
    let app = PortalApp::new(config, HeadlessRenderer::new(), Box::new(clock.clone()), initial)
        .expect("scene context");
    (app, clock)
}

fn texel() -> TextureImage {
    TextureImage {
        width: 1,
        height: 1,
        pixels: vec![255, 255, 255, 255],
    }
}

#[test]
fn bound_slots_hold_the_table_materials_and_rebinding_is_idempotent() {
    let config = SceneConfig::default();
    let bus = UniformBus::portal(Color::WHITE, Color::BLACK, 1.0, 100.0);
    let texture = TextureHandle::new("baked.jpg", false, Default::default());
    let bindings = build_bindings(&config, &bus, &texture).unwrap();
    let mut model = portal_model();

    assert_eq!(bindings.apply(&mut model).unwrap(), 4);
    assert_eq!(bindings.apply(&mut model).unwrap(), 4);

    for name in PORTAL_NODES {
        let node = model.get_object_by_name(name).unwrap();
        let bound = node.material.as_ref().unwrap();
        assert!(Arc::ptr_eq(bound, bindings.get(name).unwrap()), "{name}");
    }
    let pole_a = model.get_object_by_name("poleLightA").unwrap();
    let pole_b = model.get_object_by_name("poleLightB").unwrap();
    assert!(Arc::ptr_eq(
        pole_a.material.as_ref().unwrap(),
        pole_b.material.as_ref().unwrap()
    ));
}

#[test]
fn shader_materials_observe_bus_writes() {
    let bus = UniformBus::portal(Color::WHITE, Color::BLACK, 1.0, 100.0);
    let portal = portal_material(&bus).unwrap();
    let fireflies = firefly_material(&bus).unwrap();

    bus.set(U_TIME, 2.5).unwrap();

    assert_eq!(portal.uniform(U_TIME).unwrap().as_float(), Some(2.5));
    assert_eq!(fireflies.uniform(U_TIME).unwrap().as_float(), Some(2.5));
}

#[test]
fn bus_keeps_a_copy_of_set_colors() {
    let bus = UniformBus::portal(Color::WHITE, Color::BLACK, 1.0, 100.0);
    let mut color = Color::from_hex(0x1a1a1a);
    bus.set(U_COLOR_START, color).unwrap();
    color.set_hex(0xffffff);

    assert_eq!(bus.color(U_COLOR_START).unwrap().to_hex(), 0x1a1a1a);
    assert_eq!(color.to_hex(), 0xffffff);
}

#[test]
fn resize_updates_camera_surface_and_uniforms_together() {
    let (mut app, _clock) = app_with_clock(SceneConfig::default(), ResizeEvent::new(800, 600, 1.0));
    assert_eq!(app.bus().float(U_PIXEL_RATIO).unwrap(), 1.0);

    assert!(app.resize(ResizeEvent::new(1600, 900, 3.0)).unwrap());

    assert!((app.camera().aspect - 1600.0 / 900.0).abs() < 1e-6);
    assert_eq!(app.renderer().size(), (1600, 900));
    assert_eq!(app.renderer().pixel_ratio(), 2.0);
    assert_eq!(app.bus().float(U_PIXEL_RATIO).unwrap(), 2.0);
    assert_eq!(app.viewport().state().physical_size(), (3200, 1800));
}

#[test]
fn minimised_window_leaves_state_alone() {
    let (mut app, _clock) = app_with_clock(SceneConfig::default(), ResizeEvent::new(800, 600, 1.0));
    assert!(!app.resize(ResizeEvent::new(0, 600, 2.0)).unwrap());
    assert_eq!(app.renderer().size(), (800, 600));
    assert_eq!(app.bus().float(U_PIXEL_RATIO).unwrap(), 1.0);
}

#[test]
fn each_tick_writes_the_latest_time() {
    let (mut app, clock) = app_with_clock(SceneConfig::default(), ResizeEvent::new(800, 600, 1.0));
    for seconds in [0.0, 0.5, 1.2] {
        clock.set(seconds);
        assert_eq!(app.tick().unwrap(), seconds);
    }
    assert_eq!(app.bus().float(U_TIME).unwrap(), 1.2);
    assert_eq!(app.frames(), 3);
    assert_eq!(app.renderer().frames(), 3);
}

#[test]
fn missing_portal_light_fails_without_partial_assignment() {
    let (mut app, _clock) = app_with_clock(SceneConfig::default(), ResizeEvent::new(800, 600, 1.0));
    let model = load_gltf(&portal_glb(&["baked", "poleLightA", "poleLightB"])).unwrap();
    app.inbox().post(AssetEvent::Model(Ok(model)));

    let err = app.tick().unwrap_err();
    match &err {
        SceneError::Bind(BindError::MissingNodes(names)) => {
            assert_eq!(names, &vec!["portalLight".to_string()])
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.is_fatal());
    assert!(app.scene().model.is_none());
    assert!(matches!(app.model_state(), LoadState::Failed(_)));

    let config = SceneConfig::default();
    let bus = app.bus().clone();
    let bindings = build_bindings(&config, &bus, app.baked_texture()).unwrap();
    let mut partial = load_gltf(&portal_glb(&["baked", "poleLightA"])).unwrap();
    assert!(bindings.apply(&mut partial).is_err());
    assert!(partial.get_object_by_name("baked").unwrap().material.is_none());
}

#[test]
fn baked_mesh_appears_once_its_texture_arrives() {
    let (mut app, _clock) = app_with_clock(SceneConfig::default(), ResizeEvent::new(800, 600, 1.0));
    app.inbox().post(AssetEvent::Model(Ok(portal_model())));
    app.tick().unwrap();
    assert_eq!(app.model_state(), &LoadState::Loaded);
    assert_eq!(app.renderer().last_frame().len(), 3);
    assert_eq!(app.renderer().firefly_instances(), 30);

    app.inbox().post(AssetEvent::Texture(Ok(texel())));
    app.tick().unwrap();
    assert_eq!(app.texture_state(), &LoadState::Loaded);
    let nodes: Vec<_> = app
        .renderer()
        .last_frame()
        .iter()
        .map(|draw| draw.node.as_str())
        .collect();
    assert_eq!(nodes, PORTAL_NODES);
}

#[test]
fn panel_edits_reach_bus_and_clear_color() {
    let (mut app, _clock) = app_with_clock(SceneConfig::default(), ResizeEvent::new(800, 600, 1.0));
    assert_eq!(app.renderer().clear_color().to_hex(), 0x201919);

    app.apply_panel_edit(U_SIZE, PanelEdit::Float(250.0)).unwrap();
    app.apply_panel_edit("clearColor", PanelEdit::Color(Color::from_hex(0x102030)))
        .unwrap();

    assert_eq!(app.bus().float(U_SIZE).unwrap(), 250.0);
    assert_eq!(app.renderer().clear_color().to_hex(), 0x102030);
    assert!(app.apply_panel_edit("uTime", PanelEdit::Float(1.0)).is_err());
}

#[test]
fn minimal_config_draws_flat_portal_without_fireflies() {
    let (mut app, _clock) = app_with_clock(SceneConfig::minimal(), ResizeEvent::new(800, 600, 1.0));
    app.inbox().post(AssetEvent::Model(Ok(portal_model())));
    app.tick().unwrap();

    assert!(app.scene().fireflies.is_none());
    assert_eq!(app.renderer().clear_color(), Color::BLACK);
    let portal = app
        .bound_materials()
        .into_iter()
        .find(|(node, _)| node == "portalLight")
        .map(|(_, material)| material);
    assert_eq!(portal.as_deref(), Some("flat(#ffffff, double-sided)"));
}
