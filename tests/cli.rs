mod common;

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::tempdir;

use common::{write_assets, PORTAL_NODES};

#[test]
fn summary_lists_bound_materials() {
    let dir = tempdir().expect("temp dir");
    write_assets(dir.path(), PORTAL_NODES);

    let mut cmd = Command::cargo_bin("portal-scene").expect("binary exists");
    cmd.arg(dir.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded model portal.glb with 5 nodes"))
        .stdout(contains(" - baked -> baked(baked.jpg)"))
        .stdout(contains(" - portalLight -> shader(portal)"))
        .stdout(contains(" - poleLightA -> flat(#faeb64)"))
        .stdout(contains(" - poleLightB -> flat(#faeb64)"))
        .stdout(contains("Fireflies: 30"))
        .stdout(contains("Drew 4 meshes, clear color #201919"))
        .stdout(contains("Debug panel: uSize, uColorStart, uColorEnd, clearColor"));
}

#[test]
fn no_shaders_falls_back_to_flat_portal() {
    let dir = tempdir().expect("temp dir");
    write_assets(dir.path(), PORTAL_NODES);

    let mut cmd = Command::cargo_bin("portal-scene").expect("binary exists");
    cmd.arg(dir.path()).arg("--summary-only").arg("--no-shaders");
    cmd.assert()
        .success()
        .stdout(contains(" - portalLight -> flat(#ffffff, double-sided)"))
        .stdout(contains("Fireflies").not());
}

#[test]
fn missing_portal_node_fails() {
    let dir = tempdir().expect("temp dir");
    write_assets(dir.path(), &["baked", "poleLightA", "poleLightB"]);

    let mut cmd = Command::cargo_bin("portal-scene").expect("binary exists");
    cmd.arg(dir.path()).arg("--summary-only");
    cmd.assert().failure().stderr(contains("portalLight"));
}

#[test]
fn config_file_overrides_pole_light_color() {
    let dir = tempdir().expect("temp dir");
    write_assets(dir.path(), PORTAL_NODES);
    let config = dir.path().join("scene.xml");
    fs::write(
        &config,
        r##"<scene><poleLight color="#ff0000"/><features shaders="true" panel="false"/></scene>"##,
    )
    .expect("write config");

    let mut cmd = Command::cargo_bin("portal-scene").expect("binary exists");
    cmd.arg(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains(" - poleLightA -> flat(#ff0000)"))
        .stdout(contains("clear color #000000"))
        .stdout(contains("Debug panel").not());
}

#[test]
fn missing_assets_dir_argument_is_usage_error() {
    let mut cmd = Command::cargo_bin("portal-scene").expect("binary exists");
    cmd.assert().failure().stderr(contains("Usage: portal-scene"));
}
