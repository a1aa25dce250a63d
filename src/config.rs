use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;
use crate::fireflies::DEFAULT_COUNT;
use crate::material::Side;
use crate::texture::ColorSpace;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid scene config XML")]
    Xml(#[from] roxmltree::Error),
    #[error("root element must be <scene>, found <{0}>")]
    UnexpectedRoot(String),
    #[error("<{tag}> is missing the `{attribute}` attribute")]
    MissingAttribute {
        tag: &'static str,
        attribute: &'static str,
    },
    #[error("<{tag}> has an invalid {attribute} `{value}`: {reason}")]
    InvalidValue {
        tag: &'static str,
        attribute: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown material `{0}` (expected baked, poleLight, portal or flat)")]
    UnknownMaterial(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureConfig {
    pub path: String,
    pub flip_y: bool,
    pub color_space: ColorSpace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 0.0, 3.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// Shader-driven portal and fireflies; off gives flat materials only.
    pub shaders: bool,
    pub panel: bool,
}

/// Material named by a binding row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaterialRef {
    Baked,
    PoleLight,
    Portal,
    Flat { color: Color, side: Side },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSpec {
    pub node: String,
    pub material: MaterialRef,
}

impl BindingSpec {
    pub fn new(node: &str, material: MaterialRef) -> Self {
        Self {
            node: node.to_string(),
            material,
        }
    }
}

/// Everything about the scene that is not code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub model_path: String,
    pub texture: TextureConfig,
    /// `None` picks the default for the enabled features.
    pub clear_color: Option<Color>,
    pub max_pixel_ratio: f32,
    pub camera: CameraConfig,
    pub portal_color_start: Color,
    pub portal_color_end: Color,
    pub pole_light_color: Color,
    pub firefly_count: usize,
    pub firefly_size: f32,
    /// Fixed seed for reproducible particle layouts.
    pub firefly_seed: Option<u64>,
    pub features: Features,
    pub bindings: Vec<BindingSpec>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            model_path: "portal.glb".to_string(),
            texture: TextureConfig {
                path: "baked.jpg".to_string(),
                flip_y: false,
                color_space: ColorSpace::Srgb,
            },
            clear_color: None,
            max_pixel_ratio: 2.0,
            camera: CameraConfig::default(),
            portal_color_start: Color::from_hex(0xb91fac),
            portal_color_end: Color::from_hex(0xffebf3),
            pole_light_color: Color::from_hex(0xfaeb64),
            firefly_count: DEFAULT_COUNT,
            firefly_size: 100.0,
            firefly_seed: None,
            features: Features {
                shaders: true,
                panel: true,
            },
            bindings: vec![
                BindingSpec::new("baked", MaterialRef::Baked),
                BindingSpec::new("poleLightA", MaterialRef::PoleLight),
                BindingSpec::new("poleLightB", MaterialRef::PoleLight),
                BindingSpec::new("portalLight", MaterialRef::Portal),
            ],
        }
    }
}

impl SceneConfig {
    /// Baked model, flat lights, no shaders and no panel.
    pub fn minimal() -> Self {
        Self {
            features: Features {
                shaders: false,
                panel: false,
            },
            ..Self::default()
        }
    }

    pub fn effective_clear_color(&self) -> Color {
        self.clear_color.unwrap_or(if self.features.panel {
            Color::from_hex(0x201919)
        } else {
            Color::BLACK
        })
    }

    /// Parses a `<scene>` document; absent elements keep their defaults.
    pub fn from_xml(xml: &str) -> Result<Self, ConfigError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if !root.has_tag_name("scene") {
            return Err(ConfigError::UnexpectedRoot(
                root.tag_name().name().to_string(),
            ));
        }

        let mut config = Self::default();
        if let Some(path) = child_text(&root, "model") {
            config.model_path = path;
        }
        if let Some(node) = child(&root, "texture") {
            if let Some(path) = node.text().map(str::trim).filter(|t| !t.is_empty()) {
                config.texture.path = path.to_string();
            }
            config.texture.flip_y = parse_bool(&node, "texture", "flipY", config.texture.flip_y)?;
            if let Some(space) = node.attribute("colorSpace") {
                config.texture.color_space = match space.to_ascii_lowercase().as_str() {
                    "srgb" => ColorSpace::Srgb,
                    "linear" => ColorSpace::Linear,
                    _ => return Err(invalid("texture", "colorSpace", space, "expected srgb or linear")),
                };
            }
        }
        if let Some(text) = child_text(&root, "clearColor") {
            config.clear_color = Some(parse_color_value("clearColor", "text", &text)?);
        }
        if let Some(text) = child_text(&root, "pixelRatioMax") {
            let max = parse_number::<f32>("pixelRatioMax", "text", &text)?;
            if max <= 0.0 {
                return Err(invalid("pixelRatioMax", "text", &text, "must be positive"));
            }
            config.max_pixel_ratio = max;
        }
        if let Some(node) = child(&root, "camera") {
            let camera = &mut config.camera;
            camera.fov = parse_attr(&node, "camera", "fov", camera.fov)?;
            camera.near = parse_attr(&node, "camera", "near", camera.near)?;
            camera.far = parse_attr(&node, "camera", "far", camera.far)?;
            if let Some(value) = node.attribute("position") {
                camera.position = parse_vec3("camera", "position", value)?;
            }
        }
        if let Some(node) = child(&root, "portal") {
            if let Some(value) = node.attribute("start") {
                config.portal_color_start = parse_color_value("portal", "start", value)?;
            }
            if let Some(value) = node.attribute("end") {
                config.portal_color_end = parse_color_value("portal", "end", value)?;
            }
        }
        if let Some(node) = child(&root, "poleLight") {
            if let Some(value) = node.attribute("color") {
                config.pole_light_color = parse_color_value("poleLight", "color", value)?;
            }
        }
        if let Some(node) = child(&root, "fireflies") {
            config.firefly_count = parse_attr(&node, "fireflies", "count", config.firefly_count)?;
            config.firefly_size = parse_attr(&node, "fireflies", "size", config.firefly_size)?;
            if let Some(seed) = node.attribute("seed") {
                config.firefly_seed = Some(parse_number("fireflies", "seed", seed)?);
            }
        }
        if let Some(node) = child(&root, "features") {
            config.features.shaders =
                parse_bool(&node, "features", "shaders", config.features.shaders)?;
            config.features.panel = parse_bool(&node, "features", "panel", config.features.panel)?;
        }
        if let Some(node) = child(&root, "bindings") {
            config.bindings = node
                .children()
                .filter(|n| n.has_tag_name("bind"))
                .map(|n| parse_binding(&n))
                .collect::<Result<_, _>>()?;
        }
        Ok(config)
    }
}

fn parse_binding(node: &Node<'_, '_>) -> Result<BindingSpec, ConfigError> {
    let name = node.attribute("node").ok_or(ConfigError::MissingAttribute {
        tag: "bind",
        attribute: "node",
    })?;
    let material = node.attribute("material").ok_or(ConfigError::MissingAttribute {
        tag: "bind",
        attribute: "material",
    })?;
    let material = match material {
        "baked" => MaterialRef::Baked,
        "poleLight" => MaterialRef::PoleLight,
        "portal" => MaterialRef::Portal,
        "flat" => {
            let color = node.attribute("color").ok_or(ConfigError::MissingAttribute {
                tag: "bind",
                attribute: "color",
            })?;
            let side = match node.attribute("side") {
                None | Some("front") => Side::Front,
                Some("double") => Side::Double,
                Some(other) => return Err(invalid("bind", "side", other, "expected front or double")),
            };
            MaterialRef::Flat {
                color: parse_color_value("bind", "color", color)?,
                side,
            }
        }
        other => return Err(ConfigError::UnknownMaterial(other.to_string())),
    };
    Ok(BindingSpec::new(name, material))
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn child_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn invalid(tag: &'static str, attribute: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        tag,
        attribute,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T>(tag: &'static str, attribute: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| invalid(tag, attribute, value, &err.to_string()))
}

fn parse_attr<T>(
    node: &Node<'_, '_>,
    tag: &'static str,
    attribute: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match node.attribute(attribute) {
        Some(value) => parse_number(tag, attribute, value),
        None => Ok(default),
    }
}

fn parse_bool(
    node: &Node<'_, '_>,
    tag: &'static str,
    attribute: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match node.attribute(attribute) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(invalid(tag, attribute, other, "expected true or false")),
    }
}

fn parse_color_value(
    tag: &'static str,
    attribute: &'static str,
    value: &str,
) -> Result<Color, ConfigError> {
    Color::parse(value).map_err(|err| invalid(tag, attribute, value, &err.to_string()))
}

fn parse_vec3(tag: &'static str, attribute: &'static str, value: &str) -> Result<Vec3, ConfigError> {
    let components = value
        .split_whitespace()
        .map(|component| parse_number::<f32>(tag, attribute, component))
        .collect::<Result<Vec<_>, _>>()?;
    match components.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(invalid(tag, attribute, value, "expected three components")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
    <scene>
        <model>models/portal.glb</model>
        <texture flipY="true" colorSpace="linear">models/baked.png</texture>
        <clearColor>#101010</clearColor>
        <pixelRatioMax>1.5</pixelRatioMax>
        <camera fov="60" position="1 2 4"/>
        <portal start="#000000" end="#ffffff"/>
        <fireflies count="12" size="220" seed="9"/>
        <features shaders="false" panel="true"/>
        <bindings>
            <bind node="baked" material="baked"/>
            <bind node="sign" material="flat" color="#ff0000" side="double"/>
        </bindings>
    </scene>
    "##;

    #[test]
    fn parse_overrides_defaults() {
        let config = SceneConfig::from_xml(SAMPLE).unwrap();
        assert_eq!(config.model_path, "models/portal.glb");
        assert_eq!(config.texture.path, "models/baked.png");
        assert!(config.texture.flip_y);
        assert_eq!(config.texture.color_space, ColorSpace::Linear);
        assert_eq!(config.effective_clear_color().to_hex(), 0x101010);
        assert_eq!(config.max_pixel_ratio, 1.5);
        assert_eq!(config.camera.fov, 60.0);
        assert_eq!(config.camera.near, 0.1);
        assert_eq!(config.camera.position, Vec3::new(1.0, 2.0, 4.0));
        assert_eq!(config.portal_color_end, Color::WHITE);
        assert_eq!(config.pole_light_color.to_hex(), 0xfaeb64);
        assert_eq!((config.firefly_count, config.firefly_size), (12, 220.0));
        assert_eq!(config.firefly_seed, Some(9));
        assert!(!config.features.shaders);
        assert_eq!(config.bindings.len(), 2);
        assert_eq!(
            config.bindings[1].material,
            MaterialRef::Flat {
                color: Color::from_hex(0xff0000),
                side: Side::Double
            }
        );
    }

    #[test]
    fn empty_scene_keeps_defaults() {
        let config = SceneConfig::from_xml("<scene/>").unwrap();
        assert_eq!(config, SceneConfig::default());
        assert_eq!(config.effective_clear_color().to_hex(), 0x201919);
        assert_eq!(SceneConfig::minimal().effective_clear_color(), Color::BLACK);
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = SceneConfig::from_xml(r#"<scene><camera fov="wide"/></scene>"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                tag: "camera",
                attribute: "fov",
                ..
            }
        ));
        assert!(SceneConfig::from_xml("<scene><clearColor>red</clearColor></scene>").is_err());
        assert!(matches!(
            SceneConfig::from_xml(r#"<scene><bindings><bind node="x" material="chrome"/></bindings></scene>"#),
            Err(ConfigError::UnknownMaterial(_))
        ));
        assert!(matches!(
            SceneConfig::from_xml("<world/>"),
            Err(ConfigError::UnexpectedRoot(_))
        ));
    }
}
