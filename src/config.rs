//! Viewer settings read from an XML document.
//!
//! Every element is optional. A missing document, or an empty `<viewer/>`,
//! yields the defaults: an 800x600 window, the
//! fly-camera stage, WASD bindings and generated textures.
//!
//! ```xml
//! <viewer>
//!   <stage>fly-camera</stage>
//!   <window><width>1280</width><height>720</height></window>
//!   <camera>
//!     <position>0 0 3</position>
//!     <fov>70</fov>
//!     <sensitivity>0.002</sensitivity>
//!     <speed>2.5</speed>
//!   </camera>
//!   <bindings><forward>Up</forward></bindings>
//!   <textures>
//!     <primary><path>container.jpg</path><wrap>clamp</wrap></primary>
//!     <mix>0.2</mix>
//!   </textures>
//!   <clear_color>51 77 77</clear_color>
//!   <object><name>lamp</name><type>light-cube</type><scale>0.2 0.2 0.2</scale></object>
//! </viewer>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use log::info;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{clamp_pitch, CameraConfig};
use crate::input::{KeyBindings, KeyCode};
use crate::scene::{ObjectKind, SceneObject, Spin, Stage};
use crate::texture::{FilterMode, TextureError, TextureSet, TextureSource, WrapMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("expected a <viewer> root element, found <{0}>")]
    UnexpectedRoot(String),
    #[error("<{tag}> is missing")]
    Missing { tag: String },
    #[error("<{tag}> has invalid value `{value}`")]
    Invalid { tag: String, value: String },
    #[error("<{tag}> must be {constraint}, got {value}")]
    OutOfRange {
        tag: String,
        constraint: &'static str,
        value: f32,
    },
    #[error("{0}")]
    Stage(String),
    #[error("<{tag}> names unknown key `{name}`")]
    UnknownKey { tag: String, name: String },
    #[error(transparent)]
    Texture(#[from] TextureError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Cube Viewer".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Camera pose the program starts from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraStart {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for CameraStart {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub stage: Stage,
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub start: CameraStart,
    pub bindings: KeyBindings,
    pub textures: TextureSet,
    pub clear_color: Vec3,
    /// Objects to draw; `None` keeps the stage defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<SceneObject>>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            stage: Stage::default(),
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            start: CameraStart::default(),
            bindings: KeyBindings::default(),
            textures: TextureSet::default(),
            clear_color: Vec3::new(0.2, 0.3, 0.3),
            objects: None,
        }
    }
}

impl ViewerConfig {
    /// Reads a config file. Relative texture paths resolve against the file's
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_xml(&xml)?;
        if let Some(base) = path.parent() {
            config.textures.primary.path = rebase(config.textures.primary.path.take(), base);
            config.textures.secondary.path = rebase(config.textures.secondary.path.take(), base);
        }
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_xml(xml: &str) -> Result<Self, ConfigError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if !root.has_tag_name("viewer") {
            return Err(ConfigError::UnexpectedRoot(
                root.tag_name().name().to_string(),
            ));
        }

        let mut config = Self::default();
        if let Some(stage) = optional_text(&root, "stage") {
            config.stage = stage.parse().map_err(ConfigError::Stage)?;
        }
        if let Some(window) = child(&root, "window") {
            config.window = parse_window(&window, config.window)?;
        }
        if let Some(camera) = child(&root, "camera") {
            let (camera_config, start) = parse_camera(&camera, config.camera, config.start)?;
            config.camera = camera_config;
            config.start = start;
        }
        if let Some(bindings) = child(&root, "bindings") {
            config.bindings = parse_bindings(&bindings, config.bindings)?;
        }
        if let Some(textures) = child(&root, "textures") {
            config.textures = parse_textures(&textures, config.textures)?;
        }
        config.clear_color = parse_color(&root, "clear_color", config.clear_color)?;

        let objects = root
            .children()
            .filter(|node| node.has_tag_name("object"))
            .map(|node| parse_object(&node))
            .collect::<Result<Vec<_>, _>>()?;
        if !objects.is_empty() {
            config.objects = Some(objects);
        }
        Ok(config)
    }

    /// Objects for the configured stage.
    pub fn scene_objects(&self) -> Vec<SceneObject> {
        self.objects
            .clone()
            .unwrap_or_else(|| self.stage.default_objects())
    }
}

fn rebase(path: Option<PathBuf>, base: &Path) -> Option<PathBuf> {
    path.map(|path| {
        if path.is_relative() {
            base.join(path)
        } else {
            path
        }
    })
}

fn parse_window(
    node: &Node<'_, '_>,
    mut window: WindowConfig,
) -> Result<WindowConfig, ConfigError> {
    if let Some(title) = optional_text(node, "title") {
        window.title = title;
    }
    window.width = parse_u32(node, "width", window.width)?;
    window.height = parse_u32(node, "height", window.height)?;
    if window.width == 0 || window.height == 0 {
        return Err(ConfigError::Invalid {
            tag: "window".to_string(),
            value: format!("{}x{}", window.width, window.height),
        });
    }
    Ok(window)
}

fn parse_camera(
    node: &Node<'_, '_>,
    mut camera: CameraConfig,
    mut start: CameraStart,
) -> Result<(CameraConfig, CameraStart), ConfigError> {
    camera.fov_degrees = parse_f32(node, "fov", camera.fov_degrees)?;
    if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
        return Err(ConfigError::OutOfRange {
            tag: "fov".to_string(),
            constraint: "between 0 and 180 degrees",
            value: camera.fov_degrees,
        });
    }
    camera.sensitivity = parse_f32(node, "sensitivity", camera.sensitivity)?;
    camera.move_speed = parse_f32(node, "speed", camera.move_speed)?;
    if camera.move_speed < 0.0 {
        return Err(ConfigError::OutOfRange {
            tag: "speed".to_string(),
            constraint: "non-negative",
            value: camera.move_speed,
        });
    }

    start.position = parse_vec3(node, "position", start.position)?;
    start.yaw = parse_f32(node, "yaw", start.yaw.to_degrees())?.to_radians();
    start.pitch = clamp_pitch(parse_f32(node, "pitch", start.pitch.to_degrees())?.to_radians());
    Ok((camera, start))
}

fn parse_bindings(
    node: &Node<'_, '_>,
    mut bindings: KeyBindings,
) -> Result<KeyBindings, ConfigError> {
    bindings.forward = parse_key(node, "forward", bindings.forward)?;
    bindings.backward = parse_key(node, "backward", bindings.backward)?;
    bindings.left = parse_key(node, "left", bindings.left)?;
    bindings.right = parse_key(node, "right", bindings.right)?;
    Ok(bindings)
}

fn parse_key(node: &Node<'_, '_>, tag: &str, default: KeyCode) -> Result<KeyCode, ConfigError> {
    let Some(name) = optional_text(node, tag) else {
        return Ok(default);
    };
    KeyCode::from_name(&name).ok_or_else(|| ConfigError::UnknownKey {
        tag: tag.to_string(),
        name,
    })
}

fn parse_textures(
    node: &Node<'_, '_>,
    mut textures: TextureSet,
) -> Result<TextureSet, ConfigError> {
    if let Some(primary) = child(node, "primary") {
        textures.primary = parse_texture_source(&primary, textures.primary)?;
    }
    if let Some(secondary) = child(node, "secondary") {
        textures.secondary = parse_texture_source(&secondary, textures.secondary)?;
    }
    textures.scale = parse_f32(node, "scale", textures.scale)?;
    textures.mix = parse_f32(node, "mix", textures.mix)?;
    if !(0.0..=1.0).contains(&textures.mix) {
        return Err(ConfigError::OutOfRange {
            tag: "mix".to_string(),
            constraint: "between 0 and 1",
            value: textures.mix,
        });
    }
    Ok(textures)
}

fn parse_texture_source(
    node: &Node<'_, '_>,
    mut source: TextureSource,
) -> Result<TextureSource, ConfigError> {
    if let Some(path) = optional_text(node, "path") {
        source.path = Some(PathBuf::from(path));
    }
    if let Some(wrap) = optional_text(node, "wrap") {
        source.wrap = WrapMode::from_name(&wrap)?;
    }
    if let Some(filter) = optional_text(node, "filter") {
        source.filter = FilterMode::from_name(&filter)?;
    }
    Ok(source)
}

fn parse_object(node: &Node<'_, '_>) -> Result<SceneObject, ConfigError> {
    let mut object = SceneObject {
        name: required_text(node, "name")?,
        ..SceneObject::default()
    };
    if let Some(kind) = optional_text(node, "type") {
        object.kind = ObjectKind::from_name(&kind).ok_or_else(|| ConfigError::Invalid {
            tag: "type".to_string(),
            value: kind,
        })?;
    }
    object.position = parse_vec3(node, "position", object.position)?;
    object.scale = parse_vec3(node, "scale", object.scale)?;
    object.color = parse_color(node, "color", object.color)?;
    if child(node, "spin_axis").is_some() || child(node, "spin_speed").is_some() {
        object.spin = Some(Spin {
            axis: parse_vec3(node, "spin_axis", Vec3::Y)?,
            degrees_per_second: parse_f32(node, "spin_speed", 0.0)?,
        });
    }
    Ok(object)
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String, ConfigError> {
    optional_text(node, tag).ok_or_else(|| ConfigError::Missing {
        tag: tag.to_string(),
    })
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn invalid(tag: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        tag: tag.to_string(),
        value: value.to_string(),
    }
}

fn parse_f32(node: &Node<'_, '_>, tag: &str, default: f32) -> Result<f32, ConfigError> {
    match optional_text(node, tag) {
        Some(value) => value
            .parse::<f32>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(|| invalid(tag, &value)),
        None => Ok(default),
    }
}

fn parse_u32(node: &Node<'_, '_>, tag: &str, default: u32) -> Result<u32, ConfigError> {
    match optional_text(node, tag) {
        Some(value) => value.parse::<u32>().map_err(|_| invalid(tag, &value)),
        None => Ok(default),
    }
}

fn parse_components(tag: &str, value: &str) -> Result<Vec3, ConfigError> {
    let numbers = value
        .split_whitespace()
        .map(|component| component.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid(tag, value))?;
    match numbers.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(invalid(tag, value)),
    }
}

fn parse_vec3(node: &Node<'_, '_>, tag: &str, default: Vec3) -> Result<Vec3, ConfigError> {
    match optional_text(node, tag) {
        Some(value) => parse_components(tag, &value),
        None => Ok(default),
    }
}

/// Colours are written as 0-255 components.
fn parse_color(node: &Node<'_, '_>, tag: &str, default: Vec3) -> Result<Vec3, ConfigError> {
    match optional_text(node, tag) {
        Some(value) => Ok(parse_components(tag, &value)? / 255.0),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::NamedKey;

    const SAMPLE: &str = r#"
    <viewer>
        <stage>perspective</stage>
        <window>
            <title>Demo</title>
            <width>1280</width>
            <height>720</height>
        </window>
        <camera>
            <position>1 2 5</position>
            <yaw>90</yaw>
            <pitch>120</pitch>
            <fov>45</fov>
            <sensitivity>0.01</sensitivity>
            <speed>4</speed>
        </camera>
        <bindings>
            <forward>Up</forward>
            <backward>Down</backward>
        </bindings>
        <textures>
            <primary><path>/tmp/container.jpg</path><filter>nearest</filter></primary>
            <scale>2</scale>
            <mix>0.5</mix>
        </textures>
        <clear_color>0 255 0</clear_color>
        <object>
            <name>Lamp</name>
            <type>light-cube</type>
            <position>0 5 0</position>
            <color>255 128 0</color>
        </object>
        <object>
            <name>Crate</name>
            <spin_speed>30</spin_speed>
        </object>
    </viewer>
    "#;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = ViewerConfig::from_xml("<viewer/>").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.scene_objects(), Stage::FlyCamera.default_objects());
    }

    #[test]
    fn parses_every_section() {
        let config = ViewerConfig::from_xml(SAMPLE).unwrap();
        assert_eq!(config.stage, Stage::Perspective);
        assert_eq!(config.window.title, "Demo");
        assert_eq!((config.window.width, config.window.height), (1280, 720));
        assert_eq!(config.camera.fov_degrees, 45.0);
        assert_eq!(config.camera.sensitivity, 0.01);
        assert_eq!(config.camera.move_speed, 4.0);
        assert_eq!(config.start.position, Vec3::new(1.0, 2.0, 5.0));
        assert!((config.start.yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(config.start.pitch, crate::camera::PITCH_LIMIT);
        assert_eq!(config.bindings.forward, KeyCode::Named(NamedKey::Up));
        assert_eq!(config.bindings.left, KeyCode::Character('A'));
        assert_eq!(
            config.textures.primary.path.as_deref(),
            Some(Path::new("/tmp/container.jpg"))
        );
        assert_eq!(config.textures.primary.filter, FilterMode::Nearest);
        assert_eq!(config.textures.primary.wrap, WrapMode::ClampToEdge);
        assert_eq!(config.textures.scale, 2.0);
        assert_eq!(config.clear_color, Vec3::new(0.0, 1.0, 0.0));

        let objects = config.scene_objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].kind, ObjectKind::LightCube);
        assert_eq!(objects[0].color, Vec3::new(1.0, 128.0 / 255.0, 0.0));
        assert_eq!(objects[1].kind, ObjectKind::TexturedCube);
        let spin = objects[1].spin.unwrap();
        assert_eq!(spin.axis, Vec3::Y);
        assert_eq!(spin.degrees_per_second, 30.0);
    }

    #[test]
    fn rejects_wrong_root() {
        assert!(matches!(
            ViewerConfig::from_xml("<scene/>"),
            Err(ConfigError::UnexpectedRoot(root)) if root == "scene"
        ));
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            "<viewer><stage>orbit</stage></viewer>",
            "<viewer><camera><fov>0</fov></camera></viewer>",
            "<viewer><camera><speed>fast</speed></camera></viewer>",
            "<viewer><camera><position>1 2</position></camera></viewer>",
            "<viewer><bindings><left>Hyper</left></bindings></viewer>",
            "<viewer><textures><mix>2</mix></textures></viewer>",
            "<viewer><textures><primary><wrap>mirror</wrap></primary></textures></viewer>",
            "<viewer><window><width>0</width></window></viewer>",
            "<viewer><object><type>cube</type></object></viewer>",
        ];
        for xml in cases {
            assert!(ViewerConfig::from_xml(xml).is_err(), "{xml}");
        }
    }

    #[test]
    fn relative_texture_paths_follow_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.xml");
        fs::write(
            &path,
            "<viewer><textures><secondary><path>face.png</path></secondary></textures></viewer>",
        )
        .unwrap();
        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(
            config.textures.secondary.path,
            Some(dir.path().join("face.png"))
        );
        assert_eq!(config.textures.primary.path, None);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            ViewerConfig::load("no/such/viewer.xml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
