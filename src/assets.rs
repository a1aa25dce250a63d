//! Asynchronous model and texture loading.
//!
//! Loads run off the frame loop (a background thread natively, a spawned
//! future in the browser) and post their results into an [`AssetInbox`]. The
//! application drains the inbox at the start of each tick, so everything that
//! touches the scene still happens on one context.

use std::sync::Arc;

use log::{error, info};
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::SceneConfig;
use crate::model::load_gltf;
use crate::scene::SceneNode;
use crate::texture::{decode_image, TextureImage};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("invalid glTF data")]
    Gltf(#[from] gltf::Error),
    #[error("unsupported asset feature: {0}")]
    Unsupported(String),
    #[error("glTF buffer {0} refers to a missing binary chunk")]
    MissingBuffer(usize),
    #[error("external glTF buffer `{0}` is not supported, pack the model as GLB")]
    ExternalBuffer(String),
    #[error("failed to decode image")]
    Image(#[from] image::ImageError),
}

/// Progress of one asynchronous asset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Pending,
    Loaded,
    /// The asset will never arrive; the scene renders without it.
    Failed(String),
}

#[derive(Debug)]
pub enum AssetEvent {
    Model(Result<SceneNode, LoadError>),
    Texture(Result<TextureImage, LoadError>),
}

/// Mailbox between loaders and the frame loop.
#[derive(Debug, Default)]
pub struct AssetInbox {
    events: Arc<Mutex<Vec<AssetEvent>>>,
}

impl Clone for AssetInbox {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl AssetInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, event: AssetEvent) {
        self.events.lock().push(event);
    }

    pub fn drain(&self) -> Vec<AssetEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Where asset paths are resolved: a directory natively, a URL prefix
/// relative to the page in the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSource {
    base: String,
}

impl AssetSource {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn load_binary(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = self.url_for(name)?;
            let fetch_error = |err: reqwest::Error| LoadError::Fetch {
                url: url.to_string(),
                message: err.to_string(),
            };
            reqwest::get(url.clone())
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(fetch_error)?
                .bytes()
                .await
                .map_err(fetch_error)?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = {
            let path = std::path::Path::new(&self.base).join(name);
            std::fs::read(&path).map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            })?
        };
        Ok(data)
    }

    #[cfg(target_arch = "wasm32")]
    fn url_for(&self, name: &str) -> Result<reqwest::Url, LoadError> {
        let fetch_error = |message: String| LoadError::Fetch {
            url: name.to_string(),
            message,
        };
        let href = web_sys::window()
            .and_then(|window| window.location().href().ok())
            .ok_or_else(|| fetch_error("page location unavailable".to_string()))?;
        let page = reqwest::Url::parse(&href).map_err(|err| fetch_error(err.to_string()))?;
        let base = if self.base.is_empty() || self.base.ends_with('/') {
            self.base.clone()
        } else {
            format!("{}/", self.base)
        };
        page.join(&base)
            .and_then(|base| base.join(name))
            .map_err(|err| fetch_error(err.to_string()))
    }

    pub async fn load_model(&self, path: &str) -> Result<SceneNode, LoadError> {
        let bytes = self.load_binary(path).await?;
        load_gltf(&bytes)
    }

    pub async fn load_texture(&self, path: &str, flip_y: bool) -> Result<TextureImage, LoadError> {
        let bytes = self.load_binary(path).await?;
        decode_image(&bytes, flip_y)
    }
}

/// The two assets a scene needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub model_path: String,
    pub texture_path: String,
    pub flip_y: bool,
}

impl LoadRequest {
    pub fn from_config(config: &SceneConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            texture_path: config.texture.path.clone(),
            flip_y: config.texture.flip_y,
        }
    }
}

/// Loads both assets and posts each result as it completes.
pub async fn load_all(source: AssetSource, request: LoadRequest, inbox: AssetInbox) {
    let texture = source
        .load_texture(&request.texture_path, request.flip_y)
        .await;
    log_outcome(&request.texture_path, texture.as_ref().err());
    inbox.post(AssetEvent::Texture(texture));

    let model = source.load_model(&request.model_path).await;
    log_outcome(&request.model_path, model.as_ref().err());
    inbox.post(AssetEvent::Model(model));
}

fn log_outcome(path: &str, err: Option<&LoadError>) {
    match err {
        None => info!("loaded {path}"),
        Some(err) => error!("failed to load {path}: {err}"),
    }
}

/// Starts [`load_all`] without blocking the caller.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_loads(
    source: AssetSource,
    request: LoadRequest,
    inbox: AssetInbox,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || pollster::block_on(load_all(source, request, inbox)))
}

/// Starts [`load_all`] without blocking the caller.
#[cfg(target_arch = "wasm32")]
pub fn spawn_loads(source: AssetSource, request: LoadRequest, inbox: AssetInbox) {
    wasm_bindgen_futures::spawn_local(load_all(source, request, inbox));
}
