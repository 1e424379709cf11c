//! Model sources and decoding.
//!
//! A [`SceneDecoder`] turns a [`ModelSource`] into a plain [`DecodedScene`]
//! tree. Decoding never touches the scene graph or the resource registry;
//! the viewer instantiates the decoded tree when (and if) it attaches it.

pub mod gltf_decoder;
pub mod worker;

pub use gltf_decoder::GltfDecoder;
pub use worker::{DecodeWorker, LoadBackend, LoadEvent, LoadEventKind, LoadRequest};

use crate::render::resources::{MaterialKind, TextureSlot};
use glam::{Mat4, Vec3};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read model at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("malformed data URL (expected 'data:<mime>;base64,<payload>')")]
    InvalidDataUrl,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to parse glTF: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("missing position data for mesh: {mesh}")]
    MissingPositions { mesh: String },
    #[error("decode worker stopped before finishing")]
    WorkerDisconnected,
}

/// Where a model comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// `.gltf` / `.glb` on disk; external buffers resolve relative to it.
    Path(PathBuf),
    Url(String),
    /// `data:<mime>;base64,<payload>`, as produced by reading a picked file.
    DataUrl(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl ModelSource {
    /// Classify user input: data URLs, then http(s) URLs, else a path.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with("data:") {
            Self::DataUrl(Arc::from(trimmed))
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }

    pub fn bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Url(_) => "url",
            Self::DataUrl(_) => "data-url",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
            Self::DataUrl(data) => write!(f, "data URL ({} chars)", data.len()),
            Self::Bytes(bytes) => write!(f, "{} bytes", bytes.len()),
        }
    }
}

/// Bytes received so far, plus the total when the transport knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn percent(&self) -> Option<u32> {
        match self.total {
            Some(total) if total > 0 => {
                Some(((self.loaded as f64 / total as f64) * 100.0).round() as u32)
            }
            _ => None,
        }
    }

    pub fn status_text(&self) -> String {
        match self.percent() {
            Some(percent) => format!("{percent}% loaded"),
            None => "Loading...".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    /// RGBA8.
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMaterial {
    pub name: String,
    pub kind: MaterialKind,
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub double_sided: bool,
    /// Indices into [`DecodedScene::textures`].
    pub textures: Vec<(TextureSlot, usize)>,
}

impl Default for DecodedMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: MaterialKind::Standard,
            base_color: [1.0, 1.0, 1.0, 1.0],
            emissive: [0.0, 0.0, 0.0],
            double_sided: false,
            textures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Index into [`DecodedScene::materials`]; `None` uses a default material.
    pub material: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedNode {
    pub name: String,
    pub transform: Mat4,
    pub mesh: Option<DecodedMesh>,
    pub children: Vec<DecodedNode>,
}

impl DecodedNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: DecodedMesh) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::group(name)
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: DecodedNode) -> Self {
        self.children.push(child);
        self
    }

    fn count(&self, predicate: &impl Fn(&DecodedNode) -> bool) -> usize {
        usize::from(predicate(self)) + self.children.iter().map(|c| c.count(predicate)).sum::<usize>()
    }
}

/// Decoder output: a node tree plus the material and texture tables its
/// meshes index into.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedScene {
    pub root: DecodedNode,
    pub materials: Vec<DecodedMaterial>,
    pub textures: Vec<DecodedTexture>,
}

impl DecodedScene {
    pub fn new(root: DecodedNode) -> Self {
        Self {
            root,
            materials: Vec::new(),
            textures: Vec::new(),
        }
    }

    /// Nodes including the root.
    pub fn node_count(&self) -> usize {
        self.root.count(&|_| true)
    }

    pub fn mesh_count(&self) -> usize {
        self.root.count(&|n| n.mesh.is_some())
    }

    /// A root with neither children nor geometry.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty() && self.root.mesh.is_none()
    }
}

/// Turns a model source into a decoded scene.
///
/// `Ok(None)` means the payload parsed but holds no scene.
pub trait SceneDecoder: Send + Sync {
    fn decode(
        &self,
        source: &ModelSource,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<Option<DecodedScene>, AssetError>;
}
