//! Embeddable viewer core for single architectural glTF models.
//!
//! The [`viewer::Viewer`] owns the scene and drives loading, framing,
//! interaction modes, hover highlighting and screenshots. Hosts plug in a
//! [`render::RenderSurface`], an [`assets::LoadBackend`] and optional
//! [`ui::ViewerPorts`].

pub mod assets;
pub mod config;
pub mod render;
pub mod scene;
pub mod ui;
pub mod viewer;
