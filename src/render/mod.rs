pub mod camera;
pub mod highlight;
pub mod lights;
pub mod pick;
pub mod raster;
pub mod resources;

pub use camera::{CameraPose, OrbitController, PerspectiveCamera};
pub use highlight::{HighlightStyle, MaterialBindings};
pub use lights::LightRig;
pub use pick::{PickHit, Ray, SurfaceRect};
pub use raster::SoftwareRasterizer;
pub use resources::ResourceRegistry;

use crate::scene::SceneGraph;
use glam::Vec2;
use image::ImageEncoder;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render surface has no pixels to read")]
    EmptySurface,
    #[error("failed encoding frame: {0}")]
    Encode(#[from] image::ImageError),
}

/// Everything a rasterizer needs to draw one frame.
pub struct Frame<'a> {
    pub graph: &'a SceneGraph,
    pub resources: &'a ResourceRegistry,
    pub camera: &'a PerspectiveCamera,
    pub lights: &'a LightRig,
    pub background: [u8; 3],
}

/// Borrowed RGBA8 view of the last rendered frame.
#[derive(Debug, Clone, Copy)]
pub struct FramePixels<'a> {
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
}

/// Drawing backend bound to a render surface.
pub trait Rasterizer {
    /// Resize the output target, in physical pixels.
    fn resize(&mut self, width: u32, height: u32);
    fn render(&mut self, frame: &Frame<'_>);
    fn frame_pixels(&self) -> FramePixels<'_>;
}

/// The host's drawable area: its on-screen rectangle, the device pixel
/// ratio and the rasterizer that renders into it.
pub struct RenderSurface {
    rect: SurfaceRect,
    pixel_ratio: f32,
    rasterizer: Box<dyn Rasterizer>,
}

impl RenderSurface {
    pub fn new(rect: SurfaceRect, pixel_ratio: f32, rasterizer: Box<dyn Rasterizer>) -> Self {
        let mut surface = Self {
            rect: clamp_rect(rect),
            pixel_ratio: sanitize_ratio(pixel_ratio),
            rasterizer,
        };
        let (width, height) = surface.physical_size();
        surface.rasterizer.resize(width, height);
        surface
    }

    /// Software-rasterized surface of `width` x `height` logical pixels.
    pub fn software(width: f32, height: f32, pixel_ratio: f32) -> Self {
        let rect = SurfaceRect {
            left: 0.0,
            top: 0.0,
            width,
            height,
        };
        Self::new(rect, pixel_ratio, Box::new(SoftwareRasterizer::new(1, 1)))
    }

    pub fn rect(&self) -> SurfaceRect {
        self.rect
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn aspect(&self) -> f32 {
        self.rect.width / self.rect.height
    }

    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.rect.width * self.pixel_ratio).round().max(1.0) as u32,
            (self.rect.height * self.pixel_ratio).round().max(1.0) as u32,
        )
    }

    /// Follow a container resize. Returns whether anything changed.
    pub fn resize(&mut self, rect: SurfaceRect, pixel_ratio: f32) -> bool {
        let rect = clamp_rect(rect);
        let pixel_ratio = sanitize_ratio(pixel_ratio);
        if rect == self.rect && pixel_ratio == self.pixel_ratio {
            return false;
        }
        self.rect = rect;
        self.pixel_ratio = pixel_ratio;
        let (width, height) = self.physical_size();
        self.rasterizer.resize(width, height);
        log::debug!(
            "Surface resized to {}x{} ({}x{} physical)",
            rect.width,
            rect.height,
            width,
            height
        );
        true
    }

    /// Pointer position (host coordinates) to normalized device coordinates.
    pub fn to_ndc(&self, x: f32, y: f32) -> Vec2 {
        pick::pointer_to_ndc(x, y, &self.rect)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.rect.contains(x, y)
    }

    pub fn draw(&mut self, frame: &Frame<'_>) {
        self.rasterizer.render(frame);
    }

    pub fn pixels(&self) -> FramePixels<'_> {
        self.rasterizer.frame_pixels()
    }
}

fn clamp_rect(rect: SurfaceRect) -> SurfaceRect {
    SurfaceRect {
        width: rect.width.max(1.0),
        height: rect.height.max(1.0),
        ..rect
    }
}

fn sanitize_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

/// Encode an RGBA8 frame as PNG.
pub fn encode_png(pixels: FramePixels<'_>) -> Result<Vec<u8>, RenderError> {
    let expected = pixels.width as usize * pixels.height as usize * 4;
    if expected == 0 || pixels.rgba.len() != expected {
        return Err(RenderError::EmptySurface);
    }
    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut bytes).write_image(
        pixels.rgba,
        pixels.width,
        pixels.height,
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_clamps_and_scales() {
        let mut surface = RenderSurface::software(0.0, 300.0, 2.0);
        assert_eq!(surface.rect().width, 1.0);
        assert_eq!(surface.physical_size(), (2, 600));

        let rect = SurfaceRect {
            left: 10.0,
            top: 20.0,
            width: 400.0,
            height: 200.0,
        };
        assert!(surface.resize(rect, 1.0));
        assert!(!surface.resize(rect, 1.0));
        assert_eq!(surface.aspect(), 2.0);
        assert_eq!(surface.pixels().width, 400);
        assert_eq!(surface.to_ndc(210.0, 120.0), Vec2::ZERO);
    }

    #[test]
    fn invalid_pixel_ratio_falls_back_to_one() {
        let surface = RenderSurface::software(100.0, 50.0, f32::NAN);
        assert_eq!(surface.pixel_ratio(), 1.0);
        assert_eq!(surface.physical_size(), (100, 50));
    }

    #[test]
    fn encodes_png_signature() {
        let rgba = vec![255u8; 2 * 2 * 4];
        let png = encode_png(FramePixels {
            width: 2,
            height: 2,
            rgba: &rgba,
        })
        .unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let short = FramePixels {
            width: 2,
            height: 2,
            rgba: &rgba[..4],
        };
        assert!(matches!(encode_png(short), Err(RenderError::EmptySurface)));
    }
}
