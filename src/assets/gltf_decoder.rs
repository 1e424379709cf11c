//! glTF / GLB decoding via the `gltf` crate.

use super::{
    AssetError, DecodedMaterial, DecodedMesh, DecodedNode, DecodedScene, DecodedTexture,
    LoadProgress, ModelSource, SceneDecoder,
};
use crate::render::resources::{MaterialKind, TextureSlot};
use base64::Engine as _;
use glam::{Mat4, Vec3};
use std::io::Read;
use std::path::Path;
use std::time::Instant;

const FETCH_CHUNK: usize = 64 * 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct GltfDecoder;

impl GltfDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SceneDecoder for GltfDecoder {
    fn decode(
        &self,
        source: &ModelSource,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<Option<DecodedScene>, AssetError> {
        let started = Instant::now();
        let imported = match source {
            ModelSource::Path(path) => import_path(path, progress)?,
            ModelSource::Url(url) => {
                let body = fetch(url, progress)?;
                gltf::import_slice(&body)?
            }
            ModelSource::DataUrl(data) => {
                let bytes = decode_data_url(data)?;
                report_complete(bytes.len(), progress);
                gltf::import_slice(&bytes)?
            }
            ModelSource::Bytes(bytes) => {
                report_complete(bytes.len(), progress);
                gltf::import_slice(bytes)?
            }
        };
        let scene = convert(imported)?;
        if let Some(scene) = &scene {
            log::info!(
                "Decoded {} ({} nodes, {} meshes, {} materials, {} textures) in {:.1} ms",
                source,
                scene.node_count(),
                scene.mesh_count(),
                scene.materials.len(),
                scene.textures.len(),
                started.elapsed().as_secs_f64() * 1000.0
            );
        }
        Ok(scene)
    }
}

type Imported = (
    gltf::Document,
    Vec<gltf::buffer::Data>,
    Vec<gltf::image::Data>,
);

fn report_complete(len: usize, progress: &mut dyn FnMut(LoadProgress)) {
    let len = len as u64;
    progress(LoadProgress {
        loaded: len,
        total: Some(len),
    });
}

fn import_path(path: &Path, progress: &mut dyn FnMut(LoadProgress)) -> Result<Imported, AssetError> {
    let size = std::fs::metadata(path)
        .map_err(|source| AssetError::Read {
            path: path.display().to_string(),
            source,
        })?
        .len();
    progress(LoadProgress {
        loaded: 0,
        total: Some(size),
    });
    let imported = gltf::import(path)?;
    progress(LoadProgress {
        loaded: size,
        total: Some(size),
    });
    Ok(imported)
}

/// Blocking HTTP GET, reporting progress per chunk.
fn fetch(url: &str, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>, AssetError> {
    let response = ureq::get(url).call().map_err(|err| AssetError::Fetch {
        url: url.to_string(),
        message: err.to_string(),
    })?;
    let total = response
        .header("Content-Length")
        .and_then(|value| value.parse::<u64>().ok());

    let mut reader = response.into_reader();
    let mut body = Vec::with_capacity(total.unwrap_or(0).min(256 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; FETCH_CHUNK];
    loop {
        let read = reader.read(&mut chunk).map_err(|err| AssetError::Fetch {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
        progress(LoadProgress {
            loaded: body.len() as u64,
            total,
        });
    }
    Ok(body)
}

/// `data:<mime>;base64,<payload>` to raw bytes.
pub fn decode_data_url(data: &str) -> Result<Vec<u8>, AssetError> {
    let rest = data.strip_prefix("data:").ok_or(AssetError::InvalidDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(AssetError::InvalidDataUrl)?;
    if !header.ends_with(";base64") {
        return Err(AssetError::InvalidDataUrl);
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
}

fn convert((document, buffers, images): Imported) -> Result<Option<DecodedScene>, AssetError> {
    let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        log::warn!("glTF document contains no scene");
        return Ok(None);
    };

    let textures = images.iter().map(convert_image).collect();
    let materials = document.materials().map(convert_material).collect();

    let mut root = DecodedNode::group(scene.name().unwrap_or_default());
    for node in scene.nodes() {
        root.children.push(convert_node(&node, &buffers)?);
    }

    Ok(Some(DecodedScene {
        root,
        materials,
        textures,
    }))
}

fn convert_node(node: &gltf::Node, buffers: &[gltf::buffer::Data]) -> Result<DecodedNode, AssetError> {
    let mut out = DecodedNode::group(node.name().unwrap_or_default())
        .with_transform(Mat4::from_cols_array_2d(&node.transform().matrix()));

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or("mesh").to_string();
        let mut primitives = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::debug!(
                    "Skipping {:?} primitive of mesh '{}'",
                    primitive.mode(),
                    mesh_name
                );
                continue;
            }
            primitives.push(convert_primitive(&primitive, buffers, &mesh_name)?);
        }

        if primitives.len() == 1 {
            out.mesh = primitives.pop();
        } else {
            for (index, primitive) in primitives.into_iter().enumerate() {
                out.children.push(DecodedNode::mesh(
                    format!("{mesh_name}_{index}"),
                    primitive,
                ));
            }
        }
    }

    for child in node.children() {
        out.children.push(convert_node(&child, buffers)?);
    }
    Ok(out)
}

fn convert_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    mesh_name: &str,
) -> Result<DecodedMesh, AssetError> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .ok_or_else(|| AssetError::MissingPositions {
            mesh: mesh_name.to_string(),
        })?
        .map(Vec3::from)
        .collect();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    Ok(DecodedMesh {
        positions,
        indices,
        material: primitive.material().index(),
    })
}

fn convert_material(material: gltf::Material) -> DecodedMaterial {
    let pbr = material.pbr_metallic_roughness();
    let mut textures = Vec::new();
    if let Some(info) = pbr.base_color_texture() {
        textures.push((TextureSlot::BaseColor, info.texture().source().index()));
    }
    if let Some(info) = pbr.metallic_roughness_texture() {
        textures.push((TextureSlot::MetallicRoughness, info.texture().source().index()));
    }
    if let Some(normal) = material.normal_texture() {
        textures.push((TextureSlot::Normal, normal.texture().source().index()));
    }
    if let Some(occlusion) = material.occlusion_texture() {
        textures.push((TextureSlot::Occlusion, occlusion.texture().source().index()));
    }
    if let Some(info) = material.emissive_texture() {
        textures.push((TextureSlot::Emissive, info.texture().source().index()));
    }

    DecodedMaterial {
        name: material.name().unwrap_or_default().to_string(),
        kind: if material.unlit() {
            MaterialKind::Unlit
        } else {
            MaterialKind::Standard
        },
        base_color: pbr.base_color_factor(),
        emissive: material.emissive_factor(),
        double_sided: material.double_sided(),
        textures,
    }
}

/// Expand 8-bit images to RGBA8. Other formats keep their size with an
/// opaque white placeholder.
fn convert_image(image: &gltf::image::Data) -> DecodedTexture {
    use gltf::image::Format;

    let channels = match image.format {
        Format::R8 => Some(1),
        Format::R8G8 => Some(2),
        Format::R8G8B8 => Some(3),
        Format::R8G8B8A8 => Some(4),
        _ => None,
    };
    let texel_count = image.width as usize * image.height as usize;
    let pixels = match channels {
        Some(channels) => image
            .pixels
            .chunks_exact(channels)
            .flat_map(|texel| match *texel {
                [l] => [l, l, l, 255],
                [l, a] => [l, l, l, a],
                [r, g, b] => [r, g, b, 255],
                [r, g, b, a] => [r, g, b, a],
                _ => [255, 255, 255, 255],
            })
            .collect(),
        None => {
            log::warn!(
                "Unsupported texture format {:?}, using a white placeholder",
                image.format
            );
            vec![255; texel_count * 4]
        }
    };
    DecodedTexture {
        width: image.width,
        height: image.height,
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_buffer() -> String {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bytes: Vec<u8> = positions.iter().flat_map(|v| v.to_le_bytes()).collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn document(primitives: &str, material: &str) -> String {
        format!(
            r#"{{
                "asset": {{"version": "2.0"}},
                "scene": 0,
                "scenes": [{{"name": "House", "nodes": [0]}}],
                "nodes": [{{"name": "EG", "mesh": 0, "translation": [1.0, 0.0, 0.0]}}],
                "meshes": [{{"name": "slab", "primitives": [{primitives}]}}],
                "materials": [{material}],
                "extensionsUsed": ["KHR_materials_unlit"],
                "buffers": [{{"byteLength": 36, "uri": "data:application/octet-stream;base64,{buffer}"}}],
                "bufferViews": [{{"buffer": 0, "byteLength": 36}}],
                "accessors": [{{
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
                }}]
            }}"#,
            buffer = triangle_buffer()
        )
    }

    const ONE_PRIMITIVE: &str = r#"{"attributes": {"POSITION": 0}, "material": 0}"#;
    const STANDARD: &str =
        r#"{"name": "concrete", "pbrMetallicRoughness": {"baseColorFactor": [0.5, 0.5, 0.5, 1.0]}}"#;

    fn decode(source: &ModelSource) -> Result<Option<DecodedScene>, AssetError> {
        GltfDecoder::new().decode(source, &mut |_| {})
    }

    #[test]
    fn decodes_single_primitive_mesh_node() {
        let json = document(ONE_PRIMITIVE, STANDARD);
        let mut reports = Vec::new();
        let scene = GltfDecoder::new()
            .decode(&ModelSource::bytes(json.into_bytes()), &mut |p| reports.push(p))
            .unwrap()
            .unwrap();

        assert_eq!(scene.root.name, "House");
        let eg = &scene.root.children[0];
        assert_eq!(eg.name, "EG");
        assert_eq!(eg.transform, Mat4::from_translation(Vec3::X));
        let mesh = eg.mesh.as_ref().unwrap();
        assert_eq!(mesh.positions, vec![Vec3::ZERO, Vec3::X, Vec3::Y]);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.material, Some(0));
        assert_eq!(scene.materials[0].kind, MaterialKind::Standard);
        assert_eq!(scene.materials[0].base_color, [0.5, 0.5, 0.5, 1.0]);
        assert!(!scene.materials[0].double_sided);
        assert_eq!(reports.last().and_then(|p| p.percent()), Some(100));
    }

    #[test]
    fn splits_multi_primitive_meshes_into_groups() {
        let primitives = format!("{ONE_PRIMITIVE}, {ONE_PRIMITIVE}");
        let json = document(&primitives, STANDARD);
        let scene = decode(&ModelSource::bytes(json.into_bytes())).unwrap().unwrap();
        let eg = &scene.root.children[0];
        assert!(eg.mesh.is_none());
        let names: Vec<_> = eg.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["slab_0", "slab_1"]);
        assert_eq!(scene.mesh_count(), 2);
    }

    #[test]
    fn detects_unlit_materials() {
        let unlit = r#"{"name": "glass", "extensions": {"KHR_materials_unlit": {}}}"#;
        let json = document(ONE_PRIMITIVE, unlit);
        let scene = decode(&ModelSource::bytes(json.into_bytes())).unwrap().unwrap();
        assert_eq!(scene.materials[0].kind, MaterialKind::Unlit);
    }

    #[test]
    fn decodes_data_urls() {
        let json = document(ONE_PRIMITIVE, STANDARD);
        let url = format!(
            "data:model/gltf+json;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(json)
        );
        let scene = decode(&ModelSource::parse(&url)).unwrap().unwrap();
        assert_eq!(scene.mesh_count(), 1);

        assert!(matches!(
            decode(&ModelSource::parse("data:model/gltf+json,{}")),
            Err(AssetError::InvalidDataUrl)
        ));
        assert!(matches!(
            decode(&ModelSource::parse("data:model/gltf+json;base64,@@@")),
            Err(AssetError::Base64(_))
        ));
    }

    #[test]
    fn document_without_scene_is_none() {
        let json = r#"{"asset": {"version": "2.0"}}"#;
        assert!(decode(&ModelSource::bytes(json.as_bytes().to_vec())).unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_gltf_error() {
        let result = decode(&ModelSource::bytes(b"not a model".to_vec()));
        assert!(matches!(result, Err(AssetError::Gltf(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = decode(&ModelSource::Path("/definitely/not/here.glb".into()));
        assert!(matches!(result, Err(AssetError::Read { .. })));
    }
}
