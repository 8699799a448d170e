//! glTF 2.0 / GLB loader
//!
//! Parses with the `gltf` crate and converts the default scene, its
//! materials, embedded or sibling images and node animations.

use anyhow::{bail, Context};
use cgmath::{Quaternion, Vector3};
use log::{debug, warn};

use super::asset::{AssetMaterial, AssetMesh, AssetNode, AssetScene, RawAsset};
use super::{FormatLoader, LoadContext, LoaderOptions};
use crate::animation::{AnimationClip, Interpolation, KeyframeTrack};
use crate::gfx::color::Color;
use crate::gfx::geometry::{Geometry, Topology};
use crate::gfx::resources::material::{Material, MaterialKind};
use crate::gfx::resources::texture::{Texture, WrapMode};
use crate::gfx::scene::Transform;

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// glTF and GLB loader
pub struct GltfLoader;

impl FormatLoader for GltfLoader {
    fn name(&self) -> &'static str {
        "glTF 2.0"
    }

    fn prepare(&self, options: &LoaderOptions) -> Result<(), String> {
        match &options.draco {
            Some(draco) if draco.decoder_path.trim().is_empty() => {
                Err("Draco requested but the decoder path is empty".to_string())
            }
            _ => Ok(()),
        }
    }

    fn parse(&self, bytes: &[u8], ctx: &LoadContext) -> anyhow::Result<RawAsset> {
        let gltf::Gltf { document, blob } =
            gltf::Gltf::from_slice(bytes).context("invalid glTF document")?;

        if document.extensions_required().any(|ext| ext == DRACO_EXTENSION) {
            match &ctx.draco {
                None => bail!("asset requires {DRACO_EXTENSION}; enable Draco in the loader options"),
                Some(draco) => bail!(
                    "Draco-compressed primitives are not decoded (decoder path {})",
                    draco.decoder_path
                ),
            }
        }

        let base = ctx.base_dir.as_deref();
        let buffers =
            gltf::import_buffers(&document, base, blob).context("failed to load glTF buffers")?;

        let (mut textures, image_slots) = load_images(&document, base, &buffers);
        for texture in document.textures() {
            let slot = image_slots.get(texture.source().index()).copied().flatten();
            if let Some(target) = slot.and_then(|i| textures.get_mut(i)) {
                let sampler = texture.sampler();
                target.wrap_s = convert_wrap_mode(sampler.wrap_s());
                target.wrap_t = convert_wrap_mode(sampler.wrap_t());
            }
        }
        let materials = document
            .materials()
            .map(|m| load_material(&m, &image_slots))
            .collect();

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .context("glTF file has no scenes")?;
        let mut root = AssetNode::group(scene.name().map_or_else(|| ctx.stem(), str::to_string));
        for node in scene.nodes() {
            root.children.push(load_node(&node, &buffers));
        }

        let animations = document
            .animations()
            .filter_map(|a| load_animation(&a, &buffers))
            .collect();

        Ok(RawAsset::SceneWrapper {
            scene: AssetScene {
                root,
                materials,
                textures,
                animations: Vec::new(),
            },
            animations,
        })
    }
}

/// Stable node name; animation channels bind by it
fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map_or_else(|| format!("node_{}", node.index()), str::to_string)
}

fn load_node(node: &gltf::Node, buffers: &[gltf::buffer::Data]) -> AssetNode {
    let (t, r, s) = node.transform().decomposed();
    let mut out = AssetNode::group(node_name(node));
    out.transform = Transform {
        position: Vector3::new(t[0], t[1], t[2]),
        rotation: Quaternion::new(r[3], r[0], r[1], r[2]),
        scale: Vector3::new(s[0], s[1], s[2]),
    };

    if let Some(mesh) = node.mesh() {
        let mut primitives: Vec<AssetMesh> = mesh
            .primitives()
            .filter_map(|p| load_primitive(&p, buffers))
            .collect();
        if primitives.len() == 1 {
            out.mesh = primitives.pop();
        } else {
            for (i, primitive) in primitives.into_iter().enumerate() {
                out.children
                    .push(AssetNode::with_mesh(format!("{}_{}", out.name, i), primitive));
            }
        }
    }

    for child in node.children() {
        out.children.push(load_node(&child, buffers));
    }
    out
}

fn load_primitive(primitive: &gltf::Primitive, buffers: &[gltf::buffer::Data]) -> Option<AssetMesh> {
    let topology = match primitive.mode() {
        gltf::mesh::Mode::Triangles => Topology::Triangles,
        gltf::mesh::Mode::Lines => Topology::Lines,
        other => {
            warn!("Skipping glTF primitive with unsupported mode {:?}", other);
            return None;
        }
    };

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    if positions.is_empty() {
        return None;
    }

    let normals = reader
        .read_normals()
        .map(|iter| iter.collect())
        .unwrap_or_default();
    let uvs = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().collect())
        .unwrap_or_default();
    let colors = reader
        .read_colors(0)
        .map(|iter| iter.into_rgb_f32().collect())
        .unwrap_or_default();
    let indices = reader
        .read_indices()
        .map(|iter| iter.into_u32().collect())
        .unwrap_or_default();

    Some(AssetMesh {
        geometry: Geometry {
            positions,
            normals,
            uvs,
            colors,
            indices,
            topology,
            bounds: None,
        },
        material: primitive.material().index(),
    })
}

/// Decodes every image; slot `i` maps glTF image `i` to a texture index
fn load_images(
    document: &gltf::Document,
    base: Option<&std::path::Path>,
    buffers: &[gltf::buffer::Data],
) -> (Vec<Texture>, Vec<Option<usize>>) {
    if document.images().next().is_none() {
        return (Vec::new(), Vec::new());
    }

    let images = match gltf::import_images(document, base, buffers) {
        Ok(images) => images,
        Err(e) => {
            warn!("Failed to load glTF images, continuing without textures: {}", e);
            return (Vec::new(), Vec::new());
        }
    };

    let mut textures = Vec::new();
    let mut slots = Vec::with_capacity(images.len());
    for (i, image) in images.into_iter().enumerate() {
        let label = document
            .images()
            .nth(i)
            .and_then(|img| img.name().map(str::to_string))
            .unwrap_or_else(|| format!("image_{i}"));
        match to_rgba8(&image) {
            Some(pixels) => {
                slots.push(Some(textures.len()));
                textures.push(Texture::from_rgba8(&label, image.width, image.height, pixels));
            }
            None => {
                warn!("Unsupported pixel format {:?} for {}", image.format, label);
                slots.push(None);
            }
        }
    }
    debug!("Decoded {} glTF textures", textures.len());
    (textures, slots)
}

fn to_rgba8(image: &gltf::image::Data) -> Option<Vec<u8>> {
    use gltf::image::Format;
    let pixels = &image.pixels;
    match image.format {
        Format::R8G8B8A8 => Some(pixels.clone()),
        Format::R8G8B8 => Some(
            pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
        ),
        Format::R8G8 => Some(
            pixels
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
        ),
        Format::R8 => Some(pixels.iter().flat_map(|&v| [v, v, v, 255]).collect()),
        _ => None,
    }
}

fn convert_wrap_mode(mode: gltf::texture::WrappingMode) -> WrapMode {
    match mode {
        gltf::texture::WrappingMode::ClampToEdge => WrapMode::ClampToEdge,
        gltf::texture::WrappingMode::MirroredRepeat => WrapMode::MirroredRepeat,
        gltf::texture::WrappingMode::Repeat => WrapMode::Repeat,
    }
}

fn load_material(material: &gltf::Material, image_slots: &[Option<usize>]) -> AssetMaterial {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let [er, eg, eb] = material.emissive_factor();

    let mut out = Material::new(material.name().unwrap_or(""), MaterialKind::Standard)
        .with_color(Color::rgb(r, g, b))
        .with_pbr(pbr.roughness_factor(), pbr.metallic_factor())
        .with_emissive(Color::rgb(er, eg, eb));
    out.opacity = a;
    out.transparent = material.alpha_mode() == gltf::material::AlphaMode::Blend;

    let map = pbr
        .base_color_texture()
        .and_then(|info| image_slots.get(info.texture().source().index()).copied().flatten());

    AssetMaterial { material: out, map }
}

fn load_animation(animation: &gltf::Animation, buffers: &[gltf::buffer::Data]) -> Option<AnimationClip> {
    use gltf::animation::util::ReadOutputs;

    let mut tracks = Vec::new();
    for channel in animation.channels() {
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        let Some(outputs) = reader.read_outputs() else {
            continue;
        };

        let target = node_name(&channel.target().node());
        let interpolation = channel.sampler().interpolation();
        let mut track = match outputs {
            ReadOutputs::Translations(iter) => KeyframeTrack::translation(
                &target,
                times,
                keyframe_values(iter.map(|t| Vector3::new(t[0], t[1], t[2])), interpolation),
            ),
            ReadOutputs::Rotations(iter) => KeyframeTrack::rotation(
                &target,
                times,
                keyframe_values(
                    iter.into_f32().map(|q| Quaternion::new(q[3], q[0], q[1], q[2])),
                    interpolation,
                ),
            ),
            ReadOutputs::Scales(iter) => KeyframeTrack::scale(
                &target,
                times,
                keyframe_values(iter.map(|s| Vector3::new(s[0], s[1], s[2])), interpolation),
            ),
            ReadOutputs::MorphTargetWeights(_) => {
                debug!("Skipping morph target channel on {}", target);
                continue;
            }
        };
        track.interpolation = match interpolation {
            gltf::animation::Interpolation::Step => Interpolation::Step,
            _ => Interpolation::Linear,
        };
        tracks.push(track);
    }

    if tracks.is_empty() {
        return None;
    }
    let name = animation
        .name()
        .map_or_else(|| format!("animation_{}", animation.index()), str::to_string);
    Some(AnimationClip::new(name, tracks))
}

/// Cubic spline outputs are (in-tangent, value, out-tangent) triplets; keep the values
fn keyframe_values<T>(
    values: impl Iterator<Item = T>,
    interpolation: gltf::animation::Interpolation,
) -> Vec<T> {
    match interpolation {
        gltf::animation::Interpolation::CubicSpline => values.skip(1).step_by(3).collect(),
        _ => values.collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::loader::ModelFileType;
    use crate::animation::TrackProperty;

    /// Single red triangle named "Tri" with a one-second translation clip
    pub(crate) fn triangle_glb() -> Vec<u8> {
        let floats: [f32; 17] = [
            // positions
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, //
            // times
            0.0, 1.0, //
            // translations
            0.0, 0.0, 0.0, 0.0, 3.0, 0.0,
        ];
        let bin: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();

        let json = serde_json::json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "name": "Tri", "mesh": 0 }],
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] }],
            "materials": [{
                "name": "Paint",
                "pbrMetallicRoughness": {
                    "baseColorFactor": [1.0, 0.0, 0.0, 1.0],
                    "metallicFactor": 0.2,
                    "roughnessFactor": 0.7
                }
            }],
            "animations": [{
                "name": "Lift",
                "channels": [{ "sampler": 0, "target": { "node": 0, "path": "translation" } }],
                "samplers": [{ "input": 1, "output": 2, "interpolation": "LINEAR" }]
            }],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [1.0, 2.0, 0.0] },
                { "bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR",
                  "min": [0.0], "max": [1.0] },
                { "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" }
            ],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 8 },
                { "buffer": 0, "byteOffset": 44, "byteLength": 24 }
            ],
            "buffers": [{ "byteLength": bin.len() }]
        });

        let mut json_bytes = serde_json::to_vec(&json).unwrap();
        while json_bytes.len() % 4 != 0 {
            json_bytes.push(b' ');
        }
        let mut bin = bin;
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json_bytes);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    fn ctx() -> LoadContext {
        LoadContext {
            url: "tri.glb".into(),
            file_type: ModelFileType::Glb,
            base_dir: None,
            draco: None,
        }
    }

    #[test]
    fn test_parse_triangle_glb() {
        let raw = GltfLoader.parse(&triangle_glb(), &ctx()).unwrap();
        let RawAsset::SceneWrapper { scene, animations } = raw else {
            panic!("expected a scene wrapper");
        };

        assert_eq!(scene.root.name, "tri");
        assert_eq!(scene.root.children.len(), 1);
        let tri = &scene.root.children[0];
        assert_eq!(tri.name, "Tri");
        let mesh = tri.mesh.as_ref().unwrap();
        assert_eq!(mesh.geometry.vertex_count(), 3);
        assert_eq!(mesh.material, Some(0));

        let paint = &scene.materials[0].material;
        assert_eq!(paint.name, "Paint");
        assert_eq!(paint.color, Color::rgb(1.0, 0.0, 0.0));
        assert!(!paint.transparent);

        assert_eq!(animations.len(), 1);
        assert_eq!(animations[0].name, "Lift");
        assert_eq!(animations[0].tracks[0].node_name, "Tri");
        assert_eq!(animations[0].tracks[0].property, TrackProperty::Translation);
        assert!((animations[0].duration - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(GltfLoader.parse(b"not a gltf", &ctx()).is_err());
    }

    #[test]
    fn test_prepare_rejects_blank_decoder_path() {
        let options = LoaderOptions::default().with_draco("");
        assert!(GltfLoader.prepare(&options).is_err());
        assert!(GltfLoader.prepare(&LoaderOptions::default()).is_ok());
    }
}
