#![allow(dead_code)]

use model_viewer::config::ViewerConfig;
use model_viewer::loader::source::MemorySource;
use model_viewer::surface::HeadlessContainer;
use model_viewer::SceneContext;

pub const TRIANGLE_OBJ: &str = "o tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

pub const WEDGE_STL: &str = "\
solid wedge
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 4 0 0
      vertex 0 8 0
    endloop
  endfacet
endsolid wedge
";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Wraps a glTF JSON document and binary chunk into GLB bytes
pub fn glb(json: serde_json::Value, mut bin: Vec<u8>) -> Vec<u8> {
    let mut json_bytes = serde_json::to_vec(&json).unwrap();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
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

/// Two nodes sharing one mesh and one "Shared" material
///
/// The mesh spans Y in [-50, 50], X in [-10, 10] and Z in [10, 30]. Node
/// `Left` carries a two-second translation clip named `Bob`.
pub fn shared_material_glb() -> Vec<u8> {
    let floats: [f32; 17] = [
        // positions
        -10.0, -50.0, 10.0, 10.0, -50.0, 10.0, 0.0, 50.0, 30.0, //
        // times
        0.0, 2.0, //
        // translations
        0.0, 0.0, 0.0, 0.0, 4.0, 0.0,
    ];
    let bin: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();

    let json = serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 1] }],
        "nodes": [
            { "name": "Left", "mesh": 0 },
            { "name": "Right", "mesh": 0 }
        ],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] }],
        "materials": [{
            "name": "Shared",
            "pbrMetallicRoughness": { "baseColorFactor": [0.2, 0.4, 0.6, 1.0] }
        }],
        "animations": [{
            "name": "Bob",
            "channels": [{ "sampler": 0, "target": { "node": 0, "path": "translation" } }],
            "samplers": [{ "input": 1, "output": 2, "interpolation": "LINEAR" }]
        }],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [-10.0, -50.0, 10.0], "max": [10.0, 50.0, 30.0] },
            { "bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [2.0] },
            { "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 24 }
        ],
        "buffers": [{ "byteLength": bin.len() }]
    });
    glb(json, bin)
}

/// Solid-color PNG
pub fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn source() -> MemorySource {
    MemorySource::new()
        .with_asset("model.glb", shared_material_glb())
        .with_asset("tri.obj", TRIANGLE_OBJ.as_bytes().to_vec())
        .with_asset("wedge.stl", WEDGE_STL.as_bytes().to_vec())
        .with_asset("checker.png", png(4, 4, [10, 20, 30, 255]))
}

pub fn mounted(config: ViewerConfig) -> SceneContext {
    init_logger();
    let mut ctx = SceneContext::new(config).with_source(source());
    ctx.mount(Box::new(HeadlessContainer::new(800, 600)));
    ctx
}
