//! Wavefront OBJ loader
//!
//! OBJ files load as bare geometry: every object in the file is merged into
//! one triangle buffer. MTL libraries are not followed.

use std::io::{BufReader, Cursor};

use anyhow::{bail, Context};
use log::debug;

use super::asset::RawAsset;
use super::{FormatLoader, LoadContext};
use crate::gfx::geometry::Geometry;

pub struct ObjLoader;

impl FormatLoader for ObjLoader {
    fn name(&self) -> &'static str {
        "Wavefront OBJ"
    }

    fn parse(&self, bytes: &[u8], ctx: &LoadContext) -> anyhow::Result<RawAsset> {
        let mut reader = BufReader::new(Cursor::new(bytes));
        let (models, _materials) = tobj::load_obj_buf(
            &mut reader,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Err(tobj::LoadError::OpenFileFailed),
        )
        .context("failed to parse OBJ")?;

        let mut geometry = Geometry::new();
        let mut with_normals = true;
        for m in models.iter() {
            let mesh = &m.mesh;
            let base = geometry.positions.len() as u32;

            geometry
                .positions
                .extend(mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));
            if mesh.normals.len() == mesh.positions.len() {
                geometry
                    .normals
                    .extend(mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]));
            } else {
                with_normals = false;
            }
            if mesh.texcoords.len() / 2 == mesh.positions.len() / 3 {
                geometry
                    .uvs
                    .extend(mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]));
            }
            geometry.indices.extend(mesh.indices.iter().map(|i| base + i));
        }

        if geometry.positions.is_empty() {
            bail!("OBJ file contains no vertices");
        }
        // Partial attributes cannot be matched to vertices; let normalization derive them
        if !with_normals {
            geometry.normals.clear();
        }
        if geometry.uvs.len() != geometry.positions.len() {
            geometry.uvs.clear();
        }

        debug!(
            "Parsed OBJ with {} objects, {} vertices",
            models.len(),
            geometry.vertex_count()
        );
        Ok(RawAsset::Geometry {
            name: ctx.stem(),
            geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ModelFileType;

    const QUAD: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
o tri
v 0 0 1
v 1 0 1
v 0 1 1
f 5 6 7
";

    fn ctx() -> LoadContext {
        LoadContext {
            url: "shapes.obj".into(),
            file_type: ModelFileType::Obj,
            base_dir: None,
            draco: None,
        }
    }

    #[test]
    fn test_merges_objects_into_one_geometry() {
        let RawAsset::Geometry { name, geometry } = ObjLoader.parse(QUAD.as_bytes(), &ctx()).unwrap()
        else {
            panic!("expected bare geometry");
        };
        assert_eq!(name, "shapes");
        assert_eq!(geometry.vertex_count(), 7);
        assert_eq!(geometry.triangle_count(), 3);
        assert!(geometry.indices.iter().all(|&i| (i as usize) < geometry.vertex_count()));
        assert!(!geometry.has_normals());
    }

    #[test]
    fn test_empty_obj_is_an_error() {
        assert!(ObjLoader.parse(b"# nothing here\n", &ctx()).is_err());
    }
}
