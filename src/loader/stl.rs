//! STL loader (binary and ASCII)
//!
//! Triangles are expanded to flat-shaded, non-indexed geometry using the
//! facet normals stored in the file.

use std::io::Cursor;

use anyhow::{bail, Context};

use super::asset::RawAsset;
use super::{FormatLoader, LoadContext};
use crate::gfx::geometry::Geometry;

pub struct StlLoader;

impl FormatLoader for StlLoader {
    fn name(&self) -> &'static str {
        "STL"
    }

    fn parse(&self, bytes: &[u8], ctx: &LoadContext) -> anyhow::Result<RawAsset> {
        let mesh = stl_io::read_stl(&mut Cursor::new(bytes)).context("failed to parse STL")?;
        if mesh.faces.is_empty() {
            bail!("STL file contains no facets");
        }

        let mut geometry = Geometry::new();
        let mut facet_normals = true;
        for face in &mesh.faces {
            let n = [face.normal[0], face.normal[1], face.normal[2]];
            if n == [0.0, 0.0, 0.0] {
                facet_normals = false;
            }
            for &index in &face.vertices {
                let v = mesh
                    .vertices
                    .get(index)
                    .with_context(|| format!("facet references missing vertex {index}"))?;
                geometry.positions.push([v[0], v[1], v[2]]);
                geometry.normals.push(n);
            }
        }
        // Exporters that leave normals zeroed get smooth normals downstream
        if !facet_normals {
            geometry.normals.clear();
        }

        Ok(RawAsset::Geometry {
            name: ctx.stem(),
            geometry,
        })
    }
}
