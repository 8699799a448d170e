//! # Primitive Shape Generation
//!
//! Shapes used by the environment helpers (floor plane, grid, axes) and by
//! tests that need a small mesh.

use super::{Geometry, Topology};

/// Generate a unit cube centered at the origin
///
/// Vertices span -0.5 to 0.5 on all axes, four per face so each face keeps
/// its own normal.
pub fn generate_cube() -> Geometry {
    let mut data = Geometry::new();

    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        // Front (+Z)
        ([0.0, 0.0, 1.0], [[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]]),
        // Back (-Z)
        ([0.0, 0.0, -1.0], [[-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5], [0.5, -0.5, -0.5]]),
        // Left (-X)
        ([-1.0, 0.0, 0.0], [[-0.5, -0.5, -0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5]]),
        // Right (+X)
        ([1.0, 0.0, 0.0], [[0.5, -0.5, 0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5]]),
        // Top (+Y)
        ([0.0, 1.0, 0.0], [[-0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5]]),
        // Bottom (-Y)
        ([0.0, -1.0, 0.0], [[-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5]]),
    ];

    for (normal, corners) in faces.iter() {
        let base = data.positions.len() as u32;
        data.positions.extend_from_slice(corners);
        data.normals.extend_from_slice(&[*normal; 4]);
        data.uvs
            .extend_from_slice(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    data
}

/// Generate a plane in the XY plane, normal along +Z
///
/// The floor helper lays it flat by rotating its node -90° about X.
///
/// # Arguments
/// * `width` - Width of the plane (X direction)
/// * `height` - Height of the plane (Y direction)
/// * `width_segments` - Number of subdivisions along width
/// * `height_segments` - Number of subdivisions along height
pub fn generate_plane(width: f32, height: f32, width_segments: u32, height_segments: u32) -> Geometry {
    let mut data = Geometry::new();

    let w_segs = width_segments.max(1);
    let h_segs = height_segments.max(1);

    for y in 0..=h_segs {
        let v = y as f32 / h_segs as f32;
        let pos_y = (v - 0.5) * height;

        for x in 0..=w_segs {
            let u = x as f32 / w_segs as f32;
            let pos_x = (u - 0.5) * width;

            data.positions.push([pos_x, pos_y, 0.0]);
            data.normals.push([0.0, 0.0, 1.0]);
            data.uvs.push([u, v]);
        }
    }

    // Counter-clockwise when viewed from +Z
    for y in 0..h_segs {
        for x in 0..w_segs {
            let i = y * (w_segs + 1) + x;
            let next_row = i + w_segs + 1;

            data.indices.extend_from_slice(&[i, i + 1, next_row]);
            data.indices.extend_from_slice(&[next_row, i + 1, next_row + 1]);
        }
    }

    data.compute_bounds();
    data
}

/// Generate grid lines on the XZ plane
///
/// # Arguments
/// * `size` - Total side length of the grid
/// * `divisions` - Number of cells along each side
/// * `color` - Line color
pub fn generate_grid(size: f32, divisions: u32, color: [f32; 3]) -> Geometry {
    let mut data = Geometry {
        topology: Topology::Lines,
        ..Default::default()
    };

    let divisions = divisions.max(1);
    let half = size * 0.5;
    let step = size / divisions as f32;

    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        data.positions.push([-half, 0.0, k]);
        data.positions.push([half, 0.0, k]);
        data.positions.push([k, 0.0, -half]);
        data.positions.push([k, 0.0, half]);
    }

    data.colors = vec![color; data.positions.len()];
    data.compute_bounds();
    data
}

/// Generate the three colored axis lines (X red, Y green, Z blue)
pub fn generate_axes(size: f32) -> Geometry {
    let mut data = Geometry {
        topology: Topology::Lines,
        ..Default::default()
    };

    data.positions = vec![
        [0.0, 0.0, 0.0],
        [size, 0.0, 0.0],
        [0.0, 0.0, 0.0],
        [0.0, size, 0.0],
        [0.0, 0.0, 0.0],
        [0.0, 0.0, size],
    ];
    data.colors = vec![
        [1.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, 1.0],
    ];
    data.compute_bounds();
    data
}

/// Line segments indicating a light's position and the direction it faces
/// (toward `target`). Used by light debug helpers.
pub fn generate_light_marker(size: f32, target_offset: [f32; 3]) -> Geometry {
    let mut data = Geometry {
        topology: Topology::Lines,
        ..Default::default()
    };

    let h = size * 0.5;
    // Square outline facing the target plus the direction ray
    data.positions = vec![
        [-h, h, 0.0],
        [h, h, 0.0],
        [h, h, 0.0],
        [h, -h, 0.0],
        [h, -h, 0.0],
        [-h, -h, 0.0],
        [-h, -h, 0.0],
        [-h, h, 0.0],
        [0.0, 0.0, 0.0],
        target_offset,
    ];
    data.compute_bounds();
    data
}
