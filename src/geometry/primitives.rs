use super::{Material, Mesh};
use std::f32::consts::{PI, TAU};

pub const SPHERE_SEGMENTS: u32 = 32;
pub const SPHERE_RINGS: u32 = 16;

/// Axis-aligned cube centered on the origin with edge length `size`.
pub fn cube(name: &str, size: f32) -> Mesh {
    let h = size * 0.5;
    let vertices = vec![
        [-h, -h, -h],
        [h, -h, -h],
        [h, h, -h],
        [-h, h, -h],
        [-h, -h, h],
        [h, -h, h],
        [h, h, h],
        [-h, h, h],
    ];
    let faces = vec![
        vec![0, 3, 2, 1],
        vec![4, 5, 6, 7],
        vec![0, 1, 5, 4],
        vec![1, 2, 6, 5],
        vec![2, 3, 7, 6],
        vec![3, 0, 4, 7],
    ];
    Mesh::new(name, vertices, faces)
}

/// UV sphere with Z as the polar axis: two pole vertices plus
/// `rings - 1` latitude loops of `segments` vertices each.
pub fn uv_sphere(name: &str, radius: f32, segments: u32, rings: u32) -> Mesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut vertices = Vec::with_capacity((segments * (rings - 1) + 2) as usize);
    vertices.push([0.0, 0.0, radius]);
    for ring in 1..rings {
        let polar = PI * ring as f32 / rings as f32;
        let (sin_p, cos_p) = polar.sin_cos();
        for segment in 0..segments {
            let azimuth = TAU * segment as f32 / segments as f32;
            let (sin_a, cos_a) = azimuth.sin_cos();
            vertices.push([radius * sin_p * cos_a, radius * sin_p * sin_a, radius * cos_p]);
        }
    }
    let bottom = vertices.len() as u32;
    vertices.push([0.0, 0.0, -radius]);

    let loop_start = |ring: u32| 1 + (ring - 1) * segments;
    let mut faces = Vec::with_capacity((segments * rings) as usize);
    for s in 0..segments {
        let next = (s + 1) % segments;
        faces.push(vec![0, loop_start(1) + s, loop_start(1) + next]);
    }
    for ring in 1..rings - 1 {
        let upper = loop_start(ring);
        let lower = loop_start(ring + 1);
        for s in 0..segments {
            let next = (s + 1) % segments;
            faces.push(vec![upper + s, lower + s, lower + next, upper + next]);
        }
    }
    let last = loop_start(rings - 1);
    for s in 0..segments {
        let next = (s + 1) % segments;
        faces.push(vec![last + s, bottom, last + next]);
    }

    Mesh::new(name, vertices, faces)
}

/// Stand-in model shown in place of protected content: an octahedron
/// with a single red material.
pub fn marker(name: &str) -> Mesh {
    let vertices = vec![
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];
    let faces = vec![
        vec![0, 2, 4],
        vec![2, 1, 4],
        vec![1, 3, 4],
        vec![3, 0, 4],
        vec![2, 0, 5],
        vec![1, 2, 5],
        vec![3, 1, 5],
        vec![0, 3, 5],
    ];
    let mut mesh = Mesh::new(name, vertices, faces);
    mesh.materials.push(Material {
        name: format!("Frozen_{}", name),
        base_color: [1.0, 0.0, 0.0, 1.0],
    });
    mesh
}
