//! Vertex consolidation
//!
//! Runs once per bucket after extraction: faces are grouped by material,
//! bit-identical vertices are merged and the survivors renumbered in the
//! order the faces first use them.

use hashbrown::HashMap;
use s64_common::{Mesh, Vertex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidateStats {
    /// Vertices folded into an identical earlier one
    pub merged: usize,
    /// Vertices no face referenced
    pub dropped: usize,
}

/// Exact identity of a vertex, with -0.0 treated as 0.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey([u32; 11]);

impl VertexKey {
    fn of(v: &Vertex) -> Self {
        fn bits(f: f32) -> u32 {
            if f == 0.0 { 0 } else { f.to_bits() }
        }
        let [px, py, pz] = v.position.to_array();
        let [nx, ny, nz] = v.normal.to_array();
        let [r, g, b] = v.color.to_array();
        let [u, w] = v.uv.to_array();
        Self([px, py, pz, nx, ny, nz, r, g, b, u, w].map(bits))
    }
}

/// Sort, deduplicate and reindex `mesh` in place
///
/// Idempotent: running it on its own output changes nothing.
///
/// # Panics
///
/// If a face references a vertex that does not exist; see [`Mesh::validate`].
pub fn consolidate(mesh: &mut Mesh) -> ConsolidateStats {
    // Stable, so faces sharing a material keep their relative order
    mesh.faces.sort_by(|a, b| a.material.cmp(&b.material));

    let count = mesh.vertices.len();
    let mut merged = 0;

    // Lowest index among identical vertices
    let mut survivor: Vec<u32> = Vec::with_capacity(count);
    let mut seen: HashMap<VertexKey, u32> = HashMap::with_capacity(count);
    for (i, vertex) in mesh.vertices.iter().enumerate() {
        let id = *seen.entry(VertexKey::of(vertex)).or_insert(i as u32);
        if id as usize != i {
            merged += 1;
        }
        survivor.push(id);
    }

    let mut remap: Vec<Option<u32>> = vec![None; count];
    let mut order: Vec<u32> = Vec::with_capacity(count - merged);
    for face in &mut mesh.faces {
        for index in face.indices.iter_mut() {
            let old = survivor[*index as usize];
            *index = *remap[old as usize].get_or_insert_with(|| {
                order.push(old);
                (order.len() - 1) as u32
            });
        }
    }

    let dropped = count - merged - order.len();
    mesh.vertices = order.iter().map(|&i| mesh.vertices[i as usize]).collect();
    mesh.refresh_materials();

    if merged > 0 || dropped > 0 {
        tracing::debug!(
            "Mesh '{}': merged {} vertices, dropped {} unused, {} remain",
            mesh.name,
            merged,
            dropped,
            mesh.vertices.len()
        );
    }

    ConsolidateStats { merged, dropped }
}
