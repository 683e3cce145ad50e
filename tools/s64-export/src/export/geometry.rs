//! Face extraction
//!
//! Each polygon becomes one S64 face with a fresh vertex per corner, so
//! corner-varying normals, colors and UVs survive. Sharing is recovered
//! later by the consolidator.

use glam::Vec2;
use s64_common::{Face, Mesh, Vertex, MAX_FACE_VERTICES, MIN_FACE_VERTICES, NONE_NAME};
use smallvec::SmallVec;

use crate::error::ExportError;
use crate::scene::{Polygon, Surface};

/// Reject surfaces that use the reserved material name
pub fn check_materials(surface: &Surface) -> Result<(), ExportError> {
    if surface.material_slots.iter().any(|m| m == NONE_NAME) {
        return Err(ExportError::ReservedMaterialName {
            surface: surface.name.clone(),
        });
    }
    Ok(())
}

/// Material name of a polygon; empty or out-of-range slots have none
pub fn material_name(surface: &Surface, polygon: &Polygon) -> String {
    match surface.material_slots.get(polygon.material_slot) {
        Some(name) if !name.is_empty() => name.clone(),
        _ => NONE_NAME.to_string(),
    }
}

/// Emit one polygon into `mesh`
pub fn extract_face(
    surface: &Surface,
    face: usize,
    polygon: &Polygon,
    mesh: &mut Mesh,
) -> Result<(), ExportError> {
    if polygon.count > MAX_FACE_VERTICES {
        return Err(ExportError::FaceTooLarge {
            surface: surface.name.clone(),
            face,
            count: polygon.count,
        });
    }
    if polygon.count < MIN_FACE_VERTICES {
        return Err(ExportError::DegenerateFace {
            surface: surface.name.clone(),
            face,
            count: polygon.count,
        });
    }

    let mut indices: SmallVec<[u32; MAX_FACE_VERTICES]> = SmallVec::new();
    for corner in polygon.corners() {
        let vertex = corner_vertex(surface, corner);
        indices.push(mesh.push_vertex(vertex));
    }

    let face = Face {
        indices,
        material: material_name(surface, polygon),
    };
    mesh.add_face(face);
    Ok(())
}

fn corner_vertex(surface: &Surface, corner: usize) -> Vertex {
    let v = surface.corner_vertices[corner] as usize;

    let normal = match &surface.split_normals {
        Some(normals) => normals[corner],
        None => surface.vertex_normals[v],
    };
    let color = surface
        .colors
        .as_ref()
        .map_or(Vertex::DEFAULT_COLOR, |c| c[corner]);
    // Authoring UVs have their origin bottom-left, S64 top-left
    let uv = surface
        .uvs
        .as_ref()
        .map_or(Vertex::DEFAULT_UV, |uvs| flip_v(uvs[corner]));

    Vertex::new(surface.positions[v], normal)
        .with_color(color)
        .with_uv(uv)
}

pub(crate) fn flip_v(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x, 1.0 - uv.y)
}
