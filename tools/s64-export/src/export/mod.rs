//! Export engine
//!
//! Turns a scene into an [`S64Model`]:
//!
//! 1. pick skeletons and surfaces by visibility/selection
//! 2. create one bucket per deformable bone ([`partition`])
//! 3. route every face into its bucket ([`geometry`])
//! 4. drop empty buckets, merge and renumber vertices ([`consolidate`])
//! 5. sample clips for the buckets that remain ([`crate::animation`])

pub mod consolidate;
pub mod geometry;
pub mod partition;

use std::path::Path;

use s64_common::{write_s64_file, Mesh, ModelSummary, S64Model};

use crate::animation::{sample_animations, SampleOptions};
use crate::error::ExportError;
use crate::scene::SceneSource;
use crate::settings::ExportSettings;

pub use consolidate::{consolidate, ConsolidateStats};
pub use partition::{BoneRef, Buckets};

fn included(visible: bool, selected: bool, settings: &ExportSettings) -> bool {
    (!settings.visible_only || visible) && (!settings.selected_only || selected)
}

/// Build the model for a scene without writing anything
pub fn build_model<S: SceneSource>(
    scene: &mut S,
    settings: &ExportSettings,
) -> Result<S64Model, ExportError> {
    let time_scale = settings.time_scale()?;

    let skeletons: Vec<usize> = scene
        .skeletons()
        .iter()
        .enumerate()
        .filter(|(_, s)| included(s.visible, s.selected, settings))
        .map(|(i, _)| i)
        .collect();
    let surfaces: Vec<usize> = scene
        .surfaces()
        .iter()
        .enumerate()
        .filter(|(_, s)| included(s.visible, s.selected, settings))
        .map(|(i, _)| i)
        .collect();
    tracing::info!(
        "Exporting {} skeletons, {} surfaces",
        skeletons.len(),
        surfaces.len()
    );

    let mut buckets = partition::create_buckets(scene, &skeletons)?;

    for &index in &surfaces {
        let source = &scene.surfaces()[index];
        let triangulated;
        let surface = if settings.triangulate {
            triangulated = source.triangulated();
            &triangulated
        } else {
            source
        };

        surface.validate()?;
        geometry::check_materials(surface)?;
        let owners = partition::assign_faces(surface, &buckets, settings.strict_weight_groups)?;
        for (face, (polygon, owner)) in surface.polygons.iter().zip(owners).enumerate() {
            geometry::extract_face(surface, face, polygon, buckets.mesh_mut(owner))?;
        }
    }

    let mut retained = buckets.into_populated();
    retained.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name));

    let mut meshes: Vec<Mesh> = Vec::with_capacity(retained.len());
    let mut bones: Vec<(String, BoneRef)> = Vec::new();
    for (mut mesh, bone) in retained {
        consolidate(&mut mesh);
        if let Some(bone) = bone {
            bones.push((mesh.name.clone(), bone));
        }
        meshes.push(mesh);
    }

    let options = SampleOptions {
        rotation: settings.rotation,
        time_scale,
    };
    let animations = sample_animations(scene, &skeletons, &bones, options);

    Ok(S64Model { meshes, animations })
}

/// Build the model and write it to `path`
///
/// Nothing is written unless the whole model builds.
pub fn export_scene<S: SceneSource>(
    scene: &mut S,
    settings: &ExportSettings,
    path: &Path,
) -> Result<ModelSummary, ExportError> {
    let model = build_model(scene, settings)?;
    write_s64_file(path, &model)?;

    let summary = model.summary();
    tracing::info!(
        "Wrote {:?}: {} meshes, {} vertices, {} faces, {} animations",
        path,
        summary.meshes,
        summary.vertices,
        summary.faces,
        summary.animations
    );
    Ok(summary)
}
