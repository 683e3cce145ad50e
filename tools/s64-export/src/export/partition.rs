//! Bone bucket partitioning
//!
//! Every deformable bone gets one rigid mesh bucket, rooted at the bone's
//! rest-pose head. A face goes to the bone that dominates it; faces nothing
//! dominates go to the `None` bucket.

use glam::Vec3;
use hashbrown::{HashMap, HashSet};
use s64_common::{Mesh, NONE_NAME};

use crate::error::ExportError;
use crate::scene::{Polygon, SceneSource, ScopedPose, Surface};

/// A bone addressed by skeleton and bone index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneRef {
    pub skeleton: usize,
    pub bone: usize,
}

/// Weight a group needs before it can own a face
pub const DOMINANT_WEIGHT: f32 = 0.5;

/// The set of buckets faces are distributed into
#[derive(Debug)]
pub struct Buckets {
    meshes: Vec<Mesh>,
    bones: Vec<Option<BoneRef>>,
    by_name: HashMap<String, usize>,
}

impl Buckets {
    /// Index of the catch-all `None` bucket
    pub const NONE: usize = 0;

    fn new() -> Self {
        let mut buckets = Self {
            meshes: Vec::new(),
            bones: Vec::new(),
            by_name: HashMap::new(),
        };
        buckets.insert(Mesh::new(NONE_NAME), None);
        buckets
    }

    fn insert(&mut self, mesh: Mesh, bone: Option<BoneRef>) -> usize {
        let index = self.meshes.len();
        self.by_name.insert(mesh.name.clone(), index);
        self.meshes.push(mesh);
        self.bones.push(bone);
        index
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn mesh(&self, index: usize) -> &Mesh {
        &self.meshes[index]
    }

    pub fn mesh_mut(&mut self, index: usize) -> &mut Mesh {
        &mut self.meshes[index]
    }

    /// Keep buckets that received faces, with the bone each one follows
    pub fn into_populated(self) -> Vec<(Mesh, Option<BoneRef>)> {
        self.meshes
            .into_iter()
            .zip(self.bones)
            .filter(|(mesh, _)| !mesh.is_empty())
            .collect()
    }
}

/// Create one bucket per deformable bone, plus `None`
///
/// Heads are read with every skeleton in its rest pose; the scene state is
/// restored afterwards whether or not this succeeds.
pub fn create_buckets<S: SceneSource>(
    scene: &mut S,
    skeletons: &[usize],
) -> Result<Buckets, ExportError> {
    let mut scene = ScopedPose::new(scene);
    scene.set_rest_pose(true);

    let mut buckets = Buckets::new();
    // Bone name -> owning skeleton name
    let mut owners: HashMap<String, String> = HashMap::new();

    for &s in skeletons {
        let skeleton = &scene.skeletons()[s];
        for (b, bone) in skeleton.bones.iter().enumerate() {
            if bone.name == NONE_NAME {
                return Err(ExportError::ReservedBoneName {
                    skeleton: skeleton.name.clone(),
                });
            }
            if !bone.deformable {
                continue;
            }
            if let Some(first) = owners.get(&bone.name) {
                return Err(ExportError::DuplicateBone {
                    bone: bone.name.clone(),
                    first: first.clone(),
                    second: skeleton.name.clone(),
                });
            }
            owners.insert(bone.name.clone(), skeleton.name.clone());

            let head: Vec3 = scene.pose_matrix(s, b).w_axis.truncate();
            let mut mesh = Mesh::new(bone.name.clone());
            mesh.root = head;
            mesh.properties = bone.properties.clone();
            buckets.insert(mesh, Some(BoneRef { skeleton: s, bone: b }));
        }
    }

    tracing::debug!("Created {} bone buckets", buckets.len() - 1);
    Ok(buckets)
}

/// Pick the bucket for every polygon of a surface
///
/// A corner's weight only counts above [`DOMINANT_WEIGHT`]; the largest such
/// weight over all corners wins, ties going to the earlier corner.
pub fn assign_faces(
    surface: &Surface,
    buckets: &Buckets,
    strict: bool,
) -> Result<Vec<usize>, ExportError> {
    let Some(weights) = &surface.weights else {
        return Ok(vec![Buckets::NONE; surface.polygons.len()]);
    };

    let mut warned: HashSet<usize> = HashSet::new();
    let mut owners = Vec::with_capacity(surface.polygons.len());

    for polygon in &surface.polygons {
        let Some(group) = dominant_group(surface, weights, polygon) else {
            owners.push(Buckets::NONE);
            continue;
        };
        let name = &surface.weight_groups[group];
        match buckets.index_of(name) {
            Some(index) if index != Buckets::NONE => owners.push(index),
            _ if strict => {
                return Err(ExportError::UnknownWeightGroup {
                    surface: surface.name.clone(),
                    group: name.clone(),
                });
            }
            _ => {
                if warned.insert(group) {
                    tracing::warn!(
                        "Surface '{}' has vertex group '{}' with no matching bone, its faces go to \"{}\"",
                        surface.name,
                        name,
                        NONE_NAME
                    );
                }
                owners.push(Buckets::NONE);
            }
        }
    }
    Ok(owners)
}

fn dominant_group(
    surface: &Surface,
    weights: &[Vec<crate::scene::VertexWeight>],
    polygon: &Polygon,
) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for corner in polygon.corners() {
        let vertex = surface.corner_vertices[corner] as usize;
        for w in &weights[vertex] {
            if w.weight <= DOMINANT_WEIGHT {
                continue;
            }
            if best.is_none_or(|(_, weight)| w.weight > weight) {
                best = Some((w.group, w.weight));
            }
        }
    }
    best.map(|(group, _)| group)
}
