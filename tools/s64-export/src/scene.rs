//! Scene collaborator interfaces
//!
//! The export engine never talks to a concrete authoring tool. A host hands
//! it a [`SceneSource`]: plain data for skeletons, surfaces and clips, plus a
//! handful of state mutators used while reading bind poses and sampling
//! clips. Every mutation goes through a [`ScopedPose`], which restores the
//! host state when it is dropped.

use std::ops::{Deref, DerefMut, Range};

use glam::{Mat4, Vec2, Vec3};

use crate::error::ExportError;

/// One bone of a skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone in the same skeleton
    pub parent: Option<usize>,
    /// Non-deforming bones (controls, IK targets) never get a bucket
    pub deformable: bool,
    /// Custom flags copied to the bucket's `PROPERTIES` line
    pub properties: Vec<String>,
}

impl Bone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            deformable: true,
            properties: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    pub name: String,
    pub bones: Vec<Bone>,
    pub visible: bool,
    pub selected: bool,
}

/// A polygon as a range of corners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polygon {
    /// First corner in `Surface::corner_vertices`
    pub start: usize,
    /// Number of corners
    pub count: usize,
    /// Index into `Surface::material_slots`; out of range means no material
    pub material_slot: usize,
}

impl Polygon {
    pub fn corners(&self) -> Range<usize> {
        self.start..self.start + self.count
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    /// Index into `Surface::weight_groups`
    pub group: usize,
    pub weight: f32,
}

/// A modifier-resolved polygon mesh
///
/// Per-corner layers are indexed by corner (loop) ordinal and may be absent.
/// UVs use the authoring convention (origin bottom-left).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Surface {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub vertex_normals: Vec<Vec3>,
    /// Vertex index for every corner
    pub corner_vertices: Vec<u32>,
    pub polygons: Vec<Polygon>,
    pub split_normals: Option<Vec<Vec3>>,
    pub colors: Option<Vec<Vec3>>,
    pub uvs: Option<Vec<Vec2>>,
    pub material_slots: Vec<String>,
    pub weight_groups: Vec<String>,
    /// Per-vertex weights; `None` when the surface has no deform layer
    pub weights: Option<Vec<Vec<VertexWeight>>>,
    pub visible: bool,
    pub selected: bool,
}

impl Surface {
    pub fn corner_count(&self) -> usize {
        self.corner_vertices.len()
    }

    /// Check that every layer and index agrees with the vertex/corner counts
    pub fn validate(&self) -> Result<(), ExportError> {
        let invalid = |reason: String| ExportError::InvalidSurface {
            surface: self.name.clone(),
            reason,
        };

        let vertices = self.positions.len();
        let corners = self.corner_count();
        if self.vertex_normals.len() != vertices {
            return Err(invalid(format!(
                "{} vertex normals for {} vertices",
                self.vertex_normals.len(),
                vertices
            )));
        }
        if let Some(bad) = self.corner_vertices.iter().find(|&&v| v as usize >= vertices) {
            return Err(invalid(format!("corner references missing vertex {}", bad)));
        }
        if let Some(polygon) = self.polygons.iter().find(|p| p.start + p.count > corners) {
            return Err(invalid(format!(
                "polygon corners {:?} exceed {} corners",
                polygon.corners(),
                corners
            )));
        }
        let layers = [
            ("split normal", self.split_normals.as_ref().map(Vec::len)),
            ("color", self.colors.as_ref().map(Vec::len)),
            ("UV", self.uvs.as_ref().map(Vec::len)),
        ];
        for (layer, len) in layers {
            if let Some(len) = len {
                if len != corners {
                    return Err(invalid(format!(
                        "{} layer has {} entries for {} corners",
                        layer, len, corners
                    )));
                }
            }
        }
        if let Some(weights) = &self.weights {
            if weights.len() != vertices {
                return Err(invalid(format!(
                    "weight table has {} entries for {} vertices",
                    weights.len(),
                    vertices
                )));
            }
            let groups = self.weight_groups.len();
            if weights.iter().flatten().any(|w| w.group >= groups) {
                return Err(invalid("weight references a missing vertex group".into()));
            }
        }
        Ok(())
    }

    /// Fan-triangulate every polygon with more than 3 corners
    pub fn triangulated(&self) -> Surface {
        // Source corner for every corner of the result
        let mut sources: Vec<usize> = Vec::with_capacity(self.corner_count());
        let mut polygons = Vec::with_capacity(self.polygons.len());

        for polygon in &self.polygons {
            if polygon.count <= 3 {
                polygons.push(Polygon {
                    start: sources.len(),
                    ..*polygon
                });
                sources.extend(polygon.corners());
                continue;
            }
            for i in 1..polygon.count - 1 {
                polygons.push(Polygon {
                    start: sources.len(),
                    count: 3,
                    material_slot: polygon.material_slot,
                });
                for offset in [0, i, i + 1] {
                    sources.push(polygon.start + offset);
                }
            }
        }

        fn gather<T: Copy>(layer: &[T], sources: &[usize]) -> Vec<T> {
            sources.iter().map(|&c| layer[c]).collect()
        }

        Surface {
            corner_vertices: gather(&self.corner_vertices, &sources),
            split_normals: self.split_normals.as_deref().map(|l| gather(l, &sources)),
            colors: self.colors.as_deref().map(|l| gather(l, &sources)),
            uvs: self.uvs.as_deref().map(|l| gather(l, &sources)),
            polygons,
            ..self.clone()
        }
    }
}

/// An animation clip (action)
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub name: String,
    /// Placeholder / rest clip kept alive on purpose; never exported
    pub preserve: bool,
    /// Keyed times of every animation curve, in frames
    pub curves: Vec<Vec<f32>>,
}

impl Clip {
    /// Distinct keyed times across all curves, ascending
    pub fn key_times(&self) -> Vec<f32> {
        let mut times: Vec<f32> = self
            .curves
            .iter()
            .flatten()
            // -0.0 and 0.0 are the same key
            .map(|&t| if t == 0.0 { 0.0 } else { t })
            .filter(|t| t.is_finite())
            .collect();
        times.sort_by(f32::total_cmp);
        times.dedup();
        times
    }
}

/// Everything the export engine needs from a host scene
///
/// Matrices are in armature space: `bind_matrix` is the bone's rest matrix,
/// `pose_matrix` the bone's matrix under the current state (time, bound
/// clip, rest/pose mode).
pub trait SceneSource {
    /// Whatever the host must save to undo `set_*`/`bind_clip` calls
    type Snapshot;

    fn skeletons(&self) -> &[Skeleton];
    fn surfaces(&self) -> &[Surface];
    fn clips(&self) -> &[Clip];

    fn capture_state(&self) -> Self::Snapshot;
    fn restore_state(&mut self, snapshot: Self::Snapshot);

    /// Switch every skeleton between its rest pose and its animated pose
    fn set_rest_pose(&mut self, rest: bool);
    /// Set the evaluation time, in frames
    fn set_time(&mut self, time: f32);
    fn bind_clip(&mut self, skeleton: usize, clip: Option<usize>);

    fn bind_matrix(&self, skeleton: usize, bone: usize) -> Mat4;
    fn pose_matrix(&self, skeleton: usize, bone: usize) -> Mat4;
}

/// Host state captured on creation and restored on drop
///
/// Holds the only mutable borrow of the scene while alive, so nothing else
/// can observe or change the scene mid-pass.
pub struct ScopedPose<'a, S: SceneSource> {
    scene: &'a mut S,
    snapshot: Option<S::Snapshot>,
}

impl<'a, S: SceneSource> ScopedPose<'a, S> {
    pub fn new(scene: &'a mut S) -> Self {
        let snapshot = scene.capture_state();
        Self {
            scene,
            snapshot: Some(snapshot),
        }
    }
}

impl<S: SceneSource> Deref for ScopedPose<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.scene
    }
}

impl<S: SceneSource> DerefMut for ScopedPose<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.scene
    }
}

impl<S: SceneSource> Drop for ScopedPose<'_, S> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.scene.restore_state(snapshot);
            tracing::debug!("Restored scene pose state");
        }
    }
}
