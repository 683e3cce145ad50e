//! Sausage64 entity model
//!
//! A model is a set of mesh buckets (one per bone, plus the `"None"` bucket
//! for unweighted geometry) and a set of keyframed animations that move those
//! bones. Buckets never share vertex index spaces.

use glam::{EulerRot, Quat, Vec2, Vec3};
use serde::Serialize;
use smallvec::SmallVec;

/// Reserved name for the unweighted bucket and for faces without a material
pub const NONE_NAME: &str = "None";

/// Faces are triangles or quads
pub const MIN_FACE_VERTICES: usize = 3;
pub const MAX_FACE_VERTICES: usize = 4;

/// One vertex of a bucket
///
/// Identity is structural: two vertices are interchangeable iff all four
/// fields compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    /// RGB, opaque white when the source has no color layer
    pub color: Vec3,
    /// UV in file convention (V already flipped)
    pub uv: Vec2,
}

impl Vertex {
    pub const DEFAULT_COLOR: Vec3 = Vec3::ONE;
    pub const DEFAULT_UV: Vec2 = Vec2::ZERO;

    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position,
            normal,
            color: Self::DEFAULT_COLOR,
            uv: Self::DEFAULT_UV,
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_uv(mut self, uv: Vec2) -> Self {
        self.uv = uv;
        self
    }
}

/// Returned when a face has fewer than 3 or more than 4 corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("face has {0} vertices, expected 3 or 4")]
pub struct FaceArityError(pub usize);

/// A triangle or quad, winding preserved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face {
    pub indices: SmallVec<[u32; MAX_FACE_VERTICES]>,
    /// Material name, or [`NONE_NAME`]
    pub material: String,
}

impl Face {
    pub fn new(
        indices: impl IntoIterator<Item = u32>,
        material: impl Into<String>,
    ) -> Result<Self, FaceArityError> {
        let indices: SmallVec<[u32; MAX_FACE_VERTICES]> = indices.into_iter().collect();
        if !(MIN_FACE_VERTICES..=MAX_FACE_VERTICES).contains(&indices.len()) {
            return Err(FaceArityError(indices.len()));
        }
        Ok(Self {
            indices,
            material: material.into(),
        })
    }
}

/// One bucket: the geometry skinned rigidly to a single bone
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mesh {
    pub name: String,
    /// Bone head in bind pose, zero for the `"None"` bucket
    pub root: Vec3,
    /// Custom bone flags, written on the `PROPERTIES` line
    pub properties: Vec<String>,
    /// Distinct material names used by `faces`, first appearance order
    pub materials: Vec<String>,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a vertex and return its index
    pub fn push_vertex(&mut self, vertex: Vertex) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    /// Append a face, recording its material
    pub fn add_face(&mut self, face: Face) {
        if !self.materials.iter().any(|m| *m == face.material) {
            self.materials.push(face.material.clone());
        }
        self.faces.push(face);
    }

    /// Rebuild `materials` from the current face order
    pub fn refresh_materials(&mut self) {
        self.materials.clear();
        for face in &self.faces {
            if !self.materials.contains(&face.material) {
                self.materials.push(face.material.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Check that every face index points into this bucket's vertex list.
    ///
    /// Returns the first offending (face, index) pair.
    pub fn validate(&self) -> Result<(), (usize, u32)> {
        let count = self.vertices.len() as u32;
        for (face_index, face) in self.faces.iter().enumerate() {
            if let Some(bad) = face.indices.iter().copied().find(|&i| i >= count) {
                return Err((face_index, bad));
            }
        }
        Ok(())
    }
}

/// Keyframe rotation, in one of the two format revisions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Rotation {
    /// Earlier revision: Euler angles in radians, XYZ order
    Euler(Vec3),
    /// Later revision: unit quaternion, written as w x y z
    Quaternion(Quat),
}

impl Rotation {
    pub fn to_quat(self) -> Quat {
        match self {
            // XYZ order applies X first, so the matrix is Rz * Ry * Rx
            Rotation::Euler(e) => Quat::from_euler(EulerRot::ZYX, e.z, e.y, e.x),
            Rotation::Quaternion(q) => q,
        }
    }

    pub fn from_quat_euler(q: Quat) -> Self {
        let (z, y, x) = q.to_euler(EulerRot::ZYX);
        Rotation::Euler(Vec3::new(x, y, z))
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::Quaternion(Quat::IDENTITY)
    }
}

/// One bone's bind-relative transform at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyframe {
    pub bone: String,
    pub position: Vec3,
    pub rotation: Rotation,
    pub scale: Vec3,
}

impl Keyframe {
    /// The bind pose itself (no offset, no rotation, unit scale)
    pub fn identity(bone: impl Into<String>) -> Self {
        Self {
            bone: bone.into(),
            position: Vec3::ZERO,
            rotation: Rotation::default(),
            scale: Vec3::ONE,
        }
    }
}

/// All keyframes at one time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Real-valued internally, truncated to an integer on write
    pub time: f32,
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Animation {
    pub name: String,
    /// Unique times, ascending once [`Animation::sort_frames`] has run
    pub frames: Vec<Frame>,
}

impl Animation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Vec::new(),
        }
    }

    /// Get the frame at `time`, creating an empty one if needed
    pub fn frame_mut(&mut self, time: f32) -> &mut Frame {
        let position = match self.frames.iter().position(|f| f.time == time) {
            Some(position) => position,
            None => {
                self.frames.push(Frame {
                    time,
                    keyframes: Vec::new(),
                });
                self.frames.len() - 1
            }
        };
        &mut self.frames[position]
    }

    pub fn sort_frames(&mut self) {
        self.frames.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    pub fn keyframe_count(&self) -> usize {
        self.frames.iter().map(|f| f.keyframes.len()).sum()
    }
}

/// Everything stored in one `.S64` file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct S64Model {
    pub meshes: Vec<Mesh>,
    pub animations: Vec<Animation>,
}

/// Counts reported after parsing or exporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub meshes: usize,
    pub vertices: usize,
    pub faces: usize,
    pub materials: usize,
    pub animations: usize,
    pub keyframes: usize,
}

impl S64Model {
    pub fn mesh(&self, name: &str) -> Option<&Mesh> {
        self.meshes.iter().find(|m| m.name == name)
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Every distinct material name across all meshes, first appearance order
    pub fn materials(&self) -> Vec<String> {
        let mut materials: Vec<String> = Vec::new();
        for mesh in &self.meshes {
            for face in &mesh.faces {
                if !materials.contains(&face.material) {
                    materials.push(face.material.clone());
                }
            }
        }
        materials
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            meshes: self.meshes.len(),
            vertices: self.meshes.iter().map(|m| m.vertices.len()).sum(),
            faces: self.meshes.iter().map(|m| m.faces.len()).sum(),
            materials: self.materials().len(),
            animations: self.animations.len(),
            keyframes: self.animations.iter().map(|a| a.keyframe_count()).sum(),
        }
    }
}
