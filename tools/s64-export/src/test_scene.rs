//! In-memory scene for unit tests

use glam::{Mat4, Vec2, Vec3};

use crate::scene::{Bone, Clip, Polygon, SceneSource, Skeleton, Surface, VertexWeight};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TestState {
    pub time: f32,
    pub rest_pose: bool,
    pub bindings: Vec<Option<usize>>,
}

/// Pose of `(skeleton, bone)` for a clip at a time; `None` means rest
pub(crate) type AnimateFn = fn(clip: usize, time: f32, skeleton: usize, bone: usize) -> Option<Mat4>;

pub(crate) struct TestScene {
    pub skeletons: Vec<Skeleton>,
    pub surfaces: Vec<Surface>,
    pub clips: Vec<Clip>,
    /// Armature-space rest matrix per skeleton per bone
    pub bind: Vec<Vec<Mat4>>,
    /// Pose left by the user when no clip is bound
    pub posed: Vec<Vec<Mat4>>,
    pub animate: AnimateFn,
    pub state: TestState,
    pub restores: usize,
    /// Every time passed to `set_time`
    pub sampled: Vec<f32>,
}

fn no_motion(_: usize, _: f32, _: usize, _: usize) -> Option<Mat4> {
    None
}

impl TestScene {
    pub fn new(skeletons: Vec<Skeleton>, bind: Vec<Vec<Mat4>>) -> Self {
        let bindings = vec![None; skeletons.len()];
        Self {
            posed: bind.clone(),
            skeletons,
            surfaces: Vec::new(),
            clips: Vec::new(),
            bind,
            animate: no_motion,
            state: TestState {
                time: 0.0,
                rest_pose: false,
                bindings,
            },
            restores: 0,
            sampled: Vec::new(),
        }
    }

    /// Armature with one bone "Body" at (1, 2, 3), a quad skinned to it and
    /// a "Walk" clip keyed at frames 0 and 10
    pub fn single_bone() -> Self {
        let mut scene = Self::new(
            vec![skeleton("Armature", &["Body"])],
            vec![vec![Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))]],
        );
        scene.surfaces.push(weighted(quad_surface("Body"), &["Body"], &[0, 0, 0, 0]));
        scene.clips.push(clip("Walk", &[0.0, 10.0]));
        scene
    }
}

impl SceneSource for TestScene {
    type Snapshot = TestState;

    fn skeletons(&self) -> &[Skeleton] {
        &self.skeletons
    }

    fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    fn clips(&self) -> &[Clip] {
        &self.clips
    }

    fn capture_state(&self) -> TestState {
        self.state.clone()
    }

    fn restore_state(&mut self, snapshot: TestState) {
        self.state = snapshot;
        self.restores += 1;
    }

    fn set_rest_pose(&mut self, rest: bool) {
        self.state.rest_pose = rest;
    }

    fn set_time(&mut self, time: f32) {
        self.state.time = time;
        self.sampled.push(time);
    }

    fn bind_clip(&mut self, skeleton: usize, clip: Option<usize>) {
        self.state.bindings[skeleton] = clip;
    }

    fn bind_matrix(&self, skeleton: usize, bone: usize) -> Mat4 {
        self.bind[skeleton][bone]
    }

    fn pose_matrix(&self, skeleton: usize, bone: usize) -> Mat4 {
        if self.state.rest_pose {
            return self.bind[skeleton][bone];
        }
        match self.state.bindings[skeleton] {
            Some(clip) => (self.animate)(clip, self.state.time, skeleton, bone)
                .unwrap_or(self.bind[skeleton][bone]),
            None => self.posed[skeleton][bone],
        }
    }
}

pub(crate) fn skeleton(name: &str, bones: &[&str]) -> Skeleton {
    Skeleton {
        name: name.to_string(),
        bones: bones.iter().map(|&b| Bone::new(b)).collect(),
        visible: true,
        selected: true,
    }
}

pub(crate) fn clip(name: &str, keys: &[f32]) -> Clip {
    Clip {
        name: name.to_string(),
        preserve: false,
        curves: vec![keys.to_vec()],
    }
}

/// Unit quad in the XY plane, one polygon with material "Skin"
pub(crate) fn quad_surface(name: &str) -> Surface {
    Surface {
        name: name.to_string(),
        positions: vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        vertex_normals: vec![Vec3::Z; 4],
        corner_vertices: vec![0, 1, 2, 3],
        polygons: vec![Polygon {
            start: 0,
            count: 4,
            material_slot: 0,
        }],
        split_normals: None,
        colors: None,
        uvs: Some(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]),
        material_slots: vec!["Skin".to_string()],
        weight_groups: Vec::new(),
        weights: None,
        visible: true,
        selected: true,
    }
}

/// Give every vertex full weight to one group
pub(crate) fn weighted(mut surface: Surface, groups: &[&str], owner: &[usize]) -> Surface {
    surface.weight_groups = groups.iter().map(|g| g.to_string()).collect();
    surface.weights = Some(
        owner
            .iter()
            .map(|&group| vec![VertexWeight { group, weight: 1.0 }])
            .collect(),
    );
    surface
}
