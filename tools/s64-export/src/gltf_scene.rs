//! glTF scene source
//!
//! Loads a glTF/GLB file into the plain scene model and evaluates bone poses
//! from its node hierarchy and animation channels:
//! - every skin becomes a skeleton, its joints the bones
//! - every mesh node becomes a surface (triangle primitives merged)
//! - every animation becomes a clip, key times converted to frames
//!
//! Everything is placed in world space, so bone heads and surface positions
//! share one frame of reference.

use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::{Mat3, Mat4, Quat, Vec2, Vec3};
use gltf::animation::{Interpolation, Property};

use crate::scene::{Bone, Clip, Polygon, SceneSource, Skeleton, Surface, VertexWeight};

/// Frame rate glTF seconds are converted to frames at unless told otherwise
pub const DEFAULT_FRAME_RATE: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Trs {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl Trs {
    fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// One sampled property of one node
#[derive(Debug, Clone)]
struct Channel {
    node: usize,
    property: Property,
    /// Seconds
    times: Vec<f32>,
    /// Vec3 values use the first three lanes
    values: Vec<[f32; 4]>,
    interpolation: Interpolation,
}

impl Channel {
    /// Keys around `t` and the blend factor between them
    fn bracket(&self, t: f32) -> Option<([f32; 4], [f32; 4], f32)> {
        let len = self.times.len().min(self.values.len());
        if len == 0 {
            return None;
        }

        // Find keyframes
        let mut i = 0;
        while i + 1 < len && self.times[i + 1] <= t {
            i += 1;
        }

        if i + 1 >= len || matches!(self.interpolation, Interpolation::Step) {
            return Some((self.values[i], self.values[i], 0.0));
        }

        let t0 = self.times[i];
        let t1 = self.times[i + 1];
        let factor = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
        Some((self.values[i], self.values[i + 1], factor.clamp(0.0, 1.0)))
    }

    fn apply(&self, t: f32, trs: &mut Trs) {
        let Some((a, b, factor)) = self.bracket(t) else {
            return;
        };
        let lerp = |a: [f32; 4], b: [f32; 4]| {
            Vec3::new(a[0], a[1], a[2]).lerp(Vec3::new(b[0], b[1], b[2]), factor)
        };
        match self.property {
            Property::Translation => trs.translation = lerp(a, b),
            Property::Scale => trs.scale = lerp(a, b),
            Property::Rotation => {
                trs.rotation = Quat::from_array(a)
                    .slerp(Quat::from_array(b), factor)
                    .normalize();
            }
            _ => {} // Ignore morph target weights
        }
    }
}

/// Evaluation state saved and restored around export passes
#[derive(Debug, Clone, PartialEq)]
pub struct GltfState {
    /// Frames
    pub time: f32,
    pub rest_pose: bool,
    /// Clip bound to each skeleton
    pub bindings: Vec<Option<usize>>,
}

pub struct GltfScene {
    skeletons: Vec<Skeleton>,
    surfaces: Vec<Surface>,
    clips: Vec<Clip>,
    frame_rate: f32,
    parents: Vec<Option<usize>>,
    rest: Vec<Trs>,
    /// Node index of every bone, per skeleton
    joints: Vec<Vec<usize>>,
    /// Skeleton whose clip binding drives each node
    owner: Vec<Option<usize>>,
    /// Channels of every clip
    channels: Vec<Vec<Channel>>,
    state: GltfState,
}

impl GltfScene {
    /// Load a `.gltf` or `.glb` file
    pub fn load(path: &Path, frame_rate: f32) -> Result<Self> {
        let (document, buffers, _images) =
            gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;
        let scene = Self::from_document(&document, &buffers, frame_rate)?;

        tracing::info!(
            "Loaded {:?}: {} skeletons, {} surfaces, {} clips",
            path,
            scene.skeletons.len(),
            scene.surfaces.len(),
            scene.clips.len()
        );
        Ok(scene)
    }

    pub fn from_document(
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        frame_rate: f32,
    ) -> Result<Self> {
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            bail!("Invalid frame rate {}", frame_rate);
        }

        let node_count = document.nodes().count();
        let mut parents = vec![None; node_count];
        let mut rest = Vec::with_capacity(node_count);
        for node in document.nodes() {
            for child in node.children() {
                parents[child.index()] = Some(node.index());
            }
            let (t, r, s) = node.transform().decomposed();
            rest.push(Trs {
                translation: Vec3::from(t),
                rotation: Quat::from_array(r),
                scale: Vec3::from(s),
            });
        }

        // Skins -> skeletons
        let mut skeletons = Vec::new();
        let mut joints = Vec::new();
        let mut owner = vec![None; node_count];
        for skin in document.skins() {
            let nodes: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            let bones = skin
                .joints()
                .map(|joint| {
                    owner[joint.index()].get_or_insert(skeletons.len());
                    let mut bone = Bone::new(node_name(&joint));
                    bone.parent = nearest_joint(joint.index(), &parents, &nodes);
                    bone
                })
                .collect();
            skeletons.push(Skeleton {
                name: skin
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("skin{}", skin.index())),
                bones,
                visible: true,
                // glTF has no selection; everything counts as selected
                selected: true,
            });
            joints.push(nodes);
        }

        // Mesh nodes -> surfaces
        let mut surfaces = Vec::new();
        for node in document.nodes() {
            let Some(mesh) = node.mesh() else {
                continue;
            };
            let world = chain_matrix(node.index(), &parents, |n| rest[n].matrix());
            surfaces.push(read_surface(&node, &mesh, buffers, world, &skeletons)?);
        }

        // Animations -> clips
        let mut clips = Vec::new();
        let mut channels = Vec::new();
        for animation in document.animations() {
            let mut clip_channels = Vec::new();
            let mut curves = Vec::new();
            for channel in animation.channels() {
                let property = channel.target().property();
                if matches!(property, Property::MorphTargetWeights) {
                    continue;
                }
                let sampler = channel.sampler();
                let times: Vec<f32> = read_accessor(&sampler.input(), buffers, 1)?
                    .into_iter()
                    .map(|v| v[0])
                    .collect();
                let width = if matches!(property, Property::Rotation) { 4 } else { 3 };
                let raw = read_accessor(&sampler.output(), buffers, width)?;
                let interpolation = sampler.interpolation();
                // Cubic spline stores (in-tangent, value, out-tangent) per key
                let values = if matches!(interpolation, Interpolation::CubicSpline) {
                    raw.chunks_exact(3).map(|c| c[1]).collect()
                } else {
                    raw
                };

                curves.push(times.iter().map(|t| t * frame_rate).collect());
                clip_channels.push(Channel {
                    node: channel.target().node().index(),
                    property,
                    times,
                    values,
                    interpolation,
                });
            }
            clips.push(Clip {
                name: animation
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("animation{}", animation.index())),
                preserve: false,
                curves,
            });
            channels.push(clip_channels);
        }

        let bindings = vec![None; skeletons.len()];
        Ok(Self {
            skeletons,
            surfaces,
            clips,
            frame_rate,
            parents,
            rest,
            joints,
            owner,
            channels,
            state: GltfState {
                time: 0.0,
                rest_pose: false,
                bindings,
            },
        })
    }

    fn local(&self, node: usize, posed: bool) -> Mat4 {
        let mut trs = self.rest[node];
        if posed {
            if let Some(clip) = self.owner[node].and_then(|s| self.state.bindings[s]) {
                let seconds = self.state.time / self.frame_rate;
                for channel in self.channels[clip].iter().filter(|c| c.node == node) {
                    channel.apply(seconds, &mut trs);
                }
            }
        }
        trs.matrix()
    }

    fn global(&self, node: usize, posed: bool) -> Mat4 {
        chain_matrix(node, &self.parents, |n| self.local(n, posed))
    }
}

impl SceneSource for GltfScene {
    type Snapshot = GltfState;

    fn skeletons(&self) -> &[Skeleton] {
        &self.skeletons
    }

    fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    fn clips(&self) -> &[Clip] {
        &self.clips
    }

    fn capture_state(&self) -> GltfState {
        self.state.clone()
    }

    fn restore_state(&mut self, snapshot: GltfState) {
        self.state = snapshot;
    }

    fn set_rest_pose(&mut self, rest: bool) {
        self.state.rest_pose = rest;
    }

    fn set_time(&mut self, time: f32) {
        self.state.time = time;
    }

    fn bind_clip(&mut self, skeleton: usize, clip: Option<usize>) {
        self.state.bindings[skeleton] = clip;
    }

    fn bind_matrix(&self, skeleton: usize, bone: usize) -> Mat4 {
        self.global(self.joints[skeleton][bone], false)
    }

    fn pose_matrix(&self, skeleton: usize, bone: usize) -> Mat4 {
        self.global(self.joints[skeleton][bone], !self.state.rest_pose)
    }
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()))
}

/// Bone index of the closest ancestor that is also a joint
fn nearest_joint(node: usize, parents: &[Option<usize>], joints: &[usize]) -> Option<usize> {
    let mut current = parents[node];
    // Bounded walk, a malformed hierarchy could loop
    for _ in 0..parents.len() {
        let parent = current?;
        if let Some(bone) = joints.iter().position(|&j| j == parent) {
            return Some(bone);
        }
        current = parents[parent];
    }
    None
}

/// Product of local matrices from the root down to `node`
fn chain_matrix(node: usize, parents: &[Option<usize>], local: impl Fn(usize) -> Mat4) -> Mat4 {
    let mut matrix = local(node);
    let mut current = parents[node];
    for _ in 0..parents.len() {
        let Some(parent) = current else {
            break;
        };
        matrix = local(parent) * matrix;
        current = parents[parent];
    }
    matrix
}

fn read_surface(
    node: &gltf::Node,
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    world: Mat4,
    skeletons: &[Skeleton],
) -> Result<Surface> {
    let name = node
        .name()
        .or(mesh.name())
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh{}", mesh.index()));
    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();

    // Weight groups are the bone names of the node's skin, in joint order
    let groups: Option<Vec<String>> = node.skin().and_then(|skin| {
        skeletons
            .get(skin.index())
            .map(|s| s.bones.iter().map(|b| b.name.clone()).collect())
    });

    let mut surface = Surface {
        name,
        visible: true,
        selected: true,
        ..Default::default()
    };
    let mut material_ids: Vec<usize> = Vec::new();
    let mut colors: Vec<Vec3> = Vec::new();
    let mut uvs: Vec<Vec2> = Vec::new();
    let mut weights: Vec<Vec<VertexWeight>> = Vec::new();
    let mut has_colors = false;
    let mut has_uvs = false;

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            tracing::warn!(
                "Surface '{}': skipping {:?} primitive, only triangles are supported",
                surface.name,
                primitive.mode()
            );
            continue;
        }

        // Extract vertex data
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        // Positions (required)
        let Some(positions) = reader.read_positions() else {
            tracing::warn!("Surface '{}': primitive has no positions", surface.name);
            continue;
        };
        let positions: Vec<Vec3> = positions
            .map(|p| world.transform_point3(Vec3::from(p)))
            .collect();
        let count = positions.len();
        let base = surface.positions.len() as u32;

        let indices: Vec<u32> = match reader.read_indices() {
            Some(iter) => iter.into_u32().collect(),
            None => (0..count as u32).collect(),
        };
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= count) {
            bail!(
                "Surface '{}' index {} is out of range for {} vertices",
                surface.name,
                bad,
                count
            );
        }

        // Normals (optional) - smooth normals are generated when absent
        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(iter) => iter
                .map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
                .collect(),
            None => smooth_normals(&positions, &indices),
        };

        // Colors (optional) - COLOR_0 as RGB
        match reader.read_colors(0) {
            Some(iter) => {
                has_colors = true;
                colors.extend(iter.into_rgb_f32().map(Vec3::from));
            }
            None => colors.extend(std::iter::repeat_n(Vec3::ONE, count)),
        }

        // UVs (optional) - glTF has its origin top-left
        match reader.read_tex_coords(0) {
            Some(iter) => {
                has_uvs = true;
                uvs.extend(iter.into_f32().map(|[u, v]| Vec2::new(u, 1.0 - v)));
            }
            None => uvs.extend(std::iter::repeat_n(Vec2::ZERO, count)),
        }

        // Skinning (optional)
        if let Some(groups) = &groups {
            let joints: Option<Vec<[u16; 4]>> =
                reader.read_joints(0).map(|iter| iter.into_u16().collect());
            let joint_weights: Option<Vec<[f32; 4]>> =
                reader.read_weights(0).map(|iter| iter.into_f32().collect());
            for v in 0..count {
                let mut entries = Vec::new();
                if let (Some(joints), Some(joint_weights)) = (&joints, &joint_weights) {
                    if let (Some(j), Some(w)) = (joints.get(v), joint_weights.get(v)) {
                        for (&joint, &weight) in j.iter().zip(w) {
                            if weight > 0.0 && (joint as usize) < groups.len() {
                                entries.push(VertexWeight {
                                    group: joint as usize,
                                    weight,
                                });
                            }
                        }
                    }
                }
                weights.push(entries);
            }
        }

        // One slot per distinct material; the default material has none
        let material_slot = match primitive.material().index() {
            Some(id) => match material_ids.iter().position(|&m| m == id) {
                Some(slot) => slot,
                None => {
                    material_ids.push(id);
                    surface.material_slots.push(
                        primitive
                            .material()
                            .name()
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("material{}", id)),
                    );
                    surface.material_slots.len() - 1
                }
            },
            None => usize::MAX,
        };

        surface.positions.extend(positions);
        surface.vertex_normals.extend(normals);
        for triangle in indices.chunks_exact(3) {
            surface.polygons.push(Polygon {
                start: surface.corner_vertices.len(),
                count: 3,
                material_slot,
            });
            surface
                .corner_vertices
                .extend(triangle.iter().map(|&i| base + i));
        }
    }

    let corners = &surface.corner_vertices;
    if has_colors {
        surface.colors = Some(corners.iter().map(|&v| colors[v as usize]).collect());
    }
    if has_uvs {
        surface.uvs = Some(corners.iter().map(|&v| uvs[v as usize]).collect());
    }
    if let Some(groups) = groups {
        surface.weight_groups = groups;
        surface.weights = Some(weights);
    }

    tracing::debug!(
        "Surface '{}': {} vertices, {} triangles, {} materials",
        surface.name,
        surface.positions.len(),
        surface.polygons.len(),
        surface.material_slots.len()
    );
    Ok(surface)
}

fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        for i in [a, b, c] {
            normals[i] += n;
        }
    }
    normals.into_iter().map(Vec3::normalize_or_zero).collect()
}

// ============================================================================
// glTF accessor readers
// ============================================================================

/// Read `width` floats per element; anything but float data is rejected
fn read_accessor(
    accessor: &gltf::Accessor,
    buffers: &[gltf::buffer::Data],
    width: usize,
) -> Result<Vec<[f32; 4]>> {
    if accessor.data_type() != gltf::accessor::DataType::F32 {
        bail!(
            "Accessor {} holds {:?} data, only float animation data is supported",
            accessor.index(),
            accessor.data_type()
        );
    }
    let view = accessor.view().context("Accessor has no buffer view")?;
    let buffer = &buffers[view.buffer().index()];
    let offset = view.offset() + accessor.offset();
    let count = accessor.count();
    let stride = view.stride().unwrap_or(width * 4);

    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        let byte_offset = offset + i * stride;
        let mut v = [0.0f32; 4];
        for (j, float) in v.iter_mut().take(width).enumerate() {
            let bo = byte_offset + j * 4;
            let bytes = buffer
                .get(bo..bo + 4)
                .context("Accessor reads past the end of its buffer")?;
            *float = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        values.push(v);
    }
    Ok(values)
}
