//! Programmatic GLB generation for integration tests.
//!
//! The generated rig has:
//! - a 2-joint skeleton (Hips -> Head) stacked along +Z
//! - one skinned mesh of two triangles, one per joint, material "Skin"
//! - a "Nod" animation: Hips rise over 0.5s, Head turns 90 degrees about X over 1s

use gltf_json as json;
use json::validation::Checked::Valid;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Frame rate the fixture is sampled at
pub const FRAME_RATE: f32 = 30.0;

const ARMATURE_NODE: u32 = 0;
const HIPS_NODE: u32 = 1;
const HEAD_NODE: u32 = 2;
const MESH_NODE: u32 = 3;

/// Accumulates the binary chunk with its views and accessors
#[derive(Default)]
struct BufferBuilder {
    data: Vec<u8>,
    views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
}

impl BufferBuilder {
    fn push(
        &mut self,
        bytes: Vec<u8>,
        count: usize,
        component: json::accessor::ComponentType,
        type_: json::accessor::Type,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
        target: Option<json::buffer::Target>,
    ) -> json::Index<json::Accessor> {
        let offset = self.data.len();
        self.data.extend_from_slice(&bytes);
        while !self.data.len().is_multiple_of(4) {
            self.data.push(0);
        }

        self.views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: bytes.len().into(),
            byte_offset: Some(offset.into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: target.map(Valid),
        });

        let to_json = |v: Vec<f32>| json::Value::Array(v.into_iter().map(json::Value::from).collect());
        let (min, max) = match bounds {
            Some((min, max)) => (Some(to_json(min)), Some(to_json(max))),
            None => (None, None),
        };
        self.accessors.push(json::Accessor {
            buffer_view: Some(json::Index::new(self.views.len() as u32 - 1)),
            byte_offset: Some(0u64.into()),
            count: count.into(),
            component_type: Valid(json::accessor::GenericComponentType(component)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(type_),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        });
        json::Index::new(self.accessors.len() as u32 - 1)
    }

    /// `width` floats per element, optionally with per-component bounds
    fn floats(
        &mut self,
        values: &[f32],
        width: usize,
        type_: json::accessor::Type,
        with_bounds: bool,
    ) -> json::Index<json::Accessor> {
        let bounds = with_bounds.then(|| {
            let mut min = vec![f32::MAX; width];
            let mut max = vec![f32::MIN; width];
            for element in values.chunks_exact(width) {
                for (i, &v) in element.iter().enumerate() {
                    min[i] = min[i].min(v);
                    max[i] = max[i].max(v);
                }
            }
            (min, max)
        });
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(
            bytes,
            values.len() / width,
            json::accessor::ComponentType::F32,
            type_,
            bounds,
            None,
        )
    }

    fn shorts(
        &mut self,
        values: &[u16],
        width: usize,
        type_: json::accessor::Type,
        target: json::buffer::Target,
    ) -> json::Index<json::Accessor> {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(
            bytes,
            values.len() / width,
            json::accessor::ComponentType::U16,
            type_,
            None,
            Some(target),
        )
    }
}

fn node(name: &str, translation: Option<[f32; 3]>, children: &[u32]) -> json::Node {
    json::Node {
        camera: None,
        children: (!children.is_empty())
            .then(|| children.iter().map(|&c| json::Index::new(c)).collect()),
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: None,
        name: Some(name.to_string()),
        rotation: None,
        scale: None,
        translation,
        skin: None,
        weights: None,
    }
}

/// Generate the test rig as GLB, naming the second joint `head`
pub fn rig_glb(head: &str) -> Vec<u8> {
    use json::accessor::Type;
    use json::buffer::Target;

    let mut buffer = BufferBuilder::default();

    // Triangle A sits at the hips, triangle B at the head
    #[rustfmt::skip]
    let positions = [
        0.0, 0.0, 0.0,  1.0, 0.0, 0.0,  0.0, 1.0, 0.0,
        0.0, 0.0, 2.0,  1.0, 0.0, 2.0,  0.0, 1.0, 2.0,
    ];
    let normals: Vec<f32> = (0..6).flat_map(|_| [0.0, 0.0, 1.0]).collect();
    let uvs: Vec<f32> = (0..2).flat_map(|_| [0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).collect();
    let joints: Vec<u16> = (0..6)
        .flat_map(|v| [if v < 3 { 0 } else { 1 }, 0, 0, 0])
        .collect();
    let weights: Vec<f32> = (0..6).flat_map(|_| [1.0, 0.0, 0.0, 0.0]).collect();
    let indices: Vec<u16> = (0..6).collect();

    let position_accessor = buffer.floats(&positions, 3, Type::Vec3, true);
    let normal_accessor = buffer.floats(&normals, 3, Type::Vec3, false);
    let uv_accessor = buffer.floats(&uvs, 2, Type::Vec2, false);
    let joints_accessor = buffer.shorts(&joints, 4, Type::Vec4, Target::ArrayBuffer);
    let weights_accessor = buffer.floats(&weights, 4, Type::Vec4, false);
    let indices_accessor = buffer.shorts(&indices, 1, Type::Scalar, Target::ElementArrayBuffer);

    // Animation data
    let hips_times = buffer.floats(&[0.0, 0.5], 1, Type::Scalar, true);
    let hips_values = buffer.floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.5], 3, Type::Vec3, false);
    let half = std::f32::consts::FRAC_1_SQRT_2;
    let head_times = buffer.floats(&[0.0, 1.0], 1, Type::Scalar, true);
    let head_values = buffer.floats(&[0.0, 0.0, 0.0, 1.0, half, 0.0, 0.0, half], 4, Type::Vec4, false);

    let mut nodes = vec![
        node("Armature", None, &[HIPS_NODE]),
        node("Hips", Some([0.0, 0.0, 1.0]), &[HEAD_NODE]),
        node(head, Some([0.0, 0.0, 1.0]), &[]),
        node("Body", None, &[]),
    ];
    nodes[MESH_NODE as usize].mesh = Some(json::Index::new(0));
    nodes[MESH_NODE as usize].skin = Some(json::Index::new(0));

    let mut attributes = BTreeMap::new();
    attributes.insert(Valid(json::mesh::Semantic::Positions), position_accessor);
    attributes.insert(Valid(json::mesh::Semantic::Normals), normal_accessor);
    attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), uv_accessor);
    attributes.insert(Valid(json::mesh::Semantic::Joints(0)), joints_accessor);
    attributes.insert(Valid(json::mesh::Semantic::Weights(0)), weights_accessor);

    let meshes = vec![json::Mesh {
        extensions: Default::default(),
        extras: Default::default(),
        name: Some("BodyMesh".to_string()),
        primitives: vec![json::mesh::Primitive {
            attributes,
            extensions: Default::default(),
            extras: Default::default(),
            indices: Some(indices_accessor),
            material: Some(json::Index::new(0)),
            mode: Valid(json::mesh::Mode::Triangles),
            targets: None,
        }],
        weights: None,
    }];

    let materials = vec![json::Material {
        name: Some("Skin".to_string()),
        ..Default::default()
    }];

    let skins = vec![json::Skin {
        extensions: Default::default(),
        extras: Default::default(),
        inverse_bind_matrices: None,
        joints: vec![json::Index::new(HIPS_NODE), json::Index::new(HEAD_NODE)],
        name: Some("Armature".to_string()),
        skeleton: Some(json::Index::new(HIPS_NODE)),
    }];

    let sampler = |input, output| json::animation::Sampler {
        input,
        interpolation: Valid(json::animation::Interpolation::Linear),
        output,
        extensions: Default::default(),
        extras: Default::default(),
    };
    let channel = |sampler: u32, node: u32, path| json::animation::Channel {
        sampler: json::Index::new(sampler),
        target: json::animation::Target {
            node: json::Index::new(node),
            path: Valid(path),
            extensions: Default::default(),
            extras: Default::default(),
        },
        extensions: Default::default(),
        extras: Default::default(),
    };
    let animations = vec![json::Animation {
        channels: vec![
            channel(0, HIPS_NODE, json::animation::Property::Translation),
            channel(1, HEAD_NODE, json::animation::Property::Rotation),
        ],
        extensions: Default::default(),
        extras: Default::default(),
        name: Some("Nod".to_string()),
        samplers: vec![
            sampler(hips_times, hips_values),
            sampler(head_times, head_values),
        ],
    }];

    let scenes = vec![json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: Some("Scene".to_string()),
        nodes: vec![json::Index::new(ARMATURE_NODE), json::Index::new(MESH_NODE)],
    }];

    let buffers = vec![json::Buffer {
        byte_length: buffer.data.len().into(),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        uri: None,
    }];

    let root = json::Root {
        accessors: buffer.accessors,
        animations,
        asset: json::Asset {
            copyright: None,
            extensions: Default::default(),
            extras: Default::default(),
            generator: Some("s64-export-test".to_string()),
            min_version: None,
            version: "2.0".to_string(),
        },
        buffers,
        buffer_views: buffer.views,
        cameras: Vec::new(),
        extensions: Default::default(),
        extras: Default::default(),
        extensions_required: Vec::new(),
        extensions_used: Vec::new(),
        images: Vec::new(),
        materials,
        meshes,
        nodes,
        samplers: Vec::new(),
        scene: Some(json::Index::new(0)),
        scenes,
        skins,
        textures: Vec::new(),
    };

    assemble_glb(&root, &buffer.data)
}

/// Write the rig to `dir/name.glb`
pub fn write_rig(dir: &Path, name: &str, head: &str) -> PathBuf {
    let path = dir.join(format!("{}.glb", name));
    std::fs::write(&path, rig_glb(head)).expect("Failed to write GLB");
    path
}

fn assemble_glb(root: &json::Root, buffer_data: &[u8]) -> Vec<u8> {
    let json_string = json::serialize::to_string(root).expect("Failed to serialize JSON");
    let json_bytes = json_string.as_bytes();

    // Chunks are 4-byte aligned
    let json_padding = (4 - json_bytes.len() % 4) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;
    let buffer_padding = (4 - buffer_data.len() % 4) % 4;
    let buffer_chunk_length = buffer_data.len() + buffer_padding;
    let total_length = 12 + 8 + json_chunk_length + 8 + buffer_chunk_length;

    let mut glb = Vec::with_capacity(total_length);

    // Header
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    // JSON chunk
    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat_n(b' ', json_padding));

    // BIN chunk
    glb.extend_from_slice(&(buffer_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(buffer_data);
    glb.extend(std::iter::repeat_n(0u8, buffer_padding));

    glb
}
