//! Animation sampling
//!
//! Clips are evaluated only at their keyed times. For every retained bucket
//! the bone's pose is expressed relative to its bind pose, about its own head:
//!
//! ```text
//! M = T⁻¹ · (P · B⁻¹) · T
//! ```
//!
//! where `P` is the posed matrix, `B` the bind matrix and `T` the translation
//! to the bone head. `M` decomposes into the keyframe's translation, rotation
//! and scale.

use glam::Mat4;
use s64_common::{Animation, Frame, Keyframe, Rotation, NONE_NAME};

use crate::export::partition::BoneRef;
use crate::scene::{SceneSource, ScopedPose};
use crate::settings::RotationFormat;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOptions {
    pub rotation: RotationFormat,
    /// Multiplies every key time before it is stored
    pub time_scale: f32,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            rotation: RotationFormat::Quaternion,
            time_scale: 1.0,
        }
    }
}

/// Sample every exportable clip
///
/// `bones` lists each retained bucket's name and the bone it follows, in
/// output mesh order. Clips come back sorted by name.
pub fn sample_animations<S: SceneSource>(
    scene: &mut S,
    skeletons: &[usize],
    bones: &[(String, BoneRef)],
    options: SampleOptions,
) -> Vec<Animation> {
    let mut scene = ScopedPose::new(scene);
    scene.set_rest_pose(false);

    let clips: Vec<(usize, String, Vec<f32>)> = scene
        .clips()
        .iter()
        .enumerate()
        .filter(|(_, clip)| !clip.preserve && clip.name != NONE_NAME)
        .map(|(i, clip)| (i, clip.name.clone(), clip.key_times()))
        .collect();

    let mut animations = Vec::with_capacity(clips.len());
    for (index, name, times) in clips {
        for &s in skeletons {
            scene.bind_clip(s, Some(index));
        }

        let mut animation = Animation::new(name);
        let mut last_frame: Option<i64> = None;
        for time in times {
            let stored = time * options.time_scale;
            let frame = stored.trunc() as i64;
            if last_frame == Some(frame) {
                tracing::warn!(
                    "Animation '{}': key at {} lands on frame {} again after rescaling, keeping the earlier one",
                    animation.name,
                    time,
                    frame
                );
                continue;
            }
            last_frame = Some(frame);

            scene.set_time(time);
            let keyframes = bones
                .iter()
                .map(|(name, bone)| sample_bone(&*scene, name, *bone, options.rotation))
                .collect();
            animation.frames.push(Frame {
                time: stored,
                keyframes,
            });
        }

        animation.sort_frames();
        tracing::debug!(
            "Sampled animation '{}': {} keyframes",
            animation.name,
            animation.frames.len()
        );
        animations.push(animation);
    }

    animations.sort_by(|a, b| a.name.cmp(&b.name));
    animations
}

/// Pose of one bone relative to its bind pose, about its head
pub fn sample_bone<S: SceneSource>(
    scene: &S,
    name: &str,
    bone: BoneRef,
    rotation: RotationFormat,
) -> Keyframe {
    let bind = scene.bind_matrix(bone.skeleton, bone.bone);
    let pose = scene.pose_matrix(bone.skeleton, bone.bone);
    let local = relative_pose(bind, pose);
    let (scale, quat, position) = local.to_scale_rotation_translation();

    Keyframe {
        bone: name.to_string(),
        position,
        rotation: match rotation {
            RotationFormat::Quaternion => Rotation::Quaternion(quat),
            RotationFormat::Euler => Rotation::from_quat_euler(quat),
        },
        scale,
    }
}

/// `T⁻¹ · (P · B⁻¹) · T` with `T` the translation to the bind head
pub fn relative_pose(bind: Mat4, pose: Mat4) -> Mat4 {
    let head = bind.w_axis.truncate();
    Mat4::from_translation(-head) * (pose * bind.inverse()) * Mat4::from_translation(head)
}
