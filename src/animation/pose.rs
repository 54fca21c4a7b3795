//! 姿势 - 节点索引 → (局部变换, 有效分量掩码)
//!
//! 混合规则：
//! - 只有一侧含某个节点时，直接复制该侧
//! - 两侧都含节点时逐分量处理：都有则插值，只有一侧有则复制，都没有则不写
//! - 旋转用球面插值后归一化

use std::collections::BTreeMap;

use bitflags::bitflags;
use glam::{Quat, Vec3};

use super::clip::{AnimationClip, ChannelPath};
use crate::scene::Transform;
use crate::Result;

bitflags! {
    /// 姿势中有效的变换分量
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u8 {
        const TRANSLATION = 1;
        const ROTATION = 2;
        const SCALE = 4;
    }
}

impl From<ChannelPath> for ChannelMask {
    fn from(path: ChannelPath) -> Self {
        match path {
            ChannelPath::Translation => ChannelMask::TRANSLATION,
            ChannelPath::Rotation => ChannelMask::ROTATION,
            ChannelPath::Scale => ChannelMask::SCALE,
        }
    }
}

/// 单个节点的姿势数据
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PoseEntry {
    pub transform: Transform,
    pub mask: ChannelMask,
}

impl PoseEntry {
    /// 只写入掩码中的分量
    pub fn apply_to(&self, local: &mut Transform) {
        if self.mask.contains(ChannelMask::TRANSLATION) {
            local.translation = self.transform.translation;
        }
        if self.mask.contains(ChannelMask::ROTATION) {
            local.rotation = self.transform.rotation;
        }
        if self.mask.contains(ChannelMask::SCALE) {
            local.scale = self.transform.scale;
        }
    }
}

/// 姿势
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pose {
    entries: BTreeMap<usize, PoseEntry>,
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn get(&self, node: usize) -> Option<&PoseEntry> {
        self.entries.get(&node)
    }

    pub fn insert(&mut self, node: usize, entry: PoseEntry) {
        self.entries.insert(node, entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PoseEntry)> {
        self.entries.iter().map(|(&k, v)| (k, v))
    }

    fn entry(&mut self, node: usize) -> &mut PoseEntry {
        self.entries.entry(node).or_default()
    }

    pub fn set_translation(&mut self, node: usize, translation: Vec3) {
        let e = self.entry(node);
        e.transform.translation = translation;
        e.mask |= ChannelMask::TRANSLATION;
    }

    pub fn set_rotation(&mut self, node: usize, rotation: Quat) {
        let e = self.entry(node);
        e.transform.rotation = rotation;
        e.mask |= ChannelMask::ROTATION;
    }

    pub fn set_scale(&mut self, node: usize, scale: Vec3) {
        let e = self.entry(node);
        e.transform.scale = scale;
        e.mask |= ChannelMask::SCALE;
    }

    // ========================================================================
    // 采样
    // ========================================================================

    /// 在 t 处采样片段（t 先按片段时长折回）
    pub fn sample(clip: &AnimationClip, time: f32, nlerp: bool) -> Result<Pose> {
        Self::sample_at(clip, clip.wrap_time(time), nlerp)
    }

    /// 在 t 处采样片段（不折回，超出范围取首 / 末帧）
    pub fn sample_at(clip: &AnimationClip, time: f32, nlerp: bool) -> Result<Pose> {
        let mut pose = Pose::new();
        for channel in clip.channels() {
            let Some(sampler) = clip.sampler(channel.sampler) else { continue };
            match channel.path {
                ChannelPath::Translation => {
                    pose.set_translation(channel.node, sampler.sample_vec3(time)?);
                }
                ChannelPath::Rotation => {
                    pose.set_rotation(channel.node, sampler.sample_quat(time, nlerp)?);
                }
                ChannelPath::Scale => {
                    pose.set_scale(channel.node, sampler.sample_vec3(time)?);
                }
            }
        }
        Ok(pose)
    }

    // ========================================================================
    // 混合
    // ========================================================================

    /// 线性混合：t = 0 为 `from`，t = 1 为 `to`
    pub fn lerp(from: &Pose, to: &Pose, t: f32) -> Pose {
        let mut out = Pose::new();
        for (&node, a) in &from.entries {
            let entry = match to.entries.get(&node) {
                Some(b) => lerp_entry(a, b, t),
                None => *a,
            };
            out.entries.insert(node, entry);
        }
        for (&node, b) in &to.entries {
            out.entries.entry(node).or_insert(*b);
        }
        out
    }

    /// 加权混合（重心坐标），权重按各分量实际参与的来源重新归一化
    pub fn blend_weighted(sources: &[(&Pose, f32)]) -> Pose {
        let mut out = Pose::new();
        let nodes: std::collections::BTreeSet<usize> = sources
            .iter()
            .flat_map(|(pose, _)| pose.entries.keys().copied())
            .collect();

        for node in nodes {
            let present: Vec<(&PoseEntry, f32)> = sources
                .iter()
                .filter_map(|(pose, w)| pose.entries.get(&node).map(|e| (e, *w)))
                .collect();
            out.entries.insert(node, weighted_entry(&present));
        }
        out
    }

    /// 三点重心混合
    pub fn barycentric(poses: [&Pose; 3], weights: [f32; 3]) -> Pose {
        Self::blend_weighted(&[
            (poses[0], weights[0]),
            (poses[1], weights[1]),
            (poses[2], weights[2]),
        ])
    }
}

fn lerp_entry(a: &PoseEntry, b: &PoseEntry, t: f32) -> PoseEntry {
    let mut out = PoseEntry::default();
    for channel in [ChannelMask::TRANSLATION, ChannelMask::ROTATION, ChannelMask::SCALE] {
        let (src, blended) = match (a.mask.contains(channel), b.mask.contains(channel)) {
            (true, true) => (a, true),
            (true, false) => (a, false),
            (false, true) => (b, false),
            (false, false) => continue,
        };
        out.mask |= channel;
        let (ta, tb) = (&a.transform, &b.transform);
        if channel == ChannelMask::TRANSLATION {
            out.transform.translation = if blended {
                ta.translation + (tb.translation - ta.translation) * t
            } else {
                src.transform.translation
            };
        } else if channel == ChannelMask::ROTATION {
            out.transform.rotation = if blended {
                ta.rotation.slerp(tb.rotation, t).normalize()
            } else {
                src.transform.rotation
            };
        } else {
            out.transform.scale = if blended {
                ta.scale + (tb.scale - ta.scale) * t
            } else {
                src.transform.scale
            };
        }
    }
    out
}

fn weighted_entry(present: &[(&PoseEntry, f32)]) -> PoseEntry {
    let mut out = PoseEntry::default();
    for channel in [ChannelMask::TRANSLATION, ChannelMask::ROTATION, ChannelMask::SCALE] {
        let contributors: Vec<(&Transform, f32)> = present
            .iter()
            .filter(|(e, _)| e.mask.contains(channel))
            .map(|(e, w)| (&e.transform, *w))
            .collect();
        let Some(&(first, _)) = contributors.first() else { continue };
        out.mask |= channel;

        let total: f32 = contributors.iter().map(|(_, w)| w).sum();
        if contributors.len() == 1 || total.abs() < 1e-6 {
            copy_channel(&mut out.transform, first, channel);
            continue;
        }

        if channel == ChannelMask::TRANSLATION {
            out.transform.translation = contributors
                .iter()
                .fold(Vec3::ZERO, |acc, (t, w)| acc + t.translation * (w / total));
        } else if channel == ChannelMask::ROTATION {
            // 与第一个来源对齐半球后加权求和
            let reference = first.rotation;
            let sum = contributors.iter().fold(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0), |acc, (t, w)| {
                let q = if t.rotation.dot(reference) < 0.0 { -t.rotation } else { t.rotation };
                acc + q * (w / total)
            });
            let len = sum.length();
            out.transform.rotation = if len > 1e-6 { sum / len } else { reference };
        } else {
            out.transform.scale = contributors
                .iter()
                .fold(Vec3::ZERO, |acc, (t, w)| acc + t.scale * (w / total));
        }
    }
    out
}

fn copy_channel(dst: &mut Transform, src: &Transform, channel: ChannelMask) {
    if channel == ChannelMask::TRANSLATION {
        dst.translation = src.translation;
    } else if channel == ChannelMask::ROTATION {
        dst.rotation = src.rotation;
    } else {
        dst.scale = src.scale;
    }
}
