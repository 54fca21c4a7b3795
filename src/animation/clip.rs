//! 动画片段 - 采样器 + 通道
//!
//! 采样器保存关键帧时间与数值，通道把采样器绑定到模型节点的某个变换分量。
//! 关键帧查找：t 早于首帧取首帧，晚于末帧取末帧，否则在所在区间内插值。

use glam::{Quat, Vec3};

use crate::{AnimError, Result};

/// 动画片段句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub usize);

/// 插值方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    /// 三次样条（输出为 入切线 / 值 / 出切线 三元组），暂不支持采样
    CubicSpline,
}

/// 通道目标分量
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelPath {
    Translation,
    Rotation,
    Scale,
}

/// 关键帧数值
#[derive(Clone, Debug, PartialEq)]
pub enum Keyframes {
    Vec3(Vec<Vec3>),
    Quat(Vec<Quat>),
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Vec3(v) => v.len(),
            Keyframes::Quat(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 采样器
#[derive(Clone, Debug, PartialEq)]
pub struct Sampler {
    pub interpolation: Interpolation,
    /// 关键帧时间（秒，单调不减）
    pub input: Vec<f32>,
    pub output: Keyframes,
}

impl Sampler {
    pub fn vec3(interpolation: Interpolation, input: Vec<f32>, output: Vec<Vec3>) -> Self {
        Self { interpolation, input, output: Keyframes::Vec3(output) }
    }

    pub fn quat(interpolation: Interpolation, input: Vec<f32>, output: Vec<Quat>) -> Self {
        Self { interpolation, input, output: Keyframes::Quat(output) }
    }

    /// 检查关键帧数据是否一致
    pub fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(AnimError::Animation("sampler has no keyframes".to_string()));
        }
        if self.input.windows(2).any(|w| w[1] < w[0]) {
            return Err(AnimError::Animation("sampler input is not sorted".to_string()));
        }
        let expected = match self.interpolation {
            Interpolation::CubicSpline => self.input.len() * 3,
            _ => self.input.len(),
        };
        if self.output.len() != expected {
            return Err(AnimError::Animation(format!(
                "sampler output has {} values, expected {}",
                self.output.len(),
                expected
            )));
        }
        Ok(())
    }

    /// 最后一个关键帧时间
    pub fn end_time(&self) -> f32 {
        self.input.last().copied().unwrap_or(0.0)
    }

    /// 定位 t 所在区间：(起始帧, 结束帧, 区间内归一化参数)
    pub fn locate(&self, t: f32) -> (usize, usize, f32) {
        let n = self.input.len();
        if n == 0 || t < self.input[0] {
            return (0, 0, 0.0);
        }
        let last = n - 1;
        if t >= self.input[last] {
            return (last, last, 0.0);
        }

        // 第一个时间晚于 t 的关键帧
        let end = self.input.partition_point(|&x| x <= t).clamp(1, last);
        let start = end - 1;
        let span = self.input[end] - self.input[start];
        let tn = if span > f32::EPSILON {
            ((t - self.input[start]) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (start, end, tn)
    }

    fn check_interpolation(&self) -> Result<()> {
        if self.interpolation == Interpolation::CubicSpline {
            return Err(AnimError::UnsupportedInterpolation("cubic spline".to_string()));
        }
        Ok(())
    }

    /// 采样向量通道（平移 / 缩放）
    pub fn sample_vec3(&self, t: f32) -> Result<Vec3> {
        self.check_interpolation()?;
        let Keyframes::Vec3(values) = &self.output else {
            return Err(AnimError::Animation("sampler does not hold vector keyframes".to_string()));
        };
        if values.is_empty() {
            return Err(AnimError::Animation("sampler has no keyframes".to_string()));
        }

        let (start, end, tn) = self.locate(t);
        let (p0, p1) = (values[start], values[end]);
        Ok(match self.interpolation {
            Interpolation::Step => p0,
            _ => p0 + (p1 - p0) * tn,
        })
    }

    /// 采样旋转通道；`nlerp` 为 true 时用归一化线性插值，否则球面插值
    pub fn sample_quat(&self, t: f32, nlerp: bool) -> Result<Quat> {
        self.check_interpolation()?;
        let Keyframes::Quat(values) = &self.output else {
            return Err(AnimError::Animation("sampler does not hold rotation keyframes".to_string()));
        };
        if values.is_empty() {
            return Err(AnimError::Animation("sampler has no keyframes".to_string()));
        }

        let (start, end, tn) = self.locate(t);
        let (q0, q1) = (values[start], values[end]);
        Ok(match self.interpolation {
            Interpolation::Step => q0,
            _ if nlerp => q0.lerp(q1, tn),
            _ => q0.slerp(q1, tn).normalize(),
        })
    }
}

/// 通道：采样器 → 模型节点的某个分量
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
    /// 模型内节点索引
    pub node: usize,
    pub path: ChannelPath,
    /// 片段内采样器索引
    pub sampler: usize,
}

/// 动画片段
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    samplers: Vec<Sampler>,
    channels: Vec<Channel>,
    max_time: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 添加采样器，返回采样器索引
    pub fn add_sampler(&mut self, sampler: Sampler) -> Result<usize> {
        sampler.validate()?;
        self.max_time = self.max_time.max(sampler.end_time());
        self.samplers.push(sampler);
        Ok(self.samplers.len() - 1)
    }

    /// 添加通道，采样器数值类型必须与分量匹配
    pub fn add_channel(&mut self, node: usize, path: ChannelPath, sampler: usize) -> Result<()> {
        let s = self
            .samplers
            .get(sampler)
            .ok_or_else(|| AnimError::Animation(format!("clip has no sampler {}", sampler)))?;
        let matches = matches!(
            (path, &s.output),
            (ChannelPath::Rotation, Keyframes::Quat(_))
                | (ChannelPath::Translation | ChannelPath::Scale, Keyframes::Vec3(_))
        );
        if !matches {
            return Err(AnimError::Animation(format!(
                "sampler {} does not match channel {:?}",
                sampler, path
            )));
        }
        self.channels.push(Channel { node, path, sampler });
        Ok(())
    }

    /// 便捷方法：添加采样器并绑定到通道
    pub fn add_track(&mut self, node: usize, path: ChannelPath, sampler: Sampler) -> Result<()> {
        let index = self.add_sampler(sampler)?;
        self.add_channel(node, path, index)
    }

    #[inline]
    pub fn samplers(&self) -> &[Sampler] {
        &self.samplers
    }

    #[inline]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    #[inline]
    pub fn sampler(&self, index: usize) -> Option<&Sampler> {
        self.samplers.get(index)
    }

    /// 片段时长（所有采样器的最大结束时间）
    #[inline]
    pub fn max_time(&self) -> f32 {
        self.max_time
    }

    /// 把时间折回 [0, max_time)
    pub fn wrap_time(&self, t: f32) -> f32 {
        if self.max_time <= f32::EPSILON {
            return 0.0;
        }
        let wrapped = t - (t / self.max_time).floor() * self.max_time;
        if wrapped >= self.max_time {
            0.0
        } else {
            wrapped.max(0.0)
        }
    }
}

/// 动画片段库
#[derive(Clone, Debug, Default)]
pub struct AnimationLibrary {
    clips: Vec<AnimationClip>,
}

impl AnimationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加片段（空片段会被拒绝）
    pub fn add(&mut self, clip: AnimationClip) -> Result<ClipId> {
        if clip.channels.is_empty() {
            return Err(AnimError::Animation(format!("clip '{}' has no channels", clip.name)));
        }
        self.clips.push(clip);
        Ok(ClipId(self.clips.len() - 1))
    }

    #[inline]
    pub fn get(&self, id: ClipId) -> Option<&AnimationClip> {
        self.clips.get(id.0)
    }

    pub fn find(&self, name: &str) -> Option<ClipId> {
        self.clips.iter().position(|c| c.name == name).map(ClipId)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClipId, &AnimationClip)> {
        self.clips.iter().enumerate().map(|(i, c)| (ClipId(i), c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Sampler {
        Sampler::vec3(
            Interpolation::Linear,
            vec![1.0, 2.0, 4.0],
            vec![Vec3::ZERO, Vec3::X, Vec3::new(3.0, 0.0, 0.0)],
        )
    }

    #[test]
    fn test_locate_outside_range() {
        let s = ramp();
        assert_eq!(s.locate(0.5), (0, 0, 0.0));
        assert_eq!(s.locate(9.0), (2, 2, 0.0));
        assert_eq!(s.locate(4.0), (2, 2, 0.0));
    }

    #[test]
    fn test_locate_inside_range() {
        let s = ramp();
        let (start, end, tn) = s.locate(3.0);
        assert_eq!((start, end), (1, 2));
        assert!((tn - 0.5).abs() < 1e-6);
        assert_eq!(s.locate(1.0), (0, 1, 0.0));
    }

    #[test]
    fn test_sample_linear_and_step() {
        let s = ramp();
        assert!(s.sample_vec3(3.0).unwrap().abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));

        let step = Sampler { interpolation: Interpolation::Step, ..ramp() };
        assert!(step.sample_vec3(3.9).unwrap().abs_diff_eq(Vec3::X, 1e-6));
        assert!(step.sample_vec3(2.0).unwrap().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_sample_rotation() {
        let s = Sampler::quat(
            Interpolation::Linear,
            vec![0.0, 1.0],
            vec![Quat::IDENTITY, Quat::from_rotation_y(1.0)],
        );
        for nlerp in [false, true] {
            let q = s.sample_quat(0.5, nlerp).unwrap();
            assert!((q.length() - 1.0).abs() < 1e-5);
            assert!(q.angle_between(Quat::from_rotation_y(0.5)) < 1e-3);
        }
    }

    #[test]
    fn test_cubic_spline_unsupported() {
        let s = Sampler::vec3(Interpolation::CubicSpline, vec![0.0], vec![Vec3::ZERO; 3]);
        assert!(s.validate().is_ok());
        assert!(matches!(s.sample_vec3(0.0), Err(AnimError::UnsupportedInterpolation(_))));
    }

    #[test]
    fn test_clip_channels() {
        let mut clip = AnimationClip::new("walk");
        clip.add_track(0, ChannelPath::Translation, ramp()).unwrap();
        assert!((clip.max_time() - 4.0).abs() < 1e-6);
        // 旋转通道不能绑定向量采样器
        assert!(clip.add_channel(0, ChannelPath::Rotation, 0).is_err());
        assert!(clip.add_sampler(Sampler::vec3(Interpolation::Linear, vec![1.0, 0.0], vec![Vec3::ZERO; 2])).is_err());
    }

    #[test]
    fn test_wrap_time() {
        let mut clip = AnimationClip::new("walk");
        clip.add_track(0, ChannelPath::Translation, ramp()).unwrap();
        assert!((clip.wrap_time(5.0) - 1.0).abs() < 1e-6);
        assert!((clip.wrap_time(-1.0) - 3.0).abs() < 1e-6);
        assert!(clip.wrap_time(4.0).abs() < 1e-6);
    }

    #[test]
    fn test_library() {
        let mut library = AnimationLibrary::new();
        assert!(library.add(AnimationClip::new("empty")).is_err());
        let mut clip = AnimationClip::new("walk");
        clip.add_track(0, ChannelPath::Translation, ramp()).unwrap();
        let id = library.add(clip).unwrap();
        assert_eq!(library.find("walk"), Some(id));
        assert_eq!(library.get(id).unwrap().name, "walk");
    }
}
