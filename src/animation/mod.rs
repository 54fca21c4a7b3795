//! 动画系统 - 片段采样、姿势混合与混合树
//!
//! 核心设计思想：
//! - AnimationClip: 采样器（关键帧）+ 通道（节点分量），由外部加载器填充
//! - Pose: 节点 → (变换, 分量掩码)，混合时缺失的分量直接复制而不衰减
//! - BlendTree: 叶 / 1D / 2D 三种节点，按混合参数递归求值
//! - Animator: 挂在模型实例上的播放组件

mod animator;
mod blend_tree;
mod clip;
mod pose;

pub use animator::{apply_pose, Animator};
pub use blend_tree::{barycentric_weights, BlendKind, BlendNode, BlendTree, Triangulation};
pub use clip::{
    AnimationClip, AnimationLibrary, Channel, ChannelPath, ClipId, Interpolation, Keyframes, Sampler,
};
pub use pose::{ChannelMask, Pose, PoseEntry};
