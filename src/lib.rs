//! Anim Engine - 动画建模运行时
//!
//! 提供：
//! - 层级变换与场景图（Transform / SceneGraph）
//! - 参数曲线与弧长表（Linear / Hermite / Catmull-Rom / Bezier）
//! - 曲线跟随控制器（匀速 / 距离-时间函数）
//! - IK 求解（CCD / FABRIK / 解析双骨骼）
//! - 动画采样、姿势混合与混合树（1D / 2D）

pub mod animation;
pub mod config;
pub mod curves;
pub mod ik;
pub mod scene;

pub use animation::{AnimationClip, AnimationLibrary, Animator, BlendTree, ClipId, Pose};
pub use curves::{Curve, CurveComponent, CurveController, DistanceTable};
pub use ik::{IkSolver, SolverStatus, TwoBoneIk};
pub use scene::{FrameContext, Node, NodeId, Resources, SceneGraph, Transform};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnimError {
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("Scene error: {0}")]
    Scene(String),

    #[error("Model not found: {0}")]
    ModelNotFound(usize),

    #[error("Clip not found: {0:?}")]
    ClipNotFound(ClipId),

    #[error("Curve needs at least {required} points, has {actual}")]
    NotEnoughPoints { required: usize, actual: usize },

    #[error("Curve has {points} points but {controls} tangents/handles")]
    ControlMismatch { points: usize, controls: usize },

    #[error("Distance table needs at least 2 entries, has {0}")]
    TableTooSmall(usize),

    #[error("Unsupported interpolation: {0}")]
    UnsupportedInterpolation(String),

    #[error("Blend node needs at least {required} children, has {actual}")]
    NotEnoughBlendNodes { required: usize, actual: usize },

    #[error("Blend tree error: {0}")]
    BlendTree(String),

    #[error("Animation error: {0}")]
    Animation(String),

    #[error("IK error: {0}")]
    Ik(String),
}

pub type Result<T> = std::result::Result<T, AnimError>;
