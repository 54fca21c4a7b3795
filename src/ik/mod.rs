//! IK 系统
//!
//! 核心设计思想：
//! - IkSolver: 关节链 + 迭代策略（CCD / FABRIK），挂载节点的世界位置即目标
//! - TwoBoneIk: 平面解析解，余弦定理直接求两个关节角
//!
//! 求解器只写关节的局部变换，世界变换由场景统一传播。

mod ccd;
mod fabrik;
mod solver;
mod two_bone;

pub use solver::{IkSolver, IkStrategy, SolverStatus};
pub use two_bone::TwoBoneIk;

use glam::{Quat, Vec3};

/// 把单位向量 `from` 转到 `to` 的最小旋转
///
/// 两向量反向时绕任一垂直轴旋转 180°。
pub fn rotation_between(from: Vec3, to: Vec3) -> Quat {
    let dot = from.dot(to).clamp(-1.0, 1.0);
    if dot.abs() + 1e-5 >= 1.0 {
        if dot > 0.0 {
            return Quat::IDENTITY;
        }
        return Quat::from_axis_angle(from.any_orthonormal_vector(), std::f32::consts::PI);
    }
    let axis = from.cross(to).normalize();
    Quat::from_axis_angle(axis, dot.acos())
}
