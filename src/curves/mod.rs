//! 曲线系统 - 参数曲线、弧长表与跟随控制器
//!
//! 核心设计思想：
//! - Curve: 统一求值接口，分段定位只实现一次，按基函数参数化
//! - DistanceTable: 参数 ↔ 弧长映射（均匀采样 / 自适应细分）
//! - CurveController: 沿曲线推进并计算跟随者朝向
//! - CurveComponent: 把控制点存成场景节点，每帧快照后求值

mod component;
mod controller;
mod distance_table;
mod kernel;
mod shapes;

pub use component::{CurveComponent, CurveKind};
pub use controller::{CurveController, Frame, FrameMode, SpeedControl};
pub use distance_table::{DistanceTable, TableEntry, TableMethod};
pub use kernel::{locate_segment, Basis, Segment};
pub use shapes::{BezierCurve, CatmullRomCurve, CurveShape, HermiteCurve, LinearCurve};

use glam::Vec3;

use crate::{AnimError, Result};

/// 曲线 trait
///
/// 全局参数 t ∈ [0,1]，超出范围时夹到端点。
/// 导数是对段内参数求的，只用于方向计算。
pub trait Curve {
    /// 插值基函数
    fn basis(&self) -> Basis;

    /// 控制点数量
    fn point_count(&self) -> usize;

    /// 最少控制点数
    fn min_points(&self) -> usize {
        2
    }

    /// 指定段的四个控制值（含义由基函数决定）
    fn segment_controls(&self, seg: Segment) -> [Vec3; 4];

    /// 每个控制点附带的切线 / 控制柄数量（逐项取最短），没有附带数据时为 None
    fn control_count(&self) -> Option<usize> {
        None
    }

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn validate(&self) -> Result<()> {
        let points = self.point_count();
        if points < self.min_points() {
            return Err(AnimError::NotEnoughPoints {
                required: self.min_points(),
                actual: points,
            });
        }
        match self.control_count() {
            Some(controls) if controls != points => Err(AnimError::ControlMismatch { points, controls }),
            _ => Ok(()),
        }
    }

    /// 求值：order = 0 位置，1 一阶导数，2 二阶导数；控制点不足时返回零向量
    fn evaluate(&self, t: f32, order: u8) -> Vec3 {
        if !self.is_valid() {
            return Vec3::ZERO;
        }
        match locate_segment(self.point_count(), t) {
            Some(seg) => self.basis().evaluate(&self.segment_controls(seg), seg.tn, order),
            None => Vec3::ZERO,
        }
    }

    #[inline]
    fn position(&self, t: f32) -> Vec3 {
        self.evaluate(t, 0)
    }

    #[inline]
    fn first_derivative(&self, t: f32) -> Vec3 {
        self.evaluate(t, 1)
    }

    #[inline]
    fn second_derivative(&self, t: f32) -> Vec3 {
        self.evaluate(t, 2)
    }
}
