//! 曲线内核 - 分段定位 + 插值基函数
//!
//! 所有曲线共用同一套分段定位逻辑：
//! 全局参数 t ∈ [0,1] 在 n 个控制点上均分为 n-1 段。

use glam::Vec3;

/// 定位结果：起止控制点索引 + 段内归一化参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub tn: f32,
}

/// 根据全局参数定位所在段，控制点不足 2 个时返回 None
pub fn locate_segment(point_count: usize, t: f32) -> Option<Segment> {
    if point_count < 2 {
        return None;
    }
    let last = point_count - 1;
    if t <= 0.0 {
        return Some(Segment { start: 0, end: 1, tn: 0.0 });
    }
    if t >= 1.0 {
        return Some(Segment { start: last - 1, end: last, tn: 1.0 });
    }

    let step = 1.0 / last as f32;
    let start = ((t / step).floor() as usize).min(last - 1);
    let tn = ((t - step * start as f32) / step).clamp(0.0, 1.0);
    Some(Segment { start, end: start + 1, tn })
}

/// 插值基函数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Basis {
    /// 控制值 [p0, p1, _, _]
    Linear,
    /// 控制值 [p0, p1, t0, t1]（端点 + 切线）
    Hermite,
    /// 控制值 [p0, c0, c1, p1]（端点 + 两个控制柄）
    Bezier,
}

impl Basis {
    /// 计算位置（order = 0）或一、二阶导数（对段内参数）
    pub fn evaluate(self, c: &[Vec3; 4], tn: f32, order: u8) -> Vec3 {
        match self {
            Basis::Linear => match order {
                0 => c[0] + (c[1] - c[0]) * tn,
                1 => c[1] - c[0],
                _ => Vec3::ZERO,
            },
            Basis::Hermite => {
                let (p0, p1, t0, t1) = (c[0], c[1], c[2], c[3]);
                let a = 2.0 * (p0 - p1) + t0 + t1;
                let b = 3.0 * (p1 - p0) - 2.0 * t0 - t1;
                match order {
                    0 => a * tn * tn * tn + b * tn * tn + t0 * tn + p0,
                    1 => 3.0 * a * tn * tn + 2.0 * b * tn + t0,
                    _ => 6.0 * a * tn + 2.0 * b,
                }
            }
            Basis::Bezier => {
                let (p0, p1, p2, p3) = (c[0], c[1], c[2], c[3]);
                let it = 1.0 - tn;
                match order {
                    // B(t) = (1-t)³P₀ + 3(1-t)²tP₁ + 3(1-t)t²P₂ + t³P₃
                    0 => p0 * it.powi(3)
                        + p1 * 3.0 * it.powi(2) * tn
                        + p2 * 3.0 * it * tn.powi(2)
                        + p3 * tn.powi(3),
                    1 => 3.0 * it * it * (p1 - p0)
                        + 6.0 * it * tn * (p2 - p1)
                        + 3.0 * tn * tn * (p3 - p2),
                    _ => 6.0 * it * (p2 - 2.0 * p1 + p0) + 6.0 * tn * (p3 - 2.0 * p2 + p1),
                }
            }
        }
    }
}
