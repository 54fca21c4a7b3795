//! 曲线形状 - Linear / Hermite / Catmull-Rom / Bezier
//!
//! 形状只保存世界空间下的控制值，求值交给 `Basis`。

use glam::Vec3;

use super::kernel::{Basis, Segment};
use super::Curve;

// ============================================================================
// 折线
// ============================================================================

/// 折线（分段线性）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearCurve {
    pub points: Vec<Vec3>,
}

impl LinearCurve {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }
}

impl Curve for LinearCurve {
    fn basis(&self) -> Basis {
        Basis::Linear
    }

    fn point_count(&self) -> usize {
        self.points.len()
    }

    fn segment_controls(&self, seg: Segment) -> [Vec3; 4] {
        [self.points[seg.start], self.points[seg.end], Vec3::ZERO, Vec3::ZERO]
    }
}

// ============================================================================
// Hermite
// ============================================================================

/// Hermite 样条：每个控制点带入切线 / 出切线
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HermiteCurve {
    points: Vec<Vec3>,
    /// 进入该点的切线（首点未使用）
    tangents_in: Vec<Vec3>,
    /// 离开该点的切线（末点未使用）
    tangents_out: Vec<Vec3>,
}

impl HermiteCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: Vec3, tangent_in: Vec3, tangent_out: Vec3) {
        self.points.push(point);
        self.tangents_in.push(tangent_in);
        self.tangents_out.push(tangent_out);
    }

    #[inline]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    #[inline]
    pub fn tangents_in(&self) -> &[Vec3] {
        &self.tangents_in
    }

    #[inline]
    pub fn tangents_out(&self) -> &[Vec3] {
        &self.tangents_out
    }
}

impl Curve for HermiteCurve {
    fn basis(&self) -> Basis {
        Basis::Hermite
    }

    fn point_count(&self) -> usize {
        self.points.len()
    }

    fn control_count(&self) -> Option<usize> {
        Some(self.tangents_in.len().min(self.tangents_out.len()))
    }

    fn segment_controls(&self, seg: Segment) -> [Vec3; 4] {
        [
            self.points[seg.start],
            self.points[seg.end],
            self.tangents_out[seg.start],
            self.tangents_in[seg.end],
        ]
    }
}

// ============================================================================
// Catmull-Rom
// ============================================================================

/// Catmull-Rom 样条：切线由相邻控制点自动推导，至少 3 个点
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatmullRomCurve {
    points: Vec<Vec3>,
    tangents: Vec<Vec3>,
}

impl CatmullRomCurve {
    pub fn new(points: Vec<Vec3>) -> Self {
        let mut curve = Self { points, tangents: Vec::new() };
        curve.compute_tangents();
        curve
    }

    pub fn push(&mut self, point: Vec3) {
        self.points.push(point);
        self.compute_tangents();
    }

    #[inline]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    #[inline]
    pub fn tangents(&self) -> &[Vec3] {
        &self.tangents
    }

    /// 内部点：0.5 * (next - prev)；端点用相邻两点外推
    fn compute_tangents(&mut self) {
        let p = &self.points;
        let n = p.len();
        self.tangents = vec![Vec3::ZERO; n];
        if n < 3 {
            return;
        }
        self.tangents[0] = 0.5 * ((p[1] - p[0]) + (p[1] - p[2]));
        self.tangents[n - 1] = -0.5 * ((p[n - 2] - p[n - 1]) + (p[n - 2] - p[n - 3]));
        for i in 1..n - 1 {
            self.tangents[i] = 0.5 * (p[i + 1] - p[i - 1]);
        }
    }
}

impl Curve for CatmullRomCurve {
    fn basis(&self) -> Basis {
        Basis::Hermite
    }

    fn point_count(&self) -> usize {
        self.points.len()
    }

    fn min_points(&self) -> usize {
        3
    }

    fn segment_controls(&self, seg: Segment) -> [Vec3; 4] {
        [
            self.points[seg.start],
            self.points[seg.end],
            self.tangents[seg.start],
            self.tangents[seg.end],
        ]
    }
}

// ============================================================================
// Bezier
// ============================================================================

/// 分段三次 Bezier：每个控制点带入 / 出控制柄（世界坐标）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BezierCurve {
    points: Vec<Vec3>,
    handles_in: Vec<Vec3>,
    handles_out: Vec<Vec3>,
}

impl BezierCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: Vec3, handle_in: Vec3, handle_out: Vec3) {
        self.points.push(point);
        self.handles_in.push(handle_in);
        self.handles_out.push(handle_out);
    }

    #[inline]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    #[inline]
    pub fn handles_in(&self) -> &[Vec3] {
        &self.handles_in
    }

    #[inline]
    pub fn handles_out(&self) -> &[Vec3] {
        &self.handles_out
    }
}

impl Curve for BezierCurve {
    fn basis(&self) -> Basis {
        Basis::Bezier
    }

    fn point_count(&self) -> usize {
        self.points.len()
    }

    fn control_count(&self) -> Option<usize> {
        Some(self.handles_in.len().min(self.handles_out.len()))
    }

    fn segment_controls(&self, seg: Segment) -> [Vec3; 4] {
        [
            self.points[seg.start],
            self.handles_out[seg.start],
            self.handles_in[seg.end],
            self.points[seg.end],
        ]
    }
}

// ============================================================================
// 封闭变体
// ============================================================================

/// 任意曲线形状
#[derive(Clone, Debug, PartialEq)]
pub enum CurveShape {
    Linear(LinearCurve),
    Hermite(HermiteCurve),
    CatmullRom(CatmullRomCurve),
    Bezier(BezierCurve),
}

impl CurveShape {
    fn inner(&self) -> &dyn Curve {
        match self {
            CurveShape::Linear(c) => c,
            CurveShape::Hermite(c) => c,
            CurveShape::CatmullRom(c) => c,
            CurveShape::Bezier(c) => c,
        }
    }

    /// 所有控制值（用于检测曲线是否被编辑）
    pub fn control_values(&self) -> Vec<Vec3> {
        match self {
            CurveShape::Linear(c) => c.points.clone(),
            CurveShape::Hermite(c) => c
                .points
                .iter()
                .chain(&c.tangents_in)
                .chain(&c.tangents_out)
                .copied()
                .collect(),
            CurveShape::CatmullRom(c) => c.points.clone(),
            CurveShape::Bezier(c) => c
                .points
                .iter()
                .chain(&c.handles_in)
                .chain(&c.handles_out)
                .copied()
                .collect(),
        }
    }
}

impl Curve for CurveShape {
    fn basis(&self) -> Basis {
        self.inner().basis()
    }

    fn point_count(&self) -> usize {
        self.inner().point_count()
    }

    fn min_points(&self) -> usize {
        self.inner().min_points()
    }

    fn control_count(&self) -> Option<usize> {
        self.inner().control_count()
    }

    fn segment_controls(&self, seg: Segment) -> [Vec3; 4] {
        self.inner().segment_controls(seg)
    }
}
