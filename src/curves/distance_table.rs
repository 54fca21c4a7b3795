//! 弧长表 - 参数 ↔ 累计弧长
//!
//! 表项按参数与距离单调递增，首项恒为 (0, 0)。
//! 查询时在距离列上二分查找，再在相邻表项间线性插值。

use glam::Vec3;

use super::Curve;
use crate::config;
use crate::{AnimError, Result};

/// 均匀步长的取值范围
pub const MIN_STEP: f32 = 0.001;
pub const MAX_STEP: f32 = 0.05;

/// 自适应细分的最大深度（防止浮点误差导致无限细分）
const MAX_ADAPTIVE_DEPTH: u32 = 16;

/// 表项
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableEntry {
    pub parameter: f32,
    pub distance: f32,
}

/// 采样策略
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TableMethod {
    /// 固定参数步长
    Uniform { step: f32 },
    /// 递归二分，误差阈值每层减半；前 `force_division` 层无条件细分
    Adaptive { epsilon: f32, force_division: u32 },
}

impl TableMethod {
    /// 按全局配置创建
    pub fn from_config() -> Self {
        let cfg = config::get_config();
        if cfg.table_adaptive {
            TableMethod::Adaptive {
                epsilon: cfg.table_epsilon,
                force_division: cfg.table_force_division,
            }
        } else {
            TableMethod::Uniform { step: cfg.table_step.clamp(MIN_STEP, MAX_STEP) }
        }
    }
}

/// 弧长表
#[derive(Clone, Debug)]
pub struct DistanceTable {
    entries: Vec<TableEntry>,
    method: TableMethod,
}

impl Default for DistanceTable {
    fn default() -> Self {
        Self::new(TableMethod::from_config())
    }
}

impl DistanceTable {
    pub fn new(method: TableMethod) -> Self {
        Self {
            entries: Vec::new(),
            method: Self::sanitize(method),
        }
    }

    pub fn uniform(step: f32) -> Self {
        Self::new(TableMethod::Uniform { step })
    }

    pub fn adaptive(epsilon: f32, force_division: u32) -> Self {
        Self::new(TableMethod::Adaptive { epsilon, force_division })
    }

    fn sanitize(method: TableMethod) -> TableMethod {
        match method {
            TableMethod::Uniform { step } => TableMethod::Uniform { step: step.clamp(MIN_STEP, MAX_STEP) },
            TableMethod::Adaptive { epsilon, force_division } => TableMethod::Adaptive {
                epsilon: epsilon.max(f32::EPSILON),
                force_division,
            },
        }
    }

    #[inline]
    pub fn method(&self) -> TableMethod {
        self.method
    }

    /// 切换采样策略并清空表，需要重新 `compute`
    pub fn set_method(&mut self, method: TableMethod) {
        self.method = Self::sanitize(method);
        self.entries.clear();
    }

    #[inline]
    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 曲线总长度，表为空时为 0
    pub fn total_distance(&self) -> f32 {
        self.entries.last().map_or(0.0, |e| e.distance)
    }

    /// 重建表
    pub fn compute<C: Curve + ?Sized>(&mut self, curve: &C) -> Result<()> {
        curve.validate()?;
        self.entries.clear();
        match self.method {
            TableMethod::Uniform { step } => self.compute_uniform(curve, step),
            TableMethod::Adaptive { epsilon, force_division } => {
                self.compute_adaptive(curve, epsilon, force_division)
            }
        }
        if config::get_config().debug_log {
            log::debug!(
                "[DistanceTable] 重建: {} 项, 总长 {:.4}",
                self.entries.len(),
                self.total_distance()
            );
        }
        Ok(())
    }

    fn compute_uniform<C: Curve + ?Sized>(&mut self, curve: &C, step: f32) {
        let count = (1.0 / step).ceil() as usize + 1;
        self.entries.reserve(count);

        let mut prev = curve.position(0.0);
        let mut distance = 0.0;
        for i in 0..count {
            let parameter = (i as f32 * step).min(1.0);
            let p = curve.position(parameter);
            distance += (p - prev).length();
            prev = p;
            self.entries.push(TableEntry { parameter, distance });
        }
    }

    fn compute_adaptive<C: Curve + ?Sized>(&mut self, curve: &C, epsilon: f32, force_division: u32) {
        self.entries.push(TableEntry { parameter: 0.0, distance: 0.0 });
        let left = (0.0, curve.position(0.0));
        let right = (1.0, curve.position(1.0));
        self.subdivide(curve, left, right, epsilon, force_division, 0);
    }

    /// 若 |A + B - C| 超过当前层误差（或仍在强制细分层内）则继续二分，
    /// 否则把右端点以弦长 C 累加入表
    fn subdivide<C: Curve + ?Sized>(
        &mut self,
        curve: &C,
        left: (f32, Vec3),
        right: (f32, Vec3),
        epsilon: f32,
        force: u32,
        level: u32,
    ) {
        let mid_u = 0.5 * (left.0 + right.0);
        let mid = (mid_u, curve.position(mid_u));

        let a = (mid.1 - left.1).length();
        let b = (right.1 - mid.1).length();
        let c = (right.1 - left.1).length();
        let error = epsilon / 2f32.powi(level as i32);

        let divide = (force > 0 || (a + b - c).abs() > error) && level < MAX_ADAPTIVE_DEPTH;
        if divide {
            let next_force = force.saturating_sub(1);
            self.subdivide(curve, left, mid, epsilon, next_force, level + 1);
            self.subdivide(curve, mid, right, epsilon, next_force, level + 1);
        } else {
            let base = self.total_distance();
            self.entries.push(TableEntry { parameter: right.0, distance: base + c });
        }
    }

    /// 弧长 → 参数（距离先夹到 [0, total]）
    pub fn get_parameter_from_dist(&self, distance: f32) -> Result<f32> {
        if self.entries.len() < 2 {
            return Err(AnimError::TableTooSmall(self.entries.len()));
        }
        let distance = distance.clamp(0.0, self.total_distance());

        // 第一个 distance >= 查询值的表项
        let hi = self.entries.partition_point(|e| e.distance < distance);
        if hi == 0 {
            return Ok(self.entries[0].parameter);
        }
        let hi = hi.min(self.entries.len() - 1);
        let (a, b) = (self.entries[hi - 1], self.entries[hi]);
        let span = b.distance - a.distance;
        if span <= f32::EPSILON {
            return Ok(b.parameter);
        }
        let k = (distance - a.distance) / span;
        Ok(a.parameter + (b.parameter - a.parameter) * k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{BezierCurve, LinearCurve};

    fn line() -> LinearCurve {
        LinearCurve::new(vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)])
    }

    #[test]
    fn test_uniform_table() {
        let mut table = DistanceTable::uniform(0.05);
        table.compute(&line()).unwrap();
        assert_eq!(table.len(), 21);
        assert_eq!(table.entries()[0], TableEntry { parameter: 0.0, distance: 0.0 });
        assert!((table.total_distance() - 2.0).abs() < 1e-5);

        let t = table.get_parameter_from_dist(1.0).unwrap();
        assert!((t - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_step_is_clamped() {
        let table = DistanceTable::uniform(0.5);
        assert_eq!(table.method(), TableMethod::Uniform { step: MAX_STEP });
        let table = DistanceTable::uniform(0.0);
        assert_eq!(table.method(), TableMethod::Uniform { step: MIN_STEP });
    }

    #[test]
    fn test_adaptive_straight_line() {
        let mut table = DistanceTable::adaptive(1.0, 0);
        table.compute(&line()).unwrap();
        assert_eq!(table.len(), 2);
        assert!((table.total_distance() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_adaptive_forced_division() {
        let mut table = DistanceTable::adaptive(1.0, 3);
        table.compute(&line()).unwrap();
        assert_eq!(table.len(), 9);
        let params: Vec<f32> = table.entries().iter().map(|e| e.parameter).collect();
        assert!(params.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_adaptive_refines_curved_regions() {
        let mut curve = BezierCurve::new();
        curve.push(Vec3::ZERO, Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0));
        curve.push(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 3.0, 0.0), Vec3::ZERO);

        let mut coarse = DistanceTable::adaptive(1.0, 0);
        coarse.compute(&curve).unwrap();
        let mut fine = DistanceTable::adaptive(0.01, 0);
        fine.compute(&curve).unwrap();
        assert!(fine.len() > coarse.len());

        let d: Vec<f32> = fine.entries().iter().map(|e| e.distance).collect();
        assert!(d.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_lookup_clamps() {
        let mut table = DistanceTable::uniform(0.05);
        table.compute(&line()).unwrap();
        assert_eq!(table.get_parameter_from_dist(-1.0).unwrap(), 0.0);
        assert!((table.get_parameter_from_dist(100.0).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_lookup_on_empty_table() {
        let table = DistanceTable::uniform(0.05);
        assert!(matches!(table.get_parameter_from_dist(0.5), Err(AnimError::TableTooSmall(0))));
        assert_eq!(table.total_distance(), 0.0);
    }

    #[test]
    fn test_invalid_curve_rejected() {
        let mut table = DistanceTable::uniform(0.05);
        let curve = LinearCurve::new(vec![Vec3::ZERO]);
        assert!(matches!(
            table.compute(&curve),
            Err(AnimError::NotEnoughPoints { required: 2, actual: 1 })
        ));
    }
}
