//! 曲线跟随控制器
//!
//! 两种速度控制：
//! - ConstantSpeed: 每帧按固定速度累加弧长
//! - DistanceTime: 按归一化时间经过缓入 / 匀速 / 缓出函数映射到弧长
//!
//! 两种朝向：
//! - Frenet: 用一阶、二阶导数构造标架（曲率为零时退化为 FixedUp）
//! - FixedUp: 用世界 Y 轴作为参考上方向

use std::f32::consts::{FRAC_2_PI, FRAC_PI_2};

use glam::{Mat3, Quat, Vec3};

use super::{Curve, DistanceTable};
use crate::config;
use crate::Result;

/// 速度控制模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedControl {
    ConstantSpeed,
    DistanceTime,
}

/// 朝向计算模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameMode {
    Frenet,
    FixedUp,
}

/// 跟随者标架
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,
}

impl Frame {
    /// 局部 +Z 朝 forward，+Y 朝 up
    pub fn rotation(&self) -> Quat {
        Quat::from_mat3(&Mat3::from_cols(self.right, self.up, self.forward)).normalize()
    }
}

/// 曲线跟随控制器
#[derive(Clone, Debug)]
pub struct CurveController {
    /// 当前曲线参数
    param: f32,
    playing: bool,
    looping: bool,
    speed_control: SpeedControl,
    frame_mode: FrameMode,

    /// 匀速模式下设定的速度
    speed: f32,
    /// 当前速度：匀速模式下等于 speed，距离-时间模式下为上一帧的瞬时速度
    rate_of_travel: f32,
    /// 动画播放倍率 = rate / reference_rate
    reference_rate: f32,
    /// 走完曲线所需时间
    total_time: f32,
    /// 已走过的弧长
    travelled: f32,
    /// 距离-时间模式计时器
    timer: f32,
    prev_travelled: f32,

    /// 缓入结束 / 缓出开始（归一化时间）
    ease_t1: f32,
    ease_t2: f32,
}

impl Default for CurveController {
    fn default() -> Self {
        Self::new()
    }
}

impl CurveController {
    /// 按全局配置创建
    pub fn new() -> Self {
        let cfg = config::get_config();
        let mut controller = Self {
            param: 0.0,
            playing: true,
            looping: cfg.looping,
            speed_control: SpeedControl::ConstantSpeed,
            frame_mode: if cfg.frenet { FrameMode::Frenet } else { FrameMode::FixedUp },
            speed: cfg.rate_of_travel,
            rate_of_travel: cfg.rate_of_travel,
            reference_rate: cfg.reference_rate,
            total_time: cfg.total_time,
            travelled: 0.0,
            timer: 0.0,
            prev_travelled: 0.0,
            ease_t1: 0.0,
            ease_t2: 1.0,
        };
        controller.set_ease_points(cfg.ease_t1, cfg.ease_t2);
        controller
    }

    // ========================================================================
    // 属性
    // ========================================================================

    #[inline]
    pub fn param(&self) -> f32 {
        self.param
    }

    #[inline]
    pub fn travelled(&self) -> f32 {
        self.travelled
    }

    #[inline]
    pub fn timer(&self) -> f32 {
        self.timer
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    #[inline]
    pub fn speed_control(&self) -> SpeedControl {
        self.speed_control
    }

    /// 切换速度模式（会重置进度）
    pub fn set_speed_control(&mut self, mode: SpeedControl) {
        if self.speed_control != mode {
            self.speed_control = mode;
            self.reset();
        }
    }

    #[inline]
    pub fn frame_mode(&self) -> FrameMode {
        self.frame_mode
    }

    pub fn set_frame_mode(&mut self, mode: FrameMode) {
        self.frame_mode = mode;
    }

    #[inline]
    pub fn rate_of_travel(&self) -> f32 {
        self.rate_of_travel
    }

    /// 设置匀速模式速度
    pub fn set_rate_of_travel(&mut self, rate: f32) {
        self.speed = rate.max(0.0);
        self.rate_of_travel = self.speed;
    }

    #[inline]
    pub fn reference_rate(&self) -> f32 {
        self.reference_rate
    }

    pub fn set_reference_rate(&mut self, rate: f32) {
        self.reference_rate = rate;
    }

    #[inline]
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// 设置距离-时间模式下的总时间（会重置计时器）
    pub fn set_total_time(&mut self, total_time: f32) {
        self.total_time = total_time.max(0.0);
        self.timer = 0.0;
        self.prev_travelled = 0.0;
    }

    #[inline]
    pub fn ease_points(&self) -> (f32, f32) {
        (self.ease_t1, self.ease_t2)
    }

    /// 设置缓入 / 缓出分界点，保证 0 ≤ t1 ≤ t2 ≤ 1
    pub fn set_ease_points(&mut self, t1: f32, t2: f32) {
        let t1 = t1.clamp(0.0, 1.0);
        self.ease_t1 = t1;
        self.ease_t2 = t2.clamp(t1, 1.0);
    }

    /// 跟随者动画播放倍率
    pub fn animation_factor(&self) -> f32 {
        if self.reference_rate.abs() > f32::EPSILON {
            self.rate_of_travel / self.reference_rate
        } else {
            1.0
        }
    }

    /// 回到曲线起点
    pub fn reset(&mut self) {
        self.param = 0.0;
        self.travelled = 0.0;
        self.timer = 0.0;
        self.prev_travelled = 0.0;
        // 距离-时间模式会覆盖 rate_of_travel，这里恢复设定速度
        self.rate_of_travel = self.speed;
        if self.speed_control == SpeedControl::DistanceTime {
            self.total_time = config::get_config().total_time;
        }
    }

    // ========================================================================
    // 推进
    // ========================================================================

    /// 推进一帧，返回新的曲线参数
    pub fn advance(&mut self, table: &DistanceTable, dt: f32) -> Result<f32> {
        match self.speed_control {
            SpeedControl::ConstantSpeed => self.constant_speed_update(table, dt),
            SpeedControl::DistanceTime => self.distance_time_update(table, dt),
        }
    }

    fn constant_speed_update(&mut self, table: &DistanceTable, dt: f32) -> Result<f32> {
        let total = table.total_distance();
        self.rate_of_travel = self.speed;
        if self.rate_of_travel > f32::EPSILON {
            self.total_time = total / self.rate_of_travel;
        }

        if self.playing {
            if self.travelled <= total {
                self.travelled += self.rate_of_travel * dt;
            }
            if self.looping && self.travelled > total {
                self.travelled = 0.0;
            }
        }

        self.param = table.get_parameter_from_dist(self.travelled)?;
        Ok(self.param)
    }

    fn distance_time_update(&mut self, table: &DistanceTable, dt: f32) -> Result<f32> {
        let total = table.total_distance();

        if self.playing {
            if self.timer <= self.total_time {
                self.timer += dt;
            }
            if self.looping && self.timer > self.total_time {
                self.timer = 0.0;
                self.prev_travelled = 0.0;
            }
        }

        let tn = if self.total_time > f32::EPSILON {
            (self.timer / self.total_time).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.travelled = self.distance_time_function(tn) * total;
        self.param = table.get_parameter_from_dist(self.travelled)?;

        if dt > f32::EPSILON {
            self.rate_of_travel = (self.travelled - self.prev_travelled) / dt;
        }
        self.prev_travelled = self.travelled;
        Ok(self.param)
    }

    /// 归一化时间 → 归一化距离
    ///
    /// [0,t1] 正弦缓入，[t1,t2] 匀速，[t2,1] 正弦缓出，分界处一阶连续，
    /// 整体除以归一化因子使 f(1) = 1。
    pub fn distance_time_function(&self, tn: f32) -> f32 {
        let (t1, t2) = (self.ease_t1, self.ease_t2);
        let tn = tn.clamp(0.0, 1.0);
        let linear = |t: f32| (t - t1) + t1 * FRAC_2_PI;

        let value = if tn < t1 {
            t1 * FRAC_2_PI * ((tn / t1) * FRAC_PI_2 - FRAC_PI_2).sin() + t1 * FRAC_2_PI
        } else if tn <= t2 || t2 >= 1.0 {
            linear(tn)
        } else {
            (1.0 - t2) * FRAC_2_PI * (((tn - t2) / (1.0 - t2)) * FRAC_PI_2).sin() + linear(t2)
        };

        let normalizer = t1 * FRAC_2_PI + (t2 - t1) + (1.0 - t2) * FRAC_2_PI;
        if normalizer > f32::EPSILON {
            value / normalizer
        } else {
            tn
        }
    }

    // ========================================================================
    // 朝向
    // ========================================================================

    /// 计算参数 t 处的标架；切线为零时返回 None
    pub fn frame<C: Curve + ?Sized>(&self, curve: &C, t: f32) -> Option<Frame> {
        let position = curve.position(t);
        let forward = curve.first_derivative(t).try_normalize()?;

        if self.frame_mode == FrameMode::Frenet {
            let binormal = curve
                .second_derivative(t)
                .try_normalize()
                .and_then(|second| forward.cross(second).try_normalize());
            if let Some(up) = binormal {
                let right = up.cross(forward).normalize();
                return Some(Frame { position, forward, up, right });
            }
        }

        // 固定上方向；切线与 Y 平行时改用 Z 作为参考
        let side = forward
            .cross(Vec3::Y)
            .try_normalize()
            .or_else(|| forward.cross(Vec3::Z).try_normalize())?;
        let up = side.cross(forward).normalize();
        let right = up.cross(forward).normalize();
        Some(Frame { position, forward, up, right })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::LinearCurve;

    fn controller() -> CurveController {
        let mut c = CurveController::new();
        c.set_looping(true);
        c.set_rate_of_travel(1.0);
        c.set_ease_points(0.5, 0.5);
        c
    }

    fn table(length: f32) -> DistanceTable {
        let mut table = DistanceTable::uniform(0.05);
        table
            .compute(&LinearCurve::new(vec![Vec3::ZERO, Vec3::new(length, 0.0, 0.0)]))
            .unwrap();
        table
    }

    #[test]
    fn test_distance_time_function_endpoints() {
        let mut c = controller();
        for (t1, t2) in [(0.5, 0.5), (0.2, 0.8), (0.0, 1.0), (0.0, 0.3), (0.7, 1.0)] {
            c.set_ease_points(t1, t2);
            assert!(c.distance_time_function(0.0).abs() < 1e-5, "({}, {})", t1, t2);
            assert!((c.distance_time_function(1.0) - 1.0).abs() < 1e-5, "({}, {})", t1, t2);
        }
    }

    #[test]
    fn test_distance_time_function_monotonic() {
        let mut c = controller();
        c.set_ease_points(0.3, 0.6);
        let mut prev = 0.0;
        for i in 1..=100 {
            let v = c.distance_time_function(i as f32 / 100.0);
            assert!(v >= prev - 1e-6);
            prev = v;
        }
    }

    #[test]
    fn test_constant_speed_advance() {
        let mut c = controller();
        let table = table(2.0);
        let t = c.advance(&table, 0.5).unwrap();
        assert!((c.travelled() - 0.5).abs() < 1e-6);
        assert!((t - 0.25).abs() < 1e-4);
        assert!((c.total_time() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_constant_speed_loops() {
        let mut c = controller();
        let table = table(1.0);
        for _ in 0..5 {
            c.advance(&table, 0.3).unwrap();
        }
        // 0.3 * 4 = 1.2 > 1 时回到起点，第 5 帧从 0 开始
        assert!(c.travelled() < 1.0);
    }

    #[test]
    fn test_constant_speed_clamps_without_loop() {
        let mut c = controller();
        c.set_looping(false);
        let table = table(1.0);
        for _ in 0..10 {
            c.advance(&table, 0.3).unwrap();
        }
        assert!((c.param() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_time_mode() {
        let mut c = controller();
        c.set_speed_control(SpeedControl::DistanceTime);
        c.set_total_time(2.0);
        let table = table(4.0);

        c.advance(&table, 1.0).unwrap();
        // 对称缓动在一半时间时走完一半距离
        assert!((c.travelled() - 2.0).abs() < 1e-3);
        assert!(c.rate_of_travel() > 0.0);
    }

    #[test]
    fn test_switch_to_constant_speed_after_finished_run() {
        let mut c = CurveController::new();
        let set_rate = c.rate_of_travel();
        c.set_looping(false);
        c.set_speed_control(SpeedControl::DistanceTime);
        let table = table(10.0);

        for _ in 0..2000 {
            c.advance(&table, 1.0 / 60.0).unwrap();
        }
        // 停在终点后瞬时速度为零
        assert!(c.rate_of_travel().abs() < 1e-6);
        assert!((c.travelled() - 10.0).abs() < 1e-3);

        c.set_speed_control(SpeedControl::ConstantSpeed);
        assert_eq!(c.travelled(), 0.0);
        assert_eq!(c.rate_of_travel(), set_rate);
        for _ in 0..100 {
            c.advance(&table, 1.0 / 60.0).unwrap();
        }
        assert!(c.travelled() > 0.0);
        assert_eq!(c.rate_of_travel(), set_rate);
    }

    #[test]
    fn test_reset_after_mode_switch_keeps_set_speed() {
        let mut c = controller();
        c.set_rate_of_travel(2.5);
        let table = table(4.0);

        c.set_speed_control(SpeedControl::DistanceTime);
        c.set_total_time(2.0);
        c.advance(&table, 0.5).unwrap();
        assert!(c.rate_of_travel() != 2.5);

        c.set_speed_control(SpeedControl::ConstantSpeed);
        assert_eq!(c.param(), 0.0);
        assert_eq!(c.timer(), 0.0);
        assert_eq!(c.rate_of_travel(), 2.5);
        c.advance(&table, 0.4).unwrap();
        assert!((c.travelled() - 1.0).abs() < 1e-5);

        // 再切回距离-时间模式时总时间取配置值
        c.set_speed_control(SpeedControl::DistanceTime);
        assert_eq!(c.travelled(), 0.0);
        assert_eq!(c.total_time(), config::get_config().total_time);
    }

    #[test]
    fn test_fixed_up_frame() {
        let c = controller();
        let curve = LinearCurve::new(vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0)]);
        let frame = c.frame(&curve, 0.5).unwrap();
        assert!(frame.forward.abs_diff_eq(Vec3::Z, 1e-6));
        assert!(frame.up.abs_diff_eq(Vec3::Y, 1e-6));
        assert!((frame.rotation() * Vec3::Z).abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn test_frenet_falls_back_on_straight_line() {
        let mut c = controller();
        c.set_frame_mode(FrameMode::Frenet);
        let curve = LinearCurve::new(vec![Vec3::ZERO, Vec3::X]);
        let frame = c.frame(&curve, 0.5).unwrap();
        assert!(frame.up.abs_diff_eq(Vec3::Y, 1e-6));
        assert!((frame.rotation() * Vec3::Z).abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_vertical_tangent_frame() {
        let c = controller();
        let curve = LinearCurve::new(vec![Vec3::ZERO, Vec3::Y]);
        let frame = c.frame(&curve, 0.5).unwrap();
        assert!(frame.forward.abs_diff_eq(Vec3::Y, 1e-6));
        assert!(frame.up.dot(frame.forward).abs() < 1e-6);
    }
}
