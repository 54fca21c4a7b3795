//! 动画引擎调参
//!
//! IK 求解、弧长表、曲线跟随与片段播放的默认参数集中在这里。
//! 组件创建时拷贝一份快照，运行中修改配置不会影响已存在的求解器、
//! 控制器和播放器；控制器 reset 时会重新读取总时间。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 动画引擎参数表，按子系统分组
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // ========== IK ==========
    /// 迭代式 IK 每次求解的最大迭代次数，默认 30
    pub ik_iterations: u32,
    /// 末端与目标的距离阈值，默认 0.01
    pub ik_threshold: f32,
    /// 迭代式 IK 链最少关节数，默认 3
    pub ik_min_joints: usize,

    // ========== 弧长表 ==========
    /// 均匀采样步长，默认 0.05（限制在 [0.001, 0.05]）
    pub table_step: f32,
    /// 自适应细分的初始误差，默认 1.0（每层减半）
    pub table_epsilon: f32,
    /// 自适应细分的强制细分层数，默认 5
    pub table_force_division: u32,
    /// 是否默认使用自适应细分，默认 false
    pub table_adaptive: bool,

    // ========== 曲线控制器 ==========
    /// 匀速模式下的速度（单位/秒），默认 1.0
    pub rate_of_travel: f32,
    /// 动画播放速率换算的参考速度，默认 0.7
    pub reference_rate: f32,
    /// 距离-时间模式下走完整条曲线的时间（秒），默认 5.0
    pub total_time: f32,
    /// 缓入结束点（归一化时间），默认 0.5
    pub ease_t1: f32,
    /// 缓出开始点（归一化时间），默认 0.5
    pub ease_t2: f32,
    /// 是否循环走曲线，默认 true
    pub looping: bool,
    /// 是否使用 Frenet 标架（否则使用固定上方向），默认 false
    pub frenet: bool,

    // ========== 动画 ==========
    /// 旋转采样后是否归一化（nlerp），默认 false
    pub nlerp: bool,
    /// 动画是否循环播放，默认 true
    pub loop_playback: bool,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // ====== IK ======
            // 迭代次数越大越容易收敛，但会阻塞当前帧
            ik_iterations: 30,
            ik_threshold: 0.01,
            ik_min_joints: 3,

            // ====== 弧长表 ======
            // 步长越小 → 表越大，弧长查询越精确
            table_step: 0.05,
            table_epsilon: 1.0,
            table_force_division: 5,
            table_adaptive: false,

            // ====== 曲线控制器 ======
            rate_of_travel: 1.0,
            // 跟随者的行走动画在此速度下以 1.0 倍速播放
            reference_rate: 0.7,
            total_time: 5.0,
            ease_t1: 0.5,
            ease_t2: 0.5,
            looping: true,
            frenet: false,

            // ====== 动画 ======
            nlerp: false,
            loop_playback: true,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

/// 进程内共享的参数表
static ENGINE_CONFIG: Lazy<RwLock<EngineConfig>> = Lazy::new(|| {
    RwLock::new(EngineConfig::default())
});

/// 读取参数快照，锁中毒时沿用其中数据
pub fn get_config() -> EngineConfig {
    ENGINE_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 整表替换，之后创建的 IK 链、曲线和播放器使用新参数
pub fn set_config(config: EngineConfig) {
    *ENGINE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 只改动部分字段
pub fn update_config(edit: impl FnOnce(&mut EngineConfig)) {
    let mut config = ENGINE_CONFIG.write().unwrap_or_else(|e| e.into_inner());
    edit(&mut *config);
}

/// 恢复出厂参数
pub fn reset_config() {
    *ENGINE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = EngineConfig::default();
}
