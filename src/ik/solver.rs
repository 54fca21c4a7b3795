//! 迭代式 IK 求解器
//!
//! 目标移动时进入 Processing，之后在同一帧内迭代到成功或用完迭代次数。
//! 目标静止时保持上次的结果，不重复求解。

use glam::Vec3;

use crate::config;
use crate::scene::{Component, NodeId, SceneGraph};
use crate::{AnimError, Result};

/// 求解状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus {
    /// 目标已移动，等待求解
    Processing,
    /// 末端进入阈值范围
    Success,
    /// 迭代次数用完仍未到达
    Failure,
}

/// 求解策略
#[derive(Clone, Debug, PartialEq)]
pub enum IkStrategy {
    /// 循环坐标下降：从末端向根逐个关节旋转
    Ccd,
    /// 前向 / 后向到达：先在位置空间迭代，最后换算成旋转
    Fabrik {
        /// 迭代用的关节位置缓冲
        positions: Vec<Vec3>,
    },
}

/// IK 求解器
#[derive(Clone, Debug)]
pub struct IkSolver {
    pub(super) strategy: IkStrategy,
    /// 关节链（根 → 末端）
    pub(super) joints: Vec<NodeId>,
    /// 关节到上一关节的距离，首项为 0
    pub(super) link_lengths: Vec<f32>,
    pub(super) iterations: u32,
    pub(super) threshold: f32,
    pub(super) min_joints: usize,
    pub(super) counter: u32,
    pub(super) status: SolverStatus,
    prev_target: Option<Vec3>,
}

impl IkSolver {
    pub fn new(strategy: IkStrategy) -> Self {
        let cfg = config::get_config();
        Self {
            strategy,
            joints: Vec::new(),
            link_lengths: Vec::new(),
            iterations: cfg.ik_iterations,
            threshold: cfg.ik_threshold,
            min_joints: cfg.ik_min_joints,
            counter: 0,
            status: SolverStatus::Success,
            prev_target: None,
        }
    }

    pub fn ccd() -> Self {
        Self::new(IkStrategy::Ccd)
    }

    pub fn fabrik() -> Self {
        Self::new(IkStrategy::Fabrik { positions: Vec::new() })
    }

    /// 编辑挂在 `owner` 上的求解器
    pub fn edit<R>(
        scene: &mut SceneGraph,
        owner: NodeId,
        f: impl FnOnce(&mut IkSolver, &mut SceneGraph) -> Result<R>,
    ) -> Result<R> {
        scene.with_components(owner, |components, scene| {
            let solver = components
                .iter_mut()
                .find_map(|c| match c {
                    Component::Ik(solver) => Some(solver),
                    _ => None,
                })
                .ok_or_else(|| AnimError::Scene("node has no IK component".to_string()))?;
            f(solver, scene)
        })?
    }

    // ========================================================================
    // 属性
    // ========================================================================

    #[inline]
    pub fn strategy(&self) -> &IkStrategy {
        &self.strategy
    }

    #[inline]
    pub fn status(&self) -> SolverStatus {
        self.status
    }

    #[inline]
    pub fn joints(&self) -> &[NodeId] {
        &self.joints
    }

    #[inline]
    pub fn link_lengths(&self) -> &[f32] {
        &self.link_lengths
    }

    /// 链的最大伸展长度
    pub fn reach(&self) -> f32 {
        self.link_lengths.iter().sum()
    }

    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations.max(1);
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.max(0.0);
    }

    /// 本次求解已用的迭代次数
    #[inline]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    // ========================================================================
    // 关节链编辑
    // ========================================================================

    /// 把已有节点加入链尾
    pub fn add_joint(&mut self, scene: &SceneGraph, node: NodeId) -> Result<()> {
        let pos = scene.world_position(node)?;
        let length = match self.joints.last() {
            Some(&prev) => (pos - scene.world_position(prev)?).length(),
            None => 0.0,
        };
        self.joints.push(node);
        self.link_lengths.push(length);
        self.status = SolverStatus::Processing;
        Ok(())
    }

    /// 新建关节节点并加入链尾：挂在上一关节下，沿 +X 偏移 1
    pub fn append_joint(&mut self, scene: &mut SceneGraph) -> Result<NodeId> {
        let name = format!("joint{}", self.joints.len());
        let (parent, offset) = match self.joints.last() {
            Some(&last) => (last, Vec3::X),
            None => (scene.root(), Vec3::ZERO),
        };
        let node = scene.create_node(name, parent)?;
        scene.set_local_position(node, offset)?;
        scene.update_world_from(node)?;
        self.add_joint(scene, node)?;
        Ok(node)
    }

    /// 创建 `count` 个关节组成的默认链
    pub fn default_chain(&mut self, scene: &mut SceneGraph, count: usize) -> Result<()> {
        for _ in 0..count {
            self.append_joint(scene)?;
        }
        log::info!("[IK] 创建默认关节链: {} 个关节", count);
        Ok(())
    }

    /// 删除链尾关节（连同节点），链至少保留 `min_joints` 个关节
    pub fn remove_joint(&mut self, scene: &mut SceneGraph) -> Result<bool> {
        if self.joints.len() <= self.min_joints {
            return Ok(false);
        }
        if let Some(last) = self.joints.pop() {
            self.link_lengths.pop();
            if scene.contains(last) {
                scene.remove_subtree(last)?;
            }
            self.status = SolverStatus::Processing;
        }
        Ok(true)
    }

    /// 清空关节链并删除关节节点
    pub fn clear_joints(&mut self, scene: &mut SceneGraph) -> Result<()> {
        for &joint in self.joints.iter().rev() {
            if scene.contains(joint) {
                scene.remove_subtree(joint)?;
            }
        }
        self.joints.clear();
        self.link_lengths.clear();
        self.status = SolverStatus::Success;
        Ok(())
    }

    /// 修改第 `index` 个关节到上一关节的长度（沿当前局部方向）
    pub fn set_link_length(&mut self, scene: &mut SceneGraph, index: usize, length: f32) -> Result<()> {
        if index == 0 || index >= self.joints.len() {
            return Err(AnimError::Ik(format!("invalid link index {}", index)));
        }
        if length <= 0.0 {
            return Err(AnimError::Ik(format!("link length must be positive, got {}", length)));
        }
        let joint = self.joints[index];
        let node = scene.get_mut(joint)?;
        let dir = node.local.translation.try_normalize().unwrap_or(Vec3::X);
        // 父节点逐轴缩放后沿 dir 的实际伸长
        let stretch = (scene.parent_world(joint)?.scale * dir).length();
        let local_length = if stretch > f32::EPSILON { length / stretch } else { length };
        scene.set_local_position(joint, dir * local_length)?;
        scene.update_world_from(joint)?;

        self.link_lengths[index] = length;
        self.status = SolverStatus::Processing;
        Ok(())
    }

    // ========================================================================
    // 求解
    // ========================================================================

    /// 每帧更新：`owner` 的世界位置即目标
    pub fn update(&mut self, owner: NodeId, scene: &mut SceneGraph) -> Result<SolverStatus> {
        let target = scene.world_position(owner)?;
        if self.prev_target != Some(target) {
            self.prev_target = Some(target);
            self.status = SolverStatus::Processing;
            self.counter = 0;
        }
        if self.status == SolverStatus::Processing && self.joints.len() >= 2 {
            self.solve(scene, target)?;
        }
        Ok(self.status)
    }

    /// 立即朝 `target` 求解
    pub fn solve(&mut self, scene: &mut SceneGraph, target: Vec3) -> Result<SolverStatus> {
        if self.joints.len() < 2 {
            return Err(AnimError::Ik(format!(
                "chain needs at least 2 joints, has {}",
                self.joints.len()
            )));
        }
        self.counter = 0;
        self.status = SolverStatus::Processing;

        let status = match &mut self.strategy {
            IkStrategy::Ccd => self.solve_ccd(scene, target)?,
            IkStrategy::Fabrik { positions } => {
                let mut buffer = std::mem::take(positions);
                let status = self.solve_fabrik(scene, target, &mut buffer);
                if let IkStrategy::Fabrik { positions } = &mut self.strategy {
                    *positions = buffer;
                }
                status?
            }
        };

        if config::get_config().debug_log {
            log::debug!("[IK] 求解结束: {:?}, 迭代 {} 次", status, self.counter);
        }
        Ok(status)
    }

    /// 末端关节世界位置
    pub fn end_effector(&self, scene: &SceneGraph) -> Result<Vec3> {
        let last = self
            .joints
            .last()
            .ok_or_else(|| AnimError::Ik("empty joint chain".to_string()))?;
        scene.world_position(*last)
    }

    /// 末端是否已在阈值范围内
    pub fn solution_found(&self, scene: &SceneGraph, target: Vec3) -> Result<bool> {
        let end = self.end_effector(scene)?;
        Ok(end.distance_squared(target) <= self.threshold * self.threshold)
    }
}
