//! FABRIK（前向 / 后向到达）
//!
//! 1. 前向：末端放到目标，沿链向根按链长拉回
//! 2. 后向：根放回原位，沿链向末端按链长推出
//! 3. 收敛后逐关节把旧的子关节方向转到新方向（世界空间），再反算局部变换

use glam::Vec3;

use super::rotation_between;
use super::solver::{IkSolver, SolverStatus};
use crate::scene::SceneGraph;
use crate::Result;

/// 单位方向；两点重合时沿用 `fallback`
#[inline]
fn direction(from: Vec3, to: Vec3, fallback: Vec3) -> Vec3 {
    (to - from).try_normalize().unwrap_or(fallback)
}

impl IkSolver {
    pub(super) fn solve_fabrik(
        &mut self,
        scene: &mut SceneGraph,
        target: Vec3,
        positions: &mut Vec<Vec3>,
    ) -> Result<SolverStatus> {
        let n = self.joints.len();
        positions.clear();
        for &joint in &self.joints {
            positions.push(scene.world_position(joint)?);
        }
        let original = positions.clone();
        let root = positions[0];
        let threshold_sq = self.threshold * self.threshold;

        let mut converged = positions[n - 1].distance_squared(target) <= threshold_sq;
        while !converged && self.counter < self.iterations {
            self.counter += 1;

            // 前向
            positions[n - 1] = target;
            for i in (1..n).rev() {
                let fallback = direction(original[i], original[i - 1], -Vec3::X);
                let dir = direction(positions[i], positions[i - 1], fallback);
                positions[i - 1] = positions[i] + dir * self.link_lengths[i];
            }

            // 后向
            positions[0] = root;
            for i in 0..n - 1 {
                let fallback = direction(original[i], original[i + 1], Vec3::X);
                let dir = direction(positions[i], positions[i + 1], fallback);
                positions[i + 1] = positions[i] + dir * self.link_lengths[i + 1];
            }

            converged = positions[n - 1].distance_squared(target) <= threshold_sq;
        }

        // 位置 → 旋转
        for i in 0..n - 1 {
            let joint = self.joints[i];
            let joint_pos = scene.world_position(joint)?;
            let child_pos = scene.world_position(self.joints[i + 1])?;

            let (Some(from), Some(to)) = (
                (child_pos - joint_pos).try_normalize(),
                (positions[i + 1] - joint_pos).try_normalize(),
            ) else {
                continue;
            };

            let mut world = scene.get(joint)?.world;
            world.rotation = (rotation_between(from, to) * world.rotation).normalize();
            scene.set_world(joint, world)?;
        }

        self.status = if converged || self.solution_found(scene, target)? {
            SolverStatus::Success
        } else {
            SolverStatus::Failure
        };
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ik::solver::tests::chain;

    #[test]
    fn test_fabrik_reachable() {
        let mut solver = IkSolver::fabrik();
        let mut scene = chain(&mut solver, 3);
        let target = Vec3::new(0.6, 0.8, 0.0);

        assert_eq!(solver.solve(&mut scene, target).unwrap(), SolverStatus::Success);
        let end = solver.end_effector(&scene).unwrap();
        assert!(end.distance(target) <= solver.threshold() + 1e-3, "{:?}", end);

        // 根不动，链长保持
        let root = scene.world_position(solver.joints()[0]).unwrap();
        assert!(root.abs_diff_eq(Vec3::ZERO, 1e-6));
        let j1 = scene.world_position(solver.joints()[1]).unwrap();
        assert!((j1.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_fabrik_unreachable() {
        let mut solver = IkSolver::fabrik();
        let mut scene = chain(&mut solver, 3);
        let target = Vec3::new(0.0, 3.0, 0.0);

        assert_eq!(solver.solve(&mut scene, target).unwrap(), SolverStatus::Failure);
        let end = solver.end_effector(&scene).unwrap();
        assert!(end.distance(Vec3::new(0.0, 2.0, 0.0)) < 1e-2, "{:?}", end);
    }

    #[test]
    fn test_fabrik_long_chain() {
        let mut solver = IkSolver::fabrik();
        let mut scene = chain(&mut solver, 5);
        let target = Vec3::new(1.0, 2.0, -1.0);

        assert_eq!(solver.solve(&mut scene, target).unwrap(), SolverStatus::Success);
        match solver.strategy() {
            crate::ik::IkStrategy::Fabrik { positions } => assert_eq!(positions.len(), 5),
            other => panic!("unexpected strategy {:?}", other),
        }
    }
}
