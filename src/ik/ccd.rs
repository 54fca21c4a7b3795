//! CCD（循环坐标下降）
//!
//! 每轮从倒数第二个关节向根遍历：在关节自身坐标系中
//! 把 (关节 → 末端) 转到 (关节 → 目标)，旋转右乘到局部旋转上。

use glam::Vec3;

use super::rotation_between;
use super::solver::{IkSolver, SolverStatus};
use crate::scene::SceneGraph;
use crate::Result;

impl IkSolver {
    pub(super) fn solve_ccd(&mut self, scene: &mut SceneGraph, target: Vec3) -> Result<SolverStatus> {
        if self.solution_found(scene, target)? {
            self.status = SolverStatus::Success;
            return Ok(self.status);
        }

        let n = self.joints.len();
        let end_joint = self.joints[n - 1];
        while self.counter < self.iterations {
            for i in (0..n - 1).rev() {
                let joint = self.joints[i];
                let inv_link = scene.get(joint)?.world.inverse_matrix();
                let ik_vec = inv_link
                    .transform_point3(scene.world_position(end_joint)?)
                    .normalize_or_zero();
                let target_vec = inv_link.transform_point3(target).normalize_or_zero();

                if ik_vec.length_squared() < 1e-8 || target_vec.length_squared() < 1e-8 {
                    continue;
                }

                let delta = rotation_between(ik_vec, target_vec);
                let node = scene.get_mut(joint)?;
                node.local.rotation = (node.local.rotation * delta).normalize();
                scene.update_world_from(joint)?;

                if self.solution_found(scene, target)? {
                    self.status = SolverStatus::Success;
                    return Ok(self.status);
                }
            }
            self.counter += 1;
        }

        self.status = SolverStatus::Failure;
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ik::solver::tests::chain;

    #[test]
    fn test_ccd_reachable() {
        let mut solver = IkSolver::ccd();
        let mut scene = chain(&mut solver, 3);
        let target = Vec3::new(0.6, 0.8, 0.0);

        assert_eq!(solver.solve(&mut scene, target).unwrap(), SolverStatus::Success);
        let end = solver.end_effector(&scene).unwrap();
        assert!(end.distance(target) <= solver.threshold() + 1e-5);

        // 链长保持不变
        let j1 = scene.world_position(solver.joints()[1]).unwrap();
        assert!((j1.length() - 1.0).abs() < 1e-4);
        assert!(((end - j1).length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_ccd_unreachable() {
        let mut solver = IkSolver::ccd();
        let mut scene = chain(&mut solver, 3);
        let target = Vec3::new(0.0, 3.0, 0.0);

        assert_eq!(solver.solve(&mut scene, target).unwrap(), SolverStatus::Failure);
        assert_eq!(solver.counter(), solver.iterations());
        // 完全伸展并指向目标
        let end = solver.end_effector(&scene).unwrap();
        assert!(end.distance(Vec3::new(0.0, 2.0, 0.0)) < 0.05, "{:?}", end);
    }

    #[test]
    fn test_ccd_already_solved() {
        let mut solver = IkSolver::ccd();
        let mut scene = chain(&mut solver, 3);
        assert_eq!(
            solver.solve(&mut scene, Vec3::new(2.0, 0.0, 0.0)).unwrap(),
            SolverStatus::Success
        );
        assert_eq!(solver.counter(), 0);
    }
}
