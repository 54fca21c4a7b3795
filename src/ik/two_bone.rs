//! 解析双骨骼 IK（XY 平面）
//!
//! 关节层级：owner → j1 → j2，局部偏移分别为 (d1,0,0) 与 (d2,0,0)。
//! 余弦定理求 θ2，再由目标方向求 θ1；目标超出 [|d1-d2|, d1+d2] 时不做修改。

use glam::{Quat, Vec2, Vec3};

use crate::scene::{Component, FrameContext, NodeId, SceneGraph};
use crate::{AnimError, Result};

/// 双骨骼 IK
#[derive(Clone, Debug)]
pub struct TwoBoneIk {
    /// 第一段骨骼长度
    d1: f32,
    /// 第二段骨骼长度
    d2: f32,
    /// (j1, j2)
    joints: Option<(NodeId, NodeId)>,
    /// 根关节平面内的目标
    target: Vec2,
    reachable: bool,
}

impl TwoBoneIk {
    pub fn new(d1: f32, d2: f32) -> Result<Self> {
        Self::check_lengths(d1, d2)?;
        Ok(Self {
            d1,
            d2,
            joints: None,
            target: Vec2::new(d1 + d2, 0.0),
            reachable: true,
        })
    }

    fn check_lengths(d1: f32, d2: f32) -> Result<()> {
        if d1 <= 0.0 || d2 <= 0.0 {
            return Err(AnimError::Ik(format!(
                "bone lengths must be positive, got ({}, {})",
                d1, d2
            )));
        }
        Ok(())
    }

    /// 在场景根下创建根关节并挂载组件
    pub fn spawn(scene: &mut SceneGraph, d1: f32, d2: f32) -> Result<NodeId> {
        let mut ik = Self::new(d1, d2)?;
        let owner = scene.create_root_child("two bone ik")?;
        ik.attach(scene, owner)?;
        scene.add_component(owner, ik)?;
        log::info!("[IK] 创建双骨骼 IK: d1={:.3}, d2={:.3}", d1, d2);
        Ok(owner)
    }

    /// 编辑挂在 `owner` 上的双骨骼 IK
    pub fn edit<R>(
        scene: &mut SceneGraph,
        owner: NodeId,
        f: impl FnOnce(&mut TwoBoneIk, &mut SceneGraph) -> Result<R>,
    ) -> Result<R> {
        scene.with_components(owner, |components, scene| {
            let ik = components
                .iter_mut()
                .find_map(|c| match c {
                    Component::TwoBoneIk(ik) => Some(ik),
                    _ => None,
                })
                .ok_or_else(|| AnimError::Scene("node has no two-bone IK component".to_string()))?;
            f(ik, scene)
        })?
    }

    /// 在 `owner` 下创建 j1、j2
    pub fn attach(&mut self, scene: &mut SceneGraph, owner: NodeId) -> Result<()> {
        let j1 = scene.create_node("joint1", owner)?;
        scene.set_local_position(j1, Vec3::new(self.d1, 0.0, 0.0))?;
        let j2 = scene.create_node("joint2", j1)?;
        scene.set_local_position(j2, Vec3::new(self.d2, 0.0, 0.0))?;
        scene.update_world_from(owner)?;
        self.joints = Some((j1, j2));
        Ok(())
    }

    #[inline]
    pub fn link_lengths(&self) -> (f32, f32) {
        (self.d1, self.d2)
    }

    #[inline]
    pub fn joints(&self) -> Option<(NodeId, NodeId)> {
        self.joints
    }

    #[inline]
    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    /// 上次求解时目标是否可达
    #[inline]
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// 修改骨骼长度并同步关节节点
    pub fn set_link_lengths(&mut self, scene: &mut SceneGraph, d1: f32, d2: f32) -> Result<()> {
        Self::check_lengths(d1, d2)?;
        self.d1 = d1;
        self.d2 = d2;
        if let Some((j1, j2)) = self.joints {
            scene.set_local_position(j1, Vec3::new(d1, 0.0, 0.0))?;
            scene.set_local_position(j2, Vec3::new(d2, 0.0, 0.0))?;
            scene.update_world_from(j1)?;
        }
        Ok(())
    }

    /// 求 (θ1, θ2)；目标不可达时返回 None
    pub fn solve_angles(d1: f32, d2: f32, target: Vec2) -> Option<(f32, f32)> {
        let cos2 = (target.length_squared() - d1 * d1 - d2 * d2) / (2.0 * d1 * d2);
        if !(-1.0..=1.0).contains(&cos2) {
            return None;
        }
        let theta2 = cos2.acos();
        let a = d1 + d2 * cos2;
        let b = d2 * theta2.sin();
        let theta1 = (target.y * a - target.x * b).atan2(target.x * a + target.y * b);
        Some((theta1, theta2))
    }

    /// 把世界坐标投影到根关节所在的 XY 平面（相对根关节位置）
    pub fn project_target(scene: &SceneGraph, owner: NodeId, world: Vec3) -> Result<Vec2> {
        let local = scene.parent_world(owner)?.inverse_matrix().transform_point3(world);
        let root = scene.get(owner)?.local.translation;
        Ok((local - root).truncate())
    }

    /// 按当前目标设置关节旋转，返回目标是否可达
    pub fn move_joints(&mut self, scene: &mut SceneGraph, owner: NodeId) -> Result<bool> {
        let Some((theta1, theta2)) = Self::solve_angles(self.d1, self.d2, self.target) else {
            self.reachable = false;
            return Ok(false);
        };
        let (j1, _) = self
            .joints
            .ok_or_else(|| AnimError::Ik("two-bone IK is not attached".to_string()))?;

        scene.get_mut(owner)?.local.rotation = Quat::from_rotation_z(theta1);
        scene.get_mut(j1)?.local.rotation = Quat::from_rotation_z(theta2);
        scene.update_world_from(owner)?;
        self.reachable = true;
        Ok(true)
    }

    /// 每帧更新：指针按下时以指针位置为目标
    pub(crate) fn update(&mut self, owner: NodeId, scene: &mut SceneGraph, ctx: &FrameContext) -> Result<()> {
        if let (true, Some(world)) = (ctx.input.pointer_down, ctx.input.pointer_world) {
            self.target = Self::project_target(scene, owner, world)?;
        }
        self.move_joints(scene, owner)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{InputState, Resources};

    fn forward_kinematics(d1: f32, d2: f32, theta1: f32, theta2: f32) -> Vec2 {
        Vec2::new(
            d1 * theta1.cos() + d2 * (theta1 + theta2).cos(),
            d1 * theta1.sin() + d2 * (theta1 + theta2).sin(),
        )
    }

    #[test]
    fn test_solve_angles_reachability() {
        assert!(TwoBoneIk::solve_angles(1.0, 1.0, Vec2::new(2.1, 0.0)).is_none());
        assert!(TwoBoneIk::solve_angles(1.0, 1.0, Vec2::new(1.5, 0.0)).is_some());
        // 比 |d1 - d2| 更近也不可达
        assert!(TwoBoneIk::solve_angles(2.0, 0.5, Vec2::new(0.2, 0.0)).is_none());
    }

    #[test]
    fn test_solve_angles_forward_kinematics() {
        for target in [Vec2::new(1.5, 0.0), Vec2::new(0.3, 1.2), Vec2::new(-1.0, -0.5)] {
            let (t1, t2) = TwoBoneIk::solve_angles(1.0, 1.0, target).unwrap();
            let reached = forward_kinematics(1.0, 1.0, t1, t2);
            assert!((reached - target).length() < 1e-4, "{:?} -> {:?}", target, reached);
        }
    }

    #[test]
    fn test_move_joints_in_scene() {
        let mut scene = SceneGraph::new();
        let owner = TwoBoneIk::spawn(&mut scene, 1.0, 1.0).unwrap();
        let j2 = TwoBoneIk::edit(&mut scene, owner, |ik, scene| {
            ik.set_target(Vec2::new(0.5, 1.2));
            assert!(ik.move_joints(scene, owner)?);
            Ok(ik.joints().map(|(_, j2)| j2))
        })
        .unwrap()
        .unwrap();

        let end = scene.world_position(j2).unwrap();
        assert!((end - Vec3::new(0.5, 1.2, 0.0)).length() < 1e-4, "{:?}", end);
    }

    #[test]
    fn test_unreachable_leaves_pose() {
        let mut scene = SceneGraph::new();
        let owner = TwoBoneIk::spawn(&mut scene, 1.0, 1.0).unwrap();
        let before = scene.get(owner).unwrap().local;
        TwoBoneIk::edit(&mut scene, owner, |ik, scene| {
            ik.set_target(Vec2::new(2.1, 0.0));
            assert!(!ik.move_joints(scene, owner)?);
            assert!(!ik.is_reachable());
            Ok(())
        })
        .unwrap();
        assert_eq!(scene.get(owner).unwrap().local, before);
    }

    #[test]
    fn test_pointer_drives_target() {
        let mut scene = SceneGraph::new();
        let owner = TwoBoneIk::spawn(&mut scene, 1.0, 1.0).unwrap();
        scene.set_local_position(owner, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        scene.update_node_transforms();

        let resources = Resources::new();
        let ctx = FrameContext::new(1.0 / 60.0, &resources).with_input(InputState {
            pointer_down: true,
            pointer_world: Some(Vec3::new(1.0, 2.5, 3.0)),
        });
        scene.update(&ctx);

        let ik = scene.get(owner).unwrap().two_bone_ik().unwrap();
        assert!(ik.target().abs_diff_eq(Vec2::new(0.0, 1.5), 1e-5));
        assert!(ik.is_reachable());
        let (_, j2) = ik.joints().unwrap();
        let end = scene.world_position(j2).unwrap();
        assert!((end - Vec3::new(1.0, 2.5, 0.0)).length() < 1e-4, "{:?}", end);
    }

    #[test]
    fn test_invalid_lengths() {
        assert!(TwoBoneIk::new(0.0, 1.0).is_err());
    }
}
