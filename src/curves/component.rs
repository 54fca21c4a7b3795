//! 曲线组件
//!
//! 控制点与控制柄都是场景节点：
//! owner → point i → handle（Hermite 切线 / Bezier 控制点）
//! 每帧从节点世界坐标构造曲线快照，控制值变化时重建弧长表。

use glam::Vec3;

use super::controller::CurveController;
use super::distance_table::{DistanceTable, TableMethod};
use super::shapes::{BezierCurve, CatmullRomCurve, CurveShape, HermiteCurve, LinearCurve};
use super::Curve;
use crate::config;
use crate::scene::{Component, FrameContext, NodeId, SceneGraph, Transform};
use crate::{AnimError, Result};

/// 曲线种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurveKind {
    Linear,
    Hermite,
    CatmullRom,
    Bezier,
}

impl CurveKind {
    /// 是否带控制柄节点
    #[inline]
    pub fn has_handles(self) -> bool {
        matches!(self, CurveKind::Hermite | CurveKind::Bezier)
    }

    /// 编辑器添加控制点时的默认控制柄偏移
    pub fn default_handles(self) -> (Vec3, Vec3) {
        match self {
            CurveKind::Hermite => (Vec3::new(0.2, 0.0, 0.0), Vec3::new(0.2, 0.0, 0.0)),
            CurveKind::Bezier => (Vec3::new(0.2, 0.2, 0.0), Vec3::new(-0.2, 0.2, 0.0)),
            _ => (Vec3::ZERO, Vec3::ZERO),
        }
    }
}

/// 控制点的控制柄节点
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointHandles {
    /// 进入方向（Hermite 切线 1 / Bezier 控制点 1）
    pub incoming: Option<NodeId>,
    /// 离开方向（Hermite 切线 2 / Bezier 控制点 2）
    pub outgoing: Option<NodeId>,
}

/// 曲线组件
#[derive(Debug)]
pub struct CurveComponent {
    id: usize,
    kind: CurveKind,
    points: Vec<NodeId>,
    handles: Vec<PointHandles>,
    table: DistanceTable,
    controller: CurveController,
    follower: Option<NodeId>,
    /// 上次建表时的控制值
    last_controls: Vec<Vec3>,
    dirty: bool,
}

impl CurveComponent {
    pub fn new(kind: CurveKind, id: usize) -> Self {
        Self {
            id,
            kind,
            points: Vec::new(),
            handles: Vec::new(),
            table: DistanceTable::default(),
            controller: CurveController::new(),
            follower: None,
            last_controls: Vec::new(),
            dirty: true,
        }
    }

    /// 在场景根下创建曲线节点并挂载空曲线组件
    pub fn spawn(scene: &mut SceneGraph, kind: CurveKind) -> Result<NodeId> {
        let id = scene.next_curve_id();
        let owner = scene.create_root_child(format!("curve {}", id))?;
        scene.add_component(owner, CurveComponent::new(kind, id))?;
        log::info!("[Curve] 创建曲线 {} ({:?})", id, kind);
        Ok(owner)
    }

    /// 编辑挂在 `owner` 上的曲线组件
    pub fn edit<R>(
        scene: &mut SceneGraph,
        owner: NodeId,
        f: impl FnOnce(&mut CurveComponent, &mut SceneGraph) -> Result<R>,
    ) -> Result<R> {
        scene.with_components(owner, |components, scene| {
            let curve = components
                .iter_mut()
                .find_map(|c| match c {
                    Component::Curve(curve) => Some(curve),
                    _ => None,
                })
                .ok_or_else(|| AnimError::Scene("node has no curve component".to_string()))?;
            f(curve, scene)
        })?
    }

    // ========================================================================
    // 属性
    // ========================================================================

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> CurveKind {
        self.kind
    }

    #[inline]
    pub fn points(&self) -> &[NodeId] {
        &self.points
    }

    #[inline]
    pub fn handles(&self) -> &[PointHandles] {
        &self.handles
    }

    #[inline]
    pub fn table(&self) -> &DistanceTable {
        &self.table
    }

    #[inline]
    pub fn controller(&self) -> &CurveController {
        &self.controller
    }

    #[inline]
    pub fn controller_mut(&mut self) -> &mut CurveController {
        &mut self.controller
    }

    #[inline]
    pub fn follower(&self) -> Option<NodeId> {
        self.follower
    }

    pub fn set_follower(&mut self, follower: Option<NodeId>) {
        self.follower = follower;
    }

    /// 切换弧长表采样策略（下一帧重建）
    pub fn set_table_method(&mut self, method: TableMethod) {
        self.table.set_method(method);
        self.dirty = true;
    }

    // ========================================================================
    // 编辑
    // ========================================================================

    /// 添加控制点；带控制柄的曲线使用默认偏移
    pub fn add_point(&mut self, scene: &mut SceneGraph, owner: NodeId, position: Vec3) -> Result<NodeId> {
        let (first, second) = self.kind.default_handles();
        self.add_point_with_handles(scene, owner, position, first, second)
    }

    /// 添加控制点及控制柄（偏移相对控制点）
    ///
    /// - 首个点：以 `first` 创建离开方向控制柄
    /// - 之后的点：以 `second` 创建进入方向控制柄，
    ///   并以 `first` 为上一个点（非首点）补上离开方向控制柄
    pub fn add_point_with_handles(
        &mut self,
        scene: &mut SceneGraph,
        owner: NodeId,
        position: Vec3,
        first: Vec3,
        second: Vec3,
    ) -> Result<NodeId> {
        let index = self.points.len();
        let point = scene.create_node(format!("curve {} point {}", self.id, index), owner)?;
        scene.set_local_position(point, position)?;
        self.points.push(point);
        self.handles.push(PointHandles::default());

        if self.kind.has_handles() {
            let label = if self.kind == CurveKind::Hermite { "tangent" } else { "control" };

            if index > 1 {
                let prev = index - 1;
                let handle = scene.create_node(format!("point {} {} 2", prev, label), self.points[prev])?;
                scene.set_local_position(handle, first)?;
                self.handles[prev].outgoing = Some(handle);
            }

            if index == 0 {
                let handle = scene.create_node(format!("point {} {} 2", index, label), point)?;
                scene.set_local_position(handle, first)?;
                self.handles[index].outgoing = Some(handle);
            } else {
                let handle = scene.create_node(format!("point {} {} 1", index, label), point)?;
                scene.set_local_position(handle, second)?;
                self.handles[index].incoming = Some(handle);
            }
        }

        scene.update_world_from(owner)?;
        self.dirty = true;
        if config::get_config().debug_log {
            log::debug!("[Curve] 曲线 {} 添加控制点 {}", self.id, index);
        }
        Ok(point)
    }

    // ========================================================================
    // 求值
    // ========================================================================

    /// 用控制点节点当前的世界坐标构造曲线快照
    pub fn shape(&self, scene: &SceneGraph) -> Result<CurveShape> {
        let positions = self
            .points
            .iter()
            .map(|&p| scene.world_position(p))
            .collect::<Result<Vec<Vec3>>>()?;

        let handle_pos = |handle: Option<NodeId>, fallback: Vec3| -> Result<Vec3> {
            match handle {
                Some(h) => scene.world_position(h),
                None => Ok(fallback),
            }
        };

        Ok(match self.kind {
            CurveKind::Linear => CurveShape::Linear(LinearCurve::new(positions)),
            CurveKind::CatmullRom => CurveShape::CatmullRom(CatmullRomCurve::new(positions)),
            CurveKind::Hermite => {
                let mut curve = HermiteCurve::new();
                for (&p, h) in positions.iter().zip(&self.handles) {
                    curve.push(p, handle_pos(h.incoming, p)? - p, handle_pos(h.outgoing, p)? - p);
                }
                CurveShape::Hermite(curve)
            }
            CurveKind::Bezier => {
                let mut curve = BezierCurve::new();
                for (&p, h) in positions.iter().zip(&self.handles) {
                    curve.push(p, handle_pos(h.incoming, p)?, handle_pos(h.outgoing, p)?);
                }
                CurveShape::Bezier(curve)
            }
        })
    }

    /// 每帧更新：控制值变化时重建表，推进控制器，摆放跟随者
    pub(crate) fn update(&mut self, _owner: NodeId, scene: &mut SceneGraph, ctx: &FrameContext) -> Result<()> {
        let shape = self.shape(scene)?;
        if !shape.is_valid() {
            return Ok(());
        }

        let controls = shape.control_values();
        if self.dirty || controls != self.last_controls {
            self.table.compute(&shape)?;
            self.last_controls = controls;
            self.dirty = false;
        }

        let param = self.controller.advance(&self.table, ctx.dt)?;
        if let Some(follower) = self.follower {
            self.move_follower(scene, follower, &shape, param)?;
        }
        Ok(())
    }

    fn move_follower(
        &self,
        scene: &mut SceneGraph,
        follower: NodeId,
        shape: &CurveShape,
        param: f32,
    ) -> Result<()> {
        let current = scene.get(follower)?.world;
        let rotation = self
            .controller
            .frame(shape, param)
            .map_or(current.rotation, |frame| frame.rotation());
        let world = Transform::new(shape.position(param), rotation, current.scale);
        scene.set_world(follower, world)?;

        let factor = self.controller.animation_factor();
        if let Some(animator) = scene.get_mut(follower)?.animator_mut() {
            animator.set_anim_factor(factor);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Resources;

    fn spawn_with_points(scene: &mut SceneGraph, kind: CurveKind, points: &[Vec3]) -> NodeId {
        let owner = CurveComponent::spawn(scene, kind).unwrap();
        CurveComponent::edit(scene, owner, |curve, scene| {
            for &p in points {
                curve.add_point(scene, owner, p)?;
            }
            Ok(())
        })
        .unwrap();
        owner
    }

    #[test]
    fn test_point_naming_and_handles() {
        let mut scene = SceneGraph::new();
        let owner = spawn_with_points(
            &mut scene,
            CurveKind::Bezier,
            &[Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0)],
        );
        let curve = scene.get(owner).unwrap().curve().unwrap();
        assert_eq!(curve.points().len(), 3);
        assert_eq!(scene.get(curve.points()[1]).unwrap().name, "curve 0 point 1");

        let h = curve.handles();
        assert!(h[0].incoming.is_none() && h[0].outgoing.is_some());
        assert!(h[1].incoming.is_some() && h[1].outgoing.is_some());
        assert!(h[2].incoming.is_some() && h[2].outgoing.is_none());
    }

    #[test]
    fn test_hermite_tangents_from_handles() {
        let mut scene = SceneGraph::new();
        let owner = spawn_with_points(&mut scene, CurveKind::Hermite, &[Vec3::ZERO, Vec3::X]);
        let shape = scene.get(owner).unwrap().curve().unwrap().shape(&scene).unwrap();
        match shape {
            CurveShape::Hermite(c) => {
                assert!(c.tangents_out()[0].abs_diff_eq(Vec3::new(0.2, 0.0, 0.0), 1e-6));
                assert!(c.tangents_in()[1].abs_diff_eq(Vec3::new(0.2, 0.0, 0.0), 1e-6));
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_follower_moves_along_curve() {
        let mut scene = SceneGraph::new();
        let owner = spawn_with_points(
            &mut scene,
            CurveKind::Linear,
            &[Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0)],
        );
        let follower = scene.create_root_child("follower").unwrap();
        CurveComponent::edit(&mut scene, owner, |curve, _| {
            curve.set_follower(Some(follower));
            curve.controller_mut().set_rate_of_travel(1.0);
            curve.controller_mut().set_looping(false);
            Ok(())
        })
        .unwrap();

        let resources = Resources::new();
        let ctx = FrameContext::new(0.5, &resources);
        scene.update(&ctx);
        scene.update(&ctx);

        let node = scene.get(follower).unwrap();
        assert!((node.world_position() - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-3);
        assert!((node.world_rotation() * Vec3::Z).abs_diff_eq(Vec3::Z, 1e-4));
    }

    #[test]
    fn test_table_rebuilt_on_edit() {
        let mut scene = SceneGraph::new();
        let owner = spawn_with_points(&mut scene, CurveKind::Linear, &[Vec3::ZERO, Vec3::X]);
        let resources = Resources::new();
        let ctx = FrameContext::new(0.0, &resources);
        scene.update(&ctx);
        let before = scene.get(owner).unwrap().curve().unwrap().table().total_distance();
        assert!((before - 1.0).abs() < 1e-5);

        let last = scene.get(owner).unwrap().curve().unwrap().points()[1];
        scene.set_local_position(last, Vec3::new(3.0, 0.0, 0.0)).unwrap();
        scene.update_node_transforms();
        scene.update(&ctx);
        let after = scene.get(owner).unwrap().curve().unwrap().table().total_distance();
        assert!((after - 3.0).abs() < 1e-4);
    }
}
