//! 节点组件
//!
//! 组件种类是封闭的，用枚举分发而不是 trait object。

use super::context::FrameContext;
use super::node::NodeId;
use super::scene_graph::SceneGraph;
use crate::animation::Animator;
use crate::curves::CurveComponent;
use crate::ik::{IkSolver, TwoBoneIk};
use crate::Result;

/// 组件种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Curve,
    Ik,
    TwoBoneIk,
    Animator,
}

/// 挂载在节点上的组件
#[derive(Debug)]
pub enum Component {
    /// 曲线 + 跟随控制器
    Curve(CurveComponent),
    /// 迭代式 IK（CCD / FABRIK），挂载节点即目标
    Ik(IkSolver),
    /// 解析双骨骼 IK，挂载节点即根关节
    TwoBoneIk(TwoBoneIk),
    /// 动画播放 / 混合树
    Animator(Animator),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Curve(_) => ComponentKind::Curve,
            Component::Ik(_) => ComponentKind::Ik,
            Component::TwoBoneIk(_) => ComponentKind::TwoBoneIk,
            Component::Animator(_) => ComponentKind::Animator,
        }
    }

    /// 每帧更新，`owner` 为挂载节点
    pub(crate) fn update(
        &mut self,
        owner: NodeId,
        scene: &mut SceneGraph,
        ctx: &FrameContext,
    ) -> Result<()> {
        match self {
            Component::Curve(curve) => curve.update(owner, scene, ctx),
            Component::Ik(solver) => solver.update(owner, scene).map(|_| ()),
            Component::TwoBoneIk(solver) => solver.update(owner, scene, ctx),
            Component::Animator(animator) => animator.update(owner, scene, ctx),
        }
    }
}

impl From<CurveComponent> for Component {
    fn from(c: CurveComponent) -> Self {
        Component::Curve(c)
    }
}

impl From<IkSolver> for Component {
    fn from(c: IkSolver) -> Self {
        Component::Ik(c)
    }
}

impl From<TwoBoneIk> for Component {
    fn from(c: TwoBoneIk) -> Self {
        Component::TwoBoneIk(c)
    }
}

impl From<Animator> for Component {
    fn from(c: Animator) -> Self {
        Component::Animator(c)
    }
}
