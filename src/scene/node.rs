//! 场景节点
//!
//! 每个节点持有局部 / 世界变换、父子关系以及挂载的组件。
//! 节点之间只通过 `NodeId` 相互引用，所有权归 `SceneGraph` 的 arena。

use generational_arena::Index;
use glam::{Quat, Vec3};

use super::component::{Component, ComponentKind};
use super::transform::Transform;
use crate::animation::Animator;
use crate::curves::CurveComponent;
use crate::ik::{IkSolver, TwoBoneIk};

/// 节点句柄（带代数，节点删除后旧句柄失效）
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub struct NodeId(pub Index);

/// 节点在模型实例中的来源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelNodeRef {
    /// 模型资源索引
    pub model: usize,
    /// 实例编号
    pub instance: usize,
    /// 模型内节点索引，实例根节点为 None
    pub node_index: Option<usize>,
}

/// 场景节点
#[derive(Debug)]
pub struct Node {
    /// 节点名称
    pub name: String,
    /// 局部变换（相对父节点）
    pub local: Transform,
    /// 世界变换（由 SceneGraph 每帧重算）
    pub world: Transform,
    /// 模型实例来源
    pub model_ref: Option<ModelNodeRef>,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) components: Vec<Component>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local: Transform::IDENTITY,
            world: Transform::IDENTITY,
            model_ref: None,
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// 世界位置
    #[inline]
    pub fn world_position(&self) -> Vec3 {
        self.world.translation
    }

    /// 世界旋转
    #[inline]
    pub fn world_rotation(&self) -> Quat {
        self.world.rotation
    }

    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.components.iter().any(|c| c.kind() == kind)
    }

    // ========================================================================
    // 组件访问
    // ========================================================================

    pub fn curve(&self) -> Option<&CurveComponent> {
        self.components.iter().find_map(|c| match c {
            Component::Curve(curve) => Some(curve),
            _ => None,
        })
    }

    pub fn curve_mut(&mut self) -> Option<&mut CurveComponent> {
        self.components.iter_mut().find_map(|c| match c {
            Component::Curve(curve) => Some(curve),
            _ => None,
        })
    }

    pub fn ik(&self) -> Option<&IkSolver> {
        self.components.iter().find_map(|c| match c {
            Component::Ik(solver) => Some(solver),
            _ => None,
        })
    }

    pub fn ik_mut(&mut self) -> Option<&mut IkSolver> {
        self.components.iter_mut().find_map(|c| match c {
            Component::Ik(solver) => Some(solver),
            _ => None,
        })
    }

    pub fn two_bone_ik(&self) -> Option<&TwoBoneIk> {
        self.components.iter().find_map(|c| match c {
            Component::TwoBoneIk(solver) => Some(solver),
            _ => None,
        })
    }

    pub fn two_bone_ik_mut(&mut self) -> Option<&mut TwoBoneIk> {
        self.components.iter_mut().find_map(|c| match c {
            Component::TwoBoneIk(solver) => Some(solver),
            _ => None,
        })
    }

    pub fn animator(&self) -> Option<&Animator> {
        self.components.iter().find_map(|c| match c {
            Component::Animator(animator) => Some(animator),
            _ => None,
        })
    }

    pub fn animator_mut(&mut self) -> Option<&mut Animator> {
        self.components.iter_mut().find_map(|c| match c {
            Component::Animator(animator) => Some(animator),
            _ => None,
        })
    }
}
