//! 场景图 - 节点 arena + 层级变换传播
//!
//! 每帧流程：
//! 1. 按前序遍历更新所有组件（组件只写局部变换）
//! 2. 从根节点向下重算世界变换：world = parent.world ∘ local

use std::collections::HashMap;

use generational_arena::Arena;
use glam::{Mat4, Vec3};

use super::component::Component;
use super::context::FrameContext;
use super::model::Resources;
use super::node::{ModelNodeRef, Node, NodeId};
use super::transform::Transform;
use crate::{AnimError, Result};

/// 场景图
#[derive(Debug)]
pub struct SceneGraph {
    nodes: Arena<Node>,
    root: NodeId,
    /// 模型实例注册表：model -> instance -> (节点索引 -> 场景节点)
    instances: HashMap<usize, Vec<HashMap<usize, NodeId>>>,
    /// 曲线编号计数器（用于生成节点名称）
    curve_counter: usize,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let root = NodeId(nodes.insert(Node::new("Root Node")));
        Self {
            nodes,
            root,
            instances: HashMap::new(),
            curve_counter: 0,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// 获取节点，不存在时返回错误
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(AnimError::NodeNotFound(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(AnimError::NodeNotFound(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// 世界位置
    pub fn world_position(&self, id: NodeId) -> Result<Vec3> {
        Ok(self.get(id)?.world.translation)
    }

    /// 父节点世界变换，没有父节点时为单位变换
    pub fn parent_world(&self, id: NodeId) -> Result<Transform> {
        let node = self.get(id)?;
        Ok(node
            .parent
            .and_then(|p| self.node(p))
            .map(|p| p.world)
            .unwrap_or(Transform::IDENTITY))
    }

    // ========================================================================
    // 层级编辑
    // ========================================================================

    /// 创建节点并挂到 `parent` 下
    pub fn create_node(&mut self, name: impl Into<String>, parent: NodeId) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(AnimError::NodeNotFound(parent));
        }
        let id = NodeId(self.nodes.insert(Node::new(name)));
        self.attach(parent, id);
        Ok(id)
    }

    /// 创建挂在场景根下的节点
    pub fn create_root_child(&mut self, name: impl Into<String>) -> Result<NodeId> {
        let root = self.root;
        self.create_node(name, root)
    }

    /// 把 `child` 挂到 `parent` 下（会先从旧父节点移除）
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.contains(parent) {
            return Err(AnimError::NodeNotFound(parent));
        }
        if !self.contains(child) {
            return Err(AnimError::NodeNotFound(child));
        }
        if child == self.root {
            return Err(AnimError::Scene("root node cannot be reparented".to_string()));
        }
        // 防止成环
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(AnimError::Scene("reparenting would create a cycle".to_string()));
            }
            cursor = self.parent(id);
        }

        self.detach(child);
        self.attach(parent, child);
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child.0) {
            c.parent = Some(parent);
        }
    }

    fn detach(&mut self, child: NodeId) {
        let parent = self.nodes.get_mut(child.0).and_then(|c| c.parent.take());
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p.0)) {
            p.children.retain(|&c| c != child);
        }
    }

    /// 删除节点及其整棵子树（连同组件），返回删除的节点数
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<usize> {
        if id == self.root {
            return Err(AnimError::Scene("root node cannot be removed".to_string()));
        }
        if !self.contains(id) {
            return Err(AnimError::NodeNotFound(id));
        }

        self.detach(id);
        let doomed = self.descendants(id);
        for &n in &doomed {
            if let Some(node) = self.nodes.remove(n.0) {
                if let Some(r) = node.model_ref {
                    self.unregister(r, n);
                }
            }
        }
        Ok(doomed.len())
    }

    fn unregister(&mut self, r: ModelNodeRef, id: NodeId) {
        let Some(node_index) = r.node_index else { return };
        if let Some(map) = self
            .instances
            .get_mut(&r.model)
            .and_then(|v| v.get_mut(r.instance))
        {
            if map.get(&node_index) == Some(&id) {
                map.remove(&node_index);
            }
        }
    }

    /// 清空场景（保留新的根节点）
    pub fn clear_scene(&mut self) {
        let removed = self.nodes.len();
        self.nodes.clear();
        self.root = NodeId(self.nodes.insert(Node::new("Root Node")));
        self.instances.clear();
        self.curve_counter = 0;
        log::info!("[Scene] 清空场景，删除 {} 个节点", removed);
    }

    /// 前序遍历 `id` 的子树（含自身）
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let Some(node) = self.node(n) else { continue };
            out.push(n);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// 按名称查找节点（前序遍历第一个匹配）
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&id| self.node(id).is_some_and(|n| n.name == name))
    }

    /// 挂载组件
    pub fn add_component(&mut self, id: NodeId, component: impl Into<Component>) -> Result<()> {
        self.get_mut(id)?.components.push(component.into());
        Ok(())
    }

    pub(crate) fn next_curve_id(&mut self) -> usize {
        let id = self.curve_counter;
        self.curve_counter += 1;
        id
    }

    // ========================================================================
    // 变换
    // ========================================================================

    pub fn set_local(&mut self, id: NodeId, local: Transform) -> Result<()> {
        self.get_mut(id)?.local = local;
        Ok(())
    }

    pub fn set_local_position(&mut self, id: NodeId, position: Vec3) -> Result<()> {
        self.get_mut(id)?.local.translation = position;
        Ok(())
    }

    /// 设置世界变换（反算局部变换），并刷新子树
    pub fn set_world(&mut self, id: NodeId, world: Transform) -> Result<()> {
        let parent_world = self.parent_world(id)?;
        self.get_mut(id)?.local = parent_world.inv_concatenate(&world);
        self.update_world_from(id)
    }

    /// 从 `id` 开始重算子树的世界变换（父节点世界变换视为已是最新）
    pub fn update_world_from(&mut self, id: NodeId) -> Result<()> {
        let parent_world = self.parent_world(id)?;
        self.propagate(id, parent_world);
        Ok(())
    }

    /// 重算整棵树的世界变换
    pub fn update_node_transforms(&mut self) {
        let root = self.root;
        self.propagate(root, Transform::IDENTITY);
    }

    fn propagate(&mut self, start: NodeId, parent_world: Transform) {
        let mut stack = vec![(start, parent_world)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id.0) else { continue };
            node.world = parent_world.concatenate(&node.local);
            let world = node.world;
            stack.extend(node.children.iter().map(|&c| (c, world)));
        }
    }

    // ========================================================================
    // 帧更新
    // ========================================================================

    /// 每帧更新：组件 → 世界变换
    pub fn update(&mut self, ctx: &FrameContext) {
        self.update_components(ctx);
        self.update_node_transforms();
    }

    /// 按前序遍历更新所有节点的组件
    pub fn update_components(&mut self, ctx: &FrameContext) {
        let order = self.descendants(self.root);
        for id in order {
            if self.node(id).map_or(true, |n| n.components.is_empty()) {
                continue;
            }
            let result = self.with_components(id, |components, scene| {
                for component in components.iter_mut() {
                    if let Err(e) = component.update(id, scene, ctx) {
                        log::warn!("[Scene] 组件 {:?} 更新失败: {}", component.kind(), e);
                    }
                }
            });
            if let Err(e) = result {
                log::warn!("[Scene] 节点更新失败: {}", e);
            }
        }
    }

    /// 临时取出节点的组件，使回调可以同时可变借用组件与整个场景
    ///
    /// 回调期间新挂载的组件会追加在原组件之后；节点若被删除则组件随之丢弃。
    pub fn with_components<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut Vec<Component>, &mut SceneGraph) -> R,
    ) -> Result<R> {
        let mut components = std::mem::take(&mut self.get_mut(id)?.components);
        let result = f(&mut components, self);
        if let Some(node) = self.nodes.get_mut(id.0) {
            let added = std::mem::replace(&mut node.components, components);
            node.components.extend(added);
        }
        Ok(result)
    }

    // ========================================================================
    // 模型实例
    // ========================================================================

    /// 实例化模型：创建实例根节点及全部模型节点，返回实例根节点
    pub fn create_model_instance(&mut self, resources: &Resources, model: usize) -> Result<NodeId> {
        let model_res = resources.model(model).ok_or(AnimError::ModelNotFound(model))?;
        let instances = self.instances.entry(model).or_default();
        let instance = instances.len();
        instances.push(HashMap::new());

        let root = self.create_root_child(format!("{}_{}", model_res.name, instance))?;
        self.get_mut(root)?.model_ref = Some(ModelNodeRef { model, instance, node_index: None });

        let mut stack: Vec<(NodeId, usize)> =
            model_res.root_nodes.iter().rev().map(|&i| (root, i)).collect();
        while let Some((parent, index)) = stack.pop() {
            let template = model_res.node(index).ok_or_else(|| {
                AnimError::Scene(format!("model {} has no node {}", model, index))
            })?;
            let id = self.create_node(
                format!("{}_{}_{}_{}", model, instance, index, template.name),
                parent,
            )?;
            let node = self.get_mut(id)?;
            node.local = template.local;
            node.model_ref = Some(ModelNodeRef { model, instance, node_index: Some(index) });

            if let Some(map) = self.instances.get_mut(&model).and_then(|v| v.get_mut(instance)) {
                map.insert(index, id);
            }
            stack.extend(template.children.iter().rev().map(|&c| (id, c)));
        }

        self.update_world_from(root)?;
        log::info!(
            "[Scene] 实例化模型 {} (#{}), 实例 {}",
            model_res.name,
            model,
            instance
        );
        Ok(root)
    }

    /// 按 (模型, 实例, 节点索引) 查找场景节点
    pub fn get_model_node(&self, model: usize, instance: usize, node_index: usize) -> Option<NodeId> {
        self.instances
            .get(&model)
            .and_then(|v| v.get(instance))
            .and_then(|m| m.get(&node_index))
            .copied()
    }

    /// 模型的实例数量
    pub fn instance_count(&self, model: usize) -> usize {
        self.instances.get(&model).map_or(0, |v| v.len())
    }

    /// 计算蒙皮矩阵：joint.world * inverse_bind
    pub fn skinning_matrices(
        &self,
        resources: &Resources,
        instance_root: NodeId,
        skin: usize,
    ) -> Result<Vec<Mat4>> {
        let r = self
            .get(instance_root)?
            .model_ref
            .ok_or_else(|| AnimError::Scene("node is not a model instance".to_string()))?;
        let model = resources.model(r.model).ok_or(AnimError::ModelNotFound(r.model))?;
        let skin = model
            .skins
            .get(skin)
            .ok_or_else(|| AnimError::Scene(format!("model {} has no skin {}", r.model, skin)))?;

        skin.joints
            .iter()
            .enumerate()
            .map(|(i, &joint)| {
                let id = self.get_model_node(r.model, r.instance, joint).ok_or_else(|| {
                    AnimError::Scene(format!("joint {} is not instantiated", joint))
                })?;
                let inverse_bind = skin.inverse_bind_matrices.get(i).copied().unwrap_or(Mat4::IDENTITY);
                Ok(self.get(id)?.world.to_matrix() * inverse_bind)
            })
            .collect()
    }

    /// 重置场景：根节点回到单位变换，模型节点回到绑定姿势
    ///
    /// 编辑器创建的节点（曲线控制点、IK 关节）保持不变。
    pub fn reset_scene(&mut self, resources: &Resources) {
        let root = self.root;
        for (index, node) in self.nodes.iter_mut() {
            if NodeId(index) == root {
                node.local = Transform::IDENTITY;
                continue;
            }
            let Some((model, node_index)) = node.model_ref.and_then(|r| Some((r.model, r.node_index?)))
            else {
                continue;
            };
            if let Some(template) = resources.model(model).and_then(|m| m.node(node_index)) {
                node.local = template.local;
            }
        }
        self.update_node_transforms();
        log::info!("[Scene] 场景已重置");
    }
}
