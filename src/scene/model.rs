//! 模型资源
//!
//! 模型是只读的节点层级模板（来自外部加载器），
//! 场景通过 `SceneGraph::create_model_instance` 实例化它。

use std::collections::HashMap;

use glam::Mat4;

use super::transform::Transform;
use crate::animation::{AnimationClip, AnimationLibrary, ClipId};
use crate::Result;

/// 模型中的节点模板
#[derive(Clone, Debug)]
pub struct ModelNode {
    pub name: String,
    /// 绑定姿势下的局部变换
    pub local: Transform,
    /// 子节点索引
    pub children: Vec<usize>,
}

impl ModelNode {
    pub fn new(name: impl Into<String>, local: Transform) -> Self {
        Self {
            name: name.into(),
            local,
            children: Vec::new(),
        }
    }
}

/// 蒙皮：关节节点索引与逆绑定矩阵一一对应
#[derive(Clone, Debug, Default)]
pub struct Skin {
    pub name: String,
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// 模型资源
#[derive(Clone, Debug, Default)]
pub struct ModelResource {
    pub name: String,
    pub nodes: Vec<ModelNode>,
    /// 场景根节点索引
    pub root_nodes: Vec<usize>,
    pub skins: Vec<Skin>,
    /// 属于此模型的动画片段
    pub clips: Vec<ClipId>,
}

impl ModelResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 添加节点，返回节点索引；`parent` 为 None 时作为根节点
    pub fn add_node(&mut self, node: ModelNode, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.push(index),
            None => self.root_nodes.push(index),
        }
        index
    }

    #[inline]
    pub fn node(&self, index: usize) -> Option<&ModelNode> {
        self.nodes.get(index)
    }

    /// 按名称查找节点索引
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }
}

/// 资源集合（模型 + 动画片段）
#[derive(Debug, Default)]
pub struct Resources {
    models: Vec<ModelResource>,
    names: HashMap<String, usize>,
    pub clips: AnimationLibrary,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模型，返回模型索引
    pub fn add_model(&mut self, model: ModelResource) -> usize {
        let id = self.models.len();
        self.names.insert(model.name.clone(), id);
        self.models.push(model);
        log::debug!("[Resources] 注册模型 #{}", id);
        id
    }

    /// 注册动画片段并归属到模型
    pub fn add_clip(&mut self, model: usize, clip: AnimationClip) -> Result<ClipId> {
        let model_res = self
            .models
            .get_mut(model)
            .ok_or(crate::AnimError::ModelNotFound(model))?;
        let id = self.clips.add(clip)?;
        model_res.clips.push(id);
        Ok(id)
    }

    #[inline]
    pub fn model(&self, id: usize) -> Option<&ModelResource> {
        self.models.get(id)
    }

    pub fn model_id(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    #[inline]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    #[inline]
    pub fn clip(&self, id: ClipId) -> Option<&AnimationClip> {
        self.clips.get(id)
    }
}
