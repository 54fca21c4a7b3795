//! 场景系统 - 节点层级、变换与组件
//!
//! 核心设计思想：
//! - Transform: 平移 / 旋转 / 逐轴缩放，支持组合与逆组合
//! - SceneGraph: 节点 arena，负责层级维护、组件更新与世界变换传播
//! - Resources: 只读的模型与动画片段资源

mod component;
mod context;
mod model;
mod node;
mod scene_graph;
mod transform;

pub use component::{Component, ComponentKind};
pub use context::{FrameContext, InputState};
pub use model::{ModelNode, ModelResource, Resources, Skin};
pub use node::{ModelNodeRef, Node, NodeId};
pub use scene_graph::SceneGraph;
pub use transform::Transform;
