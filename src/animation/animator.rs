//! 动画播放组件
//!
//! 挂在模型实例根节点上，两种模式：
//! - 单片段：按 anim_factor · dt 推进时间，采样后写入实例节点
//! - 混合树：按同样的时间推进求值混合树，写入混合结果
//!
//! 只写入姿势掩码中标记的分量。

use super::blend_tree::BlendTree;
use super::clip::ClipId;
use super::pose::Pose;
use crate::config::get_config;
use crate::scene::{FrameContext, NodeId, Resources, SceneGraph};
use crate::{AnimError, Result};

/// 动画播放组件
#[derive(Clone, Debug)]
pub struct Animator {
    clip: Option<ClipId>,
    blend_tree: Option<BlendTree>,
    playing: bool,
    looping: bool,
    nlerp: bool,
    time: f32,
    start_time: f32,
    end_time: f32,
    /// 时间缩放（曲线跟随时由控制器写入）
    anim_factor: f32,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new()
    }
}

impl Animator {
    pub fn new() -> Self {
        let config = get_config();
        Self {
            clip: None,
            blend_tree: None,
            playing: true,
            looping: config.loop_playback,
            nlerp: config.nlerp,
            time: 0.0,
            start_time: 0.0,
            end_time: 0.0,
            anim_factor: 1.0,
        }
    }

    /// 单片段模式
    pub fn with_clip(resources: &Resources, clip: ClipId) -> Result<Self> {
        let mut animator = Self::new();
        animator.set_clip(resources, Some(clip))?;
        Ok(animator)
    }

    /// 混合树模式
    pub fn with_blend_tree(tree: BlendTree) -> Self {
        let mut animator = Self::new();
        animator.set_blend_tree(Some(tree));
        animator
    }

    /// 切换片段，播放区间重置为整个片段
    pub fn set_clip(&mut self, resources: &Resources, clip: Option<ClipId>) -> Result<()> {
        match clip {
            Some(id) => {
                let data = resources.clip(id).ok_or(AnimError::ClipNotFound(id))?;
                self.start_time = 0.0;
                self.end_time = data.max_time();
                log::debug!("[Animator] 切换片段 '{}' ({:.3}s)", data.name, self.end_time);
            }
            None => {
                self.start_time = 0.0;
                self.end_time = 0.0;
            }
        }
        self.clip = clip;
        self.time = self.start_time;
        Ok(())
    }

    pub fn set_blend_tree(&mut self, tree: Option<BlendTree>) {
        self.blend_tree = tree;
        if let Some(tree) = self.blend_tree.as_mut() {
            tree.set_nlerp(self.nlerp);
        }
    }

    #[inline]
    pub fn clip(&self) -> Option<ClipId> {
        self.clip
    }

    #[inline]
    pub fn blend_tree(&self) -> Option<&BlendTree> {
        self.blend_tree.as_ref()
    }

    #[inline]
    pub fn blend_tree_mut(&mut self) -> Option<&mut BlendTree> {
        self.blend_tree.as_mut()
    }

    #[inline]
    pub fn uses_blend_tree(&self) -> bool {
        self.blend_tree.is_some()
    }

    pub fn set_anim_factor(&mut self, factor: f32) {
        self.anim_factor = factor;
    }

    #[inline]
    pub fn anim_factor(&self) -> f32 {
        self.anim_factor
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// 回到播放起点
    pub fn rewind(&mut self) {
        self.time = self.start_time;
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_nlerp(&mut self, nlerp: bool) {
        self.nlerp = nlerp;
        if let Some(tree) = self.blend_tree.as_mut() {
            tree.set_nlerp(nlerp);
        }
    }

    #[inline]
    pub fn end_time(&self) -> f32 {
        self.end_time
    }

    // ========================================================================
    // 每帧更新
    // ========================================================================

    pub(crate) fn update(&mut self, owner: NodeId, scene: &mut SceneGraph, ctx: &FrameContext) -> Result<()> {
        let model_ref = scene
            .get(owner)?
            .model_ref
            .ok_or_else(|| AnimError::Animation("animator owner is not a model instance".to_string()))?;

        if self.blend_tree.is_some() {
            self.blend_tree_update(scene, model_ref.model, model_ref.instance, ctx)
        } else {
            self.clip_update(scene, model_ref.model, model_ref.instance, ctx)
        }
    }

    fn clip_update(
        &mut self,
        scene: &mut SceneGraph,
        model: usize,
        instance: usize,
        ctx: &FrameContext,
    ) -> Result<()> {
        let Some(id) = self.clip else { return Ok(()) };
        let clip = ctx.resources.clip(id).ok_or(AnimError::ClipNotFound(id))?;

        if self.playing {
            if self.time <= self.end_time {
                self.time += self.anim_factor * ctx.dt;
            }
            if self.looping && self.time > self.end_time {
                self.time = self.start_time;
            }
        }

        let pose = Pose::sample_at(clip, self.time, self.nlerp)?;
        apply_pose(scene, model, instance, &pose)
    }

    fn blend_tree_update(
        &mut self,
        scene: &mut SceneGraph,
        model: usize,
        instance: usize,
        ctx: &FrameContext,
    ) -> Result<()> {
        if self.playing {
            self.time += self.anim_factor * ctx.dt;
        }
        let Some(tree) = self.blend_tree.as_mut() else { return Ok(()) };

        match tree.produce_pose(self.time, &ctx.resources.clips) {
            Ok(Some(pose)) => apply_pose(scene, model, instance, pose),
            Ok(None) => Ok(()),
            // 编辑中的混合树子节点不足时不写入
            Err(AnimError::NotEnoughBlendNodes { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// 把姿势写入模型实例的节点
pub fn apply_pose(scene: &mut SceneGraph, model: usize, instance: usize, pose: &Pose) -> Result<()> {
    for (index, entry) in pose.iter() {
        let Some(id) = scene.get_model_node(model, instance, index) else {
            if get_config().debug_log {
                log::warn!("[Animator] 实例 {}/{} 没有节点 {}", model, instance, index);
            }
            continue;
        };
        entry.apply_to(&mut scene.get_mut(id)?.local);
    }
    Ok(())
}
