//! 帧上下文
//!
//! 每帧显式传入组件的只读数据：时间步长、资源、输入。

use glam::Vec3;

use super::model::Resources;

/// 输入状态（由宿主每帧填写）
#[derive(Clone, Copy, Debug, Default)]
pub struct InputState {
    /// 指针（鼠标）是否按下
    pub pointer_down: bool,
    /// 指针投射到场景中的世界坐标
    pub pointer_world: Option<Vec3>,
}

/// 帧上下文
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'a> {
    /// 帧时间（秒）
    pub dt: f32,
    pub resources: &'a Resources,
    pub input: InputState,
}

impl<'a> FrameContext<'a> {
    pub fn new(dt: f32, resources: &'a Resources) -> Self {
        Self {
            dt,
            resources,
            input: InputState::default(),
        }
    }

    pub fn with_input(mut self, input: InputState) -> Self {
        self.input = input;
        self
    }
}
