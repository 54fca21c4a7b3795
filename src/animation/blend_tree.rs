//! 混合树
//!
//! - 叶节点：采样引用的动画片段
//! - 1D：子节点按 x 升序，二分查找参数所在区间后线性混合
//! - 2D：子节点位置做 Delaunay 三角化，参数所在三角形的三个子节点按重心坐标混合；
//!   参数落在所有三角形之外时输出空姿势

use delaunator::{triangulate, Point};
use glam::Vec2;

use super::clip::{AnimationLibrary, ClipId};
use super::pose::Pose;
use crate::{AnimError, Result};

/// 重心坐标判定的容差
const INSIDE_EPSILON: f32 = -1e-6;

/// 2D 混合节点的三角化数据
#[derive(Clone, Debug)]
pub struct Triangulation {
    triangles: Vec<[usize; 3]>,
    min: Vec2,
    max: Vec2,
    /// 上次求值时参数所在的三角形
    inside: Option<usize>,
}

impl Default for Triangulation {
    fn default() -> Self {
        Self {
            triangles: Vec::new(),
            min: Vec2::ZERO,
            max: Vec2::ONE,
            inside: None,
        }
    }
}

/// 混合节点类型
#[derive(Clone, Debug)]
pub enum BlendKind {
    Leaf,
    Blend1D,
    Blend2D(Triangulation),
}

/// 混合节点
#[derive(Clone, Debug)]
pub struct BlendNode {
    position: Vec2,
    clip: Option<ClipId>,
    kind: BlendKind,
    children: Vec<BlendNode>,
    pose: Pose,
}

impl BlendNode {
    fn with_kind(kind: BlendKind, position: Vec2, clip: Option<ClipId>) -> Self {
        Self {
            position,
            clip,
            kind,
            children: Vec::new(),
            pose: Pose::new(),
        }
    }

    pub fn leaf(clip: ClipId, position: Vec2) -> Self {
        Self::with_kind(BlendKind::Leaf, position, Some(clip))
    }

    pub fn blend_1d(position: Vec2) -> Self {
        Self::with_kind(BlendKind::Blend1D, position, None)
    }

    pub fn blend_2d(position: Vec2) -> Self {
        Self::with_kind(BlendKind::Blend2D(Triangulation::default()), position, None)
    }

    #[inline]
    pub fn kind(&self) -> &BlendKind {
        &self.kind
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn clip(&self) -> Option<ClipId> {
        self.clip
    }

    #[inline]
    pub fn children(&self) -> &[BlendNode] {
        &self.children
    }

    /// 上次求值得到的姿势
    #[inline]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// 产生姿势所需的最少子节点数
    pub fn min_children(&self) -> usize {
        match self.kind {
            BlendKind::Leaf => 0,
            BlendKind::Blend1D => 2,
            BlendKind::Blend2D(_) => 3,
        }
    }

    pub fn enough_children(&self) -> bool {
        self.children.len() >= self.min_children()
    }

    fn check_children(&self) -> Result<()> {
        if self.enough_children() {
            return Ok(());
        }
        Err(AnimError::NotEnoughBlendNodes {
            required: self.min_children(),
            actual: self.children.len(),
        })
    }

    // ========================================================================
    // 编辑
    // ========================================================================

    /// 插入子节点，返回其索引
    pub fn insert_child(&mut self, child: BlendNode) -> Result<usize> {
        let index = match self.kind {
            BlendKind::Leaf => {
                return Err(AnimError::BlendTree("leaf nodes cannot have children".to_string()));
            }
            BlendKind::Blend1D => {
                let x = child.position.x;
                let index = self.children.partition_point(|c| c.position.x <= x);
                self.children.insert(index, child);
                index
            }
            BlendKind::Blend2D(_) => {
                self.children.push(child);
                self.children.len() - 1
            }
        };
        self.rebuild();
        Ok(index)
    }

    /// 删除子节点；2D 节点至少保留 3 个子节点
    pub fn erase_child(&mut self, index: usize) -> Result<BlendNode> {
        if index >= self.children.len() {
            return Err(AnimError::BlendTree(format!("no child at index {}", index)));
        }
        if matches!(self.kind, BlendKind::Blend2D(_)) && self.children.len() <= 3 {
            return Err(AnimError::NotEnoughBlendNodes {
                required: 3,
                actual: self.children.len() - 1,
            });
        }
        let removed = self.children.remove(index);
        self.rebuild();
        Ok(removed)
    }

    /// 移动子节点，1D 重新排序，2D 重新三角化；返回移动后的索引
    pub fn set_child_position(&mut self, index: usize, position: Vec2) -> Result<usize> {
        let child = self
            .children
            .get_mut(index)
            .ok_or_else(|| AnimError::BlendTree(format!("no child at index {}", index)))?;
        child.position = position;

        let mut new_index = index;
        if matches!(self.kind, BlendKind::Blend1D) {
            let moved = self.children.remove(index);
            new_index = self.children.partition_point(|c| c.position.x <= position.x);
            self.children.insert(new_index, moved);
        }
        self.rebuild();
        Ok(new_index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut BlendNode> {
        self.children.get_mut(index)
    }

    /// 混合参数范围
    pub fn bounds(&self) -> (Vec2, Vec2) {
        match &self.kind {
            BlendKind::Blend1D if self.children.len() >= 2 => {
                let first = self.children[0].position;
                let last = self.children[self.children.len() - 1].position;
                (first, last)
            }
            BlendKind::Blend2D(tri) => (tri.min, tri.max),
            _ => (Vec2::ZERO, Vec2::ONE),
        }
    }

    /// 2D 节点的三角形（子节点索引）
    pub fn triangles(&self) -> &[[usize; 3]] {
        match &self.kind {
            BlendKind::Blend2D(tri) => &tri.triangles,
            _ => &[],
        }
    }

    /// 上次求值时参数所在的三角形
    pub fn inside_triangle(&self) -> Option<usize> {
        match &self.kind {
            BlendKind::Blend2D(tri) => tri.inside,
            _ => None,
        }
    }

    /// 2D 节点：重算范围并重新三角化
    fn rebuild(&mut self) {
        let BlendKind::Blend2D(tri) = &mut self.kind else { return };

        tri.inside = None;
        match self.children.first() {
            Some(first) => {
                let (min, max) = self.children.iter().fold((first.position, first.position), |(lo, hi), c| {
                    (lo.min(c.position), hi.max(c.position))
                });
                tri.min = min;
                tri.max = max;
            }
            None => {
                tri.min = Vec2::ZERO;
                tri.max = Vec2::ONE;
            }
        }

        tri.triangles.clear();
        if self.children.len() < 3 {
            return;
        }
        let points: Vec<Point> = self
            .children
            .iter()
            .map(|c| Point { x: c.position.x as f64, y: c.position.y as f64 })
            .collect();
        let result = triangulate(&points);
        tri.triangles = result
            .triangles
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();

        log::debug!(
            "[BlendTree] 重新三角化: {} 个子节点, {} 个三角形",
            self.children.len(),
            tri.triangles.len()
        );
    }

    // ========================================================================
    // 求值
    // ========================================================================

    /// 计算本节点姿势；2D 参数在三角形外时返回 false（姿势为空）
    pub fn produce_pose(
        &mut self,
        param: Vec2,
        time: f32,
        clips: &AnimationLibrary,
        nlerp: bool,
    ) -> Result<bool> {
        match self.kind {
            BlendKind::Leaf => {
                let id = self
                    .clip
                    .ok_or_else(|| AnimError::BlendTree("leaf node has no clip".to_string()))?;
                let clip = clips.get(id).ok_or(AnimError::ClipNotFound(id))?;
                self.pose = Pose::sample(clip, time, nlerp)?;
                Ok(true)
            }
            BlendKind::Blend1D => {
                self.check_children()?;
                self.blend_1d_children(param, time, clips, nlerp)?;
                Ok(true)
            }
            BlendKind::Blend2D(_) => {
                self.check_children()?;
                self.blend_2d_children(param, time, clips, nlerp)
            }
        }
    }

    fn blend_1d_children(
        &mut self,
        param: Vec2,
        time: f32,
        clips: &AnimationLibrary,
        nlerp: bool,
    ) -> Result<()> {
        let (min, max) = self.bounds();
        let param = Vec2::new(param.x.clamp(min.x, max.x), param.y);
        let x = param.x;

        let n = self.children.len();
        let right = self.children.partition_point(|c| c.position.x <= x).clamp(1, n - 1);
        let left = right - 1;

        let (head, tail) = self.children.split_at_mut(right);
        let from = &mut head[left];
        let to = &mut tail[0];

        // 恰好落在子节点上时直接复制
        if x == from.position.x {
            from.produce_pose(param, time, clips, nlerp)?;
            self.pose = from.pose.clone();
            return Ok(());
        }
        if x == to.position.x {
            to.produce_pose(param, time, clips, nlerp)?;
            self.pose = to.pose.clone();
            return Ok(());
        }

        from.produce_pose(param, time, clips, nlerp)?;
        to.produce_pose(param, time, clips, nlerp)?;

        let total = to.position.x - from.position.x;
        let w = if total != 0.0 { (x - from.position.x) / total } else { 0.0 };
        self.pose = Pose::lerp(&from.pose, &to.pose, w);
        Ok(())
    }

    fn blend_2d_children(
        &mut self,
        param: Vec2,
        time: f32,
        clips: &AnimationLibrary,
        nlerp: bool,
    ) -> Result<bool> {
        let BlendKind::Blend2D(tri) = &mut self.kind else { return Ok(false) };
        let param = param.clamp(tri.min, tri.max);

        let found = tri.triangles.iter().enumerate().find_map(|(i, t)| {
            barycentric_weights(
                param,
                self.children[t[0]].position,
                self.children[t[1]].position,
                self.children[t[2]].position,
            )
            .map(|w| (i, *t, w))
        });

        let Some((index, corners, weights)) = found else {
            tri.inside = None;
            self.pose.clear();
            return Ok(false);
        };
        tri.inside = Some(index);

        for (i, child) in self.children.iter_mut().enumerate() {
            if corners.contains(&i) {
                child.produce_pose(param, time, clips, nlerp)?;
            }
        }

        self.pose = Pose::barycentric(
            [
                &self.children[corners[0]].pose,
                &self.children[corners[1]].pose,
                &self.children[corners[2]].pose,
            ],
            weights,
        );
        Ok(true)
    }
}

/// 重心坐标；点在三角形外或三角形退化时返回 None
pub fn barycentric_weights(p: Vec2, p0: Vec2, p1: Vec2, p2: Vec2) -> Option<[f32; 3]> {
    let v0 = p1 - p0;
    let v1 = p2 - p0;
    let v2 = p - p0;
    let d = v0.perp_dot(v1);
    if d.abs() < 1e-12 {
        return None;
    }
    let b1 = v2.perp_dot(v1) / d;
    let b2 = v0.perp_dot(v2) / d;
    let b0 = 1.0 - b1 - b2;
    if b0 < INSIDE_EPSILON || b1 < INSIDE_EPSILON || b2 < INSIDE_EPSILON {
        return None;
    }
    Some([b0.max(0.0), b1.max(0.0), b2.max(0.0)])
}

/// 混合树
#[derive(Clone, Debug, Default)]
pub struct BlendTree {
    root: Option<BlendNode>,
    param: Vec2,
    nlerp: bool,
}

impl BlendTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 1D 节点为根重建
    pub fn create_1d(&mut self) {
        self.root = Some(BlendNode::blend_1d(Vec2::ZERO));
    }

    /// 以 2D 节点为根重建
    pub fn create_2d(&mut self) {
        self.root = Some(BlendNode::blend_2d(Vec2::ZERO));
    }

    pub fn root(&self) -> Option<&BlendNode> {
        self.root.as_ref()
    }

    pub fn root_mut(&mut self) -> Option<&mut BlendNode> {
        self.root.as_mut()
    }

    pub fn set_nlerp(&mut self, nlerp: bool) {
        self.nlerp = nlerp;
    }

    /// 向根节点插入引用 `clip` 的叶节点
    pub fn insert_blend_node(&mut self, clip: ClipId, position: Vec2) -> Result<usize> {
        let root = self
            .root
            .as_mut()
            .ok_or_else(|| AnimError::BlendTree("blend tree has no root".to_string()))?;
        root.insert_child(BlendNode::leaf(clip, position))
    }

    pub fn set_blend_param(&mut self, param: Vec2) {
        self.param = param;
    }

    #[inline]
    pub fn blend_param(&self) -> Vec2 {
        self.param
    }

    /// 在 `time` 处求值；参数落在 2D 三角形之外时返回 `Ok(None)`
    pub fn produce_pose(&mut self, time: f32, clips: &AnimationLibrary) -> Result<Option<&Pose>> {
        let root = self
            .root
            .as_mut()
            .ok_or_else(|| AnimError::BlendTree("blend tree has no root".to_string()))?;
        if root.produce_pose(self.param, time, clips, self.nlerp)? {
            Ok(Some(&root.pose))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::{AnimationClip, ChannelPath, Interpolation, Sampler};
    use glam::Vec3;

    /// 节点 0 平移恒为 `value` 的片段
    fn constant_clip(lib: &mut AnimationLibrary, name: &str, value: Vec3) -> ClipId {
        let mut clip = AnimationClip::new(name);
        clip.add_track(
            0,
            ChannelPath::Translation,
            Sampler::vec3(Interpolation::Linear, vec![0.0, 1.0], vec![value, value]),
        )
        .unwrap();
        lib.add(clip).unwrap()
    }

    fn translation(pose: &Pose) -> Vec3 {
        pose.get(0).unwrap().transform.translation
    }

    #[test]
    fn test_1d_midpoint_and_clamp() {
        let mut lib = AnimationLibrary::new();
        let a = constant_clip(&mut lib, "a", Vec3::ZERO);
        let b = constant_clip(&mut lib, "b", Vec3::new(4.0, 0.0, 0.0));

        let mut tree = BlendTree::new();
        tree.create_1d();
        // 倒序插入，内部保持升序
        tree.insert_blend_node(b, Vec2::new(2.0, 0.0)).unwrap();
        tree.insert_blend_node(a, Vec2::new(0.0, 0.0)).unwrap();
        let xs: Vec<f32> = tree.root().unwrap().children().iter().map(|c| c.position().x).collect();
        assert_eq!(xs, vec![0.0, 2.0]);

        tree.set_blend_param(Vec2::new(0.5, 0.0));
        let pose = tree.produce_pose(0.3, &lib).unwrap().unwrap();
        assert!(translation(pose).abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));

        tree.set_blend_param(Vec2::new(10.0, 0.0));
        let pose = tree.produce_pose(0.3, &lib).unwrap().unwrap();
        assert!(translation(pose).abs_diff_eq(Vec3::new(4.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_1d_three_children() {
        let mut lib = AnimationLibrary::new();
        let a = constant_clip(&mut lib, "a", Vec3::ZERO);
        let b = constant_clip(&mut lib, "b", Vec3::new(1.0, 0.0, 0.0));
        let c = constant_clip(&mut lib, "c", Vec3::new(1.0, 2.0, 0.0));

        let mut tree = BlendTree::new();
        tree.create_1d();
        tree.insert_blend_node(a, Vec2::new(0.0, 0.0)).unwrap();
        tree.insert_blend_node(c, Vec2::new(2.0, 0.0)).unwrap();
        tree.insert_blend_node(b, Vec2::new(1.0, 0.0)).unwrap();

        tree.set_blend_param(Vec2::new(1.5, 0.0));
        let pose = tree.produce_pose(0.0, &lib).unwrap().unwrap();
        assert!(translation(pose).abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));

        tree.set_blend_param(Vec2::new(1.0, 0.0));
        let pose = tree.produce_pose(0.0, &lib).unwrap().unwrap();
        assert!(translation(pose).abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_not_enough_children() {
        let mut lib = AnimationLibrary::new();
        let a = constant_clip(&mut lib, "a", Vec3::ZERO);

        let mut tree = BlendTree::new();
        assert!(tree.produce_pose(0.0, &lib).is_err());

        tree.create_2d();
        tree.insert_blend_node(a, Vec2::ZERO).unwrap();
        tree.insert_blend_node(a, Vec2::X).unwrap();
        assert!(matches!(
            tree.produce_pose(0.0, &lib),
            Err(AnimError::NotEnoughBlendNodes { required: 3, actual: 2 })
        ));
    }

    fn square_tree(lib: &mut AnimationLibrary) -> BlendTree {
        let corners = [
            (Vec2::new(0.0, 0.0), Vec3::new(0.0, 0.0, 0.0)),
            (Vec2::new(1.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            (Vec2::new(1.0, 1.0), Vec3::new(1.0, 1.0, 0.0)),
            (Vec2::new(0.0, 1.0), Vec3::new(0.0, 1.0, 0.0)),
        ];
        let mut tree = BlendTree::new();
        tree.create_2d();
        for (i, (pos, value)) in corners.iter().enumerate() {
            let id = constant_clip(lib, &format!("c{}", i), *value);
            tree.insert_blend_node(id, *pos).unwrap();
        }
        tree
    }

    #[test]
    fn test_2d_triangulation_and_vertex() {
        let mut lib = AnimationLibrary::new();
        let mut tree = square_tree(&mut lib);
        assert_eq!(tree.root().unwrap().triangles().len(), 2);
        assert_eq!(tree.root().unwrap().bounds(), (Vec2::ZERO, Vec2::ONE));

        // 落在顶点上，复现该顶点的姿势
        tree.set_blend_param(Vec2::new(1.0, 1.0));
        let pose = tree.produce_pose(0.0, &lib).unwrap().unwrap();
        assert!(translation(pose).abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));
        assert!(tree.root().unwrap().inside_triangle().is_some());
    }

    #[test]
    fn test_2d_interior_is_linear() {
        let mut lib = AnimationLibrary::new();
        let mut tree = square_tree(&mut lib);

        // 姿势与混合位置成线性关系，任一三角形内都得到参数本身
        tree.set_blend_param(Vec2::new(0.25, 0.6));
        let pose = tree.produce_pose(0.0, &lib).unwrap().unwrap();
        assert!(translation(pose).abs_diff_eq(Vec3::new(0.25, 0.6, 0.0), 1e-5));
    }

    #[test]
    fn test_2d_out_of_hull_is_empty() {
        let mut lib = AnimationLibrary::new();
        let a = constant_clip(&mut lib, "a", Vec3::ZERO);

        let mut tree = BlendTree::new();
        tree.create_2d();
        tree.insert_blend_node(a, Vec2::new(0.0, 0.0)).unwrap();
        tree.insert_blend_node(a, Vec2::new(1.0, 0.0)).unwrap();
        tree.insert_blend_node(a, Vec2::new(0.0, 1.0)).unwrap();

        // (0.9, 0.9) 在包围盒内但在三角形外
        tree.set_blend_param(Vec2::new(0.9, 0.9));
        assert!(tree.produce_pose(0.0, &lib).unwrap().is_none());
        let root = tree.root().unwrap();
        assert!(root.pose().is_empty());
        assert!(root.inside_triangle().is_none());
    }

    #[test]
    fn test_2d_erase_keeps_minimum() {
        let mut lib = AnimationLibrary::new();
        let mut tree = square_tree(&mut lib);
        let root = tree.root_mut().unwrap();

        root.erase_child(2).unwrap();
        assert_eq!(root.triangles().len(), 1);
        assert_eq!(root.bounds(), (Vec2::ZERO, Vec2::ONE));
        assert!(root.erase_child(0).is_err());
        assert_eq!(root.children().len(), 3);
    }

    #[test]
    fn test_set_child_position_resorts_1d() {
        let mut lib = AnimationLibrary::new();
        let a = constant_clip(&mut lib, "a", Vec3::ZERO);
        let mut root = BlendNode::blend_1d(Vec2::ZERO);
        root.insert_child(BlendNode::leaf(a, Vec2::new(0.0, 0.0))).unwrap();
        root.insert_child(BlendNode::leaf(a, Vec2::new(1.0, 0.0))).unwrap();

        let index = root.set_child_position(0, Vec2::new(3.0, 0.0)).unwrap();
        assert_eq!(index, 1);
        assert_eq!(root.bounds(), (Vec2::new(1.0, 0.0), Vec2::new(3.0, 0.0)));
    }

    #[test]
    fn test_barycentric_weights() {
        let w = barycentric_weights(Vec2::new(0.25, 0.25), Vec2::ZERO, Vec2::X, Vec2::Y).unwrap();
        assert!((w[0] - 0.5).abs() < 1e-6);
        assert!((w[1] - 0.25).abs() < 1e-6);
        assert!((w[2] - 0.25).abs() < 1e-6);
        assert!(barycentric_weights(Vec2::new(1.0, 1.0), Vec2::ZERO, Vec2::X, Vec2::Y).is_none());
    }
}
