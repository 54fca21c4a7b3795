//! 变换 - 平移 / 旋转 / 逐轴缩放
//!
//! 组合规则（父 ∘ 子）：
//! - scale = a.scale ⊙ b.scale（逐分量）
//! - rotation = a.rotation * b.rotation
//! - translation = a.rotation * (a.scale ⊙ b.translation) + a.translation

use glam::{Mat4, Quat, Vec3};

/// 节点变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 逐分量倒数，零分量保持为零
#[inline]
fn recip_or_zero(v: Vec3) -> Vec3 {
    let f = |x: f32| if x.abs() > f32::EPSILON { 1.0 / x } else { 0.0 };
    Vec3::new(f(v.x), f(v.y), f(v.z))
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    #[inline]
    pub fn from_rotation(rotation: Quat) -> Self {
        Self { rotation, ..Self::IDENTITY }
    }

    #[inline]
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { translation, rotation, scale }
    }

    /// 组合：返回 self ∘ child（先应用 child，再应用 self）
    pub fn concatenate(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.rotation * (self.scale * child.translation) + self.translation,
            rotation: (self.rotation * child.rotation).normalize(),
            scale: self.scale * child.scale,
        }
    }

    /// 逆组合：求 x 使得 self.concatenate(x) == combined
    pub fn inv_concatenate(&self, combined: &Transform) -> Transform {
        let inv_rot = self.rotation.inverse();
        let inv_scale = recip_or_zero(self.scale);
        Transform {
            translation: inv_scale * (inv_rot * (combined.translation - self.translation)),
            rotation: (inv_rot * combined.rotation).normalize(),
            scale: combined.scale * inv_scale,
        }
    }

    /// 变换一个点
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * (self.scale * p) + self.translation
    }

    /// 转换为 4x4 矩阵（T · R · S）
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 逆矩阵（S⁻¹ · R⁻¹ · T⁻¹）
    pub fn inverse_matrix(&self) -> Mat4 {
        Mat4::from_scale(recip_or_zero(self.scale))
            * Mat4::from_quat(self.rotation.inverse())
            * Mat4::from_translation(-self.translation)
    }

    /// 从矩阵分解（平移 = 第 3 列，缩放 = 各列长度）
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_transform_eq(a: &Transform, b: &Transform) {
        assert!((a.translation - b.translation).length() < 1e-4, "{:?} != {:?}", a, b);
        assert!(a.rotation.dot(b.rotation).abs() > 1.0 - 1e-5, "{:?} != {:?}", a, b);
        assert!((a.scale - b.scale).length() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_concatenate_identity() {
        let t = Transform::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(0.3), Vec3::splat(2.0));
        assert_transform_eq(&Transform::IDENTITY.concatenate(&t), &t);
        assert_transform_eq(&t.concatenate(&Transform::IDENTITY), &t);
    }

    #[test]
    fn test_concatenate_composition() {
        let parent = Transform::new(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_z(FRAC_PI_2), Vec3::splat(2.0));
        let child = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let world = parent.concatenate(&child);
        // 子节点 (1,0,0) 经过缩放 2 与旋转 90° 后为 (0,2,0)，再平移 (1,0,0)
        assert!((world.translation - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
        assert!(world.scale.abs_diff_eq(Vec3::splat(2.0), 1e-6));
    }

    #[test]
    fn test_concatenate_non_uniform_scale() {
        let parent = Transform::new(Vec3::ZERO, Quat::IDENTITY, Vec3::new(1.0, 2.0, 3.0));
        let child = Transform::new(Vec3::new(1.0, 1.0, 1.0), Quat::IDENTITY, Vec3::new(2.0, 1.0, 0.5));
        let world = parent.concatenate(&child);
        assert!(world.translation.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
        assert!(world.scale.abs_diff_eq(Vec3::new(2.0, 2.0, 1.5), 1e-6));
    }

    #[test]
    fn test_concatenate_associative() {
        // 子节点旋转不改变父节点缩放的作用轴，结合律成立
        let a = Transform::new(Vec3::new(1.0, -2.0, 0.5), Quat::from_rotation_z(0.6), Vec3::new(1.0, 2.0, 0.5));
        let b = Transform::new(Vec3::new(0.3, 0.7, -1.0), Quat::IDENTITY, Vec3::new(3.0, 0.5, 2.0));
        let c = Transform::new(Vec3::new(-1.0, 0.2, 2.0), Quat::from_rotation_x(-0.4), Vec3::new(0.5, 1.5, 1.0));
        let left = a.concatenate(&b).concatenate(&c);
        let right = a.concatenate(&b.concatenate(&c));
        assert_transform_eq(&left, &right);

        // 统一缩放时任意旋转都满足结合律
        let a = Transform::new(Vec3::new(1.0, 0.0, 2.0), Quat::from_rotation_y(0.9), Vec3::splat(1.5));
        let b = Transform::new(Vec3::new(0.0, 1.0, 0.0), Quat::from_rotation_x(0.3), Vec3::splat(0.5));
        let left = a.concatenate(&b).concatenate(&c);
        let right = a.concatenate(&b.concatenate(&c));
        assert_transform_eq(&left, &right);
    }

    #[test]
    fn test_inv_concatenate_round_trip() {
        let a = Transform::new(Vec3::new(0.5, -1.0, 2.0), Quat::from_rotation_x(0.7), Vec3::splat(1.5));
        let b = Transform::new(Vec3::new(-3.0, 0.25, 1.0), Quat::from_rotation_y(-1.2), Vec3::splat(0.5));
        let c = a.concatenate(&b);
        assert_transform_eq(&a.inv_concatenate(&c), &b);
    }

    #[test]
    fn test_inv_concatenate_non_uniform_round_trip() {
        let a = Transform::new(Vec3::new(0.5, -1.0, 2.0), Quat::from_rotation_x(0.7), Vec3::new(1.0, 2.0, 1.0));
        let b = Transform::new(Vec3::new(-3.0, 0.25, 1.0), Quat::from_rotation_y(-1.2), Vec3::new(0.5, 3.0, 2.0));
        let c = a.concatenate(&b);
        assert_transform_eq(&a.inv_concatenate(&c), &b);
        // 反方向：由局部与父变换重建世界变换
        assert_transform_eq(&a.concatenate(&a.inv_concatenate(&c)), &c);
    }

    #[test]
    fn test_matrix_matches_transform_point() {
        let t = Transform::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(0.9), Vec3::new(3.0, 1.0, 2.0));
        let p = Vec3::new(0.2, -0.4, 1.0);
        let via_matrix = t.to_matrix().transform_point3(p);
        assert!((via_matrix - t.transform_point(p)).length() < 1e-4);

        let back = t.inverse_matrix().transform_point3(via_matrix);
        assert!((back - p).length() < 1e-4);
    }

    #[test]
    fn test_from_matrix_keeps_axis_scale() {
        let t = Transform::new(Vec3::new(4.0, 5.0, 6.0), Quat::from_rotation_z(0.4), Vec3::new(1.0, 2.0, 1.0));
        assert_transform_eq(&Transform::from_matrix(t.to_matrix()), &t);
    }
}
