//! 无窗口沙盒：搭建一个演示场景并运行若干帧
//!
//! 场景内容：
//! - 程序生成的两节模型 + 两个动画片段，跟随者用 1D 混合树播放
//! - 跟随者沿 Bezier 曲线移动，速度驱动动画快慢
//! - CCD / FABRIK 关节链各一条，目标绕圈移动
//! - 双骨骼 IK，由模拟的指针输入驱动
//!
//! 运行：`RUST_LOG=info cargo run --features sandbox --bin sandbox`

use anim_engine::animation::{AnimationClip, ChannelPath, Interpolation, Sampler};
use anim_engine::curves::CurveKind;
use anim_engine::scene::{InputState, ModelNode, ModelResource};
use anim_engine::{
    Animator, BlendTree, CurveComponent, FrameContext, IkSolver, NodeId, Resources, Result,
    SceneGraph, Transform, TwoBoneIk,
};
use glam::{Quat, Vec2, Vec3};

const FRAMES: usize = 240;
const DT: f32 = 1.0 / 60.0;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("[Sandbox] 运行失败: {}", e);
        std::process::exit(1);
    }
}

/// 两节腿：hip → knee
fn leg_model() -> ModelResource {
    let mut model = ModelResource::new("walker");
    let hip = model.add_node(ModelNode::new("hip", Transform::IDENTITY), None);
    model.add_node(
        ModelNode::new("knee", Transform::from_translation(Vec3::new(0.0, -1.0, 0.0))),
        Some(hip),
    );
    model
}

/// 膝关节绕 X 轴摆动的片段
fn swing_clip(name: &str, amplitude: f32, period: f32) -> Result<AnimationClip> {
    let times: Vec<f32> = (0..=8).map(|i| period * i as f32 / 8.0).collect();
    let rotations = times
        .iter()
        .map(|t| Quat::from_rotation_x(amplitude * (t / period * std::f32::consts::TAU).sin()))
        .collect();

    let mut clip = AnimationClip::new(name);
    clip.add_track(1, ChannelPath::Rotation, Sampler::quat(Interpolation::Linear, times, rotations))?;
    Ok(clip)
}

fn build_walker(scene: &mut SceneGraph, resources: &mut Resources) -> Result<NodeId> {
    let model = resources.add_model(leg_model());
    let walk = resources.add_clip(model, swing_clip("walk", 0.4, 1.0)?)?;
    let run = resources.add_clip(model, swing_clip("run", 0.9, 0.6)?)?;

    let mut tree = BlendTree::new();
    tree.create_1d();
    tree.insert_blend_node(walk, Vec2::new(0.0, 0.0))?;
    tree.insert_blend_node(run, Vec2::new(1.0, 0.0))?;
    tree.set_blend_param(Vec2::new(0.3, 0.0));

    let walker = scene.create_model_instance(resources, model)?;
    scene.add_component(walker, Animator::with_blend_tree(tree))?;
    Ok(walker)
}

fn build_path(scene: &mut SceneGraph, follower: NodeId) -> Result<NodeId> {
    let owner = CurveComponent::spawn(scene, CurveKind::Bezier)?;
    CurveComponent::edit(scene, owner, |curve, scene| {
        for p in [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 3.0),
            Vec3::new(5.0, 0.0, 2.0),
            Vec3::new(7.0, 0.0, 6.0),
        ] {
            curve.add_point(scene, owner, p)?;
        }
        curve.set_follower(Some(follower));
        curve.controller_mut().set_rate_of_travel(1.4);
        Ok(())
    })?;
    Ok(owner)
}

fn build_chain(scene: &mut SceneGraph, solver: IkSolver, name: &str, base: Vec3) -> Result<NodeId> {
    let target = scene.create_root_child(name)?;
    scene.add_component(target, solver)?;
    IkSolver::edit(scene, target, |solver, scene| {
        solver.default_chain(scene, 5)?;
        let root_joint = solver.joints()[0];
        scene.set_local_position(root_joint, base)?;
        scene.update_world_from(root_joint)
    })?;
    Ok(target)
}

fn run() -> Result<()> {
    let mut resources = Resources::new();
    let mut scene = SceneGraph::new();

    let walker = build_walker(&mut scene, &mut resources)?;
    let path = build_path(&mut scene, walker)?;

    let ccd_target = build_chain(&mut scene, IkSolver::ccd(), "ccd target", Vec3::new(-6.0, 0.0, 0.0))?;
    let fabrik_target = build_chain(&mut scene, IkSolver::fabrik(), "fabrik target", Vec3::new(-6.0, 0.0, 6.0))?;

    let arm = TwoBoneIk::spawn(&mut scene, 1.5, 1.0)?;
    scene.set_local_position(arm, Vec3::new(0.0, 3.0, 0.0))?;
    scene.update_node_transforms();

    log::info!("[Sandbox] 场景节点数: {}", scene.len());

    for frame in 0..FRAMES {
        let t = frame as f32 * DT;

        // 目标绕圈移动
        let orbit = Vec3::new(t.cos() * 2.5, t.sin() * 2.5, 0.5);
        scene.set_local_position(ccd_target, Vec3::new(-6.0, 0.0, 0.0) + orbit)?;
        scene.set_local_position(fabrik_target, Vec3::new(-6.0, 0.0, 6.0) + orbit)?;
        scene.update_node_transforms();

        // 前半段指针按下拖动
        let input = InputState {
            pointer_down: frame < FRAMES / 2,
            pointer_world: Some(Vec3::new(1.2 + 0.5 * t.sin(), 4.0, 0.0)),
        };
        let ctx = FrameContext::new(DT, &resources).with_input(input);
        scene.update(&ctx);

        if frame % 60 == 0 {
            report(&scene, walker, path, ccd_target, fabrik_target, arm)?;
        }
    }

    report(&scene, walker, path, ccd_target, fabrik_target, arm)?;
    Ok(())
}

fn report(
    scene: &SceneGraph,
    walker: NodeId,
    path: NodeId,
    ccd_target: NodeId,
    fabrik_target: NodeId,
    arm: NodeId,
) -> Result<()> {
    let node = scene.get(walker)?;
    let anim_time = node.animator().map_or(0.0, |a| a.time());
    let factor = node.animator().map_or(1.0, |a| a.anim_factor());
    log::info!(
        "[Sandbox] walker 位置 {:.2?}, 动画时间 {:.2}, 速度系数 {:.2}",
        node.world_position(),
        anim_time,
        factor
    );

    if let Some(curve) = scene.get(path)?.curve() {
        log::info!(
            "[Sandbox] 曲线长度 {:.3}, 参数 {:.3}",
            curve.table().total_distance(),
            curve.controller().param()
        );
    }

    for (label, target) in [("CCD", ccd_target), ("FABRIK", fabrik_target)] {
        if let Some(solver) = scene.get(target)?.ik() {
            log::info!(
                "[Sandbox] {} 状态 {:?}, 末端误差 {:.4}",
                label,
                solver.status(),
                solver.end_effector(scene)?.distance(scene.world_position(target)?)
            );
        }
    }

    if let Some(ik) = scene.get(arm)?.two_bone_ik() {
        log::info!(
            "[Sandbox] 双骨骼 IK 目标 {:.2?}, 可达 {}",
            ik.target(),
            ik.is_reachable()
        );
    }
    Ok(())
}
