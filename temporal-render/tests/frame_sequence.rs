mod common;

use approx::assert_relative_eq;
use common::*;
use glam::{Mat4, UVec2, Vec2, Vec3};
use temporal_render::motion_vectors::static_velocity;
use temporal_render::*;

#[test]
fn matrices_carry_over_bit_for_bit() {
    init_logging();
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    let viewport = UVec2::new(640, 360);

    let mut last_curr: Option<Mat4> = None;
    let mut last_inv: Option<Mat4> = None;
    for i in 0..12 {
        let frame = camera_frame(1, CameraKind::Game, viewport, Vec3::new(i as f32 * 0.3, 1.0, 10.0));
        taa.render_frame(&frame, &[], &mut host).unwrap();

        let u = host.last_blend().uniforms;
        if let (Some(curr), Some(inv)) = (last_curr, last_inv) {
            assert_eq!(u.prev_view_proj, curr.to_cols_array_2d(), "frame {i}");
            assert_eq!(u.prev_inv_view_proj, inv.to_cols_array_2d(), "frame {i}");
        }
        let m = taa.camera(CameraId(1)).unwrap().matrices().matrices();
        assert_eq!(m.view_proj_prev, m.view_proj_curr);
        last_curr = Some(m.view_proj_curr);
        last_inv = Some(m.inv_view_proj_curr);
    }
}

#[test]
fn history_slots_ping_pong() {
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    let frame = game_frame(UVec2::new(320, 240));

    let mut previous_write: Option<ImageHandle> = None;
    for _ in 0..6 {
        let before = taa.camera(CameraId(1)).map(|c| c.history().write_index());
        taa.render_frame(&frame, &[], &mut host).unwrap();
        let ctx = taa.camera(CameraId(1)).unwrap();
        assert_eq!(ctx.history().read_index() + ctx.history().write_index(), 1);
        if let Some(before) = before {
            assert_ne!(before, ctx.history().write_index());
        }

        let blend = host.last_blend();
        let RenderCommand::Fullscreen(pass) = &blend.commands[0] else {
            panic!("blend list starts with the blend pass");
        };
        if let Some(prev) = previous_write {
            assert_eq!(pass.inputs.history, Some(prev));
        }
        assert_ne!(pass.inputs.history, Some(pass.target));
        previous_write = Some(pass.target);
    }

    let history_allocs = host
        .allocations
        .iter()
        .filter(|(label, _)| label.contains("history"))
        .count();
    assert_eq!(history_allocs, 2);
}

#[test]
fn jitter_is_periodic_and_tracked_per_camera() {
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    let viewport = UVec2::new(256, 256);
    let a = camera_frame(1, CameraKind::Game, viewport, Vec3::ZERO);
    let b = camera_frame(2, CameraKind::SceneView, viewport, Vec3::ZERO);

    let mut jitters = Vec::new();
    for _ in 0..3 {
        taa.render_frame(&a, &[], &mut host).unwrap();
        jitters.push(taa.camera(CameraId(1)).unwrap().jitter().current);
    }
    taa.render_frame(&b, &[], &mut host).unwrap();
    assert_eq!(taa.camera(CameraId(2)).unwrap().jitter().current, jitters[0]);
    assert_eq!(taa.camera(CameraId(1)).unwrap().frame_index(), 3);
    assert_eq!(taa.camera(CameraId(2)).unwrap().frame_index(), 1);

    let seq = JitterSequencer::default();
    for (i, j) in jitters.iter().enumerate() {
        assert_eq!(*j, seq.sample(i as u64).offset);
        assert_eq!(seq.sample(i as u64), seq.sample(i as u64 + 1024));
    }
    let pair = taa.camera(CameraId(1)).unwrap().jitter();
    assert_eq!(pair.previous, jitters[1]);
}

#[test]
fn full_hd_first_frame_jitter_scenario() {
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    let viewport = UVec2::new(1920, 1080);
    let frame = game_frame(viewport);
    taa.render_frame(&frame, &[], &mut host).unwrap();

    let jitter = taa.camera(CameraId(1)).unwrap().jitter().current;
    assert!(jitter.x.abs() <= 0.5 && jitter.y.abs() <= 0.5);

    let (_, jittered) = host.rendered[0];
    let base = frame.projection;
    for col in 0..4 {
        for row in 0..4 {
            let d = (jittered.col(col)[row] - base.col(col)[row]).abs();
            match (col, row) {
                (2, 0) => assert!(d <= 1.0 / 960.0),
                (2, 1) => assert!(d <= 1.0 / 540.0),
                _ => assert_eq!(d, 0.0, "column {col} row {row} changed"),
            }
        }
    }
}

#[test]
fn static_camera_reuses_last_write_as_read() {
    let mut settings = TaaSettings::default();
    settings.quality.dynamic_frame_weight = 0.0;
    settings.quality.static_frame_weight = 1.0;
    let mut taa = taa(settings);
    let mut host = RecordingHost::new();
    let frame = game_frame(UVec2::new(800, 600));

    taa.render_frame(&frame, &[], &mut host).unwrap();
    let first_write = host.last_blend().commands[0].target();
    taa.render_frame(&frame, &[], &mut host).unwrap();

    let blend = host.last_blend();
    let RenderCommand::Fullscreen(pass) = &blend.commands[0] else {
        panic!("expected blend pass");
    };
    assert_eq!(pass.inputs.history, Some(first_write));
    assert_eq!(blend.uniforms.weights[1], 1.0);
    assert_eq!(blend.uniforms.weights[2], 0.0);
    assert_eq!(blend.uniforms.history_valid, 1);

    let m = taa.camera(CameraId(1)).unwrap().matrices().matrices();
    for uv in [Vec2::new(0.5, 0.5), Vec2::new(0.05, 0.95), Vec2::new(0.7, 0.3)] {
        let v = static_velocity(uv, 0.99, &m.inv_view_proj_curr, &m.view_proj_prev);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-4);
    }
}

#[test]
fn preview_camera_is_never_jittered_or_advanced() {
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    let frame = camera_frame(5, CameraKind::Preview, UVec2::new(128, 128), Vec3::ZERO);

    for _ in 0..3 {
        assert_eq!(taa.render_frame(&frame, &[], &mut host).unwrap(), FrameOutcome::Skipped);
    }
    assert!(taa.camera(CameraId(5)).is_none());
    assert!(host.submitted.is_empty());
    assert!(host.allocations.is_empty());
    assert!(host.rendered.iter().all(|(_, p)| *p == frame.projection));
}

#[test]
fn stages_are_submitted_in_fixed_order() {
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    let obj = RenderObject::new(1, MeshHandle(1), Mat4::IDENTITY)
        .moved_to(Mat4::from_translation(Vec3::X));

    taa.render_frame(&game_frame(UVec2::new(64, 64)), &[obj], &mut host)
        .unwrap();

    let stages: Vec<_> = host.submitted.iter().map(|l| l.stage).collect();
    assert_eq!(stages, vec![TaaStage::ComputeMotionVectors, TaaStage::TemporalBlend]);
    assert_eq!(
        host.submitted[0].kernels(),
        vec![KernelId::MotionMask, KernelId::DynamicMotion, KernelId::StaticMotion]
    );
    assert_eq!(
        host.submitted[1].kernels(),
        vec![KernelId::TemporalBlend, KernelId::MaskedBlend, KernelId::Sharpen]
    );
    assert_eq!(
        host.submitted[0].uniforms.curr_view_proj,
        host.submitted[1].uniforms.curr_view_proj
    );
    assert_eq!(host.submitted[0].uniforms.jitter, host.submitted[1].uniforms.jitter);
    assert_eq!(host.submitted[1].commands.last().map(RenderCommand::target), Some(OUTPUT));
}

#[test]
fn resolution_change_reallocates_history_and_invalidates_it() {
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    taa.render_frame(&game_frame(UVec2::new(320, 240)), &[], &mut host)
        .unwrap();
    taa.render_frame(&game_frame(UVec2::new(320, 240)), &[], &mut host)
        .unwrap();
    assert_eq!(host.last_blend().uniforms.history_valid, 1);

    taa.render_frame(&game_frame(UVec2::new(640, 480)), &[], &mut host)
        .unwrap();
    assert_eq!(host.last_blend().uniforms.history_valid, 0);
    let history = taa.camera(CameraId(1)).unwrap().history().desc().unwrap();
    assert_eq!((history.width, history.height), (640, 480));
    // history pair, resolve, velocity, mask
    assert_eq!(host.live.len(), 5);
}

#[test]
fn tier_change_switches_history_filter() {
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    let frame = game_frame(UVec2::new(100, 100));
    taa.render_frame(&frame, &[], &mut host).unwrap();
    assert_eq!(
        taa.camera(CameraId(1)).unwrap().history().desc().unwrap().filter,
        FilterMode::Bilinear
    );

    let mut low = TaaSettings::default();
    low.quality.tier = QualityTier::Low;
    taa.set_settings(low);
    taa.render_frame(&frame, &[], &mut host).unwrap();
    assert_eq!(
        taa.camera(CameraId(1)).unwrap().history().desc().unwrap().filter,
        FilterMode::Point
    );
    let blend = host.last_blend();
    assert_eq!(blend.uniforms.quality_flags, [1, 0, 0, 0]);
    assert_eq!(blend.uniforms.neighborhood_taps, 5);
    assert!(matches!(blend.commands[2], RenderCommand::Copy { .. }));
}
