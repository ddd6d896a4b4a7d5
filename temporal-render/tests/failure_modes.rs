mod common;

use common::*;
use glam::{UVec2, Vec3};
use temporal_render::*;

fn debug_settings(view: DebugView) -> TaaSettings {
    TaaSettings {
        debug: Some(DebugSettings {
            enabled: true,
            intensity: 25.0,
            view,
        }),
        ..Default::default()
    }
}

fn strip_debug_fields(mut list: CommandList) -> CommandList {
    list.uniforms.quality_flags[3] = 0;
    list.uniforms.debug_intensity = 0.0;
    list.uniforms.debug_view = 0;
    list
}

#[test]
fn debug_overlay_changes_only_the_presented_output() {
    init_logging();
    let mut plain = taa(TaaSettings::default());
    let mut debug = taa(debug_settings(DebugView::Mask));
    let mut plain_host = RecordingHost::new();
    let mut debug_host = RecordingHost::new();

    for i in 0..4 {
        let frame = camera_frame(1, CameraKind::Game, UVec2::new(200, 100), Vec3::new(i as f32, 0.0, 5.0));
        plain.render_frame(&frame, &[], &mut plain_host).unwrap();
        debug.render_frame(&frame, &[], &mut debug_host).unwrap();

        let a = plain.camera(CameraId(1)).unwrap();
        let b = debug.camera(CameraId(1)).unwrap();
        assert_eq!(a.matrices().matrices(), b.matrices().matrices());
        assert_eq!(a.jitter(), b.jitter());
        assert_eq!(a.history().write_index(), b.history().write_index());
    }

    assert_eq!(plain_host.submitted.len(), debug_host.submitted.len());
    for (a, b) in plain_host.submitted.iter().zip(&debug_host.submitted) {
        let mut a = strip_debug_fields(a.clone());
        let mut b = strip_debug_fields(b.clone());
        if a.stage == TaaStage::TemporalBlend {
            let present_a = a.commands.pop().unwrap();
            let present_b = b.commands.pop().unwrap();
            assert!(matches!(present_a, RenderCommand::Copy { .. }));
            assert_eq!(present_b.kernel(), Some(KernelId::DebugOverlay));
            assert_eq!(present_a.target(), present_b.target());
        }
        assert_eq!(a, b);
    }

    let u = debug_host.last_blend().uniforms;
    assert_eq!(u.quality_flags[3], 1);
    assert_eq!(u.debug_view, 1);
    assert_eq!(u.debug_intensity, 25.0);
}

#[test]
fn disabled_debug_block_presents_normally() {
    let mut settings = debug_settings(DebugView::MotionVectors);
    if let Some(d) = settings.debug.as_mut() {
        d.enabled = false;
    }
    let mut taa = taa(settings);
    let mut host = RecordingHost::new();
    taa.render_frame(&game_frame(UVec2::new(64, 64)), &[], &mut host)
        .unwrap();
    assert!(matches!(
        host.last_blend().commands.last(),
        Some(RenderCommand::Copy { .. })
    ));
}

#[test]
fn missing_kernel_bypasses_every_frame() {
    let mut library = KernelLibrary::builtin();
    library.remove(KernelId::StaticMotion);
    let mut taa = TemporalAntiAliasing::new(TaaSettings::default(), &library);
    let mut host = RecordingHost::new();
    let frame = game_frame(UVec2::new(64, 64));

    for _ in 0..2 {
        assert_eq!(taa.render_frame(&frame, &[], &mut host).unwrap(), FrameOutcome::Bypassed);
    }
    assert!(host.allocations.is_empty());
    assert!(host.rendered.iter().all(|(_, p)| *p == frame.projection));
    assert_eq!(host.submitted.len(), 2);
    assert_eq!(
        host.submitted[0].commands,
        vec![RenderCommand::Copy {
            source: COLOR,
            destination: OUTPUT
        }]
    );
}

#[test]
fn bypass_without_distinct_output_submits_nothing() {
    let mut library = KernelLibrary::builtin();
    library.remove(KernelId::Sharpen);
    let mut taa = TemporalAntiAliasing::new(TaaSettings::default(), &library);
    let mut host = RecordingHost::new();
    let mut frame = game_frame(UVec2::new(64, 64));
    frame.targets.output = frame.targets.color;

    taa.render_frame(&frame, &[], &mut host).unwrap();
    assert!(host.submitted.is_empty());
    assert_eq!(host.rendered.len(), 1);
}

#[test]
fn history_allocation_failure_degrades_one_frame() {
    init_logging();
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    let frame = game_frame(UVec2::new(160, 90));

    taa.render_frame(&frame, &[], &mut host).unwrap();
    taa.render_frame(&frame, &[], &mut host).unwrap();
    let before = *taa.camera(CameraId(1)).unwrap().matrices().matrices();

    // A resize forces reallocation, which fails once.
    let resized = game_frame(UVec2::new(320, 180));
    host.fail_next("history B");
    let outcome = taa.render_frame(&resized, &[], &mut host).unwrap();
    assert!(matches!(outcome, FrameOutcome::Degraded { .. }));
    assert_eq!(
        host.last_blend().commands,
        vec![RenderCommand::Copy {
            source: COLOR,
            destination: OUTPUT
        }]
    );

    let ctx = taa.camera(CameraId(1)).unwrap();
    assert!(!ctx.history().is_history_valid());
    assert!(ctx.history().current_slots().is_none());
    assert_eq!(ctx.frame_index(), 3);
    assert_eq!(ctx.matrices().matrices().view_proj_prev, ctx.matrices().matrices().view_proj_curr);
    assert_eq!(ctx.matrices().matrices().view_proj_curr, before.view_proj_curr);

    // Next frame allocates again and starts from an invalid history.
    assert_eq!(taa.render_frame(&resized, &[], &mut host).unwrap(), FrameOutcome::Resolved);
    assert_eq!(host.last_blend().uniforms.history_valid, 0);
}

#[test]
fn scratch_allocation_failure_skips_motion_vectors() {
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    host.fail_next("velocity");
    let outcome = taa
        .render_frame(&game_frame(UVec2::new(32, 32)), &[], &mut host)
        .unwrap();
    assert!(matches!(outcome, FrameOutcome::Degraded { .. }));
    assert!(host.lists_for(TaaStage::ComputeMotionVectors).is_empty());
    assert!(host
        .allocations
        .iter()
        .all(|(label, _)| !label.contains("history")));
}

#[test]
fn removing_a_camera_releases_its_images() {
    let mut taa = taa(TaaSettings::default());
    let mut host = RecordingHost::new();
    taa.render_frame(&game_frame(UVec2::new(64, 64)), &[], &mut host)
        .unwrap();
    taa.render_frame(
        &camera_frame(2, CameraKind::Reflection, UVec2::new(32, 32), Vec3::ZERO),
        &[],
        &mut host,
    )
    .unwrap();
    assert_eq!(host.live.len(), 10);

    taa.remove_camera(CameraId(1), &mut host).unwrap();
    assert_eq!(host.live.len(), 5);
    assert!(matches!(
        taa.remove_camera(CameraId(1), &mut host),
        Err(TaaError::UnknownCamera(CameraId(1)))
    ));

    taa.release_all(&mut host);
    assert!(host.live.is_empty());
    assert!(taa.cameras().is_empty());
}

#[test]
fn failing_host_render_leaves_camera_ready_for_next_frame() {
    struct FailingHost(RecordingHost, bool);
    impl ImageAllocator for FailingHost {
        fn allocate_image(&mut self, label: &str, desc: &ImageDesc) -> TaaResult<ImageHandle> {
            self.0.allocate_image(label, desc)
        }
        fn release_image(&mut self, image: ImageHandle) {
            self.0.release_image(image)
        }
    }
    impl RenderHost for FailingHost {
        fn render_scene(&mut self, frame: &CameraFrame, projection: &glam::Mat4) -> TaaResult<()> {
            if self.1 {
                self.1 = false;
                return Err(TaaError::backend("device lost"));
            }
            self.0.render_scene(frame, projection)
        }
        fn submit(&mut self, commands: CommandList) -> TaaResult<()> {
            self.0.submit(commands)
        }
    }

    let mut taa = taa(TaaSettings::default());
    let mut host = FailingHost(RecordingHost::new(), true);
    let frame = game_frame(UVec2::new(64, 64));
    assert!(taa.render_frame(&frame, &[], &mut host).is_err());
    let ctx = taa.camera(CameraId(1)).unwrap();
    assert_eq!(ctx.frame_index(), 0);
    assert_eq!(ctx.completed_stage(), None);

    assert_eq!(taa.render_frame(&frame, &[], &mut host).unwrap(), FrameOutcome::Resolved);
    assert_eq!(taa.camera(CameraId(1)).unwrap().frame_index(), 1);
}

/// Fails the first submit of one stage, then behaves like a normal host.
struct FailingSubmitHost {
    inner: RecordingHost,
    fail_stage: Option<TaaStage>,
}

impl ImageAllocator for FailingSubmitHost {
    fn allocate_image(&mut self, label: &str, desc: &ImageDesc) -> TaaResult<ImageHandle> {
        self.inner.allocate_image(label, desc)
    }
    fn release_image(&mut self, image: ImageHandle) {
        self.inner.release_image(image)
    }
}

impl RenderHost for FailingSubmitHost {
    fn render_scene(&mut self, frame: &CameraFrame, projection: &glam::Mat4) -> TaaResult<()> {
        self.inner.render_scene(frame, projection)
    }
    fn submit(&mut self, commands: CommandList) -> TaaResult<()> {
        if self.fail_stage == Some(commands.stage) {
            self.fail_stage = None;
            return Err(TaaError::backend("queue submit failed"));
        }
        self.inner.submit(commands)
    }
}

fn failed_submit_restarts_history(stage: TaaStage) {
    init_logging();
    let mut taa = taa(TaaSettings::default());
    let mut host = FailingSubmitHost {
        inner: RecordingHost::new(),
        fail_stage: None,
    };
    let frame = game_frame(UVec2::new(64, 64));

    taa.render_frame(&frame, &[], &mut host).unwrap();
    taa.render_frame(&frame, &[], &mut host).unwrap();
    let settled = taa.camera(CameraId(1)).unwrap();
    let (jitter, write_index) = (settled.jitter(), settled.history().write_index());
    let prev = settled.matrices().matrices().view_proj_prev;
    assert!(settled.history().is_history_valid());

    host.fail_stage = Some(stage);
    assert!(taa.render_frame(&frame, &[], &mut host).is_err());
    let ctx = taa.camera(CameraId(1)).unwrap();
    assert_eq!(ctx.frame_index(), 2);
    assert_eq!(ctx.completed_stage(), None);
    assert_eq!(ctx.jitter(), jitter);
    assert_eq!(ctx.history().write_index(), write_index);
    assert_eq!(ctx.matrices().matrices().view_proj_prev, prev);
    assert!(!ctx.history().is_history_valid());

    assert_eq!(taa.render_frame(&frame, &[], &mut host).unwrap(), FrameOutcome::Resolved);
    assert_eq!(host.inner.last_blend().uniforms.history_valid, 0);
    let ctx = taa.camera(CameraId(1)).unwrap();
    assert_eq!(ctx.frame_index(), 3);
    assert!(ctx.history().is_history_valid());
}

#[test]
fn failed_motion_submit_invalidates_history() {
    failed_submit_restarts_history(TaaStage::ComputeMotionVectors);
}

#[test]
fn failed_blend_submit_does_not_end_the_frame() {
    failed_submit_restarts_history(TaaStage::TemporalBlend);
}

#[test]
fn failed_first_blend_submit_leaves_history_unwritten() {
    let mut taa = taa(TaaSettings::default());
    let mut host = FailingSubmitHost {
        inner: RecordingHost::new(),
        fail_stage: Some(TaaStage::TemporalBlend),
    };
    let frame = game_frame(UVec2::new(64, 64));

    assert!(taa.render_frame(&frame, &[], &mut host).is_err());
    let ctx = taa.camera(CameraId(1)).unwrap();
    assert_eq!(ctx.frame_index(), 0);
    assert!(!ctx.history().is_history_valid());
    assert!(!ctx.matrices().is_primed());

    taa.render_frame(&frame, &[], &mut host).unwrap();
    assert_eq!(host.inner.last_blend().uniforms.history_valid, 0);
    assert_eq!(taa.camera(CameraId(1)).unwrap().frame_index(), 1);
}
