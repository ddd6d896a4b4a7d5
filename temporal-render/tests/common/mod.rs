#![allow(dead_code)]

use glam::{Mat4, UVec2, Vec3};
use temporal_render::*;

/// Host double that hands out sequential image handles and records everything the
/// core asks of it.
#[derive(Debug, Default)]
pub struct RecordingHost {
    next_image: u64,
    pub live: Vec<ImageHandle>,
    pub allocations: Vec<(String, ImageDesc)>,
    /// Fail the next allocation whose label contains this text.
    pub fail_label: Option<String>,
    pub rendered: Vec<(CameraId, Mat4)>,
    pub submitted: Vec<CommandList>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            // host targets use low handles
            next_image: 100,
            ..Default::default()
        }
    }

    pub fn fail_next(&mut self, label: &str) {
        self.fail_label = Some(label.to_string());
    }

    pub fn lists_for(&self, stage: TaaStage) -> Vec<&CommandList> {
        self.submitted.iter().filter(|l| l.stage == stage).collect()
    }

    pub fn last_blend(&self) -> &CommandList {
        self.submitted
            .iter()
            .rev()
            .find(|l| l.stage == TaaStage::TemporalBlend)
            .expect("a blend list was submitted")
    }

    pub fn clear_records(&mut self) {
        self.rendered.clear();
        self.submitted.clear();
    }
}

impl ImageAllocator for RecordingHost {
    fn allocate_image(&mut self, label: &str, desc: &ImageDesc) -> TaaResult<ImageHandle> {
        if let Some(fail) = &self.fail_label {
            if label.contains(fail.as_str()) {
                self.fail_label = None;
                return Err(TaaError::allocation(label, "out of memory"));
            }
        }
        self.next_image += 1;
        let handle = ImageHandle(self.next_image);
        self.live.push(handle);
        self.allocations.push((label.to_string(), *desc));
        Ok(handle)
    }

    fn release_image(&mut self, image: ImageHandle) {
        self.live.retain(|h| *h != image);
    }
}

impl RenderHost for RecordingHost {
    fn render_scene(&mut self, frame: &CameraFrame, projection: &Mat4) -> TaaResult<()> {
        self.rendered.push((frame.id, *projection));
        Ok(())
    }

    fn submit(&mut self, commands: CommandList) -> TaaResult<()> {
        self.submitted.push(commands);
        Ok(())
    }
}

pub const COLOR: ImageHandle = ImageHandle(1);
pub const DEPTH: ImageHandle = ImageHandle(2);
pub const OUTPUT: ImageHandle = ImageHandle(3);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn projection(viewport: UVec2) -> Mat4 {
    Mat4::perspective_rh(1.0, viewport.x as f32 / viewport.y as f32, 0.1, 500.0)
}

pub fn view_from(eye: Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, eye + Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
}

pub fn camera_frame(id: u64, kind: CameraKind, viewport: UVec2, eye: Vec3) -> CameraFrame {
    CameraFrame::new(
        CameraId(id),
        kind,
        viewport,
        view_from(eye),
        projection(viewport),
        CameraTargets {
            color: COLOR,
            depth_stencil: DEPTH,
            output: OUTPUT,
        },
    )
}

pub fn game_frame(viewport: UVec2) -> CameraFrame {
    camera_frame(1, CameraKind::Game, viewport, Vec3::new(0.0, 1.0, 10.0))
}

pub fn taa(settings: TaaSettings) -> TemporalAntiAliasing {
    TemporalAntiAliasing::new(settings, &KernelLibrary::builtin())
}
