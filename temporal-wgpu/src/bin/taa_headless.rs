//! Headless TAA run: a jittered checkerboard plane plus one moving cube, resolved
//! through the full motion-vector and blend pipeline, then read back.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glam::{Mat4, UVec2, Vec3, Vec4Swizzles};
use temporal_render::{
    CameraFrame, CameraId, CameraKind, CameraTargets, FrameOutcome, ImageFormat, KernelLibrary,
    RenderObject, TaaResult, TaaSettings, TemporalAntiAliasing,
};
use temporal_wgpu::{SceneRenderer, WgpuHost, WgpuTaaBackend};

#[derive(Parser)]
#[command(
    name = "taa-headless",
    about = "Resolve a jittered test scene through temporal anti-aliasing without a window",
    version
)]
struct Cli {
    #[arg(long, default_value_t = 320)]
    width: u32,
    #[arg(long, default_value_t = 180)]
    height: u32,
    /// Frames to accumulate before reading the output back
    #[arg(long, default_value_t = 16)]
    frames: u32,
    /// JSON settings file; defaults apply when omitted
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Sideways camera motion per frame, in world units
    #[arg(long, default_value_t = 0.0)]
    pan: f32,
}

const CHECKER_LIGHT: u8 = 230;
const CHECKER_DARK: u8 = 40;
const SKY: [u8; 4] = [90, 130, 200, 255];

/// CPU ray-cast of an infinite checkerboard at y = 0. Writes color only; depth stays
/// at the far plane so static motion is reconstructed at infinity.
struct CheckerboardScene {
    cell: f32,
    texels: Vec<u8>,
}

impl CheckerboardScene {
    fn shade(&self, inv_view_proj: &Mat4, ndc_x: f32, ndc_y: f32) -> [u8; 4] {
        let near = inv_view_proj.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far = inv_view_proj.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        let dir = far - near;
        if dir.y > -1e-6 {
            return SKY;
        }
        let hit = near + dir * (-near.y / dir.y);
        let parity = ((hit.x / self.cell).floor() as i64 + (hit.z / self.cell).floor() as i64) & 1;
        let v = if parity == 0 { CHECKER_LIGHT } else { CHECKER_DARK };
        [v, v, v, 255]
    }
}

impl SceneRenderer for CheckerboardScene {
    fn render(
        &mut self,
        backend: &mut WgpuTaaBackend,
        frame: &CameraFrame,
        projection: &Mat4,
    ) -> TaaResult<()> {
        let (w, h) = (frame.viewport.x, frame.viewport.y);
        let inv = (frame.clip.matrix() * *projection * frame.view).inverse();

        self.texels.clear();
        self.texels.reserve((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let ndc_x = (x as f32 + 0.5) / w as f32 * 2.0 - 1.0;
                let ndc_y = 1.0 - (y as f32 + 0.5) / h as f32 * 2.0;
                self.texels.extend_from_slice(&self.shade(&inv, ndc_x, ndc_y));
            }
        }
        backend.write_rgba8(frame.targets.color, &self.texels)?;
        backend.clear_depth_stencil(frame.targets.depth_stencil, 1.0, 0)
    }
}

fn cube() -> (Vec<f32>, Vec<u32>) {
    #[rustfmt::skip]
    let positions = vec![
        -0.5, -0.5, -0.5,   0.5, -0.5, -0.5,   0.5, 0.5, -0.5,   -0.5, 0.5, -0.5,
        -0.5, -0.5,  0.5,   0.5, -0.5,  0.5,   0.5, 0.5,  0.5,   -0.5, 0.5,  0.5,
    ];
    #[rustfmt::skip]
    let indices = vec![
        4, 5, 6, 4, 6, 7, // +z
        1, 0, 3, 1, 3, 2, // -z
        5, 1, 2, 5, 2, 6, // +x
        0, 4, 7, 0, 7, 3, // -x
        7, 6, 2, 7, 2, 3, // +y
        0, 1, 5, 0, 5, 4, // -y
    ];
    (positions, indices)
}

fn cube_model(frame: u32) -> Mat4 {
    let t = frame as f32 * 0.1;
    Mat4::from_translation(Vec3::new(t.sin() * 2.0, 0.5, -1.0)) * Mat4::from_rotation_y(t)
}

fn load_settings(path: Option<&PathBuf>) -> Result<TaaSettings> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(TaaSettings::from_json(&json)?)
        }
        None => Ok(TaaSettings::default()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_ref())?;

    let mut backend = WgpuTaaBackend::new_headless(KernelLibrary::builtin())?;
    let mut taa = TemporalAntiAliasing::new(settings, backend.library());
    if let Some(reason) = taa.disabled_reason() {
        log::warn!("TAA disabled, frames pass through: {reason}");
    }

    let viewport = UVec2::new(cli.width, cli.height);
    let targets = CameraTargets {
        color: backend.create_color_target("Scene Color", cli.width, cli.height, ImageFormat::Rgba8Unorm),
        depth_stencil: backend.create_depth_stencil_target("Scene Depth", cli.width, cli.height),
        output: backend.create_color_target("Output", cli.width, cli.height, ImageFormat::Rgba8Unorm),
    };
    let (positions, indices) = cube();
    let mesh = backend.upload_mesh(&positions, &indices);

    let projection = Mat4::perspective_rh(
        60f32.to_radians(),
        cli.width as f32 / cli.height.max(1) as f32,
        0.1,
        100.0,
    );
    let mut scene = CheckerboardScene {
        cell: 1.0,
        texels: Vec::new(),
    };

    // Prev equals Curr once a frame ends, so motion is measured across each call
    let mut camera_moved = 0.0;
    for i in 0..cli.frames {
        let eye = Vec3::new(cli.pan * i as f32, 2.0, 6.0);
        let view = Mat4::look_at_rh(eye, eye + Vec3::new(0.0, -0.3, -1.0), Vec3::Y);
        let frame = CameraFrame::new(CameraId(1), CameraKind::Game, viewport, view, projection, targets)
            .with_color_format(ImageFormat::Rgba8Unorm);
        let cube = RenderObject::new(1, mesh, cube_model(i.saturating_sub(1))).moved_to(cube_model(i));

        let before = taa
            .camera(CameraId(1))
            .map(|ctx| ctx.matrices().matrices().view_proj_curr);
        let mut host = WgpuHost::new(&mut backend, &mut scene);
        match taa.render_frame(&frame, &[cube], &mut host)? {
            FrameOutcome::Degraded { reason } => log::warn!("frame {i} degraded: {reason}"),
            outcome => log::debug!("frame {i}: {outcome:?}"),
        }
        if let (Some(before), Some(ctx)) = (before, taa.camera(CameraId(1))) {
            let after = ctx.matrices().matrices().view_proj_curr;
            camera_moved = (after.w_axis - before.w_axis).xyz().length();
        }
    }

    let texels = backend.read_rgba8(targets.output)?;
    let pixels = texels.len() / 4;
    let mean = texels
        .chunks_exact(4)
        .map(|p| Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32))
        .sum::<Vec3>()
        / pixels.max(1) as f32;
    // grey texels strictly between the two checker shades were blended across an edge
    let blended = texels
        .chunks_exact(4)
        .filter(|p| p[0] == p[1] && p[1] == p[2])
        .filter(|p| p[0] > CHECKER_DARK + 8 && p[0] < CHECKER_LIGHT - 8)
        .count();

    if let Some(ctx) = taa.camera(CameraId(1)) {
        log::info!(
            "{}: {} frames, history slot {}, jitter {:?}, camera moved {:.3} last frame",
            ctx.id(),
            ctx.frame_index(),
            ctx.history().write_index(),
            ctx.jitter().current,
            camera_moved
        );
    }
    println!(
        "{}x{} after {} frames: mean rgb {:.1} {:.1} {:.1}, {} of {} texels blended",
        cli.width, cli.height, cli.frames, mean.x, mean.y, mean.z, blended, pixels
    );

    taa.release_all(&mut backend);
    backend.destroy_mesh(mesh);
    // only the three host targets remain
    log::debug!("{} images live after release", backend.image_count());
    Ok(())
}
