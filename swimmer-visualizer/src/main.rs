use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use image::RgbaImage;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, LevelFilter};
use minimp4::Mp4Muxer;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use rayon::prelude::*;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Instant;
use swimmer_common::{PhysicsConfig, ReplicaHistory};
use swimmer_engine::actor::Actor;
use swimmer_engine::camera::Camera;
use swimmer_engine::cell::{draw_agent, CellShape};
use swimmer_engine::output::load_histories;
use swimmer_engine::simulation::world_bounds;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Saved replica histories (.json, .bin or .msgpack)
    #[arg(short, long)]
    input: PathBuf,

    /// Physics parameters the histories were produced with
    #[arg(short, long)]
    physics: PathBuf,

    /// Output video file path (.mp4)
    #[arg(short, long, default_value = "swimmers.mp4")]
    output: PathBuf,

    /// Replica to render
    #[arg(long, default_value_t = 0)]
    replica: usize,

    /// Width of the output video in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Height of the output video in pixels (square if not provided)
    #[arg(long)]
    height: Option<u32>,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Render every n-th saved step
    #[arg(long, default_value_t = 1)]
    stride: usize,
}

/// Everything needed to draw one saved step of a replica.
struct Scene {
    walls: Vec<Actor>,
    shape: CellShape,
    tumble_delay: f64,
    camera_bounds: swimmer_engine::grid::Bounds,
    width: u32,
    height: u32,
}

impl Scene {
    fn draw(&self, history: &ReplicaHistory, k: usize) -> RgbaImage {
        let mut camera = Camera::fit(self.camera_bounds, self.width, self.height);
        for wall in &self.walls {
            wall.draw(0, &mut camera);
        }
        for saved in &history.agents {
            if let Some(instance) = saved.get(k) {
                draw_agent(&mut camera, &self.shape, instance, self.tumble_delay);
            }
        }
        camera.into_image()
    }
}

/// BT.601 conversion to planar YUV 4:2:0; dimensions must be even.
fn rgb_to_yuv420(image: &RgbaImage) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let luma_size = width * height;
    let mut yuv = vec![0u8; luma_size + luma_size / 2];

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, _] = pixel.0.map(f32::from);
        yuv[y as usize * width + x as usize] = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
    }

    let (u_plane, v_plane) = yuv[luma_size..].split_at_mut(luma_size / 4);
    for by in 0..height / 2 {
        for bx in 0..width / 2 {
            let mut sum_u = 0f32;
            let mut sum_v = 0f32;
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let [r, g, b, _] = image.get_pixel((2 * bx + dx) as u32, (2 * by + dy) as u32).0.map(f32::from);
                sum_u += -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
                sum_v += 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
            }
            u_plane[by * (width / 2) + bx] = (sum_u / 4.0).round().clamp(0.0, 255.0) as u8;
            v_plane[by * (width / 2) + bx] = (sum_v / 4.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    yuv
}

fn even(pixels: u32) -> u32 {
    (pixels & !1).max(2)
}

fn main() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    Builder::from_default_env().filter(None, LevelFilter::Info).init();

    info!("Starting swimmer visualizer...");
    info!("Input file: {}", args.input.display());
    info!("Output video: {}", args.output.display());

    let physics = PhysicsConfig::load(&args.physics)?;
    let histories = load_histories(&args.input)?;
    let history = histories
        .iter()
        .find(|history| history.replica == args.replica)
        .with_context(|| format!("Replica {} not found in '{}'", args.replica, args.input.display()))?;

    let n_saved = history.n_saved_steps();
    if n_saved == 0 {
        warn!("Replica {} contains no saved steps. Exiting.", args.replica);
        return Ok(());
    }

    let width = even(args.width);
    let height = even(args.height.unwrap_or(args.width));
    let scene = Scene {
        walls: physics.walls.iter().map(Actor::from_wall_config).collect(),
        shape: CellShape::from_config(&physics.cell.shape),
        tumble_delay: physics.cell.propulsion.tumble.delay,
        camera_bounds: world_bounds(&physics),
        width,
        height,
    };
    let steps: Vec<usize> = (0..n_saved).step_by(args.stride.max(1)).collect();
    info!(
        "Rendering {} frames of {} cells at {}x{} px, {} fps.",
        steps.len(),
        history.agents.len(),
        width,
        height,
        args.fps
    );

    let start_time = Instant::now();
    let style = ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} [{eta}]")?
        .progress_chars("#>-");

    // Frames are independent: draw and convert them in parallel.
    let render_progress = ProgressBar::new(steps.len() as u64).with_style(style.clone());
    render_progress.set_message("frames drawn");
    let yuv_frames: Vec<Vec<u8>> = steps
        .par_iter()
        .map(|&k| {
            let yuv = rgb_to_yuv420(&scene.draw(history, k));
            render_progress.inc(1);
            yuv
        })
        .collect();
    render_progress.finish();

    let mut encoder = Encoder::with_api_config(
        openh264::OpenH264API::from_source(),
        EncoderConfig::new()
            .max_frame_rate(FrameRate::from_hz(args.fps as f32))
            .bitrate(BitRate::from_bps(5_000_000)),
    )
    .context("Failed to initialize H.264 encoder")?;

    let encode_progress = ProgressBar::new(yuv_frames.len() as u64).with_style(style);
    encode_progress.set_message("frames encoded");
    let mut h264_data = Vec::new();
    let mut frame_count = 0usize;
    for (index, yuv_data) in yuv_frames.into_iter().enumerate() {
        let yuv_source = YUVBuffer::from_vec(yuv_data, width as usize, height as usize);
        match encoder.encode(&yuv_source) {
            Ok(bitstream) => {
                bitstream.write_vec(&mut h264_data);
                frame_count += 1;
            }
            Err(e) => error!("Error encoding frame {}: {}", index, e),
        }
        encode_progress.inc(1);
    }
    encode_progress.finish();

    info!("Creating MP4 file...");
    let mut video_buffer = Cursor::new(Vec::new());
    let mut mp4muxer = Mp4Muxer::new(&mut video_buffer);
    let description = format!("Run-and-tumble swimmers - replica {}, {} cells", args.replica, history.agents.len());
    mp4muxer.init_video(width as i32, height as i32, false, &description);
    mp4muxer.write_video(&h264_data);
    mp4muxer.close();

    fs::write(&args.output, video_buffer.into_inner())
        .with_context(|| format!("Failed to write video file to {}", args.output.display()))?;

    let duration = start_time.elapsed();
    info!(
        "Video generation completed in {:.2?} ({:.1} frames per second)",
        duration,
        frame_count as f64 / duration.as_secs_f64()
    );
    info!("Output saved to: {}", args.output.display());
    Ok(())
}
