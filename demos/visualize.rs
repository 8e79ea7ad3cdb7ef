/// rna-kit · live training preview
///
/// Trains a toy "denoiser" on synthetic shapes and shows, after the first
/// epoch and every second one after it, five random noisy inputs, what the model makes of them and
/// the clean originals.
///
/// Run with:
///   cargo run --example visualize
/// Then open http://127.0.0.1:7878
///
/// Or write the preview to a file instead of serving it:
///   cargo run --example visualize -- preview.png

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rna_kit::{
    train_loop, DisplaySlot, EpochStats, FileSlot, HttpSlot, Image, Result, TrainConfig,
    TrainingVisualizer, VisualizerConfig,
};

const SIDE: u32 = 28;
const SAMPLES: usize = 40;
const EPOCHS: usize = 20;

// ---------------------------------------------------------------------------
// Synthetic data
// ---------------------------------------------------------------------------

/// A filled disc or square at a random position, 0–255 grayscale.
fn shape(rng: &mut StdRng) -> Image {
    let cx: f32 = rng.gen_range(8.0..20.0);
    let cy: f32 = rng.gen_range(8.0..20.0);
    let r: f32 = rng.gen_range(4.0..7.0);
    let square = rng.gen_bool(0.5);

    let mut img = Image::filled(SIDE, SIDE, 0.0);
    for y in 0..SIDE {
        for x in 0..SIDE {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let inside = if square {
                dx.abs() <= r && dy.abs() <= r
            } else {
                dx * dx + dy * dy <= r * r
            };
            if inside {
                img.data[(y * SIDE + x) as usize] = 255.0;
            }
        }
    }
    img
}

fn add_noise(img: &Image, rng: &mut StdRng) -> Image {
    let mut noisy = img.clone();
    for v in noisy.data.iter_mut() {
        *v = (*v + rng.gen_range(-120.0f32..120.0)).clamp(0.0, 255.0);
    }
    noisy
}

// ---------------------------------------------------------------------------
// Toy model
// ---------------------------------------------------------------------------

/// 3×3 mean filter followed by a threshold whose sharpness grows with the
/// number of completed epochs; stands in for a network that gets better.
fn denoise(img: &Image, progress: f32) -> Image {
    let w = img.width as i64;
    let h = img.height as i64;
    let mut out = img.clone();
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            let mut n = 0.0;
            for (nx, ny) in (-1..=1).flat_map(|dy| (-1..=1).map(move |dx| (x + dx, y + dy))) {
                if nx >= 0 && ny >= 0 && nx < w && ny < h {
                    sum += img.data[(ny * w + nx) as usize];
                    n += 1.0;
                }
            }
            let mean = sum / n;
            let hard = if mean > 127.5 { 255.0 } else { 0.0 };
            out.data[(y * w + x) as usize] = mean * (1.0 - progress) + hard * progress;
        }
    }
    out
}

/// Trains with the visualizer attached and hands the display back.
fn run<D: DisplaySlot>(display: D) -> Result<D> {
    let mut rng = StdRng::seed_from_u64(42);
    let clean: Vec<Image> = (0..SAMPLES).map(|_| shape(&mut rng)).collect();
    let noisy: Vec<Image> = clean.iter().map(|img| add_noise(img, &mut rng)).collect();

    let done = Arc::new(AtomicUsize::new(0));
    let predictor = {
        let done = done.clone();
        move |batch: &[Image]| -> Result<Vec<Image>> {
            let progress = done.load(Ordering::Relaxed) as f32 / EPOCHS as f32;
            Ok(batch.iter().map(|img| denoise(img, progress)).collect())
        }
    };

    let config = VisualizerConfig { interval: 2, draw_input: true, ..VisualizerConfig::default() };
    let mut visualizer = TrainingVisualizer::new(predictor, noisy, Some(clean), display, config)?;

    train_loop(
        &TrainConfig::new(EPOCHS),
        |epoch| {
            thread::sleep(Duration::from_millis(500));
            done.store(epoch, Ordering::Relaxed);
            let loss = 0.5 / epoch as f64;
            Ok(EpochStats::with_loss(loss).val_loss(loss * 1.2))
        },
        &mut [&mut visualizer],
    )?;
    Ok(visualizer.into_display())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rna_kit=debug")),
        )
        .init();

    match std::env::args().nth(1) {
        Some(path) => {
            println!("Writing preview to {}", path);
            run(FileSlot::new(path))?;
            Ok(())
        }
        None => {
            let slot = HttpSlot::bind("127.0.0.1:7878")?;
            println!("Preview at {}", slot.url());
            let _slot = run(slot)?;
            println!("Training finished; press Enter to stop the server.");
            let _ = std::io::stdin().read_line(&mut String::new());
            Ok(())
        }
    }
}
