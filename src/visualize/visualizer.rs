use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::train::{EpochStats, TrainingCallback};
use crate::vision::Image;
use crate::visualize::display::{DisplaySlot, Frame};
use crate::visualize::figure::Figure;
use crate::visualize::predictor::Predictor;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Options for a [`TrainingVisualizer`].
///
/// # Fields
/// - `show_images` — images (columns) sampled per update
/// - `interval`    — render on epochs 1, 1 + interval, 1 + 2·interval, ...
/// - `draw_input`  — add a row with the raw inputs above the outputs
/// - `fig_size`    — `(width, height)` in inches; derived from the grid when `None`
/// - `seed`        — fixes the sampling sequence, mostly for tests and demos
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizerConfig {
    pub show_images: usize,
    pub interval: usize,
    pub draw_input: bool,
    pub fig_size: Option<(f32, f32)>,
    pub seed: Option<u64>,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        VisualizerConfig {
            show_images: 5,
            interval: 1,
            draw_input: false,
            fig_size: None,
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TrainingVisualizer
// ---------------------------------------------------------------------------

/// Training callback that shows what the model currently produces.
///
/// After the first epoch and every `interval` epochs after that it samples
/// `show_images` inputs without replacement, runs them through the predictor
/// and renders one column per sample: the input (optional), the prediction and the matching
/// reference image (when references were given). The figure, captioned with
/// the epoch's metrics, replaces whatever the display slot showed before.
pub struct TrainingVisualizer<P, D> {
    predictor: P,
    inputs: Vec<Image>,
    references: Option<Vec<Image>>,
    display: D,
    config: VisualizerConfig,
    figure: Option<Figure>,
    rng: StdRng,
}

impl<P: Predictor, D: DisplaySlot> TrainingVisualizer<P, D> {
    /// # Errors
    /// [`Error::Config`] when `show_images` or `interval` is zero, when there
    /// are fewer inputs than `show_images`, when `references` and `inputs`
    /// differ in length, when an image's buffer does not match its shape, or
    /// when the figure size is unusable.
    pub fn new(
        predictor: P,
        inputs: Vec<Image>,
        references: Option<Vec<Image>>,
        display: D,
        config: VisualizerConfig,
    ) -> Result<Self> {
        if config.show_images == 0 {
            return Err(Error::Config("show_images must be at least 1".into()));
        }
        if config.interval == 0 {
            return Err(Error::Config("interval must be at least 1".into()));
        }
        if inputs.len() < config.show_images {
            return Err(Error::Config(format!(
                "cannot sample {} images from {} inputs",
                config.show_images,
                inputs.len()
            )));
        }
        if let Some(refs) = &references {
            if refs.len() != inputs.len() {
                return Err(Error::Config(format!(
                    "{} reference images for {} inputs",
                    refs.len(),
                    inputs.len()
                )));
            }
        }
        for image in inputs.iter().chain(references.iter().flatten()) {
            image.check_shape()?;
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut visualizer = TrainingVisualizer {
            predictor,
            inputs,
            references,
            display,
            config,
            figure: None,
            rng,
        };
        visualizer.figure = Some(visualizer.new_figure()?);
        Ok(visualizer)
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Figure rows: optional input row, output row, optional reference row.
    pub fn rows(&self) -> usize {
        1 + self.config.draw_input as usize + self.references.is_some() as usize
    }

    /// `false` once `on_train_end` has released the figure.
    pub fn has_figure(&self) -> bool {
        self.figure.is_some()
    }

    /// Gives back the display slot, e.g. to inspect the last frame.
    pub fn into_display(self) -> D {
        self.display
    }

    fn new_figure(&self) -> Result<Figure> {
        Figure::new(self.rows(), self.config.show_images, self.config.fig_size)
    }

    /// Redraws every cell and the caption, then encodes the figure.
    fn draw(
        &self,
        figure: &mut Figure,
        picked: &[usize],
        batch: &[Image],
        outputs: &[Image],
        caption: &str,
    ) -> Result<Vec<u8>> {
        figure.clear()?;
        let output_row = self.config.draw_input as usize;
        let reference_row = output_row + 1;
        for (col, &idx) in picked.iter().enumerate() {
            if self.config.draw_input {
                figure.draw_cell(0, col, "Input", &batch[col])?;
            }
            figure.draw_cell(output_row, col, "Output", &outputs[col])?;
            if let Some(refs) = &self.references {
                figure.draw_cell(reference_row, col, "Reference", &refs[idx])?;
            }
        }
        figure.draw_caption(caption)?;
        figure.to_png()
    }

    /// Renders and publishes the figure for `epoch`.
    fn render(&mut self, epoch: usize, stats: &EpochStats) -> Result<()> {
        let picked = index::sample(&mut self.rng, self.inputs.len(), self.config.show_images).into_vec();
        let batch: Vec<Image> = picked.iter().map(|&i| self.inputs[i].clone()).collect();

        let outputs = self.predictor.predict(&batch)?;
        if outputs.len() != batch.len() {
            return Err(Error::Prediction(format!(
                "model returned {} images for a batch of {}",
                outputs.len(),
                batch.len()
            )));
        }
        for (i, output) in outputs.iter().enumerate() {
            output
                .check_shape()
                .map_err(|e| Error::Prediction(format!("output {}: {}", i, e)))?;
        }

        let mut figure = match self.figure.take() {
            Some(figure) => figure,
            None => self.new_figure()?,
        };
        let caption = caption(epoch, stats);
        let png = self.draw(&mut figure, &picked, &batch, &outputs, &caption);
        self.figure = Some(figure);

        let frame = Frame { epoch, caption, png: png? };
        self.display.update(&frame)?;
        tracing::debug!("published preview for epoch {}", epoch);
        Ok(())
    }
}

impl<P: Predictor, D: DisplaySlot> TrainingCallback for TrainingVisualizer<P, D> {
    fn on_epoch_end(&mut self, epoch: usize, stats: &EpochStats) -> Result<()> {
        // First epoch, then every `interval` epochs after it.
        if epoch.saturating_sub(1) % self.config.interval != 0 {
            return Ok(());
        }
        self.render(epoch, stats)
    }

    fn on_train_end(&mut self) -> Result<()> {
        self.figure = None;
        Ok(())
    }
}

/// `"Epoch 3 - Loss: 0.1235 - Val_loss: 0.2000"`.
pub fn caption(epoch: usize, stats: &EpochStats) -> String {
    let mut parts = vec![format!("Epoch {}", epoch)];
    parts.extend(
        stats
            .metrics()
            .into_iter()
            .map(|(name, value)| format!("{}: {:.4}", capitalize(name), value)),
    );
    parts.join(" - ")
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
