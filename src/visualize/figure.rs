use std::sync::OnceLock;

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, ImageEncoder, Rgb, RgbImage};
use plotters::coord::Shift;
use plotters::element::BitMapElement;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{register_font, FontStyle};

use crate::error::{Error, Result};
use crate::vision::Image;

/// Pixels per inch used to turn figure sizes into canvas dimensions.
pub const DPI: f32 = 100.0;
/// Default width of one column, in inches.
pub const COLUMN_INCHES: f32 = 2.5;
/// Default height of one row, in inches.
pub const ROW_INCHES: f32 = 3.0;

/// Font family every label is drawn with; backed by the embedded TTF.
const FONT_FAMILY: &str = "sans-serif";
const FONT_BYTES: &[u8] = include_bytes!("assets/DejaVuSans.ttf");

const TITLE_SIZE: f64 = 16.0;
const CAPTION_SIZE: f64 = 18.0;
/// Height of the caption strip below the grid, in pixels.
pub(crate) const CAPTION_BAND: u32 = 40;
/// Minimum pixels a cell needs to hold its title and some image.
const MIN_CELL: u32 = 32;
const PADDING: u32 = 4;

// ---------------------------------------------------------------------------
// Font registration
// ---------------------------------------------------------------------------

/// Registers the embedded font with plotters once per process.
fn ensure_font() -> Result<()> {
    static REGISTERED: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
                .map_err(|_| "embedded font could not be parsed".to_owned())
        })
        .clone()
        .map_err(Error::Display)
}

fn draw_error(e: impl std::fmt::Display) -> Error {
    Error::Display(format!("drawing failed: {}", e))
}

// ---------------------------------------------------------------------------
// Figure
// ---------------------------------------------------------------------------

/// A grid of titled image cells above a one-line caption.
///
/// Drawing goes through a plotters `BitMapBackend` over the figure's own RGB
/// buffer, so successive calls accumulate on the same canvas until
/// [`Figure::clear`].
#[derive(Debug, Clone)]
pub struct Figure {
    rows: usize,
    cols: usize,
    canvas: RgbImage,
}

impl Figure {
    /// Creates a blank figure of `rows × cols` cells.
    ///
    /// `fig_size` is `(width, height)` in inches; by default each column
    /// gets 2.5 in and each row 3 in.
    pub fn new(rows: usize, cols: usize, fig_size: Option<(f32, f32)>) -> Result<Figure> {
        if rows == 0 || cols == 0 {
            return Err(Error::Config("a figure needs at least one row and one column".into()));
        }
        let (w_in, h_in) =
            fig_size.unwrap_or((cols as f32 * COLUMN_INCHES, rows as f32 * ROW_INCHES));
        if !(w_in.is_finite() && h_in.is_finite() && w_in > 0.0 && h_in > 0.0) {
            return Err(Error::Config(format!("invalid figure size {}×{} in", w_in, h_in)));
        }
        let width = (w_in * DPI).round() as u32;
        let height = (h_in * DPI).round() as u32;
        if width < cols as u32 * MIN_CELL || height < CAPTION_BAND + rows as u32 * MIN_CELL {
            return Err(Error::Config(format!(
                "figure size {}×{} in is too small for {} rows and {} columns",
                w_in, h_in, rows, cols
            )));
        }
        ensure_font()?;
        Ok(Figure {
            rows,
            cols,
            canvas: RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    /// Centre pixel of cell `(row, col)` on the canvas.
    pub fn cell_centre(&self, row: usize, col: usize) -> (u32, u32) {
        let cell_w = self.width() / self.cols as u32;
        let cell_h = (self.height() - CAPTION_BAND) / self.rows as u32;
        (
            col as u32 * cell_w + cell_w / 2,
            row as u32 * cell_h + cell_h / 2,
        )
    }

    /// Resets the canvas to white.
    pub fn clear(&mut self) -> Result<()> {
        self.with_root(|root| root.fill(&WHITE).map_err(draw_error))
    }

    /// Draws `image` under a centred title into cell `(row, col)`.
    ///
    /// The image is normalized to [0, 1], scaled to fit below the title
    /// while keeping its aspect ratio, and drawn in grey levels when it has
    /// a single channel.
    ///
    /// # Errors
    /// [`Error::Config`] for a cell outside the grid or an image whose pixel
    /// buffer does not match its shape.
    pub fn draw_cell(&mut self, row: usize, col: usize, title: &str, image: &Image) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(Error::Config(format!(
                "cell ({}, {}) is outside a {}×{} figure",
                row, col, self.rows, self.cols
            )));
        }
        image.check_shape()?;
        let pixels = to_rgb_image(image);
        let (rows, cols) = (self.rows, self.cols);

        self.with_root(|root| {
            let (grid, _) = root.split_vertically(root.dim_in_pixel().1 as i32 - CAPTION_BAND as i32);
            let cells = grid.split_evenly((rows, cols));
            let cell = &cells[row * cols + col];
            let area = cell
                .titled(title, (FONT_FAMILY, TITLE_SIZE))
                .map_err(draw_error)?;

            let (area_w, area_h) = area.dim_in_pixel();
            let area_w = area_w.saturating_sub(2 * PADDING);
            let area_h = area_h.saturating_sub(2 * PADDING);
            if area_w == 0 || area_h == 0 {
                return Ok(());
            }
            let scale = f32::min(
                area_w as f32 / pixels.width() as f32,
                area_h as f32 / pixels.height() as f32,
            );
            let draw_w = ((pixels.width() as f32 * scale) as u32).clamp(1, area_w);
            let draw_h = ((pixels.height() as f32 * scale) as u32).clamp(1, area_h);
            let scaled = imageops::resize(&pixels, draw_w, draw_h, FilterType::Nearest);

            let left = (PADDING + (area_w - draw_w) / 2) as i32;
            let top = (PADDING + (area_h - draw_h) / 2) as i32;
            let element: BitMapElement<(i32, i32)> =
                BitMapElement::with_owned_buffer((left, top), (draw_w, draw_h), scaled.into_raw())
                    .ok_or_else(|| Error::Display("image buffer has the wrong size".into()))?;
            area.draw(&element).map_err(draw_error)
        })
    }

    /// Draws `text` centred in the caption band at the bottom.
    pub fn draw_caption(&mut self, text: &str) -> Result<()> {
        self.with_root(|root| {
            let (width, height) = root.dim_in_pixel();
            let (_, band) = root.split_vertically(height as i32 - CAPTION_BAND as i32);
            let style = TextStyle::from((FONT_FAMILY, CAPTION_SIZE).into_font())
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Center));
            band.draw_text(text, &style, (width as i32 / 2, CAPTION_BAND as i32 / 2))
                .map_err(draw_error)
        })
    }

    /// Encodes the canvas as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(self.canvas.as_raw(), self.width(), self.height(), ColorType::Rgb8)
            .map_err(|e| Error::Display(e.to_string()))?;
        Ok(bytes)
    }

    /// Runs `draw` on a drawing area spanning the whole canvas and flushes it.
    fn with_root<F>(&mut self, draw: F) -> Result<()>
    where
        F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<()>,
    {
        let size = (self.canvas.width(), self.canvas.height());
        let root = BitMapBackend::with_buffer(&mut self.canvas, size).into_drawing_area();
        draw(&root)?;
        root.present().map_err(draw_error)
    }
}

/// Normalized pixels as 8-bit RGB; grayscale is replicated, alpha dropped.
fn to_rgb_image(image: &Image) -> RgbImage {
    let normalized = image.normalized();
    let level = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    RgbImage::from_fn(image.width, image.height, |x, y| match normalized.pixel(x, y) {
        [v] => Rgb([level(*v); 3]),
        [r, g, b, ..] => Rgb([level(*r), level(*g), level(*b)]),
        _ => Rgb([255, 255, 255]),
    })
}
