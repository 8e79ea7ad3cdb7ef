use crate::error::Result;
use crate::vision::Image;

/// The model being trained, as seen by the visualizer.
///
/// `predict` receives a batch of input images and must return one output
/// image per input, in the same order.
pub trait Predictor {
    fn predict(&mut self, batch: &[Image]) -> Result<Vec<Image>>;
}

impl<F> Predictor for F
where
    F: FnMut(&[Image]) -> Result<Vec<Image>>,
{
    fn predict(&mut self, batch: &[Image]) -> Result<Vec<Image>> {
        self(batch)
    }
}
