pub mod display;
pub mod figure;
pub mod predictor;
pub mod visualizer;

pub use display::{DisplaySlot, FileSlot, Frame, HttpSlot, MemorySlot};
pub use figure::Figure;
pub use predictor::Predictor;
pub use visualizer::{caption, TrainingVisualizer, VisualizerConfig};
