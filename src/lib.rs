pub mod error;
pub mod cache;
pub mod table;
pub mod vision;
pub mod train;
pub mod visualize;

// Convenience re-exports
pub use error::{Error, Result};
pub use cache::{CacheConfig, DataCache, HttpRemote, RemoteSource};
pub use table::{Cell, Table, TableOptions};
pub use vision::{Image, ImageSet};
pub use train::{train_loop, EpochStats, TrainConfig, TrainingCallback};
pub use visualize::{
    DisplaySlot, FileSlot, Frame, HttpSlot, MemorySlot, Predictor, TrainingVisualizer,
    VisualizerConfig,
};
