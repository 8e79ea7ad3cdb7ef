pub mod callback;
pub mod epoch_stats;
pub mod train_config;
pub mod loop_fn;

pub use callback::TrainingCallback;
pub use epoch_stats::EpochStats;
pub use train_config::TrainConfig;
pub use loop_fn::train_loop;
