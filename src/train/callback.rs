use crate::error::Result;
use crate::train::epoch_stats::EpochStats;

/// Hooks invoked by `train_loop`.
pub trait TrainingCallback {
    /// Called after every completed epoch.
    fn on_epoch_end(&mut self, _epoch: usize, _stats: &EpochStats) -> Result<()> {
        Ok(())
    }

    /// Called once when the loop finishes or is stopped.
    fn on_train_end(&mut self) -> Result<()> {
        Ok(())
    }
}
