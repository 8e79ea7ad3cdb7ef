use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::error::Result;
use crate::train::callback::TrainingCallback;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Runs `config.epochs` epochs and returns the statistics of the **last
/// completed epoch** (`None` if no epoch ran).
///
/// # Arguments
/// - `config`    — epoch count, optional progress channel, optional stop flag
/// - `run_epoch` — performs one epoch (1-based number given) and reports its
///                 statistics; `epoch`, `total_epochs` and, when left at zero,
///                 `elapsed_ms` are filled in by the loop
/// - `callbacks` — notified after each epoch and once at the end
///
/// # Early termination
/// The loop breaks early if:
/// - the `progress_tx` receiver has been dropped, **or**
/// - `config.stop_flag` is set to `true`.
///
/// `on_train_end` still runs after an early stop. Any error from
/// `run_epoch` or a callback aborts the loop and is returned as-is.
pub fn train_loop<F>(
    config: &TrainConfig,
    mut run_epoch: F,
    callbacks: &mut [&mut dyn TrainingCallback],
) -> Result<Option<EpochStats>>
where
    F: FnMut(usize) -> Result<EpochStats>,
{
    let mut last = None;

    for epoch in 1..=config.epochs {
        // Check stop flag at the top of each epoch.
        if stop_requested(config) {
            break;
        }

        let t_start = Instant::now();
        let mut stats = run_epoch(epoch)?;
        stats.epoch = epoch;
        stats.total_epochs = config.epochs;
        if stats.elapsed_ms == 0 {
            stats.elapsed_ms = t_start.elapsed().as_millis() as u64;
        }

        for callback in callbacks.iter_mut() {
            callback.on_epoch_end(epoch, &stats)?;
        }

        let receiver_gone = match config.progress_tx {
            Some(ref tx) => tx.send(stats.clone()).is_err(),
            None => false,
        };
        last = Some(stats);

        if receiver_gone || stop_requested(config) {
            break;
        }
    }

    for callback in callbacks.iter_mut() {
        callback.on_train_end()?;
    }

    Ok(last)
}

fn stop_requested(config: &TrainConfig) -> bool {
    config
        .stop_flag
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::{mpsc, Arc};

    #[derive(Default)]
    struct Recorder {
        epochs: Vec<usize>,
        ended: usize,
    }

    impl TrainingCallback for Recorder {
        fn on_epoch_end(&mut self, epoch: usize, stats: &EpochStats) -> Result<()> {
            assert_eq!(stats.epoch, epoch);
            self.epochs.push(epoch);
            Ok(())
        }

        fn on_train_end(&mut self) -> Result<()> {
            self.ended += 1;
            Ok(())
        }
    }

    #[test]
    fn runs_every_epoch_and_fills_bookkeeping() {
        let mut rec = Recorder::default();
        let last = train_loop(
            &TrainConfig::new(3),
            |epoch| Ok(EpochStats::with_loss(1.0 / epoch as f64)),
            &mut [&mut rec],
        )
        .unwrap()
        .unwrap();

        assert_eq!(rec.epochs, vec![1, 2, 3]);
        assert_eq!(rec.ended, 1);
        assert_eq!(last.epoch, 3);
        assert_eq!(last.total_epochs, 3);
        assert!((last.train_loss - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn stop_flag_ends_the_loop_but_still_notifies_end() {
        let flag = Arc::new(AtomicBool::new(false));
        let config = TrainConfig::new(10).with_stop_flag(flag.clone());
        let mut rec = Recorder::default();

        train_loop(
            &config,
            |epoch| {
                if epoch == 2 {
                    flag.store(true, Ordering::Relaxed);
                }
                Ok(EpochStats::with_loss(0.0))
            },
            &mut [&mut rec],
        )
        .unwrap();

        assert_eq!(rec.epochs, vec![1, 2]);
        assert_eq!(rec.ended, 1);
    }

    #[test]
    fn dropped_receiver_stops_after_first_epoch() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let config = TrainConfig::new(5).with_progress(tx);
        let mut rec = Recorder::default();

        train_loop(&config, |_| Ok(EpochStats::with_loss(0.0)), &mut [&mut rec]).unwrap();
        assert_eq!(rec.epochs, vec![1]);
    }

    #[test]
    fn progress_channel_receives_each_epoch() {
        let (tx, rx) = mpsc::channel();
        let config = TrainConfig::new(2).with_progress(tx);
        train_loop(&config, |_| Ok(EpochStats::with_loss(0.25)), &mut []).unwrap();

        let received: Vec<usize> = rx.try_iter().map(|s| s.epoch).collect();
        assert_eq!(received, vec![1, 2]);
    }

    #[test]
    fn epoch_errors_propagate() {
        let result = train_loop(
            &TrainConfig::new(3),
            |_| Err(crate::Error::Prediction("boom".into())),
            &mut [],
        );
        assert!(matches!(result, Err(crate::Error::Prediction(_))));
    }
}
