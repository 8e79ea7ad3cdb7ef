use serde::{Serialize, Deserialize};

/// Per-epoch training statistics handed to callbacks by `train_loop`.
///
/// `epoch`, `total_epochs` and `elapsed_ms` are bookkeeping; only the values
/// returned by [`EpochStats::metrics`] are reported to users (captions,
/// command-line summaries).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over the epoch.
    pub train_loss: f64,
    /// Mean validation loss, if a validation set was evaluated.
    pub val_loss: Option<f64>,
    /// Training accuracy as a fraction in [0, 1].
    pub train_accuracy: Option<f64>,
    /// Validation accuracy as a fraction in [0, 1].
    pub val_accuracy: Option<f64>,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
    /// Any further named metrics, reported after the standard ones.
    #[serde(default)]
    pub extra: Vec<(String, f64)>,
}

impl EpochStats {
    /// Statistics carrying only a training loss.
    pub fn with_loss(train_loss: f64) -> Self {
        EpochStats { train_loss, ..EpochStats::default() }
    }

    pub fn val_loss(mut self, value: f64) -> Self {
        self.val_loss = Some(value);
        self
    }

    pub fn train_accuracy(mut self, value: f64) -> Self {
        self.train_accuracy = Some(value);
        self
    }

    pub fn val_accuracy(mut self, value: f64) -> Self {
        self.val_accuracy = Some(value);
        self
    }

    /// Appends a custom metric such as `("mae", 0.12)`.
    pub fn metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extra.push((name.into(), value));
        self
    }

    /// Reported metrics in display order: loss, accuracy, val_loss,
    /// val_accuracy, then the extras as given.
    pub fn metrics(&self) -> Vec<(&str, f64)> {
        let mut out = vec![("loss", self.train_loss)];
        if let Some(v) = self.train_accuracy {
            out.push(("accuracy", v));
        }
        if let Some(v) = self.val_loss {
            out.push(("val_loss", v));
        }
        if let Some(v) = self.val_accuracy {
            out.push(("val_accuracy", v));
        }
        out.extend(self.extra.iter().map(|(name, v)| (name.as_str(), *v)));
        out
    }
}
