//! Per-tile progress reporting.
//!
//! With the `progress` feature, progress is drawn as an [indicatif] bar.
//! Otherwise each completed tile is logged at info level.
use serde::{Deserialize, Serialize};

/// Appearance of the progress display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressOptions {
    /// [indicatif template](https://docs.rs/indicatif/latest/indicatif/#templates)
    /// for the progress bar. Ignored without the `progress` feature.
    pub template: String,
    /// Label shown with the bar, or prefixed to progress log lines.
    pub message: Option<String>,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            template: "[{elapsed_precise}] [{bar}] ({pos}/{len}, ETA {eta}) {msg}".to_string(),
            message: None,
        }
    }
}

impl ProgressOptions {
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn from_json(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[derive(Debug)]
pub(crate) struct ProgressReporter {
    total: u64,
    done: u64,
    message: Option<String>,
    #[cfg(feature = "progress")]
    bar: indicatif::ProgressBar,
}

impl ProgressReporter {
    pub(crate) fn new(total: u64, options: &ProgressOptions) -> crate::Result<Self> {
        #[cfg(feature = "progress")]
        let bar = {
            let style = indicatif::ProgressStyle::with_template(&options.template)
                .map_err(crate::Error::wrap)?;
            let bar = indicatif::ProgressBar::new(total).with_style(style);
            if let Some(message) = &options.message {
                bar.set_message(message.clone());
            }
            bar
        };
        Ok(Self {
            total,
            done: 0,
            message: options.message.clone(),
            #[cfg(feature = "progress")]
            bar,
        })
    }

    pub(crate) fn done(&self) -> u64 {
        self.done
    }

    #[cfg(feature = "progress")]
    pub(crate) fn bar(&self) -> &indicatif::ProgressBar {
        &self.bar
    }

    fn label(&self) -> &str {
        self.message.as_deref().unwrap_or("tile")
    }

    /// Record one more completed tile.
    pub(crate) fn advance(&mut self) {
        self.done += 1;
        #[cfg(feature = "progress")]
        self.bar.inc(1);
        #[cfg(not(feature = "progress"))]
        log::info!(
            "{} {}/{} ({:.1}%)",
            self.label(),
            self.done,
            self.total,
            self.done as f64 * 100.0 / self.total as f64
        );
    }

    pub(crate) fn finish(&self) {
        #[cfg(feature = "progress")]
        self.bar.finish();
        log::debug!("{}: all {} tiles complete", self.label(), self.total);
    }

    /// Stop reporting after a failure, leaving the count where it is.
    pub(crate) fn abandon(&self) {
        #[cfg(feature = "progress")]
        self.bar.abandon();
        log::warn!(
            "{}: stopped after {}/{} tiles",
            self.label(),
            self.done,
            self.total
        );
    }
}
