//! Terminal progress bar for `docqa ingest`.

use indicatif::{ProgressBar, ProgressStyle};
use rag_pipeline::Progress;

/// Bar that advances once per ingested document.
pub struct IndicatifProgress {
    pb: ProgressBar,
}

impl IndicatifProgress {
    pub fn bar(len: u64) -> Self {
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}/{len:3} {msg}") {
            pb.set_style(style);
        }
        Self { pb }
    }
}

impl Progress for IndicatifProgress {
    fn set_total(&self, n: u64) {
        self.pb.set_length(n);
    }
    fn step(&self, msg: &str) {
        self.pb.inc(1);
        self.pb.set_message(msg.to_string());
    }
    fn finish(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }
}
