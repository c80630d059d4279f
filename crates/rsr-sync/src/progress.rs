//! Terminal progress for bulk downloads and sync passes
//!
//! Bars are drawn to stderr and hidden automatically when it is not a terminal.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const DOWNLOAD_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})";
const STREAM_TEMPLATE: &str = "{spinner:.green} {msg} {bytes} {bytes_per_sec}";
const PASS_TEMPLATE: &str =
    "{prefix:.bold} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} SKUs {msg}";

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Byte progress for a bulk result file.
///
/// Result URLs without a content length get a byte-counting spinner instead.
pub fn create_download_progress(size: Option<u64>, message: &str) -> ProgressBar {
    let pb = match size {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(bar_style(DOWNLOAD_TEMPLATE));
            pb
        },
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template(STREAM_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        },
    };
    pb.set_message(message.to_string());
    pb
}

/// SKU progress across the batches of one pass, labelled with the pass name
pub fn create_pass_progress(pass: &'static str, total_skus: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_skus);
    pb.set_style(bar_style(PASS_TEMPLATE));
    pb.set_prefix(pass);
    pb
}

/// Show which batch of `total` is in flight
pub fn set_batch(pb: &ProgressBar, batch: usize, total: usize) {
    pb.set_message(format!("batch {batch}/{total}"));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_progress_with_and_without_length() {
        let known = create_download_progress(Some(1024), "Downloading snapshot");
        assert_eq!(known.length(), Some(1024));
        assert_eq!(known.message(), "Downloading snapshot");

        let streamed = create_download_progress(None, "Downloading snapshot");
        assert_eq!(streamed.length(), None);
        streamed.finish_and_clear();
    }

    #[test]
    fn test_pass_progress_tracks_skus_and_batch() {
        let pb = create_pass_progress("quantity", 350);
        assert_eq!(pb.length(), Some(350));
        assert_eq!(pb.prefix(), "quantity");

        set_batch(&pb, 2, 3);
        pb.inc(150);
        assert_eq!(pb.position(), 150);
        assert_eq!(pb.message(), "batch 2/3");
    }
}
