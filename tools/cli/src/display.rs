//! Human-readable rendering of catalog results.

use drivekeep_storage::{Listing, Progress, Quota};

const BYTES_PER_GB: f64 = (1024u64 * 1024 * 1024) as f64;

/// Bytes as gigabytes with two decimals (1 GB = 1024^3 bytes).
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / BYTES_PER_GB)
}

/// Total, used, and free space lines.
pub fn quota_lines(quota: &Quota) -> Vec<String> {
    let total = quota
        .total_bytes
        .map(format_gb)
        .unwrap_or_else(|| "unlimited".to_string());
    let free = quota
        .free_bytes()
        .map(format_gb)
        .unwrap_or_else(|| "unlimited".to_string());

    vec![
        format!("Total Space: {}", total),
        format!("Used Space: {}", format_gb(quota.used_bytes)),
        format!("Free Space: {}", free),
    ]
}

/// `name (id)` per entry under `header`, or a no-files notice.
pub fn listing_lines(listing: &Listing, header: &str) -> Vec<String> {
    if listing.is_empty() {
        return vec!["No files found.".to_string()];
    }

    let mut lines = Vec::with_capacity(listing.len() + 2);
    lines.push(header.to_string());
    lines.extend(
        listing
            .entries
            .iter()
            .map(|entry| format!("{} ({})", entry.name, entry.id)),
    );
    if listing.truncated {
        lines.push(format!(
            "(Only the first {} entries are shown.)",
            listing.len()
        ));
    }
    lines
}

pub fn progress_line(progress: Progress) -> String {
    format!("Download {}%.", progress.percent())
}
