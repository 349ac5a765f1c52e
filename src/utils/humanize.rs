use humansize::{WINDOWS, format_size};

/// Format a byte count as a human-readable size (1024-based, B/KB/MB)
pub fn format_file_size(bytes: u64) -> String {
    format_size(bytes, WINDOWS)
}

/// Format a duration in seconds as h/m/s
pub fn format_duration(total_secs: f64) -> String {
    let total = total_secs.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
