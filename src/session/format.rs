use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Render elapsed recording time as `mm:ss`
///
/// Minutes keep counting past 59 rather than rolling into hours.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Render a byte count in mebibytes with one decimal, e.g. `1.0mb`
///
/// Ties round up: 0.25 MiB is `0.3mb`.
pub fn format_size_mib(bytes: usize) -> String {
    let tenths = (bytes as f64 * 10.0 / MIB).round();
    format!("{:.1}mb", tenths / 10.0)
}
