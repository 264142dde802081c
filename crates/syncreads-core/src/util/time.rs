//! Compact human-readable durations for sync log lines.

const MILLIS_PER_SECOND: u64 = 1_000;
const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3_600;

/// Render a millisecond duration as space-joined units, e.g. `65_234` → `"1m 5.234s"`.
///
/// Zero components are skipped, except that a `0m` placeholder is kept between
/// hours and seconds. Bare milliseconds are only shown when every coarser unit
/// is zero, and a zero duration renders as an empty string.
pub fn format_time(milliseconds: u64) -> String {
    let total_seconds = milliseconds / MILLIS_PER_SECOND;
    let hours = total_seconds / SECONDS_PER_HOUR;
    let minutes = (total_seconds - hours * SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let seconds = total_seconds - hours * SECONDS_PER_HOUR - minutes * SECONDS_PER_MINUTE;
    let millis = milliseconds % MILLIS_PER_SECOND;

    let mut parts = Vec::with_capacity(4);

    if hours > 0 {
        parts.push(format!("{hours}h"));
    }

    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    } else if hours > 0 && seconds > 0 {
        parts.push("0m".to_string());
    }

    if seconds > 0 {
        if millis > 0 {
            let fraction = format!("{millis:03}");
            parts.push(format!("{seconds}.{}s", fraction.trim_end_matches('0')));
        } else {
            parts.push(format!("{seconds}s"));
        }
    }

    if millis > 0 && hours == 0 && minutes == 0 && seconds == 0 {
        parts.push(format!("{millis}ms"));
    }

    parts.join(" ")
}

/// Milliseconds elapsed between two Unix-millisecond timestamps, clamped at zero.
pub fn elapsed_millis(started_at: i64, finished_at: i64) -> u64 {
    u64::try_from(finished_at.saturating_sub(started_at)).unwrap_or(0)
}
