// Clock-style formatting of durations

pub const SECONDS_IN_HOUR: u64 = 60 * 60;
pub const SECONDS_IN_MINUTE: u64 = 60;
pub const MICROS_IN_SECOND: u64 = 1_000_000;

/// Display value shown when nothing is playing
pub const ZERO_HMS: &str = "00:00:00";

/// Format whole seconds as `HH:MM:SS`, each field zero-padded to two digits.
/// Hours keep growing past 99 rather than wrapping.
pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / SECONDS_IN_HOUR;
    let minutes = (total_secs % SECONDS_IN_HOUR) / SECONDS_IN_MINUTE;
    let seconds = total_secs % SECONDS_IN_MINUTE;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Truncating microseconds to whole seconds conversion
pub fn micros_to_secs(micros: u64) -> u64 {
    micros / MICROS_IN_SECOND
}
