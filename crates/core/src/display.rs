//! Human-facing formatting helpers for front-ends.

/// Format a 24-hour `"HH:MM[:SS]"` time block as 12-hour clock text,
/// e.g. `"14:30" -> "2:30 PM"`.
///
/// Returns the input unchanged when it does not look like a time of
/// day; the UI renders whatever the backend sent rather than hiding
/// the slot.
pub fn twelve_hour(time_block: &str) -> String {
    let mut parts = time_block.splitn(3, ':');
    let (Some(hh), Some(mm)) = (parts.next(), parts.next()) else {
        return time_block.to_string();
    };
    let Ok(hour) = hh.parse::<u8>() else {
        return time_block.to_string();
    };
    if hour > 23 {
        return time_block.to_string();
    }

    let meridiem = if hour >= 12 { "PM" } else { "AM" };
    let hour12 = match hour {
        0 => 12,
        1..=12 => hour,
        _ => hour - 12,
    };
    format!("{hour12}:{mm} {meridiem}")
}
