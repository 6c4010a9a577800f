/// Format a millisecond duration as `minutes:seconds.millis`.
///
/// Seconds are zero-padded to two digits and milliseconds to three. Minutes
/// are never padded and keep growing past 59.
///
/// # Examples
///
/// ```
/// use pace_core::formatting::format_millis;
///
/// assert_eq!(format_millis(497_451), "8:17.451");
/// assert_eq!(format_millis(0), "0:00.000");
/// assert_eq!(format_millis(61_005), "1:01.005");
/// assert_eq!(format_millis(3_723_004), "62:03.004");
/// ```
pub fn format_millis(millis: u64) -> String {
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) / 1_000;
    let ms = millis % 1_000;
    format!("{}:{:02}.{:03}", minutes, seconds, ms)
}

/// Render the `rta / igt` pair shown in every notification.
///
/// ```
/// use pace_core::formatting::format_split;
///
/// assert_eq!(format_split(497_451, 480_000), "8:17.451 / 8:00.000");
/// ```
pub fn format_split(rta: u64, igt: u64) -> String {
    format!("{} / {}", format_millis(rta), format_millis(igt))
}
