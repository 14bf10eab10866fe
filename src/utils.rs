/// Time formatting shared by logging and the display panel
use time::macros::format_description;
use time::OffsetDateTime;

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}

/// Local wall-clock time, UTC when the local offset cannot be determined.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// "Tue 05 Mar 14:07"; the colon becomes a space when `colon` is false.
pub fn header_stamp(dt: &OffsetDateTime, colon: bool) -> String {
    let formatted = if colon {
        dt.format(format_description!(
            "[weekday repr:short] [day] [month repr:short] [hour]:[minute]"
        ))
    } else {
        dt.format(format_description!(
            "[weekday repr:short] [day] [month repr:short] [hour] [minute]"
        ))
    };
    formatted.unwrap_or_else(|_| dt.to_string())
}

/// "14:07" or "14 07"
pub fn clock_time(dt: &OffsetDateTime, colon: bool) -> String {
    let formatted = if colon {
        dt.format(format_description!("[hour]:[minute]"))
    } else {
        dt.format(format_description!("[hour] [minute]"))
    };
    formatted.unwrap_or_else(|_| dt.to_string())
}

/// "Tuesday 05 March"
pub fn clock_date(dt: &OffsetDateTime) -> String {
    dt.format(format_description!("[weekday] [day] [month repr:long]"))
        .unwrap_or_else(|_| dt.to_string())
}

pub fn clock_year(dt: &OffsetDateTime) -> String {
    dt.year().to_string()
}
