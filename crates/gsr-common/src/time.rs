use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time as float seconds since the unix epoch.
///
/// This is the encoding the control-plane handshake and downlink commands
/// carry in their `MuxTime` field.
pub fn unix_time_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Wall-clock time as whole microseconds since the unix epoch, the encoding
/// used by time-sync replies.
pub fn unix_time_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
