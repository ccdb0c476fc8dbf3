//! Platform-wide type aliases.

/// Shops are identified by the commerce platform's numeric shop id.
pub type ShopId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Log documents carry their timestamp as epoch milliseconds.
pub type EpochMillis = i64;

/// Convert a [`Timestamp`] to the epoch-millisecond wire representation.
pub fn epoch_millis(ts: Timestamp) -> EpochMillis {
    ts.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn epoch_millis_round_trips_through_chrono() {
        let ts = chrono::Utc.with_ymd_and_hms(2017, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(epoch_millis(ts), 1_488_369_600_000);
    }
}
