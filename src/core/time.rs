use std::time::Duration;

use time::{OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Adds a std duration to a naive UTC timestamp, saturating instead of overflowing.
pub(crate) fn primitive_after(value: PrimitiveDateTime, delay: Duration) -> PrimitiveDateTime {
    let seconds = delay.as_secs().min(i64::MAX as u64) as i64;
    value.checked_add(time::Duration::seconds(seconds)).unwrap_or(PrimitiveDateTime::MAX)
}
