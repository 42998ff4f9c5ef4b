//! Overdue fine calculation

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

/// Whole days between `due_at` and `returned_at`, any partial day counting
/// as a full one. Zero for on-time or early returns.
pub fn days_late(due_at: DateTime<Utc>, returned_at: DateTime<Utc>) -> i64 {
    let late = returned_at - due_at;
    if late <= Duration::zero() {
        return 0;
    }
    let whole = late.num_days();
    if late > Duration::days(whole) {
        whole + 1
    } else {
        whole
    }
}

/// `days_late * rate_per_day`, exact decimal arithmetic. A product outside
/// the decimal range is rejected rather than rounded.
pub fn fine(
    due_at: DateTime<Utc>,
    returned_at: DateTime<Utc>,
    rate_per_day: Decimal,
) -> AppResult<Decimal> {
    let days = days_late(due_at, returned_at);
    Decimal::from(days).checked_mul(rate_per_day).ok_or_else(|| {
        AppError::Validation(format!(
            "fine of {} per day over {} days is out of range",
            rate_per_day, days
        ))
    })
}
