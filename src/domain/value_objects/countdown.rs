use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_objects::enums::payment_session_statuses::PaymentSessionStatus;

/// Whole seconds left before `expires_at`, never negative.
pub fn remaining(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> i64 {
    (expires_at - now).num_seconds().max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CountdownTick {
    Running { remaining_seconds: i64 },
    Expired,
    /// The session left `pending`; the caller stops rescheduling.
    Stopped { status: PaymentSessionStatus },
}

/// Evaluated by the displaying client once per second. Holds no timer.
pub fn tick(
    status: PaymentSessionStatus,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> CountdownTick {
    if status != PaymentSessionStatus::Pending {
        return CountdownTick::Stopped { status };
    }
    if now >= expires_at {
        return CountdownTick::Expired;
    }
    CountdownTick::Running {
        remaining_seconds: remaining(now, expires_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn counts_down_each_second() {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(900);
        assert_eq!(remaining(now, expires_at), 900);
        assert_eq!(remaining(now + Duration::seconds(1), expires_at), 899);
        assert_eq!(remaining(now + Duration::seconds(1200), expires_at), 0);
    }

    #[test]
    fn stops_once_session_leaves_pending() {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(60);
        assert_eq!(
            tick(PaymentSessionStatus::PendingApproval, now, expires_at),
            CountdownTick::Stopped {
                status: PaymentSessionStatus::PendingApproval
            }
        );
        assert_eq!(
            tick(PaymentSessionStatus::Pending, now, expires_at),
            CountdownTick::Running {
                remaining_seconds: 60
            }
        );
        assert_eq!(
            tick(
                PaymentSessionStatus::Pending,
                now + Duration::seconds(60),
                expires_at
            ),
            CountdownTick::Expired
        );
    }
}
