use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The timestamps a liveness check needs from a ticket.
#[derive(Debug, Clone, Copy)]
pub struct TicketTimes {
    pub creation_time: DateTime<Utc>,
    pub last_used_time: DateTime<Utc>,
}

/// Time-to-live computation for a ticket. Owned by the ticket and immutable
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpirationPolicy {
    /// Fixed lifetime from creation, regardless of use.
    Hard { max_time_to_live_seconds: i64 },
    /// Countdown resets on each use, bounded by an absolute maximum
    /// lifetime no amount of use can extend.
    Sliding {
        max_time_to_live_seconds: i64,
        time_to_idle_seconds: i64,
    },
}

impl ExpirationPolicy {
    /// The absolute lifetime bound. Physical store TTLs derive from this;
    /// idle expiry of sliding tickets is checked by the orchestrator since
    /// no store TTL can track it.
    pub fn time_to_live(&self) -> Duration {
        match *self {
            ExpirationPolicy::Hard {
                max_time_to_live_seconds,
            }
            | ExpirationPolicy::Sliding {
                max_time_to_live_seconds,
                ..
            } => Duration::seconds(max_time_to_live_seconds),
        }
    }

    pub fn is_expired(&self, times: &TicketTimes, now: DateTime<Utc>) -> bool {
        match *self {
            ExpirationPolicy::Hard {
                max_time_to_live_seconds,
            } => now >= times.creation_time + Duration::seconds(max_time_to_live_seconds),
            ExpirationPolicy::Sliding {
                max_time_to_live_seconds,
                time_to_idle_seconds,
            } => {
                now >= times.creation_time + Duration::seconds(max_time_to_live_seconds)
                    || now >= times.last_used_time + Duration::seconds(time_to_idle_seconds)
            }
        }
    }

    /// TTL seconds for a store entry inserted `now`: the ticket's remaining
    /// absolute lifetime, clamped to `[1, max_backend_ttl]`. Returns 0 for
    /// an already-dead ticket, which backends treat as "evict immediately".
    pub fn store_ttl_seconds(
        &self,
        times: &TicketTimes,
        now: DateTime<Utc>,
        max_backend_ttl: i64,
    ) -> i64 {
        if self.is_expired(times, now) {
            return 0;
        }
        let deadline = times.creation_time + self.time_to_live();
        let remaining = (deadline - now).num_seconds();
        remaining.clamp(1, max_backend_ttl)
    }
}
