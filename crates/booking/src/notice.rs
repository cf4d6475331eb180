//! User-visible outcomes of the booking flow.
//!
//! Every business outcome and transport failure surfaces as exactly
//! one notice. Business outcomes (`SlotTaken`, `BookingFailed`) are
//! information, not errors -- they never travel as `Err`.

use std::fmt;

/// A notice the UI should show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingNotice {
    /// The selected slot was taken by another user before the lock
    /// landed.
    SlotTaken,

    /// The appointment was registered.
    BookingConfirmed,

    /// The backend refused the booking; carries its human-readable
    /// reason.
    BookingFailed { reason: String },

    /// The day's availability could not be loaded.
    AvailabilityUnavailable,

    /// The live connection failed mid-operation. The outcome of the
    /// interrupted call is unknown; the user may retry.
    ConnectionFailed,
}

impl fmt::Display for BookingNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingNotice::SlotTaken => {
                write!(f, "This slot was just taken by another user.")
            }
            BookingNotice::BookingConfirmed => {
                write!(f, "Your appointment was registered successfully.")
            }
            BookingNotice::BookingFailed { reason } => {
                write!(f, "The appointment could not be booked: {reason}")
            }
            BookingNotice::AvailabilityUnavailable => {
                write!(f, "Unable to load the available time slots.")
            }
            BookingNotice::ConnectionFailed => {
                write!(f, "Connection problem. Please try again.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_notice_carries_the_backend_reason() {
        let notice = BookingNotice::BookingFailed {
            reason: "slot no longer available".into(),
        };
        assert!(notice.to_string().contains("slot no longer available"));
    }
}
