use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle states of a lead.
///
/// `NEW` is the sole initial state. `REJECTED` and `POSTED` are terminal for
/// the brokering workflow; an external reconciliation process may still
/// inspect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadStatus {
    New,
    Pinged,
    Accepted,
    Rejected,
    Posted,
}

impl LeadStatus {
    /// All states, in lifecycle order.
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Pinged,
        LeadStatus::Accepted,
        LeadStatus::Rejected,
        LeadStatus::Posted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Pinged => "PINGED",
            LeadStatus::Accepted => "ACCEPTED",
            LeadStatus::Rejected => "REJECTED",
            LeadStatus::Posted => "POSTED",
        }
    }

    /// Position in the forward ordering of the lifecycle. ACCEPTED and
    /// REJECTED share a rank: both are outcomes of the same ping.
    fn rank(&self) -> u8 {
        match self {
            LeadStatus::New => 0,
            LeadStatus::Pinged => 1,
            LeadStatus::Accepted | LeadStatus::Rejected => 2,
            LeadStatus::Posted => 3,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(LeadStatus::New),
            "PINGED" => Ok(LeadStatus::Pinged),
            "ACCEPTED" => Ok(LeadStatus::Accepted),
            "REJECTED" => Ok(LeadStatus::Rejected),
            "POSTED" => Ok(LeadStatus::Posted),
            _ => Err(()),
        }
    }
}

/// Whether `from -> to` is an edge of the lifecycle table.
///
/// PINGED is a transit state: the detached ping task writes the final
/// ACCEPTED/REJECTED outcome directly, so NEW -> ACCEPTED/REJECTED counts as
/// a valid (composite) transition.
pub fn is_valid_transition(from: LeadStatus, to: LeadStatus) -> bool {
    use LeadStatus::*;
    matches!(
        (from, to),
        (New, Pinged)
            | (New, Accepted)
            | (New, Rejected)
            | (Pinged, Accepted)
            | (Pinged, Rejected)
            | (Accepted, Posted)
    )
}

/// Whether `to` is strictly ahead of `from` in the lifecycle ordering.
pub fn is_forward(from: LeadStatus, to: LeadStatus) -> bool {
    to.rank() > from.rank()
}

#[cfg(test)]
mod tests {
    use super::*;
    use LeadStatus::*;

    #[test]
    fn ping_outcomes_are_valid_transitions() {
        assert!(is_valid_transition(New, Pinged));
        assert!(is_valid_transition(New, Accepted));
        assert!(is_valid_transition(New, Rejected));
        assert!(is_valid_transition(Pinged, Accepted));
        assert!(is_valid_transition(Pinged, Rejected));
        assert!(is_valid_transition(Accepted, Posted));
    }

    #[test]
    fn backward_and_terminal_transitions_are_off_table() {
        assert!(!is_valid_transition(Accepted, New));
        assert!(!is_valid_transition(Rejected, Posted));
        assert!(!is_valid_transition(Posted, Posted));
        assert!(!is_valid_transition(Posted, New));
        assert!(!is_valid_transition(Rejected, Accepted));
    }

    #[test]
    fn forward_ordering_matches_lifecycle() {
        assert!(is_forward(New, Pinged));
        assert!(is_forward(New, Posted));
        assert!(is_forward(Pinged, Rejected));
        assert!(is_forward(Accepted, Posted));
        assert!(!is_forward(Accepted, Rejected)); // same rank
        assert!(!is_forward(Posted, Accepted));
        assert!(!is_forward(New, New));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in LeadStatus::ALL {
            assert_eq!(status.as_str().parse::<LeadStatus>(), Ok(status));
        }
        assert!("SOLD".parse::<LeadStatus>().is_err());
        assert!("new".parse::<LeadStatus>().is_err());
    }
}
