use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// ```text
/// Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered ──► Refunded
///    │▲           │              │            │
///    ││           └──────────────┴────────────┴──► Cancelled
///    │└─────── Failed (single retry path)
///    └──► Cancelled / Failed
/// ```
///
/// Legality is table-driven: every status owns its list of legal
/// successors, and every status write checks the table first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Created, awaiting payment. The only status in which pricing,
    /// addresses, and the item list may still change.
    #[default]
    Pending,

    /// Payment confirmed.
    Confirmed,

    /// Being picked and packed.
    Processing,

    /// Handed to the carrier.
    Shipped,

    /// Received by the customer.
    Delivered,

    /// Cancelled (terminal).
    Cancelled,

    /// Fully refunded (terminal).
    Refunded,

    /// Creation or payment failed; may be retried back to Pending.
    Failed,
}

impl OrderStatus {
    /// The transition table: legal successor statuses for each status.
    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled, Failed],
            Confirmed => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Cancelled],
            Delivered => &[Refunded],
            Failed => &[Pending],
            Cancelled | Refunded => &[],
        }
    }

    /// Returns true if `next` is a legal successor of this status.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Returns true once pricing, addresses, and items are frozen.
    pub fn is_frozen(self) -> bool {
        self != OrderStatus::Pending
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
            OrderStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Confirmed" => Ok(OrderStatus::Confirmed),
            "Processing" => Ok(OrderStatus::Processing),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            "Refunded" => Ok(OrderStatus::Refunded),
            "Failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), Pending);
    }

    #[test]
    fn pending_edges() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Pending.can_transition_to(Delivered));
    }

    #[test]
    fn forward_path_is_linear() {
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Refunded));
        assert!(!Confirmed.can_transition_to(Shipped));
        assert!(!Processing.can_transition_to(Delivered));
    }

    #[test]
    fn cancellation_is_available_until_delivery() {
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
    }

    #[test]
    fn failed_has_the_single_retry_path() {
        assert_eq!(Failed.allowed_transitions(), &[Pending]);
        assert!(!Failed.is_terminal());
    }

    #[test]
    fn terminal_statuses() {
        assert!(Cancelled.is_terminal());
        assert!(Refunded.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Delivered.is_terminal());
    }

    #[test]
    fn only_pending_is_unfrozen() {
        assert!(!Pending.is_frozen());
        for status in [Confirmed, Processing, Shipped, Delivered, Cancelled, Refunded, Failed] {
            assert!(status.is_frozen());
        }
    }

    #[test]
    fn status_roundtrips_through_strings() {
        for status in [
            Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Refunded, Failed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
    }
}
