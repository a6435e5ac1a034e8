//! Subscription status as reported by the billing service.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a billing subscription.
///
/// The billing vendor owns the real state machine; the storefront only needs
/// to know which customer actions to offer and to refuse obviously invalid
/// requests before calling the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Renewing normally.
    Active,
    /// Temporarily paused by the customer.
    Suspended,
    /// Cancelled; cannot be resumed from the storefront.
    Cancelled,
    /// Ran its course (fixed-term plans).
    Expired,
    /// Any status string the storefront does not recognize.
    #[default]
    Unknown,
}

impl SubscriptionStatus {
    /// Parse a vendor status string.
    ///
    /// Case-insensitive. Vendors disagree on spelling, so `paused` maps to
    /// `Suspended` and both `canceled` and `cancelled` map to `Cancelled`.
    #[must_use]
    pub fn from_vendor(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" | "live" | "in_trial" => Self::Active,
            "suspended" | "paused" | "on_hold" => Self::Suspended,
            "cancelled" | "canceled" => Self::Cancelled,
            "expired" | "ended" => Self::Expired,
            _ => Self::Unknown,
        }
    }

    /// Whether a customer may suspend a subscription in this state.
    #[must_use]
    pub const fn can_suspend(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether a customer may resume a subscription in this state.
    #[must_use]
    pub const fn can_resume(self) -> bool {
        matches!(self, Self::Suspended)
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Suspended => "Paused",
            Self::Cancelled => "Cancelled",
            Self::Expired => "Expired",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vendor_spellings() {
        assert_eq!(
            SubscriptionStatus::from_vendor("ACTIVE"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_vendor("paused"),
            SubscriptionStatus::Suspended
        );
        assert_eq!(
            SubscriptionStatus::from_vendor("Canceled"),
            SubscriptionStatus::Cancelled
        );
        assert_eq!(
            SubscriptionStatus::from_vendor("cancelled"),
            SubscriptionStatus::Cancelled
        );
        assert_eq!(
            SubscriptionStatus::from_vendor("future"),
            SubscriptionStatus::Unknown
        );
    }

    #[test]
    fn test_transitions() {
        assert!(SubscriptionStatus::Active.can_suspend());
        assert!(!SubscriptionStatus::Active.can_resume());
        assert!(SubscriptionStatus::Suspended.can_resume());
        assert!(!SubscriptionStatus::Suspended.can_suspend());
        assert!(!SubscriptionStatus::Cancelled.can_resume());
        assert!(!SubscriptionStatus::Expired.can_suspend());
    }
}
