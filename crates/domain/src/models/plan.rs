//! Plan tiers and the entitlements they grant.
//!
//! Every plan-gated rule in the service reads from [`Entitlements`] rather
//! than comparing tiers directly.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Plan tiers, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanTier {
    Free,
    Standard,
    Pro,
}

impl PlanTier {
    /// All tiers in ascending order.
    pub const ALL: [PlanTier; 3] = [PlanTier::Free, PlanTier::Standard, PlanTier::Pro];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "FREE",
            PlanTier::Standard => "STANDARD",
            PlanTier::Pro => "PRO",
        }
    }

    pub fn entitlements(&self) -> Entitlements {
        Entitlements::for_plan(*self)
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FREE" => Ok(PlanTier::Free),
            "STANDARD" => Ok(PlanTier::Standard),
            "PRO" => Ok(PlanTier::Pro),
            _ => Err(format!("Unknown plan tier: {}", s)),
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability set derived from a plan tier.
///
/// `None` limits are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Entitlements {
    pub plan: PlanTier,
    pub max_forms: Option<i64>,
    pub max_submissions_per_month: Option<i64>,
    pub can_send_confirmations: bool,
    pub can_filter_by_date: bool,
    pub can_configure_global_notifications: bool,
}

impl Entitlements {
    pub fn for_plan(plan: PlanTier) -> Self {
        match plan {
            PlanTier::Free => Self {
                plan,
                max_forms: Some(3),
                max_submissions_per_month: Some(100),
                can_send_confirmations: false,
                can_filter_by_date: false,
                can_configure_global_notifications: false,
            },
            PlanTier::Standard => Self {
                plan,
                max_forms: Some(20),
                max_submissions_per_month: Some(5_000),
                can_send_confirmations: true,
                can_filter_by_date: false,
                can_configure_global_notifications: false,
            },
            PlanTier::Pro => Self {
                plan,
                max_forms: None,
                max_submissions_per_month: None,
                can_send_confirmations: true,
                can_filter_by_date: true,
                can_configure_global_notifications: true,
            },
        }
    }

    pub fn allows(&self, feature: Feature) -> bool {
        match feature {
            Feature::SubmitterConfirmations => self.can_send_confirmations,
            Feature::DateRangeFilters => self.can_filter_by_date,
            Feature::GlobalNotificationSettings => self.can_configure_global_notifications,
        }
    }
}

/// Plan-gated features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    SubmitterConfirmations,
    DateRangeFilters,
    GlobalNotificationSettings,
}

impl Feature {
    /// Lowest tier whose entitlements include this feature.
    pub fn required_plan(&self) -> PlanTier {
        PlanTier::ALL
            .into_iter()
            .find(|plan| plan.entitlements().allows(*self))
            .unwrap_or(PlanTier::Pro)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Feature::SubmitterConfirmations => "submitter confirmation emails",
            Feature::DateRangeFilters => "date range filters",
            Feature::GlobalNotificationSettings => "global notification settings",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tier_serialization() {
        assert_eq!(serde_json::to_string(&PlanTier::Pro).unwrap(), "\"PRO\"");
        let plan: PlanTier = serde_json::from_str("\"STANDARD\"").unwrap();
        assert_eq!(plan, PlanTier::Standard);
    }

    #[test]
    fn test_plan_tier_from_str() {
        assert_eq!(PlanTier::from_str("free").unwrap(), PlanTier::Free);
        assert_eq!(PlanTier::from_str("Pro").unwrap(), PlanTier::Pro);
        assert!(PlanTier::from_str("enterprise").is_err());
    }

    #[test]
    fn test_plan_tier_ordering() {
        assert!(PlanTier::Free < PlanTier::Standard);
        assert!(PlanTier::Standard < PlanTier::Pro);
    }

    #[test]
    fn test_finite_caps_below_top_tier() {
        for plan in [PlanTier::Free, PlanTier::Standard] {
            let e = plan.entitlements();
            assert!(e.max_forms.is_some());
            assert!(e.max_submissions_per_month.is_some());
        }
        let pro = PlanTier::Pro.entitlements();
        assert_eq!(pro.max_forms, None);
        assert_eq!(pro.max_submissions_per_month, None);
    }

    #[test]
    fn test_confirmation_entitlement() {
        assert!(!PlanTier::Free.entitlements().can_send_confirmations);
        assert!(PlanTier::Standard.entitlements().can_send_confirmations);
        assert!(PlanTier::Pro.entitlements().can_send_confirmations);
    }

    #[test]
    fn test_required_plan() {
        assert_eq!(
            Feature::SubmitterConfirmations.required_plan(),
            PlanTier::Standard
        );
        assert_eq!(Feature::DateRangeFilters.required_plan(), PlanTier::Pro);
        assert_eq!(
            Feature::GlobalNotificationSettings.required_plan(),
            PlanTier::Pro
        );
    }
}
