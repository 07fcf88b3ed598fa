//! Property-based tests for domain value objects
//!
//! These tests use proptest to verify invariants across many random inputs.

use domain::value_objects::{ChaosAction, ChaosActionKind, FallbackTier, Probability};
use proptest::prelude::*;

// ============================================================================
// Probability Property Tests
// ============================================================================

mod probability_tests {
    use super::*;

    proptest! {
        #[test]
        fn values_in_unit_interval_accepted(v in 0.0f64..=1.0f64) {
            let p = Probability::new(v);
            prop_assert!(p.is_ok());
            prop_assert!((p.unwrap().value() - v).abs() < f64::EPSILON);
        }

        #[test]
        fn values_outside_unit_interval_rejected(
            v in prop_oneof![(-1000.0f64..-0.0001f64), (1.0001f64..1000.0f64)]
        ) {
            prop_assert!(Probability::new(v).is_err());
        }

        #[test]
        fn saturating_always_in_bounds(v in any::<f64>()) {
            let p = Probability::saturating(v).value();
            prop_assert!((0.0..=1.0).contains(&p));
        }

        #[test]
        fn zero_never_admits(roll in 0.0f64..1.0f64) {
            prop_assert!(!Probability::NEVER.admits(roll));
        }

        #[test]
        fn one_always_admits(roll in 0.0f64..1.0f64) {
            prop_assert!(Probability::ALWAYS.admits(roll));
        }
    }
}

// ============================================================================
// FallbackTier Property Tests
// ============================================================================

mod fallback_tier_tests {
    use super::*;

    fn tier_strategy() -> impl Strategy<Value = FallbackTier> {
        prop_oneof![
            Just(FallbackTier::Primary),
            Just(FallbackTier::Secondary),
            Just(FallbackTier::Degraded),
            Just(FallbackTier::Minimal),
        ]
    }

    proptest! {
        #[test]
        fn lower_is_strictly_worse(tier in tier_strategy()) {
            if let Some(next) = tier.lower() {
                prop_assert!(next > tier);
                prop_assert_eq!(next.index(), tier.index() + 1);
            } else {
                prop_assert_eq!(tier, FallbackTier::Minimal);
            }
        }

        #[test]
        fn higher_inverts_lower(tier in tier_strategy()) {
            if let Some(next) = tier.lower() {
                prop_assert_eq!(next.higher(), Some(tier));
            }
        }

        #[test]
        fn repeated_lowering_saturates(steps in 0usize..20) {
            let mut tier = FallbackTier::Primary;
            for _ in 0..steps {
                tier = tier.lower().unwrap_or(tier);
            }
            prop_assert!(usize::from(tier.index()) == steps.min(3));
        }
    }
}

// ============================================================================
// ChaosAction Property Tests
// ============================================================================

mod chaos_action_tests {
    use super::*;

    proptest! {
        #[test]
        fn untargeted_action_matches_any_target(target in "[a-z]{1,16}") {
            let action = ChaosAction::new(ChaosActionKind::Fail, Probability::ALWAYS);
            prop_assert!(action.applies_to(&target));
        }

        #[test]
        fn targeted_action_matches_only_its_target(
            a in "[a-z]{1,16}",
            b in "[a-z]{1,16}"
        ) {
            let action = ChaosAction::new(ChaosActionKind::Drop, Probability::ALWAYS)
                .with_target(a.clone());
            prop_assert!(action.applies_to(&a));
            prop_assert_eq!(action.applies_to(&b), a == b);
        }

        #[test]
        fn delay_param_is_preserved(ms in 0u64..100_000) {
            let action = ChaosAction::delay(Probability::ALWAYS, ms);
            prop_assert_eq!(action.delay_ms(), ms);
        }
    }
}
