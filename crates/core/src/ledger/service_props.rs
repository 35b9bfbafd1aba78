//! Property-based tests for LedgerService.
//!
//! - Balance never goes negative under any sequence of debits
//! - Repeated credits accumulate exactly
//! - Cart totals reconcile with line items

use kasse_shared::types::{AccountId, CatalogItemId, Money};
use proptest::prelude::*;

use super::error::LedgerError;
use super::service::LedgerService;
use super::types::{AccountRef, DebitRequest, LineItemInput};

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_cents() -> impl Strategy<Value = i64> {
    1i64..1_000_000i64
}

fn line_item() -> impl Strategy<Value = LineItemInput> {
    (1u32..20, 0i64..50_000).prop_map(|(quantity, unit)| LineItemInput {
        catalog_item_id: CatalogItemId::new(),
        quantity,
        unit_price: Money::from_cents(unit),
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Applying any sequence of debits keeps the balance non-negative and
    /// leaves it unchanged whenever a debit is rejected.
    #[test]
    fn prop_balance_never_negative(
        start in 0i64..1_000_000,
        debits in prop::collection::vec(positive_cents(), 1..30),
    ) {
        let mut balance = Money::from_cents(start);
        for cents in debits {
            match LedgerService::apply(balance, Money::from_cents(-cents)) {
                Ok(change) => {
                    prop_assert!(!change.new.is_negative());
                    prop_assert_eq!(change.new.cents(), balance.cents() - cents);
                    balance = change.new;
                }
                Err(LedgerError::InsufficientFunds { balance: seen, requested }) => {
                    prop_assert_eq!(seen, balance);
                    prop_assert_eq!(requested.cents(), cents);
                    prop_assert!(cents > balance.cents());
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }

    /// N credits of the same amount sum to exactly N × amount.
    #[test]
    fn prop_credits_accumulate_exactly(
        cents in positive_cents(),
        times in 1usize..100,
    ) {
        let mut balance = Money::ZERO;
        for _ in 0..times {
            balance = LedgerService::apply(balance, Money::from_cents(cents)).unwrap().new;
        }
        let expected = cents * i64::try_from(times).unwrap();
        prop_assert_eq!(balance.cents(), expected);
    }

    /// A debit whose amount equals the cart total is always accepted.
    #[test]
    fn prop_matching_cart_is_accepted(
        items in prop::collection::vec(line_item(), 1..10),
    ) {
        let total: i64 = items
            .iter()
            .map(|i| i.unit_price.cents() * i64::from(i.quantity))
            .sum();
        prop_assume!(total > 0);

        let request = DebitRequest {
            account: AccountRef::Id(AccountId::new()),
            amount: Money::from_cents(total),
            actor_id: AccountId::new(),
            line_items: items,
            description: None,
        };
        let op = LedgerService::prepare_debit(request).unwrap();
        prop_assert_eq!(op.delta.cents(), -total);
    }

    /// Any discrepancy between amount and cart total is rejected.
    #[test]
    fn prop_mismatched_cart_is_rejected(
        items in prop::collection::vec(line_item(), 1..10),
        offset in 1i64..1_000,
    ) {
        let total: i64 = items
            .iter()
            .map(|i| i.unit_price.cents() * i64::from(i.quantity))
            .sum();

        let request = DebitRequest {
            account: AccountRef::Id(AccountId::new()),
            amount: Money::from_cents(total + offset),
            actor_id: AccountId::new(),
            line_items: items,
            description: None,
        };
        let is_mismatch = matches!(
            LedgerService::prepare_debit(request),
            Err(LedgerError::LineItemMismatch { .. })
        );
        prop_assert!(is_mismatch);
    }
}
