//! Business rule validation for ledger inputs.

use kasse_shared::types::Money;

use super::error::LedgerError;
use super::types::LineItemInput;

/// Parses a canonical amount such as `"12.50"`.
///
/// Localized input (`"12,50"`) must be normalized by the input layer with
/// [`Money::parse_localized`] first; the ledger only accepts the canonical
/// form.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidAmount`] if the text is not an exact cent amount.
pub fn parse_amount(input: &str) -> Result<Money, LedgerError> {
    Ok(Money::parse(input)?)
}

/// Requires a strictly positive amount.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidAmount`] for zero or negative amounts.
pub fn validate_positive(amount: Money) -> Result<(), LedgerError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(format!(
            "{amount} must be greater than zero"
        )))
    }
}

/// Requires a non-zero amount of either sign.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidAmount`] for zero.
pub fn validate_non_zero(amount: Money) -> Result<(), LedgerError> {
    if amount.is_zero() {
        Err(LedgerError::InvalidAmount(
            "adjustment amount must not be zero".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Sums the line items, rejecting malformed entries.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidLineItem`] for a zero quantity, a negative
/// unit price, or a total that does not fit.
pub fn line_items_total(items: &[LineItemInput]) -> Result<Money, LedgerError> {
    items.iter().try_fold(Money::ZERO, |acc, item| {
        if item.quantity == 0 {
            return Err(LedgerError::InvalidLineItem(format!(
                "quantity for item {} must be at least 1",
                item.catalog_item_id
            )));
        }
        if item.unit_price.is_negative() {
            return Err(LedgerError::InvalidLineItem(format!(
                "unit price for item {} must not be negative",
                item.catalog_item_id
            )));
        }
        item.line_total()
            .and_then(|line| acc.checked_add(line))
            .ok_or_else(|| LedgerError::InvalidLineItem("line items total overflows".to_string()))
    })
}

/// Checks that a non-empty cart adds up to the charged amount.
///
/// An empty cart is a manual charge and is accepted as-is.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidLineItem`] or [`LedgerError::LineItemMismatch`].
pub fn validate_line_items(amount: Money, items: &[LineItemInput]) -> Result<(), LedgerError> {
    if items.is_empty() {
        return Ok(());
    }

    let items_total = line_items_total(items)?;
    if items_total != amount {
        return Err(LedgerError::LineItemMismatch {
            total: amount,
            items_total,
        });
    }
    Ok(())
}
