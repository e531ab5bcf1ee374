//! Per-type transaction checks
//!
//! | type | requires |
//! |---|---|
//! | Issue | recipient, quantity |
//! | Transfer | sender, recipient (distinct), quantity, sender holdings |
//! | Redemption / Cancellation | sender, quantity, sender holdings |
//! | Return of capital / Capital call | recipient, amount, recipient holds the class |
//!
//! Every violation is collected, not just the first.

use crate::error::{TransactionValidationError as E, TransactionValidationErrors};
use crate::holdings::Holdings;
use crate::types::{MemberId, Transaction, TransactionType};

/// Validate `tx` against the holdings it would be applied to
///
/// # Errors
/// Returns every violated requirement.
pub fn validate_transaction(
    tx: &Transaction,
    holdings: &Holdings,
) -> Result<(), TransactionValidationErrors> {
    let ty = tx.transaction_type;
    let mut errors = Vec::new();

    if tx.entity_id.as_str().trim().is_empty() {
        errors.push(missing("entityId", ty));
    }
    if tx.security_class_id.as_str().trim().is_empty() {
        errors.push(missing("securityClassId", ty));
    }

    let needs_sender = ty.debits_sender();
    let needs_recipient = ty.credits_recipient() || ty.is_capital_movement();

    let from = present(tx.from_member.as_ref());
    let to = present(tx.to_member.as_ref());

    if needs_sender && from.is_none() {
        errors.push(missing("fromMember", ty));
    }
    if needs_recipient && to.is_none() {
        errors.push(missing("toMember", ty));
    }

    if ty.is_capital_movement() {
        if tx.amount_cents.unwrap_or(0) == 0 {
            errors.push(E::MissingAmount(ty));
        }
        if let Some(member) = to {
            if holdings.balance(member, &tx.security_class_id) == 0 {
                errors.push(E::NotAHolder {
                    member: member.clone(),
                    class: tx.security_class_id.clone(),
                });
            }
        }
    } else if tx.quantity == 0 {
        errors.push(E::ZeroQuantity);
    }

    if ty == TransactionType::Transfer {
        if let (Some(from), Some(to)) = (from, to) {
            if from == to {
                errors.push(E::SameMember);
            }
        }
    }

    if needs_sender && tx.quantity > 0 {
        if let Some(member) = from {
            let held = holdings.balance(member, &tx.security_class_id);
            if held < tx.quantity {
                errors.push(E::InsufficientHoldings {
                    member: member.clone(),
                    class: tx.security_class_id.clone(),
                    held,
                    requested: tx.quantity,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(
            transaction = %tx.id,
            kind = %ty,
            count = errors.len(),
            "transaction rejected"
        );
        Err(TransactionValidationErrors(errors))
    }
}

fn missing(field: &'static str, transaction_type: TransactionType) -> E {
    E::MissingField {
        field,
        transaction_type,
    }
}

fn present(member: Option<&MemberId>) -> Option<&MemberId> {
    member.filter(|m| !m.as_str().trim().is_empty())
}
