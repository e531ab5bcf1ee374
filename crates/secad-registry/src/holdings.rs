//! Member holdings derived from transaction history

use crate::types::{MemberId, SecurityClassId, Transaction};
use std::collections::HashMap;

/// Quantity held per (member, security class)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Holdings {
    balances: HashMap<(MemberId, SecurityClassId), u64>,
}

impl Holdings {
    /// Create empty holdings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a transaction history, oldest first
    #[must_use]
    pub fn from_transactions<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut holdings = Self::new();
        for tx in transactions {
            holdings.apply(tx);
        }
        holdings
    }

    /// Apply one transaction
    ///
    /// Debits saturate at zero; histories edited outside validation can
    /// otherwise drive a balance negative.
    pub fn apply(&mut self, tx: &Transaction) {
        let ty = tx.transaction_type;

        if ty.debits_sender() {
            if let Some(from) = &tx.from_member {
                let balance = self
                    .balances
                    .entry((from.clone(), tx.security_class_id.clone()))
                    .or_insert(0);
                *balance = balance.saturating_sub(tx.quantity);
            }
        }

        if ty.credits_recipient() {
            if let Some(to) = &tx.to_member {
                let balance = self
                    .balances
                    .entry((to.clone(), tx.security_class_id.clone()))
                    .or_insert(0);
                *balance = balance.saturating_add(tx.quantity);
            }
        }
    }

    /// Quantity `member` holds of `class`
    #[must_use]
    pub fn balance(&self, member: &MemberId, class: &SecurityClassId) -> u64 {
        self.balances
            .get(&(member.clone(), class.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Total units on issue for `class`
    #[must_use]
    pub fn total_for_class(&self, class: &SecurityClassId) -> u64 {
        self.balances
            .iter()
            .filter(|((_, c), _)| c == class)
            .map(|(_, qty)| *qty)
            .sum()
    }

    /// Members holding a non-zero quantity of `class`, sorted
    #[must_use]
    pub fn holders_of(&self, class: &SecurityClassId) -> Vec<(MemberId, u64)> {
        let mut holders: Vec<_> = self
            .balances
            .iter()
            .filter(|((_, c), qty)| c == class && **qty > 0)
            .map(|((m, _), qty)| (m.clone(), *qty))
            .collect();
        holders.sort();
        holders
    }
}
