use fvm_shared::econ::TokenAmount;
use serde::{Deserialize, Serialize};
use token_actor_utils::AccountId;

/// A record of a committed state change, in the order it happened
///
/// Mints are reported as transfers from `AccountId::ZERO`, burns as transfers to it. The ledger
/// refuses ZERO as a transfer recipient, so a `Transfer` naming it always marks a supply change.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum TokenEvent {
    Transfer { from: AccountId, to: AccountId, value: TokenAmount },
    Approval { owner: AccountId, spender: AccountId, value: TokenAmount },
    Freeze { target: AccountId },
    Unfreeze { target: AccountId },
}

/// Append-only list of events, drained by observers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog {
    records: Vec<TokenEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TokenEvent) {
        self.records.push(event);
    }

    pub fn events(&self) -> &[TokenEvent] {
        &self.records
    }

    /// Removes and returns every record, leaving the log empty
    pub fn take(&mut self) -> Vec<TokenEvent> {
        std::mem::take(&mut self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
