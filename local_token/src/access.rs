use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use token_actor_utils::AccountId;

use crate::token::TokenError;

/// Holds the single account allowed to mint and to freeze/unfreeze
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessControl {
    owner: AccountId,
}

impl AccessControl {
    pub fn new(owner: AccountId) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn is_owner(&self, caller: &AccountId) -> bool {
        self.owner == *caller
    }

    /// Fails with Unauthorized unless the caller is the owner
    pub fn require_owner(&self, caller: &AccountId) -> Result<(), TokenError> {
        if !self.is_owner(caller) {
            return Err(TokenError::Unauthorized { caller: *caller });
        }
        Ok(())
    }
}
