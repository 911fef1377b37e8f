use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width in bytes of an account identifier
pub const ACCOUNT_ID_LEN: usize = 20;

#[derive(Error, Debug, PartialEq)]
pub enum AccountIdError {
    #[error("account id must be {ACCOUNT_ID_LEN} bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex in account id: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Opaque, fixed-width identifier of a ledger participant
///
/// Identity is plain byte equality. [`AccountId::ZERO`] is reserved as the sentinel "no account"
/// used as the counterparty of mints and burns in emitted records.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId([u8; ACCOUNT_ID_LEN]);

impl AccountId {
    pub const ZERO: AccountId = AccountId([0; ACCOUNT_ID_LEN]);

    pub const fn new(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        AccountId(bytes)
    }

    /// Builds an id whose trailing 8 bytes hold `n` big-endian, handy for fixtures
    pub const fn from_u64(n: u64) -> Self {
        let n = n.to_be_bytes();
        let mut bytes = [0u8; ACCOUNT_ID_LEN];
        let mut i = 0;
        while i < 8 {
            bytes[ACCOUNT_ID_LEN - 8 + i] = n[i];
            i += 1;
        }
        AccountId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<[u8; ACCOUNT_ID_LEN]> for AccountId {
    fn from(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        AccountId(bytes)
    }
}

impl TryFrom<&[u8]> for AccountId {
    type Error = AccountIdError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; ACCOUNT_ID_LEN] =
            bytes.try_into().map_err(|_| AccountIdError::InvalidLength(bytes.len()))?;
        Ok(AccountId(bytes))
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    /// Parses hex, with or without a leading `0x`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != ACCOUNT_ID_LEN * 2 {
            return Err(AccountIdError::InvalidLength(s.len() / 2));
        }
        let mut bytes = [0u8; ACCOUNT_ID_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(AccountId(bytes))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
