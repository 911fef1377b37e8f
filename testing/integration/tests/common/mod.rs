// each test binary uses a different subset of these helpers
#![allow(dead_code)]

use std::sync::Once;

use fvm_ipld_blockstore::MemoryBlockstore;
use fvm_shared::econ::TokenAmount;
use local_token::token::types::{ConstructorParams, GetAllowanceParams};
use local_token::{LocalToken, LocalTokenApi};
use token_actor_utils::syscalls::MemorySyscalls;
use token_actor_utils::util::ActorRuntime;
use token_actor_utils::AccountId;

pub type MemoryToken = LocalToken<MemorySyscalls, MemoryBlockstore>;

pub const TOKEN_ACTOR: AccountId = AccountId::from_u64(1000);
pub const DEPLOYER: AccountId = AccountId::from_u64(1);
pub const ALICE: AccountId = AccountId::from_u64(2);
pub const BOB: AccountId = AccountId::from_u64(3);
pub const CAROL: AccountId = AccountId::from_u64(4);
pub const RECIPIENT: AccountId = AccountId::from_u64(5);

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber once per test binary, filtered by RUST_LOG
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Whole tokens at 18 decimals
pub fn whole(n: i64) -> TokenAmount {
    TokenAmount::from_whole(n)
}

/// Deploys "LocalToken"/"LTK" with 18 decimals and 100000000 whole tokens to DEPLOYER
pub fn deploy() -> MemoryToken {
    deploy_with_supply(100_000_000)
}

pub fn deploy_with_supply(initial_supply: u64) -> MemoryToken {
    init_tracing();
    LocalToken::construct(
        ActorRuntime::new_memory_runtime(TOKEN_ACTOR),
        DEPLOYER,
        ConstructorParams {
            name: "LocalToken".into(),
            symbol: "LTK".into(),
            decimals: 18,
            initial_supply,
        },
    )
    .unwrap()
}

/// Assertion helpers over a deployed ledger
pub trait TokenHelpers {
    fn assert_balance(&self, account: AccountId, expected: TokenAmount);
    fn assert_allowance(&self, owner: AccountId, spender: AccountId, expected: TokenAmount);
    fn assert_supply(&self, expected: TokenAmount);
    /// Asserts the state invariants hold and the supply equals the sum of balances
    fn assert_consistent(&self);
}

impl TokenHelpers for MemoryToken {
    fn assert_balance(&self, account: AccountId, expected: TokenAmount) {
        assert_eq!(self.balance_of(&account).unwrap(), expected, "balance of {account}");
    }

    fn assert_allowance(&self, owner: AccountId, spender: AccountId, expected: TokenAmount) {
        let allowance = self.allowance(GetAllowanceParams { owner, spender }).unwrap();
        assert_eq!(allowance, expected, "allowance of {spender} over {owner}");
    }

    fn assert_supply(&self, expected: TokenAmount) {
        assert_eq!(self.total_supply(), expected);
    }

    fn assert_consistent(&self) {
        let summary = self.check_invariants().unwrap();
        let sum = summary.balances.values().fold(TokenAmount::default(), |acc, b| &acc + b);
        assert_eq!(sum, self.total_supply());
    }
}
