use std::sync::Arc;

use fvm_ipld_encoding::RawBytes;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use local_token::events::TokenEvent;
use local_token::token::types::{
    ApproveAndCallParams, BurnFromReturn, FreezeParams, TransferFromReturn, TransferParams,
};
use local_token::{ErrorKind, LocalTokenApi};
use num_traits::Zero;
use test_receivers::{action, ScriptedReceiver, TestAction};

mod common;
use common::*;

/// Deploys a ledger with a scripted receiver registered for BOB and CAROL
fn setup() -> (MemoryToken, Arc<ScriptedReceiver>) {
    let mut ledger = deploy();
    let receiver = Arc::new(ScriptedReceiver::new());
    ledger.register_receiver(BOB, receiver.clone());
    ledger.register_receiver(CAROL, receiver.clone());
    ledger.take_events();
    (ledger, receiver)
}

fn call_params(amount: TokenAmount, data: RawBytes) -> ApproveAndCallParams {
    ApproveAndCallParams { spender: BOB, amount, data }
}

#[test]
fn accepted_callback_keeps_the_approval() {
    let (mut ledger, receiver) = setup();

    let ret = ledger
        .approve_and_call(&DEPLOYER, call_params(whole(10), action(TestAction::Accept)))
        .unwrap();
    assert_eq!(ret.allowance, whole(10));
    ledger.assert_allowance(DEPLOYER, BOB, whole(10));
    assert_eq!(
        ledger.take_events(),
        vec![TokenEvent::Approval { owner: DEPLOYER, spender: BOB, value: whole(10) }]
    );

    let received = receiver.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].approver, DEPLOYER);
    assert_eq!(received[0].spender, BOB);
    assert_eq!(received[0].token, TOKEN_ACTOR);
    assert_eq!(received[0].amount, whole(10));
}

#[test]
fn empty_data_is_accepted() {
    let (mut ledger, _receiver) = setup();
    ledger.approve_and_call(&DEPLOYER, call_params(whole(1), RawBytes::default())).unwrap();
    ledger.assert_allowance(DEPLOYER, BOB, whole(1));
}

#[test]
fn rejected_callback_rolls_back() {
    let (mut ledger, receiver) = setup();
    let before = ledger.state().clone();

    let err = ledger
        .approve_and_call(&DEPLOYER, call_params(whole(10), action(TestAction::Reject)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CallbackRejected);
    assert_eq!(ExitCode::from(&err), ExitCode::USR_FORBIDDEN);
    assert_eq!(ledger.state(), &before);
    ledger.assert_allowance(DEPLOYER, BOB, TokenAmount::zero());
    assert!(ledger.events().is_empty());
    // the receiver was still notified
    assert_eq!(receiver.received().len(), 1);
}

#[test]
fn missing_receiver_rolls_back() {
    let (mut ledger, receiver) = setup();
    let before = ledger.state().clone();

    let err = ledger
        .approve_and_call(
            &DEPLOYER,
            ApproveAndCallParams { spender: ALICE, amount: whole(10), data: RawBytes::default() },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CallbackRejected);
    assert_eq!(ExitCode::from(&err), ExitCode::USR_UNHANDLED_MESSAGE);
    assert_eq!(ledger.state(), &before);
    assert!(ledger.events().is_empty());
    assert!(receiver.received().is_empty());
}

#[test]
fn reentrant_pull_sees_the_approval() {
    let (mut ledger, _receiver) = setup();

    let ret = ledger
        .approve_and_call(&DEPLOYER, call_params(whole(10), action(TestAction::PullAllowance)))
        .unwrap();
    assert_eq!(ret.allowance, TokenAmount::zero());
    let pulled: TransferFromReturn = ret.recipient_data.deserialize().unwrap();
    assert_eq!(pulled.to_balance, whole(10));
    assert_eq!(pulled.allowance, TokenAmount::zero());

    ledger.assert_balance(BOB, whole(10));
    ledger.assert_balance(DEPLOYER, whole(100_000_000 - 10));
    assert_eq!(
        ledger.take_events(),
        vec![
            TokenEvent::Approval { owner: DEPLOYER, spender: BOB, value: whole(10) },
            TokenEvent::Transfer { from: DEPLOYER, to: BOB, value: whole(10) },
        ]
    );
    ledger.assert_consistent();
}

#[test]
fn reentrant_burn_reduces_supply() {
    let (mut ledger, _receiver) = setup();

    let ret = ledger
        .approve_and_call(&DEPLOYER, call_params(whole(10), action(TestAction::BurnAllowance)))
        .unwrap();
    let burned: BurnFromReturn = ret.recipient_data.deserialize().unwrap();
    assert_eq!(burned.balance, whole(100_000_000 - 10));
    ledger.assert_supply(whole(100_000_000 - 10));
    ledger.assert_allowance(DEPLOYER, BOB, TokenAmount::zero());
    ledger.assert_consistent();
}

#[test]
fn action_then_abort_rolls_back_everything() {
    let (mut ledger, receiver) = setup();
    ledger.transfer(&DEPLOYER, TransferParams { to: BOB, amount: whole(5) }).unwrap();
    let before = ledger.state().clone();
    let events_before = ledger.events().to_vec();

    // pull the allowance, then reject
    let err = ledger
        .approve_and_call(
            &DEPLOYER,
            call_params(whole(10), action(TestAction::ActionThenAbort(action(TestAction::PullAllowance)))),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CallbackRejected);
    assert_eq!(ExitCode::from(&err), ExitCode::USR_UNSPECIFIED);

    // spend own balance, then reject
    let err = ledger
        .approve_and_call(
            &DEPLOYER,
            call_params(
                whole(10),
                action(TestAction::ActionThenAbort(action(TestAction::Transfer(RECIPIENT, whole(5))))),
            ),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CallbackRejected);

    assert_eq!(ledger.state(), &before);
    assert_eq!(ledger.events(), events_before.as_slice());
    ledger.assert_balance(BOB, whole(5));
    ledger.assert_balance(RECIPIENT, TokenAmount::zero());
    ledger.assert_allowance(DEPLOYER, BOB, TokenAmount::zero());
    assert_eq!(receiver.received().len(), 2);
    ledger.assert_consistent();
}

#[test]
fn nested_approve_and_call() {
    let (mut ledger, receiver) = setup();
    ledger.transfer(&DEPLOYER, TransferParams { to: BOB, amount: whole(5) }).unwrap();
    ledger.take_events();

    // BOB approves CAROL in its callback, and CAROL pulls from BOB in hers
    let nested = TestAction::ApproveAndCall {
        spender: CAROL,
        amount: whole(5),
        data: action(TestAction::PullAllowance),
    };
    ledger.approve_and_call(&DEPLOYER, call_params(whole(10), action(nested.clone()))).unwrap();

    ledger.assert_balance(BOB, TokenAmount::zero());
    ledger.assert_balance(CAROL, whole(5));
    ledger.assert_allowance(DEPLOYER, BOB, whole(10));
    ledger.assert_allowance(BOB, CAROL, TokenAmount::zero());
    assert_eq!(
        ledger.take_events(),
        vec![
            TokenEvent::Approval { owner: DEPLOYER, spender: BOB, value: whole(10) },
            TokenEvent::Approval { owner: BOB, spender: CAROL, value: whole(5) },
            TokenEvent::Transfer { from: BOB, to: CAROL, value: whole(5) },
        ]
    );
    assert_eq!(receiver.received().len(), 2);

    // the outer receiver aborting after the inner call succeeded undoes both levels
    ledger.transfer(&CAROL, TransferParams { to: BOB, amount: whole(5) }).unwrap();
    let before_abort = ledger.state().clone();
    let err = ledger
        .approve_and_call(
            &DEPLOYER,
            call_params(whole(10), action(TestAction::ActionThenAbort(action(nested)))),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CallbackRejected);
    assert_eq!(ledger.state(), &before_abort);
    ledger.assert_balance(BOB, whole(5));
    ledger.assert_balance(CAROL, TokenAmount::zero());
    ledger.assert_consistent();
}

#[test]
fn frozen_spender_is_rejected_before_the_callback() {
    let (mut ledger, receiver) = setup();
    ledger.freeze(&DEPLOYER, FreezeParams { target: BOB }).unwrap();

    let err = ledger
        .approve_and_call(&DEPLOYER, call_params(whole(10), action(TestAction::Accept)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountFrozen);
    assert!(receiver.received().is_empty());
}

#[test]
fn approval_above_balance_is_rejected_before_the_callback() {
    let (mut ledger, receiver) = setup();

    let err = ledger
        .approve_and_call(&ALICE, call_params(whole(1), action(TestAction::Accept)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert!(receiver.received().is_empty());
    assert!(ledger.events().is_empty());
}

#[test]
fn receiver_cannot_perform_owner_operations() {
    let (mut ledger, _receiver) = setup();
    let before = ledger.state().clone();

    let err = ledger
        .approve_and_call(
            &DEPLOYER,
            call_params(whole(10), action(TestAction::Mint(BOB, whole(1_000_000)))),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CallbackRejected);
    assert_eq!(ExitCode::from(&err), ExitCode::USR_FORBIDDEN);

    let err = ledger
        .approve_and_call(&DEPLOYER, call_params(whole(10), action(TestAction::Freeze(DEPLOYER))))
        .unwrap_err();
    assert_eq!(ExitCode::from(&err), ExitCode::USR_FORBIDDEN);

    assert_eq!(ledger.state(), &before);
    ledger.assert_supply(whole(100_000_000));
    ledger.assert_balance(BOB, TokenAmount::zero());
    assert!(!ledger.is_frozen(&DEPLOYER).unwrap());
    assert!(ledger.events().is_empty());
}

#[test]
fn rejected_callback_restores_the_event_log() {
    let (mut ledger, _receiver) = setup();
    ledger.transfer(&DEPLOYER, TransferParams { to: ALICE, amount: whole(1) }).unwrap();
    let events_before = ledger.events().to_vec();

    ledger
        .approve_and_call(
            &DEPLOYER,
            call_params(whole(10), action(TestAction::ActionThenAbort(action(TestAction::TakeEvents)))),
        )
        .unwrap_err();
    assert_eq!(ledger.events(), events_before.as_slice());
}

#[test]
fn rejected_callback_restores_the_state_root() {
    let (mut ledger, _receiver) = setup();
    let root_before = ledger.runtime().root_cid().unwrap();

    ledger
        .approve_and_call(
            &DEPLOYER,
            call_params(whole(10), action(TestAction::ActionThenAbort(action(TestAction::Save)))),
        )
        .unwrap_err();
    assert_eq!(ledger.runtime().root_cid().unwrap(), root_before);

    // an accepted callback may persist the approval it was told about
    ledger.approve_and_call(&DEPLOYER, call_params(whole(10), action(TestAction::Save))).unwrap();
    let saved = ledger.runtime().root_cid().unwrap();
    assert_ne!(saved, root_before);
    assert_eq!(ledger.save().unwrap(), saved);
}

#[test]
fn rejected_callback_restores_registered_receivers() {
    let (mut ledger, receiver) = setup();

    ledger
        .approve_and_call(
            &DEPLOYER,
            call_params(
                whole(10),
                action(TestAction::ActionThenAbort(action(TestAction::Unregister(CAROL)))),
            ),
        )
        .unwrap_err();

    ledger
        .approve_and_call(
            &DEPLOYER,
            ApproveAndCallParams { spender: CAROL, amount: whole(1), data: RawBytes::default() },
        )
        .unwrap();
    ledger.assert_allowance(DEPLOYER, CAROL, whole(1));
    assert_eq!(receiver.received().len(), 2);
}
