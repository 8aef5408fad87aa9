//! Property tests for ledger non-negativity and wager conservation.

use dice_game::{
    GameServices, ServerMessage,
    game::{Outcome, RoundResolver},
    mocks::{InMemoryLedger, InMemoryLock, ScriptedRoller},
    net::messages::PlayRequest,
    wallet::{Ledger, WalletError},
};
use proptest::prelude::*;
use std::{sync::Arc, time::Duration};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_balance_never_negative(
        start in 0i64..1_000,
        deltas in prop::collection::vec(-500i64..500, 1..50),
    ) {
        runtime().block_on(async {
            let ledger = InMemoryLedger::new(start);
            ledger.ensure_wallet("p").await.unwrap();
            let mut expected = start;

            for delta in deltas {
                match ledger.adjust_balance("p", delta).await {
                    Ok(balance) => {
                        expected += delta;
                        prop_assert_eq!(balance, expected);
                    }
                    Err(WalletError::InsufficientFunds { available, .. }) => {
                        prop_assert!(expected + delta < 0);
                        prop_assert_eq!(available, expected);
                    }
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }
                prop_assert!(ledger.get_balance("p").await.unwrap() >= 0);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_wager_conserves_funds(
        die1 in 1u8..=6,
        die2 in 1u8..=6,
        amount in 1i64..=250,
        over in any::<bool>(),
    ) {
        runtime().block_on(async {
            let ledger = Arc::new(InMemoryLedger::new(500));
            let lock = Arc::new(InMemoryLock::new(Duration::from_secs(30)));
            let resolver = RoundResolver::new(Arc::new(ScriptedRoller::new([(die1, die2)])));
            let services = GameServices::new(ledger.clone(), lock.clone(), resolver, 250);

            let wager = services
                .validate_wager(&PlayRequest {
                    client_id: "p".to_string(),
                    bet_amount: amount,
                    bet_type: if over { "gt7" } else { "lt7" }.to_string(),
                })
                .unwrap();
            let messages = services.play(&wager).await;

            let expected = match &messages[0] {
                ServerMessage::PlayResult(r) if r.outcome == Outcome::Win => 500 + amount,
                ServerMessage::PlayResult(_) => 500 - amount,
                other => return Err(TestCaseError::fail(format!("unexpected {other}"))),
            };
            prop_assert_eq!(&messages[1], &ServerMessage::balance("p", expected));
            prop_assert_eq!(ledger.balance_of("p").await, Some(expected));
            prop_assert!(!lock.is_held("p").await);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
