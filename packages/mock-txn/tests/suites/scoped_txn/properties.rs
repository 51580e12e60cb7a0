//! Properties that hold for any body which leaves the manager alone.

use mock_txn::{TransactionManager, TxnStatus};
use proptest::prelude::*;

use crate::support::Fixture;

fn fixture(prior_explicit: bool) -> Fixture {
    if prior_explicit {
        Fixture::explicit()
    } else {
        Fixture::new()
    }
}

proptest! {
    #[test]
    fn prop_scope_leaves_world_clean(
        prior_explicit in any::<bool>(),
        body_fails in any::<bool>(),
        message in "[A-Za-z][A-Za-z0-9 ]{0,23}"
    ) {
        let fx = fixture(prior_explicit);
        let mut seen = None;

        let result = fx.scope().run(|_conn| {
            seen = fx.txm.current();
            if body_fails {
                Err(message.clone())
            } else {
                Ok(())
            }
        });

        let conn = fx.only_conn();
        prop_assert!(conn.is_closed());
        prop_assert!(conn.is_minimized());
        prop_assert_eq!(fx.txm.explicit(), prior_explicit);
        prop_assert!(fx.txm.current().is_none());
        prop_assert!(fx.sink.is_empty());

        let txn = seen.unwrap();
        match result {
            Ok(()) => {
                prop_assert!(!body_fails);
                prop_assert_eq!(txn.status(), TxnStatus::Committed);
            }
            Err(err) => {
                prop_assert!(body_fails);
                prop_assert_eq!(err.into_body(), Some(message.clone()));
                prop_assert_eq!(txn.status(), TxnStatus::Aborted);
            }
        }
    }

    #[test]
    fn prop_doomed_is_never_committed(
        prior_explicit in any::<bool>(),
        body_fails in any::<bool>()
    ) {
        let fx = fixture(prior_explicit);
        let mut seen = None;

        let _ = fx.scope().run(|_conn| {
            fx.txm.doom().map_err(|e| e.to_string())?;
            seen = fx.txm.current();
            if body_fails {
                Err("BodyError".to_string())
            } else {
                Ok(())
            }
        });

        let txn = seen.unwrap();
        prop_assert_eq!(txn.status(), TxnStatus::Aborted);
        prop_assert_eq!(txn.commit_count(), 0);
        prop_assert_eq!(fx.txm.explicit(), prior_explicit);
    }
}
