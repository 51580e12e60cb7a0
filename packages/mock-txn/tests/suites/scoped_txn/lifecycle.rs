use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};

use mock_txn::{MockConn, ScopeError, Transaction, TransactionManager, TxnError, TxnStatus};
use mock_txn_test_support::assertions::assert_nothing_reported;

use crate::support::{Fixture, TestError};

#[test]
fn test_returns_connection_it_closes() {
    let fx = Fixture::new();

    let conn = fx
        .scope()
        .run(|conn: &MockConn| {
            assert!(!conn.is_closed());
            Ok::<_, TestError>(conn.clone())
        })
        .unwrap();

    assert!(conn.is_closed());
    assert!(conn.is_minimized());
    assert!(fx.only_conn().same_connection(&conn));
    assert_nothing_reported(&fx.sink.contents());
}

#[test]
fn test_sets_txm_explicit_for_the_body() {
    let fx = Fixture::new();
    assert!(!fx.txm.explicit());

    fx.scope()
        .run(|_conn| {
            assert!(fx.txm.explicit());
            Ok::<_, TestError>(())
        })
        .unwrap();

    assert!(!fx.txm.explicit());
}

#[test]
fn test_begins_ends_transaction() {
    let fx = Fixture::explicit();
    assert_eq!(fx.txm.get().unwrap_err(), TxnError::NoTransaction);

    fx.scope()
        .run(|_conn| {
            assert!(fx.txm.get().is_ok());
            Ok::<_, TestError>(())
        })
        .unwrap();

    assert!(fx.txm.explicit());
    assert_eq!(fx.txm.get().unwrap_err(), TxnError::NoTransaction);
}

#[test]
fn test_commits_scope_transaction_on_success() {
    let fx = Fixture::new();

    let txn = fx
        .scope()
        .run(|_conn| Ok::<_, TestError>(fx.txm.current().unwrap()))
        .unwrap();

    assert_eq!(txn.status(), TxnStatus::Committed);
    assert_eq!(txn.commit_count(), 1);
    assert!(fx.txm.current().is_none());
}

#[test]
fn test_aborts_doomed_tx() {
    let fx = Fixture::new();

    let txn = fx
        .scope()
        .run(|_conn| {
            fx.txm.doom()?;
            Ok::<_, TestError>(fx.txm.current().unwrap())
        })
        .unwrap();

    assert!(txn.is_doomed());
    assert_eq!(txn.status(), TxnStatus::Aborted);
    assert_eq!(txn.abort_count(), 1);
    assert_eq!(txn.commit_count(), 0);
}

#[test]
fn test_body_error_is_reraised_unchanged() {
    let fx = Fixture::new();
    let mut seen = None;

    let err = fx
        .scope()
        .run(|_conn| {
            seen = fx.txm.current();
            Err::<(), _>(TestError::Body)
        })
        .unwrap_err();

    assert!(matches!(err, ScopeError::Body(TestError::Body)));
    assert_eq!(err.to_string(), "BodyError");
    assert_eq!(err.into_body(), Some(TestError::Body));

    let txn = seen.unwrap();
    assert_eq!(txn.status(), TxnStatus::Aborted);
    assert!(fx.only_conn().is_closed());
    assert!(fx.only_conn().is_minimized());
    assert!(!fx.txm.explicit());
    assert_nothing_reported(&fx.sink.contents());
}

#[test]
fn test_guard_enter_exit() {
    let fx = Fixture::explicit();

    let guard = fx.scope().enter().unwrap();
    let began = guard.transaction_id();
    assert_eq!(fx.txm.current().map(|t| t.id()), Some(began));
    assert!(guard.connection().same_connection(&fx.only_conn()));

    let value = guard.exit(Ok::<_, TestError>(42)).unwrap();
    assert_eq!(value, 42);
    assert!(fx.only_conn().is_closed());
    assert!(fx.txm.current().is_none());
    assert!(fx.txm.explicit());
}

#[test]
fn test_each_scope_opens_its_own_connection() {
    let fx = Fixture::new();

    for _ in 0..3 {
        fx.scope().run(|_conn| Ok::<_, TestError>(())).unwrap();
    }

    let pool = fx.db.pool();
    assert_eq!(pool.len(), 3);
    assert!(pool.iter().all(|conn| conn.is_closed() && conn.is_minimized()));
}

#[test]
fn test_panicking_body_still_cleans_up() {
    let fx = Fixture::new();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        fx.scope()
            .run(|_conn| -> Result<(), TestError> { panic!("body panicked") })
    }));

    assert!(outcome.is_err());
    assert!(fx.only_conn().is_closed());
    assert!(fx.only_conn().is_minimized());
    assert!(!fx.txm.explicit());
    assert!(fx.txm.current().is_none());
}

#[test]
fn test_panicking_body_aborts_stray_transaction() {
    let fx = Fixture::explicit();
    let stray = RefCell::new(None);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        fx.scope().run(|_conn| -> Result<(), TestError> {
            fx.txm.commit()?;
            *stray.borrow_mut() = Some(fx.txm.begin()?);
            panic!("body panicked after replacing the transaction")
        })
    }));

    assert!(outcome.is_err());
    let stray = stray.into_inner().unwrap();
    assert_eq!(stray.status(), TxnStatus::Aborted);
    assert!(fx.txm.current().is_none());
    assert_eq!(fx.txm.get().err(), Some(TxnError::NoTransaction));
    assert!(fx.txm.explicit());
    assert!(fx.only_conn().is_closed());
    assert_nothing_reported(&fx.sink.contents());

    // A later scope on the same manager is not blocked by the stray
    fx.scope().run(|_conn| Ok::<_, TestError>(())).unwrap();
}
