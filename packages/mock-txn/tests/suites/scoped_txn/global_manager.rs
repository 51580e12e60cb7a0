use mock_txn::{txn, MockDb, ScopedMockTxn, TransactionManager, TxnPolicy};
use serial_test::serial;

#[test]
#[serial]
fn test_scope_over_process_wide_manager() {
    let txm = txn::global();
    let prior = txm.explicit();
    let db = MockDb::new();

    let conn = ScopedMockTxn::new(&db, txm)
        .with_policy(TxnPolicy::CommitOnOk)
        .run(|conn| {
            assert!(txn::global().explicit());
            Ok::<_, String>(conn.clone())
        })
        .unwrap();

    assert!(conn.is_closed());
    assert_eq!(txm.explicit(), prior);
}

#[test]
#[serial]
fn test_process_wide_mode_change_is_detected() {
    let txm = txn::global();
    let prior = txm.explicit();
    let db = MockDb::new();

    let err = ScopedMockTxn::new(&db, txm)
        .run(|_conn| {
            txn::global().set_explicit(!txn::global().explicit());
            Ok::<_, String>(())
        })
        .unwrap_err();

    assert!(err.is_mode_changed());
    assert_eq!(txm.explicit(), prior);
    assert!(txm.current().is_none());
}
