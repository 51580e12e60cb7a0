use mock_txn::txn::txn_policy;
use mock_txn::{LocalTxnManager, MockDb, ScopedMockTxn, TransactionManager, TxnPolicy, TxnStatus};

#[test]
fn test_policy_is_abort_on_ok() {
    assert_eq!(txn_policy::current(), TxnPolicy::AbortOnOk);

    // Later sets are ignored.
    txn_policy::set_txn_policy(TxnPolicy::CommitOnOk);
    assert_eq!(txn_policy::current(), TxnPolicy::AbortOnOk);
}

#[test]
fn test_successful_scope_aborts_under_policy() {
    let db = MockDb::new();
    let txm = LocalTxnManager::new();

    let txn = ScopedMockTxn::new(&db, &txm)
        .run(|_conn| Ok::<_, String>(txm.current().unwrap()))
        .unwrap();

    assert_eq!(txn.status(), TxnStatus::Aborted);
    assert_eq!(txn.commit_count(), 0);
    assert!(db.pool()[0].is_closed());
    assert!(!txm.explicit());
}

#[test]
fn test_scope_override_beats_process_policy() {
    let db = MockDb::new();
    let txm = LocalTxnManager::new();

    let txn = ScopedMockTxn::new(&db, &txm)
        .with_policy(TxnPolicy::CommitOnOk)
        .run(|_conn| Ok::<_, String>(txm.current().unwrap()))
        .unwrap();

    assert_eq!(txn.status(), TxnStatus::Committed);
}
