//! Mock database and connections.
//!
//! `MockDb` hands out `MockConn` handles and remembers every one of them, in
//! order, so tests can inspect what a scope left behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::DbError;

/// Something a scope can open a connection from.
pub trait Database {
    type Conn: Connection;

    fn open(&self) -> Result<Self::Conn, DbError>;
}

/// A connection a scope closes and minimizes on exit.
pub trait Connection {
    fn close(&self) -> Result<(), DbError>;

    fn cache_minimize(&self) -> Result<(), DbError>;
}

#[derive(Debug, Default)]
pub struct MockDb {
    pool: Mutex<Vec<MockConn>>,
    fail_open: Mutex<Option<String>>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connection opened so far, oldest first.
    pub fn pool(&self) -> Vec<MockConn> {
        self.pool.lock().clone()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.lock().len()
    }

    /// The next `open()` fails with `message` without adding to the pool.
    pub fn fail_next_open(&self, message: impl Into<String>) {
        *self.fail_open.lock() = Some(message.into());
    }
}

impl Database for MockDb {
    type Conn = MockConn;

    fn open(&self) -> Result<MockConn, DbError> {
        if let Some(message) = self.fail_open.lock().take() {
            return Err(DbError::Open { message });
        }
        let conn = MockConn::default();
        self.pool.lock().push(conn.clone());
        Ok(conn)
    }
}

#[derive(Debug, Default)]
struct ConnState {
    closed: AtomicBool,
    minimized: AtomicBool,
    fail_close: Mutex<Option<String>>,
    fail_minimize: Mutex<Option<String>>,
}

/// Cloneable handle; clones observe the same flags.
#[derive(Debug, Clone, Default)]
pub struct MockConn {
    state: Arc<ConnState>,
}

impl MockConn {
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn is_minimized(&self) -> bool {
        self.state.minimized.load(Ordering::SeqCst)
    }

    /// The next `close()` fails with `message` and leaves the flag unset.
    pub fn fail_close_with(&self, message: impl Into<String>) {
        *self.state.fail_close.lock() = Some(message.into());
    }

    /// The next `cache_minimize()` fails with `message` and leaves the flag unset.
    pub fn fail_minimize_with(&self, message: impl Into<String>) {
        *self.state.fail_minimize.lock() = Some(message.into());
    }

    /// True when both handles refer to the same connection.
    pub fn same_connection(&self, other: &MockConn) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Connection for MockConn {
    fn close(&self) -> Result<(), DbError> {
        if let Some(message) = self.state.fail_close.lock().take() {
            return Err(DbError::Close { message });
        }
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cache_minimize(&self) -> Result<(), DbError> {
        if let Some(message) = self.state.fail_minimize.lock().take() {
            return Err(DbError::Minimize { message });
        }
        self.state.minimized.store(true, Ordering::SeqCst);
        Ok(())
    }
}
