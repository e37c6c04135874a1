//! In-memory vector store for tests.

use super::{VectorStoreConnection, VectorStoreConnector};
use crate::config::{Backend, VectorStoreConfig};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    collections: BTreeSet<String>,
    fail_connect: bool,
    fail_requests: bool,
    /// Requests answered before `fail_requests` kicks in.
    requests_left: Option<usize>,
    ignore_deletes: bool,
    connects: usize,
    deletes: usize,
    closes: usize,
}

impl State {
    /// Account for one request and fail it if the store is set up to.
    fn answer(&mut self) -> Result<()> {
        match self.requests_left {
            Some(0) => self.fail_requests = true,
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        if self.fail_requests {
            return Err(EvalError::ExternalService("request timed out".to_string()));
        }
        Ok(())
    }
}

/// Shared handle; clones observe the same collections and counters.
#[derive(Debug, Clone)]
pub(crate) struct FakeStore {
    backend: Backend,
    state: Arc<Mutex<State>>,
}

impl FakeStore {
    pub(crate) fn new(backend: Backend) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub(crate) fn with_collection(self, name: &str) -> Self {
        self.state.lock().unwrap().collections.insert(name.to_string());
        self
    }

    pub(crate) fn failing_connect(self) -> Self {
        self.state.lock().unwrap().fail_connect = true;
        self
    }

    pub(crate) fn failing_requests(self) -> Self {
        self.state.lock().unwrap().fail_requests = true;
        self
    }

    /// Answer `count` requests, then fail every later one.
    pub(crate) fn failing_requests_after(self, count: usize) -> Self {
        self.state.lock().unwrap().requests_left = Some(count);
        self
    }

    pub(crate) fn ignoring_deletes(self) -> Self {
        self.state.lock().unwrap().ignore_deletes = true;
        self
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.state.lock().unwrap().collections.contains(name)
    }

    pub(crate) fn collections(&self) -> Vec<String> {
        self.state.lock().unwrap().collections.iter().cloned().collect()
    }

    pub(crate) fn deletes(&self) -> usize {
        self.state.lock().unwrap().deletes
    }

    pub(crate) fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Connections opened and not yet closed.
    pub(crate) fn open_connections(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.connects - state.closes
    }
}

#[async_trait]
impl VectorStoreConnector for FakeStore {
    async fn connect(&self, _config: &VectorStoreConfig) -> Result<Box<dyn VectorStoreConnection>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(EvalError::ExternalService("connection refused".to_string()));
        }
        state.connects += 1;
        Ok(Box::new(FakeConnection {
            backend: self.backend,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct FakeConnection {
    backend: Backend,
    state: Arc<Mutex<State>>,
    closed: bool,
}

#[async_trait]
impl VectorStoreConnection for FakeConnection {
    fn backend(&self) -> Backend {
        self.backend
    }

    async fn collection_exists(&mut self, name: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.answer()?;
        Ok(state.collections.contains(name))
    }

    async fn delete_collection(&mut self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.answer()?;
        state.deletes += 1;
        if !state.ignore_deletes {
            state.collections.remove(name);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.state.lock().unwrap().closes += 1;
        }
        Ok(())
    }
}
