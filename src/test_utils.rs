/// # Test Utilities Module
///
/// A scripted in-memory driver for exercising `SafeConnection` without a
/// database. `MockDriver` counts every primitive call and tracks how many
/// handles are still open, and each primitive can be told to fail.
///
/// All clones of a `MockDriver` share the same `MockState`, so a test keeps
/// one clone to inspect while the connection owns another.

use crate::core::db::driver::{
    check_arity, BindError, ConnectionInfo, Driver, DriverConnection, DriverError, DriverStatement,
};
use crate::core::db::params::{Param, TypeSignature};
use crate::core::db::query::{QueryOutcome, QueryResult};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Counters and failure switches shared by a driver and its handles.
#[derive(Debug, Default)]
pub struct MockState {
    pub opens: usize,
    pub connection_closes: usize,
    pub prepares: usize,
    pub statement_closes: usize,
    pub executions: usize,
    /// Connections opened and not yet closed successfully
    pub live_connections: usize,
    /// Statements prepared and not yet closed successfully
    pub live_statements: usize,
    /// Signature and values of the last successful bind
    pub last_bind: Option<(String, Vec<String>)>,
    /// Parameters passed to the last execution
    pub last_exec_params: Vec<Param>,

    /// Hosts that refuse connections
    pub reject_hosts: Vec<String>,
    pub fail_prepare: bool,
    pub fail_connection_close: bool,
    pub fail_statement_close: bool,
    pub fail_execute: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Rc<RefCell<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the shared state.
    pub fn state(&self) -> Ref<'_, MockState> {
        self.state.borrow()
    }

    /// Mutates the shared state, typically to switch failures on or off.
    pub fn configure(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.borrow_mut());
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;
    type Statement = MockStatement;

    fn open(&self, info: &ConnectionInfo) -> Result<MockConnection, DriverError> {
        let mut state = self.state.borrow_mut();
        if state.reject_hosts.contains(&info.host) {
            return Err(DriverError::new(
                format!("Unknown server host '{}'", info.host),
                2005,
            ));
        }
        state.opens += 1;
        state.live_connections += 1;
        Ok(MockConnection {
            state: Rc::clone(&self.state),
            closed: false,
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    state: Rc<RefCell<MockState>>,
    closed: bool,
}

impl DriverConnection for MockConnection {
    type Statement = MockStatement;

    fn prepare(&mut self, template: &str) -> Result<MockStatement, DriverError> {
        let mut state = self.state.borrow_mut();
        if self.closed {
            return Err(DriverError::new("connection is closed", 2006));
        }
        if state.fail_prepare {
            return Err(DriverError::new(
                format!("syntax error near '{}'", template),
                1064,
            ));
        }
        state.prepares += 1;
        state.live_statements += 1;
        Ok(MockStatement {
            state: Rc::clone(&self.state),
            template: template.to_string(),
            placeholders: template.matches('?').count(),
            bound: Vec::new(),
            closed: false,
        })
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        if state.fail_connection_close {
            return Err(DriverError::new("connection close failed", 2013));
        }
        state.connection_closes += 1;
        if !self.closed {
            state.live_connections -= 1;
            self.closed = true;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockStatement {
    state: Rc<RefCell<MockState>>,
    template: String,
    placeholders: usize,
    bound: Vec<String>,
    closed: bool,
}

impl MockStatement {
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn bound(&self) -> &[String] {
        &self.bound
    }
}

impl DriverStatement for MockStatement {
    fn bind(&mut self, signature: &TypeSignature, values: &[String]) -> Result<(), BindError> {
        check_arity(signature, values)?;
        if values.len() != self.placeholders {
            return Err(BindError::PlaceholderCount {
                expected: self.placeholders,
                actual: values.len(),
            });
        }
        self.bound = values.to_vec();
        self.state.borrow_mut().last_bind = Some((signature.to_string(), self.bound.clone()));
        Ok(())
    }

    /// Statements starting with `SELECT` yield one `value` row per parameter;
    /// anything else reports one affected row.
    fn execute(&mut self, params: &[Param]) -> Result<QueryOutcome, DriverError> {
        let mut state = self.state.borrow_mut();
        if self.closed {
            return Err(DriverError::new("statement is closed", 2030));
        }
        if state.fail_execute {
            return Err(DriverError::new("Deadlock found when trying to get lock", 1213));
        }
        state.executions += 1;
        state.last_exec_params = params.to_vec();

        if !self.template.trim_start().to_uppercase().starts_with("SELECT") {
            return Ok(QueryOutcome::Completed { affected_rows: 1 });
        }
        let values: Vec<String> = if params.is_empty() {
            self.bound.clone()
        } else {
            params.iter().map(Param::to_plain_string).collect()
        };
        Ok(QueryOutcome::Rows(QueryResult::new(
            vec!["value".to_string()],
            values.into_iter().map(|v| vec![v]).collect(),
        )))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        if state.fail_statement_close {
            return Err(DriverError::new("statement close failed", 2014));
        }
        state.statement_closes += 1;
        if !self.closed {
            state.live_statements -= 1;
            self.closed = true;
        }
        Ok(())
    }
}
