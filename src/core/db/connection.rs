/// Connection Management Module
///
/// This module provides `SafeConnection`, which owns at most one driver
/// connection and one prepared statement and moves them through their
/// lifecycle: connect, set (prepare + bind), query, reset.
///
/// Every failure is returned as an error and also recorded in one of three
/// readable error slots:
/// - `connect_error`: opening a connection and the reconnect preconditions
/// - `statement_error` (+ `bind_error`): preparing, binding and closing statements
/// - `db_error`: closing the connection and executing statements

use crate::config::Config;
use crate::core::db::driver::{
    check_arity, BindError, ConnectionInfo, Driver, DriverConnection, DriverStatement,
};
use crate::core::db::params::{deduce_signature, sanitize, Param, TypeSignature};
use crate::core::db::query::QueryOutcome;
use crate::core::{ErrorState, Result, SafeConnError};
use tracing::{debug, info, warn};

/// Ownership slot for a driver handle.
///
/// Reset operations are the only transition from `Live` back to `Absent`.
#[derive(Debug)]
pub enum HandleSlot<H> {
    Absent,
    Live(H),
}

impl<H> Default for HandleSlot<H> {
    fn default() -> Self {
        HandleSlot::Absent
    }
}

impl<H> HandleSlot<H> {
    pub fn is_live(&self) -> bool {
        matches!(self, HandleSlot::Live(_))
    }

    pub fn get(&self) -> Option<&H> {
        match self {
            HandleSlot::Live(handle) => Some(handle),
            HandleSlot::Absent => None,
        }
    }

    fn get_mut(&mut self) -> Option<&mut H> {
        match self {
            HandleSlot::Live(handle) => Some(handle),
            HandleSlot::Absent => None,
        }
    }
}

/// The last statement that was prepared and bound successfully.
///
/// `params` holds sanitized values and always has as many entries as
/// `signature` has codes.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementSpec {
    pub template: String,
    pub signature: TypeSignature,
    pub params: Vec<String>,
}

/// Behaviour switches for a `SafeConnection`.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Deduce the type signature from parameter variants on every `set`
    pub deduce_type: bool,
    /// Re-prepare the last statement after every successful connect
    pub reuse_statement: bool,
    /// Separator for `bound_params_diagnostic`
    pub param_separator: String,
    /// Connect from the constructor
    pub auto_connect: bool,
    /// Signature used while `deduce_type` is off
    pub type_signature: Option<TypeSignature>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            deduce_type: true,
            reuse_statement: false,
            param_separator: ",".to_string(),
            auto_connect: true,
            type_signature: None,
        }
    }
}

/// Numeric option codes accepted by `SafeConnection::set_option_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionCode {
    DeduceType = 1,
    ReuseStatement = 2,
}

impl TryFrom<i32> for OptionCode {
    type Error = SafeConnError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(OptionCode::DeduceType),
            2 => Ok(OptionCode::ReuseStatement),
            other => Err(SafeConnError::InvalidOption(format!(
                "unrecognized option code {}",
                other
            ))),
        }
    }
}

/// A runtime option change.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOption {
    /// Toggle type deduction. Disabling it requires the signature to use instead.
    DeduceType {
        enabled: bool,
        signature: Option<TypeSignature>,
    },
    /// Toggle statement replay on reconnect.
    ReuseStatement(bool),
}

impl SessionOption {
    /// Builds an option from a numeric code, a flag and optional extra
    /// arguments (the type signature for `DeduceType`).
    pub fn from_code(code: i32, value: bool, extra: &[&str]) -> Result<Self> {
        match OptionCode::try_from(code)? {
            OptionCode::DeduceType => Ok(SessionOption::DeduceType {
                enabled: value,
                signature: extra.first().map(|s| s.parse()).transpose()?,
            }),
            OptionCode::ReuseStatement => Ok(SessionOption::ReuseStatement(value)),
        }
    }
}

/// A connection and prepared statement that are never left half-initialized.
///
/// Not thread-safe: callers serialize access or keep one instance per thread.
/// Dropping the instance resets the statement and then the connection.
#[derive(Debug)]
pub struct SafeConnection<D: Driver> {
    driver: D,
    info: ConnectionInfo,
    options: Options,
    connection: HandleSlot<D::Connection>,
    statement: HandleSlot<D::Statement>,
    spec: Option<StatementSpec>,
    connect_error: ErrorState,
    statement_error: ErrorState,
    bind_error: Option<String>,
    db_error: ErrorState,
}

impl<D: Driver> SafeConnection<D> {
    /// Creates a new instance and connects right away when
    /// `options.auto_connect` is set. A failed connect is recorded in
    /// `connect_error`; it does not fail construction.
    pub fn new(driver: D, info: ConnectionInfo, options: Options) -> Self {
        let auto_connect = options.auto_connect;
        let mut conn = SafeConnection {
            driver,
            info,
            options,
            connection: HandleSlot::Absent,
            statement: HandleSlot::Absent,
            spec: None,
            connect_error: ErrorState::default(),
            statement_error: ErrorState::default(),
            bind_error: None,
            db_error: ErrorState::default(),
        };

        if auto_connect {
            if let Err(e) = conn.connect(None) {
                warn!("Initial connection failed: {}", e);
            }
        }
        conn
    }

    /// Creates a new instance from a loaded configuration file.
    pub fn from_config(driver: D, config: &Config) -> Result<Self> {
        Ok(Self::new(driver, config.connection_info(), config.options()?))
    }

    /// Connects using `override_info`, or the stored connection info.
    ///
    /// Any live connection is reset first; if it cannot be closed no new
    /// connection is attempted. With reuse-statement mode on, the last
    /// statement is re-prepared on the new connection and the connection is
    /// reset again if that fails.
    pub fn connect(&mut self, override_info: Option<&ConnectionInfo>) -> Result<()> {
        self.connect_error.clear();

        if let Err(e) = self.reset_connection() {
            warn!("Previous connection could not be closed: {}", e);
            let err = SafeConnError::PreviousConnectionNotClosed;
            self.connect_error.capture(&err);
            return Err(err);
        }

        let info = override_info.unwrap_or(&self.info);
        debug!("Connecting to {:?} on {:?}", info.database, info.host);
        let opened = self.driver.open(info);
        match opened {
            Ok(handle) => self.connection = HandleSlot::Live(handle),
            Err(e) => {
                let err = SafeConnError::Connect(e);
                warn!("{}", err);
                self.connect_error.capture(&err);
                return Err(err);
            }
        }
        info!("Connected");

        if !self.options.reuse_statement {
            return Ok(());
        }

        // A spec without parameters does not count as a previous statement.
        let Some(spec) = self.spec.clone().filter(|spec| !spec.params.is_empty()) else {
            return Err(self.abort_connect(SafeConnError::NoPreviousStatement));
        };
        debug!("Replaying statement {:?}", spec.template);
        if let Err(e) = self.prepare_and_bind(&spec.template, Some(spec.signature), spec.params) {
            warn!("Statement replay failed: {}", e);
            return Err(self.abort_connect(SafeConnError::StatementReplayFailed));
        }
        Ok(())
    }

    fn abort_connect(&mut self, err: SafeConnError) -> SafeConnError {
        self.connect_error.capture(&err);
        if let Err(e) = self.reset_connection() {
            warn!("Connection not released after failed connect: {}", e);
        }
        err
    }

    /// Prepares `template` and binds `params` to it.
    ///
    /// With type deduction on, the signature is derived from the parameter
    /// variants; otherwise the installed or previously persisted signature is
    /// used. Every value is HTML-escaped before binding. The statement spec
    /// is only persisted once binding succeeds, so a failed `set` leaves the
    /// previous one in place.
    pub fn set(&mut self, template: &str, params: &[Param]) -> Result<()> {
        let signature = if self.options.deduce_type {
            Some(deduce_signature(params))
        } else {
            self.options
                .type_signature
                .clone()
                .or_else(|| self.spec.as_ref().map(|spec| spec.signature.clone()))
        };
        let values = params.iter().map(sanitize).collect();
        self.prepare_and_bind(template, signature, values)
    }

    fn prepare_and_bind(
        &mut self,
        template: &str,
        signature: Option<TypeSignature>,
        values: Vec<String>,
    ) -> Result<()> {
        self.reset_statement()?;

        let prepared = match self.connection.get_mut() {
            Some(connection) => connection.prepare(template).map_err(SafeConnError::Prepare),
            None => Err(SafeConnError::NoActiveConnection),
        };
        let mut statement = match prepared {
            Ok(statement) => statement,
            Err(err) => {
                warn!("{}", err);
                self.statement_error.capture(&err);
                return Err(err);
            }
        };

        let bound = match signature {
            Some(signature) => check_arity(&signature, &values)
                .and_then(|()| statement.bind(&signature, &values))
                .map(|()| signature),
            None => Err(BindError::MissingSignature),
        };
        self.statement = HandleSlot::Live(statement);

        match bound {
            Ok(signature) => {
                debug!("Prepared {:?} with signature {:?}", template, signature.to_string());
                self.spec = Some(StatementSpec {
                    template: template.to_string(),
                    signature,
                    params: values,
                });
                Ok(())
            }
            Err(bind_err) => {
                if let Err(e) = self.reset_statement() {
                    warn!("Statement not released after failed bind: {}", e);
                }
                let bind_message = bind_err.to_string();
                let err = SafeConnError::Bind(bind_err);
                warn!("{}", err);
                self.statement_error.capture(&err);
                self.bind_error = Some(bind_message);
                Err(err)
            }
        }
    }

    /// Executes the prepared statement. A non-empty `exec_params` is bound
    /// for this execution only.
    pub fn query(&mut self, exec_params: &[Param]) -> Result<QueryOutcome> {
        self.db_error.clear();

        let outcome = if !self.connection.is_live() {
            Err(SafeConnError::NoActiveConnection)
        } else {
            match self.statement.get_mut() {
                Some(statement) => statement.execute(exec_params).map_err(SafeConnError::Execute),
                None => Err(SafeConnError::NoPreparedStatement),
            }
        };

        outcome.map_err(|err| {
            warn!("{}", err);
            self.db_error.capture(&err);
            err
        })
    }

    /// Applies a runtime option change.
    pub fn set_option(&mut self, option: SessionOption) -> Result<()> {
        match option {
            SessionOption::DeduceType {
                enabled: false,
                signature: None,
            } => Err(SafeConnError::InvalidOption(
                "disabling type deduction requires a type signature".to_string(),
            )),
            SessionOption::DeduceType { enabled, signature } => {
                self.options.deduce_type = enabled;
                self.options.type_signature = signature;
                Ok(())
            }
            SessionOption::ReuseStatement(enabled) => {
                self.options.reuse_statement = enabled;
                Ok(())
            }
        }
    }

    /// Applies an option given by numeric code. Unknown codes fail.
    pub fn set_option_code(&mut self, code: i32, value: bool, extra: &[&str]) -> Result<()> {
        let option = SessionOption::from_code(code, value, extra)?;
        self.set_option(option)
    }

    /// Closes the live statement, if any.
    ///
    /// When the driver fails to close it, the handle stays live so a later
    /// reset can try again.
    pub fn reset_statement(&mut self) -> Result<()> {
        self.statement_error.clear();
        self.bind_error = None;

        let Some(statement) = self.statement.get_mut() else {
            return Ok(());
        };
        match statement.close() {
            Ok(()) => {
                self.statement = HandleSlot::Absent;
                debug!("Statement reset");
                Ok(())
            }
            Err(e) => {
                let err = SafeConnError::Reset(e);
                warn!("{}", err);
                self.statement_error.capture(&err);
                Err(err)
            }
        }
    }

    /// Closes the live connection, if any, and then its statement.
    ///
    /// When the connection closes but the statement does not, the connection
    /// slot is already empty and the failure is reported in `db_error` with
    /// the statement's error code. Later calls keep retrying that statement
    /// and fail the same way until it closes.
    pub fn reset_connection(&mut self) -> Result<()> {
        self.db_error.clear();

        if let Some(connection) = self.connection.get_mut() {
            if let Err(e) = connection.close() {
                let err = SafeConnError::Reset(e);
                warn!("{}", err);
                self.db_error.capture(&err);
                return Err(err);
            }
            self.connection = HandleSlot::Absent;
        } else if !self.statement.is_live() {
            return Ok(());
        }

        // Statement left over from an earlier failed cascade.
        if self.reset_statement().is_err() {
            let err = SafeConnError::StatementCloseCascade {
                code: self.statement_error.code,
            };
            warn!("{}", err);
            self.db_error.capture(&err);
            return Err(err);
        }
        debug!("Connection reset");
        Ok(())
    }

    /// The live connection handle.
    pub fn connection(&self) -> Option<&D::Connection> {
        self.connection.get()
    }

    /// The live statement handle.
    pub fn statement(&self) -> Option<&D::Statement> {
        self.statement.get()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_live()
    }

    /// The persisted statement spec.
    pub fn statement_spec(&self) -> Option<&StatementSpec> {
        self.spec.as_ref()
    }

    pub fn type_signature(&self) -> Option<&TypeSignature> {
        self.spec.as_ref().map(|spec| &spec.signature)
    }

    /// Bound values joined with the configured separator, or `None` when no
    /// values are bound.
    pub fn bound_params_diagnostic(&self) -> Option<String> {
        self.spec
            .as_ref()
            .filter(|spec| !spec.params.is_empty())
            .map(|spec| spec.params.join(&self.options.param_separator))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn connect_error(&self) -> &ErrorState {
        &self.connect_error
    }

    pub fn statement_error(&self) -> &ErrorState {
        &self.statement_error
    }

    pub fn bind_error(&self) -> Option<&str> {
        self.bind_error.as_deref()
    }

    pub fn db_error(&self) -> &ErrorState {
        &self.db_error
    }
}

impl<D: Driver> Drop for SafeConnection<D> {
    fn drop(&mut self) {
        if let Err(e) = self.reset_statement() {
            warn!("Statement not released on teardown: {}", e);
        }
        if let Err(e) = self.reset_connection() {
            warn!("Connection not released on teardown: {}", e);
        }
    }
}
