//! Utilities and the setup/teardown cascade.
//!
//! A utility is a reusable remote-operation helper bound to one host, such
//! as a file editor or a service manager, that undoes its changes on
//! teardown. Roles attach utilities by registering them in a
//! [`UtilityRegistry`] while they are constructed; the registry then drives
//! the cascade in name order:
//!
//! * setup is fail-fast: the first failure stops the cascade;
//! * teardown runs every utility and reports all failures together, so one
//!   broken cleanup never hides another.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::host::{Host, HostError};
use crate::session::SessionError;

/// Errors raised by individual utilities.
#[derive(Debug, Error)]
pub enum UtilityError {
    /// A remote command failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// A host hook failed.
    #[error(transparent)]
    Host(#[from] HostError),
    /// The utility failed for another reason.
    #[error("{0}")]
    Failed(String),
}

/// State shared by every utility: the bound host and its log span.
#[derive(Clone, Debug)]
pub struct UtilityBase {
    host: Rc<Host>,
    span: tracing::Span,
}

impl UtilityBase {
    /// Binds a utility to `host`, copying the host's span.
    #[must_use]
    pub fn new(host: &Rc<Host>) -> Self {
        Self {
            host: Rc::clone(host),
            span: host.span().clone(),
        }
    }

    /// Host the utility operates on.
    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Span for utility log events.
    #[must_use]
    pub const fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// Remote-operation helper with its own lifecycle.
pub trait Utility: fmt::Debug {
    /// Shared utility state.
    fn base(&self) -> &UtilityBase;

    /// Prepares the utility before a test.
    ///
    /// # Errors
    ///
    /// Returns [`UtilityError`] when preparation fails.
    fn setup(&self) -> Result<(), UtilityError> {
        Ok(())
    }

    /// Reverts changes made through the utility after a test.
    ///
    /// # Errors
    ///
    /// Returns [`UtilityError`] when cleanup fails.
    fn teardown(&self) -> Result<(), UtilityError> {
        Ok(())
    }
}

/// One failed utility teardown.
#[derive(Debug)]
pub struct TeardownFailure {
    /// Registry name of the utility.
    pub utility: String,
    /// Error the utility returned.
    pub error: UtilityError,
}

/// Every teardown failure of one cascade, in discovery order.
#[derive(Debug)]
pub struct TeardownErrors {
    failures: Vec<TeardownFailure>,
}

impl TeardownErrors {
    /// Failures in discovery order.
    #[must_use]
    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    /// Consumes the aggregate, returning the individual failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<TeardownFailure> {
        self.failures
    }
}

impl fmt::Display for TeardownErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} utility teardown(s) failed:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, " [{}: {}]", failure.utility, failure.error)?;
        }
        Ok(())
    }
}

impl StdError for TeardownErrors {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.failures
            .first()
            .map(|failure| &failure.error as &(dyn StdError + 'static))
    }
}

/// Errors raised by the setup/teardown cascade.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A utility failed to set up; later utilities were not set up.
    #[error("failed to set up utility {utility}: {source}")]
    Setup {
        /// Registry name of the utility.
        utility: String,
        /// Error the utility returned.
        #[source]
        source: UtilityError,
    },
    /// One or more utilities failed to tear down.
    #[error(transparent)]
    Teardown(#[from] TeardownErrors),
}

/// Name-ordered set of utilities attached to a role.
#[derive(Debug, Default)]
pub struct UtilityRegistry {
    utilities: BTreeMap<String, Rc<dyn Utility>>,
}

impl UtilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `utility` under `name` and returns a typed handle to it.
    /// Registering a name again replaces the earlier utility.
    pub fn register<U: Utility + 'static>(&mut self, name: impl Into<String>, utility: U) -> Rc<U> {
        let handle = Rc::new(utility);
        let erased: Rc<dyn Utility> = handle.clone();
        self.utilities.insert(name.into(), erased);
        handle
    }

    /// Looks a utility up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rc<dyn Utility>> {
        self.utilities.get(name)
    }

    /// Registered names in cascade order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.utilities.keys().map(String::as_str).collect()
    }

    /// Number of registered utilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.utilities.len()
    }

    /// Returns `true` when no utility is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.utilities.is_empty()
    }

    /// Sets up every utility in name order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Setup`] naming the failing utility.
    pub fn setup_all(&self) -> Result<(), LifecycleError> {
        for (name, utility) in &self.utilities {
            debug!(parent: utility.base().span(), utility = %name, "setting up utility");
            utility
                .setup()
                .map_err(|source| LifecycleError::Setup {
                    utility: name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Tears down every utility in name order, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Teardown`] carrying every failure when at
    /// least one utility failed.
    pub fn teardown_all(&self) -> Result<(), LifecycleError> {
        let mut failures = Vec::new();
        for (name, utility) in &self.utilities {
            debug!(parent: utility.base().span(), utility = %name, "tearing down utility");
            if let Err(error) = utility.teardown() {
                warn!(parent: utility.base().span(), utility = %name, "teardown failed: {error}");
                failures.push(TeardownFailure {
                    utility: name.clone(),
                    error,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Teardown(TeardownErrors { failures }))
        }
    }
}
