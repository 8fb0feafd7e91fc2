//! Roles: per-test wrappers bound to one host.
//!
//! A role is the object a test works with. Concrete roles embed a
//! [`RoleBase`] and register their utilities on it while they are built:
//!
//! ```
//! use std::rc::Rc;
//!
//! use multihost::role::{Role, RoleBase};
//! use multihost::utility::{Utility, UtilityBase};
//!
//! #[derive(Debug)]
//! struct Journal {
//!     base: UtilityBase,
//! }
//!
//! impl Utility for Journal {
//!     fn base(&self) -> &UtilityBase {
//!         &self.base
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct Client {
//!     base: RoleBase,
//!     journal: Rc<Journal>,
//! }
//!
//! impl Client {
//!     fn construct(mut base: RoleBase) -> Box<dyn Role> {
//!         let journal = base.register("journal", Journal {
//!             base: UtilityBase::new(base.host()),
//!         });
//!         Box::new(Self { base, journal })
//!     }
//! }
//!
//! impl Role for Client {
//!     fn base(&self) -> &RoleBase {
//!         &self.base
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use tracing::info_span;

use crate::host::Host;
use crate::session::{RemoteSession, SessionParams, Shell};
use crate::utility::{LifecycleError, Utility, UtilityRegistry};

/// The test a set of roles is created for.
#[derive(Debug)]
pub struct FixtureContext {
    test_name: String,
    span: tracing::Span,
}

impl FixtureContext {
    /// Creates a context with a fresh `test` span.
    #[must_use]
    pub fn new(test_name: impl Into<String>) -> Self {
        let test_name = test_name.into();
        let span = info_span!("test", name = %test_name);
        Self { test_name, span }
    }

    /// Name of the running test.
    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Span for test-scoped log events.
    #[must_use]
    pub const fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// State shared by every role.
#[derive(Debug)]
pub struct RoleBase {
    fixture: Rc<FixtureContext>,
    role: String,
    host: Rc<Host>,
    utilities: UtilityRegistry,
}

impl RoleBase {
    /// Binds a role tag to `host` for the test described by `fixture`.
    #[must_use]
    pub fn new(fixture: Rc<FixtureContext>, role: &str, host: Rc<Host>) -> Self {
        Self {
            fixture,
            role: role.to_owned(),
            host,
            utilities: UtilityRegistry::new(),
        }
    }

    /// Test this role belongs to.
    #[must_use]
    pub fn fixture(&self) -> &FixtureContext {
        &self.fixture
    }

    /// Role tag.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Bound host.
    #[must_use]
    pub const fn host(&self) -> &Rc<Host> {
        &self.host
    }

    /// Utilities attached to the role.
    #[must_use]
    pub const fn utilities(&self) -> &UtilityRegistry {
        &self.utilities
    }

    /// Attaches a utility; see [`UtilityRegistry::register`].
    pub fn register<U: Utility + 'static>(&mut self, name: impl Into<String>, utility: U) -> Rc<U> {
        self.utilities.register(name, utility)
    }

    /// Opens a new session to the host's hostname as another user.
    ///
    /// The session is independent of the host's shared session, connects on
    /// first use, and is owned by the caller; nothing tears it down
    /// automatically.
    #[must_use]
    pub fn ssh(&self, user: &str, password: &str, shell: Shell) -> Box<dyn RemoteSession> {
        self.host.sessions().open(SessionParams {
            address: self.host.hostname().to_owned(),
            username: user.to_owned(),
            password: password.to_owned(),
            shell,
            span: self.fixture.span().clone(),
        })
    }
}

/// Per-test wrapper around one host.
pub trait Role: Any + fmt::Debug {
    /// Shared role state.
    fn base(&self) -> &RoleBase;

    /// Sets up every attached utility, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Setup`] from the failing utility.
    fn setup(&self) -> Result<(), LifecycleError> {
        self.base().utilities().setup_all()
    }

    /// Tears down every attached utility, aggregating failures.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Teardown`] listing every failure.
    fn teardown(&self) -> Result<(), LifecycleError> {
        self.base().utilities().teardown_all()
    }
}

impl dyn Role {
    /// Returns the concrete role when it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Role>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref::<T>()
    }
}

/// Role without utilities, for roles that only need the bound host.
#[derive(Debug)]
pub struct PlainRole {
    base: RoleBase,
}

impl PlainRole {
    /// [`RoleConstructor`](crate::domain::RoleConstructor) for plain roles.
    #[must_use]
    pub fn construct(base: RoleBase) -> Box<dyn Role> {
        Box::new(Self { base })
    }
}

impl Role for PlainRole {
    fn base(&self) -> &RoleBase {
        &self.base
    }
}
