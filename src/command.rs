//! Shell-aware command line construction.
//!
//! [`CommandBuilder`] renders a program and typed arguments into a single
//! command line quoted for the session's shell, so callers never branch on
//! the host operating system.

use std::fmt;
use std::rc::Rc;

use crate::session::{CommandLog, RemoteSession, SessionError, SessionOutput, Shell};

/// One command line argument.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliArg {
    /// `--key value` (PowerShell: `-key value`).
    Value {
        /// Option name without dashes.
        key: String,
        /// Option value.
        value: String,
    },
    /// `--key=value` (PowerShell: `-key:value`).
    Equals {
        /// Option name without dashes.
        key: String,
        /// Option value.
        value: String,
    },
    /// `--key` (PowerShell: `-key`).
    Switch(String),
    /// Bare positional argument.
    Positional(String),
}

impl CliArg {
    /// Shorthand for [`CliArg::Value`].
    #[must_use]
    pub fn value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Value {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Shorthand for [`CliArg::Equals`].
    #[must_use]
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Shorthand for [`CliArg::Switch`].
    #[must_use]
    pub fn switch(key: impl Into<String>) -> Self {
        Self::Switch(key.into())
    }

    /// Shorthand for [`CliArg::Positional`].
    #[must_use]
    pub fn positional(value: impl Into<String>) -> Self {
        Self::Positional(value.into())
    }

    fn render(&self, shell: Shell) -> String {
        let dashes = match shell {
            Shell::Bash => "--",
            Shell::PowerShell => "-",
        };
        match self {
            Self::Value { key, value } => format!("{dashes}{key} {}", shell.quote(value)),
            Self::Equals { key, value } => {
                let separator = match shell {
                    Shell::Bash => '=',
                    Shell::PowerShell => ':',
                };
                format!("{dashes}{key}{separator}{}", shell.quote(value))
            }
            Self::Switch(key) => format!("{dashes}{key}"),
            Self::Positional(value) => shell.quote(value),
        }
    }
}

/// Builds and runs command lines over a host's session.
#[derive(Clone)]
pub struct CommandBuilder {
    session: Rc<dyn RemoteSession>,
}

impl fmt::Debug for CommandBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuilder")
            .field("address", &self.session.address())
            .field("shell", &self.session.shell())
            .finish()
    }
}

impl CommandBuilder {
    /// Binds a builder to `session`.
    #[must_use]
    pub fn new(session: Rc<dyn RemoteSession>) -> Self {
        Self { session }
    }

    /// Shell the rendered commands target.
    #[must_use]
    pub fn shell(&self) -> Shell {
        self.session.shell()
    }

    /// Renders `program` followed by `args`.
    #[must_use]
    pub fn render(&self, program: &str, args: &[CliArg]) -> String {
        let shell = self.shell();
        let mut line = String::from(program);
        for arg in args {
            line.push(' ');
            line.push_str(&arg.render(shell));
        }
        line
    }

    /// Renders and runs a command through the session.
    ///
    /// # Errors
    ///
    /// Propagates [`SessionError`] from the session.
    pub fn run(
        &self,
        program: &str,
        args: &[CliArg],
        log: CommandLog,
    ) -> Result<SessionOutput, SessionError> {
        self.session.run(&self.render(program, args), log)
    }
}
