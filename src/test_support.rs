//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;

use tokio::sync::{Mutex, MutexGuard};

use crate::host::Host;
use crate::session::{CommandOutput, CommandRunner, SessionError, SshOptions, SshSessionFactory};
use crate::utility::{Utility, UtilityBase, UtilityError};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
/// When the queue is empty every call succeeds with empty output, so hosts
/// can connect without a scripted probe response.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
    strict: bool,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the final argument, which carries the remote command.
    #[must_use]
    pub fn remote_command(&self) -> Option<String> {
        self.args
            .last()
            .map(|arg| arg.to_string_lossy().into_owned())
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner that fails with [`SessionError::Spawn`] once the
    /// queue is exhausted.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }

    /// Builds an SSH session factory that routes every session through this
    /// runner.
    #[must_use]
    pub fn session_factory(&self) -> SshSessionFactory<Self> {
        SshSessionFactory::new(SshOptions::default(), self.clone())
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SessionError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        match self.responses.borrow_mut().pop_front() {
            Some(output) => Ok(output),
            None if self.strict => Err(SessionError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            }),
            None => Ok(CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}

/// Shared log of utility lifecycle calls, in call order.
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Utility that records its lifecycle calls and can be told to fail.
#[derive(Debug)]
pub struct RecordingUtility {
    base: UtilityBase,
    name: String,
    calls: CallLog,
    fail_setup: bool,
    fail_teardown: bool,
}

impl RecordingUtility {
    /// Creates a utility that succeeds on both setup and teardown.
    #[must_use]
    pub fn new(host: &Rc<Host>, name: &str, calls: &CallLog) -> Self {
        Self {
            base: UtilityBase::new(host),
            name: name.to_owned(),
            calls: Rc::clone(calls),
            fail_setup: false,
            fail_teardown: false,
        }
    }

    /// Makes [`Utility::setup`] fail.
    #[must_use]
    pub const fn failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    /// Makes [`Utility::teardown`] fail.
    #[must_use]
    pub const fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }
}

impl Utility for RecordingUtility {
    fn base(&self) -> &UtilityBase {
        &self.base
    }

    fn setup(&self) -> Result<(), UtilityError> {
        self.calls.borrow_mut().push(format!("setup:{}", self.name));
        if self.fail_setup {
            return Err(UtilityError::Failed(format!("{} setup failed", self.name)));
        }
        Ok(())
    }

    fn teardown(&self) -> Result<(), UtilityError> {
        self.calls
            .borrow_mut()
            .push(format!("teardown:{}", self.name));
        if self.fail_teardown {
            return Err(UtilityError::Failed(format!(
                "{} teardown failed",
                self.name
            )));
        }
        Ok(())
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
