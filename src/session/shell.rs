//! Remote shells that interpret session commands.

use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use shell_escape::unix::escape;

/// Shell process that runs commands on the remote side of a session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Shell {
    /// `bash -c`, used on Linux hosts.
    #[default]
    Bash,
    /// Windows PowerShell, fed through `-EncodedCommand`.
    PowerShell,
}

impl Shell {
    /// Wraps `command` so the remote login shell hands it to this shell
    /// verbatim.
    #[must_use]
    pub fn wrap(self, command: &str) -> String {
        match self {
            Self::Bash => format!("bash -c {}", escape(command.into())),
            Self::PowerShell => format!(
                "powershell -NonInteractive -NoProfile -EncodedCommand {}",
                encode_powershell(command)
            ),
        }
    }

    /// Quotes a single argument for this shell.
    #[must_use]
    pub fn quote(self, arg: &str) -> String {
        match self {
            Self::Bash => escape(arg.into()).into_owned(),
            Self::PowerShell => format!("'{}'", arg.replace('\'', "''")),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bash => f.write_str("bash"),
            Self::PowerShell => f.write_str("powershell"),
        }
    }
}

#[expect(
    clippy::little_endian_bytes,
    reason = "PowerShell -EncodedCommand expects UTF-16LE regardless of host endianness"
)]
fn encode_powershell(command: &str) -> String {
    let bytes: Vec<u8> = command
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
    general_purpose::STANDARD.encode(bytes)
}
