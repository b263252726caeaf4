/// System module: external command invocations and the runner seam

pub mod runner;

pub use runner::SystemRunner;

use crate::models::Secret;
use futures::future::BoxFuture;
use std::fmt;
use std::path::PathBuf;

/// Tool used to run a command with the target as its root.
pub const CHROOT_TOOL: &str = "arch-chroot";

/// Logging macros for convenient access
/// Use the log crate directly for target-aware routing
#[macro_export]
macro_rules! log_parsed {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        // Use target="parsed" for high-level events
        log::info!(target: "parsed", "{}", msg);
    }}
}

/// Data piped to a child's standard input.
#[derive(Clone)]
pub enum StdinPayload {
    /// Sensitive input (passphrases, `user:password` lines)
    Secret(Secret),
    /// Plain file content
    Text(String),
}

impl StdinPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            StdinPayload::Secret(secret) => secret.expose().as_bytes(),
            StdinPayload::Text(text) => text.as_bytes(),
        }
    }
}

impl fmt::Debug for StdinPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StdinPayload::Secret(_) => f.write_str("Secret([hidden])"),
            StdinPayload::Text(text) => f.debug_tuple("Text").field(text).finish(),
        }
    }
}

/// One external command line.
///
/// Secrets never go into `args`; they travel in `stdin` only.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<StdinPayload>,
    /// Effective root; when set the command runs through `arch-chroot <root>`
    pub root: Option<String>,
    /// Host file that receives the command's stdout (appended)
    pub stdout_to: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            root: None,
            stdout_to: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin_secret(mut self, secret: Secret) -> Self {
        self.stdin = Some(StdinPayload::Secret(secret));
        self
    }

    pub fn stdin_text(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(StdinPayload::Text(text.into()));
        self
    }

    pub fn in_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn append_stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }

    /// Full argument vector as executed, including the chroot prefix.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 3);
        if let Some(ref root) = self.root {
            argv.push(CHROOT_TOOL.to_string());
            argv.push(root.clone());
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Printable command line; safe to log because argv never holds secrets.
    pub fn command_line(&self) -> String {
        let mut line = self.argv().join(" ");
        if let Some(ref path) = self.stdout_to {
            line.push_str(&format!(" >> {}", path.display()));
        }
        line
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, None when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok() -> Self {
        CommandOutput {
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external commands for the step executor.
///
/// Returns `Err` only when the process could not be started or waited on.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, invocation: &'a Invocation) -> BoxFuture<'a, std::io::Result<CommandOutput>>;
}
