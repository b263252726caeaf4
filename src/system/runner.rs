//! Production CommandRunner backed by `tokio::process`.

use super::{CommandOutput, CommandRunner, Invocation};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Spawns real processes, or only logs them in dry-run mode.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    dry_run: bool,
}

impl SystemRunner {
    pub fn new(dry_run: bool) -> Self {
        SystemRunner { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn spawn(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        let argv = invocation.argv();
        log::info!("[Runner] $ {}", invocation.command_line());

        if self.dry_run {
            log::info!("[Runner] dry run, not executed");
            return Ok(CommandOutput::ok());
        }

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn()?;

        if let Some(ref payload) = invocation.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                let written = match stdin.write_all(payload.as_bytes()).await {
                    Ok(()) => stdin.shutdown().await,
                    Err(e) => Err(e),
                };
                match written {
                    Ok(()) => {}
                    // Child exited without reading stdin; report its status instead
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        log::warn!("[Runner] {} closed stdin early", invocation.program);
                    }
                    Err(e) => return Err(e),
                }
                // Dropping closes the pipe so the child sees EOF
                drop(stdin);
            }
        }

        let output = child.wait_with_output().await?;
        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.success() {
            if let Some(ref path) = invocation.stdout_to {
                append_to_file(path, result.stdout.as_bytes()).await?;
                log::info!(
                    "[Runner] appended {} bytes to {}",
                    result.stdout.len(),
                    path.display()
                );
            }
        }

        Ok(result)
    }
}

impl CommandRunner for SystemRunner {
    fn run<'a>(&'a self, invocation: &'a Invocation) -> BoxFuture<'a, io::Result<CommandOutput>> {
        self.spawn(invocation).boxed()
    }
}

async fn append_to_file(path: &std::path::Path, data: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.flush().await
}
