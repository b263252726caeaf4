//! Line-based interactive collector.
//!
//! Works over any `BufRead`/`Write` pair so tests can drive it with scripted
//! input. Any invalid or missing answer aborts collection immediately.

use super::{ConfigCollector, PlanBuilder};
use crate::error::CollectionError;
use crate::models::{Bootloader, Filesystem, InstallPlan, Locale, Secret, Timezone};
use std::fmt::Display;
use std::io::{self, BufRead, Write};

const DEFAULT_SWAP_SIZE: &str = "2G";

/// Interactive ConfigCollector reading answers line by line.
pub struct TerminalCollector<R, W> {
    input: R,
    output: W,
    /// Turn off terminal echo while reading secrets
    mask_secrets: bool,
}

impl<R: BufRead, W: Write> TerminalCollector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalCollector {
            input,
            output,
            mask_secrets: false,
        }
    }

    /// Disable echo for secret prompts when stdin is a terminal.
    pub fn mask_secrets(mut self, enabled: bool) -> Self {
        self.mask_secrets = enabled;
        self
    }

    fn read_line(&mut self) -> Result<String, CollectionError> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        if read == 0 {
            return Err(CollectionError::Aborted);
        }
        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
    }

    fn prompt(&mut self, text: &str) -> Result<String, CollectionError> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        self.read_line()
    }

    fn prompt_with_default(&mut self, text: &str, default: &str) -> Result<String, CollectionError> {
        let answer = self.prompt(&format!("{} [{}]: ", text, default))?;
        if answer.trim().is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer.trim().to_string())
        }
    }

    fn prompt_secret(&mut self, text: &str) -> Result<Secret, CollectionError> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let guard = if self.mask_secrets {
            EchoGuard::disable()
        } else {
            None
        };
        let line = self.read_line();
        drop(guard);

        if self.mask_secrets {
            writeln!(self.output)?;
        }
        line.map(Secret::new)
    }

    fn confirm_prompt(&mut self, text: &str) -> Result<bool, CollectionError> {
        let answer = self.prompt(&format!("{} [y/N]: ", text))?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    /// Numbered choice; accepts the number or the label itself.
    fn choose<T: Copy + Display>(
        &mut self,
        field: &'static str,
        title: &str,
        options: &[T],
    ) -> Result<T, CollectionError> {
        writeln!(self.output, "{}:", title)?;
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, option)?;
        }
        let answer = self.prompt("> ")?;
        let answer = answer.trim();

        if let Ok(index) = answer.parse::<usize>() {
            if index >= 1 && index <= options.len() {
                return Ok(options[index - 1]);
            }
        }

        options
            .iter()
            .copied()
            .find(|o| o.to_string().eq_ignore_ascii_case(answer))
            .ok_or_else(|| CollectionError::UnknownChoice {
                field,
                value: answer.to_string(),
            })
    }

    fn choose_disk(&mut self, disks: &[String]) -> Result<String, CollectionError> {
        writeln!(self.output, "Select the installation disk:")?;
        for (i, disk) in disks.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, disk)?;
        }
        let answer = self.prompt("> ")?;
        let answer = answer.trim();

        if let Ok(index) = answer.parse::<usize>() {
            if index >= 1 && index <= disks.len() {
                return Ok(disks[index - 1].clone());
            }
        }
        // Paths are handed to the builder, which enforces membership
        if answer.is_empty() {
            return Err(CollectionError::MissingField("target_disk"));
        }
        Ok(answer.to_string())
    }

    fn collect_password_pair(&mut self, label: &str) -> Result<Secret, CollectionError> {
        let first = self.prompt_secret(&format!("{}: ", label))?;
        let second = self.prompt_secret(&format!("Repeat {}: ", label.to_lowercase()))?;
        crate::config::validator::validate_password_pair(first, &second)
    }
}

impl TerminalCollector<io::StdinLock<'static>, io::Stdout> {
    /// Collector bound to the process's standard streams.
    pub fn stdio() -> Self {
        // SAFETY: isatty only inspects the descriptor
        let is_tty = unsafe { libc::isatty(libc::STDIN_FILENO) } == 1;
        TerminalCollector::new(io::stdin().lock(), io::stdout()).mask_secrets(is_tty)
    }
}

impl<R: BufRead, W: Write> ConfigCollector for TerminalCollector<R, W> {
    fn collect(&mut self, disks: &[String]) -> Result<InstallPlan, CollectionError> {
        writeln!(self.output, "Welcome to the GOATd Arch Linux installer!")?;

        let username = self.prompt("Username: ")?;
        crate::config::validator::validate_username(username.trim())?;

        let password = self.collect_password_pair("Password")?;

        let disk = self.choose_disk(disks)?;
        let filesystem = self.choose("filesystem", "Select the filesystem", &Filesystem::ALL)?;

        let use_swap = self.confirm_prompt("Create a swap partition?")?;
        let swap_size = if use_swap {
            Some(self.prompt_with_default("Swap size (e.g. 2G)", DEFAULT_SWAP_SIZE)?)
        } else {
            None
        };

        let timezone = self.choose("timezone", "Select the timezone", &Timezone::ALL)?;
        let locale = self.choose("locale", "Select the locale", &Locale::ALL)?;

        let use_encryption = self.confirm_prompt("Encrypt the root partition with LUKS?")?;
        let passphrase = if use_encryption {
            Some(self.collect_password_pair("LUKS passphrase")?)
        } else {
            None
        };

        let bootloader = self.choose("bootloader", "Select the bootloader", &Bootloader::ALL)?;

        PlanBuilder::new()
            .username(username.trim())
            .password(password)
            .target_disk(disk)
            .filesystem(filesystem)
            .swap(use_swap, swap_size)
            .timezone(timezone)
            .locale(locale)
            .encryption(use_encryption, passphrase)
            .bootloader(bootloader)
            .build(disks)
    }

    fn confirm(&mut self, plan: &InstallPlan) -> Result<bool, CollectionError> {
        writeln!(self.output, "\nYour settings:")?;
        writeln!(self.output, "{}", plan.summary())?;
        writeln!(
            self.output,
            "\nWARNING: all data on {} will be destroyed.",
            plan.target_disk()
        )?;
        self.confirm_prompt("Is everything correct? Start the installation?")
    }
}

/// Restores terminal echo when dropped.
struct EchoGuard {
    original: libc::termios,
}

impl EchoGuard {
    fn disable() -> Option<EchoGuard> {
        // SAFETY: termios is plain data; tcgetattr fills it or fails
        unsafe {
            let mut term: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &mut term) != 0 {
                return None;
            }
            let original = term;
            term.c_lflag &= !libc::ECHO;
            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &term) != 0 {
                return None;
            }
            Some(EchoGuard { original })
        }
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        // SAFETY: restores the attributes captured in disable()
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn disks() -> Vec<String> {
        vec!["/dev/sda".to_string(), "/dev/nvme0n1".to_string()]
    }

    fn run(script: &str) -> (Result<InstallPlan, CollectionError>, String) {
        let mut out = Vec::new();
        let result = {
            let mut collector = TerminalCollector::new(Cursor::new(script.to_string()), &mut out);
            collector.collect(&disks())
        };
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_full_session() {
        let script = "alice\npw\npw\n2\nbtrfs\ny\n\n1\nen_US.UTF-8\ny\nluks\nluks\n2\n";
        let (plan, output) = run(script);
        let plan = plan.unwrap();

        assert_eq!(plan.username(), "alice");
        assert_eq!(plan.target_disk(), "/dev/nvme0n1");
        assert_eq!(plan.filesystem(), Filesystem::Btrfs);
        assert_eq!(plan.swap_size().unwrap().to_string(), "2G");
        assert_eq!(plan.timezone(), Timezone::EuropeMoscow);
        assert_eq!(plan.locale(), Locale::EnUs);
        assert!(plan.use_encryption());
        assert_eq!(plan.bootloader(), Bootloader::SystemdBoot);
        assert!(!output.contains("pw\n"));
    }

    #[test]
    fn test_minimal_session_without_swap_or_luks() {
        let script = "bob\nx\nx\n/dev/sda\next4\nn\n3\n1\nn\nGRUB\n";
        let plan = run(script).0.unwrap();
        assert!(!plan.use_swap());
        assert!(!plan.use_encryption());
        assert_eq!(plan.timezone(), Timezone::AsiaTokyo);
        assert_eq!(plan.bootloader(), Bootloader::Grub);
    }

    #[test]
    fn test_password_mismatch_aborts() {
        let (result, _) = run("alice\none\ntwo\n");
        assert!(matches!(result, Err(CollectionError::PasswordMismatch)));
    }

    #[test]
    fn test_whitespace_username_aborts() {
        let (result, _) = run("john doe\n");
        assert!(matches!(result, Err(CollectionError::UsernameWhitespace)));
    }

    #[test]
    fn test_unknown_filesystem_aborts() {
        let (result, _) = run("alice\npw\npw\n1\nzfs\n");
        assert!(matches!(
            result,
            Err(CollectionError::UnknownChoice { field: "filesystem", .. })
        ));
    }

    #[test]
    fn test_end_of_input_aborts() {
        let (result, _) = run("alice\n");
        assert!(matches!(result, Err(CollectionError::Aborted)));
    }

    #[test]
    fn test_confirm_renders_summary_without_secrets() {
        let plan = run("alice\ntopsecret\ntopsecret\n1\n1\nn\n1\n1\nn\n1\n").0.unwrap();
        let mut out = Vec::new();
        let accepted = {
            let mut collector = TerminalCollector::new(Cursor::new("yes\n"), &mut out);
            collector.confirm(&plan).unwrap()
        };
        let output = String::from_utf8(out).unwrap();

        assert!(accepted);
        assert!(output.contains("/dev/sda"));
        assert!(output.contains("[hidden]"));
        assert!(!output.contains("topsecret"));
    }
}
