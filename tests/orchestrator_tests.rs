//! Integration tests for the installation orchestrator.
//!
//! A scripted CommandRunner records every invocation and fails (or hangs) on
//! a chosen command prefix, so sequencing can be verified without touching
//! a real disk.
//!
//! Test Organization:
//! - Sequencing and fail-fast
//! - Plan-dependent behavior (encryption, swap, bootloader)
//! - Concrete scenarios
//! - Contract violations, timeouts and checkpoints

use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::sync::{Arc, Mutex};

use goatd_installer::error::{ExitState, FailureCause};
use goatd_installer::models::{
    Bootloader, Filesystem, InstallPlan, Locale, PathRole, Secret, StateDelta, StepId, Timezone,
};
use goatd_installer::orchestrator::{
    load_checkpoint, standard_sequence, InstallState, MachineState, Orchestrator, Outcome,
};
use goatd_installer::system::{CommandOutput, CommandRunner, Invocation};
use goatd_installer::{InstallerSettings, PlanBuilder, Redactor};

/// Runner that succeeds unless the command line starts with a configured prefix.
#[derive(Default)]
struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
    hang_on: Option<String>,
}

impl ScriptedRunner {
    fn failing_on(prefix: &str) -> Self {
        ScriptedRunner {
            fail_on: Some(prefix.to_string()),
            ..Default::default()
        }
    }

    fn hanging_on(prefix: &str) -> Self {
        ScriptedRunner {
            hang_on: Some(prefix.to_string()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, invocation: &'a Invocation) -> BoxFuture<'a, io::Result<CommandOutput>> {
        let line = invocation.command_line();
        self.calls.lock().unwrap().push(line.clone());

        if let Some(ref prefix) = self.hang_on {
            if line.starts_with(prefix.as_str()) {
                return futures::future::pending().boxed();
            }
        }
        let result = match self.fail_on {
            Some(ref prefix) if line.starts_with(prefix.as_str()) => {
                CommandOutput::failed(1, format!("{}: simulated failure\n", invocation.program))
            }
            _ => CommandOutput::ok(),
        };
        futures::future::ready(Ok(result)).boxed()
    }
}

fn plan(disk: &str, swap: bool, luks: bool, bootloader: Bootloader) -> InstallPlan {
    PlanBuilder::new()
        .username("alice")
        .password(Secret::new("user-password-1"))
        .target_disk(disk)
        .filesystem(Filesystem::Ext4)
        .swap(swap, Some("2G".to_string()))
        .timezone(Timezone::EuropeMoscow)
        .locale(Locale::RuRu)
        .encryption(luks, Some(Secret::new("luks-passphrase-1")))
        .bootloader(bootloader)
        .build(&[disk.to_string()])
        .unwrap()
}

fn scenario_plan() -> InstallPlan {
    plan("/dev/sda", false, false, Bootloader::Grub)
}

async fn run_with(runner: Arc<ScriptedRunner>, plan: &InstallPlan) -> InstallState {
    Orchestrator::new(runner, InstallerSettings::default(), Redactor::new())
        .run(plan)
        .await
        .unwrap()
}

/// First command line issued by each step of the standard sequence.
const STEP_PREFIXES: [&str; 10] = [
    "parted",
    "cryptsetup luksFormat",
    "mkfs.ext4",
    "mkswap",
    "mount",
    "genfstab",
    "arch-chroot /mnt true",
    "arch-chroot /mnt ln",
    "arch-chroot /mnt useradd",
    "arch-chroot /mnt grub-install",
];

// ============================================================================
// SEQUENCING AND FAIL-FAST
// ============================================================================

#[tokio::test]
async fn test_full_plan_runs_every_step_in_order() {
    let runner = Arc::new(ScriptedRunner::default());
    let plan = plan("/dev/sda", true, true, Bootloader::Grub);
    let state = run_with(runner.clone(), &plan).await;

    assert_eq!(state.outcome, Outcome::Succeeded);
    assert_eq!(state.completed_steps, StepId::ALL.to_vec());
    assert!(state.skipped_steps.is_empty());
    assert_eq!(state.machine, MachineState::Succeeded);

    // Each step's first command appears after the previous step's
    let calls = runner.calls();
    let mut last = 0;
    for prefix in STEP_PREFIXES {
        let pos = calls
            .iter()
            .position(|c| c.starts_with(prefix))
            .unwrap_or_else(|| panic!("missing {}", prefix));
        assert!(pos >= last, "{} ran out of order", prefix);
        last = pos;
    }
}

#[tokio::test]
async fn test_failure_at_each_step_stops_the_run() {
    for (i, prefix) in STEP_PREFIXES.iter().enumerate() {
        let runner = Arc::new(ScriptedRunner::failing_on(prefix));
        let plan = plan("/dev/sda", true, true, Bootloader::Grub);
        let state = run_with(runner.clone(), &plan).await;

        let failed_step = StepId::ALL[i];
        assert_eq!(state.completed_steps.len(), i, "failing at {}", prefix);
        match &state.outcome {
            Outcome::FailedAt { step, cause } => {
                assert_eq!(*step, failed_step);
                assert_eq!(cause.kind(), "ExternalCommandFailure");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(state.machine, MachineState::Failed(i));

        // Nothing runs after the failing command
        let calls = runner.calls();
        assert!(calls.last().unwrap().starts_with(prefix));
    }
}

// ============================================================================
// PLAN-DEPENDENT BEHAVIOR
// ============================================================================

#[tokio::test]
async fn test_without_encryption_mapped_root_is_root_partition() {
    let runner = Arc::new(ScriptedRunner::default());
    let state = run_with(runner.clone(), &plan("/dev/nvme0n1", false, false, Bootloader::Grub)).await;

    assert_eq!(state.path(PathRole::RootPartition), Some("/dev/nvme0n1p1"));
    assert_eq!(state.path(PathRole::MappedRoot), Some("/dev/nvme0n1p1"));
    assert!(state.skipped_steps.contains(&StepId::Encrypt));

    let calls = runner.calls();
    assert!(calls.iter().all(|c| !c.starts_with("cryptsetup")));
    assert!(calls.contains(&"mkfs.ext4 -F /dev/nvme0n1p1".to_string()));
    assert!(calls.contains(&"mount /dev/nvme0n1p1 /mnt".to_string()));
}

#[tokio::test]
async fn test_with_encryption_later_steps_use_mapper() {
    let runner = Arc::new(ScriptedRunner::default());
    let state = run_with(runner.clone(), &plan("/dev/sda", false, true, Bootloader::Grub)).await;

    assert_eq!(state.path(PathRole::MappedRoot), Some("/dev/mapper/cryptroot"));
    let calls = runner.calls();
    assert!(calls.contains(&"cryptsetup luksFormat --batch-mode --key-file=- /dev/sda1".to_string()));
    assert!(calls.contains(&"mkfs.ext4 -F /dev/mapper/cryptroot".to_string()));
    assert!(calls.iter().all(|c| !c.contains("luks-passphrase-1")));
}

#[tokio::test]
async fn test_swap_steps_absent_without_swap() {
    let runner = Arc::new(ScriptedRunner::default());
    let state = run_with(runner.clone(), &plan("/dev/sda", false, false, Bootloader::Grub)).await;

    assert!(state.skipped_steps.contains(&StepId::Swap));
    assert!(!state.has_path(PathRole::SwapPartition));
    let calls = runner.calls();
    assert!(calls.iter().all(|c| !c.starts_with("mkswap") && !c.starts_with("swapon")));
    assert_eq!(calls[0], "parted --script -- /dev/sda mklabel gpt mkpart root 1MiB 100%");
}

#[tokio::test]
async fn test_swap_partition_initialized_when_requested() {
    let runner = Arc::new(ScriptedRunner::default());
    let state = run_with(runner.clone(), &plan("/dev/sda", true, false, Bootloader::Grub)).await;

    assert_eq!(state.path(PathRole::SwapPartition), Some("/dev/sda2"));
    let calls = runner.calls();
    assert!(calls.contains(&"mkswap /dev/sda2".to_string()));
    assert!(calls.contains(&"swapon /dev/sda2".to_string()));
}

#[tokio::test]
async fn test_bootloader_operation_counts() {
    let count_boot_calls = |calls: Vec<String>| {
        calls
            .iter()
            .filter(|c| c.contains("grub-") || c.contains("bootctl"))
            .count()
    };

    let grub = Arc::new(ScriptedRunner::default());
    run_with(grub.clone(), &plan("/dev/sda", false, false, Bootloader::Grub)).await;
    assert_eq!(count_boot_calls(grub.calls()), 2);

    let sdboot = Arc::new(ScriptedRunner::default());
    run_with(sdboot.clone(), &plan("/dev/sda", false, false, Bootloader::SystemdBoot)).await;
    assert_eq!(count_boot_calls(sdboot.calls()), 1);
    assert!(sdboot
        .calls()
        .contains(&"arch-chroot /mnt bootctl install".to_string()));
}

#[tokio::test]
async fn test_configuration_steps_run_inside_target_root() {
    let runner = Arc::new(ScriptedRunner::default());
    run_with(runner.clone(), &scenario_plan()).await;

    let calls = runner.calls();
    let after_enter = calls
        .iter()
        .position(|c| c == "arch-chroot /mnt true")
        .unwrap();
    assert!(calls[after_enter..]
        .iter()
        .all(|c| c.starts_with("arch-chroot /mnt ")));
    assert!(calls.contains(&"arch-chroot /mnt ln -sf /usr/share/zoneinfo/Europe/Moscow /etc/localtime".to_string()));
    assert!(calls.contains(&"arch-chroot /mnt useradd -m alice".to_string()));
    assert!(calls.contains(&"genfstab -U /mnt >> /mnt/etc/fstab".to_string()));
}

// ============================================================================
// CONCRETE SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_scenario_minimal_grub_install_succeeds() {
    let runner = Arc::new(ScriptedRunner::default());
    let state = run_with(runner, &scenario_plan()).await;

    assert_eq!(state.executed_numbers(), vec![1, 3, 5, 6, 7, 8, 9, 10]);
    assert_eq!(state.skipped_steps, vec![StepId::Encrypt, StepId::Swap]);
    assert_eq!(state.outcome, Outcome::Succeeded);
}

#[tokio::test]
async fn test_scenario_format_failure_stops_at_step_three() {
    let runner = Arc::new(ScriptedRunner::failing_on("mkfs.ext4"));
    let state = run_with(runner.clone(), &scenario_plan()).await;

    match &state.outcome {
        Outcome::FailedAt { step, cause } => {
            assert_eq!(*step, StepId::Format);
            match cause {
                FailureCause::ExternalCommandFailure {
                    command,
                    exit_status,
                    diagnostics,
                } => {
                    assert_eq!(command, "mkfs.ext4 -F /dev/sda1");
                    assert_eq!(*exit_status, ExitState::Code(1));
                    assert!(diagnostics.contains("simulated failure"));
                }
                other => panic!("unexpected cause {:?}", other),
            }
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(state.executed_numbers(), vec![1]);

    for prefix in &STEP_PREFIXES[4..] {
        assert!(runner.calls().iter().all(|c| !c.starts_with(prefix)));
    }
}

#[tokio::test]
async fn test_short_password_does_not_mask_failing_command() {
    let plan = PlanBuilder::new()
        .username("alice")
        .password(Secret::new("1"))
        .target_disk("/dev/sda")
        .filesystem(Filesystem::Ext4)
        .swap(false, None)
        .timezone(Timezone::EuropeMoscow)
        .locale(Locale::RuRu)
        .encryption(false, None)
        .bootloader(Bootloader::Grub)
        .build(&["/dev/sda".to_string()])
        .unwrap();
    let redactor = Redactor::new();
    for secret in plan.secrets() {
        redactor.register(secret);
    }

    let runner = Arc::new(ScriptedRunner::failing_on("mkfs.ext4"));
    let state = Orchestrator::new(runner, InstallerSettings::default(), redactor)
        .run(&plan)
        .await
        .unwrap();

    match &state.outcome {
        Outcome::FailedAt {
            cause: FailureCause::ExternalCommandFailure { command, .. },
            ..
        } => assert_eq!(command, "mkfs.ext4 -F /dev/sda1"),
        other => panic!("expected command failure, got {:?}", other),
    }
}

// ============================================================================
// CONTRACT VIOLATIONS, TIMEOUTS, CHECKPOINTS
// ============================================================================

#[tokio::test]
async fn test_standard_sequence_never_violates_preconditions() {
    for disk in ["/dev/sda", "/dev/nvme0n1"] {
        for swap in [false, true] {
            for luks in [false, true] {
                for bootloader in Bootloader::ALL {
                    let runner = Arc::new(ScriptedRunner::default());
                    let state = run_with(runner, &plan(disk, swap, luks, bootloader)).await;
                    assert_eq!(state.outcome, Outcome::Succeeded);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_misordered_sequence_reports_precondition_violation() {
    let mut steps = standard_sequence();
    steps.swap(0, 2); // Format before Partition

    let runner = Arc::new(ScriptedRunner::default());
    let state = Orchestrator::new(runner.clone(), InstallerSettings::default(), Redactor::new())
        .with_sequence(steps)
        .run(&scenario_plan())
        .await
        .unwrap();

    match state.outcome {
        Outcome::FailedAt { step, cause } => {
            assert_eq!(step, StepId::Format);
            assert_eq!(cause.kind(), "PreconditionViolation");
        }
        other => panic!("expected precondition failure, got {:?}", other),
    }
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_bad_derived_path_is_postcondition_violation() {
    let mut steps = standard_sequence();
    steps[0] = steps[0]
        .clone()
        .with_delta(|_| StateDelta::none().with_path(PathRole::RootPartition, "sda1"));

    let runner = Arc::new(ScriptedRunner::default());
    let state = Orchestrator::new(runner.clone(), InstallerSettings::default(), Redactor::new())
        .with_sequence(steps)
        .run(&scenario_plan())
        .await
        .unwrap();

    match state.outcome {
        Outcome::FailedAt { step, cause } => {
            assert_eq!(step, StepId::Partition);
            assert_eq!(cause.kind(), "PostconditionViolation");
        }
        other => panic!("expected postcondition failure, got {:?}", other),
    }
    assert_eq!(runner.calls().len(), 1);
    assert!(state.completed_steps.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hung_step_times_out() {
    let settings = InstallerSettings {
        step_timeout_secs: 5,
        ..Default::default()
    };
    let runner = Arc::new(ScriptedRunner::hanging_on("pacstrap"));
    let state = Orchestrator::new(runner, settings, Redactor::new())
        .run(&scenario_plan())
        .await
        .unwrap();

    match state.outcome {
        Outcome::FailedAt {
            step,
            cause: FailureCause::ExternalCommandFailure { exit_status, command, .. },
        } => {
            assert_eq!(step, StepId::Bootstrap);
            assert_eq!(exit_status, ExitState::Timeout { secs: 5 });
            assert!(command.starts_with("pacstrap /mnt base"));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_checkpoint_reflects_final_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("install-state.json");

    let runner = Arc::new(ScriptedRunner::failing_on("genfstab"));
    let state = Orchestrator::new(runner, InstallerSettings::default(), Redactor::new())
        .with_checkpoint(Some(path.clone()))
        .run(&scenario_plan())
        .await
        .unwrap();

    let saved = load_checkpoint(&path).unwrap();
    assert_eq!(saved, state);
    assert_eq!(saved.current_step, Some(StepId::Fstab));

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("user-password-1"));
}
