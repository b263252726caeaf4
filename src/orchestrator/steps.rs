//! The fixed provisioning sequence.
//!
//! Each `Step` is static data: an applicability predicate over the plan, a
//! precondition over the state, the invocations it runs, the `StateDelta` it
//! produces and a postcondition. Steps never mutate state themselves.

use crate::config::InstallerSettings;
use crate::models::{Bootloader, InstallPlan, PathRole, StateDelta, StepId};
use crate::orchestrator::state::InstallState;
use crate::system::Invocation;

/// Everything a step may read while building its action.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub plan: &'a InstallPlan,
    pub state: &'a InstallState,
    pub settings: &'a InstallerSettings,
}

type PlanPredicate = fn(&InstallPlan) -> bool;
type StateCheck = fn(&StepContext<'_>) -> Result<(), String>;
type ActionBuilder = fn(&StepContext<'_>) -> Result<Vec<Invocation>, String>;
type DeltaBuilder = fn(&StepContext<'_>) -> StateDelta;

/// Static definition of one provisioning step.
#[derive(Clone)]
pub struct Step {
    pub id: StepId,
    pub description: &'static str,
    applies: PlanPredicate,
    precondition: StateCheck,
    action: ActionBuilder,
    delta: DeltaBuilder,
    skip_delta: DeltaBuilder,
    postcondition: StateCheck,
}

impl Step {
    pub fn applies(&self, plan: &InstallPlan) -> bool {
        (self.applies)(plan)
    }

    pub fn precondition(&self, ctx: &StepContext<'_>) -> Result<(), String> {
        (self.precondition)(ctx)
    }

    pub fn invocations(&self, ctx: &StepContext<'_>) -> Result<Vec<Invocation>, String> {
        (self.action)(ctx)
    }

    /// Delta applied after a successful run.
    pub fn delta(&self, ctx: &StepContext<'_>) -> StateDelta {
        (self.delta)(ctx)
    }

    /// Delta applied when the step does not apply to the plan.
    pub fn skip_delta(&self, ctx: &StepContext<'_>) -> StateDelta {
        (self.skip_delta)(ctx)
    }

    pub fn postcondition(&self, ctx: &StepContext<'_>) -> Result<(), String> {
        (self.postcondition)(ctx)
    }

    /// Replace the action; used to build faulty sequences in tests.
    pub fn with_action(mut self, action: ActionBuilder) -> Self {
        self.action = action;
        self
    }

    pub fn with_delta(mut self, delta: DeltaBuilder) -> Self {
        self.delta = delta;
        self
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish()
    }
}

/// Partition device for a disk: `/dev/sda` + 1 = `/dev/sda1`,
/// `/dev/nvme0n1` + 1 = `/dev/nvme0n1p1`.
pub fn partition_path(disk: &str, number: u8) -> String {
    if disk.chars().last().map_or(false, |c| c.is_ascii_digit()) {
        format!("{}p{}", disk, number)
    } else {
        format!("{}{}", disk, number)
    }
}

/// The ten steps in execution order.
pub fn standard_sequence() -> Vec<Step> {
    vec![
        Step {
            id: StepId::Partition,
            description: "Partition the target disk",
            applies: always,
            precondition: no_requirement,
            action: partition_action,
            delta: partition_delta,
            skip_delta: no_delta,
            postcondition: partition_postcondition,
        },
        Step {
            id: StepId::Encrypt,
            description: "Set up LUKS encryption on the root partition",
            applies: InstallPlan::use_encryption,
            precondition: |ctx| require_path(ctx.state, PathRole::RootPartition).map(drop),
            action: encrypt_action,
            delta: |ctx| {
                StateDelta::none().with_path(PathRole::MappedRoot, ctx.settings.mapper_path())
            },
            skip_delta: |ctx| match ctx.state.path(PathRole::RootPartition) {
                Some(root) => StateDelta::none().with_path(PathRole::MappedRoot, root),
                None => StateDelta::none(),
            },
            postcondition: |ctx| check_paths(ctx.state, &[PathRole::MappedRoot]),
        },
        Step {
            id: StepId::Format,
            description: "Create the root filesystem",
            applies: always,
            precondition: |ctx| require_path(ctx.state, PathRole::MappedRoot).map(drop),
            action: |ctx| {
                let mapped = require_path(ctx.state, PathRole::MappedRoot)?;
                let fs = ctx.plan.filesystem();
                Ok(vec![Invocation::new(fs.mkfs_program())
                    .arg(fs.force_flag())
                    .arg(mapped)])
            },
            delta: no_delta,
            skip_delta: no_delta,
            postcondition: no_requirement,
        },
        Step {
            id: StepId::Swap,
            description: "Initialize and enable swap",
            applies: InstallPlan::use_swap,
            precondition: |ctx| require_path(ctx.state, PathRole::SwapPartition).map(drop),
            action: |ctx| {
                let swap = require_path(ctx.state, PathRole::SwapPartition)?;
                Ok(vec![
                    Invocation::new("mkswap").arg(swap),
                    Invocation::new("swapon").arg(swap),
                ])
            },
            delta: no_delta,
            skip_delta: no_delta,
            postcondition: no_requirement,
        },
        Step {
            id: StepId::Bootstrap,
            description: "Mount the root filesystem and install the base system",
            applies: always,
            precondition: |ctx| {
                require_completed(ctx.state, StepId::Format)?;
                require_path(ctx.state, PathRole::MappedRoot).map(drop)
            },
            action: |ctx| {
                let mapped = require_path(ctx.state, PathRole::MappedRoot)?;
                let mount_point = ctx.settings.mount_point_arg();
                Ok(vec![
                    Invocation::new("mount").arg(mapped).arg(mount_point.clone()),
                    Invocation::new("pacstrap")
                        .arg(mount_point)
                        .args(ctx.settings.base_packages.iter().cloned()),
                ])
            },
            delta: |ctx| {
                StateDelta::none().with_path(PathRole::MountedRoot, ctx.settings.mount_point_arg())
            },
            skip_delta: no_delta,
            postcondition: |ctx| check_paths(ctx.state, &[PathRole::MountedRoot]),
        },
        Step {
            id: StepId::Fstab,
            description: "Generate the filesystem table",
            applies: always,
            precondition: |ctx| require_path(ctx.state, PathRole::MountedRoot).map(drop),
            action: |ctx| {
                let mounted = require_path(ctx.state, PathRole::MountedRoot)?;
                let fstab = std::path::Path::new(mounted).join("etc").join("fstab");
                Ok(vec![Invocation::new("genfstab")
                    .args(["-U", mounted])
                    .append_stdout_to(fstab)])
            },
            delta: no_delta,
            skip_delta: no_delta,
            postcondition: no_requirement,
        },
        Step {
            id: StepId::EnterTarget,
            description: "Switch the effective root to the installed system",
            applies: always,
            precondition: |ctx| {
                require_completed(ctx.state, StepId::Fstab)?;
                require_path(ctx.state, PathRole::MountedRoot).map(drop)
            },
            action: |ctx| {
                let mounted = require_path(ctx.state, PathRole::MountedRoot)?;
                Ok(vec![Invocation::new("true").in_root(mounted)])
            },
            delta: |ctx| match ctx.state.path(PathRole::MountedRoot) {
                Some(mounted) => StateDelta::none().with_path(PathRole::TargetRoot, mounted),
                None => StateDelta::none(),
            },
            skip_delta: no_delta,
            postcondition: |ctx| check_paths(ctx.state, &[PathRole::TargetRoot]),
        },
        Step {
            id: StepId::Localize,
            description: "Configure timezone and locale",
            applies: always,
            precondition: target_root_required,
            action: |ctx| {
                let root = require_path(ctx.state, PathRole::TargetRoot)?;
                let plan = ctx.plan;
                Ok(vec![
                    Invocation::new("ln")
                        .arg("-sf")
                        .arg(plan.timezone().zoneinfo_path())
                        .arg("/etc/localtime")
                        .in_root(root),
                    Invocation::new("tee")
                        .args(["-a", "/etc/locale.gen"])
                        .stdin_text(plan.locale().locale_gen_entry())
                        .in_root(root),
                    Invocation::new("tee")
                        .arg("/etc/locale.conf")
                        .stdin_text(format!("LANG={}\n", plan.locale()))
                        .in_root(root),
                    Invocation::new("locale-gen").in_root(root),
                ])
            },
            delta: no_delta,
            skip_delta: no_delta,
            postcondition: no_requirement,
        },
        Step {
            id: StepId::CreateUser,
            description: "Create the user account",
            applies: always,
            precondition: target_root_required,
            action: |ctx| {
                let root = require_path(ctx.state, PathRole::TargetRoot)?;
                let plan = ctx.plan;
                let credentials = crate::models::Secret::new(format!(
                    "{}:{}\n",
                    plan.username(),
                    plan.password().expose()
                ));
                Ok(vec![
                    Invocation::new("useradd")
                        .args(["-m", plan.username()])
                        .in_root(root),
                    Invocation::new("chpasswd")
                        .stdin_secret(credentials)
                        .in_root(root),
                ])
            },
            delta: no_delta,
            skip_delta: no_delta,
            postcondition: no_requirement,
        },
        Step {
            id: StepId::Bootloader,
            description: "Install the bootloader",
            applies: always,
            precondition: target_root_required,
            action: |ctx| {
                let root = require_path(ctx.state, PathRole::TargetRoot)?;
                Ok(match ctx.plan.bootloader() {
                    Bootloader::Grub => vec![
                        Invocation::new("grub-install")
                            .arg(ctx.plan.target_disk())
                            .in_root(root),
                        Invocation::new("grub-mkconfig")
                            .args(["-o", "/boot/grub/grub.cfg"])
                            .in_root(root),
                    ],
                    Bootloader::SystemdBoot => {
                        vec![Invocation::new("bootctl").arg("install").in_root(root)]
                    }
                })
            },
            delta: no_delta,
            skip_delta: no_delta,
            postcondition: no_requirement,
        },
    ]
}

fn always(_plan: &InstallPlan) -> bool {
    true
}

fn no_requirement(_ctx: &StepContext<'_>) -> Result<(), String> {
    Ok(())
}

fn no_delta(_ctx: &StepContext<'_>) -> StateDelta {
    StateDelta::none()
}

fn target_root_required(ctx: &StepContext<'_>) -> Result<(), String> {
    require_completed(ctx.state, StepId::EnterTarget)?;
    require_path(ctx.state, PathRole::TargetRoot).map(drop)
}

fn require_path(state: &InstallState, role: PathRole) -> Result<&str, String> {
    state
        .path(role)
        .ok_or_else(|| format!("{} has not been resolved", role))
}

fn require_completed(state: &InstallState, step: StepId) -> Result<(), String> {
    if state.completed_steps.contains(&step) {
        Ok(())
    } else {
        Err(format!("step {} has not completed", step))
    }
}

/// Each role must be present, non-empty and absolute; device roles under /dev/.
pub fn check_paths(state: &InstallState, roles: &[PathRole]) -> Result<(), String> {
    for role in roles {
        let path = require_path(state, *role)?;
        if path.is_empty() {
            return Err(format!("{} is empty", role));
        }
        if !path.starts_with('/') {
            return Err(format!("{} is not absolute: {}", role, path));
        }
        if role.is_device() && !path.starts_with("/dev/") {
            return Err(format!("{} is not a device path: {}", role, path));
        }
    }
    Ok(())
}

fn partition_action(ctx: &StepContext<'_>) -> Result<Vec<Invocation>, String> {
    let plan = ctx.plan;
    let mut args = vec![
        "--script".to_string(),
        "--".to_string(),
        plan.target_disk().to_string(),
        "mklabel".to_string(),
        "gpt".to_string(),
        "mkpart".to_string(),
        "root".to_string(),
        "1MiB".to_string(),
    ];
    match plan.swap_size() {
        Some(size) => {
            let boundary = format!("-{}", size.as_parted_unit());
            args.push(boundary.clone());
            args.extend(
                ["mkpart", "swap", "linux-swap"]
                    .iter()
                    .map(|s| s.to_string()),
            );
            args.push(boundary);
            args.push("100%".to_string());
        }
        None => args.push("100%".to_string()),
    }
    Ok(vec![Invocation::new("parted").args(args)])
}

fn partition_delta(ctx: &StepContext<'_>) -> StateDelta {
    let disk = ctx.plan.target_disk();
    let delta = StateDelta::none().with_path(PathRole::RootPartition, partition_path(disk, 1));
    if ctx.plan.use_swap() {
        delta.with_path(PathRole::SwapPartition, partition_path(disk, 2))
    } else {
        delta
    }
}

fn partition_postcondition(ctx: &StepContext<'_>) -> Result<(), String> {
    check_paths(ctx.state, &[PathRole::RootPartition])?;
    if ctx.plan.use_swap() {
        check_paths(ctx.state, &[PathRole::SwapPartition])?;
    }
    Ok(())
}

fn encrypt_action(ctx: &StepContext<'_>) -> Result<Vec<Invocation>, String> {
    let root = require_path(ctx.state, PathRole::RootPartition)?;
    let passphrase = ctx
        .plan
        .encryption_password()
        .ok_or_else(|| "encryption enabled without a passphrase".to_string())?;
    Ok(vec![
        Invocation::new("cryptsetup")
            .args(["luksFormat", "--batch-mode", "--key-file=-", root])
            .stdin_secret(passphrase.clone()),
        Invocation::new("cryptsetup")
            .args(["open", "--key-file=-", root, ctx.settings.mapper_name.as_str()])
            .stdin_secret(passphrase.clone()),
    ])
}
