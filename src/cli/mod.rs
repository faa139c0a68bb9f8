//! CLI routing and command dispatch.

use crate::core::audit_log::{self, AuditSubject};
use crate::core::backend::ScriptBackend;
use crate::core::catalog::Catalog;
use crate::core::engine::ProvisioningEngine;
use crate::core::paths::CatalogPaths;
use crate::models::catalog_file::ProvisionerSection;
use crate::util::journald;
use crate::util::privilege;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod audit;
pub mod credential;
pub mod doctor;
pub mod init;
pub mod reconcile;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub paths: CatalogPaths,
    pub config: ProvisionerSection,
    pub non_interactive: bool,
    pub config_load_warning: Option<String>,
}

impl CliContext {
    /// Build the orchestrator against the production script backend.
    pub fn engine(&self) -> ProvisioningEngine<ScriptBackend> {
        let catalog = Catalog::open(self.paths.clone());
        let workdir = self
            .config
            .workdir
            .clone()
            .unwrap_or_else(|| self.paths.root.clone());
        let material_dir = self
            .config
            .material_dir
            .clone()
            .unwrap_or_else(|| self.paths.material.clone());
        let backend = ScriptBackend::new(
            self.config.tool.clone(),
            workdir,
            material_dir,
            self.config.timeout(),
        );
        ProvisioningEngine::new(catalog, backend, self.config.clone())
    }

    /// Write an audit log line and forward it to journald, best-effort.
    pub fn audit(
        &self,
        action: &str,
        subject: AuditSubject<'_>,
        outcome: &str,
        error: Option<String>,
    ) {
        let owner = subject.owner.to_string();
        if let Err(e) = audit_log::log(&self.paths, action, subject, outcome, error) {
            eprintln!("warning: audit log failed: {}", e);
            return;
        }

        let priority = match outcome {
            "done" => journald::Priority::Info,
            "indeterminate" => journald::Priority::Err,
            _ => journald::Priority::Warning,
        };
        // Metadata only; credential material never reaches the journal.
        let line = format!(
            "{{\"action\":\"{}\",\"owner\":\"{}\",\"outcome\":\"{}\",\"catalog\":\"{}\"}}",
            action, owner, outcome, self.paths
        );
        journald::forward_line("vpnsmith", priority, &line);
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "vpnsmith",
    version,
    about = "VPN client credential provisioning and reconciliation"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Run in non-interactive mode (no prompts, suitable for automation)
    #[arg(long, global = true, env = "VPNSMITH_NON_INTERACTIVE")]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let paths = CatalogPaths::resolve(self.root)?;

        // Load provisioner config from catalog.toml if it exists
        // (best-effort; read-only commands still work with defaults).
        let mut config_load_warning: Option<String> = None;
        let config = if paths.catalog_toml.exists() {
            match Catalog::open(paths.clone()).snapshot() {
                Ok(file) => file.provisioner,
                Err(e) => {
                    config_load_warning =
                        Some(format!("cannot read config from catalog.toml: {}", e));
                    ProvisionerSection::default()
                }
            }
        } else {
            ProvisionerSection::default()
        };

        let ctx = CliContext {
            paths,
            config,
            non_interactive: self.non_interactive,
            config_load_warning,
        };

        // Enforce root for commands that drive the privileged backend or
        // mutate the catalog.
        if self.command.requires_root() {
            privilege::require_root(self.command.name())?;
        }

        match self.command {
            Commands::Init(args) => init::run(&ctx, args),
            Commands::Create(args) => credential::run_create(&ctx, args),
            Commands::Revoke(args) => credential::run_revoke(&ctx, args),
            Commands::List(args) => credential::run_list(&ctx, args),
            Commands::Quota(args) => credential::run_quota(&ctx, args),
            Commands::Reconcile(args) => reconcile::run(&ctx, args),
            Commands::Audit { command } => audit::run(&ctx, command),
            Commands::Doctor(args) => doctor::run(&ctx, args),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize catalog directories and the catalog file
    Init(init::InitArgs),
    /// Provision a credential for an owner
    Create(credential::CreateArgs),
    /// Revoke an owner's credential
    Revoke(credential::RevokeArgs),
    /// List an owner's credentials
    List(credential::ListArgs),
    /// Show an owner's quota usage
    Quota(credential::QuotaArgs),
    /// Resolve records flagged after indeterminate backend outcomes
    Reconcile(reconcile::ReconcileArgs),
    /// View or verify the audit trail
    Audit {
        #[command(subcommand)]
        command: audit::AuditCommand,
    },
    /// Diagnose installation and configuration (safe, read-only)
    Doctor(doctor::DoctorArgs),
}

impl Commands {
    /// Whether this command requires root privileges.
    pub fn requires_root(&self) -> bool {
        matches!(
            self,
            Commands::Init(_)
                | Commands::Create(_)
                | Commands::Revoke(_)
                | Commands::Reconcile(_)
        )
    }

    /// Command name for error messages.
    pub fn name(&self) -> &str {
        match self {
            Commands::Init(_) => "init",
            Commands::Create(_) => "create",
            Commands::Revoke(_) => "revoke",
            Commands::List(_) => "list",
            Commands::Quota(_) => "quota",
            Commands::Reconcile(_) => "reconcile",
            Commands::Audit { .. } => "audit",
            Commands::Doctor(_) => "doctor",
        }
    }
}
