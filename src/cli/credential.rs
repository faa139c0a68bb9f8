//! Create, revoke, list, and quota command handlers.

use crate::cli::CliContext;
use crate::constants;
use crate::core::audit_log::AuditSubject;
use crate::core::errors::EngineError;
use crate::models::record::{CredentialRecord, RecordState};
use crate::util::fs as smith_fs;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use dialoguer::Confirm;
use serde::Serialize;
use std::path::PathBuf;

fn parse_owner(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("owner id cannot be empty".into());
    }
    Ok(s.to_string())
}

fn parse_label(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("label cannot be empty".into());
    }
    Ok(s.to_string())
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Owner identifier (as supplied by the front-end)
    #[arg(value_parser = parse_owner)]
    pub owner: String,

    /// Display name for the credential (e.g. "phone", "laptop")
    #[arg(value_parser = parse_label)]
    pub label: String,

    /// Owner display name recorded on first contact (defaults to the id)
    #[arg(long)]
    pub owner_label: Option<String>,

    /// Write the credential material to this path (must not already exist)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RevokeArgs {
    /// Owner identifier
    #[arg(value_parser = parse_owner)]
    pub owner: String,

    /// Record id (see `list`)
    pub record_id: u64,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Owner identifier
    #[arg(value_parser = parse_owner)]
    pub owner: String,

    /// Output format: table|json
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct QuotaArgs {
    /// Owner identifier
    #[arg(value_parser = parse_owner)]
    pub owner: String,
}

pub fn run_create(ctx: &CliContext, args: CreateArgs) -> Result<()> {
    if let Some(warning) = &ctx.config_load_warning {
        eprintln!("warning: {}", warning);
    }

    let engine = ctx.engine();
    let owner_label = args.owner_label.as_deref().unwrap_or(&args.owner);

    match engine.create(&args.owner, owner_label, &args.label) {
        Ok(created) => {
            ctx.audit(
                "create",
                AuditSubject {
                    owner: &args.owner,
                    identity: Some(&created.record.external_identity),
                    record_id: Some(created.record.id),
                },
                "done",
                None,
            );
            if let Some(output) = &args.output {
                smith_fs::write_private(
                    output,
                    &created.material,
                    constants::MATERIAL_FILE_MODE,
                )?;
                println!("Wrote credential material to {}", output.display());
            } else {
                println!(
                    "Credential '{}' is active (record {}, identity {}).",
                    created.record.label, created.record.id, created.record.external_identity
                );
                println!("Re-run with --output PATH to export the material.");
            }
            Ok(())
        }
        Err(err) => {
            audit_engine_error(ctx, "create", &args.owner, &err);
            if matches!(err, EngineError::BackendIndeterminate) {
                eprintln!(
                    "The backend did not answer in time; the credential is recorded as \
                     pending verification. Run 'vpnsmith reconcile' once the backend \
                     is reachable. Do not simply retry the create."
                );
            }
            Err(err).context(format!("create credential '{}'", args.label))
        }
    }
}

pub fn run_revoke(ctx: &CliContext, args: RevokeArgs) -> Result<()> {
    if !args.yes && !ctx.non_interactive {
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Revoke record {} of owner {}? The credential stops working immediately",
                args.record_id, args.owner
            ))
            .default(false)
            .interact()
            .context("read confirmation")?;
        if !proceed {
            bail!("revocation cancelled");
        }
    }

    let engine = ctx.engine();
    match engine.revoke(&args.owner, args.record_id) {
        Ok(record) => {
            ctx.audit(
                "revoke",
                AuditSubject {
                    owner: &args.owner,
                    identity: Some(&record.external_identity),
                    record_id: Some(record.id),
                },
                "done",
                None,
            );
            println!("Credential '{}' revoked.", record.label);
            Ok(())
        }
        Err(err) => {
            audit_engine_error(ctx, "revoke", &args.owner, &err);
            if matches!(err, EngineError::BackendIndeterminate) {
                eprintln!(
                    "The backend did not confirm the revocation; the record stays in \
                     'revoking' until a reconcile run settles it. The credential may \
                     still be live."
                );
            }
            Err(err).context(format!("revoke record {}", args.record_id))
        }
    }
}

/// Externally visible state string: flagged pending records read as
/// "pending verification" so callers don't mistake them for in-progress
/// creates.
fn display_state(record: &CredentialRecord) -> String {
    if record.needs_reconciliation {
        match record.state {
            RecordState::Pending => return "pending verification".into(),
            RecordState::Revoking => return "revoking (unconfirmed)".into(),
            _ => {}
        }
    }
    record.state.to_string()
}

#[derive(Serialize)]
struct ListItem {
    id: u64,
    label: String,
    state: String,
    external_identity: String,
    created_at: DateTime<Utc>,
    state_changed_at: DateTime<Utc>,
}

pub fn run_list(ctx: &CliContext, args: ListArgs) -> Result<()> {
    if args.format != "table" && args.format != "json" {
        bail!("invalid format: {} (use table|json)", args.format);
    }

    let engine = ctx.engine();
    let records = engine.list(&args.owner)?;
    let items: Vec<ListItem> = records
        .iter()
        .map(|r| ListItem {
            id: r.id,
            label: r.label.clone(),
            state: display_state(r),
            external_identity: r.external_identity.clone(),
            created_at: r.created_at,
            state_changed_at: r.state_changed_at,
        })
        .collect();

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No credentials for owner {}.", args.owner);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Label").add_attribute(Attribute::Bold),
        Cell::new("State").add_attribute(Attribute::Bold),
        Cell::new("Identity").add_attribute(Attribute::Bold),
        Cell::new("Created").add_attribute(Attribute::Bold),
    ]);
    for item in &items {
        table.add_row(vec![
            item.id.to_string(),
            item.label.clone(),
            item.state.clone(),
            item.external_identity.clone(),
            item.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_quota(ctx: &CliContext, args: QuotaArgs) -> Result<()> {
    let engine = ctx.engine();
    let status = engine.quota_status(&args.owner)?;
    println!(
        "Owner {}: {}/{} active, {} pending, {} slot(s) free.",
        args.owner,
        status.active,
        status.quota,
        status.pending,
        status.remaining()
    );
    Ok(())
}

fn audit_engine_error(ctx: &CliContext, action: &str, owner: &str, err: &EngineError) {
    let outcome = match err {
        EngineError::BackendIndeterminate => "indeterminate",
        _ => "failed",
    };
    ctx.audit(
        action,
        AuditSubject {
            owner,
            identity: None,
            record_id: None,
        },
        outcome,
        Some(err.to_string()),
    );
}
