//! Reconciliation command: settle records left behind by indeterminate
//! backend outcomes.

use crate::cli::CliContext;
use crate::core::audit_log::AuditSubject;
use crate::core::engine::Reconciliation;
use anyhow::{bail, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Record id to reconcile (see `reconcile --list`)
    pub record_id: Option<u64>,

    /// Reconcile every flagged record
    #[arg(long, conflicts_with = "record_id")]
    pub all: bool,

    /// Only list flagged records, change nothing
    #[arg(long, conflicts_with_all = ["record_id", "all"])]
    pub list: bool,
}

pub fn run(ctx: &CliContext, args: ReconcileArgs) -> Result<()> {
    let engine = ctx.engine();

    if args.list {
        let flagged = engine.flagged_records()?;
        if flagged.is_empty() {
            println!("No records awaiting reconciliation.");
            return Ok(());
        }
        for record in flagged {
            println!(
                "record {} owner {} label '{}' state {} identity {}",
                record.id, record.owner_id, record.label, record.state, record.external_identity
            );
        }
        return Ok(());
    }

    let targets: Vec<u64> = if args.all {
        engine.flagged_records()?.iter().map(|r| r.id).collect()
    } else if let Some(id) = args.record_id {
        vec![id]
    } else {
        bail!("pass a record id, --all, or --list");
    };

    if targets.is_empty() {
        println!("No records awaiting reconciliation.");
        return Ok(());
    }

    let mut unresolved = 0usize;
    for id in targets {
        let (record, resolution) = engine.reconcile(id)?;
        let verdict = match resolution {
            Reconciliation::Activated => "backend has it; record is now active",
            Reconciliation::MarkedRevoked => "backend dropped it; revocation confirmed",
            Reconciliation::MarkedFailed => "backend never got it; create marked failed",
            Reconciliation::Unresolved => {
                unresolved += 1;
                "probe could not answer; record stays flagged"
            }
        };
        let outcome = if resolution == Reconciliation::Unresolved {
            "indeterminate"
        } else {
            "done"
        };
        ctx.audit(
            "reconcile",
            AuditSubject {
                owner: &record.owner_id,
                identity: Some(&record.external_identity),
                record_id: Some(record.id),
            },
            outcome,
            None,
        );
        println!("record {}: {}", record.id, verdict);
    }

    if unresolved > 0 {
        eprintln!(
            "{} record(s) remain unresolved. If the backend has no 'status' \
             action, they need manual operator resolution.",
            unresolved
        );
    }
    Ok(())
}
