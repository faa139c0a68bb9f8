//! Diagnostics for catalog installation and backend readiness.

use crate::cli::CliContext;
use crate::core::catalog::Catalog;
use crate::core::file_lock;
use anyhow::Result;
use clap::Args;
use std::fs;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[derive(Args, Debug)]
pub struct DoctorArgs {}

pub fn run(ctx: &CliContext, _args: DoctorArgs) -> Result<()> {
    let paths = &ctx.paths;
    let mut warn = 0u32;
    let mut fail = 0u32;

    println!("Doctor: {}", paths);
    if let Some(w) = &ctx.config_load_warning {
        println!("  [WARN] {}", w);
        warn += 1;
    }

    if paths.root.is_dir() {
        println!("  [PASS] catalog root exists: {}", paths.root.display());
    } else {
        println!("  [FAIL] catalog root missing: {} (run init)", paths.root.display());
        fail += 1;
    }

    match Catalog::open(paths.clone()).snapshot() {
        Ok(file) => {
            println!(
                "  [PASS] catalog readable: {} user(s), {} record(s)",
                file.users.len(),
                file.records.len()
            );
            let flagged = file.records.iter().filter(|r| r.needs_reconciliation).count();
            if flagged > 0 {
                println!("  [WARN] {} record(s) awaiting reconciliation", flagged);
                warn += 1;
            }
        }
        Err(e) => {
            println!("  [FAIL] catalog unreadable: {}", e);
            fail += 1;
        }
    }

    match file_lock::held_elsewhere(&paths.catalog_lock) {
        Ok(true) => {
            println!("  [WARN] catalog lock currently held by another process");
            warn += 1;
        }
        Ok(false) => println!("  [PASS] catalog lock free"),
        Err(e) => {
            println!("  [FAIL] cannot probe catalog lock: {}", e);
            fail += 1;
        }
    }

    let tool = &ctx.config.tool;
    match fs::metadata(tool) {
        Ok(meta) if is_executable(&meta) => {
            println!("  [PASS] backend tool executable: {}", tool.display());
        }
        Ok(_) => {
            println!("  [FAIL] backend tool not executable: {}", tool.display());
            fail += 1;
        }
        Err(_) => {
            println!("  [FAIL] backend tool missing: {}", tool.display());
            fail += 1;
        }
    }

    let material_dir = ctx
        .config
        .material_dir
        .clone()
        .unwrap_or_else(|| paths.material.clone());
    if material_dir.is_dir() {
        println!("  [PASS] material directory exists: {}", material_dir.display());
    } else {
        println!("  [WARN] material directory missing: {}", material_dir.display());
        warn += 1;
    }

    println!();
    if fail > 0 {
        println!("Doctor found {} failure(s), {} warning(s).", fail, warn);
        std::process::exit(1);
    }
    println!("Doctor found no failures, {} warning(s).", warn);
    Ok(())
}

fn is_executable(meta: &fs::Metadata) -> bool {
    #[cfg(unix)]
    {
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        true
    }
}
