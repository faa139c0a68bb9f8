use crate::cli::CliContext;
use crate::constants;
use crate::util::fs as smith_fs;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct InitArgs {}

pub fn run(ctx: &CliContext, _args: InitArgs) -> Result<()> {
    let paths = &ctx.paths;
    smith_fs::ensure_dir(&paths.root, 0o700)?;
    smith_fs::ensure_dir(&paths.material, constants::MATERIAL_DIR_MODE)?;

    if paths.catalog_toml.exists() {
        println!("Catalog already initialized at {}", paths.root.display());
        return Ok(());
    }

    let catalog = crate::core::catalog::Catalog::open(paths.clone());
    let txn = catalog.begin()?;
    txn.commit()?;
    println!("Initialized catalog at {}", paths.root.display());
    println!(
        "Edit {} to set the backend tool, quota, and timeout.",
        paths.catalog_toml.display()
    );
    Ok(())
}
