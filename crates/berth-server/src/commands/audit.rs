//! `berthd audit`: print the local audit trail.

use std::path::PathBuf;

use berth_audit::AuditStore;
use berth_audit::file::FileAuditStore;
use berth_common::constants::{DEFAULT_AUDIT_LIMIT, default_audit_file};
use clap::Args;

use crate::output;

/// Arguments for the `audit` command.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// JSON-lines audit file to read.
    #[arg(long)]
    pub audit_file: Option<PathBuf>,

    /// Only show records of this principal.
    #[arg(short, long)]
    pub principal: Option<String>,

    /// Maximum number of records, newest first.
    #[arg(short = 'n', long, default_value_t = DEFAULT_AUDIT_LIMIT)]
    pub limit: usize,
}

/// Executes the `audit` command.
///
/// # Errors
///
/// Returns an error if the audit file cannot be read.
#[allow(clippy::print_stdout)]
pub async fn execute(args: AuditArgs) -> anyhow::Result<()> {
    let path = args.audit_file.unwrap_or_else(default_audit_file);
    let store = FileAuditStore::open(&path)?;
    let records = store.query(args.principal.as_deref(), args.limit).await?;

    if records.is_empty() {
        println!("No audit records in {}.", path.display());
        return Ok(());
    }

    println!("{}", output::audit_header());
    for record in &records {
        println!("{}", output::audit_row(record));
    }
    Ok(())
}
