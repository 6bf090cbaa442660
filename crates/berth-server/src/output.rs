//! Table formatting for CLI output.

use berth_audit::AuditRecord;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column header matching [`audit_row`].
#[must_use]
pub fn audit_header() -> String {
    format!(
        "{:<20} {:<24} {:<18} {:<28} {:<15}",
        "TIME (UTC)", "PRINCIPAL", "ACTION", "TARGET", "SOURCE"
    )
}

/// One audit record as a table row.
#[must_use]
pub fn audit_row(record: &AuditRecord) -> String {
    let target = record
        .container_id
        .as_deref()
        .or(record.image.as_deref())
        .unwrap_or("-");
    format!(
        "{:<20} {:<24} {:<18} {:<28} {:<15}",
        record.created_at.format(TIME_FORMAT).to_string(),
        record.principal,
        record.action.as_str(),
        target,
        record.source_address.as_deref().unwrap_or("-"),
    )
}
