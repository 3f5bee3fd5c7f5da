// crates/hopchain-cli/src/commands/audit.rs
//
// `hopchain audit [--packet <id>]`: list the repository's packet audit log,
// oldest entry first.

use clap::Args;
use tabled::Tabled;

use hopchain_core::audit::AuditEntry;
use hopchain_core::traits::AuditLogStore;

use crate::config::HopchainConfig;
use crate::output::{format_json, format_table, truncate, OutputFormat};
use crate::repository;

#[derive(Debug, Args)]
pub struct AuditCmd {
    /// Only show entries for this packet id.
    #[arg(long)]
    pub packet: Option<String>,
}

#[derive(Tabled)]
struct AuditRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Packet")]
    packet: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl From<&AuditEntry> for AuditRow {
    fn from(e: &AuditEntry) -> Self {
        Self {
            time: e.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            packet: e.packet_id.to_string(),
            action: e.action.as_str().to_string(),
            actor: e.actor.clone(),
            details: if e.details.is_null() {
                "-".to_string()
            } else {
                truncate(&e.details.to_string(), 60)
            },
        }
    }
}

pub async fn run(
    cmd: &AuditCmd,
    config: &HopchainConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let packet_id = cmd
        .packet
        .as_deref()
        .map(uuid::Uuid::parse_str)
        .transpose()
        .map_err(|e| format!("invalid packet id: {}", e))?;
    let repo = repository::open(config)?;
    let entries = repo.list_audit(packet_id.as_ref()).await?;

    match format {
        OutputFormat::Json => println!("{}", format_json(&entries)),
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("No audit entries.");
            } else {
                let rows: Vec<AuditRow> = entries.iter().map(AuditRow::from).collect();
                println!("{}", format_table(&rows));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopchain_core::audit::AuditAction;
    use serde_json::json;

    #[test]
    fn test_row_shows_action_and_details() {
        let bare = AuditEntry::new(uuid::Uuid::nil(), AuditAction::PacketShared, "local");
        let row = AuditRow::from(&bare);
        assert_eq!(row.action, "packet_shared");
        assert_eq!(row.details, "-");

        let detailed = bare.with_details(json!({"signed": true}));
        assert_eq!(AuditRow::from(&detailed).details, r#"{"signed":true}"#);
    }
}
