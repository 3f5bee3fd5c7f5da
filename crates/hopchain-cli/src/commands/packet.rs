// crates/hopchain-cli/src/commands/packet.rs
//
// `hopchain packet {sign, verify, share, import, from-template, run, list}`:
// packet signatures, share envelopes and executions. Every lifecycle
// change is appended to the repository's audit log.

use std::collections::BTreeMap;
use std::fs;

use clap::Subcommand;
use serde::Deserialize;
use serde_json::json;
use tabled::Tabled;

use hopchain_core::audit::{AuditAction, AuditEntry};
use hopchain_core::packet::{Packet, PacketLogic, PacketStatus};
use hopchain_core::traits::{AuditLogStore, PacketStore, TemplateStore};
use hopchain_verify::{PacketShare, PacketSigner, PacketVerifier};

use crate::config::HopchainConfig;
use crate::output::{format_json, format_table, short_hash, OutputFormat};
use crate::repository;

#[derive(Debug, Subcommand)]
pub enum PacketCmd {
    /// Sign a packet file in place (or into --out).
    Sign {
        /// Packet JSON file.
        #[arg(long)]
        file: String,
        /// Write the signed packet here instead of overwriting --file.
        #[arg(long)]
        out: Option<String>,
        /// Identity recorded as signed_by. Defaults to the configured signer.
        #[arg(long)]
        signer: Option<String>,
    },
    /// Check a packet file's signature against its current content.
    Verify {
        #[arg(long)]
        file: String,
    },
    /// Wrap a packet file in a share envelope.
    Share {
        #[arg(long)]
        file: String,
        /// Output file. Prints to stdout when omitted.
        #[arg(long)]
        out: Option<String>,
    },
    /// Import a share envelope into the local repository.
    Import {
        #[arg(long)]
        file: String,
    },
    /// Create a draft packet in the repository from a stored template.
    FromTemplate {
        /// Template id.
        #[arg(long)]
        template: String,
    },
    /// Execute a stored packet through the command runner.
    Run {
        /// Packet id.
        #[arg(long)]
        id: String,
        /// Template parameter as key=value. Repeatable.
        #[arg(long = "param")]
        params: Vec<String>,
    },
    /// List packets in the local repository.
    List {
        /// Filter by status: draft, signed, archived.
        #[arg(long)]
        status: Option<String>,
    },
}

/// Packet definition carried in a template's `packetJson`.
#[derive(Debug, Deserialize)]
struct PacketDefinition {
    name: String,
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    logic: PacketLogic,
    #[serde(default)]
    parameter_schema: serde_json::Value,
}

fn default_version() -> u32 {
    1
}

#[derive(Tabled)]
struct PacketRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: u32,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Signature")]
    signature: String,
    #[tabled(rename = "Executions")]
    executions: u64,
}

impl From<&Packet> for PacketRow {
    fn from(p: &Packet) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name().to_string(),
            version: p.version(),
            status: format!("{:?}", p.status()).to_lowercase(),
            signature: p.signature().map(short_hash).unwrap_or_else(|| "-".to_string()),
            executions: p.execution_count,
        }
    }
}

fn read_packet(path: &str) -> Result<Packet, Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn parse_params(raw: &[String]) -> Result<BTreeMap<String, String>, Box<dyn std::error::Error>> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(format!("invalid parameter '{}', expected key=value", pair).into()),
        })
        .collect()
}

/// Append one audit entry to the local repository and save it.
async fn audit(
    config: &HopchainConfig,
    entry: AuditEntry,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = repository::open(config)?;
    repo.append_audit(&entry).await?;
    repository::save(config, &repo)?;
    Ok(())
}

fn parse_status(status: &str) -> Result<PacketStatus, Box<dyn std::error::Error>> {
    match status {
        "draft" => Ok(PacketStatus::Draft),
        "signed" => Ok(PacketStatus::Signed),
        "archived" => Ok(PacketStatus::Archived),
        other => Err(format!("unknown packet status '{}'", other).into()),
    }
}

/// Run the packet subcommand.
pub async fn run(
    cmd: &PacketCmd,
    config: &HopchainConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        PacketCmd::Sign { file, out, signer } => {
            let mut packet = read_packet(file)?;
            let identity = signer.clone().unwrap_or_else(|| config.signer.clone());
            let signature = PacketSigner::new(super::crypto(), identity).sign(&mut packet)?;
            let target = out.as_deref().unwrap_or(file);
            fs::write(target, serde_json::to_string_pretty(&packet)?)?;
            let actor = packet.signed_by().unwrap_or("unknown").to_string();
            audit(
                config,
                AuditEntry::new(packet.id, AuditAction::PacketSigned, actor)
                    .with_details(json!({"signature_prefix": short_hash(&signature)})),
            )
            .await?;
            println!("Signed {} v{}: {}", packet.name(), packet.version(), signature);
            println!("  Saved to: {}", target);
        }
        PacketCmd::Verify { file } => {
            let packet = read_packet(file)?;
            let result = PacketVerifier::new(super::crypto()).verify(&packet)?;
            match format {
                OutputFormat::Json => println!("{}", format_json(&result)),
                OutputFormat::Table => {
                    println!("{} v{}: {}", packet.name(), packet.version(), result.message);
                    println!("  Expected: {}", result.expected);
                    println!("  Stored:   {}", result.actual.as_deref().unwrap_or("-"));
                }
            }
            if !result.valid {
                return Err(result.message.into());
            }
        }
        PacketCmd::Share { file, out } => {
            let packet = read_packet(file)?;
            let json = PacketShare::new(&packet).to_json()?;
            audit(
                config,
                AuditEntry::new(packet.id, AuditAction::PacketShared, config.signer.clone())
                    .with_details(json!({"signed": packet.is_signed()})),
            )
            .await?;
            match out {
                Some(path) => {
                    fs::write(path, json)?;
                    println!("Share envelope written to {}", path);
                }
                None => println!("{}", json),
            }
        }
        PacketCmd::Import { file } => {
            let share = PacketShare::from_json(&fs::read_to_string(file)?)?;
            let packet = share.import(&PacketVerifier::new(super::crypto()))?;
            let repo = repository::open(config)?;
            repo.create_packet(&packet).await?;
            repo.append_audit(
                &AuditEntry::new(packet.id, AuditAction::PacketImported, config.signer.clone())
                    .with_details(json!({
                        "source": file,
                        "original_id": share.packet.id,
                        "status": PacketRow::from(&packet).status,
                    })),
            )
            .await?;
            repository::save(config, &repo)?;
            println!(
                "Imported {} v{} as {} ({})",
                packet.name(),
                packet.version(),
                packet.id,
                PacketRow::from(&packet).status
            );
        }
        PacketCmd::FromTemplate { template } => {
            let repo = repository::open(config)?;
            let stored = repo
                .get_template(template)
                .await?
                .ok_or_else(|| format!("template '{}' not found", template))?;
            let definition: PacketDefinition = serde_json::from_str(&stored.packet_json)?;
            let mut packet = Packet::new(
                definition.name,
                definition.version,
                definition.logic,
                definition.parameter_schema,
            );
            packet.tags = stored.tags.clone();
            repo.create_packet(&packet).await?;
            let uses = repo.record_template_use(&stored.id).await?;
            repo.append_audit(
                &AuditEntry::new(packet.id, AuditAction::PacketCreated, config.signer.clone())
                    .with_details(json!({"template_id": stored.id})),
            )
            .await?;
            repository::save(config, &repo)?;
            println!("Created draft packet {} from template {}", packet.id, stored.id);
            println!("  Template reuse count: {}", uses);
        }
        PacketCmd::Run { id, params } => {
            let packet_id = uuid::Uuid::parse_str(id)
                .map_err(|e| format!("invalid packet id '{}': {}", id, e))?;
            let params = parse_params(params)?;
            let repo = repository::open(config)?;
            let runner = super::runner(config, &repo)?;
            let (outcome, packet) = runner.run_packet(&*repo, &packet_id, &params).await?;
            repo.append_audit(
                &AuditEntry::new(packet.id, AuditAction::PacketExecuted, config.signer.clone())
                    .with_details(json!({
                        "session_id": outcome.session.id,
                        "model": outcome.decision.model,
                        "execution_count": packet.execution_count,
                    })),
            )
            .await?;
            repository::save(config, &repo)?;
            match format {
                OutputFormat::Json => println!("{}", format_json(&outcome.session)),
                OutputFormat::Table => {
                    println!(
                        "Executed {} v{} as session {}",
                        packet.name(),
                        packet.version(),
                        outcome.session.id
                    );
                    println!("  Routed to:  {}", outcome.decision.model);
                    println!("  Executions: {}", packet.execution_count);
                }
            }
        }
        PacketCmd::List { status } => {
            let repo = repository::open(config)?;
            let packets = match status {
                Some(s) => repo.filter_packets(parse_status(s)?).await?,
                None => repo.list_packets().await?,
            };
            match format {
                OutputFormat::Json => println!("{}", format_json(&packets)),
                OutputFormat::Table => {
                    let rows: Vec<PacketRow> = packets.iter().map(PacketRow::from).collect();
                    println!("{}", format_table(&rows));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_definition_defaults() {
        let def: PacketDefinition = serde_json::from_str(r#"{"name": "lead-capture"}"#).unwrap();
        assert_eq!(def.version, 1);
        assert_eq!(def.logic, PacketLogic::default());
        assert!(def.parameter_schema.is_null());
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["to=warehouse".to_string(), "query=a=b".to_string()]).unwrap();
        assert_eq!(params["to"], "warehouse");
        assert_eq!(params["query"], "a=b");
        assert!(parse_params(&["novalue".to_string()]).is_err());
        assert!(parse_params(&["=x".to_string()]).is_err());
        assert!(parse_params(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("signed").unwrap(), PacketStatus::Signed);
        assert!(parse_status("pending").is_err());
    }
}
