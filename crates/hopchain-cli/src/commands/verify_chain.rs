// crates/hopchain-cli/src/commands/verify_chain.rs
//
// `hopchain verify-chain --session <id>`: recompute a stored session's chain.

use clap::Args;
use tabled::Tabled;

use hopchain_verify::{ChainVerifier, HopFailure, VerificationReport};

use crate::config::HopchainConfig;
use crate::output::{format_json, format_table, short_hash, OutputFormat};
use crate::repository;

#[derive(Debug, Args)]
pub struct VerifyChainCmd {
    /// Session UUID.
    #[arg(long)]
    pub session: String,
}

#[derive(Tabled)]
struct HopRow {
    #[tabled(rename = "Index")]
    index: u64,
    #[tabled(rename = "Prev hash")]
    prev_hash: String,
    #[tabled(rename = "Hash")]
    hash: String,
    #[tabled(rename = "Status")]
    status: String,
}

pub fn describe_failure(failure: &HopFailure) -> String {
    match failure {
        HopFailure::Gap { expected, found } => format!("gap (expected {}, found {})", expected, found),
        HopFailure::OutOfOrder { expected, found } => {
            format!("out_of_order (expected {}, found {})", expected, found)
        }
        HopFailure::PrevHashMismatch => "prev_hash_mismatch".to_string(),
        HopFailure::HashMismatch => "hash_mismatch".to_string(),
    }
}

/// Print a verification report as a table or JSON.
pub fn print_report(report: &VerificationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", format_json(report)),
        OutputFormat::Table => {
            let rows: Vec<HopRow> = report
                .results
                .iter()
                .map(|r| HopRow {
                    index: r.hop_index,
                    prev_hash: short_hash(&r.actual_prev_hash),
                    hash: short_hash(&r.actual_hash),
                    status: if r.is_clean() {
                        "ok".to_string()
                    } else {
                        r.failures
                            .iter()
                            .map(describe_failure)
                            .collect::<Vec<_>>()
                            .join(", ")
                    },
                })
                .collect();
            println!("{}", format_table(&rows));
            println!();
            println!(
                "Chain valid: {}  |  Hops: {}  |  Failing: {}",
                report.is_valid, report.hop_count, report.failing_hops
            );
            if let Some(hash) = &report.computed_chain_hash {
                println!("Recomputed chain hash: {}", hash);
            }
        }
    }
}

pub async fn run(
    cmd: &VerifyChainCmd,
    config: &HopchainConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let session_id = super::parse_session_id(&cmd.session)?;
    let repo = repository::open(config)?;

    let report = ChainVerifier::new(super::crypto())
        .verify_session(repo.as_ref(), &session_id)
        .await?;
    print_report(&report, format);

    if !report.is_valid {
        return Err(format!("hop chain of session {} failed verification", session_id).into());
    }
    Ok(())
}
