// crates/hopchain-cli/src/commands/verify_export.rs
//
// `hopchain verify-export --file <path>`: re-verify an export document
// without any repository access.

use std::fs;

use clap::Args;

use hopchain_export::ExportDocument;

use crate::output::{format_json, OutputFormat};

#[derive(Debug, Args)]
pub struct VerifyExportCmd {
    /// Path to an export document (JSON).
    #[arg(long)]
    pub file: String,
}

pub fn run(cmd: &VerifyExportCmd, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(&cmd.file)?;
    let document = ExportDocument::from_json(&contents)?;
    let check = document.reverify(super::crypto())?;

    match format {
        OutputFormat::Json => println!("{}", format_json(&check)),
        OutputFormat::Table => {
            println!("Export of session {}", document.session.id);
            println!(
                "  Exported at {} by {} (format {})",
                document.export_metadata.exported_at,
                document.export_metadata.exporter,
                document.export_metadata.format_version
            );
            println!("  Signature valid:      {}", check.signature_valid);
            println!("  Chain valid:          {}", check.chain_valid);
            println!("  Chain report matches: {}", check.chain_report_matches);
        }
    }

    if !check.is_valid() {
        return Err(format!("export {} failed re-verification", cmd.file).into());
    }
    Ok(())
}
