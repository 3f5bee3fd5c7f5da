// crates/hopchain-cli/src/commands/templates.rs
//
// `hopchain templates --query <intent>`: rank templates by token overlap.

use std::fs;

use clap::Args;
use tabled::Tabled;

use hopchain_core::template::Template;
use hopchain_core::traits::TemplateStore;
use hopchain_routing::find_matching_templates;

use crate::config::HopchainConfig;
use crate::output::{format_json, format_table, truncate, OutputFormat};
use crate::repository;

#[derive(Debug, Args)]
pub struct TemplatesCmd {
    /// Free-text intent to match.
    #[arg(long)]
    pub query: String,

    /// JSON array of templates. Uses the repository's templates when omitted.
    #[arg(long)]
    pub file: Option<String>,

    /// Store the templates from --file in the repository.
    #[arg(long, requires = "file")]
    pub import: bool,

    /// Minimum score to list. Defaults to the configured value.
    #[arg(long)]
    pub min_score: Option<u32>,
}

#[derive(Tabled)]
struct MatchRow {
    #[tabled(rename = "Score")]
    score: u32,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Intent")]
    intent: String,
}

pub async fn run(
    cmd: &TemplatesCmd,
    config: &HopchainConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let templates: Vec<Template> = match &cmd.file {
        Some(path) => {
            let templates: Vec<Template> = serde_json::from_str(&fs::read_to_string(path)?)?;
            if cmd.import {
                let repo = repository::open(config)?;
                for template in &templates {
                    repo.create_template(template).await?;
                }
                repository::save(config, &repo)?;
                tracing::info!("Imported {} templates from {}", templates.len(), path);
            }
            templates
        }
        None => repository::open(config)?.list_templates().await?,
    };

    let min_score = cmd.min_score.unwrap_or(config.min_template_score);
    let matches = find_matching_templates(&cmd.query, &templates, min_score);

    match format {
        OutputFormat::Json => println!("{}", format_json(&matches)),
        OutputFormat::Table => {
            if matches.is_empty() {
                println!("No templates scored {} or more.", min_score);
                return Ok(());
            }
            let rows: Vec<MatchRow> = matches
                .iter()
                .map(|m| MatchRow {
                    score: m.score,
                    id: m.template.id.clone(),
                    name: m.template.name.clone(),
                    category: m.template.category.clone(),
                    intent: truncate(&m.template.intent, 50),
                })
                .collect();
            println!("{}", format_table(&rows));
        }
    }
    Ok(())
}
