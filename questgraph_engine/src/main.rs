#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! CLI entry point for questgraph.
//! Usage: questgraph <records.ron> [--config <file.toml>] [--out <file.ron>]

use std::path::PathBuf;
use std::{env, process};

use anyhow::{Context, Result};
use colored::Colorize;
use log::{info, warn};

use questgraph_data::validate_records;
use questgraph_engine::{AnalysisConfig, AnalysisOutput, QUESTGRAPH_VERSION, analyze, load_config, load_records, save_output};

const USAGE: &str = "Usage: questgraph <records.ron> [--config <file.toml>] [--out <file.ron>]";

struct Args {
    records: PathBuf,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let mut records = None;
    let mut config = None;
    let mut out = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "--out" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("{} requires a filepath", args[i]);
                    return None;
                };
                if args[i] == "--config" {
                    config = Some(PathBuf::from(value));
                } else {
                    out = Some(PathBuf::from(value));
                }
                i += 2;
                continue;
            },
            "--" => {},
            other if records.is_none() => records = Some(PathBuf::from(other)),
            other => eprintln!("ignoring extra argument '{other}'"),
        }
        i += 1;
    }
    Some(Args {
        records: records?,
        config,
        out,
    })
}

fn print_summary(output: &AnalysisOutput) {
    println!("{} {}", "questgraph".bright_yellow().bold(), QUESTGRAPH_VERSION);
    for quest in output.quests.values() {
        let edges: usize = quest.stages.values().map(|s| s.next.len()).sum();
        let name = quest.name.as_deref().unwrap_or("");
        println!(
            "  {:<32} {:>3} stages {:>3} links {:>2} givers  {}",
            quest.id.bright_blue(),
            quest.stages.len(),
            edges,
            quest.givers.len(),
            name.italic()
        );
    }
    println!(
        "{} quests, {} objects",
        output.quests.len().to_string().bold(),
        output.objects.len().to_string().bold()
    );
    let missing = output.diagnostics.missing_references();
    let notes = output.diagnostics.len() - missing;
    if missing > 0 {
        println!("{}", format!("{missing} broken references").red());
    }
    if notes > 0 {
        println!("{}", format!("{notes} conditions not fully understood").yellow());
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(args) = parse_args(&args) else {
        eprintln!("{USAGE}");
        process::exit(2);
    };

    let config = args
        .config
        .as_deref()
        .map_or_else(AnalysisConfig::default, load_config);
    let records = load_records(&args.records).context("while loading game records")?;
    info!(
        "{} dialogue topics, {} scripts, {} actors, {} cells loaded",
        records.dialogues.len(),
        records.scripts.len(),
        records.actors.len(),
        records.cells.len()
    );

    let errors = validate_records(&records);
    if !errors.is_empty() {
        for error in &errors {
            warn!("{error}");
        }
        eprintln!("{}", format!("{} record problems found (see log)", errors.len()).yellow());
    }

    let output = analyze(&records, &config);
    for diagnostic in &output.diagnostics {
        diagnostic.log();
    }
    print_summary(&output);

    if let Some(out) = &args.out {
        save_output(&output, out)?;
        info!("analysis written to '{}'", out.display());
    }
    Ok(())
}
