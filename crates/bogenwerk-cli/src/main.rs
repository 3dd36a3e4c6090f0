// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bogenwerk — SVG page bundling, tag-driven redaction and paginated export.
//
// Entry point. Initialises logging, loads pages and the asset pool, then runs
// one command against the resulting collection.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bogenwerk_core::config::AppConfig;
use bogenwerk_core::error::{BogenwerkError, Result};
use bogenwerk_document::{AssetResolver, DocumentCollection, PageReport, PdfExporter, TagSet};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "bogenwerk")]
#[command(version)]
#[command(about = "Bundle, redact and export SVG pages", long_about = None)]
struct Cli {
    /// JSON settings file (defaults apply to anything it leaves out)
    #[arg(long, global = true, env = "BOGENWERK_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve references and write a portable zip bundle
    Bundle {
        /// SVG pages or previously written bundles, in page order
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Directory whose files make up the asset pool
        #[arg(short, long, value_name = "DIR")]
        assets: Option<PathBuf>,

        /// Bundle to write
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Skip reference resolution
        #[arg(long)]
        no_resolve: bool,
    },

    /// Resolve references and export one PDF with redactions baked in
    Export {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, value_name = "DIR")]
        assets: Option<PathBuf>,

        /// PDF to write
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Write the per-page report as JSON
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        #[arg(long)]
        no_resolve: bool,
    },

    /// Write each page's redacted markup to a directory
    Redact {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },

    /// List the tagged elements of each page
    Tags {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "bogenwerk failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Bundle {
            inputs,
            assets,
            output,
            no_resolve,
        } => {
            let mut collection = load_collection(&inputs, assets.as_deref())?;
            if !no_resolve {
                resolve_all(&mut collection, &config).await?;
            }
            let archive = collection.export_archive()?;
            fs::write(&output, &archive.bytes)?;
            println!(
                "Wrote {} ({} pages, {} assets, {} duplicate assets skipped)",
                output.display(),
                archive.documents.len(),
                archive.assets.len(),
                archive.skipped_duplicates
            );
        }

        Commands::Export {
            inputs,
            assets,
            output,
            report,
            no_resolve,
        } => {
            let mut collection = load_collection(&inputs, assets.as_deref())?;
            if !no_resolve {
                resolve_all(&mut collection, &config).await?;
            }
            let exporter = PdfExporter::new(config.export.clone());
            let outcome = collection.export_pdf(&exporter)?;
            fs::write(&output, &outcome.pdf)?;

            for page in &outcome.pages {
                if let PageReport::Placeholder {
                    name,
                    stage,
                    reason,
                } = page
                {
                    warn!(%name, %stage, %reason, "Page replaced by placeholder");
                }
            }
            if let Some(path) = report {
                fs::write(&path, serde_json::to_string_pretty(&outcome.pages)?)?;
            }
            println!(
                "Wrote {} ({} pages, {} placeholders)",
                output.display(),
                outcome.pages.len(),
                outcome.placeholder_count()
            );
        }

        Commands::Redact { inputs, output } => {
            let collection = load_collection(&inputs, None)?;
            fs::create_dir_all(&output)?;
            for document in collection.documents() {
                let text = collection.redacted_markup(document.id)?;
                let target = output.join(file_name(&document.name));
                fs::write(&target, text)?;
                println!("{}", target.display());
            }
        }

        Commands::Tags { inputs, json } => {
            let collection = load_collection(&inputs, None)?;
            if json {
                let pages: Vec<_> = collection
                    .documents()
                    .iter()
                    .map(|document| {
                        let elements: Vec<_> = document
                            .markup
                            .tagged_elements()
                            .into_iter()
                            .map(|tagged| {
                                json!({
                                    "path": tagged.path.to_string(),
                                    "kind": tagged.kind,
                                    "tags": tagged.tags,
                                })
                            })
                            .collect();
                        json!({ "name": document.name, "elements": elements })
                    })
                    .collect();
                let known: Vec<&str> = collection.tags().names().collect();
                let value = json!({ "pages": pages, "known_tags": known });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                for document in collection.documents() {
                    println!("{}", document.name);
                    for tagged in document.markup.tagged_elements() {
                        println!(
                            "  {:<12} {:?}  {}",
                            tagged.path.to_string(),
                            tagged.kind,
                            join_tags(&tagged.tags)
                        );
                    }
                }
                let known: Vec<&str> = collection.tags().names().collect();
                println!("known tags: {}", known.join(", "));
            }
        }
    }

    Ok(())
}

/// Build a collection from SVG files and bundles, plus an optional asset
/// directory. Pages that fail to parse are skipped with a warning.
fn load_collection(inputs: &[PathBuf], assets: Option<&Path>) -> Result<DocumentCollection> {
    let mut collection = DocumentCollection::new();

    if let Some(dir) = assets {
        let mut count = 0;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if collection.add_asset(file_name(&path.to_string_lossy()), fs::read(&path)?) {
                count += 1;
            }
        }
        info!(count, dir = %dir.display(), "Asset pool loaded");
    }

    for input in inputs {
        let is_bundle = input
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_bundle {
            let ids = collection.import_archive(&fs::read(input)?)?;
            info!(bundle = %input.display(), pages = ids.len(), "Bundle imported");
            continue;
        }

        let text = fs::read_to_string(input)?;
        let name = file_name(&input.to_string_lossy());
        if let Err(err) = collection.add(name, &text) {
            warn!(input = %input.display(), %err, "Skipping page");
        }
    }

    if collection.is_empty() {
        return Err(BogenwerkError::Parse("no input page could be loaded".into()));
    }
    Ok(collection)
}

async fn resolve_all(collection: &mut DocumentCollection, config: &AppConfig) -> Result<()> {
    let resolver = AssetResolver::http(&config.resolver)?;
    let failed = collection
        .resolve_all(&resolver, |id, pct| debug!(%id, pct, "Resolution progress"))
        .await;

    for document in collection.documents() {
        for error in &document.errors {
            warn!(page = %document.name, %error, "Unresolved reference");
        }
    }
    if failed > 0 {
        warn!(failed, "Some pages failed to resolve and will be left out");
    }
    Ok(())
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_owned())
}

fn join_tags(tags: &TagSet) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn export_arguments_parse() {
        let cli = Cli::try_parse_from([
            "bogenwerk", "export", "a.svg", "b.svg", "-a", "pool", "-o", "out.pdf", "--no-resolve",
        ])
        .unwrap();
        match cli.command {
            Commands::Export {
                inputs,
                assets,
                no_resolve,
                ..
            } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(assets, Some(PathBuf::from("pool")));
                assert!(no_resolve);
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn loads_pages_and_pool_and_skips_bad_pages() {
        let dir = tempfile::tempdir().unwrap();
        let pool = dir.path().join("pool");
        fs::create_dir(&pool).unwrap();
        fs::write(pool.join("logo.png"), [1u8, 2, 3]).unwrap();
        let good = dir.path().join("good.svg");
        fs::write(&good, r#"<svg><image href="logo.png" data-tags="brand"/></svg>"#).unwrap();
        let bad = dir.path().join("bad.svg");
        fs::write(&bad, "<svg><g></svg>").unwrap();

        let collection = load_collection(&[good, bad], Some(&pool)).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.documents()[0].name, "good.svg");
        assert!(collection.pool().contains("logo.png"));
        assert!(collection.tags().contains("brand"));
    }

    #[test]
    fn nothing_loadable_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.svg");
        fs::write(&bad, "not markup").unwrap();
        assert!(load_collection(&[bad], None).is_err());
    }
}
