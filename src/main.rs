use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use docextract::config;
use docextract::pipeline::query::{missing_models, LlmClient, OllamaClient};
use docextract::pipeline::schema::{build_schema, parse_field_specs};
use docextract::{init_tracing, run_pipeline, ExtractorConfig, PipelineKind, PipelineRequest};

#[derive(Parser)]
#[command(name = "docextract", version, about = "Extract declared fields from documents with a local LLM")]
struct Cli {
    /// Configuration file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract fields from a document and print them as JSON
    Run(RunArgs),
    /// List models available on the Ollama server
    Models(ModelsArgs),
    /// Print the JSON Schema built from field declarations
    Schema(FieldArgs),
}

#[derive(clap::Args)]
struct FieldArgs {
    /// Comma-separated field names, e.g. "name,amounts"
    #[arg(long, value_delimiter = ',', required = true)]
    fields: Vec<String>,

    /// Field types aligned with --fields. Use ';' between types when a
    /// token itself contains a comma.
    #[arg(long, value_delimiter = ';', required = true)]
    types: Vec<String>,
}

#[derive(clap::Args)]
struct ModelsArgs {
    /// Fail unless every configured model is served
    #[arg(long)]
    check: bool,
}

#[derive(clap::Args)]
struct RunArgs {
    #[command(flatten)]
    fields: FieldArgs,

    /// Pipeline variant: model or index
    #[arg(long, default_value = "model")]
    pipeline: String,

    /// Query sent to the model; defaults to "retrieve <fields>"
    #[arg(long, default_value = "")]
    query: String,

    /// Document to extract from (model pipeline)
    #[arg(long, default_value = "")]
    file: PathBuf,

    /// Retrieval index to query (index pipeline)
    #[arg(long, default_value = "")]
    index: String,

    /// Options: none, "tables,html" or "tables,markdown"
    #[arg(long, value_delimiter = ',')]
    options: Vec<String>,

    /// Description of the payload, logged with the run
    #[arg(long, default_value = "")]
    payload: String,

    /// Log field partitions and raw answers
    #[arg(long)]
    debug: bool,

    /// Show a progress spinner
    #[arg(long)]
    progress: bool,
}

fn load_config(path: Option<PathBuf>) -> Result<ExtractorConfig> {
    match path {
        Some(path) => ExtractorConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => ExtractorConfig::load_or_default(&config::default_config_path())
            .context("loading default config"),
    }
}

/// Split `--types` on ';' and, when a single value was given, on commas
/// outside brackets so "str,List[float]" works too.
fn normalize_types(types: Vec<String>) -> Vec<String> {
    if types.len() != 1 {
        return types;
    }
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in types[0].chars() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    out.push(current);
    out
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let debug = matches!(&cli.command, Command::Run(args) if args.debug);
    init_tracing(debug);

    let config = load_config(cli.config)?;

    match cli.command {
        Command::Run(args) => {
            let kind: PipelineKind = args.pipeline.parse()?;
            if kind == PipelineKind::Model && args.file.as_os_str().is_empty() {
                bail!("--file is required for the model pipeline");
            }
            if kind == PipelineKind::Index && args.index.trim().is_empty() {
                bail!("--index is required for the index pipeline");
            }

            let request = PipelineRequest {
                payload: args.payload,
                field_names: args.fields.fields,
                field_types: normalize_types(args.fields.types),
                query: args.query,
                file_path: args.file,
                index_name: args.index,
                options: args.options,
                debug: args.debug,
                show_progress: args.progress,
            };
            let answer = run_pipeline(kind, &config, &request)?;
            println!("{answer}");
        }
        Command::Models(args) => {
            let client = OllamaClient::from_config(&config)?;
            if args.check {
                let missing = missing_models(&client, &config)?;
                if !missing.is_empty() {
                    bail!("models not served by {}: {}", client.base_url(), missing.join(", "));
                }
                println!("all configured models available");
            } else {
                for model in client.list_models()? {
                    println!("{model}");
                }
            }
        }
        Command::Schema(args) => {
            let types = normalize_types(args.types);
            let descriptors = parse_field_specs(&args.fields, &types)?;
            let schema = build_schema(&descriptors).to_json_schema();
            println!("{}", docextract::pipeline::format_json_output(&schema)?);
        }
    }

    Ok(())
}
