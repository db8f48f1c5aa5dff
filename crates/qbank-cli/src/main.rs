//! qbank - export question lists to printable documents

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use eyre::Result;
use qbank_core::models::export::{ExportConfiguration, ExportFlow};
use qbank_core::models::list::ListId;
use qbank_core::models::render::RenderResult;
use qbank_core::models::report::{ExportReport, ExportStatus};
use qbank_export::template::TemplateRegistry;
use qbank_export::{CancelToken, Exporter, export_in_background};
use qbank_store::JsonStore;
use tracing::warn;

use qbank_cli::config::{self, QbankConfig};

#[derive(Parser)]
#[command(name = "qbank")]
#[command(version, about = "Export question lists to printable documents", long_about = None)]
#[command(after_help = "EXAMPLES:
    qbank init-config                        Write a default settings file
    qbank export week-3 --solutions          Compile list week-3 with solutions
    qbank export week-3 --manual --seed 7    Write a shuffled .tex without compiling")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export one list
    Export(ExportArgs),
    /// List available document templates
    Templates,
    /// Write a settings file with default paths
    InitConfig {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// List identifier
    list_id: String,

    /// Template id
    #[arg(short, long, default_value = "default")]
    template: String,

    /// Number of columns (1 or 2)
    #[arg(long, default_value_t = 1)]
    columns: u8,

    /// Leave out the answer key
    #[arg(long)]
    no_answer_key: bool,

    /// Append worked solutions
    #[arg(long)]
    solutions: bool,

    /// Reserve this many lines under free-response questions
    #[arg(long, value_name = "LINES")]
    answer_space: Option<u32>,

    /// Shuffle question order
    #[arg(long)]
    randomize: bool,

    /// Swap questions for linked alternate versions
    #[arg(long)]
    substitute_versions: bool,

    /// Seed for shuffling and substitution
    #[arg(long)]
    seed: Option<u64>,

    /// Default image scale
    #[arg(long, value_name = "SCALE")]
    image_scale: Option<f64>,

    /// Write the .tex source only
    #[arg(long)]
    manual: bool,

    /// Output file name without extension
    #[arg(short, long, value_name = "NAME")]
    output_name: Option<String>,

    /// Template field, repeatable (e.g. --field Instructor="Ms. Smith")
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

impl ExportArgs {
    fn configuration(&self) -> ExportConfiguration {
        let defaults = ExportConfiguration::default();
        ExportConfiguration {
            columns: self.columns,
            include_answer_key: !self.no_answer_key,
            include_solutions: self.solutions,
            space_for_answers: self.answer_space.is_some(),
            answer_space_lines: self.answer_space.unwrap_or(defaults.answer_space_lines),
            randomize: self.randomize,
            substitute_versions: self.substitute_versions,
            seed: self.seed,
            image_scale_default: self.image_scale.unwrap_or(defaults.image_scale_default),
            template: self.template.clone(),
            flow: if self.manual {
                ExportFlow::Manual
            } else {
                ExportFlow::Direct
            },
            base_filename: self.output_name.clone(),
            template_fields: self.fields.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }
}

fn parse_field(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.trim().is_empty() {
        return Err("field name cannot be empty".to_string());
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };

    match cli.command {
        Command::InitConfig { force } => init_config(&config_path, force),
        Command::Templates => {
            let settings = config::load_config(&config_path)?;
            for id in TemplateRegistry::new(settings.templates_dir).list() {
                println!("{id}");
            }
            Ok(())
        }
        Command::Export(args) => {
            let settings = config::load_config(&config_path)?;
            export(&settings, &args).await
        }
    }
}

fn init_config(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(eyre::eyre!(
            "{} already exists; pass --force to overwrite",
            path.display()
        ));
    }

    let settings = QbankConfig::under(&config::default_data_home()?);
    for dir in [&settings.data_dir, &settings.image_root, &settings.export_dir] {
        std::fs::create_dir_all(dir)?;
    }
    config::save_config(path, &settings)?;
    println!("wrote {}", path.display());
    Ok(())
}

async fn export(settings: &QbankConfig, args: &ExportArgs) -> Result<()> {
    let store = JsonStore::new(&settings.data_dir);
    let exporter = Arc::new(Exporter::new(
        store,
        settings.engine(),
        settings.exporter_settings(),
    )?);

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping the engine");
            on_interrupt.cancel();
        }
    });

    let report = export_in_background(
        exporter,
        ListId::new(args.list_id.clone()),
        args.configuration(),
        cancel,
    )
    .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    match &report.outcome {
        RenderResult::Failed { diagnostics, .. } => {
            eprintln!("{diagnostics}");
            Err(eyre::eyre!("compilation failed"))
        }
        _ => Ok(()),
    }
}

fn print_summary(report: &ExportReport) {
    let status = match report.status() {
        ExportStatus::Succeeded => "succeeded",
        ExportStatus::SucceededWithOmissions => "succeeded with omissions",
        ExportStatus::Failed => "failed",
    };
    println!("export {status}: {} questions", report.question_count);

    match &report.outcome {
        RenderResult::Compiled { output_path } => println!("document: {}", output_path.display()),
        RenderResult::SourceWritten { source_path } => println!("source: {}", source_path.display()),
        RenderResult::Failed {
            reason,
            source_path,
            ..
        } => println!("{reason:?}; source kept at {}", source_path.display()),
    }

    if let Some(seed) = report.seed {
        println!("seed: {seed}");
    }
    for sub in &report.substitutions {
        println!(
            "position {}: {} replaced by {}",
            sub.position + 1,
            sub.original,
            sub.replacement
        );
    }
    if !report.warnings.is_empty() {
        println!("{} warnings (see log)", report.warnings.len());
    }
}
