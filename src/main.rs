//! PII Redaction CLI Application.
//!
//! Command-line interface for the piiredact library: redacts detected PII
//! from PDFs, and exposes the extraction and detection stages for
//! inspection.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

use piiredact::domain::category_labels;
use piiredact::logging::init_tracing;
use piiredact::{
    config::clamp_threshold, Category, DocumentReport, MatchMode, PipelineConfig, RedactionMethod,
    RedactionService,
};

/// PII Redaction Tool
///
/// Detects personal information in PDF documents and removes it from both
/// the text layer and embedded images.
#[derive(Parser)]
#[command(name = "piiredact")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input PDF file path (can be specified multiple times)
    #[arg(short, long, value_name = "FILE")]
    input: Vec<PathBuf>,

    /// Output PDF file path (single input only)
    #[arg(short, long, value_name = "FILE", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Directory receiving `<stem>_redacted.pdf` for each input
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Keyword, or pattern in regex mode (can be specified multiple times)
    #[arg(short, long, value_name = "KEYWORD")]
    keyword: Vec<String>,

    /// Keyword matching mode: exact, fuzzy or regex
    #[arg(long, value_name = "MODE")]
    match_mode: Option<MatchMode>,

    /// Similarity threshold for fuzzy matching (0-100)
    #[arg(long, value_name = "SCORE")]
    fuzzy_threshold: Option<u32>,

    /// Recognizer category to enable (can be specified multiple times)
    #[arg(short, long, value_name = "CATEGORY")]
    category: Vec<Category>,

    /// Redaction method: erase, mask or replace
    #[arg(short, long, value_name = "METHOD")]
    method: Option<RedactionMethod>,

    /// Text drawn by the replace method
    #[arg(long, value_name = "TEXT")]
    replace_text: Option<String>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the text detection runs on (page text and image OCR)
    Extract {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output text file (optional, defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print accepted spans of a text file (or stdin) as JSON
    Detect {
        /// Text file; reads stdin when omitted
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Keyword (can be specified multiple times)
        #[arg(short, long, value_name = "KEYWORD")]
        keyword: Vec<String>,

        /// Keyword matching mode: exact, fuzzy or regex
        #[arg(long, value_name = "MODE")]
        match_mode: Option<MatchMode>,
    },

    /// List recognizer categories and the default selection
    Categories,
}

impl Cli {
    /// Configuration file values overridden by explicit flags.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if !self.keyword.is_empty() {
            config.keywords = self.keyword.clone();
        }
        if let Some(mode) = self.match_mode {
            config.match_mode = mode;
        }
        if let Some(threshold) = self.fuzzy_threshold {
            config.fuzzy_threshold = clamp_threshold(threshold);
        }
        if !self.category.is_empty() {
            config.enabled_categories = Some(self.category.clone());
        }
        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(text) = &self.replace_text {
            config.replacement_text = text.clone();
        }
        Ok(config)
    }
}

/// Command handler owning the configured service.
struct RedactionHandler {
    service: RedactionService,
    verbose: bool,
}

impl RedactionHandler {
    fn new(config: PipelineConfig, verbose: bool) -> Self {
        Self {
            service: RedactionService::from_config(config),
            verbose,
        }
    }

    fn redact_one(&self, input: &Path, output: &Path) -> Result<()> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }

        if self.verbose {
            println!("Input:  {}", input.display());
            println!("Output: {}", output.display());
            println!("Method: {}", self.service.config().method);
        }

        let report = self
            .service
            .redact_document(input, output)
            .with_context(|| format!("Redaction failed for {}", input.display()))?;
        self.report(input, output, &report);
        Ok(())
    }

    fn redact_many(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<()> {
        let entries = self
            .service
            .redact_batch(inputs, output_dir)
            .with_context(|| format!("Failed to prepare {}", output_dir.display()))?;

        let mut failed = 0;
        for entry in &entries {
            match &entry.outcome {
                Ok(report) => self.report(&entry.input, &entry.output, report),
                Err(e) => {
                    failed += 1;
                    eprintln!("✗ {}: {}", entry.input.display(), e);
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{} of {} document(s) failed", failed, entries.len());
        }
        Ok(())
    }

    fn report(&self, input: &Path, output: &Path, report: &DocumentReport) {
        let result = &report.result;

        if self.verbose {
            println!("\nRedaction Summary for {}:", input.display());
            println!("  Terms detected:     {}", report.terms.len());
            println!("  Pages processed:    {}", result.pages_processed);
            println!("  Pages modified:     {}", result.pages_modified);
            println!("  Instances redacted: {}", result.instances_redacted);
            println!("  Images processed:   {}", result.images_processed);
            println!("  Images modified:    {}", result.images_modified);
            for gap in &result.unresolved {
                println!("  Not found on page {}: {}", gap.page + 1, gap.term);
            }
            for failure in &result.image_failures {
                println!("  Image skipped: {}", failure);
            }
        }

        if result.has_redactions() {
            println!(
                "✓ Successfully redacted {} instance(s) and {} image(s) → {}",
                result.instances_redacted,
                result.images_modified,
                output.display()
            );
        } else {
            println!("⚠ No instances found to redact → {}", output.display());
        }
    }

    fn extract(&self, input: &Path, output: Option<&Path>) -> Result<()> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }

        let text = self
            .service
            .extract_text(input)
            .with_context(|| "Text extraction failed")?;

        if let Some(output_path) = output {
            std::fs::write(output_path, &text)
                .with_context(|| format!("Failed to write to {}", output_path.display()))?;
            println!(
                "✓ Extracted {} characters → {}",
                text.len(),
                output_path.display()
            );
        } else {
            println!("{}", text);
        }

        Ok(())
    }

    fn detect(&self, input: Option<&Path>) -> Result<()> {
        let text = match input {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read stdin")?;
                buffer
            }
        };

        let spans = self.service.detect(&text);
        println!("{}", serde_json::to_string_pretty(&spans)?);
        Ok(())
    }
}

fn print_categories() {
    let defaults = Category::defaults();
    for (category, label) in category_labels() {
        let marker = if defaults.contains(category) { "*" } else { " " };
        println!("{} {:<16} {}", marker, category.as_str(), label);
    }
    println!("\n* enabled by default");
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Some(Commands::Categories) => print_categories(),
        Some(Commands::Extract { input, output }) => {
            let handler = RedactionHandler::new(cli.pipeline_config()?, cli.verbose);
            handler.extract(input, output.as_deref())?;
        }
        Some(Commands::Detect {
            input,
            keyword,
            match_mode,
        }) => {
            let mut config = cli.pipeline_config()?;
            if !keyword.is_empty() {
                config.keywords = keyword.clone();
            }
            if let Some(mode) = match_mode {
                config.match_mode = *mode;
            }
            RedactionHandler::new(config, cli.verbose).detect(input.as_deref())?;
        }
        None => {
            if cli.input.is_empty() {
                anyhow::bail!("--input is required");
            }
            let handler = RedactionHandler::new(cli.pipeline_config()?, cli.verbose);

            match (&cli.output, &cli.output_dir) {
                (Some(output), _) => {
                    if cli.input.len() > 1 {
                        anyhow::bail!("--output accepts a single input; use --output-dir");
                    }
                    handler.redact_one(&cli.input[0], output)?;
                }
                (None, Some(dir)) => handler.redact_many(&cli.input, dir)?,
                (None, None) => anyhow::bail!("--output or --output-dir is required"),
            }
        }
    }

    Ok(())
}
