//! PDD Generator - Process Documentation from Screen Recordings
//!
//! Drives the analyze → extract → assemble pipeline over a recorded video.

use pdd_generator::analysis::{GeminiAnalyzer, ProcessAnalyzer};
use pdd_generator::app::cli::{Cli, Commands};
use pdd_generator::app::config::Config;
use pdd_generator::assemble::DocumentAssembler;
use pdd_generator::extract::FrameExtractor;
use pdd_generator::model::{parse_analysis, AnalysisSchema, DocumentSections, Step};
use pdd_generator::pipeline::Pipeline;
use pdd_generator::Error;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else {
        Config::load_default()?
    };

    match cli.command {
        Commands::Run {
            video,
            output_dir,
            project_name,
            author,
        } => {
            run_pipeline(&video, output_dir, project_name, author, config)?;
        }
        Commands::Analyze { video, output } => {
            run_analyze(&video, output, &config)?;
        }
        Commands::Extract {
            video,
            analysis,
            output_dir,
        } => {
            run_extract(&video, analysis, output_dir, &config)?;
        }
        Commands::Assemble {
            analysis,
            screenshots,
        } => {
            run_assemble(analysis, screenshots, &config)?;
        }
        Commands::Init { force } => {
            run_init(force, &config)?;
        }
    }

    Ok(())
}

fn run_pipeline(
    video: &Path,
    output_dir: Option<PathBuf>,
    project_name: Option<String>,
    author: Option<String>,
    mut config: Config,
) -> anyhow::Result<()> {
    if !video.exists() {
        anyhow::bail!("Video file not found: {}", video.display());
    }

    // CLI overrides for the document header
    if project_name.is_some() {
        config.project.project_name = project_name;
    }
    if author.is_some() {
        config.project.author_name = author;
    }

    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)?;
    }
    let paths = config.output.run_paths(output_dir.as_deref());

    let analyzer = GeminiAnalyzer::new(config.analysis.to_gemini())?;
    let pipeline = Pipeline::new(
        analyzer,
        FrameExtractor::new(),
        DocumentAssembler::new(config.project.clone()),
    );

    info!("starting pipeline for {}", video.display());
    let result = pipeline.run(video, &paths)?;

    println!("\nPDD Generated Successfully!");
    println!("  Document:    {}", result.document_path.display());
    match &result.diagram_path {
        Some(path) => println!("  Diagram:     {}", path.display()),
        None => println!("  Diagram:     (not produced)"),
    }
    if let Some(path) = &result.steps_json_path {
        println!("  Step data:   {}", path.display());
    }
    println!("  Screenshots: {}", result.screenshot_dir.display());
    println!(
        "  Extraction:  {} extracted, {} skipped, {} errors",
        result.extract_stats.extracted, result.extract_stats.skipped, result.extract_stats.errors
    );
    if result.missing_screenshots > 0 {
        println!(
            "  Warning: {} step(s) are missing screenshots; see the document for details",
            result.missing_screenshots
        );
    }

    Ok(())
}

fn run_analyze(video: &Path, output: Option<PathBuf>, config: &Config) -> anyhow::Result<()> {
    if !video.exists() {
        anyhow::bail!("Video file not found: {}", video.display());
    }

    let analyzer = GeminiAnalyzer::new(config.analysis.to_gemini())?;
    let report = analyzer.analyze(video)?;

    let output = output.unwrap_or_else(|| config.output.analysis_json.clone());
    std::fs::write(&output, serde_json::to_string_pretty(&report.raw)?)?;

    println!("Analysis complete: {} steps", report.steps.len());
    println!("  Saved to: {}", output.display());
    Ok(())
}

fn run_extract(
    video: &Path,
    analysis: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    config: &Config,
) -> anyhow::Result<()> {
    if !video.exists() {
        anyhow::bail!("Video file not found: {}", video.display());
    }

    let analysis_path = analysis.unwrap_or_else(|| config.output.analysis_json.clone());
    let (steps, _) = load_analysis(&analysis_path, config.analysis.schema)?;
    info!("loaded {} steps from {}", steps.len(), analysis_path.display());

    let output_dir = output_dir.unwrap_or_else(|| config.output.screenshot_dir.clone());
    let stats = FrameExtractor::new().extract(&steps, video, &output_dir)?;

    println!(
        "Extraction finished: {} extracted, {} skipped, {} errors",
        stats.extracted, stats.skipped, stats.errors
    );
    if !stats.is_success() {
        anyhow::bail!("Extraction completed with {} errors", stats.errors);
    }
    Ok(())
}

fn run_assemble(
    analysis: Option<PathBuf>,
    screenshots: Option<PathBuf>,
    config: &Config,
) -> anyhow::Result<()> {
    let analysis_path = analysis.unwrap_or_else(|| config.output.analysis_json.clone());
    let (steps, sections) = load_analysis(&analysis_path, config.analysis.schema)?;

    let screenshot_dir = screenshots.unwrap_or_else(|| config.output.screenshot_dir.clone());
    if !screenshot_dir.is_dir() {
        warn!(
            "screenshot directory {} not found; the document will carry missing-screenshot warnings",
            screenshot_dir.display()
        );
    }

    let paths = config.output.run_paths(None);
    let assembler = DocumentAssembler::new(config.project.clone());
    let report = assembler.assemble(&sections, &steps, &screenshot_dir, &paths.outputs)?;

    println!("Document assembled: {}", report.document_path.display());
    if let Some(diagram) = &report.diagram_path {
        println!("  Diagram: {}", diagram.display());
    }
    if report.missing_screenshots > 0 {
        println!(
            "  Warning: {} step(s) are missing screenshots",
            report.missing_screenshots
        );
    }
    Ok(())
}

fn run_init(force: bool, config: &Config) -> anyhow::Result<()> {
    let config_path = Config::default_path();

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    config.save(&config_path)?;
    println!("Created config at {}", config_path.display());
    println!("\nConfig content:\n{}", config.to_toml()?);
    Ok(())
}

/// Load and parse a saved analysis dump. A missing file is a fatal-input
/// error: the standalone phases depend on the analyze phase's artifact.
fn load_analysis(
    path: &Path,
    schema: AnalysisSchema,
) -> Result<(Vec<Step>, DocumentSections), Error> {
    if !path.exists() {
        return Err(Error::MissingArtifact(format!(
            "analysis file not found: {} (run 'pdd-gen analyze' first)",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let raw: serde_json::Value = serde_json::from_str(&content)?;
    Ok(parse_analysis(&raw, schema))
}
