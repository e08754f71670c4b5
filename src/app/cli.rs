//! Command-Line Interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// PDD Generator - Draft a Process Description Document from a screen recording
#[derive(Parser, Debug)]
#[command(name = "pdd-gen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline: analyze, extract screenshots, assemble the PDD
    Run {
        /// Video file to process
        video: PathBuf,

        /// Directory to place all artifacts under
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Project name for the document header
        #[arg(long)]
        project_name: Option<String>,

        /// Author name for the document header
        #[arg(long)]
        author: Option<String>,
    },

    /// Analyze a video and save the raw structured result
    Analyze {
        /// Video file to analyze
        video: PathBuf,

        /// Where to save the analysis JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract per-step screenshots from a saved analysis
    Extract {
        /// Video file the analysis was produced from
        video: PathBuf,

        /// Saved analysis JSON (defaults to the configured dump path)
        #[arg(short, long)]
        analysis: Option<PathBuf>,

        /// Screenshot output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Assemble the document from a saved analysis and screenshot directory
    Assemble {
        /// Saved analysis JSON (defaults to the configured dump path)
        #[arg(short, long)]
        analysis: Option<PathBuf>,

        /// Screenshot directory (defaults to the configured path)
        #[arg(short, long)]
        screenshots: Option<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_parses() {
        let cli = Cli::try_parse_from(["pdd-gen", "run", "video.mp4", "--output-dir", "out"])
            .unwrap();
        match cli.command {
            Commands::Run {
                video, output_dir, ..
            } => {
                assert_eq!(video, PathBuf::from("video.mp4"));
                assert_eq!(output_dir, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["pdd-gen", "-v", "-c", "my.toml", "analyze", "v.mkv"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
    }

    #[test]
    fn test_video_argument_is_required() {
        assert!(Cli::try_parse_from(["pdd-gen", "run"]).is_err());
    }
}
