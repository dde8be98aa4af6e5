//! CLI argument definitions using clap.
//!
//! Flag names follow the original cleanup script so existing pipelines can
//! switch binaries without rewriting their invocations.

use artsweep::report::SummaryFormat;
use clap::Parser;
use std::path::PathBuf;

/// artsweep - delete old artifacts from all Artifactory repositories
#[derive(Parser, Debug)]
#[command(name = "artsweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Artifactory base URL
    #[arg(long, value_name = "URL")]
    pub artifactory_url: String,

    /// Access token, sent as a bearer token on every request
    #[arg(long, env = "ARTIFACTORY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Retention window (e.g. 90d, 3mo, 1y)
    #[arg(long, value_name = "AGE")]
    pub older_than: String,

    /// Exclusions JSON file ({"patterns": [...]}) with glob-style patterns.
    /// `*` stays within one path segment; use `**` to match across `/`
    #[arg(long, value_name = "PATH")]
    pub exclusions_file: PathBuf,

    /// AQL query or file spec (e.g. aql-filespec.json)
    #[arg(long, value_name = "PATH")]
    pub aql_spec: PathBuf,

    /// List deletions without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Number of parallel deletion workers (overrides config)
    #[arg(long, visible_alias = "workers", value_name = "N")]
    pub threads: Option<usize>,

    /// Candidates per query page (overrides config)
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Summary output format
    #[arg(long, value_enum, default_value_t = SummaryFormat::Text)]
    pub format: SummaryFormat,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const REQUIRED: [&str; 11] = [
        "artsweep",
        "--artifactory-url",
        "https://repo.example.com/artifactory",
        "--access-token",
        "tok",
        "--older-than",
        "90d",
        "--exclusions-file",
        "exclusions.json",
        "--aql-spec",
        "aql-filespec.json",
    ];

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(REQUIRED.iter().chain(extra.iter()).copied())
    }

    #[test]
    fn test_required_args() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.artifactory_url, "https://repo.example.com/artifactory");
        assert_eq!(cli.access_token, "tok");
        assert_eq!(cli.older_than, "90d");
        assert_eq!(cli.exclusions_file, PathBuf::from("exclusions.json"));
        assert_eq!(cli.aql_spec, PathBuf::from("aql-filespec.json"));
        assert!(!cli.dry_run);
        assert!(cli.threads.is_none());
        assert_eq!(cli.format, SummaryFormat::Text);
        assert!(!cli.is_verbose());
    }

    #[test]
    fn test_missing_required_fails() {
        assert!(Cli::try_parse_from(["artsweep", "--older-than", "90d"]).is_err());
    }

    #[test]
    fn test_dry_run_and_threads() {
        let cli = parse(&["--dry-run", "--threads", "8"]).unwrap();
        assert!(cli.dry_run);
        assert_eq!(cli.threads, Some(8));

        let cli = parse(&["--workers", "2"]).unwrap();
        assert_eq!(cli.threads, Some(2));
    }

    #[test]
    fn test_negative_threads_rejected() {
        assert!(parse(&["--threads", "-1"]).is_err());
    }

    #[test]
    fn test_format_json() {
        let cli = parse(&["--format", "json", "-v"]).unwrap();
        assert_eq!(cli.format, SummaryFormat::Json);
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_config_option() {
        let cli = parse(&["-c", "/path/to/artsweep.yml", "--page-size", "250"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/artsweep.yml")));
        assert_eq!(cli.page_size, Some(250));
    }

    #[test]
    fn test_help_works() {
        // Verify help doesn't panic
        Cli::command().debug_assert();
    }
}
