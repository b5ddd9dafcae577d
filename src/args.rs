use crate::report::LogFormat;
use clap::{builder::PossibleValuesParser, ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use strum::VariantNames;

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Turn debugging information on
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub verbose: u8,
    /// Less verbose output
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub quiet: u8,
    /// Format of log lines and progress events
    #[arg(
        long,
        global = true,
        default_value = "text",
        value_parser(PossibleValuesParser::new(LogFormat::VARIANTS))
    )]
    pub log_format: String,
    /// Append log output to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
    /// Don't prefix log lines with a timestamp
    #[arg(long, global = true)]
    pub no_log_time: bool,
    #[command(subcommand)]
    pub subcommand: SubCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// Upgrade, replace or ignore vulnerable dependencies until nancy is happy
    Fix(Fix),
}

#[derive(Debug, Parser)]
pub struct Fix {
    /// Go project to fix (defaults to the current directory)
    #[arg(short = 'C', long, value_name = "PATH")]
    pub dir: Option<PathBuf>,
    /// Suppression file to maintain (defaults to .nancy-ignore inside the project)
    #[arg(long, value_name = "PATH")]
    pub ignore_file: Option<PathBuf>,
    /// Stop after processing this many vulnerable packages
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_fix_args() -> anyhow::Result<()> {
        let args = Args::try_parse_from([
            "nancy-fixer",
            "-vv",
            "fix",
            "--dir",
            "/src/app",
            "--max-iterations",
            "5",
            "--log-format",
            "json",
        ])?;
        assert_eq!(args.verbose, 2);
        assert_eq!(args.log_format, "json");
        let SubCommand::Fix(fix) = args.subcommand;
        assert_eq!(fix.dir, Some(PathBuf::from("/src/app")));
        assert_eq!(fix.ignore_file, None);
        assert_eq!(fix.max_iterations, Some(5));
        Ok(())
    }

    #[test]
    fn test_reject_unknown_log_format() {
        assert!(Args::try_parse_from(["nancy-fixer", "--log-format", "xml", "fix"]).is_err());
    }
}
