use clap::{CommandFactory, Parser};
use env_logger::{Env, Target};
use nancy_fixer::args::{Args, Fix, SubCommand};
use nancy_fixer::errors::*;
use nancy_fixer::fix::Fixer;
use nancy_fixer::gomod::GoModules;
use nancy_fixer::ignore::DEFAULT_IGNORE_PATH;
use nancy_fixer::nancy::Nancy;
use nancy_fixer::report::{json_log_line, LogFormat};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process;

fn log_level(verbose: u8, quiet: u8) -> &'static str {
    match i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o640);
    }
    options
        .open(path)
        .with_context(|| anyhow!("Failed to open log file {:?}", path))
}

fn init_logger(args: &Args, format: LogFormat) -> Result<()> {
    let log_level = log_level(args.verbose, args.quiet);
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(log_level));

    if args.no_log_time {
        builder.format_timestamp(None);
    }

    if format == LogFormat::Json {
        let with_time = !args.no_log_time;
        builder.format(move |buf, record| {
            let ts = with_time.then(|| buf.timestamp().to_string());
            let line = json_log_line(
                record.level().as_str(),
                record.target(),
                record.args().to_string(),
                ts,
            );
            writeln!(buf, "{}", line)
        });
    }

    if let Some(path) = &args.log_file {
        let file = open_log_file(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("Failed to initialize logger")?;
    Ok(())
}

async fn fix(fix: Fix, format: LogFormat) -> Result<()> {
    let cwd = env::current_dir().context("Failed to determine current directory")?;
    let dir = match fix.dir {
        Some(dir) => cwd.join(dir),
        None => cwd.clone(),
    };
    let ignore_file = match fix.ignore_file {
        Some(path) => cwd.join(path),
        None => dir.join(DEFAULT_IGNORE_PATH),
    };
    info!("Fixing vulnerable dependencies of {:?}", dir);
    debug!("Using ignore file {:?}", ignore_file);

    let scanner = Nancy::new(&dir, &ignore_file);
    let modules = GoModules::new(&dir);
    let reporter = format.reporter();

    let fixer = Fixer {
        dir,
        ignore_file,
        max_iterations: fix.max_iterations,
        scanner: &scanner,
        modules: &modules,
        reporter: reporter.as_ref(),
    };
    let summary = fixer.run().await?;

    if summary.not_fixed > 0 {
        warn!("{} vulnerable packages could not be handled", summary.not_fixed);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    // clap already restricted the value to one of the variants
    let format = args.log_format.parse().unwrap_or(LogFormat::Text);

    if let Err(err) = init_logger(&args, format) {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }

    let result = match args.subcommand {
        SubCommand::Fix(args) => fix(args, format).await,
    };

    if let Err(err) = result {
        error!("{:#}", err);
        // keep the scanner diagnostics as the last thing on screen
        if !is_scan_unparsable(&err) {
            eprintln!("{}", Args::command().render_usage());
        }
        process::exit(1);
    }
}
