use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use donut_core::{Problem, Repo};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod output;

use output::{
    ChkinFile, ChkinOutput, ConfOutput, DoctorIssueOutput, DoctorOutput, InitOutput, LsDataEntry,
    LsDataOutput, OutputWriter,
};

/// Donut - A minimal content-addressed file store
#[derive(Parser)]
#[command(name = "donut")]
#[command(about = "Content-addressed file store", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository root (defaults to DONUT_ROOT env var or the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a repository
    Init {
        /// Directory to initialize (defaults to the repository root)
        path: Option<PathBuf>,
    },

    /// Check files or directories into the store
    Chkin {
        /// Source paths to check in
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Dataframe to store into
        #[arg(short = 'n', long)]
        dataframe: Option<String>,

        /// Recursive directory check-in (reserved, not implemented)
        #[arg(short = 'r', long)]
        recursive: bool,
    },

    /// List stored content
    LsData {
        /// Dataframe to list
        #[arg(short = 'n', long)]
        dataframe: Option<String>,

        /// Show modification times
        #[arg(short, long)]
        long: bool,
    },

    /// Check repository integrity
    Doctor,

    /// Show the compiled configuration
    Conf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let out = OutputWriter::new(cli.json);

    // Repository root: CLI arg > DONUT_ROOT env var > current directory
    let root = cli
        .root
        .or_else(|| std::env::var("DONUT_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let result = match cli.command {
        Commands::Init { path } => cmd_init(&root, path, &out),
        Commands::Chkin {
            paths,
            dataframe,
            recursive,
        } => cmd_chkin(&root, &paths, dataframe.as_deref(), recursive, &out),
        Commands::LsData { dataframe, long } => cmd_ls_data(&root, dataframe.as_deref(), long, &out),
        Commands::Doctor => cmd_doctor(&root, &out),
        Commands::Conf => cmd_conf(&out),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Recoverable repository/user errors exit 1; fatal I/O
            // failures exit 2.
            let fatal = err
                .downcast_ref::<donut_core::Error>()
                .is_some_and(|e| e.is_fatal());
            let code = if fatal { 2 } else { 1 };
            out.write_error(&err, code);
            ExitCode::from(code)
        }
    }
}

fn cmd_init(root: &Path, path: Option<PathBuf>, out: &OutputWriter) -> Result<()> {
    let target = path.unwrap_or_else(|| root.to_path_buf());

    let repo = Repo::init(&target)
        .with_context(|| format!("Failed to initialize repository at {}", target.display()))?;

    out.write(
        &InitOutput {
            success: true,
            result_code: 0,
            root: repo.root().display().to_string(),
        },
        || {
            format!(
                "{} Initialized repository at {}\n",
                output::ok_tag(),
                repo.root().display()
            )
        },
    )
}

fn cmd_chkin(
    root: &Path,
    paths: &[PathBuf],
    dataframe: Option<&str>,
    recursive: bool,
    out: &OutputWriter,
) -> Result<()> {
    if recursive {
        eprintln!(
            "{} recursive check-in is reserved and not implemented; continuing with immediate files only",
            output::tag()
        );
    }

    let repo = Repo::open(root)?;
    let outcomes = repo.check_in_all(paths, dataframe)?;

    let stored = outcomes.iter().filter(|o| o.stored).count();
    let duplicates = outcomes.len() - stored;
    let files: Vec<ChkinFile> = outcomes
        .iter()
        .map(|o| ChkinFile {
            source: o.source.display().to_string(),
            id: o.id.clone(),
            stored: o.stored,
        })
        .collect();

    out.write(
        &ChkinOutput {
            success: true,
            result_code: 0,
            dataframe: dataframe.unwrap_or(donut_core::DEFAULT_DATAFRAME).to_string(),
            stored,
            duplicates,
            files,
        },
        || {
            let mut text = String::new();
            for outcome in &outcomes {
                if outcome.stored {
                    let _ = writeln!(
                        text,
                        "{} {}  {}",
                        output::ok_tag(),
                        outcome.id,
                        outcome.source.display()
                    );
                } else {
                    let _ = writeln!(
                        text,
                        "{} {}  {} (already present)",
                        output::tag(),
                        outcome.id,
                        outcome.source.display()
                    );
                }
            }
            let _ = writeln!(
                text,
                "{} {} stored, {} already present",
                output::tag(),
                stored,
                duplicates
            );
            text
        },
    )
}

fn cmd_ls_data(
    root: &Path,
    dataframe: Option<&str>,
    long: bool,
    out: &OutputWriter,
) -> Result<()> {
    let repo = Repo::open(root)?;
    let frame = dataframe.unwrap_or(donut_core::DEFAULT_DATAFRAME).to_string();
    let entries = repo
        .ls_data(dataframe)
        .with_context(|| format!("Failed to list dataframe {frame:?}"))?;

    let listed: Vec<LsDataEntry> = entries
        .iter()
        .map(|e| {
            let modified: DateTime<Local> = e.modified.into();
            LsDataEntry {
                name: e.name.clone(),
                size: e.size,
                modified: modified.to_rfc3339(),
            }
        })
        .collect();

    out.write(
        &LsDataOutput {
            success: true,
            result_code: 0,
            dataframe: frame.clone(),
            entries: listed,
        },
        || {
            let mut text = String::new();
            for entry in &entries {
                if long {
                    let modified: DateTime<Local> = entry.modified.into();
                    let _ = writeln!(
                        text,
                        "{}\t{:>12}\t{}\t{}",
                        frame,
                        entry.size,
                        modified.format("%Y-%m-%d %H:%M:%S"),
                        entry.name
                    );
                } else {
                    let _ = writeln!(text, "{}\t{:>12}\t{}", frame, entry.size, entry.name);
                }
            }
            text
        },
    )
}

fn cmd_doctor(root: &Path, out: &OutputWriter) -> Result<()> {
    let repo = Repo::open(root)?;
    let report = repo.doctor().context("Failed to scan the data area")?;

    let issues: Vec<DoctorIssueOutput> = report
        .issues
        .iter()
        .map(|issue| DoctorIssueOutput {
            dataframe: issue.dataframe.clone(),
            name: issue.name.clone(),
            problem: match &issue.problem {
                Problem::BadName => "name is not a content identifier".to_string(),
                Problem::DigestMismatch { computed } => {
                    format!("content hashes to {computed}")
                }
                Problem::Writable => "write permission bits are set".to_string(),
            },
        })
        .collect();

    out.write(
        &DoctorOutput {
            success: true,
            result_code: 0,
            healthy: report.is_healthy(),
            checked: report.checked,
            issues: issues.clone(),
        },
        || {
            let mut text = String::new();
            let _ = writeln!(text, "{} checked {} stored files", output::tag(), report.checked);
            for issue in &issues {
                let _ = writeln!(
                    text,
                    "{} {}/{}: {}",
                    output::err_tag(),
                    issue.dataframe,
                    issue.name,
                    issue.problem
                );
            }
            if report.is_healthy() {
                let _ = writeln!(text, "{} repository is healthy", output::ok_tag());
            }
            text
        },
    )
}

fn cmd_conf(out: &OutputWriter) -> Result<()> {
    out.write(
        &ConfOutput {
            success: true,
            result_code: 0,
            page_size: donut_core::PAGE_SIZE,
            cache_line: donut_core::CACHE_LINE,
            slot_width: donut_core::SLOT_WIDTH,
            slots_per_page: donut_core::SLOTS_PER_PAGE,
            id_width: donut_core::ID_WIDTH,
            digest_size: donut_core::DIGEST_SIZE,
            block_size: donut_core::BLOCK_SIZE,
        },
        || {
            format!(
                "Page Size: {}\n\
                 Cache Line Size: {}\n\
                 Index Slot Width: {}\n\
                 Index Slots per Page: {}\n\
                 Identifier Width: {}\n\
                 Digest Size: {}\n\
                 Hash Block Size: {}\n",
                donut_core::PAGE_SIZE,
                donut_core::CACHE_LINE,
                donut_core::SLOT_WIDTH,
                donut_core::SLOTS_PER_PAGE,
                donut_core::ID_WIDTH,
                donut_core::DIGEST_SIZE,
                donut_core::BLOCK_SIZE,
            )
        },
    )
}
