//! pathwiz - create folders, repair permissions and render directory trees.
//!
//! Usage:
//!   pathwiz mkdir PATH [--mode 755] [--sub NAME]...   Create a folder
//!   pathwiz touch NAME [--in DIR]                      Create an empty file
//!   pathwiz ls [DIR] [--ext txt] [--recursive]         List files
//!   pathwiz perms PATH [--expect 750] [--fix]          Show or check permissions
//!   pathwiz tree [DIR] [--format markdown]             Render a directory tree
//!
//! Every path is resolved against `--root` (the current directory by default).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pathwiz::{
    FileManager, OutputFormat, PermissionMismatch, PermissionSpec, Subfolder, TreeConfig,
    render_json,
};

#[derive(Parser)]
#[command(
    name = "pathwiz",
    version,
    about = "Create folders, repair permissions and render directory trees",
    long_about = "pathwiz manages files and folders inside a sandbox root.\n\n\
                  Paths that would leave the root, directly or through a \
                  symlink, are rejected before anything is written."
)]
struct Cli {
    /// Sandbox root every path is resolved against
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a folder, optionally with permissions and subfolders
    Mkdir {
        /// Folder to create
        path: PathBuf,

        /// Permission bits (e.g. 755, 0o750 or rwxr-x---)
        #[arg(short, long)]
        mode: Option<PermissionSpec>,

        /// Subfolder to create inside the new folder (repeatable)
        #[arg(short, long = "sub")]
        subfolders: Vec<String>,

        /// Remove an existing folder and its contents first
        #[arg(long)]
        overwrite: bool,

        /// Re-read the permissions after creation (requires --mode)
        #[arg(long, requires = "mode")]
        check: bool,
    },

    /// Create an empty file
    Touch {
        /// File name
        name: String,

        /// Folder to create the file in
        #[arg(short = 'i', long = "in")]
        folder: Option<PathBuf>,

        /// Truncate an existing file
        #[arg(long)]
        overwrite: bool,
    },

    /// List files, optionally filtered by extension
    Ls {
        /// Folder to list
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Only files ending in this extension
        #[arg(short, long)]
        ext: Option<String>,

        /// Include files in subfolders
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show permissions, or compare them against an expected mode
    Perms {
        /// Path to inspect
        path: PathBuf,

        /// Expected permission bits
        #[arg(short, long)]
        expect: Option<PermissionSpec>,

        /// Apply the expected bits on mismatch
        #[arg(long, requires = "expect")]
        fix: bool,

        /// Also check every folder below PATH
        #[arg(short, long, requires = "expect")]
        recursive: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,
    },

    /// Render a directory tree
    Tree {
        /// Folder to render
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Which rendering to produce (dict, markdown or both)
        #[arg(short, long, default_value = "markdown")]
        format: OutputFormat,

        /// Folder names to skip (repeatable)
        #[arg(short = 'x', long = "exclude")]
        excluded_dirs: Vec<String>,

        /// Name patterns to skip, e.g. "*.log" (repeatable)
        #[arg(short, long = "ignore")]
        ignore_patterns: Vec<String>,

        /// Skip entries starting with a dot
        #[arg(long)]
        no_hidden: bool,

        /// Do not follow symbolic links
        #[arg(long)]
        no_follow: bool,

        /// Maximum depth to descend
        #[arg(short, long)]
        depth: Option<u32>,

        /// Wrap the markdown in a title and code fence
        #[arg(long)]
        header: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let manager = FileManager::new(&cli.root).context("Invalid root")?;

    match cli.command {
        Command::Mkdir {
            path,
            mode,
            subfolders,
            overwrite,
            check,
        } => {
            let subfolders: Vec<Subfolder> = subfolders.into_iter().map(Subfolder::from).collect();
            let entry = match (mode, check) {
                (Some(mode), true) => {
                    manager
                        .create_folder_checked(&path, overwrite, mode, &subfolders)
                        .await
                }
                _ => manager.create_folder(&path, overwrite, mode, &subfolders).await,
            }
            .with_context(|| format!("Failed to create {}", path.display()))?;

            println!("{}", entry.absolute.display());
            for sub in &entry.subfolders {
                println!("  {}", sub.display());
            }
        }
        Command::Touch {
            name,
            folder,
            overwrite,
        } => {
            let entry = manager
                .create_file(&name, folder.as_deref(), overwrite)
                .await
                .with_context(|| format!("Failed to create {name}"))?;
            println!("{}", entry.absolute.display());
        }
        Command::Ls {
            dir,
            ext,
            recursive,
        } => {
            let files = manager
                .get_file_list(&dir, ext.as_deref(), recursive)
                .with_context(|| format!("Failed to list {}", dir.display()))?;
            for file in files {
                println!("{}", file.display());
            }
        }
        Command::Perms {
            path,
            expect,
            fix,
            recursive,
            format,
        } => run_perms(&manager, path, expect, fix, recursive, format).await?,
        Command::Tree {
            dir,
            format,
            excluded_dirs,
            ignore_patterns,
            no_hidden,
            no_follow,
            depth,
            header,
        } => {
            let config = TreeConfig::builder()
                .excluded_dirs(excluded_dirs)
                .ignore_patterns(ignore_patterns)
                .include_hidden(!no_hidden)
                .follow_symlinks(!no_follow)
                .max_depth(depth)
                .markdown_header(header)
                .build()?;

            let output = manager
                .with_tree_config(config)
                .generate_directory_tree(&dir, format)
                .await
                .with_context(|| format!("Failed to render {}", dir.display()))?;

            if let Some(markdown) = output.markdown {
                println!("{markdown}");
            }
            if let Some(tree) = output.tree {
                println!("{}", render_json(&tree)?);
            }
        }
    }

    Ok(())
}

/// Install the stderr log subscriber (`RUST_LOG`, default `pathwiz=info`).
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pathwiz=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Show or check permissions.
async fn run_perms(
    manager: &FileManager,
    path: PathBuf,
    expect: Option<PermissionSpec>,
    fix: bool,
    recursive: bool,
    format: ReportFormat,
) -> Result<()> {
    let Some(expected) = expect else {
        let current = manager
            .get_file_permissions(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match format {
            ReportFormat::Text => println!("{current} {} {}", current.to_rwx(), path.display()),
            ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&current)?),
        }
        return Ok(());
    };

    let mismatches = if recursive {
        manager
            .check_permissions_recursive(&path, expected, fix)
            .await
    } else {
        manager
            .check_permissions(&path, expected, fix)
            .await
            .map(|report| report.into_iter().collect())
    }
    .with_context(|| format!("Failed to check {}", path.display()))?;

    match format {
        ReportFormat::Text => print_mismatches(&mismatches),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&mismatches)?),
    }

    Ok(())
}

fn print_mismatches(mismatches: &[PermissionMismatch]) {
    if mismatches.is_empty() {
        println!("Permissions match.");
        return;
    }
    for report in mismatches {
        println!(
            "{report} [{:?}, differing bits {:03o}]",
            report.resolution,
            report.differing_bits()
        );
    }
}
