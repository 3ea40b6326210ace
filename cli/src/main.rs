//! relayout CLI - rebuild documents from extracted PDF tokens

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use relayout::{
    load_tokens_file, DiagnosticKind, JsonFormat, LayoutOptions, PageSelection,
    Relayout, RelayoutResult, RenderOptions,
};

#[derive(Parser)]
#[command(name = "relayout")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Rebuild tables, paragraphs and footnotes from positioned PDF text", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write Markdown, text, JSON and diagnostics to a directory
    Convert {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Render the document as Markdown
    #[command(alias = "md")]
    Markdown {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Table rendering mode
        #[arg(long, value_enum, default_value = "markdown")]
        table_mode: TableMode,

        /// Maximum heading level (1-6)
        #[arg(long, default_value = "6")]
        max_heading: u8,

        /// Omit page-continuation notes on multi-page tables
        #[arg(long)]
        no_continuation_notes: bool,
    },

    /// Render the document as plain text
    Text {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Render the document tree as JSON
    Json {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// List recoverable layout conditions
    Diagnostics {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct InputArgs {
    /// Token file (JSON page array or flat token array)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Layout options file (partial JSON overrides the defaults)
    #[arg(long, value_name = "FILE", env = "RELAYOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Repair malformed input instead of rejecting it
    #[arg(long)]
    lenient: bool,

    /// Process pages on a single thread
    #[arg(long)]
    sequential: bool,

    /// Page range (e.g., "1-10", "1,3,5")
    #[arg(long)]
    pages: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum TableMode {
    /// Standard Markdown tables
    Markdown,
    /// HTML tables when cells span rows or columns
    Html,
}

impl From<TableMode> for relayout::TableFallback {
    fn from(mode: TableMode) -> Self {
        match mode {
            TableMode::Markdown => relayout::TableFallback::Markdown,
            TableMode::Html => relayout::TableFallback::Html,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert { input, output } => cmd_convert(&input, output.as_deref()),
        Commands::Markdown {
            input,
            output,
            table_mode,
            max_heading,
            no_continuation_notes,
        } => {
            let render_options = RenderOptions::new()
                .with_table_fallback(table_mode.into())
                .with_max_heading(max_heading)
                .with_continuation_notes(!no_continuation_notes);
            cmd_markdown(&input, output.as_deref(), render_options)
        }
        Commands::Text { input, output } => cmd_text(&input, output.as_deref()),
        Commands::Json {
            input,
            output,
            compact,
        } => cmd_json(&input, output.as_deref(), compact),
        Commands::Diagnostics {
            input,
            output,
            json,
        } => cmd_diagnostics(&input, output.as_deref(), json),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Load the token file and reconstruct it with the requested options.
fn reconstruct(
    args: &InputArgs,
    render_options: RenderOptions,
) -> Result<RelayoutResult, Box<dyn std::error::Error>> {
    let page_selection = if let Some(p) = args.pages.as_deref() {
        PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?
    } else {
        PageSelection::All
    };

    let mut options = match &args.config {
        Some(path) => LayoutOptions::from_json_str(&fs::read_to_string(path)?)?,
        None => LayoutOptions::new(),
    };
    if args.lenient {
        options = options.lenient();
    }
    if args.sequential {
        options = options.sequential();
    }

    let stream = load_tokens_file(&args.input, options.error_mode)?;
    log::info!(
        "Loaded {} token(s) on {} page(s) from {}",
        stream.token_count(),
        stream.page_count(),
        args.input.display()
    );

    let result = Relayout::new()
        .with_options(options)
        .with_render_options(render_options)
        .with_pages(page_selection)
        .run(&stream)?;

    let count = result.diagnostics().len();
    if count > 0 {
        eprintln!(
            "{} {} diagnostic(s); run `relayout diagnostics` for details",
            "Note:".yellow(),
            count
        );
    }

    Ok(result)
}

fn write_output(output: Option<&Path>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn cmd_convert(args: &InputArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = output.map(|p| p.to_path_buf()).unwrap_or_else(|| {
        let stem = args.input.file_stem().unwrap_or_default().to_string_lossy();
        PathBuf::from(format!("{}_output", stem))
    });

    fs::create_dir_all(&output_dir)?;

    let pb = ProgressBar::new(5);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("Reconstructing layout...");
    let result = reconstruct(args, RenderOptions::new())?;
    pb.inc(1);

    pb.set_message("Generating Markdown...");
    fs::write(output_dir.join("document.md"), result.to_markdown()?)?;
    pb.inc(1);

    pb.set_message("Generating text...");
    fs::write(output_dir.join("document.txt"), result.to_text()?)?;
    pb.inc(1);

    pb.set_message("Generating JSON...");
    fs::write(
        output_dir.join("document.json"),
        result.to_json(JsonFormat::Pretty)?,
    )?;
    pb.inc(1);

    fs::write(
        output_dir.join("diagnostics.json"),
        relayout::render::to_json(result.diagnostics(), JsonFormat::Pretty)?,
    )?;
    pb.inc(1);

    pb.finish_with_message("Done!");

    println!("\n{}", "Output files:".green().bold());
    println!("  {} document.md", "├─".dimmed());
    println!("  {} document.txt", "├─".dimmed());
    println!("  {} document.json", "├─".dimmed());
    println!("  {} diagnostics.json", "└─".dimmed());

    Ok(())
}

fn cmd_markdown(
    args: &InputArgs,
    output: Option<&Path>,
    render_options: RenderOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = reconstruct(args, render_options)?;
    write_output(output, &result.to_markdown()?)
}

fn cmd_text(args: &InputArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let result = reconstruct(args, RenderOptions::new())?;
    write_output(output, &result.to_text()?)
}

fn cmd_json(
    args: &InputArgs,
    output: Option<&Path>,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = reconstruct(args, RenderOptions::new())?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    write_output(output, &result.to_json(format)?)
}

fn cmd_diagnostics(
    args: &InputArgs,
    output: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = reconstruct(args, RenderOptions::new())?;
    let diagnostics = result.diagnostics();

    if json {
        return write_output(output, &serde_json::to_string_pretty(diagnostics)?);
    }

    if let Some(path) = output {
        let lines: Vec<String> = diagnostics.iter().map(|d| d.to_string()).collect();
        fs::write(path, lines.join("\n"))?;
        println!("{} {}", "Saved to".green(), path.display());
        return Ok(());
    }

    println!("{}", "Diagnostics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for d in diagnostics {
        let kind = match d.kind {
            DiagnosticKind::MalformedToken | DiagnosticKind::CrossPageContinuationMismatch => {
                d.kind.as_str().red()
            }
            DiagnosticKind::EmptyPage => d.kind.as_str().dimmed(),
            _ => d.kind.as_str().yellow(),
        };
        match d.page {
            Some(page) => println!("{} {} {}", kind, format!("p{}", page).bold(), d.message),
            None => println!("{} {}", kind, d.message),
        }
    }

    println!();
    println!("{}: {}", "Pages".bold(), result.reconstruction.pages_processed);
    println!("{}: {}", "Total".bold(), diagnostics.len());
    if result.is_cancelled() {
        println!("{}", "Reconstruction was cancelled".yellow());
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "relayout".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Layout reconstruction for extracted PDF text");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/relayout".dimmed());
    println!("License: MIT");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markdown_alias() {
        let cli = Cli::try_parse_from([
            "relayout",
            "md",
            "tokens.json",
            "--table-mode",
            "html",
            "--pages",
            "1-3",
        ])
        .unwrap();

        match cli.command {
            Commands::Markdown {
                input, table_mode, ..
            } => {
                assert_eq!(input.input, PathBuf::from("tokens.json"));
                assert!(table_mode == TableMode::Html);
                assert_eq!(input.pages.as_deref(), Some("1-3"));
            }
            _ => panic!("expected markdown command"),
        }
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        write_output(Some(&path), "| a | b |").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "| a | b |");
    }

    #[test]
    fn test_reconstruct_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tokens.json");
        fs::write(
            &input,
            r#"[{"text": "Hello", "page": 1, "x0": 10, "y0": 10, "x1": 35, "y1": 20, "font_size": 10}]"#,
        )
        .unwrap();

        let args = InputArgs {
            input,
            config: None,
            lenient: false,
            sequential: true,
            pages: None,
        };
        let result = reconstruct(&args, RenderOptions::new()).unwrap();
        assert_eq!(result.to_text().unwrap(), "Hello");
    }
}
