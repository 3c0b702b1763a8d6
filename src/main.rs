use clap::Parser;
use md2pdf::convert::{ConvertOptions, convert, default_output_path};
use md2pdf::error::ErrorKind;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "md2pdf")]
#[command(version, about = "Convert a Markdown document into a styled, paginated PDF")]
struct Cli {
    #[arg(help = "Input Markdown file", value_parser = existing_path)]
    input: PathBuf,
    #[arg(short, long, help = "Output PDF file (defaults to the input name with a .pdf extension)")]
    output: Option<PathBuf>,
    #[arg(
        short,
        long,
        value_name = "PATH_OR_CSS",
        help = "Custom CSS: a stylesheet file, or CSS rules given literally"
    )]
    css: Option<String>,
    #[arg(short, long, help = "Print the resolved paths and progress information")]
    verbose: bool,
}

fn existing_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("Path '{}' does not exist.", value))
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = cli.output.unwrap_or_else(|| default_output_path(&cli.input));
    if cli.verbose {
        println!("Input file: {}", cli.input.display());
        println!("Output file: {}", output.display());
        if let Some(css) = &cli.css {
            println!("Custom CSS: {}", css);
        }
    }

    let options = ConvertOptions { input: cli.input, output: Some(output), css: cli.css };
    match convert(&options) {
        Ok(report) => println!(
            "✅ Successfully converted '{}' to '{}'",
            report.input.display(),
            report.output.display()
        ),
        Err(e) => {
            match e.kind() {
                ErrorKind::NotFound => eprintln!("Error: {}", e),
                _ => eprintln!("{}", e),
            }
            process::exit(e.exit_code());
        }
    }
}
