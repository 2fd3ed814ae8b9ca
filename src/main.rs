use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "tgmark")]
#[command(about = "Convert Markdown to Telegram HTML")]
struct Cli {
    /// Input Markdown file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file
    #[arg(short, long, default_value = "tgmark.toml")]
    config: PathBuf,

    /// Print the parsed document tree instead of HTML
    #[arg(long)]
    tree: bool,
}

fn main() -> anyhow::Result<()> {
    tgmark::logging::init("warn")?;
    let cli = Cli::parse();

    let config = tgmark::Config::load(&cli.config)
        .with_context(|| format!("Error loading {}", cli.config.display()))?;

    // Read input
    let markdown = match &cli.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Error reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Error reading stdin")?;
            buf
        }
    };

    let blocks = tgmark::parse(&markdown);
    let rendered = if cli.tree {
        format!("{:#?}", blocks)
    } else {
        tgmark::Renderer::new(config.render).render(&blocks)
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Error writing {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
