use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use log::info;

use tmplite::site::{Site, SiteConfig};
use tmplite::{context_from_json, Context, RenderOptions, Renderer};

#[derive(Parser)]
#[command(name = "tmplite")]
#[command(about = "Render Jinja-like templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template file to stdout
    Render(RenderArgs),
    /// Serve templates over HTTP as described by a site config
    Serve(ServeArgs),
}

#[derive(Parser)]
struct RenderArgs {
    /// Template file
    template: PathBuf,

    /// JSON file holding an object of template variables
    #[arg(short, long)]
    context: Option<PathBuf>,

    /// Drop one newline after each block tag
    #[arg(long)]
    trim_blocks: bool,

    /// Reject templates nesting blocks deeper than this
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Parser)]
struct ServeArgs {
    /// Site config (JSON)
    #[arg(short, long, default_value = "site.json")]
    config: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8082")]
    addr: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => render(args),
        Commands::Serve(args) => serve(args),
    }
}

fn render(args: RenderArgs) -> Result<()> {
    let template = fs::read_to_string(&args.template)
        .with_context(|| format!("reading template {}", args.template.display()))?;
    let context = match &args.context {
        Some(path) => load_context(path)?,
        None => Context::new(),
    };

    let options = RenderOptions {
        trim_blocks: args.trim_blocks,
        max_depth: args.max_depth,
    };
    let output = Renderer::new(options)
        .render(&template, &context)
        .with_context(|| format!("rendering {}", args.template.display()))?;

    io::stdout().write_all(output.as_bytes())?;
    Ok(())
}

fn load_context(path: &Path) -> Result<Context> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading context {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing context {}", path.display()))?;
    match json {
        serde_json::Value::Object(object) => Ok(context_from_json(object)),
        other => bail!(
            "context {} must hold a JSON object, found {}",
            path.display(),
            tmplite::Value::from(other).type_name()
        ),
    }
}

fn serve(args: ServeArgs) -> Result<()> {
    let config = SiteConfig::load(&args.config)?;
    info!(
        "serving {} routes from {}",
        config.routes.len(),
        config.template_dir.display()
    );
    tmplite::site::serve(&args.addr, Site::new(config))?;
    Ok(())
}
