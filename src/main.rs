use canvas_viewer::config::{self, BASE_DOMAIN_ENV, ViewerConfig};
use canvas_viewer::{export, output, server};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "canvas-viewer")]
#[command(about = "Browse a Canvas course export as a website")]
#[command(long_about = "\
Browse a Canvas course export as a website

Point the viewer at an unpacked IMS Common Cartridge export (the folder that
contains imsmanifest.xml). Pages are rewritten so their links work outside
Canvas: wiki links, file placeholders and course references all resolve to
the viewer's own routes.

Export layout:

  course/
  ├── imsmanifest.xml              # Resources and module tree
  ├── course_settings/
  │   ├── course_settings.xml      # Title, dates, tab configuration
  │   └── files_meta.xml           # File display names and unlock dates
  ├── wiki_content/                # Pages
  └── web_resources/               # Uploaded files

'export' flattens a whole directory of courses (folders or .zip/.imscc
archives) into static HTML.

Run 'canvas-viewer gen-config' to generate a documented canvas-viewer.toml.")]
#[command(version)]
struct Cli {
    /// Config file (stock defaults apply when it does not exist)
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Shared flag for commands that read one export.
#[derive(clap::Args, Clone)]
struct ExportDir {
    /// Unpacked course export (the folder containing imsmanifest.xml)
    #[arg(long, default_value = ".")]
    export: PathBuf,
}

/// Shared flag for commands that classify links.
#[derive(clap::Args, Clone)]
struct DomainArgs {
    /// Comma-separated internal domains, e.g. "*.instructure.com,example.edu"
    #[arg(long, env = BASE_DOMAIN_ENV)]
    canvas_base_domain: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve one course export as an interactive site
    Serve {
        #[command(flatten)]
        dir: ExportDir,
        #[command(flatten)]
        domains: DomainArgs,
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// First port to try
        #[arg(long)]
        port: Option<u16>,
    },
    /// Flatten every course in a directory into a static site
    Export {
        /// Directory of course exports and archives
        #[arg(long)]
        courses_dir: Option<PathBuf>,
        /// Output directory (recreated)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print an inventory of one course export
    Info {
        #[command(flatten)]
        dir: ExportDir,
    },
    /// List external links found in one course export
    Links {
        #[command(flatten)]
        dir: ExportDir,
        #[command(flatten)]
        domains: DomainArgs,
    },
    /// Print a stock canvas-viewer.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Serve {
            dir,
            domains,
            host,
            port,
        } => {
            let mut cfg = load(&cli.config, &domains)?;
            if let Some(host) = host {
                cfg.server.host = host;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            cfg.validate()?;

            let export = server::open_export(&dir.export)?;
            let title = export.display_title();
            let server_cfg = &cfg.server;
            let chosen = server::find_free_port(
                &server_cfg.host,
                server_cfg.port,
                server_cfg.port_search,
                &server_cfg.skip_ports,
            )?;
            let app = server::router(server::AppState::new(export, cfg.links.internal_domains.clone()));

            output::print_serving(&title, &server_cfg.host, server_cfg.port, chosen);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(app, &server_cfg.host, chosen))?;
        }
        Command::Export {
            courses_dir,
            output_dir,
        } => {
            let cfg = config::load_config(&cli.config)?;
            let courses_dir = courses_dir.unwrap_or_else(|| PathBuf::from(&cfg.export.courses_dir));
            let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(&cfg.export.output_dir));

            println!("==> Exporting {} → {}", courses_dir.display(), output_dir.display());
            let summary = export::build_site(&courses_dir, &output_dir)?;
            output::print_site_summary(&summary, &output_dir);
        }
        Command::Info { dir } => {
            let export = server::open_export(&dir.export)?;
            output::print_inventory(&output::Inventory::collect(&export));
        }
        Command::Links { dir, domains } => {
            let cfg = load(&cli.config, &domains)?;
            let export = server::open_export(&dir.export)?;
            output::print_links(&export.external_links(&cfg.links.internal_domains));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Config file, then the domain override from the flag or environment.
fn load(path: &Path, domains: &DomainArgs) -> Result<ViewerConfig, config::ConfigError> {
    let mut cfg = config::load_config(path)?;
    cfg.override_domains(domains.canvas_base_domain.as_deref());
    cfg.validate()?;
    Ok(cfg)
}

/// Logs go to stderr so reports on stdout stay clean.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canvas_viewer=info,tower_http=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
