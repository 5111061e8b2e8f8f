use clap::{Parser, Subcommand};
use marksite::config::{self, ServeConfig};
use marksite::page::LinkMode;
use marksite::{generate, output, serve};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "marksite")]
#[command(about = "Static site generator for Markdown blogs")]
#[command(long_about = "\
Static site generator for Markdown blogs

Your filesystem is the data source. Directories become categories, Markdown
files become posts, and each directory's index.md lists the posts below it.

Content structure:

  content/
  ├── site.toml            # Site config (optional)
  ├── index.md             # Home page; its first heading is the site title
  ├── about.md             # Page → /about.html or /about
  └── posts/               # Category \"posts\"
      ├── index.md         # Lists every post under posts/, newest first
      └── hello.md         # Post; dated from git unless the header says otherwise

Page header (optional):

  ---
  url: /hello              # custom URL, dynamic links only
  published: 2024-01-01
  updated: 2024-02-01
  ---

Run 'marksite gen-config' to generate a documented site.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve a site over HTTP
    Serve {
        /// Content directory
        source: PathBuf,
        /// Theme directory
        theme: PathBuf,
        /// Port to serve on
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
        /// Rebuild the site on every request
        #[arg(short = 'D', long)]
        livereload: bool,
        /// Interface to bind
        #[arg(long, default_value = "127.0.0.1")]
        interface: String,
        /// Request worker threads (defaults to one per core)
        #[arg(long)]
        workers: Option<usize>,
        /// Use .html links instead of extensionless ones
        #[arg(long)]
        static_links: bool,
    },
    /// Write the site to an output directory
    Build {
        /// Content directory
        source: PathBuf,
        /// Theme directory
        theme: PathBuf,
        /// Output directory
        #[arg(long, default_value = "dist")]
        output: PathBuf,
        /// Use extensionless links and honor url overrides
        #[arg(long)]
        dynamic: bool,
    },
    /// Print a stock site.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            source,
            theme,
            port,
            livereload,
            interface,
            workers,
            static_links,
        } => {
            let config = ServeConfig {
                interface,
                port,
                livereload,
                workers,
                link_mode: if static_links {
                    LinkMode::Static
                } else {
                    LinkMode::Dynamic
                },
            };
            config.validate()?;
            let handler = serve::handler_for(&source, &theme, &config)?;
            serve::serve(handler, &config)?;
        }
        Command::Build {
            source,
            theme,
            output: target,
            dynamic,
        } => {
            let mode = if dynamic {
                LinkMode::Dynamic
            } else {
                LinkMode::Static
            };
            println!("==> Building {} → {}", source.display(), target.display());
            let bindings =
                generate::generate_site(&source, &theme, &target, mode, &BTreeMap::new())?;
            output::print_bindings(&bindings, &target);

            let manifest = target.join("bindings.json");
            std::fs::write(&manifest, output::bindings_json(&bindings, &target)?)?;
            println!("==> Build complete: {}", target.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
