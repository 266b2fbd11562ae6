use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use fileagent::config::{Config, StorePaths, DEFAULT_CONFIG_FILE};
use fileagent::error::{AgentError, Result};
use fileagent::output::{self, OutputFormat};
use fileagent::rules::{SnortRule, TemplateRegistry};
use fileagent::translator::{CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};
use fileagent::{FileAgent, RuleTranslator};

#[derive(Parser)]
#[command(
    name = "fileagent",
    about = "Compile threat indicators into Snort rules",
    version,
    author
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    /// Output format (console, json)
    #[arg(long, short = 'o', global = true, default_value = "console")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Config file path
    #[arg(long, short = 'c', global = true, env = "FILEAGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides store.directory)
    #[arg(long, short = 'd', global = true)]
    directory: Option<PathBuf>,

    /// Rule file (overrides store.rules_file)
    #[arg(long, short = 'f', global = true)]
    file: Option<PathBuf>,

    /// Backup directory (overrides store.backup_dir)
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,

    /// History file (overrides store.history_file)
    #[arg(long, global = true)]
    history_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a JSON payload (command or content form) and append its rule
    Submit {
        /// Payload file, or '-' for stdin
        #[arg(default_value = "-")]
        payload: PathBuf,
    },

    /// Upload a text or JSON document, as the upload endpoint would
    Upload {
        /// Document to upload
        document: PathBuf,

        /// Content type (application/json, text/plain); inferred from the extension if omitted
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Print the rule a payload would produce without writing anything
    Translate {
        /// Payload file, or '-' for stdin
        #[arg(default_value = "-")]
        payload: PathBuf,
    },

    /// Build a rule from a JSON rule description
    Build {
        /// Rule description file, or '-' for stdin
        #[arg(default_value = "-")]
        rule_file: PathBuf,

        /// Append the built rule to the rule file
        #[arg(long)]
        append: bool,
    },

    /// Show accepted submissions, newest first
    Notifications,

    /// List the available rule templates
    ListTemplates,

    /// Generate a starter .fileagent.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let format = OutputFormat::from_str_lenient(&cli.format).unwrap_or_else(|| {
        eprintln!("Warning: unknown format '{}', using console", cli.format);
        OutputFormat::Console
    });

    if let Commands::Init { force } = cli.command {
        return cmd_init(force);
    }

    let config_path = cli
        .store
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = Config::load(&config_path)?;
    init_logging(&config.logging.level);

    match cli.command {
        Commands::Submit { payload } => {
            let agent = FileAgent::from_paths(&store_paths(&cli.store, &config)?);
            let value = read_json(&payload)?;
            let submission = agent.submit_value(&value)?;
            println!("{}", output::render_submission(&submission, format)?);
            Ok(0)
        }
        Commands::Upload {
            document,
            content_type,
        } => {
            let agent = FileAgent::from_paths(&store_paths(&cli.store, &config)?);
            let content_type = match content_type {
                Some(ct) => ct,
                None => infer_content_type(&document)?.to_string(),
            };
            let body = std::fs::read_to_string(&document)?;
            let submission = agent.upload(&content_type, &body)?;
            println!("{}", output::render_submission(&submission, format)?);
            Ok(0)
        }
        Commands::Translate { payload } => {
            let value = read_json(&payload)?;
            match RuleTranslator::new().translate_value(&value)? {
                Some(rule) => {
                    println!("{rule}");
                    Ok(0)
                }
                None => {
                    eprintln!("No rule produced for this payload.");
                    Ok(1)
                }
            }
        }
        Commands::Build { rule_file, append } => {
            let rule: SnortRule = serde_json::from_value(read_json(&rule_file)?)?;
            let text = rule.build()?;
            if append {
                let agent = FileAgent::from_paths(&store_paths(&cli.store, &config)?);
                let submission = agent.submit_rule(text)?;
                println!("{}", output::render_submission(&submission, format)?);
            } else {
                println!("{text}");
            }
            Ok(0)
        }
        Commands::Notifications => {
            let agent = FileAgent::from_paths(&store_paths(&cli.store, &config)?);
            let notifications = agent.notifications()?;
            println!(
                "{}",
                output::render_notifications(notifications.as_ref(), format)?
            );
            Ok(if notifications.is_some() { 0 } else { 1 })
        }
        Commands::ListTemplates => {
            let templates = TemplateRegistry::new().list_templates();
            print!("{}", output::render_templates(&templates, format)?);
            Ok(0)
        }
        Commands::Init { force } => cmd_init(force),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn store_paths(args: &StoreArgs, config: &Config) -> Result<StorePaths> {
    let mut store = config.store.clone();
    if let Some(directory) = &args.directory {
        store.directory = directory.clone();
    }
    if let Some(file) = &args.file {
        store.rules_file = file.clone();
    }
    if let Some(backup_dir) = &args.backup_dir {
        store.backup_dir = Some(backup_dir.clone());
    }
    if let Some(history_file) = &args.history_file {
        store.history_file = Some(history_file.clone());
    }
    store.resolve()
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&raw)?)
}

fn infer_content_type(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" => Ok(CONTENT_TYPE_JSON),
        "txt" | "text" | "log" => Ok(CONTENT_TYPE_TEXT),
        _ => Err(AgentError::UnsupportedContentType(format!(
            "cannot infer a content type for {}; pass --content-type",
            path.display()
        ))),
    }
}

fn cmd_init(force: bool) -> Result<i32> {
    let path = PathBuf::from(DEFAULT_CONFIG_FILE);

    if path.exists() && !force {
        eprintln!("{DEFAULT_CONFIG_FILE} already exists. Use --force to overwrite.");
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created {DEFAULT_CONFIG_FILE}");

    Ok(0)
}
