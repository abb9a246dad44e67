use std::{fs, path::PathBuf, sync::Arc};

use actiondesk_cli::config::{CliResult, load_app, load_context};
use actiondesk_core::{ActionHandler, ActionRequest, ActionServices, TemplateKind};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Application definition (actions, models, selections, records)
    #[arg(short, long, env = "ACTIONDESK_APP", global = true)]
    app: Option<PathBuf>,

    /// Entity type of the current record
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Current record values (JSON object)
    #[arg(short, long, global = true)]
    context: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single action expression
    Eval {
        /// Expression such as `eval: amount + 1` or `action: save`
        expression: String,
    },

    /// Run a comma separated list of actions
    Execute {
        /// Action names
        names: String,
    },

    /// Render a template file
    Render {
        /// Template file
        file: PathBuf,

        /// Render without rewriting `| text` and `| e` filters
        #[arg(long)]
        plain: bool,
    },
}

async fn run(cli: &Cli) -> CliResult<()> {
    let app = load_app(cli.app.as_deref())?;
    debug!("loaded {} actions", app.actions.len());
    let services = Arc::new(ActionServices::from_app(app));

    let mut request = ActionRequest {
        action: None,
        model: cli.model.clone(),
        data: load_context(cli.context.as_deref())?,
    };

    match &cli.command {
        Commands::Eval { expression } => {
            let handler = ActionHandler::for_request(services, request);
            let result = handler.evaluate(expression).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Execute { names } => {
            request.action = Some(names.clone());
            let handler = ActionHandler::for_request(services, request);
            let response = handler.execute().await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Render { file, plain } => {
            let template = fs::read_to_string(file)?;
            let kind = if *plain {
                TemplateKind::Plain
            } else {
                TemplateKind::Script
            };
            let handler = ActionHandler::for_request(services, request);
            print!("{}", handler.render_template(kind, &template).await?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
