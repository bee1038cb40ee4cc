//! Autopilot CLI — run the demo server or drive workflows from the terminal.
//!
//! Reuses the same core domain logic (autopilot-core) and server bootstrap
//! (autopilot-server) that back the web demo.

use clap::{Parser, Subcommand};

use autopilot_cli::commands::{self, server::ServerArgs};
use autopilot_core::workflow::INQUIRY_TO_QUOTE_ID;

/// Inquiry-to-quote autopilot
#[derive(Parser)]
#[command(name = "autopilot", version, about = "Inquiry-to-quote AI workflow autopilot")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP backend server
    Server(ServerArgs),

    /// Inspect and run step workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// List built-in workflows
    List,
    /// Show a workflow's steps and branches
    Show {
        /// Built-in workflow id or YAML file path
        #[arg(default_value = INQUIRY_TO_QUOTE_ID)]
        workflow: String,
        /// Print the definition as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a workflow YAML file without executing it
    Validate {
        /// Path to the workflow YAML file
        file: String,
    },
    /// Run a workflow against a completion endpoint
    Run {
        /// Built-in workflow id or YAML file path
        #[arg(long, default_value = INQUIRY_TO_QUOTE_ID)]
        workflow: String,
        /// Completion endpoint URL
        #[arg(long, env = "AUTOPILOT_ENDPOINT", default_value = "http://127.0.0.1:3210/api/ai")]
        endpoint: String,
        /// Customer inquiry text (defaults to the sample inquiry)
        #[arg(long, short = 'm')]
        message: Option<String>,
        /// Sampling temperature sent with every step
        #[arg(long)]
        temperature: Option<f64>,
        /// Run only these steps, in order (repeatable)
        #[arg(long = "step")]
        steps: Vec<String>,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    commands::load_dotenv();

    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "autopilot_core=warn,autopilot_server=info,autopilot_cli=info,tower_http=info"
                    .into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Some(Commands::Server(args)) => commands::server::run(args.into_config()).await,

        Some(Commands::Workflow { action }) => match action {
            WorkflowAction::List => commands::workflow::list(),
            WorkflowAction::Show { workflow, json } => commands::workflow::show(&workflow, json),
            WorkflowAction::Validate { file } => commands::workflow::validate(&file),
            WorkflowAction::Run {
                workflow,
                endpoint,
                message,
                temperature,
                steps,
                json,
            } => {
                commands::workflow::run(commands::workflow::RunArgs {
                    workflow,
                    endpoint,
                    message,
                    temperature,
                    steps,
                    json,
                })
                .await
            }
        },

        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
