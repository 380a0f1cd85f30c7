mod app;
mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "skillai")]
#[command(about = "AI partners that learn from every conversation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize skillai configuration
    Onboard {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration status
    Status,

    /// Manage partners
    Partners {
        #[command(subcommand)]
        command: PartnersCommands,
    },

    /// Chat with a partner
    Chat {
        /// Partner slug
        slug: String,

        /// Message to send (interactive mode if not provided)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Evolve a partner that has enough XP
    Evolve {
        /// Partner slug
        slug: String,
    },

    /// Send feedback to the team
    Feedback {
        /// Feedback text
        text: String,
    },

    /// Get competition ideas and pitch points for an app
    Pitch {
        /// App name
        #[arg(long)]
        name: String,
        /// What the app does
        #[arg(long)]
        description: String,
        /// Who the app is for
        #[arg(long)]
        audience: String,
    },

    /// Start the HTTP gateway
    Gateway {
        /// Port to listen on (overrides config gateway.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config gateway.host)
        #[arg(long)]
        host: Option<String>,
    },
}

#[derive(Subcommand)]
enum PartnersCommands {
    /// List partners with their XP
    List,
    /// Show one partner
    Show {
        slug: String,
    },
    /// Create a new partner
    Create {
        /// Partner name (3-30 characters)
        #[arg(long)]
        name: String,
        /// Main skill (10-100 characters)
        #[arg(long)]
        skill: String,
        /// Primary capability: text, image, audio or video
        #[arg(long, default_value = "text")]
        capability: String,
        /// Never gain XP or evolve
        #[arg(long)]
        no_evolution: bool,
    },
    /// Delete a partner
    Delete {
        slug: String,
    },
    /// Re-fetch published partners from Notion
    Sync,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Onboard { force } => {
            commands::onboard::run(force).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Partners { command } => match command {
            PartnersCommands::List => commands::partners::list().await?,
            PartnersCommands::Show { slug } => commands::partners::show(&slug).await?,
            PartnersCommands::Create {
                name,
                skill,
                capability,
                no_evolution,
            } => commands::partners::create(name, skill, &capability, no_evolution).await?,
            PartnersCommands::Delete { slug } => commands::partners::delete(&slug).await?,
            PartnersCommands::Sync => commands::partners::sync().await?,
        },
        Commands::Chat { slug, message } => {
            commands::chat::run(&slug, message).await?;
        }
        Commands::Evolve { slug } => {
            commands::evolve::run(&slug).await?;
        }
        Commands::Feedback { text } => {
            commands::feedback::run(&text).await?;
        }
        Commands::Pitch {
            name,
            description,
            audience,
        } => {
            commands::pitch::run(name, description, audience).await?;
        }
        Commands::Gateway { port, host } => {
            commands::gateway::run(host, port).await?;
        }
    }

    Ok(())
}
