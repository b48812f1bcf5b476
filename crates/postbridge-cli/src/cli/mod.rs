//! CLI entry and dispatch.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use postbridge_core::config::{Config, paths};
use postbridge_core::guard::{GuardDecision, Route, RouteGuard};
use postbridge_core::{ApiClient, ApiError, ApiResult, SessionStore};
use postbridge_types::Platform;

mod commands;
mod navigator;

#[derive(Parser)]
#[command(name = "postbridge")]
#[command(version)]
#[command(about = "Link social accounts and dispatch posts from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(short, long, env = "POSTBRIDGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Log out (clear the stored session)
    Logout,

    /// Register a new account
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long = "whatsapp-number", value_name = "NUMBER")]
        whatsapp_number: String,
        /// Comma-separated list of niches
        #[arg(long)]
        niche: String,
        #[arg(long)]
        email: String,
    },

    /// Show the logged-in user
    Whoami {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the backend's OAuth configuration status
    Status,

    /// Link a social account (starts the OAuth flow)
    Connect {
        /// facebook or instagram
        #[arg(value_name = "PLATFORM")]
        platform: Platform,

        /// Print the authorization URL without opening a browser
        #[arg(long = "no-browser")]
        no_browser: bool,
    },

    /// Complete linking from the provider's callback URL
    Callback {
        #[arg(value_name = "PLATFORM")]
        platform: Platform,

        /// Callback URL or its query string
        #[arg(value_name = "URL_OR_QUERY")]
        input: String,

        /// Return without waiting for the follow-up redirect
        #[arg(long = "no-wait")]
        no_wait: bool,
    },

    /// Manage linked social accounts
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },

    /// Create posts and inspect post history
    Posts {
        #[command(subcommand)]
        command: PostsCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum AccountsCommands {
    /// List linked accounts
    List {
        #[arg(long)]
        json: bool,
    },
    /// Unlink the account for a platform
    Unlink {
        #[arg(value_name = "PLATFORM")]
        platform: Platform,
    },
}

#[derive(clap::Subcommand)]
enum PostsCommands {
    /// List post history
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show aggregate post counts
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Create or schedule a post on a linked platform
    Create {
        #[arg(long)]
        platform: String,
        #[arg(long)]
        content: String,
        /// "now" or a date-time understood by the backend
        #[arg(long, default_value = "now")]
        schedule: String,
    },
    /// Publish a post immediately
    Instant {
        #[arg(long)]
        platform: String,
        #[arg(long)]
        content: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set the backend base URL
    SetUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

/// Loaded config plus the shared session and client.
pub struct App {
    pub config: Config,
    pub session: Arc<SessionStore>,
    pub client: ApiClient,
}

impl App {
    fn load() -> Result<Self> {
        let session = SessionStore::open_default().context("load session")?;
        Self::with_session(session)
    }

    /// For commands that replace or remove the session: an unreadable
    /// session file is ignored instead of failing the command.
    fn load_for_reauth() -> Result<Self> {
        Self::with_session(SessionStore::open_or_empty(paths::session_path()))
    }

    fn with_session(session: SessionStore) -> Result<Self> {
        let config = Config::load().context("load config")?;
        let session = Arc::new(session);
        let client = ApiClient::from_config(&config, Arc::clone(&session))?;
        Ok(Self {
            config,
            session,
            client,
        })
    }

    /// Fails unless `route` may be shown with the current session.
    pub fn require(&self, route: &Route) -> Result<()> {
        match RouteGuard::new(Arc::clone(&self.session)).check(route) {
            GuardDecision::Render => Ok(()),
            GuardDecision::Redirect(_) => {
                anyhow::bail!("Not logged in. Run `postbridge login` first.")
            }
        }
    }

    /// Converts an API result, dropping the session when the backend
    /// rejects the token.
    pub fn api<T>(&self, result: ApiResult<T>) -> Result<T> {
        result.or_else(|err: ApiError| {
            if err.is_unauthorized() {
                if let Err(e) = self.session.clear() {
                    tracing::warn!(error = %e, "could not clear rejected session");
                }
                return Err(anyhow::Error::new(err)
                    .context("Session expired or revoked; run `postbridge login` again"));
            }
            Err(err.into())
        })
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = crate::logging::init();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetUrl { url } => commands::config::set_url(&url),
        },

        Commands::Login { username, password } => {
            let app = App::load_for_reauth()?;
            commands::auth::login(&app, &username, password).await
        }
        Commands::Logout => commands::auth::logout(&App::load_for_reauth()?),
        Commands::Signup {
            username,
            password,
            whatsapp_number,
            niche,
            email,
        } => {
            let request = postbridge_core::auth::SignupRequest {
                username,
                password,
                whatsapp_number,
                niche,
                email,
            };
            commands::auth::signup(&App::load()?, &request).await
        }
        Commands::Whoami { json } => commands::auth::whoami(&App::load()?, json).await,

        Commands::Status => commands::oauth::status(&App::load()?).await,
        Commands::Connect {
            platform,
            no_browser,
        } => commands::oauth::connect(&App::load()?, platform, no_browser).await,
        Commands::Callback {
            platform,
            input,
            no_wait,
        } => commands::oauth::callback(&App::load()?, platform, &input, !no_wait).await,

        Commands::Accounts { command } => {
            let app = App::load()?;
            match command {
                AccountsCommands::List { json } => commands::accounts::list(&app, json).await,
                AccountsCommands::Unlink { platform } => {
                    commands::accounts::unlink(&app, platform).await
                }
            }
        }

        Commands::Posts { command } => {
            let app = App::load()?;
            match command {
                PostsCommands::List { json } => commands::posts::list(&app, json).await,
                PostsCommands::Stats { json } => commands::posts::stats(&app, json).await,
                PostsCommands::Create {
                    platform,
                    content,
                    schedule,
                } => commands::posts::create(&app, &platform, &content, &schedule).await,
                PostsCommands::Instant { platform, content } => {
                    commands::posts::instant(&app, &platform, &content).await
                }
            }
        }
    }
}
