//! rentline - command-line front end for the rentline session core.
//!
//! Each subcommand runs one flow the UI would run: restoring the session at
//! startup, signing in and out, completing a provider redirect, or opening a
//! path through the edge filter and the route guard.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rentline_core::auth::{CallbackOutcome, Credential, SessionState};
use rentline_core::config::Config;
use rentline_core::routes::{EdgeDecision, GuardView, History, Navigator};
use rentline_core::AuthContext;

#[derive(Parser)]
#[command(name = "rentline", version, about = "Rentline session and route tools")]
struct Cli {
    /// API base URL (overrides config and RENTLINE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the stored credential and show the session
    Status,
    /// Sign in with a bearer token
    Login {
        /// Token to install; prompted for when omitted
        #[arg(long)]
        token: Option<String>,
    },
    /// Sign out and forget the stored credential
    Logout,
    /// Complete a sign-in redirect, e.g. "/home?token=..."
    Callback { location: String },
    /// Open a path the way a browser navigation would
    Open { path: String },
    /// Print the route classification table
    Routes,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn print_state(state: &SessionState) {
    match state {
        SessionState::Authenticated(user) => match user.email {
            Some(ref email) => println!("Signed in as {} <{}>", user.display_name(), email),
            None => println!("Signed in as {}", user.display_name()),
        },
        SessionState::Unauthenticated => println!("Not signed in"),
        SessionState::Loading => println!("Checking session..."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    let history = Arc::new(History::new("/"));
    let ctx = AuthContext::open(config, history.clone())?;
    let _listener = ctx.session.spawn_invalidation_listener();
    info!(api = %ctx.api.base_url(), "rentline starting");

    match cli.command {
        Command::Status => {
            let state = ctx.session.restore().await;
            print_state(&state);
        }
        Command::Login { token } => {
            let token = match token {
                Some(token) => token,
                None => rpassword::prompt_password("Token: ").context("Failed to read token")?,
            };
            let token = token.trim().to_string();
            if token.is_empty() {
                bail!("No token given");
            }

            let user = ctx
                .api
                .fetch_identity_with(&Credential::new(token.as_str()))
                .await
                .context("Sign-in failed")?;
            ctx.session.login(&token, user);
            print_state(&ctx.session.state());
            if let Some(path) = ctx.session.take_return_path() {
                history.push(&path);
                println!("Continue to {}", path);
            }
        }
        Command::Logout => {
            ctx.session.logout();
            println!("Signed out; now at {}", history.current());
        }
        Command::Callback { location } => {
            ctx.session.restore().await;
            match ctx.callback.handle(&location).await? {
                CallbackOutcome::NoToken => println!("No token in {}", location),
                CallbackOutcome::AlreadyProcessed => println!("Token already used"),
                CallbackOutcome::Superseded => println!("Another sign-in happened first"),
                CallbackOutcome::Authenticated { user, return_to } => {
                    print_state(&SessionState::Authenticated(user));
                    println!("Now at {}", return_to.unwrap_or_else(|| history.current()));
                }
            }
        }
        Command::Open { path } => {
            if let EdgeDecision::Redirect { location } =
                ctx.edge.evaluate_request(&path, ctx.cookie_header().as_deref())
            {
                println!("Redirected to {} before rendering", location);
                return Ok(());
            }

            history.push(&path);
            let restoring = {
                let session = Arc::clone(&ctx.session);
                tokio::spawn(async move { session.restore().await })
            };
            let mut guard = ctx.guard();
            let view = guard.resolve(&path).await;
            restoring.await.context("Session restore task failed")?;

            match view {
                GuardView::Render => println!("Rendering {}", path),
                GuardView::Waiting => println!("Waiting for session"),
                GuardView::Redirect { to } => {
                    println!("Sign in to continue; redirected to {}", to);
                }
            }
        }
        Command::Routes => {
            println!("landing  {}", ctx.routes.landing());
            for pattern in ctx.routes.public_routes() {
                println!("public   {}", pattern);
            }
            for prefix in ctx.routes.asset_prefixes() {
                println!("asset    {}", prefix);
            }
            println!("*        protected");
        }
    }

    Ok(())
}
