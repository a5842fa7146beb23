//! SmartMarks command-line host.
//!
//! # Usage
//!
//! ```bash
//! smartmarks login                 # sign in (prints the URL to open for hosted)
//! smartmarks complete-login <url>  # finish a hosted sign-in from the redirect URL
//! smartmarks add "Rust" https://www.rust-lang.org
//! smartmarks list
//! smartmarks watch                 # live list until Ctrl-C
//! smartmarks config set sync.ordering last_resolved_wins
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::error::Error;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smartmarks::app::App;
use smartmarks::managers::bookmark_sync::{BookmarkSynchronizer, MountOutcome};
use smartmarks::platform;
use smartmarks::services::settings_engine::{parse_cli_value, SettingsEngine, SettingsEngineTrait};
use smartmarks::types::bookmark::BookmarkId;
use smartmarks::types::session::Provider;
use smartmarks::types::view::Route;
use smartmarks::ui::render::{render_entry, render_text};

#[derive(Parser)]
#[command(name = "smartmarks")]
#[command(author, version, about = "Personal bookmarks that stay in sync")]
struct Cli {
    /// Settings file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with an identity provider
    Login {
        /// Provider name; defaults to `auth.provider` from the settings
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Finish a hosted sign-in from the URL the provider redirected to
    CompleteLogin { redirect_url: String },
    /// Sign out
    Logout,
    /// Print your bookmarks, newest first
    List,
    /// Add a bookmark
    Add { title: String, url: String },
    /// Delete a bookmark by id
    Rm { id: String },
    /// Print the list and reprint it on every change until Ctrl-C
    Watch,
    /// Show or edit settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Set a value by dot path, e.g. `backend.kind hosted`
    Set { key: String, value: String },
    /// Restore the defaults
    Reset,
}

fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "smartmarks=info".into());

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(e) = run(cli).await {
        tracing::error!("command failed: {e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut engine = SettingsEngine::new(cli.config);
    let settings = engine.load()?;

    let command = match cli.command {
        Commands::Config { action } => return config(&mut engine, action),
        command => command,
    };

    let mut app = App::new(settings, &platform::get_data_dir())?;

    match command {
        Commands::Login { provider } => {
            if let Some(provider) = provider {
                app.settings.auth.provider = Provider(provider);
            }
            login(&app).await
        }
        Commands::CompleteLogin { redirect_url } => {
            let session = app.backend.complete_sign_in(&redirect_url)?;
            if let Some(user) = session.user() {
                println!("Signed in as {}", user);
            }
            Ok(())
        }
        Commands::Logout => {
            let dashboard = mounted_dashboard(&app).await?;
            dashboard.logout().await?;
            println!("Signed out");
            Ok(())
        }
        Commands::List => {
            let dashboard = mounted_dashboard(&app).await?;
            print!("{}", render_text(&dashboard.view()));
            dashboard.unmount();
            Ok(())
        }
        Commands::Add { title, url } => {
            let dashboard = mounted_dashboard(&app).await?;
            dashboard.create(&title, &url).await?;
            print!("{}", render_text(&dashboard.view()));
            dashboard.unmount();
            Ok(())
        }
        Commands::Rm { id } => {
            let dashboard = mounted_dashboard(&app).await?;
            dashboard.remove(&BookmarkId(id)).await?;
            print!("{}", render_text(&dashboard.view()));
            dashboard.unmount();
            Ok(())
        }
        Commands::Watch => watch(&app).await,
        Commands::Config { .. } => Ok(()),
    }
}

async fn login(app: &App) -> Result<(), Box<dyn Error>> {
    let entry = app.entry();
    entry.mount();
    if app.navigator.current() == Some(Route::Dashboard) {
        entry.unmount();
        println!("Already signed in");
        return Ok(());
    }
    print!("{}", render_entry(&entry.state(), &app.settings.auth.provider));

    let redirect = entry.sign_in().await;
    let signed_in = app.navigator.current() == Some(Route::Dashboard);
    entry.unmount();

    match redirect?.url {
        Some(url) => {
            println!("Open this URL to continue:\n  {}", url);
            println!("Then run: smartmarks complete-login <redirected url>");
        }
        None if signed_in => println!("Signed in"),
        None => println!("Sign-in did not complete"),
    }
    Ok(())
}

async fn mounted_dashboard(app: &App) -> Result<BookmarkSynchronizer, Box<dyn Error>> {
    let dashboard = app.dashboard();
    match dashboard.mount().await? {
        MountOutcome::Ready => Ok(dashboard),
        MountOutcome::Redirected => Err("not signed in, run `smartmarks login` first".into()),
    }
}

async fn watch(app: &App) -> Result<(), Box<dyn Error>> {
    let dashboard = mounted_dashboard(app).await?;
    let mut updates = dashboard.watch();
    print!("{}", render_text(&updates.borrow_and_update()));

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() || !dashboard.is_mounted() {
                    println!("Session ended");
                    break;
                }
                let view = updates.borrow_and_update().clone();
                if !view.loading {
                    println!("---");
                    print!("{}", render_text(&view));
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    dashboard.unmount();
    Ok(())
}

fn config(engine: &mut SettingsEngine, action: ConfigAction) -> Result<(), Box<dyn Error>> {
    match action {
        ConfigAction::Show => {
            println!("# {}", engine.get_config_path());
            println!("{}", serde_json::to_string_pretty(&engine.get_settings())?);
        }
        ConfigAction::Set { key, value } => {
            engine.set_value(&key, parse_cli_value(&value))?;
            println!("{} updated", key);
        }
        ConfigAction::Reset => {
            engine.reset()?;
            println!("settings reset");
        }
    }
    Ok(())
}
