#![allow(clippy::multiple_crate_versions)]

use anvilconfig::AnvilConfig;
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use std::process;
use tracing::warn;
use tracing_subscriber::prelude::*;
use worldanvil::resource::{ListedUnder, Resource, Writable};
use worldanvil::resources::World;
use worldanvil::types::EntityRef;
use worldanvil::{
    ClientConfig, ConfigError, Credentials, Deleted, EntityList, Error as AnvilError, Granularity,
    ListOptions, PageOptions, ResourceClient, WorldAnvil, DEFAULT_API_URL,
};

#[derive(Parser)]
#[command(name = "anvil", about = "A CLI for World Anvil")]
struct Cli {
    /// Log requests and token handling
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Exchange an OAuth authorization code for tokens and store them
    Login {
        /// Code returned to the redirect URI
        code: String,
    },
    /// Refresh the stored access token
    Refresh {
        /// Refresh token to use instead of the stored one
        refresh_token: Option<String>,
    },
    /// Show the identity behind the current token
    Whoami,
    /// Check whether the current token is accepted
    Verify,
    /// List the worlds of the current user
    Worlds {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show one world
    World {
        id: String,
        /// Detail level: -1, 0, 1, 2 or 3
        #[arg(short, long, allow_hyphen_values = true)]
        granularity: Option<Granularity>,
    },
    /// Show one entity
    Get {
        kind: Kind,
        id: String,
        /// Detail level: -1, 0, 1, 2 or 3
        #[arg(short, long, allow_hyphen_values = true)]
        granularity: Option<Granularity>,
    },
    /// List the entities of a world
    List {
        kind: Kind,
        world_id: String,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = worldanvil::resource::DEFAULT_LIST_LIMIT)]
        limit: u32,
    },
    /// Delete one entity
    Delete { kind: Kind, id: String },
    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        /// The shell to generate completions for
        shell: Shell,
    },
}

/// Families that live directly under a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Article,
    Category,
    BlockFolder,
    Canvas,
    Image,
    Manuscript,
    Map,
    Notebook,
    Secret,
    SubscriberGroup,
    Timeline,
    VariableCollection,
}

/// Binds `$family` to the sub-client for `$kind` and evaluates `$body`.
macro_rules! with_family {
    ($anvil:expr, $kind:expr, |$family:ident| $body:expr) => {
        match $kind {
            Kind::Article => {
                let $family = $anvil.articles();
                $body
            }
            Kind::Category => {
                let $family = $anvil.categories();
                $body
            }
            Kind::BlockFolder => {
                let $family = $anvil.block_folders();
                $body
            }
            Kind::Canvas => {
                let $family = $anvil.canvases();
                $body
            }
            Kind::Image => {
                let $family = $anvil.images();
                $body
            }
            Kind::Manuscript => {
                let $family = $anvil.manuscripts();
                $body
            }
            Kind::Map => {
                let $family = $anvil.maps();
                $body
            }
            Kind::Notebook => {
                let $family = $anvil.notebooks();
                $body
            }
            Kind::Secret => {
                let $family = $anvil.secrets();
                $body
            }
            Kind::SubscriberGroup => {
                let $family = $anvil.subscriber_groups();
                $body
            }
            Kind::Timeline => {
                let $family = $anvil.timelines();
                $body
            }
            Kind::VariableCollection => {
                let $family = $anvil.variable_collections();
                $body
            }
        }
    };
}

fn init_tracing(verbose: bool) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "worldanvil=debug,anvil=debug,info".to_string()
        } else {
            "worldanvil=info,anvil=info,warn".to_string()
        }
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

fn load_config() -> Result<AnvilConfig> {
    let config = if ClientConfig::from_env().api_key.is_some() {
        AnvilConfig::load()
    } else {
        AnvilConfig::load_or_onboard()
    };
    config.with_context(|| "Failed to load worldanvil config")
}

/// Environment variables win over the config file.
fn credentials(config: &AnvilConfig) -> Result<Credentials> {
    Ok(ClientConfig::from_env()
        .or(config.client_config()?)
        .resolve()?)
}

fn connect(config: &AnvilConfig) -> Result<WorldAnvil> {
    Ok(WorldAnvil::from_credentials(&credentials(config)?))
}

/// Same as [`connect`] but without a bearer token; grants must not carry a
/// stale one.
fn connect_for_grant(config: &AnvilConfig) -> Result<WorldAnvil> {
    let mut credentials = credentials(config)?;
    credentials.access_token = None;
    Ok(WorldAnvil::from_credentials(&credentials))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn warn_granularity<R: Resource>(granularity: Option<Granularity>) {
    if let Some(granularity) = granularity {
        if !R::accepts(granularity) {
            warn!(
                family = R::NAME,
                granularity = %granularity,
                "granularity is not documented for this family; sending it anyway"
            );
        }
    }
}

async fn show<R: Resource>(
    family: &ResourceClient<R>,
    id: &str,
    granularity: Option<Granularity>,
) -> Result<()> {
    warn_granularity::<R>(granularity);
    print_json(&family.get(id, granularity).await?)
}

async fn list<R: ListedUnder<World>>(
    family: &ResourceClient<R>,
    world_id: &str,
    options: &ListOptions,
) -> Result<EntityList<EntityRef>> {
    Ok(family.list_by_world(world_id, options).await?)
}

async fn delete<R: Writable>(family: &ResourceClient<R>, id: &str) -> Result<Deleted> {
    Ok(family.delete(id).await?)
}

fn format_http_error(status: u16, reason: &str, body: &str, class: &str) -> String {
    let reason = if reason.is_empty() {
        "HTTP error"
    } else {
        reason
    };
    let mut output = format!("World Anvil API error ({status} {reason}, {class}):")
        .red()
        .to_string();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = ["error", "message", "reason"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()));
        if let Some(message) = message {
            let _ = write!(output, "\n  - {}", message.replace('\n', " "));
            return output;
        }

        if let Ok(pretty) = serde_json::to_string_pretty(&value) {
            output.push('\n');
            output.push_str(&pretty);
            return output;
        }
    }

    if !body.trim().is_empty() {
        output.push('\n');
        output.push_str(body);
    }

    output
}

fn handle_error(err: &anyhow::Error) -> ! {
    if let Some(api_err) = err.downcast_ref::<AnvilError>() {
        if let AnvilError::HttpStatus {
            status,
            reason,
            body,
        } = api_err
        {
            let class = api_err.class().to_string();
            eprintln!("{}", format_http_error(*status, reason, body, &class));
            if api_err.is_unauthorized() {
                eprintln!("Tip: run `anvil login <code>` or `anvil refresh` for a new token");
            }
            process::exit(1);
        }
    }

    if let Some(ConfigError::MissingApiKey) = err.downcast_ref::<ConfigError>() {
        eprintln!(
            "{err}\nTip: set WORLD_ANVIL_KEY or `api_key` in the worldanvil config file (default API: {DEFAULT_API_URL})"
        );
        process::exit(1);
    }

    eprintln!("{}", format!("{err:#}").red());
    process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        handle_error(&err);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "anvil", &mut std::io::stdout());
        }
        Command::Login { code } => {
            let mut config = load_config()?;
            let anvil = connect_for_grant(&config)?;
            let oauth = config.oauth()?.clone();
            let outcome = anvil
                .authenticate(
                    &code,
                    &oauth.client_id,
                    &oauth.client_secret()?,
                    &oauth.redirect_uri,
                )
                .await?;
            config.remember_tokens(outcome.token());
            config.store()?;
            match outcome.identity() {
                Some(identity) => println!("Logged in as {}", identity.username.green()),
                None => println!("Logged in; identity lookup failed"),
            }
        }
        Command::Refresh { refresh_token } => {
            let mut config = load_config()?;
            let anvil = connect_for_grant(&config)?;
            let oauth = config.oauth()?.clone();
            let refresh_token = match refresh_token {
                Some(token) => token,
                None => config.refresh_token()?,
            };
            let outcome = anvil
                .refresh_token(&refresh_token, &oauth.client_id, &oauth.client_secret()?)
                .await?;
            config.remember_tokens(outcome.token());
            config.store()?;
            println!(
                "Token refreshed; expires in {}s",
                outcome.token().expires_in
            );
        }
        Command::Whoami => {
            let anvil = connect(&load_config()?)?;
            print_json(&anvil.current_identity().await?)?;
        }
        Command::Verify => {
            let anvil = connect(&load_config()?)?;
            if anvil.is_token_valid().await {
                println!("{}", "token is valid".green());
            } else {
                println!("{}", "token is not valid".red());
                process::exit(1);
            }
        }
        Command::Worlds { page, limit } => {
            let anvil = connect(&load_config()?)?;
            let mut options = PageOptions::new();
            if let Some(page) = page {
                options = options.page(page);
            }
            if let Some(limit) = limit {
                options = options.limit(limit);
            }
            let worlds = anvil.my_worlds(&options).await?;
            print_json(&worlds)?;
            eprintln!(
                "{}",
                format!("page {}/{} ({} worlds)", worlds.page, worlds.pages, worlds.total)
                    .dimmed()
            );
        }
        Command::World { id, granularity } => {
            let anvil = connect(&load_config()?)?;
            show(&anvil.worlds(), &id, granularity).await?;
        }
        Command::Get {
            kind,
            id,
            granularity,
        } => {
            let anvil = connect(&load_config()?)?;
            with_family!(anvil, kind, |family| show(&family, &id, granularity).await)?;
        }
        Command::List {
            kind,
            world_id,
            offset,
            limit,
        } => {
            let anvil = connect(&load_config()?)?;
            let options = ListOptions::new(offset, limit);
            let listed =
                with_family!(anvil, kind, |family| list(&family, &world_id, &options).await)?;
            print_json(&listed.entities)?;
        }
        Command::Delete { kind, id } => {
            let anvil = connect(&load_config()?)?;
            let deleted = with_family!(anvil, kind, |family| delete(&family, &id).await)?;
            if deleted.success {
                println!("deleted {id}");
            } else {
                anyhow::bail!("upstream refused to delete {id}");
            }
        }
    }

    Ok(())
}
