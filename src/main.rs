use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord bot and web app for scheduling playdates
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Keep everything in memory instead of Postgres (data is lost on exit)
    #[arg(long)]
    memory_store: bool,

    /// Log at debug level
    #[arg(long, short = 'v')]
    verbose: bool,
}

mod attendance;
mod commands;
mod config;
mod error;
mod events;
mod gateway;
mod logging;
mod models;
mod release_notes;
mod scanner;
mod store;
mod timefmt;
mod web;

use attendance::AttendanceReconciler;
use commands::{help, idme, ping};
use config::{AppConfig, DiscordConfig};
use events::{announce_ready, handle_reaction_add};
use gateway::{SerenityGateway, SharedGateway};
use scanner::LifecycleScanner;
use store::{MemoryStore, PgStore, SharedStore};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub gateway: SharedGateway,
    pub reconciler: Arc<AttendanceReconciler>,
    pub app: Arc<AppConfig>,
    pub discord: Arc<DiscordConfig>,
}

async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            handle_reaction_add(add_reaction, data).await;
        }
        serenity::FullEvent::Ready { data_about_bot } => {
            info!("Gateway ready as {}", data_about_bot.user.name);
            announce_ready(data.gateway.as_ref(), data.discord.channel_id).await;
        }
        _ => {}
    }
    Ok(())
}

async fn open_store(app: &AppConfig, in_memory: bool) -> Result<SharedStore> {
    if in_memory {
        warn!("--memory-store: playdates and players will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }
    info!("Connecting to Postgres...");
    Ok(Arc::new(PgStore::connect(&app.database_url).await?))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    logging::init(args.verbose);

    let discord = Arc::new(DiscordConfig::from_env()?);
    let app = Arc::new(AppConfig::from_env()?);
    let store = open_store(&app, args.memory_store).await?;

    if !discord.oauth_enabled() {
        warn!("DISCORD_CLIENT_ID or DISCORD_CLIENT_SECRET not set: Discord login is disabled");
    }

    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;

    if sync_commands {
        info!("--sync-commands: Will force re-register slash commands");
    }
    if guild_commands {
        info!("--guild-commands: Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }

    let token = discord.token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![ping(), help(), idme()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx.say(format!("An error occurred: {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
                            error!("Argument parse error in '{}': {} (input: {:?})", ctx.command().qualified_name, error, input);
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let store = store.clone();
            let app = app.clone();
            let discord = discord.clone();

            Box::pin(async move {
                info!("Bot logged in as: {} ({})", ready.user.name, ready.user.id);

                let guilds_to_register: Vec<serenity::GuildId> = match discord.guild_id {
                    Some(gid) => vec![gid],
                    None => ready.guilds.iter().map(|g| g.id).collect(),
                };

                if guild_commands || sync_commands {
                    for guild_id in &guilds_to_register {
                        info!("Registering commands to guild: {}", guild_id);
                        if let Err(e) = poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            *guild_id,
                        ).await {
                            error!("Failed to register commands for guild {}: {}", guild_id, e);
                        } else {
                            info!("Successfully registered {} commands for guild {}",
                                  framework.options().commands.len(), guild_id);
                        }
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) = poise::builtins::register_globally(
                        ctx,
                        &framework.options().commands,
                    ).await {
                        error!("Failed to register commands globally: {}", e);
                    } else {
                        info!("Successfully registered {} commands globally (may take up to 1 hour to propagate)",
                              framework.options().commands.len());
                    }
                }

                let gateway: SharedGateway = Arc::new(SerenityGateway::new(ctx.http.clone()));

                let reconciler = Arc::new(AttendanceReconciler::new(
                    store.clone(),
                    gateway.clone(),
                    ready.user.id,
                    discord.channel_id,
                    app.signup_url(),
                ));

                let scanner = LifecycleScanner::new(
                    store.clone(),
                    gateway.clone(),
                    discord.channel_id,
                    app.scan_interval,
                );
                tokio::spawn(async move { scanner.run().await });

                let web_state = web::AppState {
                    store,
                    gateway: gateway.clone(),
                    app: app.clone(),
                    discord: discord.clone(),
                    oauth_states: Arc::new(web::OAuthStateStore::default()),
                    http_client: reqwest::Client::new(),
                };
                let web_config = web::WebServerConfig::from_env();
                tokio::spawn(async move {
                    info!("Starting web server...");
                    if let Err(e) = web::start_web_server(web_config, web_state).await {
                        error!("Web server error: {}", e);
                    }
                });

                if let Some(repo) = app.release_notes_repo.clone() {
                    let gateway = gateway.clone();
                    let channel = discord.channel_id;
                    tokio::spawn(async move {
                        release_notes::announce_latest_release(
                            &reqwest::Client::new(),
                            gateway.as_ref(),
                            channel,
                            &repo,
                        )
                        .await;
                    });
                }

                Ok(Data {
                    gateway,
                    reconciler,
                    app,
                    discord,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    client.start().await?;
    warn!("Bot ended.");

    Ok(())
}
