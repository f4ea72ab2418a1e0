mod audit;
mod bridge;
mod commands;
mod config;
mod panel;
mod relay;

use std::sync::Arc;

use hopper_exaroton::control::ControlClient;
use hopper_exaroton::stream::{StatusStream, StreamConfig, StreamHandle};
use poise::{Framework, FrameworkOptions, serenity_prelude as serenity};

use crate::audit::CommandAudit;
use crate::bridge::{BridgeContext, ChatCooldowns};
use crate::config::Config;

type Context<'a> = poise::Context<'a, crate::Data, crate::commands::Error>;

pub(crate) struct Data {
    pub(crate) stream: Option<Arc<StreamHandle>>,
    pub(crate) control: Option<ControlClient>,
    pub(crate) config: Config,
    pub(crate) audit: CommandAudit,
    pub(crate) cooldowns: Arc<ChatCooldowns>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting hopper bot...");

    let config = Config::from_env();
    tracing::info!(
        "Configuration: status_mode={:?}, status_channel={:?}, console_channel={:?}, \
         heartbeat={}s, stale_after={}s",
        config.status_mode,
        config.status_channel_id,
        config.console_channel_id,
        config.heartbeat_interval.as_secs(),
        config.stale_after.as_secs()
    );

    let control = match (&config.exaroton_token, &config.exaroton_server_id) {
        (Some(token), Some(server_id)) => match ControlClient::new(token, server_id) {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!("server controls disabled: {err}");
                None
            }
        },
        _ => {
            tracing::info!(
                "EXAROTON_TOKEN / EXAROTON_SERVER_ID not set. Server controls disabled."
            );
            None
        }
    };

    let stream = match (&config.exaroton_token, &config.exaroton_server_id) {
        (Some(token), Some(server_id))
            if config.status_channel_id.is_some() || config.console_channel_id.is_some() =>
        {
            let stream_config = StreamConfig::new(token, server_id)
                .with_console(config.console_channel_id.is_some())
                .with_heartbeat(config.heartbeat_interval, config.stale_after);
            match StatusStream::connect(stream_config) {
                Ok((handle, events)) => {
                    tracing::info!("Starting status stream...");
                    Some((Arc::new(handle), events))
                }
                Err(err) => {
                    tracing::warn!("status stream disabled: {err}");
                    None
                }
            }
        }
        _ => {
            tracing::info!("Status stream not configured. Skipping.");
            None
        }
    };
    let (stream_handle, stream_events) = match stream {
        Some((handle, events)) => (Some(handle), Some(events)),
        None => (None, None),
    };

    let audit = CommandAudit::new(config.log_channel_id);
    let cooldowns = Arc::new(ChatCooldowns::new(config.chat_cooldown));

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let discord_token = config
        .discord_token
        .clone()
        .expect("DISCORD_TOKEN environment variable is required");
    let setup_config = config.clone();
    let setup_stream = stream_handle.clone();

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![
                commands::server(),
                commands::op(),
                commands::clear(),
                commands::color(),
                commands::tag(),
                commands::announcements(),
                commands::announce(),
                commands::say(),
                commands::help(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Executing command '{}' by user '{}'",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Finished command '{}' by user '{}'",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    if let serenity::FullEvent::Message { new_message } = event {
                        if let (Some(stream), Some(console_channel_id)) =
                            (&data.stream, data.config.console_channel_id)
                        {
                            bridge::handle_message(
                                ctx,
                                new_message,
                                BridgeContext {
                                    stream: stream.as_ref(),
                                    cooldowns: data.cooldowns.as_ref(),
                                    console_channel_id,
                                },
                            )
                            .await;
                        }
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                if let Some(events) = stream_events {
                    tokio::spawn(relay::run(
                        ctx.http.clone(),
                        setup_config.clone(),
                        ready.user.id,
                        events,
                    ));
                }
                Ok(Data {
                    stream: setup_stream,
                    control,
                    config: setup_config,
                    audit,
                    cooldowns,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .expect("Error creating Discord client");
    if let Err(e) = client.start().await {
        tracing::error!("Discord client error: {:?}", e);
    }
    drop(client);

    if let Some(handle) = stream_handle {
        if let Ok(handle) = Arc::try_unwrap(handle) {
            handle.shutdown().await;
        }
    }
}
