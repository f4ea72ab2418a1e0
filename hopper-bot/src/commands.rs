use poise::CreateReply;
use poise::command;
use poise::serenity_prelude::{
    ChannelType, CreateEmbed, GetMessages, GuildChannel, MessageId, RoleId,
};
use serde_json::Value;
use tracing::debug;

use crate::Context;
use crate::audit::{AuditEntry, AuditStatus};
use hopper_exaroton::protocol::{player_name, status_label};

pub(crate) type Error = Box<dyn std::error::Error + Send + Sync>;

const COLOR_ROLES: [&str; 7] = ["Red", "Blue", "Green", "Yellow", "Purple", "Pink", "Orange"];
const ANNOUNCEMENT_ROLE_NAME: &str = "announcement";
const ANNOUNCEMENT_FOOTER: &str = "Remember to check pinned announcements!";
const DEFAULT_DELETE_COUNT: usize = 1000;
const MAX_DELETE_PER_BATCH: usize = 100;

/// Valid Minecraft username: 1-16 characters from [A-Za-z0-9_].
fn valid_player_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 16
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn audit(ctx: Context<'_>, status: AuditStatus, action: &str, details: &str) {
    let guild = ctx
        .guild()
        .map(|g| g.name.clone())
        .unwrap_or_else(|| "DM".to_string());
    let channel = ctx
        .channel_id()
        .name(ctx.serenity_context())
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    let entry = AuditEntry {
        status,
        command: format!("/{}", ctx.command().qualified_name),
        action: action.to_string(),
        user_name: ctx.author().name.clone(),
        user_id: ctx.author().id.get(),
        guild,
        channel: format!("#{channel}"),
        details: details.to_string(),
    };
    ctx.data()
        .audit
        .record(&ctx.serenity_context().http, entry)
        .await;
}

/// Permission gate for privileged commands; replies and returns false when
/// the caller lacks an admin role.
async fn ensure_admin(ctx: Context<'_>) -> Result<bool, Error> {
    let admin_roles = &ctx.data().config.admin_role_ids;
    let allowed = ctx
        .author_member()
        .await
        .is_some_and(|member| member.roles.iter().any(|r| admin_roles.contains(&r.get())));
    if !allowed {
        audit(ctx, AuditStatus::Failure, "permission check", "User lacks permission").await;
        ctx.send(
            CreateReply::default()
                .content("You do not have permission to use this command.")
                .ephemeral(true),
        )
        .await?;
    }
    Ok(allowed)
}

async fn reply_ephemeral(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.send(CreateReply::default().content(content.into()).ephemeral(true))
        .await?;
    Ok(())
}

async fn find_role_by_name(ctx: Context<'_>, name: &str) -> Result<Option<RoleId>, Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(None);
    };
    let roles = guild_id.roles(ctx.serenity_context()).await?;
    Ok(roles
        .iter()
        .find(|(_, role)| role.name == name)
        .map(|(id, _)| *id))
}

// ---------------------------------------------------------------------------
// /server

/// Manage the Minecraft server
#[command(
    slash_command,
    guild_only,
    subcommands("server_start", "server_stop", "server_restart", "server_status", "server_players"),
    subcommand_required
)]
pub async fn server(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Start the Minecraft server
#[command(slash_command, rename = "start")]
pub async fn server_start(
    ctx: Context<'_>,
    #[description = "Use your own hosting credits (if needed)"] use_own_credits: Option<bool>,
) -> Result<(), Error> {
    let Some(control) = &ctx.data().control else {
        return reply_ephemeral(ctx, "Server controls are not configured.").await;
    };
    ctx.defer_ephemeral().await?;
    let use_own_credits = use_own_credits.unwrap_or(ctx.data().config.use_own_credits);
    let response = control.start_server(use_own_credits).await?;
    let message = response.message("Start request sent.");
    audit(
        ctx,
        AuditStatus::Success,
        "server start",
        &format!(
            "Started server{}",
            if use_own_credits { " (own credits)" } else { "" }
        ),
    )
    .await;
    reply_ephemeral(ctx, message).await
}

/// Stop the Minecraft server
#[command(slash_command, rename = "stop")]
pub async fn server_stop(ctx: Context<'_>) -> Result<(), Error> {
    if !ensure_admin(ctx).await? {
        return Ok(());
    }
    let Some(control) = &ctx.data().control else {
        return reply_ephemeral(ctx, "Server controls are not configured.").await;
    };
    ctx.defer_ephemeral().await?;
    let response = control.stop_server().await?;
    let message = response.message("Stop request sent.");
    audit(ctx, AuditStatus::Success, "server stop", "Stop request sent").await;
    reply_ephemeral(ctx, message).await
}

/// Restart the Minecraft server
#[command(slash_command, rename = "restart")]
pub async fn server_restart(ctx: Context<'_>) -> Result<(), Error> {
    if !ensure_admin(ctx).await? {
        return Ok(());
    }
    let Some(control) = &ctx.data().control else {
        return reply_ephemeral(ctx, "Server controls are not configured.").await;
    };
    ctx.defer_ephemeral().await?;
    let response = control.restart_server().await?;
    let message = response.message("Restart request sent.");
    audit(ctx, AuditStatus::Success, "server restart", "Restart request sent").await;
    reply_ephemeral(ctx, message).await
}

/// Check the Minecraft server status
#[command(slash_command, rename = "status")]
pub async fn server_status(ctx: Context<'_>) -> Result<(), Error> {
    let Some(control) = &ctx.data().control else {
        return reply_ephemeral(ctx, "Server controls are not configured.").await;
    };
    ctx.defer_ephemeral().await?;
    let response = control.get_server().await?;
    if response.is_error() {
        let message = response.message("Failed to fetch status.");
        audit(ctx, AuditStatus::Failure, "server status", &message).await;
        return reply_ephemeral(ctx, message).await;
    }
    let data = response.server_data();
    let status = data.and_then(|d| d.get("status")).and_then(Value::as_i64);
    let label = status_label(status);
    let mut message = format!("Status: {label}");
    if let Some(count) = data
        .and_then(|d| d.get("players"))
        .and_then(|p| p.get("count"))
        .and_then(Value::as_i64)
    {
        message.push_str(&format!(" | players: {count}"));
    }
    if let Some(address) = data.and_then(|d| d.get("address")).and_then(Value::as_str) {
        message.push_str(&format!(" | address: {address}"));
    }
    audit(ctx, AuditStatus::Success, "server status", &format!("Status: {label}")).await;
    reply_ephemeral(ctx, message).await
}

/// List online players
#[command(slash_command, rename = "players")]
pub async fn server_players(ctx: Context<'_>) -> Result<(), Error> {
    let Some(control) = &ctx.data().control else {
        return reply_ephemeral(ctx, "Server controls are not configured.").await;
    };
    ctx.defer_ephemeral().await?;
    let response = control.get_server().await?;
    if response.is_error() {
        let message = response.message("Failed to fetch players.");
        audit(ctx, AuditStatus::Failure, "server players", &message).await;
        return reply_ephemeral(ctx, message).await;
    }
    let names = response
        .server_data()
        .and_then(|d| d.get("players"))
        .and_then(|p| p.get("list"))
        .and_then(Value::as_array)
        .map(|list| {
            let mut seen = std::collections::HashSet::new();
            list.iter()
                .filter_map(player_name)
                .filter(|name| seen.insert(name.to_string()))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let message = if names.is_empty() {
        "No players are currently online.".to_string()
    } else {
        format!("Online players ({}): {}", names.len(), names.join(", "))
    };
    audit(
        ctx,
        AuditStatus::Success,
        "server players",
        &format!("Players online: {}", names.len()),
    )
    .await;
    reply_ephemeral(ctx, message).await
}

// ---------------------------------------------------------------------------
// /op

/// Manage operator status for a player
#[command(
    slash_command,
    guild_only,
    subcommands("op_add", "op_remove"),
    subcommand_required
)]
pub async fn op(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Grant operator status
#[command(slash_command, rename = "add")]
pub async fn op_add(
    ctx: Context<'_>,
    #[description = "Minecraft username"] player: String,
) -> Result<(), Error> {
    op_command(ctx, &player, false).await
}

/// Remove operator status
#[command(slash_command, rename = "remove")]
pub async fn op_remove(
    ctx: Context<'_>,
    #[description = "Minecraft username"] player: String,
) -> Result<(), Error> {
    op_command(ctx, &player, true).await
}

async fn op_command(ctx: Context<'_>, player: &str, remove: bool) -> Result<(), Error> {
    if !ensure_admin(ctx).await? {
        return Ok(());
    }
    let player = player.trim();
    if !valid_player_name(player) {
        audit(
            ctx,
            AuditStatus::Failure,
            "op",
            &format!("Invalid player name: {player}"),
        )
        .await;
        return reply_ephemeral(ctx, "Please provide a valid Minecraft username.").await;
    }
    let Some(stream) = &ctx.data().stream else {
        audit(ctx, AuditStatus::Failure, "op", "Console stream not available").await;
        return reply_ephemeral(ctx, "Console stream is not ready. Try again in a moment.").await;
    };
    let command = if remove {
        format!("deop {player}")
    } else {
        format!("op {player}")
    };
    if !stream.send_console_command(&command) {
        audit(ctx, AuditStatus::Failure, "op", "Console command failed to send").await;
        return reply_ephemeral(
            ctx,
            "Unable to send to the server right now. Try again in a moment.",
        )
        .await;
    }
    let (action, details, reply) = if remove {
        (
            "op remove",
            format!("De-opped {player}"),
            format!("Removed operator status from **{player}**."),
        )
    } else {
        (
            "op add",
            format!("Opped {player}"),
            format!("Granted operator status to **{player}**."),
        )
    };
    audit(ctx, AuditStatus::Success, action, &details).await;
    reply_ephemeral(ctx, reply).await
}

// ---------------------------------------------------------------------------
// /clear

/// Delete messages from the current text channel
#[command(slash_command, guild_only)]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "Number of recent messages to delete (1-1000)"]
    #[min = 1]
    #[max = 1000]
    amount: Option<u16>,
) -> Result<(), Error> {
    if !ensure_admin(ctx).await? {
        return Ok(());
    }
    ctx.defer_ephemeral().await?;

    let channel = ctx.channel_id();
    let http = ctx.serenity_context();
    let mut remaining = amount.map(usize::from).unwrap_or(DEFAULT_DELETE_COUNT);
    let mut deleted_total = 0usize;
    let mut skipped_pinned = 0usize;
    let mut skipped_undeletable = 0usize;
    let mut deleted_individually = false;
    let mut last_id: Option<MessageId> = None;

    while remaining > 0 {
        let mut request = GetMessages::new().limit(remaining.min(MAX_DELETE_PER_BATCH) as u8);
        if let Some(before) = last_id {
            request = request.before(before);
        }
        let batch = channel.messages(http, request).await?;
        if batch.is_empty() {
            break;
        }
        last_id = batch.last().map(|m| m.id);

        let pinned = batch.iter().filter(|m| m.pinned).count();
        skipped_pinned += pinned;
        let deletable: Vec<MessageId> = batch
            .iter()
            .filter(|m| !m.pinned)
            .map(|m| m.id)
            .take(remaining)
            .collect();
        if deletable.is_empty() {
            continue;
        }

        if deletable.len() >= 2 {
            match channel.delete_messages(http, deletable.iter().copied()).await {
                Ok(()) => {
                    deleted_total += deletable.len();
                    remaining -= deletable.len();
                    continue;
                }
                // Bulk delete refuses messages older than 14 days.
                Err(err) => debug!("bulk delete fell back to single deletes: {err}"),
            }
        }
        deleted_individually = true;
        for id in deletable {
            if remaining == 0 {
                break;
            }
            match channel.delete_message(http, id).await {
                Ok(()) => {
                    deleted_total += 1;
                    remaining -= 1;
                }
                Err(_) => skipped_undeletable += 1,
            }
        }
    }

    let mut message = format!(
        "Cleared {deleted_total} message{}.",
        if deleted_total == 1 { "" } else { "s" }
    );
    if deleted_individually {
        message.push_str(" Messages older than 14 days were deleted individually.");
    }
    let mut skipped_notes = Vec::new();
    if skipped_pinned > 0 {
        skipped_notes.push(format!("{skipped_pinned} pinned"));
    }
    if skipped_undeletable > 0 {
        skipped_notes.push(format!("{skipped_undeletable} protected"));
    }
    if !skipped_notes.is_empty() {
        message.push_str(&format!(" Skipped {} messages.", skipped_notes.join(" and ")));
    }

    audit(
        ctx,
        AuditStatus::Success,
        "clear",
        &format!("Cleared {deleted_total} messages"),
    )
    .await;
    reply_ephemeral(ctx, message).await
}

// ---------------------------------------------------------------------------
// /color and /tag

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ColorChoice {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Pink,
    Orange,
}

impl ColorChoice {
    fn as_str(self) -> &'static str {
        match self {
            ColorChoice::Red => "Red",
            ColorChoice::Blue => "Blue",
            ColorChoice::Green => "Green",
            ColorChoice::Yellow => "Yellow",
            ColorChoice::Purple => "Purple",
            ColorChoice::Pink => "Pink",
            ColorChoice::Orange => "Orange",
        }
    }
}

/// Change your username color
#[command(slash_command, guild_only)]
pub async fn color(
    ctx: Context<'_>,
    #[description = "Choose a color"] color: ColorChoice,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let Some(member) = ctx.author_member().await else {
        return reply_ephemeral(ctx, "Could not resolve your guild membership.").await;
    };
    let roles = guild_id.roles(ctx.serenity_context()).await?;

    // Swap out any previous color role.
    for (id, role) in &roles {
        if COLOR_ROLES.contains(&role.name.as_str()) && member.roles.contains(id) {
            member.remove_role(ctx.serenity_context(), *id).await?;
        }
    }

    let Some((new_role, _)) = roles.iter().find(|(_, r)| r.name == color.as_str()) else {
        audit(
            ctx,
            AuditStatus::Failure,
            "color",
            &format!("Role not found: {}", color.as_str()),
        )
        .await;
        return reply_ephemeral(ctx, "Color role not found.").await;
    };
    member.add_role(ctx.serenity_context(), *new_role).await?;
    audit(
        ctx,
        AuditStatus::Success,
        "color",
        &format!("Set color to {}", color.as_str()),
    )
    .await;
    reply_ephemeral(ctx, format!("Your color is now **{}**", color.as_str())).await
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum TagChoice {
    Builder,
    Miner,
    Farmer,
    Redstoner,
    Explorer,
}

impl TagChoice {
    fn as_str(self) -> &'static str {
        match self {
            TagChoice::Builder => "Builder",
            TagChoice::Miner => "Miner",
            TagChoice::Farmer => "Farmer",
            TagChoice::Redstoner => "Redstoner",
            TagChoice::Explorer => "Explorer",
        }
    }
}

/// Manage your Minecraft tags
#[command(
    slash_command,
    guild_only,
    subcommands("tag_add", "tag_remove"),
    subcommand_required
)]
pub async fn tag(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Add a tag to your profile
#[command(slash_command, rename = "add")]
pub async fn tag_add(
    ctx: Context<'_>,
    #[description = "Which tag to add"] tag: TagChoice,
) -> Result<(), Error> {
    tag_command(ctx, tag, false).await
}

/// Remove a tag from your profile
#[command(slash_command, rename = "remove")]
pub async fn tag_remove(
    ctx: Context<'_>,
    #[description = "Which tag to remove"] tag: TagChoice,
) -> Result<(), Error> {
    tag_command(ctx, tag, true).await
}

async fn tag_command(ctx: Context<'_>, tag: TagChoice, remove: bool) -> Result<(), Error> {
    let Some(role) = find_role_by_name(ctx, tag.as_str()).await? else {
        audit(
            ctx,
            AuditStatus::Failure,
            "tag",
            &format!("Role not found: {}", tag.as_str()),
        )
        .await;
        return reply_ephemeral(ctx, "Tag role not found.").await;
    };
    let Some(member) = ctx.author_member().await else {
        return reply_ephemeral(ctx, "Could not resolve your guild membership.").await;
    };
    if remove {
        member.remove_role(ctx.serenity_context(), role).await?;
        audit(
            ctx,
            AuditStatus::Success,
            "tag remove",
            &format!("Removed tag {}", tag.as_str()),
        )
        .await;
        reply_ephemeral(ctx, format!("Removed tag **{}**", tag.as_str())).await
    } else {
        member.add_role(ctx.serenity_context(), role).await?;
        audit(
            ctx,
            AuditStatus::Success,
            "tag add",
            &format!("Added tag {}", tag.as_str()),
        )
        .await;
        reply_ephemeral(ctx, format!("Added tag **{}** ⛏️", tag.as_str())).await
    }
}

// ---------------------------------------------------------------------------
// /announcements and /announce

/// Manage announcement role subscriptions
#[command(
    slash_command,
    guild_only,
    subcommands("announcements_subscribe", "announcements_unsubscribe"),
    subcommand_required
)]
pub async fn announcements(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Get the announcement role
#[command(slash_command, rename = "subscribe")]
pub async fn announcements_subscribe(ctx: Context<'_>) -> Result<(), Error> {
    announcements_command(ctx, true).await
}

/// Remove the announcement role
#[command(slash_command, rename = "unsubscribe")]
pub async fn announcements_unsubscribe(ctx: Context<'_>) -> Result<(), Error> {
    announcements_command(ctx, false).await
}

async fn announcements_command(ctx: Context<'_>, subscribe: bool) -> Result<(), Error> {
    let Some(role) = find_role_by_name(ctx, ANNOUNCEMENT_ROLE_NAME).await? else {
        audit(
            ctx,
            AuditStatus::Failure,
            "announcements",
            &format!("Role not found: {ANNOUNCEMENT_ROLE_NAME}"),
        )
        .await;
        return reply_ephemeral(ctx, format!("Role \"{ANNOUNCEMENT_ROLE_NAME}\" not found."))
            .await;
    };
    let Some(member) = ctx.author_member().await else {
        return reply_ephemeral(ctx, "Could not resolve your guild membership.").await;
    };
    let has_role = member.roles.contains(&role);
    if subscribe {
        if has_role {
            audit(ctx, AuditStatus::Failure, "announcements subscribe", "User already subscribed")
                .await;
            return reply_ephemeral(ctx, "You already have the announcement role.").await;
        }
        member.add_role(ctx.serenity_context(), role).await?;
        audit(
            ctx,
            AuditStatus::Success,
            "announcements subscribe",
            &format!("Added role {ANNOUNCEMENT_ROLE_NAME}"),
        )
        .await;
        reply_ephemeral(ctx, "You are now subscribed to announcements.").await
    } else {
        if !has_role {
            audit(ctx, AuditStatus::Failure, "announcements unsubscribe", "User not subscribed")
                .await;
            return reply_ephemeral(ctx, "You do not have the announcement role.").await;
        }
        member.remove_role(ctx.serenity_context(), role).await?;
        audit(
            ctx,
            AuditStatus::Success,
            "announcements unsubscribe",
            &format!("Removed role {ANNOUNCEMENT_ROLE_NAME}"),
        )
        .await;
        reply_ephemeral(ctx, "You are now unsubscribed from announcements.").await
    }
}

pub(crate) fn announcement_body(role_id: u64, message: &str) -> String {
    format!("||<@&{role_id}>||\n\n{message}\n\n{ANNOUNCEMENT_FOOTER}")
}

/// Send an announcement in the announcements channel
#[command(slash_command, guild_only)]
pub async fn announce(
    ctx: Context<'_>,
    #[description = "Announcement text"] message: String,
) -> Result<(), Error> {
    if !ensure_admin(ctx).await? {
        return Ok(());
    }
    let Some(channel_id) = ctx.data().config.announcements_channel_id else {
        return reply_ephemeral(ctx, "No announcements channel is configured.").await;
    };
    let Some(role) = find_role_by_name(ctx, ANNOUNCEMENT_ROLE_NAME).await? else {
        return reply_ephemeral(ctx, format!("Role \"{ANNOUNCEMENT_ROLE_NAME}\" not found."))
            .await;
    };
    let channel = poise::serenity_prelude::ChannelId::new(channel_id);
    channel
        .say(ctx.serenity_context(), announcement_body(role.get(), &message))
        .await?;
    audit(ctx, AuditStatus::Success, "announce", "Announcement posted").await;
    reply_ephemeral(ctx, "Announcement sent.").await
}

// ---------------------------------------------------------------------------
// /say

/// Send a message in a selected channel
#[command(slash_command, guild_only)]
pub async fn say(
    ctx: Context<'_>,
    #[description = "Channel to send the message in"]
    #[channel_types("Text", "News")]
    channel: GuildChannel,
    #[description = "Message to send"] message: String,
) -> Result<(), Error> {
    if !ensure_admin(ctx).await? {
        return Ok(());
    }
    if !matches!(channel.kind, ChannelType::Text | ChannelType::News) {
        return reply_ephemeral(ctx, "Please select a text-based channel.").await;
    }
    channel.id.say(ctx.serenity_context(), &message).await?;
    audit(
        ctx,
        AuditStatus::Success,
        "say",
        &format!("Message sent in #{}", channel.name),
    )
    .await;
    reply_ephemeral(ctx, format!("Message sent in #{}.", channel.name)).await
}

// ---------------------------------------------------------------------------
// /help

/// Learn what this bot can do
#[command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let embed = CreateEmbed::default()
        .title("Hopper Help")
        .description("Here is what you can use:")
        .field(
            "Live Chat",
            "Messages in the live chat channel get sent to the Minecraft server, \
             and in-game chat appears in that channel.",
            false,
        )
        .field(
            "Server Status",
            "The status panel shows whether the server is online, plus the player \
             count and list.",
            false,
        )
        .field(
            "/server status",
            "Check the current server state, player count, and address in a quick reply.",
            false,
        )
        .field(
            "/server players",
            "Get a list of who is online right now, or a message that nobody is online.",
            false,
        )
        .field(
            "/tag",
            "Add or remove your Minecraft tag role (Builder, Miner, Farmer, Redstoner, Explorer).",
            false,
        )
        .field(
            "/color",
            "Pick a username color role and the bot will swap your color for you.",
            false,
        )
        .field(
            "/announcements",
            "Subscribe or unsubscribe to the announcement role so you can get pings \
             when updates are posted.",
            false,
        );
    audit(ctx, AuditStatus::Success, "help", "Displayed player help").await;
    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
