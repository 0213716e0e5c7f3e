//! Moderation services: the violation pipeline, the appeal protocol, the
//! moderator command surface and the leveling supplement.

pub mod appeals;
pub mod escalation;
pub mod leveling;
pub mod moderation;

use crate::persist::scheduler;
use crate::state::Warden;
use futures_util::stream::{self, StreamExt};
use sentinel_proto::{Event, GuildId};
use std::sync::Arc;
use tracing::{debug, info};

/// Dispatch one connector event. Spawned per event by the gateway so a slow
/// platform round-trip in one handler never blocks the read loop.
pub async fn handle_event(warden: Arc<Warden>, event: Event) {
    match event {
        Event::Hello { connector, guilds, .. } => {
            info!(connector = %connector, guilds = guilds.len(), "connector ready");
            init_guilds(&warden, guilds).await;
        }
        Event::GuildAvailable { guild } => {
            init_guilds(&warden, vec![guild]).await;
        }
        Event::Message { message } => {
            escalation::handle_message(&warden, message, false).await;
        }
        Event::MessageEdit { message, before } => {
            if before.as_deref() == Some(message.content.as_str()) {
                return;
            }
            escalation::handle_message(&warden, message, true).await;
        }
        Event::ReactionAdd { reaction } => {
            appeals::handle_reaction(&warden, reaction).await;
        }
        Event::Command {
            guild,
            channel,
            invoker,
            name,
            args,
        } => {
            moderation::dispatch_command(&warden, guild, channel, invoker, &name, &args).await;
        }
    }
}

/// Rehydrate state for newly announced guilds, with bounded fan-out.
async fn init_guilds(warden: &Arc<Warden>, guilds: Vec<GuildId>) {
    let fresh: Vec<GuildId> = guilds
        .into_iter()
        .filter(|guild| warden.register_guild(*guild))
        .collect();
    if fresh.is_empty() {
        return;
    }
    let concurrency = warden.config.persistence.save_concurrency.max(1);
    stream::iter(fresh)
        .for_each_concurrent(concurrency, |guild| async move {
            scheduler::load_guild_flags(warden, guild).await;
            leveling::init_guild_xp(warden, guild).await;
            debug!(%guild, "guild state initialized");
        })
        .await;
}
