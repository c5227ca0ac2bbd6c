use poise::serenity_prelude::ChannelId;
use tracing::{info, warn};

use crate::gateway::ChatGateway;

pub const READY_MESSAGE: &str = "Let's Play!";

/// Tell the playdate channel the bot is online
pub async fn announce_ready(gateway: &dyn ChatGateway, channel: ChannelId) {
    match gateway.send_message(channel, READY_MESSAGE).await {
        Ok(_) => info!("Announced ready in channel {}", channel),
        Err(e) => warn!("Failed to send ready message to {}: {}", channel, e),
    }
}
