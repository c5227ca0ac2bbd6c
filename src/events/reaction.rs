use poise::serenity_prelude as serenity;
use tracing::debug;

use crate::attendance::ReactionNotice;
use crate::Data;

/// Hand a new reaction to the attendance reconciler
pub async fn handle_reaction_add(reaction: &serenity::Reaction, data: &Data) {
    let Some(notice) = ReactionNotice::from_reaction(reaction) else {
        debug!("Reaction on message {} has no user, skipping", reaction.message_id);
        return;
    };
    data.reconciler.handle(notice).await;
}
