use poise::serenity_prelude as serenity;
use tracing::info;

use crate::{Context, Error};

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(
        poise::CreateReply::default()
            .content("Pong! Let's Play!")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Get your Discord User ID
#[poise::command(slash_command)]
pub async fn idme(ctx: Context<'_>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(idme_reply(ctx.author().id))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

fn idme_reply(user: serenity::UserId) -> String {
    format!("Your Discord User ID is: {}", user)
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let signup = ctx.data().app.signup_url();
    let embed = serenity::CreateEmbed::new()
        .title("PlayDate")
        .description(format!(
            "Schedule games with friends at {}.\nReact to a playdate announcement with 👍 (yes), 🤔 (maybe) or 👎 (no).",
            ctx.data().app.base_url
        ))
        .field("/idme", "Show your Discord User ID (needed to register)", false)
        .field("/ping", "Check if the bot is running", false)
        .field("Sign up", signup, false)
        .color(0xfadde6);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idme_reply() {
        assert_eq!(
            idme_reply(serenity::UserId::new(128629520742744065)),
            "Your Discord User ID is: 128629520742744065"
        );
    }
}
