pub mod app;
pub mod discord;

pub use app::AppConfig;
pub use discord::DiscordConfig;
