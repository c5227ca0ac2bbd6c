pub mod reaction;
pub mod ready;

pub use reaction::handle_reaction_add;
pub use ready::announce_ready;
