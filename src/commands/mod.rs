pub mod general;

pub use general::{help, idme, ping};
