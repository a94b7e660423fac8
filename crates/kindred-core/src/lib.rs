pub mod actions;
pub mod attachments;
pub mod card_stack;
pub mod config;
pub mod gesture;
pub mod outcome;
pub mod persistence;
pub mod profile;
pub mod recommend;
pub mod reducer;
pub mod state;
pub mod swipe;
pub mod timers;
pub mod transcript;

pub use actions::*;
pub use reducer::*;
pub use state::*;

pub use config::KindredConfig;
pub use persistence::*;
