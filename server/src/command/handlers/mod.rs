//! Command handlers, one per action family

mod input;
mod launch;
mod volume;

pub use input::{handle_alt_tab, handle_play_pause, handle_screenshot, handle_scroll};
pub use launch::handle_launch;
pub use volume::{handle_volume_down, handle_volume_up};
