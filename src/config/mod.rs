pub mod settings;

pub use settings::{expand_home, Config, TelegramConfig};
