use crate::cli::ConfigAction;
use crate::commands::print_status;
use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;

pub fn handle_config_action(
    action: ConfigAction,
    config_path: Option<&Path>,
    json_output: bool,
) -> Result<()> {
    let path = Config::resolve_path(config_path)?;

    match action {
        ConfigAction::Init => {
            Config::default()
                .save(&path)
                .context("Failed to initialize config")?;
            print_status(
                json_output,
                &format!("Configuration initialized at: {}", path.display()),
            );
        }
        ConfigAction::Show => {
            let config = redacted(Config::load(Some(&path)).context("Failed to load config")?);
            if json_output {
                let json = serde_json::to_string_pretty(&config)
                    .context("Failed to serialize config to JSON")?;
                println!("{}", json);
            } else {
                let toml_str =
                    toml::to_string_pretty(&config).context("Failed to serialize config")?;
                println!("Configuration ({})", path.display());
                println!("{}", toml_str);
            }
        }
        ConfigAction::Set { key, value } => {
            // File values only, so environment secrets never end up on disk
            let mut config = Config::load_file(Some(&path)).context("Failed to load config")?;
            config
                .set_value(&key, &value)
                .context("Invalid configuration")?;
            config.save(&path).context("Failed to save config")?;

            let shown = if is_secret_key(&key) {
                mask_secret(&value)
            } else {
                value
            };
            print_status(
                json_output,
                &format!("Configuration updated: {} = {}", key, shown),
            );
        }
    }

    Ok(())
}

fn is_secret_key(key: &str) -> bool {
    matches!(key, "cloudflare.api_token" | "telegram.bot_token")
}

/// Keep the last four characters so tokens stay recognisable
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

fn redacted(mut config: Config) -> Config {
    config.cloudflare.api_token = mask_secret(&config.cloudflare.api_token);
    config.telegram.bot_token = mask_secret(&config.telegram.bot_token);
    config
}
