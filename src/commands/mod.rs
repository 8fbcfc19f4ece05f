// Command handlers module
pub mod config;
pub mod history;
pub mod run;

// Re-export command handlers for easy access
pub use config::handle_config_action;
pub use history::handle_history_action;
pub use run::handle_run_command;

/// Success line, or `{"status": "success", ...}` with `--json`
pub fn print_status(json_output: bool, message: &str) {
    if json_output {
        println!(
            "{}",
            serde_json::json!({"status": "success", "message": message})
        );
    } else {
        println!("{}", message);
    }
}

/// Error line, or `{"status": "error", ...}` with `--json`
pub fn print_error(json_output: bool, error: &anyhow::Error) {
    if json_output {
        println!(
            "{}",
            serde_json::json!({"status": "error", "message": format!("{error:#}")})
        );
    } else {
        eprintln!("Error: {:#}", error);
    }
}
