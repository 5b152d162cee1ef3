use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "GS_HOST",
        "GS_PORT",
        "GS_DATABASE_URL",
        "GS_CURRENCY",
        "GS_UNPAID_ORDER_TIMEOUT",
        "GS_RECONCILE_INTERVAL",
        "GS_STRIPE_API_URL",
        "GS_STRIPE_WEBHOOK_TOLERANCE",
        "GS_FRONTEND_URL",
        "GS_MAIL_RELAY_URL",
        "GS_MAIL_FROM",
        "GS_SEND_RECEIPTS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
