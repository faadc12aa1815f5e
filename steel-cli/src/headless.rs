//! Line-oriented command loop.
//!
//! - Lines starting with `/` run a command: `/apply_damage {"target": "Goblin", "amount": 5}`
//! - Lines starting with `#` control the session (channel, commands, help, quit)

use std::io::{self, BufRead, Write};
use steel_core::{ChannelKey, Tracker, TrackerCommand};

const HELP: &[&str] = &[
    "  /<command> [json]        - Run a command, options as a JSON object",
    "  #channel <key>           - Switch to another channel",
    "  #commands                - List available commands",
    "  #schema <command>        - Show a command's options",
    "  #suggest <kind> [prefix] - Suggest combatants, groups, abilities or kits",
    "  #quit                    - Exit",
    "  #help                    - Show this help",
];

pub async fn run_headless(tracker: Tracker, channel: String) {
    let mut channel = ChannelKey::new(channel);

    println!("=== Draw Steel Tracker ===");
    println!(
        "Channel: {channel} • {} abilities • {} kits",
        tracker.content().ability_count(),
        tracker.content().kit_count()
    );
    println!();
    for line in HELP {
        println!("{line}");
    }
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('#') {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("Goodbye!");
                    break;
                }
                Some("channel") => match parts.get(1) {
                    Some(key) => {
                        channel = ChannelKey::from(*key);
                        println!("[CHANNEL] {channel}");
                    }
                    None => println!("[ERROR] Usage: #channel <key>"),
                },
                Some("commands") => {
                    for definition in TrackerCommand::definitions() {
                        println!("  /{:<18} {}", definition.name, definition.description);
                    }
                }
                Some("schema") => {
                    let wanted = parts.get(1).map(|n| n.trim_start_matches('/'));
                    match TrackerCommand::definitions()
                        .into_iter()
                        .find(|d| Some(d.name.as_str()) == wanted)
                    {
                        Some(definition) => println!(
                            "{}",
                            serde_json::to_string_pretty(&definition.options)
                                .unwrap_or_default()
                        ),
                        None => println!("[ERROR] Usage: #schema <command>"),
                    }
                }
                Some("suggest") => {
                    let prefix = parts.get(2).copied().unwrap_or("");
                    let names = match parts.get(1).copied() {
                        Some("combatants") => tracker.list_combatant_names(&channel, prefix).await,
                        Some("groups") => tracker.list_groups(&channel, prefix).await,
                        Some("abilities") => Ok(tracker.ability_names(prefix)),
                        Some("kits") => Ok(tracker.kit_names(prefix)),
                        _ => {
                            println!("[ERROR] Usage: #suggest <combatants|groups|abilities|kits> [prefix]");
                            continue;
                        }
                    };
                    match names {
                        Ok(names) => println!("[SUGGEST] {}", names.join(", ")),
                        Err(e) => println!("[ERROR] {e}"),
                    }
                }
                Some("help") => {
                    println!("[HELP]");
                    for line in HELP {
                        println!("{line}");
                    }
                }
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush().ok();
            continue;
        }

        let Some(invocation) = line.strip_prefix('/') else {
            println!("[ERROR] Commands start with '/'. Type #help for help.");
            continue;
        };

        let (name, raw_args) = match invocation.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (invocation, ""),
        };
        let args = if raw_args.is_empty() {
            Ok(serde_json::Value::Null)
        } else {
            serde_json::from_str(raw_args)
        };

        let result = match args {
            Ok(args) => match TrackerCommand::from_invocation(name, args) {
                Ok(command) => tracker.execute(&channel, command).await,
                Err(e) => Err(e),
            },
            Err(e) => {
                println!("[ERROR] Options must be a JSON object: {e}");
                continue;
            }
        };

        match result {
            Ok(output) => {
                println!("[OK]");
                println!("{output}");
            }
            Err(e) => println!("[ERROR] {e}"),
        }
        println!();
        stdout.flush().ok();
    }
}
