use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, process::Command};

use crate::ipc;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("treectl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => {
            let r = ipc::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("scene") => {
            let r = ipc::client_request(serde_json::json!({"op":"scene"}))?;
            print_response(&r);
            Ok(())
        }

        Some("reload") => {
            let r = ipc::client_request(serde_json::json!({"op":"reload"}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: treectl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let r = ipc::client_request(serde_json::json!({"op":"list"}))?;
            print_response(&r);
            Ok(())
        }

        Some("doctor") => {
            let r = ipc::client_request(serde_json::json!({"op":"doctor"}))?;
            print_response(&r);
            Ok(())
        }

        Some("wish") => {
            let r = ipc::client_request(serde_json::json!({"op":"wish"}))?;
            print_response(&r);
            Ok(())
        }

        Some("dismiss") => {
            let r = ipc::client_request(serde_json::json!({"op":"dismiss"}))?;
            print_response(&r);
            Ok(())
        }

        Some("send") => {
            let words: Vec<String> = pargs
                .finish()
                .into_iter()
                .map(|s| s.to_string_lossy().into_owned())
                .collect();
            let text = words.join(" ");
            if text.trim().is_empty() {
                return Err(anyhow!("usage: treectl send <your wish text>"));
            }
            let r = ipc::client_request(serde_json::json!({"op":"send","text":text}))?;
            print_response(&r);
            Ok(())
        }

        // direct one-shot fetch, bypasses the daemon and its cache
        Some("fetch") => {
            use crate::wishes::{GeminiFetcher, WishFetcher};
            let cfg = crate::config::DaemonConfigState::load_or_install_default()?;
            let fetcher = GeminiFetcher::from_env(&cfg.profile.wishes)?;
            let pool = fetcher.fetch()?;
            println!("{}", serde_json::to_string_pretty(&pool)?);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"treectl — hand-gesture daemon for the particle tree

USAGE:
  treectl help [command]         Show general or command-specific help
  treectl start                  Start the daemon
  treectl stop                   Stop the daemon
  treectl status                 Show phase, spread, rotation, wish state
  treectl scene                  Poll one frame of renderer transforms
  treectl reload                 Reload active profile
  treectl use <name>             Switch active profile
  treectl list                   List profiles
  treectl doctor                 Diagnose helper/API-key setup
  treectl wish                   Request a greeting (cached after first fetch)
  treectl dismiss                Dismiss the displayed greeting
  treectl send <text>            Send a wish into the light (cosmetic)
  treectl fetch                  One-shot greeting fetch without the daemon

TIPS:
  - Profiles: ~/.config/treectl/profiles
  - Active profile pointer: ~/.config/treectl/active
  - Wish feature needs GEMINI_API_KEY in the daemon's environment
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: treectl start\nStarts the background daemon."),
        "stop" => println!("usage: treectl stop\nStops the running daemon."),
        "status" => println!(
            "usage: treectl status\nShows phase (STANDBY/ACTIVE/BURST), spread %, rotation, wish state."
        ),
        "scene" => println!(
            "usage: treectl scene\nReturns one display frame of transforms; poll at refresh rate."
        ),
        "reload" => println!(
            "usage: treectl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: treectl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => {
            println!("usage: treectl list\nLists available profiles.")
        }
        "doctor" => println!(
            "usage: treectl doctor\nChecks the tracking helper and wish API credential."
        ),
        "wish" => println!(
            "usage: treectl wish\nFetches a greeting batch once per session, then picks from the cache."
        ),
        "dismiss" => println!("usage: treectl dismiss\nClears the displayed greeting."),
        "send" => println!(
            "usage: treectl send <text>\nAcknowledges your wish with a toast. Nothing is delivered anywhere."
        ),
        "fetch" => println!(
            "usage: treectl fetch\nOne-shot greeting fetch printed to stdout, no daemon required."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
