//! echo-ctl — command-line interface for the Echo daemon.

mod cmd;

use anyhow::{Context, Result};

use cmd::analysis::cmd_analyze;
use cmd::sessions::{cmd_session_end, cmd_session_inspect};
use cmd::status::cmd_status;

const DEFAULT_PORT: u16 = 3000;

fn print_usage() {
    println!("Usage: echo-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                  Show connections, queues, and active sessions");
    println!("  sessions inspect <id>   Show one session in detail");
    println!("  sessions end <id>       End a session and notify both participants");
    println!("  analyze <text>          Run text analysis on a message");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd_status(port).await,
        ["sessions", "inspect", id] => cmd_session_inspect(port, id).await,
        ["sessions", "end", id] => cmd_session_end(port, id).await,
        ["analyze", words @ ..] if !words.is_empty() => cmd_analyze(port, &words.join(" ")).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
