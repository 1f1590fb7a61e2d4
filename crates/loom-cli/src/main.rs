mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use loom_core::EXPORT_FILENAME;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use crate::session::{parse_command, Session};

#[derive(Parser)]
#[clap(author, version, about = "Build a React UI by chatting with Loom")]
struct CliArgs {
    #[clap(short, long)]
    log_level: Option<String>,
    /// Base URL of loom-server
    #[clap(short, long, default_value = "http://localhost:3001")]
    server: String,
    /// Default destination of :export
    #[clap(short, long, default_value = EXPORT_FILENAME)]
    export_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(&args.log_level);

    let mut session = Session::new(&args.server, args.export_path);
    println!("Loom shell connected to {} (type :help for commands, :quit to leave).", args.server);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"loom> ").await?;
        stdout.flush().await?;

        // One request at a time: the next line is not read until this one is done
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        debug!("command: {:?}", command);

        match session.execute(command).await {
            Ok(true) => debug!("canvas at revision {}", session.revision()),
            Ok(false) => break,
            Err(e) => println!("error: {:#}", e),
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_deref()
        .unwrap_or("info")
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("hyper=warn,reqwest=warn,{}", log_level)))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
