//! burrow - interactive client for the burrow daemon
//!
//! Local commands:
//! - `put <local> [remote]` uploads a local file
//! - `get <remote> [local]` downloads into a local file
//! - `ls` prints the listing
//! - `quit` ends the session
//!
//! Any other line is sent to the server as-is and the reply printed.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use burrow::cli::ClientOpts;
use burrow::client::Client;

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("stdin closed");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn file_name_of(path: &str) -> Result<String> {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("no file name in {}", path))
}

fn rate(bytes: u64, start: Instant) -> String {
    let secs = start.elapsed().as_secs_f64().max(0.001);
    format!("{:.2} MB/s", bytes as f64 / secs / 1_048_576.0)
}

/// Handle one input line. Returns false once the session is over.
fn run_line(client: &mut Client, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or("");
    let first = parts.next();
    let second = parts.next();

    match (verb.to_ascii_lowercase().as_str(), first) {
        ("put", Some(local)) => {
            let remote = match second {
                Some(r) => r.to_string(),
                None => file_name_of(local)?,
            };
            let start = Instant::now();
            let n = client.put_file(Path::new(local), &remote)?;
            println!("Uploaded {} bytes to {} ({})", n, remote, rate(n, start));
        }
        ("get", Some(remote)) => {
            let local = match second {
                Some(l) => PathBuf::from(l),
                None => PathBuf::from(file_name_of(remote)?),
            };
            let start = Instant::now();
            let n = client.get_file(remote, &local)?;
            println!("Downloaded {} bytes to {} ({})", n, local.display(), rate(n, start));
        }
        ("ls", None) => {
            for entry in client.list()? {
                println!("{}", entry);
            }
        }
        ("quit", None) => {
            println!("{}", client.command("QUIT")?);
            return Ok(false);
        }
        _ => println!("{}", client.command(line)?),
    }
    Ok(true)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let opts = ClientOpts::parse();

    let mut client = Client::connect(&opts.addr)?;
    let user = match opts.user {
        Some(u) => u,
        None => prompt("Username: ")?,
    };
    let password = match opts.password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };
    println!("{}", client.login(&user, &password)?);

    loop {
        let line = match prompt("burrow> ") {
            Ok(line) => line,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match run_line(&mut client, line) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            // Local file errors leave the connection usable
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }
    let _ = client.quit();
    Ok(())
}
