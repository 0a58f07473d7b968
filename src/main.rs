// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! sessionjar CLI
//!
//! Sends one request through a session, optionally persisting the session's
//! cookies to a JSON file between runs.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sessionjar::{CookieJar, RequestOptions, Session};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sessionjar=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    match args[1].as_str() {
        method @ ("get" | "head" | "delete" | "options" | "post" | "put" | "patch") => {
            if args.len() < 3 {
                eprintln!("Usage: sessionjar {} <url> [OPTIONS]", method);
                return ExitCode::from(1);
            }
            let cli = match CliOptions::parse(&args[3..]) {
                Ok(cli) => cli,
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::from(1);
                }
            };
            run(method, &args[2], cli).await
        }
        "--help" | "-h" | "help" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "--version" | "-v" | "version" => {
            println!("sessionjar {}", sessionjar::VERSION);
            ExitCode::SUCCESS
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"sessionjar - HTTP requests through a persistent session

USAGE:
    sessionjar <METHOD> <url> [OPTIONS]

METHODS:
    get, head, delete, options, post, put, patch

OPTIONS:
    -H, --header 'Name: value'   Add a request header (repeatable)
    -b, --cookie name=value      Add a request cookie (repeatable)
    -d, --data <body>            Request body (post, put, patch)
    --cookie-file <path>         Load session cookies from, and save them to, a JSON file
    --no-redirects               Do not follow redirects
    --safe                       Report transport errors instead of failing

COMMANDS:
    help            Show this help message
    version         Show version information

EXAMPLES:
    sessionjar get https://example.com -H 'Accept: application/json'
    sessionjar post https://example.com/login -d 'user=me' --cookie-file jar.json
    sessionjar head https://example.com --safe
"#
    );
}

#[derive(Debug, Default)]
struct CliOptions {
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    data: Option<String>,
    cookie_file: Option<PathBuf>,
    no_redirects: bool,
    safe: bool,
}

impl CliOptions {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut cli = CliOptions::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| format!("Missing value for {}", flag))
            };
            match arg.as_str() {
                "-H" | "--header" => {
                    let raw = value(arg.as_str())?;
                    let (name, val) = raw
                        .split_once(':')
                        .ok_or_else(|| format!("Invalid header (expected 'Name: value'): {}", raw))?;
                    cli.headers.push((name.trim().to_string(), val.trim().to_string()));
                }
                "-b" | "--cookie" => {
                    let raw = value(arg.as_str())?;
                    let (name, val) = raw
                        .split_once('=')
                        .ok_or_else(|| format!("Invalid cookie (expected name=value): {}", raw))?;
                    cli.cookies.push((name.trim().to_string(), val.to_string()));
                }
                "-d" | "--data" => cli.data = Some(value(arg.as_str())?),
                "--cookie-file" => cli.cookie_file = Some(PathBuf::from(value(arg.as_str())?)),
                "--no-redirects" => cli.no_redirects = true,
                "--safe" => cli.safe = true,
                other => return Err(format!("Unknown option: {}", other)),
            }
        }

        Ok(cli)
    }
}

fn load_jar(path: &Path) -> Result<CookieJar, String> {
    if !path.exists() {
        return Ok(CookieJar::new());
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    CookieJar::from_json(&json).map_err(|e| format!("Invalid cookie file {}: {}", path.display(), e))
}

async fn run(method: &str, url: &str, cli: CliOptions) -> ExitCode {
    let mut builder = Session::builder().safe_mode(cli.safe);
    if let Some(path) = &cli.cookie_file {
        match load_jar(path) {
            Ok(jar) => builder = builder.cookies(jar),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::from(1);
            }
        }
    }

    let session = match builder.build() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to create session: {}", e);
            return ExitCode::from(1);
        }
    };

    let mut opts = RequestOptions::new();
    for (name, value) in cli.headers {
        opts = opts.header(name, value);
    }
    for (name, value) in cli.cookies {
        opts = opts.cookie(name, value);
    }
    if cli.no_redirects {
        opts = opts.allow_redirects(false);
    }
    if let Some(data) = cli.data {
        opts = opts.data(data);
    }

    let guard = session.enter();
    let outcome = guard.request(method, url, opts).await;

    let code = match outcome.and_then(|o| o.response()) {
        Ok(response) => {
            if let Some(err) = response.error() {
                println!("Error: {}", err);
                println!("URL: {}", response.url);
                ExitCode::from(2)
            } else {
                println!("Status: {}", response.status_code().unwrap_or_default());
                println!("URL: {}", response.url);
                println!("Content-Type: {:?}", response.content_type());
                println!("Size: {} bytes", response.body_len());
                println!("Time: {}ms", response.response_time_ms);
                if !response.body.is_empty() {
                    println!("\n{}", response.text_lossy());
                }
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Request failed: {}", e);
            ExitCode::from(1)
        }
    };

    if let Some(path) = &cli.cookie_file {
        let saved = guard
            .cookies()
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = saved {
            eprintln!("Failed to save cookies to {}: {}", path.display(), e);
        }
    }

    code
}
