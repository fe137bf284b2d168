//! Operator CLI. Configuration comes from the environment and is validated
//! before any command runs; failures are reported here and turned into a
//! non-zero exit code.

use std::env;
use std::process::ExitCode;

use credgate::clock::ClockSource;
use credgate::config::{LogFormat, Settings};
use credgate::crypto::authsig::{verify_signature, AuthHeaders};
use credgate::crypto::passwords::{hash_password, verify_password, PasswordError};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "Commands:
  sign <claims>
  verify-signature <timestamp> <claims> <signature>
  hash-password <plaintext>
  verify-password <plaintext> <salt> <hash>
  show-config";

fn print_usage() -> ExitCode {
    eprintln!("{USAGE}");
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings);

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return print_usage();
    }
    debug!(command = %args[1], "running");

    let clock = ClockSource::System;
    match args[1].as_str() {
        "sign" => {
            if args.len() != 3 {
                return print_usage();
            }
            let headers = AuthHeaders::sign(settings.secret.as_bytes(), &args[2], &clock);
            let pairs: serde_json::Map<_, _> = headers
                .pairs()
                .iter()
                .map(|(name, value)| (name.to_string(), json!(value)))
                .collect();
            print_json(&pairs)
        }
        "verify-signature" => {
            if args.len() != 5 {
                return print_usage();
            }
            match verify_signature(
                settings.secret.as_bytes(),
                &args[2],
                &args[3],
                &args[4],
                settings.max_skew,
                &clock,
            ) {
                Ok(()) => {
                    println!("ok");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    println!("denied: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        "hash-password" => {
            if args.len() != 3 {
                return print_usage();
            }
            match hash_password(&args[2], &settings.hash_params) {
                Ok(credential) => print_json(&credential),
                Err(err) => {
                    error!("hashing failed: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        "verify-password" => {
            if args.len() != 5 {
                return print_usage();
            }
            match verify_password(&args[2], &args[3], &args[4], &settings.hash_params) {
                Ok(true) => {
                    println!("match");
                    ExitCode::SUCCESS
                }
                Ok(false) => {
                    println!("no-match");
                    ExitCode::FAILURE
                }
                Err(err @ PasswordError::Decode { .. }) => {
                    error!("stored credential is corrupt: {err}");
                    ExitCode::FAILURE
                }
                Err(err) => {
                    error!("verification failed: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        "show-config" => {
            if args.len() != 2 {
                return print_usage();
            }
            print_json(&config_summary(&settings))
        }
        _ => print_usage(),
    }
}

/// Effective settings for display. The secret is reduced to its length.
fn config_summary(settings: &Settings) -> Value {
    json!({
        "secret": "<redacted in output>",
        "secretLength": settings.secret.as_bytes().len(),
        "maxSkewSeconds": settings.max_skew.as_secs(),
        "hashParams": settings.hash_params,
        "logging": settings.logging,
    })
}

fn print_json(value: &impl Serialize) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("failed to render output: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so command output on stdout stays machine readable.
fn init_logging(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}
