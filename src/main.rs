mod ping;
mod validate;

/// User-agent string presented when probing a url.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use ping::Pinger;
use validate::{UrlValidator, ValidationConfig};

#[derive(Parser)]
#[command(
    name = "sonar",
    version,
    about = "Checks whether a URL is alive without letting redirects reach private networks"
)]
struct Args {
    /// URL to probe (must be HTTP or HTTPS)
    url: String,

    /// Validate the URL only; no request is issued
    #[arg(long)]
    validate_only: bool,

    /// Reject hosts resolving to private/reserved ranges during validation
    /// (the liveness check always rejects them)
    #[arg(long, requires = "validate_only")]
    reject_local: bool,

    /// Print the verdict as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Verdict<'a> {
    url: &'a str,
    ok: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sonar=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let ok = if args.validate_only {
        let validator = UrlValidator::new(ValidationConfig {
            reject_local_hosts: args.reject_local,
        });
        validator.is_valid(&args.url).await
    } else {
        Pinger::new()?.check(&args.url).await
    };

    if args.json {
        println!("{}", serde_json::to_string(&Verdict { url: &args.url, ok })?);
    } else if args.validate_only {
        println!("{}", if ok { "valid" } else { "invalid" });
    } else {
        println!("{}", if ok { "online" } else { "offline" });
    }

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
