mod args;

use anyhow::Context;
use args::Args;
use clap::Parser;
use pdnd_client::api_client::{ApiClient, ApiResponse};
use pdnd_client::config::{load_identity, Environment, HttpSettings, RequestOptions};
use pdnd_client::filters::FilterSpec;
use pdnd_client::session::Session;
use pdnd_client::token_cache::TokenCache;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(target: "pdnd.cli", error = %e, "Run failed");
            eprint!("{}", error_report(&e, args.debug));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let environment: Environment = args.env.parse()?;
    let identity = load_identity(&args.config, &args.env)?;
    let settings = HttpSettings::default();

    let session = Session::new(
        identity,
        environment,
        TokenCache::new(&args.token_file),
        &settings,
    )?
    .persist_tokens(args.save);

    let token = session.resolve_token().await?;
    debug!(
        target: "pdnd.cli",
        origin = ?token.origin,
        expires_at = ?token.record.expires_at(),
        "Token ready"
    );

    let client = ApiClient::new(settings)?;
    let options = if args.no_verify_ssl {
        RequestOptions::insecure()
    } else {
        RequestOptions::default()
    };

    if let Some(status_url) = &args.status_url {
        let response = client
            .check_status(status_url, token.record.access_token(), options)
            .await?;
        print_response("Status check", &response, args.debug)?;
    }

    if let Some(api_url) = &args.api_url {
        let filters = FilterSpec::Raw(args.api_url_filters.clone());
        let response = client
            .request_api(api_url, &filters, token.record.access_token(), options)
            .await?;
        print_response("API call", &response, args.debug)?;
    }

    Ok(())
}

fn print_response(label: &str, response: &ApiResponse, show_status: bool) -> anyhow::Result<()> {
    if show_status {
        println!("{label}: status {}", response.status);
    }
    let pretty =
        serde_json::to_string_pretty(&response.body).context("Failed to format response body")?;
    println!("{pretty}");
    Ok(())
}

/// Text written to stderr for a failed run. The debug form is added only with `--debug`.
fn error_report(e: &anyhow::Error, debug: bool) -> String {
    let mut report = format!("Error: {e:#}\n");
    if debug {
        report.push_str(&format!("{e:?}\n"));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdnd_client::PdndError;

    #[test]
    fn test_error_report_prints_message_once() {
        let e = anyhow::Error::new(PdndError::api(401, "invalid_token"));
        let report = error_report(&e, false);

        assert_eq!(
            report,
            "Error: API error (status 401): invalid_token\n"
        );
        assert_eq!(report.matches("invalid_token").count(), 1);
    }

    #[test]
    fn test_error_report_adds_debug_form() {
        let e = anyhow::Error::new(PdndError::local("Token missing"));
        let report = error_report(&e, true);

        assert!(report.starts_with("Error: API error (status 0): Token missing\n"));
        assert_eq!(report.matches("Token missing").count(), 2);
    }
}
