//! # Message Client
//!
//! Publishes one canned demonstration message (or the idempotent-publish
//! sequence) for the given selector. Without a selector the fallback alert is
//! sent to the default queue.
//!
//! Exit codes: 0 on success, 1 when the dispatch fails, 2 for configuration
//! and usage errors.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use message_workshop::config::{BrokerBackend, WorkshopConfig};
use message_workshop::dispatcher::{DispatchReport, Dispatcher, TracingSink};
use message_workshop::error::{WorkshopError, WorkshopResult};
use message_workshop::logging;
use message_workshop::messaging::service::{BrokerProvider, PublishOutcome, PublishSession};
use message_workshop::messaging::{DestinationRouter, ResourceDirectory};

#[derive(Parser, Debug)]
#[command(name = "message-client")]
#[command(about = "Publish demonstration messages to a queue or topic")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Route selector, e.g. magic.order or unique.orders
    selector: Option<String>,

    /// Configuration file path (default: ./message-client.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra message property added to every message (repeatable)
    #[arg(short = 'p', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    properties: Vec<(String, String)>,

    /// Publish backend, overriding configuration
    #[arg(long, value_enum)]
    backend: Option<BrokerBackend>,

    /// Print the route table and exit without connecting
    #[arg(long)]
    list_routes: bool,

    /// Print the dispatch report as JSON instead of one line per send
    #[arg(long)]
    json: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        Some(_) => Err(format!("property '{raw}' has an empty key")),
        None => Err(format!("property '{raw}' is not in KEY=VALUE form")),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_structured_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, exit_code = e.exit_code(), "message-client failed");
            eprintln!("message-client: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> WorkshopResult<()> {
    let mut config = WorkshopConfig::load(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.broker.backend = backend;
    }
    config.validate()?;

    let router = DestinationRouter::new(
        config.destinations.default_queue.clone(),
        config.destinations.default_topic.clone(),
    );

    if cli.list_routes {
        print_routes(&router);
        return Ok(());
    }

    let dispatcher = Dispatcher::new(
        router,
        ResourceDirectory::new(&config.resources.directory),
        TracingSink,
    )
    .with_extra_properties(cli.properties)
    .with_console_url(config.broker.console_url.clone());

    let selector = cli.selector.as_deref();
    info!(
        selector = selector.unwrap_or("<none>"),
        backend = %config.broker.backend,
        "message-client starting"
    );

    let session = match BrokerProvider::connect(&config.broker).await {
        Ok(session) => session,
        Err(e) => {
            println!("{}", render_failure(&dispatcher.failure_outcome(selector, &e), cli.json)?);
            return Err(e.into());
        }
    };

    match dispatcher.run(&session, selector).await {
        Ok(report) if cli.json => {
            println!("{}", report.to_json()?);
            Ok(())
        }
        Ok(report) => {
            print_report(&report, session.provider_name());
            Ok(())
        }
        Err(e) => {
            println!("{}", render_failure(&dispatcher.failure_outcome(selector, &e), cli.json)?);
            Err(WorkshopError::from(e))
        }
    }
}

fn render_failure(outcome: &PublishOutcome, json: bool) -> WorkshopResult<String> {
    if json {
        Ok(serde_json::to_string_pretty(outcome)?)
    } else {
        Ok(outcome.to_string())
    }
}

fn print_report(report: &DispatchReport, provider: &str) {
    for sent in &report.sends {
        match &sent.unique_id {
            Some(key) => println!(
                "{} via {provider} (message id {}, uniqueId {key})",
                sent.outcome, sent.receipt.message_id
            ),
            None => println!(
                "{} via {provider} (message id {})",
                sent.outcome, sent.receipt.message_id
            ),
        }
    }
}

fn print_routes(router: &DestinationRouter) {
    println!(
        "{:<15} {:<6} {:<15} {:<24} {:<16} PATTERN",
        "SELECTOR", "KIND", "DESTINATION", "PAYLOAD", "MIME"
    );
    for route in router.routes().chain(std::iter::once(router.fallback())) {
        println!(
            "{:<15} {:<6} {:<15} {:<24} {:<16} {}",
            route.selector,
            route.kind.as_str(),
            route.destination_name,
            route.payload.to_string(),
            route.mime_type.as_str(),
            route.pattern
        );
    }
}
