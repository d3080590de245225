//! Drive an inertia application from the command line.
//!
//! `inertia_headless <start-url> [path ...]` bootstraps from the page served
//! at the start URL, visits every path in turn and prints the final page as
//! JSON. Server-forced location visits are followed like a browser would,
//! by loading the new document and letting the router finish the redirect.

use anyhow::{Context as _, Error, anyhow};
use env_logger::{Builder, Env};
use inertia::http::{ACCEPT, ACCEPT_HTML, X_INERTIA, X_REQUESTED_WITH};
use inertia::platform::memory::MemoryBrowser;
use inertia::platform::{Location as _, Platform, Transport};
use inertia::{
    Headers, HttpRequest, Method, Page, RequestPayload, ResponseOutcome, Router, RouterConfig,
    UploadProgress, VisitOptions,
};
use inertia_http::{HttpTransport, HttpTransportConfig};
use log::{error, info, warn};
use serde_json::Map;
use std::env;
use std::io::{self, Write as _};
use std::process::exit;
use std::sync::Arc;
use tokio::runtime::Runtime;
use url::Url;

const USAGE: &str = "usage: inertia_headless <start-url> [path ...]";

struct Args {
    start: Url,
    paths: Vec<String>,
}

fn parse_args() -> Result<Args, Error> {
    let mut args = env::args().skip(1);
    let start = args.next().ok_or_else(|| anyhow!(USAGE))?;
    if start == "--help" || start == "-h" {
        return Err(anyhow!(USAGE));
    }
    let start = Url::parse(&start).with_context(|| format!("invalid start url `{start}`"))?;
    Ok(Args {
        start,
        paths: args.collect(),
    })
}

/// Ask the server for the page behind `url`, as the first document load
/// would embed it.
async fn fetch_page(transport: &dyn Transport, url: &Url) -> Result<Page, Error> {
    let request = HttpRequest {
        method: Method::Get,
        url: url.clone(),
        headers: Headers::new()
            .with(ACCEPT, ACCEPT_HTML)
            .with(X_REQUESTED_WITH, "XMLHttpRequest")
            .with(X_INERTIA, "true"),
        query: Map::new(),
        body: RequestPayload::empty(),
    };
    let response = transport
        .send(request, Arc::new(|_progress: UploadProgress| {}))
        .await?;
    if !response.is_protocol() {
        return Err(anyhow!(
            "{url} answered {} without an inertia page",
            response.status
        ));
    }
    serde_json::from_slice(&response.body).with_context(|| format!("malformed page from {url}"))
}

/// Load the document the browser currently points at and start a router on it.
async fn boot(
    transport: &Arc<dyn Transport>,
    browser: &Arc<MemoryBrowser>,
    config: &RouterConfig,
) -> Result<Router, Error> {
    let initial = fetch_page(transport.as_ref(), &browser.href()).await?;
    let platform = Platform::headless(Arc::clone(transport), browser);
    let router = Router::new(initial, platform, config.clone());
    router.init().await?;
    info!("showing {} at {}", router.page().component, router.page().url);
    Ok(router)
}

async fn run(args: Args) -> Result<Page, Error> {
    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(&HttpTransportConfig::from_env())?);
    let config = RouterConfig::from_env();
    let browser = MemoryBrowser::new(args.start);
    let mut router = boot(&transport, &browser, &config).await?;

    for path in &args.paths {
        let Some(task) = router.visit(path, VisitOptions::new())? else {
            warn!("visit to {path} was vetoed");
            continue;
        };
        match task.settled().await? {
            Some(ResponseOutcome::LocationVisit) => {
                info!("{path} left the protocol for {}", browser.href());
                router = boot(&transport, &browser, &config).await?;
            }
            outcome => info!("{path}: {outcome:?}"),
        }
    }
    Ok(router.page())
}

fn print_page(page: &Page) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, page)?;
    writeln!(stdout)?;
    Ok(())
}

fn main() {
    let _log_init: Result<(), _> =
        Builder::from_env(Env::default().filter_or("RUST_LOG", "info")).try_init();

    let result = parse_args().and_then(|args| {
        let runtime = Runtime::new()?;
        let page = runtime.block_on(run(args))?;
        print_page(&page)
    });
    if let Err(err) = result {
        error!("{err:#}");
        exit(1);
    }
}
