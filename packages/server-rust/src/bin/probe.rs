//! `switchyard-probe`: resolve one request against a JSON service catalog.
//!
//! ```text
//! switchyard-probe --catalog services.json --uri /orders \
//!     --soap-action urn:placeOrder --payload '{urn:orders}PlaceOrder'
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `switchyard_server=info`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use switchyard_core::{HttpFacet, Message, PublishedService, QName, ServiceId, SoapFacet};
use switchyard_server::resolver::soap_action::SOAP_ACTION_HEADER;
use switchyard_server::{
    tracing_sink, ConflictError, InMemoryParameterStore, ResolutionManager, ResolverConfig,
    ServiceCache,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "switchyard-probe", version, about = "Resolve a request against a service catalog")]
struct Args {
    /// JSON array of published services.
    #[arg(long, env = "SWITCHYARD_CATALOG")]
    catalog: PathBuf,

    /// Request URI.
    #[arg(long, default_value = "/")]
    uri: String,

    /// `SOAPAction` header value.
    #[arg(long)]
    soap_action: Option<String>,

    /// Top-level payload element in `{namespace}local` form. Repeat for each
    /// element; any occurrence makes the request a SOAP request.
    #[arg(long = "payload")]
    payload: Vec<QName>,

    /// Treat the request as SOAP even without payload elements.
    #[arg(long)]
    soap: bool,

    /// Value of the original-URL header.
    #[arg(long)]
    original_url: Option<String>,

    /// Only confirm or reject this service.
    #[arg(long)]
    pinned: Option<ServiceId>,

    /// JSON resolver configuration; the flags below override it.
    #[arg(long, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "SWITCHYARD_RESERVED_URI_PREFIX")]
    reserved_uri_prefix: Option<String>,

    #[arg(long, env = "SWITCHYARD_ORIGINAL_URL_HEADER")]
    original_url_header: Option<String>,

    #[arg(long, env = "SWITCHYARD_SERVICE_ID_MARKER")]
    service_id_path_marker: Option<String>,

    #[arg(long, env = "SWITCHYARD_NEGATIVE_CACHE_CAPACITY")]
    negative_cache_capacity: Option<usize>,

    /// Skip the strict SOAP operation check.
    #[arg(long, env = "SWITCHYARD_LAX")]
    lax: bool,
}

impl Args {
    fn config(&self) -> Result<ResolverConfig> {
        let mut config = match &self.config {
            Some(path) => read_json(path)?,
            None => ResolverConfig::default(),
        };
        if let Some(prefix) = &self.reserved_uri_prefix {
            config.reserved_uri_prefix.clone_from(prefix);
        }
        if let Some(header) = &self.original_url_header {
            config.original_url_header.clone_from(header);
        }
        if let Some(marker) = &self.service_id_path_marker {
            config.service_id_path_marker.clone_from(marker);
        }
        if let Some(capacity) = self.negative_cache_capacity {
            config.negative_cache_capacity = capacity;
        }
        if self.lax {
            config.strict_operation_check = false;
        }
        Ok(config)
    }

    fn message(&self, config: &ResolverConfig) -> Message {
        let mut http = HttpFacet::new(&self.uri);
        if let Some(action) = &self.soap_action {
            http = http.with_header(SOAP_ACTION_HEADER, action);
        }
        if let Some(url) = &self.original_url {
            http = http.with_header(&config.original_url_header, url);
        }
        let message = Message::new().with_http(http);
        if self.soap || !self.payload.is_empty() {
            message.with_soap(SoapFacet::new(self.payload.clone()))
        } else {
            message
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("switchyard_server=info,switchyard_probe=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("failed to initialize tracing subscriber")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing()?;
    let args = Args::parse();

    let audit = tracing_sink();
    let store = Arc::new(InMemoryParameterStore::new());
    let manager = ResolutionManager::new(store, Arc::clone(&audit));
    let config = args.config()?;
    let message = args.message(&config);
    let cache = ServiceCache::new(config, audit);

    let catalog: Vec<PublishedService> = read_json(&args.catalog)?;
    for service in catalog {
        match manager.record(&service).await {
            Ok(_) => {
                cache.cache(service);
            }
            Err(err @ ConflictError::Duplicate { .. }) => {
                tracing::warn!(service = %service.display_name(), %err, "not publishing service");
            }
            Err(err) => return Err(err.into()),
        }
    }
    tracing::info!(services = cache.len(), catch_all = cache.has_catch_all(), "catalog loaded");

    let by_uri = cache.services_by_uri(&args.uri);
    if !by_uri.is_empty() {
        let names: Vec<_> = by_uri.iter().map(|s| s.display_name()).collect();
        tracing::info!(uri = %args.uri, services = ?names, "URI rules match");
    }

    let resolved = match args.pinned {
        Some(id) => cache.resolve_pinned(&message, id, None)?,
        None => cache.resolve(&message, None)?,
    };
    match resolved {
        Some(service) => {
            println!("{}", serde_json::to_string_pretty(&*service)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("no service matches the request");
            Ok(ExitCode::FAILURE)
        }
    }
}
