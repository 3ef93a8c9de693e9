use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use anyhow::Result;
use ipx::config::IpxConfig;
use ipx::url::Alias;
use ipx::IpxContext;
use ipx_server::build_router;
use structopt::StructOpt;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

#[derive(StructOpt, Debug)]
pub struct MainOpts {
    #[structopt(flatten)]
    pub serve: ServeOpts,
    #[structopt(long)]
    /// Log filter (like RUST_LOG; trace, debug, info, ...).
    pub log: Option<String>,
}

#[derive(StructOpt, Debug)]
pub struct ServeOpts {
    #[structopt(short, long)]
    /// Port to listen on.
    pub port: Option<u16>,
    #[structopt(long)]
    /// Filesystem root for the `filesystem` source.
    pub dir: Option<String>,
    #[structopt(long)]
    /// Comma-separated HTTP(S) origin allow-list.
    pub domains: Option<String>,
    #[structopt(long)]
    /// Comma-separated `base:replacement` id prefix rewrites.
    pub alias: Option<String>,
    #[structopt(long)]
    /// Default `Cache-Control: max-age` seconds.
    pub max_age: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = MainOpts::from_args();

    let filter = opts.log.clone().or_else(|| std::env::var("RUST_LOG").ok()).unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = IpxConfig::from_env();
    if let Some(dir) = opts.serve.dir {
        config.dir = Some(dir);
    }
    if let Some(domains) = opts.serve.domains {
        config.domains = domains.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    if let Some(alias) = opts.serve.alias {
        config.alias = alias
            .split(',')
            .filter_map(|entry| {
                let (base, replacement) = entry.split_once(':')?;
                Some(Alias::new(base.trim(), replacement.trim()))
            })
            .collect();
    }
    if let Some(max_age) = opts.serve.max_age {
        config.max_age = max_age;
    }

    let port = opts.serve.port.or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok())).unwrap_or(3000);
    let ctx = IpxContext::new(config)?;

    let middleware = ServiceBuilder::new().layer(TraceLayer::new_for_http());
    let app = build_router(ctx).layer(middleware);

    let addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "ipx-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
