//! Config-file-driven router daemon.
//!
//! Usage: cargo run --example relayd -- delayline/examples/routes.json

use futures::StreamExt;
use tracing::{info, warn};

use delayline::{BindPolicy, RouteFile, Router, RouterEvent, RouterOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt::try_init();

    let path = std::env::args().nth(1).ok_or("usage: relayd <routes.json>")?;
    let table = RouteFile::load(&path)?;

    if let Some(description) = &table.description {
        info!(description = description.as_str(), "loaded route table");
    }

    let mut router = Router::with_options(
        table.into_routes(),
        RouterOptions::default().bind_policy(BindPolicy::SkipOffline),
    );
    router.bind().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = router.next() => match event {
                RouterEvent::Forwarded { route, target, len, .. } => {
                    info!(route = route.as_str(), %target, len, "forwarded");
                }
                RouterEvent::Dropped { route, target, len } => {
                    warn!(route = route.as_str(), %target, len, "dropped");
                }
                RouterEvent::ListenerClosed { route, port_in } => {
                    warn!(route = route.as_str(), port_in, "listener closed");
                }
            },
        }
    }

    router.shutdown().await;
    Ok(())
}
