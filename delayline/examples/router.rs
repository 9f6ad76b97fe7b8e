//! Runs the router with a static route table.

use std::time::Duration;

use delayline::{RouteConfig, Router, Target};

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let routes = vec![
        RouteConfig::new("echo-10s", 4479, Target::new("earth-echo", "10.1.1.83", 4478))
            .with_delay(Duration::from_secs(10)),
        RouteConfig::new("earth-alpha", 4480, Target::new("earth-alpha", "10.1.1.83", 4478)),
        RouteConfig::new("mars-alpha", 4481, Target::new("mars-alpha", "10.1.1.193", 4478)),
    ];

    let mut router = Router::new(routes);
    router.bind().await.unwrap();

    for route in router.routes() {
        println!(
            "listening on :{} -> {}:{} (delay {}s)",
            route.port_in,
            route.target.host,
            route.target.port,
            route.delay.as_secs()
        );
    }

    tokio::signal::ctrl_c().await.unwrap();
    router.shutdown().await;
}
