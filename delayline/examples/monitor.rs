//! Runs a local router and prints the queue table once a second.

use std::time::Duration;

use delayline::{unix_micros, RouteConfig, Router, Target};

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let routes = vec![
        RouteConfig::new("echo-10s", 4479, Target::new("earth-echo", "127.0.0.1", 4478))
            .with_delay(Duration::from_secs(10)),
        RouteConfig::new("mars-alpha", 4481, Target::new("mars-alpha", "127.0.0.1", 4478)),
    ];

    let mut router = Router::new(routes);
    router.bind().await.unwrap();

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tick.tick() => print_table(&router),
        }
    }

    router.shutdown().await;
}

fn print_table(router: &Router) {
    println!("Queues");
    println!(
        "{:<12}  {:>6}  {:<12}  {:<18}  {:>6}  {:>5}  {}",
        "Name", "PortIn", "To", "Addr", "Delay", "Msgs", "Head"
    );
    println!(
        "{:-<12}  {:-<6}  {:-<12}  {:-<18}  {:-<6}  {:-<5}  {:-<12}",
        "", "", "", "", "", "", ""
    );

    for route in router.routes() {
        let head = match route.head_arrival {
            Some(stamp) => {
                format!("{:.1}s ago", unix_micros().saturating_sub(stamp) as f64 / 1e6)
            }
            None => "-".to_string(),
        };

        println!(
            "{:<12}  {:>6}  {:<12}  {:<18}  {:>6}  {:>5}  {}",
            route.name,
            route.port_in,
            route.target.name,
            route.target_addr.to_string(),
            route.delay.as_secs(),
            route.pending,
            head
        );
    }

    println!();
}
