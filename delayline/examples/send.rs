//! Sends a single UDP datagram and exits. The message front end uses this
//! shape of client for pings.
//!
//! Usage: cargo run --example send -- <host> <port> [message]

use tokio::net::UdpSocket;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let usage = "usage: send <host> <port> [message]";

    let host = args.next().ok_or(usage)?;
    let port: u16 = args.next().ok_or(usage)?.parse()?;
    let message = args.next().unwrap_or_else(|| "ping".to_string());

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let sent = socket.send_to(message.as_bytes(), (host.as_str(), port)).await?;
    println!("sent {sent} bytes to {host}:{port}");

    Ok(())
}
