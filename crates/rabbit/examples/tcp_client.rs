//! TCP client demonstrating a bare `HELLO`/`LIST`/`FETCH` exchange.
//!
//! First start a burrow listening on 127.0.0.1:7443 (see `rabbit::server`),
//! then run this example: `cargo run --example tcp_client -p rabbit --features stream`

use rabbit::core::{BurrowConfig, Tunnel};
use rabbit_wire::{Frame, StartLine};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = "127.0.0.1:7443";
    println!("Connecting to {addr}...");
    let stream = TcpStream::connect(addr).await?;
    let transport = rabbit::server::serve_connection(stream);
    let tunnel = Tunnel::new(transport, BurrowConfig::default());

    tunnel.open_lane(0)?;
    let mut hello = Frame::new(StartLine::new("HELLO", vec!["RABBIT/1.0".to_string()]));
    hello.headers.push("Caps", "lanes,async")?;
    tunnel.send(0, hello, true).await?;
    let (_, resp) = tunnel.recv().await?;
    println!("HELLO -> {} {:?}", resp.start.word, resp.start.args);

    tunnel.open_lane(1)?;
    let mut list = Frame::new(StartLine::new("LIST", vec!["/".to_string()]));
    list.headers.push("Txn", "L1")?;
    tunnel.send(1, list, false).await?;
    let (_, resp) = tunnel.recv().await?;
    if let Some(body) = resp.body.as_bytes() {
        println!("LIST / ->\n{}", String::from_utf8_lossy(body));
    }

    tunnel.close();
    Ok(())
}
