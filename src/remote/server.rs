use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::osc::{decode_packet, OscMessage};

const MAX_PACKET: usize = 65536;

pub async fn bind(port: u16) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind OSC listener on port {}", port))?;
    info!("Listening for remote control on {}", socket.local_addr()?);
    Ok(socket)
}

/// Receive datagrams, decode them and forward every message to the tick loop.
///
/// Malformed packets are logged and dropped. Returns when the receiver is gone.
pub async fn serve(socket: UdpSocket, messages: mpsc::Sender<OscMessage>) -> Result<()> {
    let mut buf = vec![0u8; MAX_PACKET];

    loop {
        let (len, from) = socket
            .recv_from(&mut buf)
            .await
            .context("Failed to receive OSC packet")?;

        let decoded = match decode_packet(&buf[..len]) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Dropping malformed packet from {}: {}", from, e);
                continue;
            }
        };

        for msg in decoded {
            if messages.send(msg).await.is_err() {
                info!("OSC listener stopping");
                return Ok(());
            }
        }
    }
}
