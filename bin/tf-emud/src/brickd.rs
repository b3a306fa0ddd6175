//! ---
//! emu_section: "05-networking-external-interfaces"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Brickd compatible TCP front for the device bus."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Clients connect exactly as they would to a real brickd. Each connection is
//! a handler id on the bus: requests are published to the addressed device,
//! everything published to the handler id is written back to the socket.
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Result};
use bytes::{Bytes, BytesMut};
use tf_emu_msg::{Envelope, HandlerId, HandlerRegistry, InMemoryBus, Transport, BROADCAST};
use tf_emu_protocol::{decode_header, uid, BROADCAST_UID, FUNCTION_ENUMERATE, HEADER_LEN};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Running TCP front; dropped connections deregister themselves.
#[derive(Debug)]
pub struct BrickdServer {
    address: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BrickdServer {
    pub async fn spawn(listen: SocketAddr, bus: InMemoryBus, registry: HandlerRegistry) -> Result<Self> {
        let listener = TcpListener::bind(listen).await?;
        let address = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let transport: Arc<dyn Transport> = Arc::new(bus);
        let task = tokio::spawn(accept_loop(listener, transport, registry, shutdown_rx));
        Ok(Self {
            address,
            shutdown,
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.address
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await?;
        info!(address = %self.address, "brickd front stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    transport: Arc<dyn Transport>,
    registry: HandlerRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = Vec::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let transport = Arc::clone(&transport);
                    let registry = registry.clone();
                    let shutdown = shutdown.clone();
                    connections.retain(|task: &JoinHandle<()>| !task.is_finished());
                    connections.push(tokio::spawn(serve_connection(stream, peer, transport, registry, shutdown)));
                }
                Err(err) => warn!(error = %err, "failed to accept brickd connection"),
            },
        }
    }
    for connection in connections {
        let _ = connection.await;
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    transport: Arc<dyn Transport>,
    registry: HandlerRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let handler = HandlerId::random();
    let outbound = transport.subscribe(handler.as_str());
    registry.register(handler.clone());
    info!(%peer, handler_id = %handler, "client connected");

    let (mut reader, writer) = stream.into_split();
    let writer_task = tokio::spawn(forward_frames(outbound, writer, handler.clone()));
    let mut buffer = BytesMut::with_capacity(1024);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            read = reader.read_buf(&mut buffer) => match read {
                Ok(0) => break,
                Ok(_) => {
                    if let Err(err) = drain_frames(&mut buffer, transport.as_ref(), &handler) {
                        warn!(%peer, handler_id = %handler, error = %err, "closing connection");
                        break;
                    }
                }
                Err(err) => {
                    debug!(%peer, handler_id = %handler, error = %err, "read failed");
                    break;
                }
            },
        }
    }

    registry.deregister(&handler);
    writer_task.abort();
    info!(%peer, handler_id = %handler, "client disconnected");
}

async fn forward_frames(
    mut frames: mpsc::UnboundedReceiver<Envelope>,
    mut writer: OwnedWriteHalf,
    handler: HandlerId,
) {
    while let Some(envelope) = frames.recv().await {
        if let Err(err) = writer.write_all(&envelope.frame).await {
            debug!(handler_id = %handler, error = %err, "write failed");
            break;
        }
    }
}

/// Cut the next complete frame off `buffer`, using the header length byte.
pub(crate) fn next_frame(buffer: &mut BytesMut) -> Result<Option<Bytes>> {
    if buffer.len() < HEADER_LEN {
        return Ok(None);
    }
    let length = usize::from(buffer[4]);
    if length < HEADER_LEN {
        bail!("frame declares length {length}, shorter than its header");
    }
    if buffer.len() < length {
        return Ok(None);
    }
    Ok(Some(buffer.split_to(length).freeze()))
}

fn drain_frames(buffer: &mut BytesMut, transport: &dyn Transport, handler: &HandlerId) -> Result<()> {
    while let Some(frame) = next_frame(buffer)? {
        let header = decode_header(&frame)?;
        let address = if header.uid == BROADCAST_UID && header.function_id == FUNCTION_ENUMERATE {
            BROADCAST.to_owned()
        } else {
            uid::encode(header.uid)
        };
        if let Err(err) = transport.publish(&address, Envelope::from_handler(handler.clone(), frame)) {
            debug!(handler_id = %handler, address = %address, error = %err, "request not delivered");
        }
    }
    Ok(())
}
