//! Length-prefixed snapshot feed over TCP. Bind failures disable the feed
//! rather than aborting the session.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::snapshot::SnapshotHistory;

/// Handle to the feed thread. Dropping it closes the queue; connected clients
/// are dropped on their next write.
pub struct SnapshotFeed {
    frames: Sender<Vec<u8>>,
    last_frame: Arc<Mutex<Option<Vec<u8>>>>,
}

impl SnapshotFeed {
    pub fn publish(&self, frame: Vec<u8>) {
        *self
            .last_frame
            .lock()
            .expect("last snapshot frame mutex poisoned") = Some(frame.clone());
        if let Err(err) = self.frames.send(frame) {
            log::error!("Snapshot feed thread gone: {}", err);
        }
    }
}

/// Encode and publish the most recent tick, if the feed is up and a snapshot
/// exists.
pub fn publish_latest(feed: Option<&SnapshotFeed>, history: &SnapshotHistory) {
    let (Some(feed), Some(snapshot)) = (feed, history.latest()) else {
        return;
    };
    match sim_schema::encode_snapshot(snapshot) {
        Ok(bytes) => feed.publish(bytes),
        Err(err) => log::error!("Failed to encode snapshot frame: {}", err),
    }
}

pub fn start_snapshot_feed(bind_addr: SocketAddr) -> Option<SnapshotFeed> {
    let listener = match TcpListener::bind(bind_addr) {
        Ok(listener) => listener,
        Err(err) => {
            log::warn!(
                "Snapshot feed bind failed at {}: {}. Feed disabled.",
                bind_addr,
                err
            );
            return None;
        }
    };
    if let Err(err) = listener.set_nonblocking(true) {
        log::warn!("Snapshot feed listener setup failed: {}. Feed disabled.", err);
        return None;
    }

    let (frames, frame_rx) = unbounded::<Vec<u8>>();
    let last_frame: Arc<Mutex<Option<Vec<u8>>>> = Arc::new(Mutex::new(None));
    let feed = SnapshotFeed {
        frames,
        last_frame: Arc::clone(&last_frame),
    };

    thread::spawn(move || feed_loop(listener, frame_rx, last_frame));
    Some(feed)
}

fn feed_loop(
    listener: TcpListener,
    frame_rx: Receiver<Vec<u8>>,
    last_frame: Arc<Mutex<Option<Vec<u8>>>>,
) {
    let mut clients: Vec<TcpStream> = Vec::new();
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                let primer = last_frame
                    .lock()
                    .expect("last snapshot frame mutex poisoned")
                    .clone();
                match admit_client(stream, primer.as_deref()) {
                    Ok(stream) => {
                        log::info!("Snapshot client connected: {}", addr);
                        clients.push(stream);
                    }
                    Err(err) => log::warn!("Rejected snapshot client {}: {}", addr, err),
                }
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                log::error!("Error accepting snapshot client: {}", err);
                thread::sleep(Duration::from_millis(200));
            }
        }

        loop {
            match frame_rx.try_recv() {
                Ok(frame) => {
                    clients.retain_mut(|stream| match write_frame(stream, &frame) {
                        Ok(()) => true,
                        Err(err) => {
                            log::warn!("Dropping snapshot client: {}", err);
                            false
                        }
                    });
                }
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => return,
            }
        }
    }
}

/// Switch the accepted stream to blocking writes and prime it with the most
/// recent full tick so the client never starts from nothing.
fn admit_client(mut stream: TcpStream, primer: Option<&[u8]>) -> io::Result<TcpStream> {
    stream.set_nodelay(true)?;
    stream.set_nonblocking(false)?;
    if let Some(frame) = primer {
        write_frame(&mut stream, frame)?;
    }
    Ok(stream)
}

fn write_frame(stream: &mut TcpStream, frame: &[u8]) -> io::Result<()> {
    let len = frame.len() as u32;
    stream.write_all(&len.to_le_bytes())?;
    stream.write_all(frame)
}
