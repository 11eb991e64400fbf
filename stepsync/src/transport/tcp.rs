use std::io::BufReader;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::backoff::{Backoff, BackoffPolicy};
use super::frame::{DEFAULT_MAX_FRAME_BYTES, FrameReader, write_frame};
use super::{InboundSink, Transport, TransportError};
use crate::prelude::*;

const SHUTDOWN_POLL: Duration = Duration::from_millis(25);
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct TcpTransportConfig {
    pub addr: String,
    pub backoff: BackoffPolicy,
    pub max_frame_bytes: usize,
    /// Frames that may wait for the writer before sends start failing.
    pub outbound_capacity: usize,
    /// A peer that accepts nothing for this long is treated as gone.
    pub write_timeout: Duration,
}

impl TcpTransportConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            backoff: BackoffPolicy::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// The live half of a connection as seen by senders.
struct Session {
    outbound: SyncSender<String>,
    stream: TcpStream,
}

/// Line-framed JSON over TCP that always reconnects.
///
/// A background thread owns the read half: it connects, hands every frame to
/// the [`InboundSink`], and on disconnect retries with exponential backoff
/// until [`TcpTransport::shutdown`]. Each connection also gets a writer
/// thread; [`Transport::send_message`] only queues onto it and never waits
/// on the socket.
pub struct TcpTransport {
    addr: String,
    session: Arc<Mutex<Option<Session>>>,
    shutdown: Arc<AtomicBool>,
    reader_handle: Option<JoinHandle<()>>,
}

impl TcpTransport {
    pub fn connect(config: TcpTransportConfig, sink: InboundSink) -> Self {
        let session = Arc::new(Mutex::new(None));
        let shutdown = Arc::new(AtomicBool::new(false));
        let addr = config.addr.clone();

        let reader_handle = {
            let session = session.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                run_connection_loop(config, session, shutdown, sink)
            })
        };

        Self {
            addr,
            session,
            shutdown,
            reader_handle: Some(reader_handle),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(session) = self.session.lock().take() {
            let _ = session.stream.shutdown(Shutdown::Both);
        }

        if let Some(handle) = self.reader_handle.take() {
            if handle.join().is_err() {
                error!("transport reader for {} panicked", self.addr);
            }
        }
    }
}

impl Transport for TcpTransport {
    fn send_message(&mut self, payload: &str) -> Result<(), TransportError> {
        if payload.contains('\n') {
            return Err(TransportError::EmbeddedNewline);
        }

        let session = self.session.lock();
        let Some(session) = session.as_ref() else {
            return Err(TransportError::NotConnected);
        };

        session
            .outbound
            .try_send(payload.to_string())
            .map_err(|err| match err {
                TrySendError::Full(_) => TransportError::OutboundFull,
                TrySendError::Disconnected(_) => TransportError::NotConnected,
            })
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_connection_loop(
    config: TcpTransportConfig,
    session: Arc<Mutex<Option<Session>>>,
    shutdown: Arc<AtomicBool>,
    mut sink: InboundSink,
) {
    let mut backoff = Backoff::new(config.backoff);

    while !shutdown.load(Ordering::SeqCst) {
        let connect_start = Instant::now();

        match TcpStream::connect(&config.addr) {
            Ok(stream) => {
                backoff.reset();
                info!("connected to {}", config.addr);

                let result = run_session(
                    stream, &config, &session, &shutdown, &mut sink,
                );
                if let Err(err) = result {
                    warn!("connection to {} lost: {}", config.addr, err);
                } else {
                    info!("connection to {} closed", config.addr);
                }
            }
            Err(err) => {
                warn!("connect to {} failed: {}", config.addr, err);
            }
        }

        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let delay = backoff.next_delay();
        let elapsed = connect_start.elapsed();
        if delay > elapsed {
            sleep_unless_shutdown(delay - elapsed, &shutdown);
        }
    }

    debug!("transport reader for {} is exiting", config.addr);
}

fn run_session(
    stream: TcpStream,
    config: &TcpTransportConfig,
    session: &Mutex<Option<Session>>,
    shutdown: &AtomicBool,
    sink: &mut InboundSink,
) -> Result<(), TransportError> {
    let _ = stream.set_nodelay(true);

    let writer = stream.try_clone()?;
    writer.set_write_timeout(Some(config.write_timeout))?;
    let control = stream.try_clone()?;

    let (outbound, queued) =
        mpsc::sync_channel(config.outbound_capacity.max(1));
    let writer_handle = {
        let addr = config.addr.clone();
        thread::spawn(move || run_writer(&addr, writer, queued))
    };

    *session.lock() = Some(Session {
        outbound,
        stream: control,
    });

    // Shutdown may have raced the connect; it only closes a stream it can see.
    let result = if shutdown.load(Ordering::SeqCst) {
        Ok(())
    } else {
        read_frames(stream, config, sink)
    };

    // Dropping the session closes the queue; shutting the socket unblocks a
    // writer stuck on a peer that stopped reading.
    if let Some(session) = session.lock().take() {
        let _ = session.stream.shutdown(Shutdown::Both);
    }
    if writer_handle.join().is_err() {
        error!("transport writer for {} panicked", config.addr);
    }

    result
}

fn read_frames(
    stream: TcpStream,
    config: &TcpTransportConfig,
    sink: &mut InboundSink,
) -> Result<(), TransportError> {
    let mut frames =
        FrameReader::new(BufReader::new(stream), config.max_frame_bytes);

    loop {
        match frames.read_next() {
            Ok(Some(frame)) => {
                trace!("received frame from {}: {}", config.addr, frame);
                sink(frame);
            }
            Ok(None) => return Ok(()),
            Err(TransportError::InvalidUtf8) => {
                warn!("skipping non utf-8 frame from {}", config.addr);
            }
            Err(err) => return Err(err),
        }
    }
}

fn run_writer(addr: &str, mut stream: TcpStream, queued: Receiver<String>) {
    for payload in queued {
        if let Err(err) = write_frame(&mut stream, &payload) {
            warn!("write to {} failed: {}", addr, err);
            // The reader sees the shutdown and starts a reconnect.
            let _ = stream.shutdown(Shutdown::Both);
            break;
        }
    }

    trace!("transport writer for {} is exiting", addr);
}

fn sleep_unless_shutdown(duration: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + duration;

    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(SHUTDOWN_POLL));
    }
}
