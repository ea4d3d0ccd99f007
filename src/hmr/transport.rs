//! WebSocket Listener for Hot Reload
//!
//! Owns the one connection to `serve`'s `/__serve_hmr` endpoint and feeds
//! every text frame through the parser into a [`Dispatcher`].
//!
//! ```text
//! serve --[changed:index.html]--> HmrListener --parse--> Dispatcher --> callbacks
//! ```
//!
//! Frames that are not notifications are dropped without error. When the
//! connection ends, the listener reconnects according to its
//! [`ReconnectPolicy`]; `ReconnectPolicy::disabled()` stops at the first drop.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use thiserror::Error;
use tungstenite::protocol::Message;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::WebSocket;
use url::Url;

use super::dispatcher::Dispatcher;
use super::notification::{ChangeKind, ChangeNotification};
use crate::core::is_shutdown;

/// Path of the HMR socket on the page's own host.
pub const HMR_PATH: &str = "/__serve_hmr";

/// How long a blocking read waits before re-checking the shutdown flag.
const READ_TIMEOUT: Duration = Duration::from_millis(250);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid page origin `{0}`")]
    Url(String, #[source] url::ParseError),

    #[error("unsupported scheme `{0}` (expected http, https, ws or wss)")]
    Scheme(String),

    #[error("failed to connect to `{url}`")]
    Connect {
        url: Url,
        #[source]
        source: tungstenite::Error,
    },

    #[error("connection to `{url}` failed")]
    Read {
        url: Url,
        #[source]
        source: tungstenite::Error,
    },
}

// =============================================================================
// Endpoint
// =============================================================================

/// Derive the HMR socket URL from a page origin.
///
/// `http` maps to `ws` and `https` to `wss`; host and port are kept, path,
/// query and fragment are replaced. A bare `host:port` is taken as `http`.
///
/// ```ignore
/// endpoint_url("https://example.com:3000/a/b?x")  // wss://example.com:3000/__serve_hmr
/// endpoint_url("localhost:8080")                  // ws://localhost:8080/__serve_hmr
/// ```
pub fn endpoint_url(origin: &str) -> Result<Url, TransportError> {
    let mut url = match Url::parse(origin) {
        Ok(url) if url.has_host() => url,
        // `localhost:8080` parses as scheme `localhost`, so retry with http
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{origin}"))
                .map_err(|e| TransportError::Url(origin.to_string(), e))?
        }
        Err(e) => return Err(TransportError::Url(origin.to_string(), e)),
    };

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(TransportError::Scheme(other.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|()| TransportError::Scheme(url.scheme().to_string()))?;
    url.set_path(HMR_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

// =============================================================================
// Frame dispatch
// =============================================================================

/// Parse one text frame and deliver it. Returns whether it was a notification.
pub fn dispatch_frame(dispatcher: &Dispatcher, text: &str) -> bool {
    let Some(notification) = ChangeNotification::parse(text) else {
        crate::debug!("hmr"; "ignored frame: {}", text);
        return false;
    };

    crate::debug!("hmr"; "{} {}", notification.kind, notification.path);
    let ChangeNotification { kind, path, old_path } = notification;
    match kind {
        ChangeKind::Changed => dispatcher.emit_changed(path),
        ChangeKind::Created => dispatcher.emit_created(path),
        ChangeKind::Deleted => dispatcher.emit_deleted(path),
        ChangeKind::Renamed => dispatcher.emit_renamed(path, old_path),
    };
    true
}

// =============================================================================
// Reconnect policy
// =============================================================================

/// Bounded exponential backoff between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts after a failed connect or dropped connection. `0` disables.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl ReconnectPolicy {
    /// Never reconnect: a dropped connection ends listening.
    pub const fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the given attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Why a connected session ended.
enum SessionEnd {
    Closed,
    Stopped,
}

/// Asks a running [`HmrListener`] to close its connection and return.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Client for the HMR socket.
#[derive(Debug, Clone)]
pub struct HmrListener {
    url: Url,
    dispatcher: Dispatcher,
    reconnect: ReconnectPolicy,
    stop: Arc<AtomicBool>,
}

impl HmrListener {
    pub fn new(url: Url, dispatcher: Dispatcher) -> Self {
        Self {
            url,
            dispatcher,
            reconnect: ReconnectPolicy::default(),
            stop: Arc::default(),
        }
    }

    /// Handle for stopping the listener from a callback or another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    fn should_stop(&self) -> bool {
        is_shutdown() || self.stop.load(Ordering::SeqCst)
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Listen until the connection is gone for good or a stop is requested.
    ///
    /// Returns `Ok` when stopped (Ctrl+C or [`StopHandle`]) or when a
    /// connection ended cleanly with reconnects disabled. Returns the last
    /// error once all reconnect attempts are used up.
    pub fn run(&self) -> Result<(), TransportError> {
        let mut attempt = 0u32;

        loop {
            if self.should_stop() {
                return Ok(());
            }

            let outcome = match self.connect() {
                Ok(mut socket) => {
                    attempt = 0;
                    crate::log!("hmr"; "HMR enabled ({})", self.url);
                    self.read_loop(&mut socket)
                }
                Err(e) => Err(e),
            };

            let last_error = match outcome {
                Ok(SessionEnd::Stopped) => return Ok(()),
                Ok(SessionEnd::Closed) => {
                    crate::log!("hmr"; "connection closed");
                    None
                }
                Err(e) => {
                    crate::debug!("hmr"; "{}", e);
                    Some(e)
                }
            };

            if self.should_stop() {
                return Ok(());
            }

            attempt += 1;
            if attempt > self.reconnect.max_attempts {
                return last_error.map_or(Ok(()), Err);
            }

            let delay = self.reconnect.delay_for(attempt);
            crate::log!("hmr"; "reconnecting in {}ms ({}/{})",
                delay.as_millis(), attempt, self.reconnect.max_attempts);
            self.pause(delay);
        }
    }

    /// Sleep for `delay`, waking early once a stop is requested.
    fn pause(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.should_stop() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            std::thread::sleep(left.min(READ_TIMEOUT));
        }
    }

    fn connect(&self) -> Result<Socket, TransportError> {
        if self.url.scheme() == "wss" {
            install_crypto_provider();
        }

        let (socket, _response) =
            tungstenite::connect(self.url.as_str()).map_err(|source| TransportError::Connect {
                url: self.url.clone(),
                source,
            })?;

        // Without a timeout a quiet server would block shutdown forever
        let tcp = match socket.get_ref() {
            MaybeTlsStream::Plain(stream) => Some(stream),
            MaybeTlsStream::Rustls(stream) => Some(&stream.sock),
            _ => None,
        };
        if let Some(tcp) = tcp {
            let _ = tcp.set_read_timeout(Some(READ_TIMEOUT));
        }
        Ok(socket)
    }

    fn read_loop(&self, socket: &mut Socket) -> Result<SessionEnd, TransportError> {
        loop {
            if self.should_stop() {
                let _ = socket.close(None);
                let _ = socket.flush();
                return Ok(SessionEnd::Stopped);
            }

            match socket.read() {
                Ok(Message::Text(text)) => {
                    dispatch_frame(&self.dispatcher, &text);
                }
                Ok(Message::Close(_)) => {
                    let _ = socket.flush();
                    return Ok(SessionEnd::Closed);
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(SessionEnd::Closed);
                }
                Err(source) => {
                    return Err(TransportError::Read {
                        url: self.url.clone(),
                        source,
                    });
                }
            }
        }
    }
}

/// Make `ring` the process-wide TLS provider before the first `wss` handshake.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Fails only when a provider is already installed, which is fine
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

// =============================================================================
// Test Helpers
// =============================================================================

/// Accept one client on a loopback port, send `frames`, then close.
///
/// Returns the page origin to connect to and the server thread.
#[cfg(test)]
pub fn test_server(frames: &[&str]) -> (String, std::thread::JoinHandle<()>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let frames: Vec<String> = frames.iter().map(|f| f.to_string()).collect();

    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        // The client may hang up early, so write errors are not failures
        for frame in frames {
            let _ = ws.send(Message::Text(frame.into()));
        }
        let _ = ws.close(None);
        // Drain until the client acknowledges the close
        while ws.read().is_ok() {}
    });

    (format!("http://127.0.0.1:{port}/index.html"), handle)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use parking_lot::Mutex;

    use super::*;
    use crate::hmr::dispatcher::ListenOptions;

    fn recording_dispatcher() -> (Dispatcher, Arc<Mutex<Vec<ChangeNotification>>>) {
        let dispatcher = Dispatcher::new();
        let seen: Arc<Mutex<Vec<ChangeNotification>>> = Arc::default();
        for kind in ChangeKind::ALL {
            let sink = Arc::clone(&seen);
            dispatcher.on(kind, move |n| sink.lock().push(n.clone()), ListenOptions::default());
        }
        (dispatcher, seen)
    }

    #[test]
    fn test_endpoint_url_schemes() {
        assert_eq!(
            endpoint_url("http://localhost:8080").unwrap().as_str(),
            "ws://localhost:8080/__serve_hmr"
        );
        assert_eq!(
            endpoint_url("https://example.com:3000/a/b?x#y").unwrap().as_str(),
            "wss://example.com:3000/__serve_hmr"
        );
        assert_eq!(
            endpoint_url("ws://127.0.0.1:5000/").unwrap().as_str(),
            "ws://127.0.0.1:5000/__serve_hmr"
        );
    }

    #[test]
    fn test_endpoint_url_bare_host() {
        assert_eq!(
            endpoint_url("localhost:8080").unwrap().as_str(),
            "ws://localhost:8080/__serve_hmr"
        );
    }

    #[test]
    fn test_endpoint_url_rejects_other_schemes() {
        assert!(matches!(
            endpoint_url("ftp://example.com"),
            Err(TransportError::Scheme(s)) if s == "ftp"
        ));
    }

    #[test]
    fn test_dispatch_frame() {
        let (dispatcher, seen) = recording_dispatcher();
        assert!(dispatch_frame(&dispatcher, "deleted:a.css"));
        assert!(!dispatch_frame(&dispatcher, "ping"));
        assert_eq!(*seen.lock(), vec![ChangeNotification::deleted("a.css")]);
    }

    #[test]
    fn test_reconnect_delay() {
        let policy = ReconnectPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_listener_relays_frames_in_order() {
        let (origin, server) = test_server(&[
            "changed:index.html",
            "ping",
            "renamed:new.js:old.js",
            "created:a.css",
            "deleted:b.css",
        ]);
        let (dispatcher, seen) = recording_dispatcher();

        let listener = HmrListener::new(endpoint_url(&origin).unwrap(), dispatcher)
            .with_reconnect(ReconnectPolicy::disabled());
        listener.run().unwrap();
        server.join().unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                ChangeNotification::changed("index.html"),
                ChangeNotification::renamed("new.js", Some("old.js".into())),
                ChangeNotification::created("a.css"),
                ChangeNotification::deleted("b.css"),
            ]
        );
    }

    #[test]
    fn test_stop_from_callback() {
        let (origin, server) = test_server(&["created:a.html", "created:b.html"]);
        let dispatcher = Dispatcher::new();
        let listener = HmrListener::new(endpoint_url(&origin).unwrap(), dispatcher.clone());

        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let stop = listener.stop_handle();
        dispatcher.on_create(
            move |n| {
                sink.lock().push(n.path.clone());
                stop.stop();
            },
            ListenOptions::default(),
        );

        // reconnects stay enabled: stopping must still end the run
        listener.run().unwrap();
        server.join().unwrap();
        assert_eq!(*seen.lock(), vec!["a.html".to_string()]);
    }

    #[test]
    fn test_stopped_before_run() {
        let listener = HmrListener::new(endpoint_url("http://127.0.0.1:1").unwrap(), Dispatcher::new());
        listener.stop_handle().stop();
        assert!(listener.run().is_ok());
    }

    #[test]
    fn test_connect_failure_without_reconnect() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = endpoint_url(&format!("http://127.0.0.1:{port}")).unwrap();
        let listener =
            HmrListener::new(url, Dispatcher::new()).with_reconnect(ReconnectPolicy::disabled());

        assert!(matches!(listener.run(), Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_reconnect_gives_up() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = endpoint_url(&format!("http://127.0.0.1:{port}")).unwrap();
        let listener = HmrListener::new(url, Dispatcher::new()).with_reconnect(ReconnectPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
        });

        assert!(matches!(listener.run(), Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_backoff_wakes_on_stop() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = endpoint_url(&format!("http://127.0.0.1:{port}")).unwrap();
        let listener = HmrListener::new(url, Dispatcher::new()).with_reconnect(ReconnectPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        });

        let stop = listener.stop_handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            stop.stop();
        });

        let started = Instant::now();
        assert!(listener.run().is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }

    #[test]
    fn test_wss_handshake_failure_is_connect_error() {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        // Plain TCP peer that hangs up instead of speaking TLS
        let peer = thread::spawn(move || drop(server.accept()));

        let url = endpoint_url(&format!("https://127.0.0.1:{port}")).unwrap();
        assert_eq!(url.scheme(), "wss");
        let listener =
            HmrListener::new(url, Dispatcher::new()).with_reconnect(ReconnectPolicy::disabled());

        assert!(matches!(listener.run(), Err(TransportError::Connect { .. })));
        peer.join().unwrap();
    }
}
