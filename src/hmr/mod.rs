//! HMR Module
//!
//! Client side of `serve`'s hot-module-reload channel.
//!
//! # Architecture
//!
//! ```text
//! serve --[ws text frame]--> transport --> notification --> dispatcher --> subscribers
//!                                                              ^
//!                                           page (_serve:fname filter)
//! ```
//!
//! # Modules
//!
//! - `notification` - Frame format and `ChangeNotification`
//! - `dispatcher` - Subscriber registry and the process-wide instance
//! - `page` - `_serve:*` meta tags of a served HTML page
//! - `transport` - WebSocket connection, read loop and reconnect policy

pub mod dispatcher;
pub mod notification;
pub mod page;
pub mod transport;

pub use dispatcher::{Dispatcher, ListenOptions, Subscription, global};
pub use notification::{ChangeKind, ChangeNotification};
pub use page::PageMeta;
pub use transport::{HmrListener, ReconnectPolicy, endpoint_url};
