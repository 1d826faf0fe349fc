//! # Veles Client
//!
//! Client-side session multiplexer for the Veles pub/sub overlay.
//!
//! A [`Session`] holds one framed transport to a broker and
//! multiplexes every operation over it: publishing, subscribing,
//! querying, answering queries, and liveliness tracking. Inbound
//! frames are routed by one task, in transport order, to whichever
//! pending request or registered handler they belong to.
//!
//! ## Example
//!
//! ```no_run
//! use veles_client::{Handler, Session, SessionConfig};
//! use veles_protocol::KeyExpr;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::open(SessionConfig::new("ws://127.0.0.1:10000")).await?;
//!
//!     let key = KeyExpr::new("demo/room/*/temperature")?;
//!     let mut subscriber = session.declare_subscriber(&key, Handler::default()).await?;
//!
//!     while let Some(sample) = subscriber.recv().await {
//!         println!("{}: {:?}", sample.key_expr, sample.payload);
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod liveliness;
pub mod publisher;
pub mod querier;
pub mod query;
pub mod queryable;
pub mod session;
pub mod subscriber;
pub mod transport;

mod id;

pub use channel::{ChannelPolicy, ChannelReceiver, ChannelSender, ChannelState, TryRecv};
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use handler::Handler;
pub use liveliness::{Liveliness, LivelinessToken};
pub use publisher::{Publisher, PublisherDeleteOptions, PublisherPutOptions};
pub use querier::{Querier, QuerierGetOptions};
pub use query::{Query, ReplyDelOptions, ReplyOptions};
pub use queryable::Queryable;
pub use session::{
    DeleteOptions, GetOptions, PublisherOptions, PutOptions, QuerierOptions, QueryableOptions,
    Replies, Session,
};
pub use subscriber::Subscriber;
