//! The session: one transport connection multiplexing every operation
//!
//! A [`Session`] owns a single framed transport to the broker and
//! multiplexes all client-side state over it: declared publishers,
//! subscribers, queryables, queriers and liveliness tokens, in-flight
//! gets, and pending request/response exchanges. Inbound frames are
//! processed by one routing task in transport-delivery order; each
//! frame either resolves exactly one pending request or is dispatched
//! to the handler registered for its resource id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use uuid::Uuid;

use veles_protocol::{
    codec, BrokerMessage, ClientMessage, KeyExpr, ProtocolError, Qos, QuerySettings, Reply, Sample,
    SessionInfo, Timestamp, Transport,
};

use crate::channel::{ChannelReceiver, ChannelState, TryRecv};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::handler::{Handler, PushHandler};
use crate::id::IdAllocator;
use crate::liveliness::Liveliness;
use crate::publisher::Publisher;
use crate::query::Query;
use crate::queryable::Queryable;
use crate::querier::Querier;
use crate::subscriber::Subscriber;
use crate::transport::websocket::WebSocketTransport;

/// Options for [`Session::put`]
#[derive(Debug, Default)]
pub struct PutOptions {
    pub encoding: Option<String>,
    pub attachment: Option<Bytes>,
    pub qos: Qos,
}

/// Options for [`Session::delete`]
#[derive(Debug, Default)]
pub struct DeleteOptions {
    pub attachment: Option<Bytes>,
    pub qos: Qos,
}

/// Options for [`Session::declare_publisher`]
#[derive(Debug, Default)]
pub struct PublisherOptions {
    /// Default encoding applied to puts that do not specify one
    pub encoding: Option<String>,
    pub qos: Qos,
}

/// Options for [`Session::declare_queryable`]
#[derive(Debug, Default)]
pub struct QueryableOptions {
    /// Whether this queryable claims completeness for its key space
    pub complete: bool,
}

/// Options for [`Session::declare_querier`]
#[derive(Debug, Default)]
pub struct QuerierOptions {
    pub settings: QuerySettings,
    /// Per-query timeout enforced broker-side; the session default
    /// applies when absent
    pub timeout: Option<Duration>,
}

/// Options for [`Session::get`]
#[derive(Debug, Default)]
pub struct GetOptions {
    pub payload: Option<Bytes>,
    pub encoding: Option<String>,
    pub attachment: Option<Bytes>,
    pub settings: QuerySettings,
    /// Timeout enforced broker-side; the session default applies when
    /// absent
    pub timeout: Option<Duration>,
}

/// Consumer side of a reply stream produced by a `get`
///
/// The stream ends when the broker sends the final marker for the get;
/// callback-mode gets have no receivable side and report end-of-stream
/// immediately.
#[derive(Debug)]
pub struct Replies {
    receiver: Option<ChannelReceiver<Reply>>,
}

impl Replies {
    pub(crate) fn new(receiver: Option<ChannelReceiver<Reply>>) -> Self {
        Replies { receiver }
    }

    /// Receives the next reply, suspending until one arrives or the
    /// stream ends
    pub async fn recv(&mut self) -> Option<Reply> {
        match &mut self.receiver {
            Some(receiver) => receiver.recv().await,
            None => None,
        }
    }

    /// Receives the next reply without suspending
    pub fn try_recv(&mut self) -> TryRecv<Reply> {
        match &mut self.receiver {
            Some(receiver) => receiver.try_recv(),
            None => TryRecv::Closed,
        }
    }

    pub fn state(&self) -> ChannelState {
        match &self.receiver {
            Some(receiver) => receiver.state(),
            None => ChannelState::Close,
        }
    }
}

/// A connection to the broker
///
/// Cheap to clone; all clones share the same underlying transport and
/// state. Dropping every clone does not close the connection, call
/// [`Session::close`] for a deterministic shutdown.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
    id: Uuid,
}

impl Session {
    /// Connects to the broker at `config.locator` over WebSocket and
    /// verifies liveness with an initial ping
    pub async fn open(config: SessionConfig) -> Result<Session> {
        let transport = WebSocketTransport::connect(&config.locator)
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        Self::open_with_transport(config, transport).await
    }

    /// Opens a session over an already-constructed transport
    ///
    /// Used with [`MemoryTransport`](crate::transport::memory::MemoryTransport)
    /// for tests and in-process brokers.
    pub async fn open_with_transport<T: Transport>(
        config: SessionConfig,
        transport: T,
    ) -> Result<Session> {
        let pump_capacity = config.channel_capacity.max(1);
        let (incoming_tx, mut incoming_rx) = mpsc::channel(pump_capacity);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(pump_capacity);

        tokio::spawn(async move {
            if let Err(error) = transport.run(incoming_tx, outgoing_rx).await {
                tracing::error!(error = %error, "transport terminated with error");
            }
        });

        let inner = Arc::new(SessionInner::new(outgoing_tx, config));

        let routing = inner.clone();
        tokio::spawn(async move {
            while let Some(frame) = incoming_rx.recv().await {
                SessionInner::handle_frame(&routing, frame);
            }
            tracing::debug!("transport closed, tearing down session state");
            routing.close_locally();
        });

        let id = inner.ping().await?;
        tracing::info!(session_id = %id, "session established");
        Ok(Session { inner, id })
    }

    /// The broker-assigned session identifier obtained at open time
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Closes the transport and tears down every live registration
    ///
    /// All subscriber, queryable and reply channels are closed, and
    /// pending requests fail with `SessionClosed`. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.inner.close_locally();
        Ok(())
    }

    /// Publishes one value on `key_expr`
    pub async fn put(
        &self,
        key_expr: &KeyExpr,
        payload: impl Into<Bytes>,
        options: PutOptions,
    ) -> Result<()> {
        self.inner
            .send(&ClientMessage::Put {
                key_expr: key_expr.as_str().to_string(),
                payload: payload.into(),
                encoding: options.encoding,
                attachment: options.attachment,
                qos: options.qos,
            })
            .await
    }

    /// Retracts the value at `key_expr`
    pub async fn delete(&self, key_expr: &KeyExpr, options: DeleteOptions) -> Result<()> {
        self.inner
            .send(&ClientMessage::Delete {
                key_expr: key_expr.as_str().to_string(),
                attachment: options.attachment,
                qos: options.qos,
            })
            .await
    }

    /// Declares a publisher bound to `key_expr`
    pub async fn declare_publisher(
        &self,
        key_expr: &KeyExpr,
        options: PublisherOptions,
    ) -> Result<Publisher> {
        let id = self
            .inner
            .declare_publisher(key_expr, options.encoding.clone(), options.qos)
            .await?;
        Ok(Publisher::new(
            self.inner.clone(),
            id,
            key_expr.clone(),
            options.encoding,
            options.qos,
        ))
    }

    /// Declares a subscriber on `key_expr`
    ///
    /// The subscriber's handler starts receiving matching samples once
    /// the broker acknowledges the declaration.
    pub async fn declare_subscriber(
        &self,
        key_expr: &KeyExpr,
        handler: Handler<Sample>,
    ) -> Result<Subscriber> {
        let (push, receiver) = handler.into_parts(self.inner.config.channel_capacity);
        let id = self.inner.declare_subscriber(key_expr, push).await?;
        Ok(Subscriber::new(
            self.inner.clone(),
            id,
            key_expr.clone(),
            false,
            receiver,
        ))
    }

    /// Declares a queryable answering gets on `key_expr`
    pub async fn declare_queryable(
        &self,
        key_expr: &KeyExpr,
        handler: Handler<Query>,
        options: QueryableOptions,
    ) -> Result<Queryable> {
        let (push, receiver) = handler.into_parts(self.inner.config.channel_capacity);
        let id = self
            .inner
            .declare_queryable(key_expr, options.complete, push)
            .await?;
        Ok(Queryable::new(
            self.inner.clone(),
            id,
            key_expr.clone(),
            receiver,
        ))
    }

    /// Declares a querier pre-bound to `key_expr` and query settings
    pub async fn declare_querier(
        &self,
        key_expr: &KeyExpr,
        options: QuerierOptions,
    ) -> Result<Querier> {
        let timeout = options
            .timeout
            .unwrap_or_else(|| self.inner.config.request_timeout());
        let id = self
            .inner
            .declare_querier(key_expr, options.settings, timeout.as_millis() as u64)
            .await?;
        Ok(Querier::new(self.inner.clone(), id, key_expr.clone()))
    }

    /// Issues a one-shot query for `key_expr`
    ///
    /// Returns immediately once the request is sent; replies arrive on
    /// the returned stream and the stream ends when the broker sends
    /// the final marker.
    pub async fn get(
        &self,
        key_expr: &KeyExpr,
        parameters: &str,
        handler: Handler<Reply>,
        options: GetOptions,
    ) -> Result<Replies> {
        let (push, receiver) = handler.into_parts(self.inner.config.channel_capacity);
        let key_expr = key_expr.as_str().to_string();
        let parameters = parameters.to_string();
        let timeout = options
            .timeout
            .unwrap_or_else(|| self.inner.config.request_timeout());
        self.inner
            .start_get(push, move |get_id| ClientMessage::Get {
                get_id,
                key_expr,
                parameters,
                payload: options.payload,
                encoding: options.encoding,
                attachment: options.attachment,
                settings: options.settings,
                timeout_ms: timeout.as_millis() as u64,
            })
            .await?;
        Ok(Replies::new(receiver))
    }

    /// Access to liveliness tokens, subscribers and queries
    pub fn liveliness(&self) -> Liveliness<'_> {
        Liveliness::new(&self.inner)
    }

    /// Fetches the broker-reported identity of this session's
    /// neighbourhood
    pub async fn info(&self) -> Result<SessionInfo> {
        match self.inner.request(&ClientMessage::GetSessionInfo).await? {
            BrokerMessage::ResponseSessionInfo { info } => Ok(info),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Obtains a broker-generated timestamp
    pub async fn new_timestamp(&self) -> Result<Timestamp> {
        match self.inner.request(&ClientMessage::GetTimestamp).await? {
            BrokerMessage::ResponseTimestamp { timestamp } => Ok(timestamp),
            other => Err(unexpected_response(&other)),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn unexpected_response(msg: &BrokerMessage) -> SessionError {
    SessionError::ProtocolViolation(format!(
        "unexpected response tag {:#04x}",
        msg.tag()
    ))
}

/// Shared multiplexer state behind every `Session` clone and facade
pub(crate) struct SessionInner {
    /// `None` once the session is closed; cloning the sender out of
    /// the mutex keeps sends off the lock
    outgoing: Mutex<Option<mpsc::Sender<Bytes>>>,
    state: Mutex<State>,
    pub(crate) config: SessionConfig,
    closed: AtomicBool,
}

struct State {
    publisher_ids: IdAllocator,
    subscriber_ids: IdAllocator,
    queryable_ids: IdAllocator,
    querier_ids: IdAllocator,
    liveliness_ids: IdAllocator,
    get_ids: IdAllocator,
    sequence_ids: IdAllocator,
    /// Ordinary and liveliness subscribers share this map
    subscribers: HashMap<u32, Arc<PushHandler<Sample>>>,
    queryables: HashMap<u32, Arc<PushHandler<Query>>>,
    gets: HashMap<u32, Arc<PushHandler<Reply>>>,
    pending: HashMap<u32, oneshot::Sender<Result<BrokerMessage>>>,
}

impl SessionInner {
    fn new(outgoing_tx: mpsc::Sender<Bytes>, config: SessionConfig) -> Self {
        SessionInner {
            outgoing: Mutex::new(Some(outgoing_tx)),
            state: Mutex::new(State {
                publisher_ids: IdAllocator::new(),
                subscriber_ids: IdAllocator::new(),
                queryable_ids: IdAllocator::new(),
                querier_ids: IdAllocator::new(),
                liveliness_ids: IdAllocator::new(),
                get_ids: IdAllocator::new(),
                sequence_ids: IdAllocator::new(),
                subscribers: HashMap::new(),
                queryables: HashMap::new(),
                gets: HashMap::new(),
                pending: HashMap::new(),
            }),
            config,
            closed: AtomicBool::new(false),
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<Bytes>> {
        self.outgoing
            .lock()
            .unwrap()
            .clone()
            .ok_or(SessionError::SessionClosed)
    }

    /// Sends a fire-and-forget message
    pub(crate) async fn send(&self, msg: &ClientMessage) -> Result<()> {
        let sender = self.sender()?;
        let frame = codec::encode_client(msg, None);
        sender
            .send(frame)
            .await
            .map_err(|_| SessionError::Send("transport channel closed".to_string()))
    }

    /// Best-effort send from non-async contexts (drop paths)
    pub(crate) fn send_nowait(&self, msg: &ClientMessage) {
        let Ok(sender) = self.sender() else {
            return;
        };
        let frame = codec::encode_client(msg, None);
        if let Err(error) = sender.try_send(frame) {
            tracing::warn!(tag = msg.tag(), error = %error, "dropping outbound frame");
        }
    }

    /// Sends a correlated request and awaits its response
    ///
    /// At most one pending entry exists per sequence id; the entry is
    /// removed by whichever happens first, the response or the
    /// timeout. A response arriving after the timeout finds no entry
    /// and is logged as orphaned by the routing path.
    pub(crate) async fn request(&self, msg: &ClientMessage) -> Result<BrokerMessage> {
        let sender = self.sender()?;
        let (response_tx, response_rx) = oneshot::channel();
        let seq = {
            let mut state = self.state.lock().unwrap();
            let seq = state.sequence_ids.next_id();
            state.pending.insert(seq, response_tx);
            seq
        };

        let frame = codec::encode_client(msg, Some(seq));
        if sender.send(frame).await.is_err() {
            self.state.lock().unwrap().pending.remove(&seq);
            return Err(SessionError::Send("transport channel closed".to_string()));
        }

        match timeout(self.config.request_timeout(), response_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(SessionError::SessionClosed),
            Err(_) => {
                self.state.lock().unwrap().pending.remove(&seq);
                Err(SessionError::RequestTimeout(self.config.request_timeout()))
            }
        }
    }

    /// Request variant for calls whose only success response is
    /// `ResponseOk`
    async fn request_ok(&self, msg: &ClientMessage) -> Result<()> {
        match self.request(msg).await? {
            BrokerMessage::ResponseOk => Ok(()),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Verifies transport liveness and fetches the broker-assigned
    /// session id
    async fn ping(&self) -> Result<Uuid> {
        match self.request(&ClientMessage::Ping).await? {
            BrokerMessage::ResponsePing { session_id } => Ok(session_id),
            other => Err(unexpected_response(&other)),
        }
    }

    pub(crate) async fn declare_publisher(
        &self,
        key_expr: &KeyExpr,
        encoding: Option<String>,
        qos: Qos,
    ) -> Result<u32> {
        let id = self.state.lock().unwrap().publisher_ids.next_id();
        self.request_ok(&ClientMessage::DeclarePublisher {
            id,
            key_expr: key_expr.as_str().to_string(),
            encoding,
            qos,
        })
        .await?;
        Ok(id)
    }

    pub(crate) async fn undeclare_publisher(&self, id: u32) -> Result<()> {
        self.request_ok(&ClientMessage::UndeclarePublisher { id }).await
    }

    /// Registers the handler before the round-trip so a push racing
    /// the acknowledgement still finds it, and rolls the registration
    /// back if the declaration ultimately fails
    async fn declare_subscriber_like(
        &self,
        handler: PushHandler<Sample>,
        build: impl FnOnce(u32) -> ClientMessage,
    ) -> Result<u32> {
        let id = {
            let mut state = self.state.lock().unwrap();
            let id = state.subscriber_ids.next_id();
            state.subscribers.insert(id, Arc::new(handler));
            id
        };
        if let Err(error) = self.request_ok(&build(id)).await {
            if let Some(handler) = self.state.lock().unwrap().subscribers.remove(&id) {
                handler.close();
            }
            return Err(error);
        }
        Ok(id)
    }

    pub(crate) async fn declare_subscriber(
        &self,
        key_expr: &KeyExpr,
        handler: PushHandler<Sample>,
    ) -> Result<u32> {
        let key_expr = key_expr.as_str().to_string();
        self.declare_subscriber_like(handler, move |id| ClientMessage::DeclareSubscriber {
            id,
            key_expr,
        })
        .await
    }

    pub(crate) async fn declare_liveliness_subscriber(
        &self,
        key_expr: &KeyExpr,
        history: bool,
        handler: PushHandler<Sample>,
    ) -> Result<u32> {
        let key_expr = key_expr.as_str().to_string();
        self.declare_subscriber_like(handler, move |id| {
            ClientMessage::DeclareLivelinessSubscriber {
                id,
                key_expr,
                history,
            }
        })
        .await
    }

    /// Detaches the handler before the round-trip: no push arriving
    /// after this call returns is delivered, even while the broker's
    /// acknowledgement is still in flight
    pub(crate) async fn undeclare_subscriber(&self, id: u32, liveliness: bool) -> Result<()> {
        if let Some(handler) = self.state.lock().unwrap().subscribers.remove(&id) {
            handler.close();
        }
        let msg = if liveliness {
            ClientMessage::UndeclareLivelinessSubscriber { id }
        } else {
            ClientMessage::UndeclareSubscriber { id }
        };
        self.request_ok(&msg).await
    }

    pub(crate) async fn declare_queryable(
        &self,
        key_expr: &KeyExpr,
        complete: bool,
        handler: PushHandler<Query>,
    ) -> Result<u32> {
        let id = {
            let mut state = self.state.lock().unwrap();
            let id = state.queryable_ids.next_id();
            state.queryables.insert(id, Arc::new(handler));
            id
        };
        let msg = ClientMessage::DeclareQueryable {
            id,
            key_expr: key_expr.as_str().to_string(),
            complete,
        };
        if let Err(error) = self.request_ok(&msg).await {
            if let Some(handler) = self.state.lock().unwrap().queryables.remove(&id) {
                handler.close();
            }
            return Err(error);
        }
        Ok(id)
    }

    pub(crate) async fn undeclare_queryable(&self, id: u32) -> Result<()> {
        if let Some(handler) = self.state.lock().unwrap().queryables.remove(&id) {
            handler.close();
        }
        self.request_ok(&ClientMessage::UndeclareQueryable { id }).await
    }

    pub(crate) async fn declare_querier(
        &self,
        key_expr: &KeyExpr,
        settings: QuerySettings,
        timeout_ms: u64,
    ) -> Result<u32> {
        let id = self.state.lock().unwrap().querier_ids.next_id();
        self.request_ok(&ClientMessage::DeclareQuerier {
            id,
            key_expr: key_expr.as_str().to_string(),
            settings,
            timeout_ms,
        })
        .await?;
        Ok(id)
    }

    pub(crate) async fn undeclare_querier(&self, id: u32) -> Result<()> {
        self.request_ok(&ClientMessage::UndeclareQuerier { id }).await
    }

    pub(crate) async fn declare_liveliness_token(&self, key_expr: &KeyExpr) -> Result<u32> {
        let id = self.state.lock().unwrap().liveliness_ids.next_id();
        self.request_ok(&ClientMessage::DeclareLivelinessToken {
            id,
            key_expr: key_expr.as_str().to_string(),
        })
        .await?;
        Ok(id)
    }

    pub(crate) async fn undeclare_liveliness_token(&self, id: u32) -> Result<()> {
        self.request_ok(&ClientMessage::UndeclareLivelinessToken { id })
            .await
    }

    /// Registers a reply handler and sends a `Get`-family request
    ///
    /// The request itself is fire-and-forget: replies correlate via
    /// the embedded get id alone, and the handler is torn down when
    /// the broker's final marker for that id arrives.
    pub(crate) async fn start_get(
        &self,
        handler: PushHandler<Reply>,
        build: impl FnOnce(u32) -> ClientMessage,
    ) -> Result<u32> {
        let get_id = {
            let mut state = self.state.lock().unwrap();
            let id = state.get_ids.next_id();
            state.gets.insert(id, Arc::new(handler));
            id
        };
        if let Err(error) = self.send(&build(get_id)).await {
            if let Some(handler) = self.state.lock().unwrap().gets.remove(&get_id) {
                handler.close();
            }
            return Err(error);
        }
        Ok(get_id)
    }

    /// Routes one inbound frame; errors never escape this boundary
    ///
    /// Takes the `Arc` because inbound queries capture a handle back
    /// to the session for their replies.
    fn handle_frame(inner: &Arc<Self>, mut frame: Bytes) {
        let header = match codec::decode_header(&mut frame) {
            Ok(header) => header,
            Err(error) => {
                tracing::warn!(error = %error, "dropping malformed frame");
                return;
            }
        };
        match header.sequence_id {
            Some(seq) => inner.handle_response(seq, header.tag, frame),
            None => Self::handle_push(inner, header.tag, frame),
        }
    }

    fn handle_response(&self, seq: u32, tag: u8, mut frame: Bytes) {
        let Some(slot) = self.state.lock().unwrap().pending.remove(&seq) else {
            tracing::warn!(sequence_id = seq, "orphaned response, no pending request");
            return;
        };
        let outcome = match codec::decode_broker(tag, &mut frame) {
            Ok(BrokerMessage::ResponseError { message }) => Err(SessionError::Broker(message)),
            Ok(msg) if msg.is_response() => Ok(msg),
            Ok(msg) => Err(SessionError::ProtocolViolation(format!(
                "push tag {:#04x} carried a sequence id",
                msg.tag()
            ))),
            Err(error) => Err(error.into()),
        };
        // the caller may have timed out and dropped its receiver
        let _ = slot.send(outcome);
    }

    fn handle_push(inner: &Arc<Self>, tag: u8, mut frame: Bytes) {
        let msg = match codec::decode_broker(tag, &mut frame) {
            Ok(msg) => msg,
            Err(ProtocolError::UnknownTag(tag)) => {
                tracing::warn!(tag, "ignoring frame with unknown tag");
                return;
            }
            Err(error) => {
                tracing::warn!(tag, error = %error, "dropping malformed frame");
                return;
            }
        };
        match msg {
            BrokerMessage::InSample {
                subscriber_id,
                sample,
            } => {
                let handler = inner.state.lock().unwrap().subscribers.get(&subscriber_id).cloned();
                match handler {
                    Some(handler) => {
                        if !handler.push(sample) {
                            tracing::debug!(subscriber_id, "sample dropped by full channel");
                        }
                    }
                    None => tracing::warn!(subscriber_id, "sample for unknown subscriber"),
                }
            }
            BrokerMessage::InQuery {
                queryable_id,
                query_id,
                key_expr,
                parameters,
                payload,
                encoding,
                attachment,
            } => {
                let handler = inner.state.lock().unwrap().queryables.get(&queryable_id).cloned();
                match handler {
                    Some(handler) => {
                        let query = Query::new(
                            inner.clone(),
                            query_id,
                            key_expr,
                            parameters,
                            payload,
                            encoding,
                            attachment,
                        );
                        // a dropped query finalizes itself with a bare
                        // response-final
                        handler.push(query);
                    }
                    None => tracing::warn!(queryable_id, "query for unknown queryable"),
                }
            }
            BrokerMessage::InReply { get_id, reply } => {
                let handler = inner.state.lock().unwrap().gets.get(&get_id).cloned();
                match handler {
                    Some(handler) => {
                        if !handler.push(reply) {
                            tracing::debug!(get_id, "reply dropped by full channel");
                        }
                    }
                    None => tracing::warn!(get_id, "reply for unknown get"),
                }
            }
            BrokerMessage::ResponseFinal { id } => {
                match inner.state.lock().unwrap().gets.remove(&id) {
                    Some(handler) => handler.close(),
                    None => tracing::warn!(get_id = id, "final marker for unknown get"),
                }
            }
            other => {
                // response tags are only valid with a sequence id
                tracing::error!(
                    tag = other.tag(),
                    "protocol violation: response tag on the push path"
                );
            }
        }
    }

    /// Tears down every registration exactly once and severs the
    /// transport; safe to call from both `close` and the routing task
    pub(crate) fn close_locally(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.outgoing.lock().unwrap() = None;
        let (subscribers, queryables, gets, pending) = {
            let mut state = self.state.lock().unwrap();
            (
                std::mem::take(&mut state.subscribers),
                std::mem::take(&mut state.queryables),
                std::mem::take(&mut state.gets),
                std::mem::take(&mut state.pending),
            )
        };
        for handler in subscribers.values() {
            handler.close();
        }
        for handler in queryables.values() {
            handler.close();
        }
        for handler in gets.values() {
            handler.close();
        }
        for (_, slot) in pending {
            let _ = slot.send(Err(SessionError::SessionClosed));
        }
        tracing::debug!("session state cleared");
    }
}

impl std::fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInner")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
