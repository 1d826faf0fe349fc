mod common;

use bytes::Bytes;
use common::{open_session, test_config};
use uuid::Uuid;
use veles::client::{Handler, SessionError};
use veles::protocol::{
    BrokerMessage, ClientMessage, KeyExpr, Qos, Reply, ReplyError, Sample, SampleKind,
};

fn reply_sample(key_expr: &str, payload: &[u8]) -> Reply {
    Reply::Sample(Sample {
        key_expr: key_expr.to_string(),
        payload: Bytes::copy_from_slice(payload),
        kind: SampleKind::Put,
        encoding: None,
        attachment: None,
        timestamp: None,
        qos: Qos::default(),
    })
}

#[tokio::test]
async fn test_queryable_answers_a_query() {
    let (session, mut broker) = open_session(test_config(), Uuid::new_v4()).await;

    let key_expr = KeyExpr::new("demo/store/**").unwrap();
    let (queryable, request) = tokio::join!(
        session.declare_queryable(&key_expr, Handler::default(), Default::default()),
        broker.ack_next(),
    );
    let mut queryable = queryable.unwrap();
    let queryable_id = match request {
        ClientMessage::DeclareQueryable { id, complete, .. } => {
            assert!(!complete);
            id
        }
        other => panic!("expected DeclareQueryable, got {other:?}"),
    };

    broker
        .send(
            &BrokerMessage::InQuery {
                queryable_id,
                query_id: 77,
                key_expr: "demo/store/item".to_string(),
                parameters: "format=raw".to_string(),
                payload: Some(Bytes::from_static(b"body")),
                encoding: None,
                attachment: None,
            },
            None,
        )
        .await;

    let query = queryable.recv().await.unwrap();
    assert_eq!(query.key_expr(), "demo/store/item");
    assert_eq!(query.parameters(), "format=raw");
    assert_eq!(query.payload(), Some(&Bytes::from_static(b"body")));

    query
        .reply(
            &KeyExpr::new("demo/store/item").unwrap(),
            Bytes::from_static(b"answer"),
            Default::default(),
        )
        .await
        .unwrap();

    let (seq, msg) = broker.recv().await;
    assert!(seq.is_none(), "replies are fire-and-forget");
    match msg {
        ClientMessage::ReplyOk {
            query_id, payload, ..
        } => {
            assert_eq!(query_id, 77);
            assert_eq!(payload, Bytes::from_static(b"answer"));
        }
        other => panic!("expected ReplyOk, got {other:?}"),
    }

    let (seq, msg) = broker.recv().await;
    assert!(seq.is_none());
    assert!(matches!(msg, ClientMessage::ResponseFinal { id: 77 }));
}

#[tokio::test]
async fn test_query_rejects_a_second_reply() {
    let (session, mut broker) = open_session(test_config(), Uuid::new_v4()).await;

    let key_expr = KeyExpr::new("demo/q").unwrap();
    let (queryable, request) = tokio::join!(
        session.declare_queryable(&key_expr, Handler::default(), Default::default()),
        broker.ack_next(),
    );
    let mut queryable = queryable.unwrap();
    let queryable_id = match request {
        ClientMessage::DeclareQueryable { id, .. } => id,
        other => panic!("expected DeclareQueryable, got {other:?}"),
    };

    broker
        .send(
            &BrokerMessage::InQuery {
                queryable_id,
                query_id: 5,
                key_expr: "demo/q".to_string(),
                parameters: String::new(),
                payload: None,
                encoding: None,
                attachment: None,
            },
            None,
        )
        .await;

    let query = queryable.recv().await.unwrap();
    query
        .reply_err(Bytes::from_static(b"nope"), None)
        .await
        .unwrap();

    let result = query
        .reply(&key_expr, Bytes::from_static(b"late"), Default::default())
        .await;
    assert!(matches!(result, Err(SessionError::QueryFinalized)));

    // exactly one reply and one final went out
    let (_, msg) = broker.recv().await;
    assert!(matches!(msg, ClientMessage::ReplyErr { query_id: 5, .. }));
    let (_, msg) = broker.recv().await;
    assert!(matches!(msg, ClientMessage::ResponseFinal { id: 5 }));
}

#[tokio::test]
async fn test_dropped_query_sends_bare_final() {
    let (session, mut broker) = open_session(test_config(), Uuid::new_v4()).await;

    let key_expr = KeyExpr::new("demo/q").unwrap();
    let (queryable, request) = tokio::join!(
        session.declare_queryable(&key_expr, Handler::default(), Default::default()),
        broker.ack_next(),
    );
    let mut queryable = queryable.unwrap();
    let queryable_id = match request {
        ClientMessage::DeclareQueryable { id, .. } => id,
        other => panic!("expected DeclareQueryable, got {other:?}"),
    };

    broker
        .send(
            &BrokerMessage::InQuery {
                queryable_id,
                query_id: 9,
                key_expr: "demo/q".to_string(),
                parameters: String::new(),
                payload: None,
                encoding: None,
                attachment: None,
            },
            None,
        )
        .await;

    let query = queryable.recv().await.unwrap();
    drop(query);

    let (seq, msg) = broker.recv().await;
    assert!(seq.is_none());
    assert!(matches!(msg, ClientMessage::ResponseFinal { id: 9 }));
}

#[tokio::test]
async fn test_get_lifecycle() {
    let (session, mut broker) = open_session(test_config(), Uuid::new_v4()).await;

    let key_expr = KeyExpr::new("demo/get/**").unwrap();
    let mut replies = session
        .get(&key_expr, "detail=full", Handler::default(), Default::default())
        .await
        .unwrap();

    let (seq, msg) = broker.recv().await;
    assert!(seq.is_none(), "Get is fire-and-forget");
    let get_id = match msg {
        ClientMessage::Get {
            get_id,
            key_expr,
            parameters,
            ..
        } => {
            assert_eq!(key_expr, "demo/get/**");
            assert_eq!(parameters, "detail=full");
            get_id
        }
        other => panic!("expected Get, got {other:?}"),
    };

    broker
        .send(
            &BrokerMessage::InReply {
                get_id,
                reply: reply_sample("demo/get/a", b"r1"),
            },
            None,
        )
        .await;
    broker
        .send(
            &BrokerMessage::InReply {
                get_id,
                reply: Reply::Error(ReplyError {
                    payload: Bytes::from_static(b"r2"),
                    encoding: None,
                }),
            },
            None,
        )
        .await;
    broker
        .send(&BrokerMessage::ResponseFinal { id: get_id }, None)
        .await;

    match replies.recv().await.unwrap() {
        Reply::Sample(sample) => assert_eq!(sample.payload, Bytes::from_static(b"r1")),
        other => panic!("expected a sample, got {other:?}"),
    }
    match replies.recv().await.unwrap() {
        Reply::Error(err) => assert_eq!(err.payload, Bytes::from_static(b"r2")),
        other => panic!("expected an error reply, got {other:?}"),
    }
    // the final marker closed the stream exactly once
    assert_eq!(replies.recv().await, None);

    // a stray reply for the finished get is dropped
    broker
        .send(
            &BrokerMessage::InReply {
                get_id,
                reply: reply_sample("demo/get/late", b"stray"),
            },
            None,
        )
        .await;
    assert_eq!(replies.recv().await, None);
}

#[tokio::test]
async fn test_concurrent_gets_use_distinct_ids() {
    let (session, mut broker) = open_session(test_config(), Uuid::new_v4()).await;

    let key_expr = KeyExpr::new("demo/get").unwrap();
    let mut replies_a = session
        .get(&key_expr, "a", Handler::default(), Default::default())
        .await
        .unwrap();
    let mut replies_b = session
        .get(&key_expr, "b", Handler::default(), Default::default())
        .await
        .unwrap();

    let (_, msg_a) = broker.recv().await;
    let (_, msg_b) = broker.recv().await;
    let id_of = |msg: &ClientMessage| match msg {
        ClientMessage::Get { get_id, .. } => *get_id,
        other => panic!("expected Get, got {other:?}"),
    };
    let (id_a, id_b) = (id_of(&msg_a), id_of(&msg_b));
    assert_ne!(id_a, id_b);

    // answer b, then a; each stream only sees its own replies
    broker
        .send(
            &BrokerMessage::InReply {
                get_id: id_b,
                reply: reply_sample("demo/get", b"for-b"),
            },
            None,
        )
        .await;
    broker.send(&BrokerMessage::ResponseFinal { id: id_b }, None).await;
    broker
        .send(
            &BrokerMessage::InReply {
                get_id: id_a,
                reply: reply_sample("demo/get", b"for-a"),
            },
            None,
        )
        .await;
    broker.send(&BrokerMessage::ResponseFinal { id: id_a }, None).await;

    match replies_b.recv().await.unwrap() {
        Reply::Sample(sample) => assert_eq!(sample.payload, Bytes::from_static(b"for-b")),
        other => panic!("unexpected reply {other:?}"),
    }
    assert_eq!(replies_b.recv().await, None);
    match replies_a.recv().await.unwrap() {
        Reply::Sample(sample) => assert_eq!(sample.payload, Bytes::from_static(b"for-a")),
        other => panic!("unexpected reply {other:?}"),
    }
    assert_eq!(replies_a.recv().await, None);
}

#[tokio::test]
async fn test_querier_get_references_declared_querier() {
    let (session, mut broker) = open_session(test_config(), Uuid::new_v4()).await;

    let key_expr = KeyExpr::new("demo/querier").unwrap();
    let (querier, request) = tokio::join!(
        session.declare_querier(&key_expr, Default::default()),
        broker.ack_next(),
    );
    let querier = querier.unwrap();
    assert!(matches!(request, ClientMessage::DeclareQuerier { .. }));

    let mut replies = querier
        .get("sel=1", Handler::default(), Default::default())
        .await
        .unwrap();

    let (seq, msg) = broker.recv().await;
    assert!(seq.is_none());
    let get_id = match msg {
        ClientMessage::QuerierGet {
            get_id,
            querier_id,
            parameters,
            ..
        } => {
            assert_eq!(querier_id, querier.id());
            assert_eq!(parameters, "sel=1");
            get_id
        }
        other => panic!("expected QuerierGet, got {other:?}"),
    };

    broker
        .send(
            &BrokerMessage::InReply {
                get_id,
                reply: reply_sample("demo/querier", b"hit"),
            },
            None,
        )
        .await;
    broker.send(&BrokerMessage::ResponseFinal { id: get_id }, None).await;

    assert!(replies.recv().await.is_some());
    assert_eq!(replies.recv().await, None);
}

#[tokio::test]
async fn test_liveliness_token_lifecycle() {
    let (session, mut broker) = open_session(test_config(), Uuid::new_v4()).await;

    let key_expr = KeyExpr::new("group/member/1").unwrap();
    let liveliness = session.liveliness();
    let (token, request) = tokio::join!(
        liveliness.declare_token(&key_expr),
        broker.ack_next(),
    );
    let mut token = token.unwrap();
    assert!(matches!(request, ClientMessage::DeclareLivelinessToken { .. }));
    let token_id = token.id();

    let broker_side = async {
        let (seq, msg) = broker.recv().await;
        assert!(matches!(
            msg,
            ClientMessage::UndeclareLivelinessToken { id } if id == token_id
        ));
        broker.send(&BrokerMessage::ResponseOk, seq).await;
    };
    let (result, ()) = tokio::join!(token.undeclare(), broker_side);
    result.unwrap();
}

#[tokio::test]
async fn test_liveliness_subscriber_observes_presence_changes() {
    let (session, mut broker) = open_session(test_config(), Uuid::new_v4()).await;

    let key_expr = KeyExpr::new("group/**").unwrap();
    let liveliness = session.liveliness();
    let (subscriber, request) = tokio::join!(
        liveliness.declare_subscriber(&key_expr, true, Handler::default()),
        broker.ack_next(),
    );
    let mut subscriber = subscriber.unwrap();
    let id = match request {
        ClientMessage::DeclareLivelinessSubscriber { id, history, .. } => {
            assert!(history);
            id
        }
        other => panic!("expected DeclareLivelinessSubscriber, got {other:?}"),
    };

    for kind in [SampleKind::Put, SampleKind::Delete] {
        broker
            .send(
                &BrokerMessage::InSample {
                    subscriber_id: id,
                    sample: Sample {
                        key_expr: "group/member/1".to_string(),
                        payload: Bytes::new(),
                        kind,
                        encoding: None,
                        attachment: None,
                        timestamp: None,
                        qos: Qos::default(),
                    },
                },
                None,
            )
            .await;
    }

    assert_eq!(subscriber.recv().await.unwrap().kind, SampleKind::Put);
    assert_eq!(subscriber.recv().await.unwrap().kind, SampleKind::Delete);

    // liveliness subscribers undeclare with their own message kind
    let broker_side = async {
        let (seq, msg) = broker.recv().await;
        assert!(matches!(
            msg,
            ClientMessage::UndeclareLivelinessSubscriber { id: undeclared } if undeclared == id
        ));
        broker.send(&BrokerMessage::ResponseOk, seq).await;
    };
    let (result, ()) = tokio::join!(subscriber.undeclare(), broker_side);
    result.unwrap();
}

#[tokio::test]
async fn test_liveliness_get_lists_live_tokens() {
    let (session, mut broker) = open_session(test_config(), Uuid::new_v4()).await;

    let key_expr = KeyExpr::new("group/**").unwrap();
    let mut replies = session
        .liveliness()
        .get(&key_expr, Handler::default(), None)
        .await
        .unwrap();

    let (seq, msg) = broker.recv().await;
    assert!(seq.is_none());
    let get_id = match msg {
        ClientMessage::LivelinessGet {
            get_id, key_expr, ..
        } => {
            assert_eq!(key_expr, "group/**");
            get_id
        }
        other => panic!("expected LivelinessGet, got {other:?}"),
    };

    broker
        .send(
            &BrokerMessage::InReply {
                get_id,
                reply: reply_sample("group/member/1", b""),
            },
            None,
        )
        .await;
    broker.send(&BrokerMessage::ResponseFinal { id: get_id }, None).await;

    assert!(replies.recv().await.is_some());
    assert_eq!(replies.recv().await, None);
}
