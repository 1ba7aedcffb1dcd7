use bytes::BufMut;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::backend::SessionPool;
use crate::catalog::{Catalog, KeyRange, MemoryStore, ShardingRule};
use crate::config::{Shard, ShardRole};
use crate::net::messages::{
    CommandComplete, CopyData, CopyDone, ErrorResponse, FromBytes, Payload, Query, ReadyForQuery,
    Startup,
};
use crate::net::{Parameter, Parameters, Stream};

/// Mock shard speaking enough of the backend protocol to drive
/// the relay: trust startup, simple and extended query cycles,
/// COPY FROM STDIN. Queries tagged `/*T*/` report an open
/// transaction, `/*E*/` an error.
struct MockShard {
    addr: String,
    queries: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl MockShard {
    async fn spawn() -> MockShard {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let queries = Arc::new(Mutex::new(vec![]));
        let connections = Arc::new(AtomicUsize::new(0));

        let accepted_queries = queries.clone();
        let accepted_connections = connections.clone();

        spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                accepted_connections.fetch_add(1, Ordering::Relaxed);
                let queries = accepted_queries.clone();
                spawn(async move {
                    let _ = serve(socket, queries).await;
                });
            }
        });

        MockShard {
            addr,
            queries,
            connections,
        }
    }

    fn config(&self, name: &str) -> Shard {
        let (host, port) = self.addr.split_once(':').unwrap();
        Shard {
            name: name.into(),
            host: host.into(),
            port: port.parse().unwrap(),
            user: "postgres".into(),
            password: String::new(),
            database: "postgres".into(),
            role: ShardRole::Data,
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

async fn serve(
    socket: TcpStream,
    queries: Arc<Mutex<Vec<String>>>,
) -> Result<(), crate::net::Error> {
    let mut stream = Stream::plain(socket);

    match stream.read_startup().await? {
        Startup::Startup { .. } => (),
        _ => return Ok(()),
    }

    stream.send(&crate::net::Authentication::Ok).await?;
    stream
        .send(&crate::net::ParameterStatus::new("server_version", "14.0"))
        .await?;
    stream.send_flush(&ReadyForQuery::idle()).await?;

    let mut in_transaction = false;
    let mut saw_parse = false;
    let mut saw_bind = false;
    let mut saw_execute = false;
    let mut copy_rows = 0usize;

    loop {
        let message = match stream.read().await {
            Ok(message) => message,
            Err(_) => return Ok(()),
        };

        match message.code() {
            'Q' => {
                let query = Query::from_bytes(message.payload())?;
                queries.lock().push(query.query().to_string());

                if query.query().contains("/*T*/") {
                    in_transaction = true;
                }
                if query.query().contains("/*I*/") {
                    in_transaction = false;
                }

                if query.query().to_uppercase().contains("COPY") {
                    // CopyInResponse, text format, no columns.
                    let mut copy_in = Payload::named('G');
                    copy_in.put_u8(0);
                    copy_in.put_i16(0);
                    stream
                        .send_flush(&Message::new(copy_in.freeze()))
                        .await?;
                    continue;
                }

                if query.query().contains("/*E*/") {
                    stream
                        .send(&ErrorResponse::syntax("mock error"))
                        .await?;
                    stream.send_flush(&rfq(in_transaction)).await?;
                    continue;
                }

                let tag = if query.query().to_uppercase().starts_with("SET") {
                    "SET"
                } else {
                    "SELECT 1"
                };
                stream.send(&CommandComplete::new(tag)).await?;
                stream.send_flush(&rfq(in_transaction)).await?;
            }

            'P' => {
                queries.lock().push("<parse>".into());
                saw_parse = true;
            }
            'B' => saw_bind = true,
            'E' => saw_execute = true,
            'D' | 'C' => (),

            'S' => {
                if saw_parse {
                    stream
                        .send(&Message::new(Payload::named('1').freeze()))
                        .await?;
                }
                if saw_bind {
                    stream
                        .send(&Message::new(Payload::named('2').freeze()))
                        .await?;
                }
                if saw_execute {
                    stream.send(&CommandComplete::new("SELECT 1")).await?;
                }
                stream.send_flush(&rfq(in_transaction)).await?;
                saw_parse = false;
                saw_bind = false;
                saw_execute = false;
            }

            'd' => copy_rows += 1,
            'c' => {
                stream
                    .send(&CommandComplete::new(format!("COPY {}", copy_rows)))
                    .await?;
                stream.send_flush(&rfq(in_transaction)).await?;
                copy_rows = 0;
            }
            'f' => {
                stream
                    .send(&ErrorResponse::syntax("copy aborted"))
                    .await?;
                stream.send_flush(&rfq(in_transaction)).await?;
                copy_rows = 0;
            }

            'X' => return Ok(()),
            _ => (),
        }
    }
}

fn rfq(in_transaction: bool) -> ReadyForQuery {
    if in_transaction {
        ReadyForQuery::in_transaction()
    } else {
        ReadyForQuery::idle()
    }
}

/// Relay wired to two mock shards, plus the client's end of the
/// frontend socket.
struct Fixture {
    relay: RelayState,
    pool: Arc<SessionPool>,
    client_end: Stream,
    shard1: MockShard,
    shard2: MockShard,
}

async fn fixture() -> Fixture {
    fixture_with_params(Parameters::default()).await
}

async fn fixture_with_params(params: Parameters) -> Fixture {
    let shard1 = MockShard::spawn().await;
    let shard2 = MockShard::spawn().await;

    let catalog = Arc::new(Catalog::new());
    let store = Arc::new(MemoryStore::new());
    let router = Arc::new(QueryRouter::new(catalog.clone(), store));

    router.add_data_shard("shard1", shard1.config("shard1"));
    router.add_data_shard("shard2", shard2.config("shard2"));
    router
        .add_sharding_rule(ShardingRule::new("user_id"))
        .unwrap();
    router.add_local_table("local_only");
    router
        .add_key_range(KeyRange::new("k1", "00", "50", "shard1"))
        .unwrap();
    router
        .add_key_range(KeyRange::new("k2", "50", "", "shard2"))
        .unwrap();

    let pool = Arc::new(SessionPool::new(catalog));

    let (proxy_end, client_end) = socket_pair().await;
    let client = Client::new(proxy_end, params);
    let relay = RelayState::new(client, router, pool.clone(), false);

    Fixture {
        relay,
        pool,
        client_end,
        shard1,
        shard2,
    }
}

async fn socket_pair() -> (Stream, Stream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (accepted, connected) = tokio::join!(listener.accept(), TcpStream::connect(addr));
    (
        Stream::plain(accepted.unwrap().0),
        Stream::plain(connected.unwrap()),
    )
}

/// Codes of the frames the client receives for one relay cycle,
/// up to and including ReadyForQuery.
async fn client_frames(client_end: &mut Stream) -> Vec<char> {
    let mut codes = vec![];
    loop {
        let message = client_end.read().await.unwrap();
        codes.push(message.code());
        if message.code() == 'Z' {
            break;
        }
    }
    codes
}

fn query(sql: &str) -> Message {
    Query::new(sql).message().unwrap()
}

#[tokio::test]
async fn test_simple_query_cycle() {
    let mut fixture = fixture().await;

    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10"));

    let ok = fixture.relay.process_message_buf(true, true).await.unwrap();
    assert!(ok);

    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames, vec!['C', 'Z']);

    assert_eq!(fixture.relay.tx_status(), TxStatus::Idle);
    assert_eq!(fixture.pool.tx_counts(), (1, 1));

    assert_eq!(fixture.shard1.queries().len(), 1);
    assert!(fixture.shard2.queries().is_empty());
}

#[tokio::test]
async fn test_one_rfq_per_cycle_status_byte() {
    let mut fixture = fixture().await;

    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10 /*T*/")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10 /*T*/"));
    fixture.relay.process_message_buf(true, true).await.unwrap();

    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames.iter().filter(|code| **code == 'Z').count(), 1);

    // The status byte matches the relay's transaction status.
    assert_eq!(fixture.relay.tx_status(), TxStatus::InTransaction);
}

#[tokio::test]
async fn test_silent_messages_invisible() {
    let mut fixture = fixture().await;

    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10")
        .unwrap();
    fixture
        .relay
        .add_silent_query(query("SET application_name = 'relay'"));
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10"));

    fixture.relay.process_message_buf(true, true).await.unwrap();

    // The client sees only the visible statement's frames.
    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames, vec!['C', 'Z']);

    // The silent statement reached the shard first.
    let queries = fixture.shard1.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].starts_with("SET"));
}

#[tokio::test]
async fn test_startup_params_replayed() {
    let params = Parameters::new(vec![
        Parameter::new("user", "app"),
        Parameter::new("application_name", "test"),
    ]);
    let mut fixture = fixture_with_params(params).await;

    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10"));
    fixture.relay.process_message_buf(true, true).await.unwrap();

    let queries = fixture.shard1.queries();
    assert_eq!(queries.len(), 2);
    // Identity parameters are not replayed.
    assert_eq!(queries[0], "SET application_name = 'test';");

    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames, vec!['C', 'Z']);
}

#[tokio::test]
async fn test_local_table_skips_with_notice() {
    let mut fixture = fixture().await;

    fixture
        .relay
        .parse("SELECT * FROM local_only WHERE user_id = 10")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM local_only WHERE user_id = 10"));

    let err = fixture
        .relay
        .process_message_buf(true, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SkipQuery));

    let message = fixture.client_end.read().await.unwrap();
    assert_eq!(message.code(), 'E');
    let error = ErrorResponse::from_bytes(message.payload()).unwrap();
    assert_eq!(error.message, "wait for a next query");

    // Session stays open and idle.
    let message = fixture.client_end.read().await.unwrap();
    assert_eq!(message.code(), 'Z');
    let rfq = ReadyForQuery::from_bytes(message.payload()).unwrap();
    assert_eq!(rfq.status(), 'I');

    // No server connection was opened.
    assert_eq!(fixture.shard1.connections(), 0);
    assert_eq!(fixture.shard2.connections(), 0);

    // And the session still works.
    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10"));
    fixture.relay.process_message_buf(true, true).await.unwrap();
    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames, vec!['C', 'Z']);
}

#[tokio::test]
async fn test_parse_error_skips() {
    let mut fixture = fixture().await;

    assert!(fixture.relay.parse("SELECT FROM WHERE !!").is_err());
    fixture.relay.add_query(query("SELECT FROM WHERE !!"));

    let err = fixture
        .relay
        .process_message_buf(true, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SkipQuery));

    let message = fixture.client_end.read().await.unwrap();
    let error = ErrorResponse::from_bytes(message.payload()).unwrap();
    assert_eq!(error.message, "skip executing this query, wait for next");
}

#[tokio::test]
async fn test_ddl_fans_out_to_all_shards() {
    let mut fixture = fixture().await;

    fixture.relay.parse("CREATE TABLE t (user_id BIGINT)").unwrap();
    fixture
        .relay
        .add_query(query("CREATE TABLE t (user_id BIGINT)"));
    fixture.relay.process_message_buf(true, true).await.unwrap();

    // Per-shard results are concatenated; one ReadyForQuery.
    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames, vec!['C', 'C', 'Z']);

    assert_eq!(fixture.shard1.queries().len(), 1);
    assert_eq!(fixture.shard2.queries().len(), 1);
}

#[tokio::test]
async fn test_ddl_forbidden_inside_transaction() {
    let mut fixture = fixture().await;

    fixture.relay.tx_status = TxStatus::InTransaction;

    fixture.relay.parse("CREATE TABLE t (user_id BIGINT)").unwrap();
    fixture
        .relay
        .add_query(query("CREATE TABLE t (user_id BIGINT)"));

    let err = fixture
        .relay
        .process_message_buf(true, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DdlInTransaction));

    // The message buffer was discarded.
    assert!(fixture.relay.msg_buf.is_empty());
}

#[tokio::test]
async fn test_no_data_shards_matches_nothing() {
    let catalog = Arc::new(Catalog::new());
    let store = Arc::new(MemoryStore::new());
    let router = Arc::new(QueryRouter::new(catalog.clone(), store));
    let pool = Arc::new(SessionPool::new(catalog));

    let (proxy_end, mut client_end) = socket_pair().await;
    let client = Client::new(proxy_end, Parameters::default());
    let mut relay = RelayState::new(client, router, pool, false);

    relay.parse("CREATE TABLE t (user_id BIGINT)").unwrap();
    relay.add_query(query("CREATE TABLE t (user_id BIGINT)"));

    let err = relay.process_message_buf(true, true).await.unwrap_err();
    assert!(matches!(err, Error::SkipQuery));

    let message = client_end.read().await.unwrap();
    let error = ErrorResponse::from_bytes(message.payload()).unwrap();
    assert_eq!(error.message, "failed to match any datashard");
}

#[tokio::test]
async fn test_transaction_hooks_balance() {
    let mut fixture = fixture().await;

    // Statement opens a transaction: begin fires, end does not.
    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10 /*T*/")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10 /*T*/"));
    fixture.relay.process_message_buf(true, true).await.unwrap();
    client_frames(&mut fixture.client_end).await;

    assert_eq!(fixture.pool.tx_counts(), (1, 0));
    assert!(fixture.relay.tx_active());

    // In-transaction statement relays to the bound shard without
    // rerouting and closes the transaction.
    fixture.relay.parse("SELECT 1 /*I*/").unwrap();
    fixture.relay.add_query(query("SELECT 1 /*I*/"));
    fixture.relay.process_message_buf(true, true).await.unwrap();
    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames, vec!['C', 'Z']);

    assert_eq!(fixture.pool.tx_counts(), (1, 1));
    assert_eq!(fixture.relay.tx_status(), TxStatus::Idle);

    // Both statements went to the same connection.
    assert_eq!(fixture.shard1.connections(), 1);
    assert_eq!(fixture.shard1.queries().len(), 2);
}

#[tokio::test]
async fn test_server_error_frame_forwarded() {
    let mut fixture = fixture().await;

    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10 /*E*/")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10 /*E*/"));

    let ok = fixture.relay.process_message_buf(true, true).await.unwrap();
    assert!(!ok);

    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames, vec!['E', 'Z']);
}

#[tokio::test]
async fn test_extended_protocol_cycle() {
    let mut fixture = fixture().await;

    // Sync with no server bound short-circuits, so bind one with
    // a simple query first.
    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 80")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 80"));
    fixture.relay.process_message_buf(true, true).await.unwrap();
    client_frames(&mut fixture.client_end).await;

    fixture.relay.add_query(
        crate::net::Parse::new_anonymous("SELECT * FROM t WHERE user_id = 80")
            .message()
            .unwrap(),
    );
    fixture
        .relay
        .add_query(crate::net::Bind::new_statement("").message().unwrap());
    fixture
        .relay
        .add_query(crate::net::Execute::new().message().unwrap());

    fixture.relay.sync(true, true).await.unwrap();

    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames, vec!['1', '2', 'C', 'Z']);

    // Both cycles routed by the statement's key to shard2; the
    // second routing boundary rebinds a fresh connection.
    assert_eq!(fixture.shard2.connections(), 2);
    assert_eq!(fixture.shard1.connections(), 0);
}

#[tokio::test]
async fn test_sync_without_connection() {
    let mut fixture = fixture().await;

    fixture.relay.sync(true, true).await.unwrap();

    let message = fixture.client_end.read().await.unwrap();
    assert_eq!(message.code(), 'Z');
    let rfq = ReadyForQuery::from_bytes(message.payload()).unwrap();
    assert_eq!(rfq.status(), 'I');
}

#[tokio::test]
async fn test_prepare_statement_once() {
    let mut fixture = fixture().await;

    // Bind a shard first.
    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10"));
    fixture.relay.process_message_buf(true, true).await.unwrap();
    client_frames(&mut fixture.client_end).await;

    let desc = StatementDesc {
        name: "stmt_1".into(),
        query: "SELECT * FROM t WHERE user_id = $1".into(),
    };

    fixture.relay.prepare_statement(42, &desc).await.unwrap();
    let after_first = fixture.shard1.queries().len();

    // Second prepare is a no-op.
    fixture.relay.prepare_statement(42, &desc).await.unwrap();
    assert_eq!(fixture.shard1.queries().len(), after_first);

    // No client-visible frames were produced.
    assert_eq!(fixture.relay.tx_status(), TxStatus::Idle);
}

#[tokio::test]
async fn test_copy_passthrough() {
    let mut fixture = fixture().await;

    // Enter a transaction so COPY relays to the bound shard
    // without a routing boundary.
    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10 /*T*/")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10 /*T*/"));
    fixture.relay.process_message_buf(true, true).await.unwrap();
    client_frames(&mut fixture.client_end).await;

    // COPY switches the connection into copy mode.
    fixture
        .relay
        .process_message(&query("COPY t FROM STDIN"), true, true)
        .await
        .unwrap();
    assert!(fixture.relay.copy_active());

    let message = fixture.client_end.read().await.unwrap();
    assert_eq!(message.code(), 'G');

    // Data flows without response cycles.
    fixture
        .relay
        .process_message(&CopyData::new(&b"1\n"[..]).message().unwrap(), false, true)
        .await
        .unwrap();
    fixture
        .relay
        .process_message(&CopyData::new(&b"2\n"[..]).message().unwrap(), false, true)
        .await
        .unwrap();
    assert!(fixture.relay.copy_active());

    // Done completes the cycle and clears copy mode.
    fixture
        .relay
        .process_message(&CopyDone.message().unwrap(), true, true)
        .await
        .unwrap();
    assert!(!fixture.relay.copy_active());

    let frames = client_frames(&mut fixture.client_end).await;
    assert_eq!(frames, vec!['C', 'Z']);
}

#[tokio::test]
async fn test_reset_twice_is_idempotent() {
    let mut fixture = fixture().await;

    fixture
        .relay
        .parse("SELECT * FROM t WHERE user_id = 10 /*T*/")
        .unwrap();
    fixture
        .relay
        .add_query(query("SELECT * FROM t WHERE user_id = 10 /*T*/"));
    fixture.relay.process_message_buf(true, true).await.unwrap();
    client_frames(&mut fixture.client_end).await;

    fixture.relay.reset().await.unwrap();
    assert_eq!(fixture.relay.tx_status(), TxStatus::Idle);
    assert!(fixture.relay.active_shards().is_empty());
    assert!(!fixture.relay.client_mut().has_server());

    fixture.relay.reset().await.unwrap();
    assert_eq!(fixture.relay.tx_status(), TxStatus::Idle);
    assert!(fixture.relay.active_shards().is_empty());
}

#[tokio::test]
async fn test_world_fallback_disabled() {
    let mut fixture = fixture().await;

    let err = fixture
        .relay
        .dispatch(RoutingDecision::World)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Router(super::super::router::Error::NoDataShard)
    ));
}

#[tokio::test]
async fn test_world_fallback_binds_world_shard() {
    let world = MockShard::spawn().await;

    let catalog = Arc::new(Catalog::new());
    let store = Arc::new(MemoryStore::new());
    let router = Arc::new(QueryRouter::new(catalog.clone(), store));

    let mut config = world.config("world");
    config.role = ShardRole::World;
    router.add_world_shard("world", config);

    let pool = Arc::new(SessionPool::new(catalog));
    let (proxy_end, mut client_end) = socket_pair().await;
    let client = Client::new(proxy_end, Parameters::default());
    let mut relay = RelayState::new(client, router, pool, true);

    relay.dispatch(RoutingDecision::World).await.unwrap();
    assert_eq!(world.connections(), 1);
    assert_eq!(relay.active_shards().len(), 1);
    assert_eq!(relay.active_shards()[0].name, "world");

    // The binding works end to end.
    relay
        .relay_step(&query("SELECT 1"), true, true)
        .await
        .unwrap();
    relay.complete_relay(true).await.unwrap();
    let frames = client_frames(&mut client_end).await;
    assert_eq!(frames, vec!['C', 'Z']);
}
