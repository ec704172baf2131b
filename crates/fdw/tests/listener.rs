//! Query listener tests over a real TCP socket

use async_trait::async_trait;
use gravity_common::{GraphAccess, MemoryRankEngine, NodeId};
use gravity_fdw::codec::{decode_reply, encode_request, read_frame, write_frame};
use gravity_fdw::{Acceptor, FdwProcessor, Qual, QueryListener, QueryRequest, Row};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

fn node(raw: &str) -> NodeId {
    NodeId::parse(raw).unwrap()
}

fn access() -> GraphAccess {
    let access = GraphAccess::from(Arc::new(MemoryRankEngine::default()));
    access.add_edge(&node("U1"), &node("U2"), 1.0);
    access.add_edge(&node("U1"), &node("B1"), 2.0);
    access.add_edge(&node("U2"), &node("B1"), 1.0);
    access
}

async fn start(
    access: GraphAccess,
    max_messages: Option<u64>,
) -> (SocketAddr, watch::Sender<bool>, JoinHandle<u64>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = watch::channel(false);

    let server = QueryListener::new(FdwProcessor::new(access), max_messages);
    let handle = tokio::spawn(async move { server.serve(listener, rx).await.unwrap() });
    (addr, tx, handle)
}

fn columns() -> Vec<String> {
    vec!["src".into(), "dest".into(), "weight".into()]
}

async fn query(stream: &mut TcpStream, quals: Vec<Qual>) -> Result<Vec<Row>, String> {
    let body = encode_request(&QueryRequest { quals, columns: columns() }).unwrap();
    write_frame(stream, &body).await.unwrap();

    let reply = read_frame(stream).await.unwrap().expect("reply frame");
    decode_reply(&reply).unwrap()
}

#[tokio::test]
async fn test_dest_query() {
    let access = access();
    let expected = access.score(&node("U1"), &node("B1")).unwrap();
    let (addr, tx, _handle) = start(access, None).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let rows = query(
        &mut stream,
        vec![Qual::new("dest", "=", "B1"), Qual::new("src", "=", "U1")],
    )
    .await
    .unwrap();

    assert_eq!(rows, vec![("U1".to_string(), "B1".to_string(), expected)]);
    tx.send(true).unwrap();
}

#[tokio::test]
async fn test_src_query_lists_ranks() {
    let access = access();
    let expected: Vec<Row> = access
        .ranks(&node("U1"), None)
        .unwrap()
        .into_iter()
        .map(|(n, score)| ("U1".to_string(), n.to_string(), score))
        .collect();
    let (addr, tx, _handle) = start(access, None).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let rows = query(&mut stream, vec![Qual::new("src", "=", "U1")]).await.unwrap();

    assert!(!rows.is_empty());
    assert_eq!(rows, expected);
    tx.send(true).unwrap();
}

#[tokio::test]
async fn test_errors_do_not_stop_the_listener() {
    let (addr, tx, _handle) = start(access(), None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let err = query(
        &mut stream,
        vec![Qual::new("src", "=", "U1"), Qual::new("unknown", "=", "x")],
    )
    .await
    .unwrap_err();
    assert_eq!(err, "Unknown field: unknown");

    let err = query(&mut stream, vec![Qual::new("dest", "=", "B1")]).await.unwrap_err();
    assert_eq!(err, "No source node specified");

    // Same connection keeps answering
    let rows = query(
        &mut stream,
        vec![Qual::new("src", "=", "U1"), Qual::new("dest", "=", "U2")],
    )
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);

    tx.send(true).unwrap();
}

#[tokio::test]
async fn test_stops_after_max_messages() {
    let (addr, _tx, handle) = start(access(), Some(2)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    assert_ok!(query(&mut stream, vec![Qual::new("src", "=", "U1")]).await);
    let _ = query(&mut stream, vec![Qual::new("dest", "=", "U1")]).await;

    let received = handle.await.unwrap();
    assert_eq!(received, 2);
}

#[tokio::test]
async fn test_shutdown_stops_idle_listener() {
    let (_addr, tx, handle) = start(access(), None).await;

    tx.send(true).unwrap();
    assert_eq!(handle.await.unwrap(), 0);
}

#[tokio::test]
async fn test_sequential_connections() {
    let (addr, tx, _handle) = start(access(), None).await;

    for _ in 0..2 {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let rows = query(&mut stream, vec![Qual::new("src", "=", "U2")]).await.unwrap();
        assert!(!rows.is_empty());
        drop(stream);
    }

    tx.send(true).unwrap();
}

#[tokio::test]
async fn test_idle_connection_does_not_block_others() {
    let (addr, tx, _handle) = start(access(), None).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    assert_ok!(query(&mut first, vec![Qual::new("src", "=", "U1")]).await);

    // `first` stays open and idle while a second client is served
    let mut second = TcpStream::connect(addr).await.unwrap();
    let rows = tokio::time::timeout(
        Duration::from_secs(3),
        query(&mut second, vec![Qual::new("src", "=", "U1"), Qual::new("dest", "=", "B1")]),
    )
    .await
    .expect("second client answered while the first stays connected")
    .unwrap();
    assert_eq!(rows.len(), 1);

    // And the first connection is still served afterwards
    assert_ok!(query(&mut first, vec![Qual::new("src", "=", "U2")]).await);

    tx.send(true).unwrap();
}

/// Fails a few accepts before handing out real connections
struct FlakyAcceptor {
    inner: TcpListener,
    failures: usize,
}

#[async_trait]
impl Acceptor for FlakyAcceptor {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "connection aborted"));
        }
        self.inner.accept().await
    }
}

#[tokio::test]
async fn test_accept_errors_do_not_stop_the_listener() {
    let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = inner.local_addr().unwrap();
    let (tx, rx) = watch::channel(false);

    let server = QueryListener::new(FdwProcessor::new(access()), None);
    let handle = tokio::spawn(server.serve(FlakyAcceptor { inner, failures: 3 }, rx));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let rows = query(&mut stream, vec![Qual::new("src", "=", "U1")]).await.unwrap();
    assert!(!rows.is_empty());

    tx.send(true).unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), 1);
}

