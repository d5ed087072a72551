#![allow(dead_code)]

use solofile::mime::MimeTable;
use solofile::servable::ServableFile;
use solofile::server::Dispatcher;
use solofile::server::listener::bind_candidates;
use solofile::server::reaper::ReaperStats;
use solofile::transfer::{PREAMBLE, TransferSettings};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    pub stats: Arc<ReaperStats>,
    pub task: JoinHandle<solofile::error::Result<()>>,
    pub contents: Vec<u8>,
    _dir: TempDir,
}

pub async fn start(contents: Vec<u8>) -> TestServer {
    start_with(contents, TransferSettings::default(), 1024).await
}

pub async fn start_with(contents: Vec<u8>, settings: TransferSettings, max_workers: usize) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.html");
    std::fs::write(&path, &contents).unwrap();

    let table: MimeTable = ["html", "txt", "jpg"].into_iter().collect();
    let file = ServableFile::validate(&path, &table).unwrap();

    let listener = bind_candidates("test", &["127.0.0.1:0".parse().unwrap()], 128).unwrap();
    let dispatcher = Dispatcher::new(listener, file, settings, max_workers);
    let addr = dispatcher.local_addr().unwrap();
    let stats = dispatcher.stats();
    let task = tokio::spawn(dispatcher.run());

    TestServer {
        addr,
        stats,
        task,
        contents,
        _dir: dir,
    }
}

/// Reads the preamble and `body_len` bytes, acknowledges, and waits for
/// the server to close. Returns the body.
pub async fn fetch(addr: SocketAddr, body_len: usize) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let body = read_response(&mut stream, body_len).await;

    stream.write_all(b"ACK").await.unwrap();
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty(), "server sent {} bytes past the file", rest.len());

    body
}

pub async fn read_response(stream: &mut TcpStream, body_len: usize) -> Vec<u8> {
    let mut preamble = vec![0u8; PREAMBLE.len()];
    stream.read_exact(&mut preamble).await.unwrap();
    assert_eq!(preamble, PREAMBLE);

    let mut body = vec![0u8; body_len];
    stream.read_exact(&mut body).await.unwrap();
    body
}

pub async fn wait_until_idle(stats: &ReaperStats) {
    for _ in 0..500 {
        if stats.live() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} workers never reclaimed", stats.live());
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
