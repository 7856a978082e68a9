//! Full stack over a real socket: server, middleware, router, cache and store.

use std::net::SocketAddr;
use std::sync::Arc;

use movie_cache::api::{AppState, MovieCache, RouteOptions, build_router};
use movie_cache::cache::CacheConfig;
use movie_cache::database::seed::{DataLoader, LoadEvent};
use movie_cache::database::{InMemoryTable, MovieRepository};
use movie_cache::middleware::{LoggerMiddleware, from_middleware};
use movie_cache::security::CorsMiddleware;
use movie_cache::{Request, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

async fn start() -> (SocketAddr, Arc<InMemoryTable>, oneshot::Sender<()>) {
    let table = Arc::new(InMemoryTable::new());
    DataLoader::new(table.clone())
        .handle(LoadEvent::Create)
        .await
        .unwrap();

    let state = Arc::new(AppState::new(
        MovieCache::new(CacheConfig::default()),
        MovieRepository::new(table.clone()),
        RouteOptions::default(),
    ));
    let mut router = build_router(state);
    router.layer(from_middleware(Arc::new(LoggerMiddleware)));
    router.layer(from_middleware(Arc::new(CorsMiddleware::new().allow_origin("*"))));
    let router = Arc::new(router);

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let (stop, stopped) = oneshot::channel();
    tokio::spawn(server.run_until(
        move |req: Request| {
            let router = Arc::clone(&router);
            async move { router.route(req).await }
        },
        async {
            let _ = stopped.await;
        },
    ));
    (addr, table, stop)
}

/// Sends one request with `Connection: close` and returns the raw reply.
async fn send(addr: SocketAddr, path: &str, extra: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n{extra}Connection: close\r\n\r\n");
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    String::from_utf8(reply).unwrap()
}

fn header<'a>(reply: &'a str, name: &str) -> Option<&'a str> {
    let head = reply.split("\r\n\r\n").next()?;
    head.lines().skip(1).find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

fn body(reply: &str) -> serde_json::Value {
    let (_, body) = reply.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn cached_route_over_tcp() {
    let (addr, table, stop) = start().await;

    let first = send(addr, "/cached/movie/3", "").await;
    assert!(first.starts_with("HTTP/1.1 200 OK\r\n"), "{first}");
    assert_eq!(header(&first, "x-cache"), Some("MISS"));
    assert_eq!(header(&first, "content-type"), Some("application/json"));
    assert_eq!(body(&first)["movie"]["title"], "Thor: The Dark World");

    let second = send(addr, "/cached/movie/3", "").await;
    assert_eq!(header(&second, "x-cache"), Some("HIT"));
    assert_eq!(body(&second)["ts"], body(&first)["ts"]);
    assert_eq!(table.reads(), 1);

    stop.send(()).unwrap();
}

#[tokio::test]
async fn browser_requests_get_cors_headers() {
    let (addr, _table, stop) = start().await;

    let reply = send(addr, "/uncached/movie?id=6", "Origin: https://dash.example\r\n").await;
    assert_eq!(header(&reply, "access-control-allow-origin"), Some("*"));
    assert!(
        header(&reply, "access-control-allow-headers").is_some_and(|h| h.contains("cache-control"))
    );
    assert_eq!(body(&reply)["movie"]["title"], "World War Z");

    stop.send(()).unwrap();
}
