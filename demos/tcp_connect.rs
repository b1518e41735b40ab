use std::time::Duration;

use bytes::BytesMut;
use monoio::{
    io::{AsyncReadRent, AsyncWriteRentExt},
    net::{TcpListener, TcpStream},
};
use monoio_connect::{
    connectors::{ConnectionProvider, ConnectionProviderExt, TcpConnectionProvider},
    http::{consider_connection_state, RequestHead, ResponseHead},
};

const RESP: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";

async fn serve(stream: TcpStream) -> std::io::Result<()> {
    let mut stream = stream;
    let (res, buffer) = stream.read(BytesMut::with_capacity(1024)).await;
    let n = res?;
    println!("server read: {:?}", String::from_utf8_lossy(&buffer[..n]));
    let (res, _) = stream.write_all(RESP).await;
    res?;
    Ok(())
}

#[monoio::main(enable_timer = true)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    monoio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            monoio::spawn(async move {
                let _ = serve(stream).await;
            });
        }
    });

    // "localhost" may resolve to ::1 first; candidates are tried in order.
    let provider = TcpConnectionProvider::new("localhost", port).with_no_delay(true);
    let mut stream = provider
        .get_connection_with_timeout(Duration::from_secs(3))
        .await??;
    println!("connected to {}", stream.peer_addr()?);

    let (res, _) = stream
        .write_all(&b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"[..])
        .await;
    res?;
    let (res, buffer) = stream.read(BytesMut::with_capacity(1024)).await;
    let n = res?;
    println!("client read: {:?}", String::from_utf8_lossy(&buffer[..n]));

    let (parts, ()) = http::Request::get("/").body(())?.into_parts();
    let request = RequestHead::from_parts(&parts)?;
    let mut response = ResponseHead::default();
    let state = consider_connection_state(Some(&request), &mut response);
    println!("connection state after response: {state:?}");

    provider.close();
    Ok(())
}
