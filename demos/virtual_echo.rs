use monoio::io::{AsyncReadRentExt, AsyncWriteRentExt};
use monoio_connect::{
    config::ProviderConfig,
    connectors::ConnectionProvider,
    vnet::{Interface, Socket},
};

const CONFIG: &str = r#"{
    "type": "virtual",
    "interface": "echo",
    "max_available_to_read": 3,
    "max_available_to_write": 5
}"#;

async fn echo(mut socket: Socket) {
    loop {
        let (res, buf) = AsyncReadRentExt::read_exact(&mut socket, vec![0u8; 1]).await;
        if res.is_err() {
            break;
        }
        let (res, _) = AsyncWriteRentExt::write_all(&mut socket, buf).await;
        if res.is_err() {
            break;
        }
    }
}

#[monoio::main]
async fn main() -> Result<(), monoio_connect::Error> {
    tracing_subscriber::fmt::init();

    let interface = Interface::obtain_shared("echo");
    let listener = interface.bind()?;
    monoio::spawn(async move {
        while let Ok(socket) = listener.accept_async().await {
            monoio::spawn(echo(socket));
        }
    });

    let provider = ProviderConfig::from_json(CONFIG)?.build();
    println!("provider: {provider}");
    let mut stream = provider.get_connection_async().await?;

    let message = b"hello over the virtual network".to_vec();
    let len = message.len();
    let (res, _) = stream.write_all(message).await;
    res?;
    let (res, buf) = stream.read_exact(vec![0u8; len]).await;
    res?;
    println!("echoed: {}", String::from_utf8_lossy(&buf));

    provider.close();
    Ok(())
}
