use std::{
    io::{Read, Write},
    thread,
};

use monoio_connect::{
    connectors::{ConnectionProvider, VirtualConnectionProvider},
    vnet::Interface,
    TransportError,
};

#[test]
fn many_clients_one_listener() {
    const CLIENTS: usize = 4;
    const LEN: usize = 200;

    let interface = Interface::new_with_capacity("many-clients", 32);
    let listener = interface.bind().unwrap();
    let provider = VirtualConnectionProvider::new(interface.clone());
    provider.set_max_available_to_read_write(7, 7);

    let server = thread::spawn(move || {
        for _ in 0..CLIENTS {
            let mut socket = listener.accept().unwrap();
            let mut received = vec![0u8; LEN];
            socket.read_exact(&mut received).unwrap();
            socket.write_all(&received).unwrap();
        }
    });

    let payload: Vec<u8> = (0..LEN as u8).collect();
    for _ in 0..CLIENTS {
        let mut client = provider.get_connection().unwrap();
        client.write_all(&payload).unwrap();
        let mut echoed = vec![0u8; LEN];
        client.read_exact(&mut echoed).unwrap();
        assert_eq!(echoed, payload);
    }
    server.join().unwrap();
}

#[test]
fn shared_interface_by_name() {
    let listener = Interface::obtain_shared("integration-shared").bind().unwrap();
    let provider = VirtualConnectionProvider::new(Interface::obtain_shared("integration-shared"));

    let server = thread::spawn(move || {
        let mut socket = listener.accept().unwrap();
        socket.write_all(b"hi").unwrap();
    });
    let mut client = provider.get_connection().unwrap();
    let mut buf = Vec::new();
    client.read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"hi");
    server.join().unwrap();
}

#[test]
fn connect_after_listener_dropped() {
    let interface = Interface::new("dropped-listener");
    drop(interface.bind().unwrap());
    let provider = VirtualConnectionProvider::new(interface);
    assert!(matches!(
        provider.get_connection(),
        Err(TransportError::InterfaceUnbound(_))
    ));
}
