//! Integration tests for the reliable object stream.
//!
//! These run both ends of a session over an in-memory duplex pipe, plus
//! one test over a real TCP socket on localhost.

use std::sync::Arc;

use tessera::prelude::*;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq)]
struct Move {
    player: String,
    row: u8,
    col: u8,
}

streamable! { Move = "demo.Move" { #[intern] player, row, col } }

#[derive(Debug, Clone, PartialEq)]
struct Board {
    cells: Vec<u8>,
    winner: Option<String>,
}

streamable! { Board = "demo.Board" { cells, winner } }

fn registry() -> Arc<Registry> {
    let mut registry = Registry::with_basic_types();
    registry.register::<Move>().unwrap();
    registry.register::<Board>().unwrap();
    Arc::new(registry)
}

fn mv(row: u8, col: u8) -> Move {
    Move {
        player: "alice".into(),
        row,
        col,
    }
}

#[tokio::test]
async fn test_send_and_receive_over_duplex() {
    let registry = registry();
    // A small pipe forces frames to arrive in several chunks.
    let (a, b) = tokio::io::duplex(16);
    let mut client = ObjectStream::new(a, Arc::clone(&registry));
    let mut server = ObjectStream::new(b, registry);

    let writer = tokio::spawn(async move {
        client.send(&mv(0, 0)).await.unwrap();
        client.send(&mv(1, 2)).await.unwrap();
        client
            .send(&Board {
                cells: vec![1, 0, 0, 0, 0, 2, 0, 0, 0],
                winner: None,
            })
            .await
            .unwrap();
        client
    });

    let first = server.recv().await.unwrap().unwrap();
    let second = server.recv().await.unwrap().unwrap();
    let third = server.recv().await.unwrap().unwrap();
    assert_eq!(first.downcast_ref::<Move>(), Some(&mv(0, 0)));
    assert_eq!(second.downcast_ref::<Move>(), Some(&mv(1, 2)));
    assert_eq!(third.downcast_ref::<Board>().unwrap().cells[5], 2);

    let client = writer.await.unwrap();
    // Move was described once; its intern "alice" too.
    assert_eq!(client.encoder().mapping("demo.Move").unwrap().code, 1);
    assert_eq!(client.encoder().intern_mapping("alice").unwrap().code, 1);
}

#[tokio::test]
async fn test_batch_shares_one_frame() {
    let registry = registry();
    let (a, b) = tokio::io::duplex(1024);
    let mut client = ObjectStream::new(a, Arc::clone(&registry));
    let mut server = ObjectStream::new(b, registry);

    let moves = [mv(0, 1), mv(1, 1), mv(2, 1)];
    let batch: Vec<&dyn Object> = moves.iter().map(|m| m as &dyn Object).collect();
    client.send_batch(&batch).await.unwrap();

    for expected in &moves {
        let object = server.recv().await.unwrap().unwrap();
        assert_eq!(object.downcast_ref::<Move>(), Some(expected));
    }
}

#[tokio::test]
async fn test_both_directions_have_independent_sessions() {
    let registry = registry();
    let (a, b) = tokio::io::duplex(1024);
    let mut client = ObjectStream::new(a, Arc::clone(&registry));
    let mut server = ObjectStream::new(b, registry);

    client.send(&mv(0, 0)).await.unwrap();
    server.recv().await.unwrap().unwrap();

    server
        .send(&Board {
            cells: vec![0; 9],
            winner: Some("alice".into()),
        })
        .await
        .unwrap();
    let board = client.recv().await.unwrap().unwrap();
    assert_eq!(
        board.downcast_ref::<Board>().unwrap().winner.as_deref(),
        Some("alice")
    );

    // Each direction numbers its own types from 1.
    assert_eq!(client.encoder().mapping("demo.Move").unwrap().code, 1);
    assert_eq!(server.encoder().mapping("demo.Board").unwrap().code, 1);
}

#[tokio::test]
async fn test_unregistered_type_poisons_stream() {
    #[derive(Debug)]
    struct Secret {
        code: u32,
    }
    streamable! { Secret = "demo.Secret" { code } }

    let (a, _b) = tokio::io::duplex(64);
    let mut client = ObjectStream::new(a, registry());

    let err = client.send(&Secret { code: 7 }).await.unwrap_err();
    assert!(matches!(
        err,
        TesseraError::Protocol(ProtocolError::UnknownType(_))
    ));
    assert!(client.is_poisoned());
    assert!(matches!(
        client.send(&mv(0, 0)).await,
        Err(TesseraError::Poisoned)
    ));
}

#[tokio::test]
async fn test_garbage_frame_poisons_stream() {
    let (mut raw, b) = tokio::io::duplex(64);
    let mut server = ObjectStream::new(b, registry());

    // A frame whose payload is i16::MIN, which no code can be.
    raw.write_all(&[0, 0, 0, 6, 0x80, 0x00]).await.unwrap();

    let err = server.recv().await.unwrap_err();
    assert!(matches!(
        err,
        TesseraError::Protocol(ProtocolError::InvalidCode(i16::MIN))
    ));
    assert!(matches!(server.recv().await, Err(TesseraError::Poisoned)));
}

#[tokio::test]
async fn test_oversized_frame_is_rejected() {
    let config = StreamConfig {
        max_frame_len: 32,
        ..StreamConfig::default()
    };
    let (mut raw, b) = tokio::io::duplex(64);
    let mut server = ObjectStream::with_config(b, registry(), &config);

    raw.write_all(&[0, 0, 1, 0]).await.unwrap();
    let err = server.recv().await.unwrap_err();
    assert!(matches!(err, TesseraError::Buffer(_)));
}

#[tokio::test]
async fn test_tcp_round_trip() {
    let registry = registry();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_registry = Arc::clone(&registry);
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut stream = ObjectStream::new(socket, server_registry);
        // Echo until the client hangs up.
        while let Some(object) = stream.recv().await.unwrap() {
            stream.send(&*object).await.unwrap();
        }
    });

    let mut client = ObjectStream::connect(addr, registry).await.unwrap();
    for col in 0..3 {
        client.send(&mv(1, col)).await.unwrap();
        let echoed = client.recv().await.unwrap().unwrap();
        assert_eq!(echoed.downcast_ref::<Move>(), Some(&mv(1, col)));
    }

    drop(client);
    server.await.unwrap();
}
