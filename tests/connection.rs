//! Connection-level tests against a scripted RESP peer on a real socket.

use redis_sentinel::{encode_command, Connection, Reply, ReplyHandler};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Reads exactly the bytes the client is expected to have committed.
async fn expect_request(socket: &mut TcpStream, expected: &[u8]) {
    let mut buf = vec![0u8; expected.len()];
    timeout(TEST_TIMEOUT, socket.read_exact(&mut buf))
        .await
        .expect("timed out waiting for request")
        .unwrap();
    assert_eq!(buf, expected);
}

fn reply_channel() -> (ReplyHandler, mpsc::UnboundedReceiver<Reply>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: ReplyHandler = Box::new(move |reply| {
        let _ = tx.send(reply);
    });
    (handler, rx)
}

async fn next_reply(rx: &mut mpsc::UnboundedReceiver<Reply>) -> Reply {
    timeout(TEST_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for reply")
        .expect("reply channel closed")
}

#[tokio::test]
async fn pipelined_commands_reply_in_send_order() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut expected = BytesMut::new();
        encode_command(&["PING"], &mut expected);
        encode_command(&["ECHO", "hi"], &mut expected);
        expect_request(&mut socket, &expected).await;

        socket.write_all(b"+PONG\r\n$2\r\nhi\r\n").await.unwrap();

        // stay open until the client hangs up
        let mut buf = [0u8; 1];
        let _ = socket.read(&mut buf).await;
    });

    let connection = Connection::new();
    let (on_reply, mut replies) = reply_channel();
    connection
        .connect("127.0.0.1", port, None, on_reply, CONNECT_TIMEOUT)
        .await
        .unwrap();

    connection.send(&["PING"]).send(&["ECHO", "hi"]);
    connection.commit().unwrap();

    assert_eq!(
        next_reply(&mut replies).await,
        Reply::SimpleString("PONG".into())
    );
    assert_eq!(
        next_reply(&mut replies).await,
        Reply::BulkString(Bytes::from_static(b"hi"))
    );

    connection.disconnect(true).await;
    assert!(!connection.is_connected());
    server.await.unwrap();
}

#[tokio::test]
async fn replies_survive_arbitrary_fragmentation() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        for chunk in [&b"*3\r\n:1\r\n"[..], &b":2\r\n$5\r\nhel"[..], &b"lo\r\n"[..]] {
            socket.write_all(chunk).await.unwrap();
            socket.flush().await.unwrap();
            sleep(Duration::from_millis(20)).await;
        }

        let mut buf = [0u8; 1];
        let _ = socket.read(&mut buf).await;
    });

    let connection = Connection::new();
    let (on_reply, mut replies) = reply_channel();
    connection
        .connect("127.0.0.1", port, None, on_reply, CONNECT_TIMEOUT)
        .await
        .unwrap();

    assert_eq!(
        next_reply(&mut replies).await,
        Reply::Array(vec![
            Reply::Integer(1),
            Reply::Integer(2),
            Reply::BulkString(Bytes::from_static(b"hello")),
        ])
    );

    connection.disconnect(true).await;
    server.await.unwrap();
}

#[tokio::test]
async fn protocol_desync_tears_the_session_down() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        // declared three bytes, wrong terminator
        socket.write_all(b"$3\r\nabcXY").await.unwrap();

        let mut buf = [0u8; 1];
        let _ = socket.read(&mut buf).await;
    });

    let connection = Connection::new();
    let (on_reply, mut replies) = reply_channel();
    let (lost_tx, mut lost_rx) = mpsc::unbounded_channel();
    connection
        .connect(
            "127.0.0.1",
            port,
            Some(Box::new(move || {
                let _ = lost_tx.send(());
            })),
            on_reply,
            CONNECT_TIMEOUT,
        )
        .await
        .unwrap();

    timeout(TEST_TIMEOUT, lost_rx.recv())
        .await
        .expect("disconnect handler was not invoked")
        .unwrap();

    // nothing ever decoded into a reply
    assert!(replies.try_recv().is_err());

    connection.disconnect(true).await;
    server.await.unwrap();
}

#[tokio::test]
async fn peer_close_invokes_disconnect_handler() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });

    let connection = Connection::new();
    let (on_reply, _replies) = reply_channel();
    let (lost_tx, mut lost_rx) = mpsc::unbounded_channel();
    connection
        .connect(
            "127.0.0.1",
            port,
            Some(Box::new(move || {
                let _ = lost_tx.send(());
            })),
            on_reply,
            CONNECT_TIMEOUT,
        )
        .await
        .unwrap();

    timeout(TEST_TIMEOUT, lost_rx.recv())
        .await
        .expect("disconnect handler was not invoked")
        .unwrap();
    assert!(!connection.is_connected());

    server.await.unwrap();
}

#[tokio::test]
async fn reconnect_after_disconnect_is_clean() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        for _ in 0..2 {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut expected = BytesMut::new();
            encode_command(&["PING"], &mut expected);
            expect_request(&mut socket, &expected).await;

            socket.write_all(b"+PONG\r\n").await.unwrap();

            let mut buf = [0u8; 1];
            let _ = socket.read(&mut buf).await;
        }
    });

    let connection = Connection::new();

    for _ in 0..2 {
        let (on_reply, mut replies) = reply_channel();
        connection
            .connect("127.0.0.1", port, None, on_reply, CONNECT_TIMEOUT)
            .await
            .unwrap();

        connection.send(&["PING"]);
        connection.commit().unwrap();
        assert_eq!(
            next_reply(&mut replies).await,
            Reply::SimpleString("PONG".into())
        );

        connection.disconnect(true).await;
        assert!(!connection.is_connected());
    }

    server.await.unwrap();
}

#[tokio::test]
async fn connecting_twice_is_an_error() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1];
        let _ = socket.read(&mut buf).await;
    });

    let connection = Connection::new();
    let (on_reply, _replies) = reply_channel();
    connection
        .connect("127.0.0.1", port, None, on_reply, CONNECT_TIMEOUT)
        .await
        .unwrap();

    let (on_reply, _more) = reply_channel();
    assert!(connection
        .connect("127.0.0.1", port, None, on_reply, CONNECT_TIMEOUT)
        .await
        .is_err());

    connection.disconnect(true).await;
    server.await.unwrap();
}
