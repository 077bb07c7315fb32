//! Transport tests against a local mock APRS-IS server.

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use cwop::cwop_client::{CLIENT_ID, CwopClient, CwopClientConfigBuilder, SendError};

const PACKET: &str = "N0CALL>APRS,TCPIP*:@021530z4903.50N/07201.75W_200/005g010t077Test";

fn client_for(port: u16, timeout: Duration) -> CwopClient {
    CwopClient::new(
        CwopClientConfigBuilder::new()
            .server("127.0.0.1")
            .port(port)
            .username("N0CALL")
            .timeout(timeout)
            .build(),
    )
}

#[tokio::test]
async fn sends_the_packet_only_after_the_login_ack() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // The login line must arrive before we acknowledge anything.
        let login = lines.next_line().await.unwrap().unwrap();
        write_half
            .write_all(b"# logresp N0CALL unverified, server CWOP-7\r\n")
            .await
            .unwrap();

        let packet = lines.next_line().await.unwrap().unwrap();
        let eof = lines.next_line().await.unwrap();
        (login, packet, eof)
    });

    let client = client_for(port, Duration::from_secs(5));
    client.send(PACKET).await.expect("send should succeed");

    let (login, packet, eof) = server.await.unwrap();
    assert_eq!(login, format!("user N0CALL pass -1 vers {CLIENT_ID}"));
    assert_eq!(packet, PACKET);
    // The client hangs up right after the packet.
    assert_eq!(eof, None);
}

#[tokio::test]
async fn fails_without_sending_when_the_first_line_is_not_a_logresp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let _login = lines.next_line().await.unwrap().unwrap();
        write_half
            .write_all(b"# aprsc 2.1.19-g730c5c0 2 Mar 2024 15:30:00 GMT\r\n")
            .await
            .unwrap();

        // The client must hang up without ever sending a packet.
        lines.next_line().await.unwrap()
    });

    let client = client_for(port, Duration::from_secs(5));
    let err = client.send(PACKET).await.expect_err("login must be rejected");
    match err {
        SendError::InvalidLoginResponse(line) => assert!(line.starts_with("# aprsc")),
        other => panic!("expected an invalid login response error, got {other}"),
    }

    assert_eq!(server.await.unwrap(), None);
}

#[tokio::test]
async fn times_out_against_a_silent_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // Say nothing; count the lines received until the client hangs up.
        let mut lines = BufReader::new(stream).lines();
        let mut lines_seen = 0;
        while let Ok(Some(_)) = lines.next_line().await {
            lines_seen += 1;
        }
        lines_seen
    });

    let limit = Duration::from_millis(300);
    let client = client_for(port, limit);

    let started = Instant::now();
    let err = client.send(PACKET).await.expect_err("send must time out");
    let elapsed = started.elapsed();

    assert!(matches!(err, SendError::Timeout(_)), "got {err}");
    assert!(elapsed >= limit);
    assert!(
        elapsed < limit + Duration::from_secs(2),
        "timeout fired too late: {elapsed:?}"
    );

    // Only the login line made it out, and dropping the connection on
    // timeout closed it exactly once (the server's read loop ended).
    assert_eq!(server.await.unwrap(), 1);
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    // Bind a listener to reserve a port, then drop it so nothing is
    // listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client_for(port, Duration::from_secs(5));
    let err = client.send(PACKET).await.expect_err("connect must fail");
    assert!(matches!(err, SendError::Io(_)), "got {err}");
}
