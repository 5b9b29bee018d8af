use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod support;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use nfs_mamont_client::protocol::rpc::{
    read_record, write_fragment, TransactionTracker, MAX_GIDS, MAX_MACHINE_NAME_LEN,
    MAX_RPC_RECORD_LENGTH,
};
use nfs_mamont_client::xdr::nfs3::file::stable_how;
use nfs_mamont_client::xdr::rpc::{accept_body, auth_stat, rpc_body, rpc_msg};
use nfs_mamont_client::xdr::{self, nfs3};
use nfs_mamont_client::{Auth, Error, ErrorKind, RpcClient, RpcError};

use support::{
    FakeServer, ServerOptions, PROC_BAD_ENUM, PROC_DENY, PROC_ECHO, PROC_SILENT, PROC_SLOW,
    PROC_TRUNCATED, SLOW_DELAY, TEST_PROG, TEST_VERS,
};

async fn connect(server: &FakeServer) -> RpcClient {
    RpcClient::dial("127.0.0.1", server.port(), false, Duration::from_secs(2))
        .await
        .expect("dial fake server")
}

#[tokio::test]
async fn record_marking_reassembles_fragments() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    let first = b"abcd";
    let last = b"efgh";
    server.write_all(&(first.len() as u32).to_be_bytes()).await.unwrap();
    server.write_all(first).await.unwrap();
    server.write_all(&((1_u32 << 31) | last.len() as u32).to_be_bytes()).await.unwrap();
    server.write_all(last).await.unwrap();

    let record = read_record(&mut client).await.expect("read record");
    assert_eq!(record, b"abcdefgh");
}

#[tokio::test]
async fn record_marking_round_trip_through_duplex() {
    let (mut client, mut server) = tokio::io::duplex(64 * 1024);
    let payload: Vec<u8> = (0..10_000_u32).map(|i| i as u8).collect();
    write_fragment(&mut server, &payload).await.expect("write record");
    let record = read_record(&mut client).await.expect("read record");
    assert_eq!(record, payload);
}

#[tokio::test]
async fn rejects_oversized_record() {
    let (mut client, mut server) = tokio::io::duplex(64);
    let oversized = MAX_RPC_RECORD_LENGTH + 1;
    let fragment_header = (1_u32 << 31) | (oversized as u32);
    server.write_all(&fragment_header.to_be_bytes()).await.expect("write fragment header");

    let err = read_record(&mut client).await.expect_err("expected oversize error");
    assert!(matches!(err, Error::MalformedReply(_)), "unexpected error: {err:?}");
    assert!(err.to_string().contains("exceeds max"), "unexpected error: {err:?}");
}

#[tokio::test]
async fn null_call_succeeds() {
    let server = FakeServer::start().await;
    let client = connect(&server).await;
    client.null(TEST_PROG, TEST_VERS).await.expect("NULL");
    client.null(nfs3::PROGRAM, nfs3::VERSION).await.expect("NFS NULL");
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test]
async fn concurrent_calls_use_distinct_xids() {
    let server = FakeServer::start().await;
    let client = Arc::new(connect(&server).await);

    let mut tasks = Vec::new();
    for i in 0..32_u32 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let echoed: u32 =
                client.call(TEST_PROG, TEST_VERS, PROC_ECHO, &Auth::none(), &i).await?;
            Ok::<_, Error>((i, echoed))
        }));
    }
    for task in tasks {
        let (sent, echoed) = task.await.expect("join").expect("echo call");
        assert_eq!(sent, echoed);
    }

    let xids = server.stats().xids;
    let unique: HashSet<u32> = xids.iter().copied().collect();
    assert_eq!(xids.len(), 32);
    assert_eq!(unique.len(), xids.len());
}

#[tokio::test]
async fn fast_reply_overtakes_slow_one() {
    let server = FakeServer::start().await;
    let client = Arc::new(connect(&server).await);

    let slow = {
        let client = client.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            client.call::<_, ()>(TEST_PROG, TEST_VERS, PROC_SLOW, &Auth::none(), &()).await?;
            Ok::<_, Error>(start.elapsed())
        })
    };
    // Let the slow call go out first.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let start = Instant::now();
    let echoed: u32 =
        client.call(TEST_PROG, TEST_VERS, PROC_ECHO, &Auth::none(), &7_u32).await.unwrap();
    let fast_elapsed = start.elapsed();
    assert_eq!(echoed, 7);
    assert!(fast_elapsed < SLOW_DELAY, "fast call waited for the slow one: {fast_elapsed:?}");

    let slow_elapsed = slow.await.unwrap().expect("slow call");
    assert!(slow_elapsed >= SLOW_DELAY - Duration::from_millis(50));
}

#[tokio::test]
async fn timeout_leaves_connection_usable() {
    let server = FakeServer::start().await;
    let client = connect(&server).await;

    let err = client
        .call_with_timeout::<_, ()>(
            TEST_PROG,
            TEST_VERS,
            PROC_SLOW,
            &Auth::none(),
            &(),
            Duration::from_millis(50),
        )
        .await
        .expect_err("slow call must time out");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(client.in_flight(), 0);

    // The abandoned call's late reply must be dropped, not handed to a later call.
    let echoed: u32 =
        client.call(TEST_PROG, TEST_VERS, PROC_ECHO, &Auth::none(), &99_u32).await.unwrap();
    assert_eq!(echoed, 99);
    tokio::time::sleep(SLOW_DELAY).await;
    let echoed: u32 =
        client.call(TEST_PROG, TEST_VERS, PROC_ECHO, &Auth::none(), &100_u32).await.unwrap();
    assert_eq!(echoed, 100);
    assert!(!client.is_closed());
}

#[tokio::test]
async fn timeout_mid_write_keeps_record_stream_intact() {
    // The server does not read for a while, so a large call is still being
    // written when its deadline passes.
    let server = FakeServer::start_with(ServerOptions {
        read_delay: Duration::from_millis(800),
        ..Default::default()
    })
    .await;
    let client = RpcClient::dial("127.0.0.1", server.port(), false, Duration::from_secs(5))
        .await
        .expect("dial fake server");

    let big = vec![0x5a_u8; 24 * 1024 * 1024];
    let err = client
        .call_with_timeout::<_, ()>(
            TEST_PROG,
            TEST_VERS,
            0,
            &Auth::none(),
            &big[..],
            Duration::from_millis(100),
        )
        .await
        .expect_err("large call must time out");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(client.in_flight(), 0);

    // The record is finished behind the abandoned call, so the next one is
    // framed correctly and answered.
    client.null(TEST_PROG, TEST_VERS).await.expect("call after timed out write");
    assert!(!client.is_closed());
    assert!(server.stats().xids.len() >= 2);
}

#[tokio::test]
async fn silent_server_times_out() {
    let server = FakeServer::start().await;
    let client = connect(&server).await;
    let start = Instant::now();
    let err = client
        .call_with_timeout::<_, ()>(
            TEST_PROG,
            TEST_VERS,
            PROC_SILENT,
            &Auth::none(),
            &(),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn accept_status_maps_to_rpc_error() {
    let server = FakeServer::start().await;
    let client = connect(&server).await;

    let err = client.null(0x3fff_0000, 1).await.unwrap_err();
    assert!(matches!(err, Error::Rpc(RpcError::ProgUnavail)), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::Rpc);

    let err = client.null(nfs3::PROGRAM, 4).await.unwrap_err();
    assert!(matches!(err, Error::Rpc(RpcError::ProgMismatch { low: 3, high: 3 })), "{err:?}");

    let err = client.call::<_, ()>(TEST_PROG, TEST_VERS, 77, &Auth::none(), &()).await.unwrap_err();
    assert!(matches!(err, Error::Rpc(RpcError::ProcUnavail)), "{err:?}");

    // ECHO without its argument.
    let err = client
        .call::<_, u32>(TEST_PROG, TEST_VERS, PROC_ECHO, &Auth::none(), &())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rpc(RpcError::GarbageArgs)), "{err:?}");
}

#[tokio::test]
async fn denied_reply_maps_to_auth_error() {
    let server = FakeServer::start().await;
    let client = connect(&server).await;
    let err = client
        .call::<_, ()>(TEST_PROG, TEST_VERS, PROC_DENY, &support::test_auth(), &())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rpc(RpcError::AuthError(auth_stat::AUTH_BADCRED))), "{err:?}");
}

#[tokio::test]
async fn decode_failures_are_classified() {
    let server = FakeServer::start().await;
    let client = connect(&server).await;

    let err = client
        .call::<_, u32>(TEST_PROG, TEST_VERS, PROC_TRUNCATED, &Auth::none(), &())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Truncated, "{err:?}");

    let err = client
        .call::<_, stable_how>(TEST_PROG, TEST_VERS, PROC_BAD_ENUM, &Auth::none(), &())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownVariant, "{err:?}");

    // Neither failure poisons the connection.
    client.null(TEST_PROG, TEST_VERS).await.expect("NULL after decode failures");
}

#[tokio::test]
async fn close_fails_pending_calls() {
    let server = FakeServer::start().await;
    let client = Arc::new(connect(&server).await);

    let pending = {
        let client = client.clone();
        tokio::spawn(async move {
            client.call::<_, ()>(TEST_PROG, TEST_VERS, PROC_SILENT, &Auth::none(), &()).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.in_flight(), 1);

    client.close().await.expect("close");
    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionClosed);

    // Closing twice is harmless, calling afterwards is not.
    client.close().await.expect("second close");
    let err = client.null(TEST_PROG, TEST_VERS).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
}

#[tokio::test]
async fn server_hangup_fails_pending_calls() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        // Swallow one call, then hang up.
        let _ = read_record(&mut stream).await;
        drop(stream);
    });

    let client = RpcClient::dial("127.0.0.1", port, false, Duration::from_secs(2)).await.unwrap();
    let err = client.null(TEST_PROG, TEST_VERS).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionClosed, "{err:?}");
    assert!(client.is_closed());
}

#[tokio::test]
async fn reply_with_unknown_xid_is_discarded() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let record = read_record(&mut stream).await.unwrap();
        let call: rpc_msg = xdr::deserialize(&mut std::io::Cursor::new(&record)).unwrap();
        assert!(matches!(call.body, rpc_body::CALL(_)));

        let stray = rpc_msg::accepted(call.xid.wrapping_add(1000), accept_body::SUCCESS);
        let mut body = xdr::to_bytes(&stray).unwrap();
        body.extend(xdr::to_bytes(&1_u32).unwrap());
        write_fragment(&mut stream, &body).await.unwrap();

        let answer = rpc_msg::accepted(call.xid, accept_body::SUCCESS);
        let mut body = xdr::to_bytes(&answer).unwrap();
        body.extend(xdr::to_bytes(&2_u32).unwrap());
        write_fragment(&mut stream, &body).await.unwrap();
        // Keep the connection up until the client is done.
        let _ = read_record(&mut stream).await;
    });

    let client = RpcClient::dial("127.0.0.1", port, false, Duration::from_secs(2)).await.unwrap();
    let value: u32 =
        client.call(TEST_PROG, TEST_VERS, PROC_ECHO, &Auth::none(), &()).await.unwrap();
    assert_eq!(value, 2);
}

#[tokio::test]
async fn dial_refused_port_returns_within_timeout() {
    // Grab a free port and release it so nothing listens there.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let start = Instant::now();
    let err = RpcClient::dial("127.0.0.1", port, false, Duration::from_secs(1)).await.unwrap_err();
    assert!(start.elapsed() < Duration::from_millis(1500));
    assert!(
        matches!(err.kind(), ErrorKind::Transport | ErrorKind::Timeout),
        "unexpected error: {err:?}"
    );
}

#[test]
fn auth_unix_limits() {
    let long_name = "m".repeat(MAX_MACHINE_NAME_LEN + 1);
    let err = Auth::unix(long_name, 0, 0).encode().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = Auth::unix("host", 0, 0).with_gids(0..(MAX_GIDS as u32 + 1)).encode().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let (cred, verf) = Auth::unix("host", 1000, 100).with_gids([1, 2, 3]).encode().unwrap();
    assert_eq!(cred.flavor as u32, 1);
    assert!(!cred.body.is_empty());
    assert!(verf.body.is_empty());

    let (cred, _) = Auth::none().encode().unwrap();
    assert!(cred.body.is_empty());
}

#[test]
fn tracker_refuses_duplicate_xids() {
    let tracker = TransactionTracker::new();
    let first = tracker.register(5).unwrap().expect("xid 5 is free");
    assert!(tracker.register(5).unwrap().is_none());
    assert_eq!(tracker.in_flight(), 1);

    drop(first);
    assert_eq!(tracker.in_flight(), 0);
    assert!(!tracker.complete(5, vec![0; 4]));

    let _again = tracker.register(5).unwrap().expect("xid 5 free again");
    tracker.close_all();
    assert!(tracker.is_closed());
    assert!(matches!(tracker.register(6), Err(Error::ConnectionClosed)));
}

#[tokio::test]
async fn datagram_call_round_trip() {
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut buf = vec![0_u8; 65536];
        loop {
            let Ok((n, peer)) = socket.recv_from(&mut buf).await else { return };
            let mut src = std::io::Cursor::new(&buf[..n]);
            let call: rpc_msg = xdr::deserialize(&mut src).unwrap();
            let value: u32 = xdr::deserialize(&mut src).unwrap();
            let mut reply =
                xdr::to_bytes(&rpc_msg::accepted(call.xid, accept_body::SUCCESS)).unwrap();
            reply.extend(xdr::to_bytes(&(value + 1)).unwrap());
            socket.send_to(&reply, peer).await.unwrap();
        }
    });

    let client = RpcClient::dial("127.0.0.1", port, true, Duration::from_secs(2)).await.unwrap();
    assert!(client.is_datagram());
    let value: u32 =
        client.call(TEST_PROG, TEST_VERS, PROC_ECHO, &Auth::none(), &41_u32).await.unwrap();
    assert_eq!(value, 42);

    let oversized = vec![0_u8; 70_000];
    let err = client
        .call::<_, ()>(TEST_PROG, TEST_VERS, PROC_ECHO, &Auth::none(), &oversized[..])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
