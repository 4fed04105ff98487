use sorng_ftp_resilient::ftp::*;
use std::time::Duration;

fn location(uri: &str) -> FtpLocation {
    FtpLocation::parse(uri).unwrap()
}

async fn connect(transport: &SimulatedTransport, uri: &str) -> ResilientFtpClient<SimulatedTransport> {
    ResilientFtpClient::connect(transport.clone(), location(uri), FtpFileSystemOptions::default())
        .await
        .unwrap()
}

fn count(transport: &SimulatedTransport, command: &str) -> usize {
    transport.commands().iter().filter(|c| *c == command).count()
}

// ── Construction ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_construction_connects_eagerly() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://user:pw@ftp.example.com/pub").await;

    assert_eq!(transport.server().connect_attempts, 1);
    assert!(client.is_connected().await);
    assert_eq!(client.root().host(), "ftp.example.com");
    assert!(client.default_timeout().is_none());
}

#[tokio::test]
async fn test_construction_fails_fast() {
    let transport = SimulatedTransport::new();
    transport.fail_connect_with(FtpError::auth_failed("530 Login incorrect"));

    let result = ResilientFtpClient::connect(
        transport.clone(),
        location("ftp://user:wrong@h/"),
        FtpFileSystemOptions::default(),
    )
    .await;

    let Err(err) = result else {
        panic!("construction should fail when the first connect fails");
    };
    assert_eq!(err.kind, FtpErrorKind::AuthFailed);
    assert_eq!(transport.server().connect_attempts, 1);
}

#[tokio::test]
async fn test_construction_with_timeout_override() {
    let transport = SimulatedTransport::new();
    let client = ResilientFtpClient::connect_with_timeout(
        transport.clone(),
        location("ftp://h/"),
        FtpFileSystemOptions::default(),
        Some(Duration::from_secs(12)),
    )
    .await
    .unwrap();

    assert_eq!(client.default_timeout(), Some(Duration::from_secs(12)));
    let server = transport.server();
    assert_eq!(server.last_connect.as_ref().unwrap().timeout, Some(Duration::from_secs(12)));
}

// ── Retry envelope ───────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_retries_once_after_transport_failure() {
    let transport = SimulatedTransport::new();
    transport.add_file("old.log", b"x");
    let client = connect(&transport, "ftp://h/").await;
    transport.fail_next(SimOp::DeleteFile, 1);

    assert!(client.delete_file("old.log").await.unwrap());

    assert_eq!(transport.server().connect_attempts, 2);
    assert_eq!(transport.server().disconnects, 1);
    assert_eq!(count(&transport, "DELE old.log"), 2);
    assert!(transport.file_contents("old.log").is_none());
}

#[tokio::test]
async fn test_retry_survives_failed_close_of_broken_session() {
    let transport = SimulatedTransport::new();
    transport.add_file("old.log", b"x");
    let client = connect(&transport, "ftp://h/").await;
    transport.fail_next(SimOp::DeleteFile, 1);
    transport.fail_next(SimOp::Disconnect, 1);

    assert!(client.delete_file("old.log").await.unwrap());

    assert_eq!(transport.server().connect_attempts, 2);
    assert_eq!(transport.server().disconnects, 1);
    assert_eq!(transport.commands(), vec!["DELE old.log", "QUIT", "DELE old.log"]);
    assert!(client.is_connected().await);
}

#[tokio::test]
async fn test_second_failure_propagates_without_third_attempt() {
    let transport = SimulatedTransport::new();
    transport.add_file("old.log", b"x");
    let client = connect(&transport, "ftp://h/").await;
    transport.fail_next(SimOp::DeleteFile, 2);

    let err = client.delete_file("old.log").await.unwrap_err();

    assert_eq!(err.kind, FtpErrorKind::Io);
    assert_eq!(count(&transport, "DELE old.log"), 2);
    assert_eq!(transport.server().connect_attempts, 2);
}

#[tokio::test]
async fn test_failed_reconnect_is_a_connection_error() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;
    transport.fail_next(SimOp::MakeDirectory, 1);
    transport.fail_next(SimOp::Connect, 1);

    let err = client.make_directory("new").await.unwrap_err();

    assert_eq!(err.kind, FtpErrorKind::ConnectionFailed);
    assert_eq!(count(&transport, "MKD new"), 1);
    assert_eq!(transport.server().connect_attempts, 2);
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_negative_reply_is_not_retried() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;

    assert!(!client.delete_file("missing.txt").await.unwrap());
    assert!(!client.remove_directory("missing").await.unwrap());

    assert_eq!(transport.server().connect_attempts, 1);
    assert_eq!(client.reply_string().await.unwrap(), "550 Requested action not taken");
}

#[tokio::test]
async fn test_every_command_is_retried() {
    let transport = SimulatedTransport::new();
    transport.add_directory("empty", Vec::new());
    transport.add_file("a.txt", b"abc");
    let client = connect(&transport, "ftp://h/").await;

    transport.fail_next(SimOp::RemoveDirectory, 1);
    assert!(client.remove_directory("empty").await.unwrap());

    transport.fail_next(SimOp::MakeDirectory, 1);
    assert!(client.make_directory("made").await.unwrap());

    transport.fail_next(SimOp::Rename, 1);
    assert!(client.rename("a.txt", "b.txt").await.unwrap());

    transport.fail_next(SimOp::Retrieve, 1);
    assert!(client.retrieve_file_stream("b.txt").await.unwrap().is_some());

    transport.fail_next(SimOp::Retrieve, 1);
    assert!(client.retrieve_file_stream_from("b.txt", 1).await.unwrap().is_some());

    transport.fail_next(SimOp::Append, 1);
    assert!(client.append_file_stream("b.txt").await.unwrap().is_some());

    transport.fail_next(SimOp::Store, 1);
    assert!(client.store_file_stream("c.txt").await.unwrap().is_some());

    transport.fail_next(SimOp::List, 1);
    assert!(client.list_files(None).await.unwrap().is_some());

    // One initial session plus one reconnect per injected failure.
    assert_eq!(transport.server().connect_attempts, 9);
    assert_eq!(transport.server().disconnects, 8);
}

// ── Streams ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_retrieve_resumes_at_offset() {
    let transport = SimulatedTransport::new();
    transport.add_file("data.bin", b"0123456789");
    let client = connect(&transport, "ftp://h/").await;

    let stream = client.retrieve_file_stream_from("data.bin", 4).await.unwrap().unwrap();
    assert_eq!(stream.into_inner(), b"456789".to_vec());
    assert!(transport.commands().contains(&"REST 4".to_string()));

    let stream = client.retrieve_file_stream("data.bin").await.unwrap().unwrap();
    assert_eq!(stream.into_inner(), b"0123456789".to_vec());
    assert!(client.complete_pending_command().await.unwrap());
}

#[tokio::test]
async fn test_retrieve_missing_file_is_none() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;

    assert!(client.retrieve_file_stream("nope.bin").await.unwrap().is_none());
    assert_eq!(transport.server().connect_attempts, 1);
}

#[tokio::test]
async fn test_store_then_append() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;

    let mut upload = client.store_file_stream("notes.txt").await.unwrap().unwrap();
    upload.write(b"hello");
    upload.finish();
    assert!(client.complete_pending_command().await.unwrap());

    let mut upload = client.append_file_stream("notes.txt").await.unwrap().unwrap();
    upload.write(b" world");
    upload.finish();

    assert_eq!(transport.file_contents("notes.txt"), Some(b"hello world".to_vec()));
}

// ── Disconnect / abort / pending ─────────────────────────────────────

#[tokio::test]
async fn test_disconnect_clears_session_even_when_close_fails() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;
    transport.fail_next(SimOp::Disconnect, 1);

    assert!(client.disconnect().await.is_err());
    assert!(!client.is_connected().await);

    client.make_directory("again").await.unwrap();
    assert_eq!(transport.server().connect_attempts, 2);
}

#[tokio::test]
async fn test_is_connected_never_connects() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;
    client.disconnect().await.unwrap();

    assert!(!client.is_connected().await);
    assert!(!client.is_connected().await);
    assert_eq!(transport.server().connect_attempts, 1);

    // Nothing to close: no QUIT is sent.
    client.disconnect().await.unwrap();
    assert_eq!(transport.server().disconnects, 1);
}

#[tokio::test]
async fn test_complete_pending_command_without_session() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;
    client.disconnect().await.unwrap();

    assert!(client.complete_pending_command().await.unwrap());
    assert_eq!(transport.server().connect_attempts, 1);
    assert_eq!(count(&transport, "(pending reply)"), 0);
}

#[tokio::test]
async fn test_complete_pending_command_is_not_retried() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;
    transport.fail_next(SimOp::CompletePendingCommand, 1);

    let err = client.complete_pending_command().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(transport.server().connect_attempts, 1);
}

#[tokio::test]
async fn test_abort_always_succeeds() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;

    transport.fail_next(SimOp::Disconnect, 1);
    assert!(client.abort().await);
    assert!(!client.is_connected().await);

    // Already without a session.
    assert!(client.abort().await);

    client.make_directory("after-abort").await.unwrap();
    assert!(client.abort().await);
    assert_eq!(transport.server().disconnects, 2);
}

#[tokio::test]
async fn test_reply_string_connects_lazily() {
    let transport = SimulatedTransport::new();
    transport.add_file("f.txt", b"1");
    let client = connect(&transport, "ftp://h/").await;

    client.delete_file("f.txt").await.unwrap();
    assert_eq!(client.reply_string().await.unwrap(), "250 File deleted");

    client.disconnect().await.unwrap();
    assert_eq!(client.reply_string().await.unwrap(), "230 User logged in");
    assert_eq!(transport.server().connect_attempts, 2);
}

// ── Passive mode ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_passive_mode_requested_once_per_session() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/pub?vfs.passive=true").await;
    assert_eq!(transport.server().passive_switches, 1);

    client.make_directory("a").await.unwrap();
    client.list_files(None).await.unwrap();
    client.reply_string().await.unwrap();
    assert_eq!(transport.server().passive_switches, 1);

    // A replacement session starts active again and is switched once.
    transport.fail_next(SimOp::MakeDirectory, 1);
    client.make_directory("b").await.unwrap();
    assert_eq!(transport.server().passive_switches, 2);
}

#[tokio::test]
async fn test_no_passive_mode_without_marker() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/pub?vfs.passive=false").await;
    client.make_directory("a").await.unwrap();

    assert_eq!(transport.server().passive_switches, 0);
}

#[tokio::test]
async fn test_already_passive_session_is_left_alone() {
    let transport = SimulatedTransport::new();
    transport.start_sessions_passive(true);
    let client = connect(&transport, "ftp://h/?vfs.passive=true").await;
    client.make_directory("a").await.unwrap();

    assert_eq!(transport.server().passive_switches, 0);
}

// ── Credentials & proxy ──────────────────────────────────────────────

#[tokio::test]
async fn test_reconnect_reuses_location_and_proxy() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://alice:pw@h:2100/srv?proxyHost=px&proxyPort=1080&bad").await;
    transport.fail_next(SimOp::MakeDirectory, 1);
    client.make_directory("d").await.unwrap();

    let server = transport.server();
    assert_eq!(server.connect_attempts, 2);
    let seen = server.last_connect.as_ref().unwrap();
    assert_eq!(seen.username, "alice");
    assert_eq!(seen.port, 2100);
    assert_eq!(seen.base_path, "/srv");
    let proxy = seen.proxy.as_ref().unwrap();
    assert_eq!(proxy.host.as_deref(), Some("px"));
    assert_eq!(proxy.port.as_deref(), Some("1080"));
}

// ── Concurrency ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_callers_share_one_new_session() {
    let transport = SimulatedTransport::new();
    let client = connect(&transport, "ftp://h/").await;
    client.disconnect().await.unwrap();
    transport.set_connect_delay(Some(Duration::from_millis(20)));

    let (a, b) = tokio::join!(client.make_directory("a"), client.make_directory("b"));
    assert!(a.unwrap());
    assert!(b.unwrap());

    let server = transport.server();
    assert_eq!(server.connect_attempts, 2);
    assert_eq!(server.sessions_opened, 2);
}
