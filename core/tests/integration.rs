//! End-to-end calls against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every client
//! operation over real HTTP. Handlers forward their outcome through a
//! channel so the test thread can assert on it.

use std::sync::mpsc;
use std::thread;

use cpas_core::{BanQuery, CpasClient, CpasError, InfoQuery};
use mock_server::{MockConfig, MockState, StatusCode};
use uuid::Uuid;

const KEY: &str = "test-key";
const GAME_ID: &str = "5f0c6a3e-1f7b-4c55-9a7e-2d8f0b3c9e11";

/// Start a mock server on a random port and return its base URL.
fn start_server(config: MockConfig) -> (String, MockState) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let state = MockState::new(config);
    let server_state = state.clone();
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with(listener, server_state).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), state)
}

fn client_for(base_url: &str) -> CpasClient {
    let client = CpasClient::new().unwrap();
    client.reconfigure(base_url, KEY, "127.0.0.1", "27015").unwrap();
    client
}

#[test]
fn ban_lifecycle() {
    let (base_url, _state) = start_server(MockConfig::default());
    let client = client_for(&base_url);

    // Step 1: info for a fresh player.
    let (tx, rx) = mpsc::channel();
    client
        .fetch_info(&InfoQuery::new(GAME_ID).player_ip("10.0.0.7"), move |outcome| {
            tx.send(outcome).unwrap();
        })
        .wait()
        .unwrap();
    let info = rx.recv().unwrap().unwrap();
    assert_eq!(info.game_id, Uuid::parse_str(GAME_ID).unwrap());
    assert_eq!(info.user_id, 0);
    assert!(info.groups.is_empty());

    // Step 2: not banned yet.
    let (tx, rx) = mpsc::channel();
    client
        .fetch_ban_info(GAME_ID, move |outcome| tx.send(outcome).unwrap())
        .wait()
        .unwrap();
    assert_eq!(rx.recv().unwrap().unwrap().duration, 0);

    // Step 3: ban with a reason containing characters that need encoding.
    let ban = BanQuery::new(GAME_ID, "gr/ief+er", "")
        .admins(["admin-1", "admin-2"])
        .minutes(90)
        .reason("x-ray / fly hacks ??>");
    let (tx, rx) = mpsc::channel();
    client
        .ban_user(&ban, move |outcome| tx.send(outcome).unwrap())
        .wait()
        .unwrap();
    let result = rx.recv().unwrap().unwrap();
    assert!(result.is_success(), "{result:?}");

    // Step 4: ban info is identical across repeated calls.
    let mut seen = Vec::new();
    for _ in 0..2 {
        let (tx, rx) = mpsc::channel();
        client
            .fetch_ban_info(GAME_ID, move |outcome| tx.send(outcome).unwrap())
            .wait()
            .unwrap();
        seen.push(rx.recv().unwrap().unwrap());
    }
    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[0].duration, 90);
    assert_eq!(seen[0].reason, "x-ray / fly hacks ??>");

    // Step 5: history.
    let (tx, rx) = mpsc::channel();
    client
        .fetch_ban_history(GAME_ID, 10, move |outcome| tx.send(outcome).unwrap())
        .wait()
        .unwrap();
    let history = rx.recv().unwrap().unwrap();
    assert_eq!(history.bans.len(), 1);
    assert_eq!(history.bans[0].length, 90);
    assert!(history.bans[0].banned_at > 0);

    // Step 6: a second, permanent ban without reason.
    let (tx, rx) = mpsc::channel();
    client
        .ban_user(&BanQuery::new(GAME_ID, "griefer", ""), move |outcome| {
            tx.send(outcome).unwrap()
        })
        .wait()
        .unwrap();
    assert!(rx.recv().unwrap().unwrap().is_success());

    let (tx, rx) = mpsc::channel();
    client
        .fetch_ban_info(GAME_ID, move |outcome| tx.send(outcome).unwrap())
        .wait()
        .unwrap();
    let current = rx.recv().unwrap().unwrap();
    assert_eq!(current.duration, -1);
    assert_eq!(current.reason, "Banned");

    // Step 7: a zero count reaches the server unchanged; it answers with one entry.
    let (tx, rx) = mpsc::channel();
    client
        .fetch_ban_history(GAME_ID, 0, move |outcome| tx.send(outcome).unwrap())
        .wait()
        .unwrap();
    assert_eq!(rx.recv().unwrap().unwrap().bans.len(), 1);
}

#[test]
fn wrong_key_is_passed_through_as_content() {
    let (base_url, _state) = start_server(MockConfig::default());
    let client = CpasClient::new().unwrap();
    client.reconfigure(&base_url, "bad-key", "h", "1").unwrap();

    let (tx, rx) = mpsc::channel();
    client
        .ban_user(&BanQuery::new(GAME_ID, "p", ""), move |outcome| {
            tx.send(outcome).unwrap()
        })
        .wait()
        .unwrap();
    let result = rx.recv().unwrap().unwrap();
    assert!(!result.is_success());
    assert_eq!(result.service_error(), Some("Invalid API key"));

    // Shapes with required fields cannot hold the error document.
    let (tx, rx) = mpsc::channel();
    client
        .fetch_ban_info(GAME_ID, move |outcome| tx.send(outcome).unwrap())
        .wait()
        .unwrap();
    assert!(matches!(rx.recv().unwrap(), Err(CpasError::Decode { .. })));
}

#[test]
fn server_error_status_is_network_error() {
    let (base_url, _state) = start_server(MockConfig {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        ..MockConfig::default()
    });
    let client = client_for(&base_url);

    let (tx, rx) = mpsc::channel();
    client
        .fetch_ban_info(GAME_ID, move |outcome| tx.send(outcome).unwrap())
        .wait()
        .unwrap();
    match rx.recv().unwrap() {
        Err(CpasError::Network(message)) => {
            assert!(message.contains("500"), "{message}");
            assert!(!message.contains(KEY), "{message}");
        }
        other => panic!("expected network error, got {other:?}"),
    }
}

#[test]
fn handler_runs_on_pool_thread() {
    let (base_url, _state) = start_server(MockConfig::default());
    let client = client_for(&base_url);

    let (tx, rx) = mpsc::channel();
    client
        .fetch_ban_info(GAME_ID, move |_| tx.send(thread::current().id()).unwrap())
        .wait()
        .unwrap();
    assert_ne!(rx.recv().unwrap(), thread::current().id());
}

#[test]
fn reconfigure_switches_servers_for_new_calls() {
    let (first_url, first) = start_server(MockConfig::default());
    let (second_url, second) = start_server(MockConfig::default());
    let client = client_for(&first_url);

    let (tx, rx) = mpsc::channel();
    let tx2 = tx.clone();
    client
        .fetch_ban_info(GAME_ID, move |outcome| tx.send(outcome.is_ok()).unwrap())
        .wait()
        .unwrap();
    client.reconfigure(&second_url, KEY, "127.0.0.1", "27015").unwrap();
    client
        .fetch_ban_info(GAME_ID, move |outcome| tx2.send(outcome.is_ok()).unwrap())
        .wait()
        .unwrap();

    assert!(rx.recv().unwrap());
    assert!(rx.recv().unwrap());
    assert_eq!(first.request_count(), 1);
    assert_eq!(second.request_count(), 1);
}
