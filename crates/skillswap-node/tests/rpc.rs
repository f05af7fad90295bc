//! RPC surface smoke test: boots the real JSON-RPC server over the
//! in-process stack and drives it with an HTTP client.
//!
//! Run with:
//!   cargo test -p skillswap-node --test rpc

mod common;

use std::net::TcpListener;
use std::sync::Arc;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::HttpClientBuilder;
use jsonrpsee::rpc_params;
use serde_json::{json, Value};

use skillswap_rpc::{RpcServer, RpcServerState};

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn start_server(stack: common::TestStack) -> String {
    let state = Arc::new(RpcServerState {
        store: stack.store,
        profiles: stack.profiles,
        matcher: stack.matcher,
        search: stack.search,
        swaps: stack.swaps,
        completion: stack.completion,
        economy: stack.economy,
        messaging: stack.messaging,
        moderation: stack.moderation,
        reviews: stack.reviews,
        portfolio: stack.portfolio,
        subsystem_status: vec![("email".into(), "recording".into())],
    });
    let port = free_port();
    let addr = format!("127.0.0.1:{port}");
    let handle = RpcServer::new(state)
        .start(addr.parse().unwrap())
        .await
        .unwrap();
    // Keep the server alive for the test duration.
    std::mem::forget(handle);
    format!("http://{addr}")
}

#[tokio::test]
async fn health_and_profile_round_trip() {
    let url = start_server(common::stack()).await;
    let client = HttpClientBuilder::default().build(&url).unwrap();

    let health: Value = client.request("swap_health", rpc_params![]).await.unwrap();
    assert_eq!(health["status"], "ok");
    assert!(health["services"]["store"].as_str().unwrap().contains("ok"));

    let profile: Value = client
        .request(
            "swap_upsertProfile",
            rpc_params![json!({
                "uid": "alice",
                "email": "alice@example.com",
                "display_name": "Alice",
                "skills_to_offer": "Python, FastAPI",
                "services_needed": "Guitar lessons",
            })],
        )
        .await
        .unwrap();
    assert_eq!(profile["uid"], "alice");
    assert_eq!(profile["swap_points"], 0);

    let fetched: Value = client
        .request("swap_getProfile", rpc_params!["alice"])
        .await
        .unwrap();
    assert_eq!(fetched["email"], "alice@example.com");

    let by_email: Value = client
        .request("swap_getProfileByEmail", rpc_params!["alice@example.com"])
        .await
        .unwrap();
    assert_eq!(by_email["uid"], "alice");
}

#[tokio::test]
async fn missing_profile_maps_to_not_found_code() {
    let url = start_server(common::stack()).await;
    let client = HttpClientBuilder::default().build(&url).unwrap();

    let err = client
        .request::<Value, _>("swap_getProfile", rpc_params!["nobody"])
        .await
        .unwrap_err();
    match err {
        jsonrpsee::core::ClientError::Call(call) => {
            assert_eq!(call.code(), -32001);
            assert!(call.message().contains("profile not found"));
        }
        other => panic!("expected call error, got {other:?}"),
    }
}

#[tokio::test]
async fn swap_lifecycle_over_rpc() {
    let url = start_server(common::stack()).await;
    let client = HttpClientBuilder::default().build(&url).unwrap();

    for (uid, offer, need) in [
        ("alice", "Python, FastAPI", "Guitar lessons"),
        ("bob", "Guitar lessons", "Python, FastAPI"),
    ] {
        let _: Value = client
            .request(
                "swap_upsertProfile",
                rpc_params![json!({
                    "uid": uid,
                    "email": format!("{uid}@example.com"),
                    "display_name": uid,
                    "skills_to_offer": offer,
                    "services_needed": need,
                })],
            )
            .await
            .unwrap();
    }

    let swap: Value = client
        .request(
            "swap_createSwapRequest",
            rpc_params![
                "alice",
                json!({
                    "recipient_uid": "bob",
                    "swap_type": "direct",
                    "requester_offer": "Python",
                    "requester_need": "Guitar",
                })
            ],
        )
        .await
        .unwrap();
    assert_eq!(swap["status"], "pending");
    let swap_id = swap["id"].as_str().unwrap().to_string();

    let incoming: Value = client
        .request("swap_incomingRequests", rpc_params!["bob", Value::Null])
        .await
        .unwrap();
    assert_eq!(incoming.as_array().unwrap().len(), 1);

    let accepted: Value = client
        .request(
            "swap_respondSwapRequest",
            rpc_params![swap_id.clone(), "bob", "accept"],
        )
        .await
        .unwrap();
    assert_eq!(accepted["status"], "accepted");
    let conv_id = accepted["conversation_id"].as_str().unwrap().to_string();

    let message: Value = client
        .request(
            "swap_sendMessage",
            rpc_params![conv_id.clone(), "alice", "see you tuesday"],
        )
        .await
        .unwrap();
    assert_eq!(message["sender_uid"], "alice");

    let unread: Value = client
        .request("swap_unreadCount", rpc_params!["bob"])
        .await
        .unwrap();
    assert_eq!(unread["total_unread"], 1);

    for uid in ["alice", "bob"] {
        let status: Value = client
            .request(
                "swap_markComplete",
                rpc_params![
                    swap_id.clone(),
                    uid,
                    json!({"hours_exchanged": 2.0, "skill_level": "intermediate"})
                ],
            )
            .await
            .unwrap();
        if uid == "bob" {
            assert_eq!(status["status"], "completed");
            assert_eq!(status["final_hours"], 2.0);
        }
    }

    let balance: Value = client
        .request("swap_pointsBalance", rpc_params!["alice", 10])
        .await
        .unwrap();
    assert_eq!(balance["swap_points"], 19);

    let portfolio: Value = client
        .request("swap_portfolioStats", rpc_params!["alice"])
        .await
        .unwrap();
    assert_eq!(portfolio["completed_swap_count"], 1);
}
