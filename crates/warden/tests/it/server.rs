use crate::utils::{ALICE, APP, spawn};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use warden::{approval::ApprovalRequest, server::ApiResponse};

#[tokio::test(flavor = "multi_thread")]
async fn switches_connected_dapp_to_polygon() {
    let t = spawn(true).await;
    t.api().dapps().save_dapp_connection(APP, ALICE, 1);

    let response = t
        .dapp_call(json!({
            "requestId": "req-1",
            "method": "wallet_switchEthereumChain",
            "params": [{ "chainId": "0x89" }]
        }))
        .await;
    similar_asserts::assert_eq!(
        response,
        json!({
            "type": "ChainChangeResponse",
            "requestId": "req-1",
            "providerUrl": "https://rpc.example",
            "chainId": "0x89"
        })
    );
    assert_eq!(t.api().dapps().get(APP).unwrap().last_chain_id, Some(137));

    let response = t.dapp_call(json!({ "requestId": 7, "method": "eth_chainId" })).await;
    assert_eq!(response, json!({ "type": "GetChainIdResponse", "requestId": "7", "chainId": "0x89" }));

    t.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_chain_wins_over_missing_connection() {
    let t = spawn(true).await;

    let response = t
        .dapp_call(json!({
            "requestId": "req-2",
            "method": "wallet_switchEthereumChain",
            "params": [{ "chainId": "0x7a69" }]
        }))
        .await;
    assert_eq!(response["type"], "ErrorResponse");
    assert_eq!(response["requestId"], "req-2");
    assert_eq!(response["error"]["code"], 4902);

    let response = t
        .dapp_call(json!({
            "requestId": "req-3",
            "method": "wallet_switchEthereumChain",
            "params": [{ "chainId": "0x89" }]
        }))
        .await;
    assert_eq!(response["error"]["code"], 4100);
    assert!(t.api().dapps().get(APP).is_none());

    t.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_params_keep_request_id() {
    let t = spawn(true).await;
    let response = t
        .dapp_call(json!({ "requestId": "bad", "method": "personal_sign", "params": [42] }))
        .await;
    assert_eq!(response["requestId"], "bad");
    assert_eq!(response["error"]["code"], -32602);
    t.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn operator_routes_require_session_token() {
    let t = spawn(true).await;

    let status = t.client.get(t.url("/api/approval/request")).send().await.unwrap().status();
    assert_eq!(status, StatusCode::FORBIDDEN);
    let status = t
        .client
        .get(t.url("/api/approval/request"))
        .header("X-Session-Token", "wrong")
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::FORBIDDEN);

    let api: ApiResponse<ApprovalRequest> =
        t.operator_get("/api/approval/request").send().await.unwrap().json().await.unwrap();
    assert_eq!(api, ApiResponse::error("No pending approval request"));

    t.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn connects_after_operator_approval() {
    let t = spawn(true).await;

    let request = t.client.post(t.url("/")).header("Origin", format!("{APP}/swap")).json(&json!({
        "requestId": "connect",
        "method": "eth_requestAccounts"
    }));
    let pending = tokio::spawn(async move { request.send().await.unwrap().json::<Value>().await.unwrap() });

    let approval = loop {
        let api: ApiResponse<ApprovalRequest> =
            t.operator_get("/api/approval/request").send().await.unwrap().json().await.unwrap();
        if let ApiResponse::Ok { data } = api {
            break data;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    };
    assert_eq!(approval.dapp_url, APP);
    assert_eq!(approval.account, Some(ALICE));

    let api: ApiResponse<()> = t
        .operator_post("/api/approval/response")
        .json(&json!({ "id": approval.id, "approved": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(api, ApiResponse::ok(()));

    let response = pending.await.unwrap();
    similar_asserts::assert_eq!(
        response,
        json!({
            "type": "AccountResponse",
            "requestId": "connect",
            "connectedAddress": ALICE,
            "chainId": "0x1",
            "providerUrl": "https://eth.example"
        })
    );
    assert_eq!(t.api().dapps().connected_account(APP), Some(ALICE));

    // answering twice is refused
    let api: ApiResponse<()> = t
        .operator_post("/api/approval/response")
        .json(&json!({ "id": approval.id, "approved": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(api, ApiResponse::error("Unknown approval id"));

    t.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn locked_wallet_refuses_to_sign() {
    let t = spawn(true).await;
    t.api().dapps().save_dapp_connection(APP, ALICE, 1);

    let api: Value = t
        .operator_post("/api/session")
        .json(&json!({ "unlocked": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(api, json!({ "status": "ok", "data": { "unlocked": false } }));

    let response = t
        .dapp_call(json!({
            "requestId": "sign",
            "method": "personal_sign",
            "params": ["0x68656c6c6f", ALICE]
        }))
        .await;
    assert_eq!(response["error"]["code"], 4100);
    assert!(t.mainnet.sent.lock().is_empty());

    t.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn sidebar_requests_reach_the_operator() {
    let t = spawn(true).await;
    t.api().dapps().save_dapp_connection(APP, ALICE, 1);

    let response = t
        .dapp_call(json!({
            "requestId": "sidebar",
            "method": "uniswap_openSidebar",
            "params": [{ "tab": "swap" }]
        }))
        .await;
    assert_eq!(response, json!({ "type": "UniswapOpenSidebarResponse", "requestId": "sidebar" }));

    let api: Value = t.operator_get("/api/sidebar").send().await.unwrap().json().await.unwrap();
    assert_eq!(api, json!({ "status": "ok", "data": { "dappUrl": APP, "tab": "swap" } }));

    t.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn dapp_endpoint_answers_cors_preflight() {
    let t = spawn(true).await;

    let preflight = t
        .client
        .request(reqwest::Method::OPTIONS, t.url("/"))
        .header("Origin", APP)
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(preflight.status().is_success());
    let headers = preflight.headers();
    assert_eq!(headers["access-control-allow-origin"], APP);
    assert!(headers["access-control-allow-methods"].to_str().unwrap().contains("POST"));
    assert!(headers["access-control-allow-headers"].to_str().unwrap().contains("content-type"));

    let response = t
        .client
        .post(t.url("/"))
        .header("Origin", APP)
        .json(&json!({ "requestId": 1, "method": "eth_chainId" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["access-control-allow-origin"], APP);

    // operator routes stay same-origin
    let preflight = t
        .client
        .request(reqwest::Method::OPTIONS, t.url("/api/session"))
        .header("Origin", APP)
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();
    assert!(preflight.headers().get("access-control-allow-origin").is_none());

    t.stop().await;
}
