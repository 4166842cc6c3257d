use std::time::Duration;

use assert_matches::assert_matches;
use sdbot_core::message::TextContent;
use sdbot_core::platform::{CardContent, ChatPlatform, PlatformError};
use sdbot_core::{CardKey, IncomingMessage};
use sdbot_dingtalk::{Credentials, DingTalkApi, Endpoints};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1.0/oauth2/accessToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "tok-1",
            "expireIn": 7200,
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn api(server: &MockServer) -> DingTalkApi {
    DingTalkApi::new(
        Credentials {
            client_id: "app-key".into(),
            client_secret: "app-secret".into(),
        },
        Endpoints::single(&server.uri()),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn message(server: &MockServer) -> IncomingMessage {
    IncomingMessage {
        sender_id: "sender-1".into(),
        sender_corp_id: "corp-1".into(),
        sender_staff_id: "staff-1".into(),
        sender_nick: "Alice".into(),
        conversation_id: "cid-1".into(),
        conversation_type: "2".into(),
        message_id: "msg-1".into(),
        robot_code: "robot-1".into(),
        session_webhook: format!("{}/robot/sendBySession", server.uri()),
        text: TextContent {
            content: "a red fox".into(),
        },
    }
}

fn progress_card() -> CardContent {
    CardContent {
        progress: Some("10%".into()),
        prompt: "a red fox".into(),
        images: vec!["@placeholder".into()],
        elapsed_secs: 1.0,
    }
}

#[tokio::test]
async fn send_card_posts_standard_card_with_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    let msg = message(&server);
    let key = CardKey::derive(&msg);

    Mock::given(method("POST"))
        .and(path("/v1.0/im/v1.0/robot/interactiveCards/send"))
        .and(header("x-acs-dingtalk-access-token", "tok-1"))
        .and(body_partial_json(serde_json::json!({
            "cardTemplateId": "StandardCard",
            "openConversationId": "cid-1",
            "cardBizId": key.as_str(),
            "robotCode": "robot-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    api(&server)
        .send_card(&key, &progress_card(), &msg)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let sent = requests
        .iter()
        .find(|r| r.url.path().ends_with("/interactiveCards/send"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&sent.body).unwrap();
    let card_data: serde_json::Value =
        serde_json::from_str(body["cardData"].as_str().unwrap()).unwrap();
    assert_eq!(card_data["contents"][1]["text"], "Prompt: a red fox");
    let at_users: serde_json::Value =
        serde_json::from_str(body["sendOptions"]["atUserListJson"].as_str().unwrap()).unwrap();
    assert_eq!(at_users, serde_json::json!([{"nickName": "Alice", "userId": "staff-1"}]));
}

#[tokio::test]
async fn unauthorized_update_resets_token_for_next_call() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    let msg = message(&server);
    let key = CardKey::derive(&msg);

    Mock::given(method("PUT"))
        .and(path("/v1.0/im/robots/interactiveCards"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1.0/im/robots/interactiveCards"))
        .and(body_partial_json(serde_json::json!({"cardBizId": key.as_str()})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let api = api(&server);
    let first = api.update_card(&key, &progress_card()).await;
    assert_matches!(first, Err(PlatformError::Unauthorized));

    api.update_card(&key, &progress_card()).await.unwrap();
}

#[tokio::test]
async fn forbidden_card_is_permission_denied() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    let msg = message(&server);

    Mock::given(method("POST"))
        .and(path("/v1.0/im/v1.0/robot/interactiveCards/send"))
        .respond_with(ResponseTemplate::new(403).set_body_string("robot lacks card permission"))
        .mount(&server)
        .await;

    let err = api(&server)
        .send_card(&CardKey::derive(&msg), &progress_card(), &msg)
        .await
        .unwrap_err();
    assert_matches!(err, PlatformError::PermissionDenied(body) if body.contains("permission"));
}

#[tokio::test]
async fn server_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    let msg = message(&server);

    Mock::given(method("PUT"))
        .and(path("/v1.0/im/robots/interactiveCards"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = api(&server)
        .update_card(&CardKey::derive(&msg), &progress_card())
        .await
        .unwrap_err();
    assert_matches!(err, PlatformError::Status { status: 500, body } if body == "boom");
}

#[tokio::test]
async fn upload_returns_media_id() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/media/upload"))
        .and(query_param("access_token", "tok-1"))
        .and(query_param("type", "image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errcode": 0,
            "errmsg": "ok",
            "media_id": "@lADPmedia",
            "type": "image",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let media_id = api(&server).upload_image(vec![0x89, b'P', b'N', b'G']).await.unwrap();
    assert_eq!(media_id, "@lADPmedia");
}

#[tokio::test]
async fn upload_errcode_is_api_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/media/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errcode": 40004,
            "errmsg": "invalid media type",
        })))
        .mount(&server)
        .await;

    let err = api(&server).upload_image(vec![1, 2, 3]).await.unwrap_err();
    assert_matches!(err, PlatformError::Api { code: 40004, .. });
}

#[tokio::test]
async fn markdown_goes_to_session_webhook_without_token() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    let msg = message(&server);

    Mock::given(method("POST"))
        .and(path("/robot/sendBySession"))
        .and(body_partial_json(serde_json::json!({
            "msgtype": "markdown",
            "markdown": {"title": "Stable Diffusion Bot", "text": "#### Prompt: a red fox"},
            "at": {"atUserIds": ["staff-1"]},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"errcode": 0})))
        .expect(1)
        .mount(&server)
        .await;

    api(&server)
        .send_markdown("Stable Diffusion Bot", "#### Prompt: a red fox", &msg)
        .await
        .unwrap();
}
