use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use quiz_session::{
    build_client, AuthError, ClientConfig, ConversationMessage, CredentialStore, Difficulty,
    GatewayError, GenerationRequest, HttpGateway, JwtTokenProvider, Phase, QuestionType,
    QuizGateway, QuizSession, TokenProvider,
};
use secrecy::Secret;
use serde_json::json;
use url::Url;

fn config(server: &Server) -> ClientConfig {
    ClientConfig::new(Url::parse(&server.url()).unwrap())
}

fn store_with(access: &str, refresh: &str) -> Arc<CredentialStore> {
    let store = Arc::new(CredentialStore::new());
    store.install(
        Secret::new(access.to_owned()),
        Some(Secret::new(refresh.to_owned())),
    );
    store
}

fn gateway(config: &ClientConfig, store: Arc<CredentialStore>) -> HttpGateway {
    let client = build_client(config).unwrap();
    let tokens = Arc::new(JwtTokenProvider::new(client.clone(), config, store));

    HttpGateway::new(client, config, tokens)
}

fn generation_request() -> GenerationRequest {
    GenerationRequest {
        num_questions: 2,
        difficulty: Difficulty::Medium,
        question_type: QuestionType::Multiple,
    }
}

#[tokio::test]
async fn generation_sends_bearer_and_returns_content() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chats/7/generate-quiz/")
        .match_header("authorization", "Bearer access-1")
        .match_body(Matcher::Json(json!({
            "num_questions": 2,
            "difficulty": "medium",
            "question_type": "multiple"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(json!({"id": 3, "role": "assistant", "content": "[]"}).to_string())
        .create_async()
        .await;
    let gateway = gateway(&config(&server), store_with("access-1", "refresh-1"));

    let payload = gateway
        .request_generation(7, &generation_request())
        .await
        .unwrap();

    assert_eq!(payload, "[]");
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chats/7/generate-quiz/")
        .with_status(500)
        .with_body(json!({"detail": "LLM down"}).to_string())
        .create_async()
        .await;
    let gateway = gateway(&config(&server), store_with("access-1", "refresh-1"));

    let result = gateway.request_generation(7, &generation_request()).await;

    assert!(matches!(result, Err(GatewayError::RequestRejected(500))));
}

#[tokio::test]
async fn success_with_unexpected_body_is_invalid_response() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chats/7/quiz-summary/")
        .with_status(201)
        .with_body("not json")
        .create_async()
        .await;
    let gateway = gateway(&config(&server), store_with("access-1", "refresh-1"));

    let result = gateway.request_summary(7).await;

    assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
}

#[tokio::test]
async fn unauthorized_refreshes_once_and_resends() {
    let mut server = Server::new_async().await;
    let stale = server
        .mock("POST", "/api/chats/7/quiz-summary/")
        .match_header("authorization", "Bearer access-1")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/token/refresh/")
        .match_body(Matcher::Json(json!({"refresh": "refresh-1"})))
        .with_status(200)
        .with_body(json!({"access": "access-2"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let fresh = server
        .mock("POST", "/api/chats/7/quiz-summary/")
        .match_header("authorization", "Bearer access-2")
        .match_body(Matcher::Json(json!({})))
        .with_status(201)
        .with_body(json!({"role": "assistant", "content": "Keep going"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let gateway = gateway(&config(&server), store_with("access-1", "refresh-1"));

    let summary = gateway.request_summary(7).await.unwrap();

    assert_eq!(summary, ConversationMessage::assistant("Keep going"));
    stale.assert_async().await;
    refresh.assert_async().await;
    fresh.assert_async().await;
}

#[tokio::test]
async fn second_unauthorized_gives_up() {
    let mut server = Server::new_async().await;
    let summary = server
        .mock("POST", "/api/chats/7/quiz-summary/")
        .with_status(401)
        .expect(2)
        .create_async()
        .await;
    server
        .mock("POST", "/token/refresh/")
        .with_status(200)
        .with_body(json!({"access": "access-2"}).to_string())
        .create_async()
        .await;
    let gateway = gateway(&config(&server), store_with("access-1", "refresh-1"));

    let result = gateway.request_summary(7).await;

    assert!(matches!(
        result,
        Err(GatewayError::Auth(AuthError::Unauthorized))
    ));
    summary.assert_async().await;
}

#[tokio::test]
async fn rejected_refresh_clears_credentials() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/chats/7/messages/")
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/token/refresh/")
        .with_status(401)
        .create_async()
        .await;
    let store = store_with("access-1", "refresh-1");
    let gateway = gateway(&config(&server), Arc::clone(&store));

    let result = gateway.fetch_messages(7).await;

    assert!(matches!(
        result,
        Err(GatewayError::Auth(AuthError::RefreshRejected(401)))
    ));
    assert!(!store.is_installed());
}

#[tokio::test]
async fn missing_credentials_never_hit_the_network() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chats/7/quiz-summary/")
        .expect(0)
        .create_async()
        .await;
    let gateway = gateway(&config(&server), Arc::new(CredentialStore::new()));

    let result = gateway.request_summary(7).await;

    assert!(matches!(
        result,
        Err(GatewayError::Auth(AuthError::MissingCredentials))
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn expired_access_token_is_refreshed_before_sending() {
    let mut server = Server::new_async().await;
    let refresh = server
        .mock("POST", "/token/refresh/")
        .with_status(200)
        .with_body(json!({"access": "access-2"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let messages = server
        .mock("GET", "/api/chats/7/messages/")
        .match_header("authorization", "Bearer access-2")
        .with_status(200)
        .with_body(json!([{"role": "user", "content": "hi"}]).to_string())
        .create_async()
        .await;
    let config = config(&server).with_access_token_lifetime(Duration::ZERO);
    let gateway = gateway(&config, store_with("access-1", "refresh-1"));

    let history = gateway.fetch_messages(7).await.unwrap();

    assert_eq!(history, vec![ConversationMessage::user("hi")]);
    refresh.assert_async().await;
    messages.assert_async().await;
}

#[tokio::test]
async fn send_message_returns_reply() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chats/7/messages/")
        .match_body(Matcher::Json(json!({"message": "What is OCR?"})))
        .with_status(200)
        .with_body(json!({"reply": "<think>x</think>Text recognition."}).to_string())
        .create_async()
        .await;
    let gateway = gateway(&config(&server), store_with("access-1", "refresh-1"));

    let reply = gateway.send_message(7, "What is OCR?").await.unwrap();

    assert_eq!(reply, "<think>x</think>Text recognition.");
}

#[tokio::test]
async fn login_and_verify() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/token/")
        .match_body(Matcher::Json(json!({"username": "ana", "password": "pw"})))
        .with_status(200)
        .with_body(json!({"access": "access-1", "refresh": "refresh-1"}).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/token/verify/")
        .match_body(Matcher::Json(json!({"token": "access-1"})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    let config = config(&server);
    let store = Arc::new(CredentialStore::new());
    let provider = JwtTokenProvider::new(build_client(&config).unwrap(), &config, store);

    provider
        .login("ana", &Secret::new("pw".to_owned()))
        .await
        .unwrap();

    assert!(provider.verify().await.unwrap());
    assert_eq!(provider.ensure_valid_token().await.unwrap().expose(), "access-1");

    provider.logout();
    assert!(matches!(
        provider.ensure_valid_token().await,
        Err(AuthError::MissingCredentials)
    ));
}

#[tokio::test]
async fn expired_token_is_refreshed_only_once_per_request() {
    let mut server = Server::new_async().await;
    let refresh = server
        .mock("POST", "/token/refresh/")
        .with_status(200)
        .with_body(json!({"access": "access-2"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let summary = server
        .mock("POST", "/api/chats/7/quiz-summary/")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let config = config(&server).with_access_token_lifetime(Duration::ZERO);
    let gateway = gateway(&config, store_with("access-1", "refresh-1"));

    let result = gateway.request_summary(7).await;

    assert!(matches!(
        result,
        Err(GatewayError::Auth(AuthError::Unauthorized))
    ));
    refresh.assert_async().await;
    summary.assert_async().await;
}

#[tokio::test]
async fn undecodable_token_body_is_invalid_response() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/token/")
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;
    server
        .mock("POST", "/token/refresh/")
        .with_status(200)
        .with_body(json!({"token": "wrong-key"}).to_string())
        .create_async()
        .await;
    let config = config(&server);
    let store = store_with("access-1", "refresh-1");
    let provider = JwtTokenProvider::new(build_client(&config).unwrap(), &config, store);

    let login = provider.login("ana", &Secret::new("pw".to_owned())).await;
    let refresh = provider.refresh().await;

    assert!(matches!(login, Err(AuthError::InvalidResponse(_))));
    assert!(matches!(refresh, Err(AuthError::InvalidResponse(_))));
    assert_eq!(
        provider.ensure_valid_token().await.unwrap().expose(),
        "access-1"
    );
}

#[tokio::test]
async fn rejected_login() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/token/")
        .with_status(401)
        .create_async()
        .await;
    let config = config(&server);
    let store = Arc::new(CredentialStore::new());
    let provider = JwtTokenProvider::new(build_client(&config).unwrap(), &config, store);

    let result = provider.login("ana", &Secret::new("bad".to_owned())).await;

    assert!(matches!(result, Err(AuthError::LoginRejected(401))));
    assert!(!provider.store().is_installed());
}

#[tokio::test]
async fn full_quiz_round_over_http() {
    let mut server = Server::new_async().await;
    let quiz = json!([
        {"question": "Capital of France?", "options": ["Paris", "Lyon"]},
        {"question": "OCR reads images", "answer": true}
    ]);
    server
        .mock("POST", "/api/chats/7/generate-quiz/")
        .with_status(201)
        .with_body(json!({"role": "assistant", "content": quiz.to_string()}).to_string())
        .create_async()
        .await;
    let submit = server
        .mock("POST", "/api/chats/7/submit-quiz/")
        .match_body(Matcher::Json(json!({
            "quiz": [
                {"question": "Capital of France?", "options": ["Paris", "Lyon"]},
                {"question": "OCR reads images", "options": ["true", "false"]}
            ],
            "answers": {"0": "Paris", "1": "true"}
        })))
        .with_status(200)
        .with_body(
            json!({
                "saved_path": "/media/ana/quizzes/quiz_7.json",
                "review": {"role": "assistant", "content": "2/2 correct"}
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let session = QuizSession::new(
        7,
        gateway(&config(&server), store_with("access-1", "refresh-1")),
        20,
    );

    session
        .generate(2, Difficulty::Easy, QuestionType::Multiple)
        .await
        .unwrap();
    session.select_answer(0, "Paris").unwrap();
    session.select_answer(1, "true").unwrap();
    let graded = session.submit().await.unwrap();

    assert_eq!(graded.saved_artifact_ref, "/media/ana/quizzes/quiz_7.json");
    assert_eq!(session.phase(), Phase::Graded);
    assert_eq!(session.messages().len(), 2);
    submit.assert_async().await;
}
