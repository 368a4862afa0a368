use scenarist_core::{
    GeminiClient, GenerativeBackend, ScenaristError, Settings,
    types::{
        Attachment, ChatRole, ChatTurn, GenerateInput, GenerateOptions, GenerateRequest,
    },
};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

const TEXT_PATH: &str = "/v1beta/models/gemini-3-pro-preview:generateContent";
const IMAGE_PATH: &str = "/v1beta/models/gemini-3-pro-image-preview:generateContent";
const CHAT_PATH: &str = "/v1beta/models/gemini-3-flash-preview:generateContent";

fn settings(server: &MockServer) -> Settings {
    Settings {
        api_key: Some("test-key".to_string()),
        api_base: server.uri(),
        ..Settings::default()
    }
}

fn request(text: &str, attachments: Vec<Attachment>) -> GenerateRequest {
    GenerateRequest {
        input: GenerateInput {
            text: text.to_string(),
            attachments,
        },
        options: GenerateOptions::default(),
    }
}

fn text_reply(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

async fn received_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).unwrap()
}

#[tokio::test]
async fn scenario_request_carries_attachments_and_search() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{
                    "text": "```json\n{\"titleOptions\":[\"Five gadgets\"],\"shots\":[{\"t\":\"00:00\",\"frame\":\"Close-up\"}]}\n```"
                }]},
                "groundingMetadata": { "groundingChunks": [
                    { "web": { "title": "Review", "uri": "https://reviews.example/x" } }
                ]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::from_settings(&settings(&server)).unwrap();
    let attachment = Attachment {
        name: "notes.txt".to_string(),
        mime_type: "text/plain".to_string(),
        data_base64: "aGVsbG8=".to_string(),
    };
    let result = client
        .generate_scenario(&request("gadgets under $20", vec![attachment]))
        .await
        .unwrap();

    assert_eq!(result.title_options, vec!["Five gadgets".to_string()]);
    assert_eq!(result.shots[0].frame, "Close-up");
    assert!(result.script_markdown.is_empty());
    let sources = result.sources.unwrap();
    assert_eq!(sources[0].uri, "https://reviews.example/x");

    let body = received_body(&server).await;
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["mimeType"], "text/plain");
    assert_eq!(parts[0]["inlineData"]["data"], "aGVsbG8=");
    assert!(parts[1]["text"].as_str().unwrap().contains("gadgets under $20"));
    assert_eq!(body["tools"][0]["googleSearch"], json!({}));
    assert!(body["generationConfig"]["responseMimeType"].is_null());
    assert_eq!(
        body["generationConfig"]["thinkingConfig"]["thinkingBudget"],
        31000
    );
    assert!(body["systemInstruction"]["parts"][0]["text"].is_string());
}

#[tokio::test]
async fn without_search_json_mode_is_requested() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("{}")))
        .mount(&server)
        .await;

    let settings = Settings {
        search_grounding: false,
        ..settings(&server)
    };
    let client = GeminiClient::from_settings(&settings).unwrap();
    let result = client
        .generate_scenario(&request("topic", Vec::new()))
        .await
        .unwrap();

    assert!(result.sources.is_none());
    let body = received_body(&server).await;
    assert!(body.get("tools").is_none());
    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
}

#[tokio::test]
async fn empty_reply_yields_empty_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let client = GeminiClient::from_settings(&settings(&server)).unwrap();
    let result = client
        .generate_scenario(&request("topic", Vec::new()))
        .await
        .unwrap();

    assert!(result.title_options.is_empty());
    assert!(result.shots.is_empty());
}

#[tokio::test]
async fn prose_reply_is_a_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(text_reply("Sorry, I can't do that.")),
        )
        .mount(&server)
        .await;

    let client = GeminiClient::from_settings(&settings(&server)).unwrap();
    let err = client
        .generate_scenario(&request("topic", Vec::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, ScenaristError::JsonError(_)));
}

#[tokio::test]
async fn error_status_surfaces_service_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND" }
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::from_settings(&settings(&server)).unwrap();
    let err = client
        .generate_scenario(&request("topic", Vec::new()))
        .await
        .unwrap_err();

    match err {
        ScenaristError::ApiError { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Requested entity was not found.");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn plain_text_error_body_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = GeminiClient::from_settings(&settings(&server)).unwrap();
    let err = client
        .generate_scenario(&request("topic", Vec::new()))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Gemini API returned 502: bad gateway");
}

#[tokio::test]
async fn thumbnail_returns_first_inline_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(IMAGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your image" },
                { "inlineData": { "mimeType": "image/jpeg", "data": "/9j/AA==" } }
            ]}}]
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::from_settings(&settings(&server)).unwrap();
    let image = client.generate_thumbnail("neon skyline").await.unwrap();

    assert_eq!(image.mime_type, "image/jpeg");
    assert_eq!(image.data_uri(), "data:image/jpeg;base64,/9j/AA==");

    let body = received_body(&server).await;
    assert_eq!(
        body["contents"][0]["parts"][0]["text"],
        "Cinematic commercial photography: neon skyline"
    );
    assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
    assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "1K");
}

#[tokio::test]
async fn thumbnail_without_image_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(IMAGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("no can do")))
        .mount(&server)
        .await;

    let client = GeminiClient::from_settings(&settings(&server)).unwrap();
    let err = client.generate_thumbnail("anything").await.unwrap_err();

    assert!(matches!(err, ScenaristError::NoImage));
}

#[tokio::test]
async fn chat_sends_history_with_roles() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("Open with the price.")))
        .mount(&server)
        .await;

    let client = GeminiClient::from_settings(&settings(&server)).unwrap();
    let history = vec![
        ChatTurn {
            role: ChatRole::Model,
            text: "Hi!".to_string(),
        },
        ChatTurn {
            role: ChatRole::User,
            text: "Best hook?".to_string(),
        },
    ];
    let reply = client.chat("Be brief.", &history).await.unwrap();

    assert_eq!(reply, "Open with the price.");
    let body = received_body(&server).await;
    assert_eq!(body["contents"][0]["role"], "model");
    assert_eq!(body["contents"][1]["role"], "user");
    assert_eq!(body["contents"][1]["parts"][0]["text"], "Best hook?");
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
}

#[test]
fn missing_key_is_reported() {
    let settings = Settings {
        api_key: None,
        ..Settings::default()
    };
    let err = GeminiClient::from_settings(&settings).err().unwrap();
    assert!(matches!(err, ScenaristError::MissingApiKey { .. }));
}
