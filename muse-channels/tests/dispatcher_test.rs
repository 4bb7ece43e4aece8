//! End-to-end message handling against mock Telegram and OpenAI servers.

use muse_channels::{ChannelMessage, Dispatcher, PhotoSize, ReplyContext, Sender, TelegramChannel};
use muse_common::config::Config;
use muse_gateway::{OpenAIImageProvider, OpenAIProvider};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123:ABC";

struct Servers {
    telegram: MockServer,
    openai: MockServer,
}

impl Servers {
    async fn start() -> Self {
        let servers = Self {
            telegram: MockServer::start().await,
            openai: MockServer::start().await,
        };
        // Progress indicators are accepted but not asserted on
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendChatAction")))
            .respond_with(ok(json!(true)))
            .mount(&servers.telegram)
            .await;
        servers
    }

    fn dispatcher(&self) -> Dispatcher {
        let mut config = Config::default();
        config.telegram.api_base = self.telegram.uri();
        config.openai.base_url = self.openai.uri();
        config.retry.backoff_ms = 10;

        let timeout = Duration::from_secs(5);
        let channel = Arc::new(TelegramChannel::new(TOKEN.into(), &config.telegram).unwrap());
        let chat = Arc::new(
            OpenAIProvider::with_base_url("sk-test", &config.openai.base_url, timeout).unwrap(),
        );
        let images = Arc::new(
            OpenAIImageProvider::with_base_url("sk-test", &config.openai.base_url, timeout)
                .unwrap(),
        );
        Dispatcher::new(Arc::new(config), channel, chat, images).unwrap()
    }
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result }))
}

fn message(text: &str) -> ChannelMessage {
    ChannelMessage {
        id: 1,
        chat_id: 555,
        sender: Sender {
            id: 42,
            username: Some("olena".into()),
            full_name: "Olena K".into(),
        },
        text: text.into(),
        reply_to: None,
        timestamp: 0,
        trace_id: "e2e".into(),
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbImage::from_pixel(width, height, image::Rgb([200, 80, 40]))
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[tokio::test]
async fn test_chat_message_round_trip() {
    let servers = Servers::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [
                { "role": "system" },
                { "role": "user", "content": "Привіт, як справи?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": [{
                "message": { "role": "assistant", "content": "Все добре \u{2014} дякую!" },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&servers.openai)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 555, "text": "Все добре - дякую!" })))
        .respond_with(ok(json!({ "message_id": 2 })))
        .expect(1)
        .mount(&servers.telegram)
        .await;

    servers.dispatcher().process(message("Привіт, як справи?")).await;
}

#[tokio::test]
async fn test_chat_failure_sends_apology() {
    let servers = Servers::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&servers.openai)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({ "text": "⚠️ Помилка OpenAI. Спробуйте пізніше." })))
        .respond_with(ok(json!({ "message_id": 2 })))
        .expect(1)
        .mount(&servers.telegram)
        .await;

    servers.dispatcher().process(message("hello")).await;
}

#[tokio::test]
async fn test_image_request_round_trip() {
    let servers = Servers::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(body_partial_json(json!({
            "model": "dall-e-3",
            "prompt": "High-resolution professional image, realistic style, 4k: draw a sunset over mountains",
            "n": 1,
            "size": "1024x1024"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "url": "https://images.example/sunset.png" }]
        })))
        .expect(1)
        .mount(&servers.openai)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendPhoto")))
        .and(body_partial_json(json!({
            "chat_id": 555,
            "photo": "https://images.example/sunset.png",
            "caption": "🎨 draw a sunset over mountains"
        })))
        .respond_with(ok(json!({ "message_id": 3 })))
        .expect(1)
        .mount(&servers.telegram)
        .await;

    servers
        .dispatcher()
        .process(message("draw a sunset over mountains"))
        .await;
}

#[tokio::test]
async fn test_photo_edit_round_trip() {
    let servers = Servers::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/getFile")))
        .and(body_partial_json(json!({ "file_id": "large-photo" })))
        .respond_with(ok(json!({ "file_path": "photos/file_9.png" })))
        .expect(1)
        .mount(&servers.telegram)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/file/bot{TOKEN}/photos/file_9.png")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(64, 48)))
        .expect(1)
        .mount(&servers.telegram)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/images/edits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "url": "https://images.example/snowy.png" }]
        })))
        .expect(1)
        .mount(&servers.openai)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendPhoto")))
        .and(body_partial_json(json!({
            "chat_id": 555,
            "photo": "https://images.example/snowy.png",
            "caption": "✏️ add snow"
        })))
        .respond_with(ok(json!({ "message_id": 4 })))
        .expect(1)
        .mount(&servers.telegram)
        .await;

    let mut msg = message("/edit add snow");
    msg.reply_to = Some(ReplyContext {
        message_id: 3,
        photos: vec![
            PhotoSize {
                file_id: "small-photo".into(),
                width: 90,
                height: 60,
                file_size: None,
            },
            PhotoSize {
                file_id: "large-photo".into(),
                width: 1280,
                height: 960,
                file_size: None,
            },
        ],
    });
    servers.dispatcher().process(msg).await;

    let requests = servers.openai.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("Professional photo editing, enhanced: add snow"));
    assert!(body.contains("dall-e-2"));
}

#[tokio::test]
async fn test_admin_log_after_requests() {
    let servers = Servers::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": [{ "message": { "content": "ok" }, "finish_reason": "stop" }]
        })))
        .mount(&servers.openai)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({
            "chat_id": 900,
            "parse_mode": "HTML",
            "text": "📜 Останні запити:\n<a href='tg://user?id=42'>@olena</a> -> GPT-4o: hello"
        })))
        .respond_with(ok(json!({ "message_id": 5 })))
        .expect(1)
        .mount(&servers.telegram)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ok(json!({ "message_id": 6 })))
        .mount(&servers.telegram)
        .await;

    let mut config = Config::default();
    config.telegram.api_base = servers.telegram.uri();
    config.openai.base_url = servers.openai.uri();
    config.admin.admin_id = Some(900);
    let timeout = Duration::from_secs(5);
    let dispatcher = Dispatcher::new(
        Arc::new(config.clone()),
        Arc::new(TelegramChannel::new(TOKEN.into(), &config.telegram).unwrap()),
        Arc::new(OpenAIProvider::with_base_url("sk-test", &config.openai.base_url, timeout).unwrap()),
        Arc::new(
            OpenAIImageProvider::with_base_url("sk-test", &config.openai.base_url, timeout)
                .unwrap(),
        ),
    )
    .unwrap();

    dispatcher.process(message("hello")).await;

    let mut admin = message("/admin");
    admin.sender.id = 900;
    admin.chat_id = 900;
    dispatcher.process(admin).await;
}
