use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

use services::ProduceError;
use services::assets::{
    AcquirePolicy, ArchiveConfig, ArchiveStore, AssetPayload, AssetPipeline, AssetProducer,
    DictionaryProducer, ImageProducer, RemoteAssetStore, SpeechProducer, TieredProducer,
};
use storage::repository::Storage;
use voca_core::model::{AssetKey, AssetKind};
use voca_core::time::fixed_clock;

#[derive(Clone, Default)]
struct Counters {
    image_calls: Arc<AtomicUsize>,
    speech_calls: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

async fn dictionary_cat(State(addr): State<SocketAddr>) -> Json<Value> {
    Json(json!([
        {
            "word": "cat",
            "phonetics": [
                { "text": "/kæt/", "audio": "" },
                { "audio": format!("http://{addr}/media/cat.mp3") }
            ]
        }
    ]))
}

async fn dictionary_missing() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "title": "No Definitions Found" })),
    )
}

async fn media_cat() -> &'static [u8] {
    b"mp3-cat"
}

async fn speech(State(counters): State<Counters>, Json(body): Json<Value>) -> impl IntoResponse {
    counters.speech_calls.fetch_add(1, Ordering::SeqCst);
    let text = body["text"].as_str().unwrap_or_default().to_owned();
    format!("tts:{text}").into_bytes()
}

async fn image(State(counters): State<Counters>, Json(body): Json<Value>) -> impl IntoResponse {
    let call = counters.image_calls.fetch_add(1, Ordering::SeqCst);
    if call == 0 {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Model is loading", "retry": true, "estimated_time": 0.01 })),
        )
            .into_response();
    }
    let word = body["word"].as_str().unwrap_or_default();
    format!("png:{word}").into_bytes().into_response()
}

async fn image_broken() -> impl IntoResponse {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid word" })))
}

async fn commit(State(counters): State<Counters>, Json(body): Json<Value>) -> Json<Value> {
    counters.commits.fetch_add(1, Ordering::SeqCst);
    let word = body["word"].as_str().unwrap_or_default();
    let ok = body["imageBase64"].as_str().is_some_and(|b| !b.is_empty());
    Json(json!({
        "success": ok,
        "url": format!("https://raw.test/images/{word}.png"),
        "path": format!("docs/images/{word}.png"),
    }))
}

async fn archived_dog() -> &'static [u8] {
    b"archived-dog"
}

async fn start_server() -> (SocketAddr, Counters, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let counters = Counters::default();

    let dictionary = Router::new()
        .route("/entries/en/cat", get(dictionary_cat))
        .route("/entries/en/zzz", get(dictionary_missing))
        .with_state(addr);
    let services = Router::new()
        .route("/media/cat.mp3", get(media_cat))
        .route("/speech", post(speech))
        .route("/image", post(image))
        .route("/image-broken", post(image_broken))
        .route("/commit", post(commit))
        .route("/raw/images/dog.png", get(archived_dog))
        .with_state(counters.clone());

    let app = dictionary.merge(services);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, counters, handle)
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{addr}{path}")).unwrap()
}

fn audio_key(word: &str) -> AssetKey {
    AssetKey::new(AssetKind::Audio, word).unwrap()
}

fn image_key(word: &str) -> AssetKey {
    AssetKey::new(AssetKind::Image, word).unwrap()
}

#[tokio::test]
async fn dictionary_downloads_first_recording() {
    let (addr, _counters, _handle) = start_server().await;
    let producer = DictionaryProducer::new(Client::new(), url(addr, "/entries/en"));

    let bytes = producer.produce(&audio_key("cat")).await.unwrap();
    assert_eq!(bytes, Bytes::from_static(b"mp3-cat"));

    let err = producer.produce(&audio_key("zzz")).await.unwrap_err();
    assert!(matches!(err, ProduceError::HttpStatus(StatusCode::NOT_FOUND)));
}

#[tokio::test]
async fn speech_only_runs_when_dictionary_misses() {
    let (addr, counters, _handle) = start_server().await;
    let client = Client::new();
    let tiered = TieredProducer::new()
        .with_tier(
            "dictionary",
            DictionaryProducer::new(client.clone(), url(addr, "/entries/en")),
        )
        .with_tier("speech", SpeechProducer::new(client, url(addr, "/speech")));

    assert_eq!(
        tiered.produce(&audio_key("cat")).await.unwrap(),
        Bytes::from_static(b"mp3-cat")
    );
    assert_eq!(counters.speech_calls.load(Ordering::SeqCst), 0);

    assert_eq!(
        tiered.produce(&audio_key("zzz")).await.unwrap(),
        Bytes::from_static(b"tts:zzz")
    );
    assert_eq!(counters.speech_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn image_proxy_warm_up_is_reported_with_hint() {
    let (addr, counters, _handle) = start_server().await;
    let producer = ImageProducer::new(Client::new(), url(addr, "/image"));

    let err = producer.produce(&image_key("cat")).await.unwrap_err();
    match err {
        ProduceError::WarmingUp { estimated_wait } => {
            assert_eq!(estimated_wait, Some(Duration::from_millis(10)));
        }
        other => panic!("expected warm-up, got {other:?}"),
    }

    let bytes = producer.produce(&image_key("cat")).await.unwrap();
    assert_eq!(bytes, Bytes::from_static(b"png:cat"));
    assert_eq!(counters.image_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pipeline_rides_out_warm_up_over_http() {
    let (addr, counters, _handle) = start_server().await;
    let storage = Storage::in_memory();
    let pipeline = AssetPipeline::new(
        AssetKind::Image,
        AcquirePolicy::image(),
        fixed_clock(),
        &storage,
    )
    .with_producer(ImageProducer::new(Client::new(), url(addr, "/image")));

    let payload = pipeline.acquire("cat", true).await.unwrap();
    assert_eq!(
        payload,
        Some(AssetPayload::Bytes(Bytes::from_static(b"png:cat")))
    );
    assert_eq!(counters.image_calls.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.cached_count().await.unwrap(), 1);
}

#[tokio::test]
async fn permanent_image_errors_are_soft() {
    let (addr, _counters, _handle) = start_server().await;
    let producer = ImageProducer::new(Client::new(), url(addr, "/image-broken"));
    let err = producer.produce(&image_key("cat")).await.unwrap_err();
    assert!(matches!(err, ProduceError::HttpStatus(StatusCode::BAD_REQUEST)));

    let storage = Storage::in_memory();
    let pipeline = AssetPipeline::new(
        AssetKind::Image,
        AcquirePolicy::image(),
        fixed_clock(),
        &storage,
    )
    .with_producer(producer);
    assert!(pipeline.acquire("cat", true).await.unwrap().is_none());
}

#[tokio::test]
async fn archive_probe_fetch_and_publish() {
    let (addr, counters, _handle) = start_server().await;
    let archive = ArchiveStore::new(
        Client::new(),
        &ArchiveConfig {
            commit_url: url(addr, "/commit"),
            raw_base: url(addr, "/raw/images"),
        },
    );

    let location = archive
        .probe(&image_key("Dog"))
        .await
        .unwrap()
        .expect("archived");
    assert_eq!(location, url(addr, "/raw/images/dog.png"));
    assert_eq!(
        archive.fetch(&location).await.unwrap(),
        Bytes::from_static(b"archived-dog")
    );

    assert!(archive.probe(&image_key("cat")).await.unwrap().is_none());

    let published = archive
        .publish(&image_key("cat"), &Bytes::from_static(b"png"))
        .await
        .unwrap();
    assert_eq!(published.as_str(), "https://raw.test/images/cat.png");
    assert_eq!(counters.commits.load(Ordering::SeqCst), 1);
}
