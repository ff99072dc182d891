use std::{
    collections::VecDeque,
    convert::Infallible,
    future::{ready, Ready},
    io,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use bytes::Bytes;
use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, TRAILER},
    HeaderValue, Request, Response,
};
use http_body::{Body, Frame};
use http_body_util::BodyExt;
use serde_json::json;
use sha1::{Digest, Sha1};
use tower::{ServiceBuilder, ServiceExt};
use tower_etag_hash::{
    encoded_digest, Algorithm, DigestEncoding, EtagHashLayer, EtagHashResBody,
    EtagHashServiceError, HashOptions, MarshalError, NoViewRendererError,
    ResponseSource, Variety, ViewSource,
};
use tower_service::Service;

/// Stream body yielding the given chunks one poll at a time
#[derive(Debug)]
struct Chunks(VecDeque<Bytes>);

impl Chunks {
    fn new(chunks: &[&'static str]) -> Self {
        Self(chunks.iter().map(|c| Bytes::from_static(c.as_bytes())).collect())
    }
}

impl Body for Chunks {
    type Data = Bytes;

    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        Poll::Ready(self.0.pop_front().map(|c| Ok(Frame::data(c))))
    }
}

/// Counts calls, renders `<p>{name}</p>`
#[derive(Clone, Default)]
struct CountingRenderer(Arc<AtomicUsize>);

impl Service<ViewSource> for CountingRenderer {
    type Response = String;

    type Error = Infallible;

    type Future = Ready<Result<String, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, view: ViewSource) -> Self::Future {
        self.0.fetch_add(1, Ordering::SeqCst);
        let name = view.context["name"].as_str().unwrap_or_default();
        ready(Ok(format!("<p>{name}</p>")))
    }
}

async fn respond_with<R, B>(
    layer: EtagHashLayer<R>,
    source: ResponseSource<B>,
) -> Result<Response<EtagHashResBody<B>>, EtagHashServiceError<Infallible, R::Error>>
where
    R: Service<ViewSource, Response = String> + Clone,
{
    let mut source = Some(source);
    ServiceBuilder::new()
        .layer(layer)
        .service_fn(move |_req: Request<()>| {
            let resp = source.take().map(ResponseSource::into_response);
            async move { Ok::<_, Infallible>(resp.expect("service called once")) }
        })
        .oneshot(Request::new(()))
        .await
}

fn sha1_hex(contents: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(&Sha1::digest(contents))
}

fn sha1_base64(contents: &[u8]) -> String {
    data_encoding::BASE64.encode(&Sha1::digest(contents))
}

fn strong(digest: &str) -> String {
    format!("\"{digest}\"")
}

#[tokio::test]
async fn plain_string_sha1_hex() {
    let opts = HashOptions::from_json(r#"{"algo": "sha1", "encoding": "hex"}"#).unwrap();
    let resp = respond_with(EtagHashLayer::new(opts), ResponseSource::<Chunks>::text("hello"))
        .await
        .unwrap();

    assert_eq!(resp.headers().get(ETAG).unwrap(), strong(&sha1_hex(b"hello")).as_str());
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "hello");
}

#[tokio::test]
async fn buffer_sha1_base64() {
    let opts = HashOptions::default()
        .with_algorithm(Algorithm::Sha1)
        .with_encoding(DigestEncoding::Base64);
    let resp = respond_with(
        EtagHashLayer::new(opts),
        ResponseSource::<Chunks>::buffer(vec![0x00u8, 0x01, 0x02]),
    )
    .await
    .unwrap();

    assert_eq!(
        resp.headers().get(ETAG).unwrap(),
        strong(&sha1_base64(&[0x00, 0x01, 0x02])).as_str()
    );
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, &[0x00u8, 0x01, 0x02][..]);
}

#[tokio::test]
async fn plain_json_is_hashed_as_canonical_text() {
    let resp = respond_with(
        EtagHashLayer::new(HashOptions::default()),
        ResponseSource::<Chunks>::json(json!({"z": 1, "a": [true, null]})).unwrap(),
    )
    .await
    .unwrap();

    let expected = br#"{"a":[true,null],"z":1}"#;
    assert_eq!(
        resp.headers().get(ETAG).unwrap(),
        strong(&sha1_base64(expected)).as_str()
    );
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, &expected[..]);
}

#[tokio::test]
async fn stream_gets_etag_trailer() {
    let opts = HashOptions::default().with_varieties([Variety::Stream]);
    let resp = respond_with(
        EtagHashLayer::new(opts),
        ResponseSource::stream(Chunks::new(&["ab", "cd"])),
    )
    .await
    .unwrap();

    // announced in the head, before any of the body is polled
    assert_eq!(resp.headers().get(TRAILER).unwrap(), "etag");
    assert!(!resp.headers().contains_key(ETAG));
    assert!(resp.body().size_hint().exact().is_none());

    let collected = resp.into_body().collect().await.unwrap();
    let trailers = collected.trailers().cloned().unwrap();
    assert_eq!(collected.to_bytes(), "abcd");
    assert_eq!(trailers.get(ETAG).unwrap(), sha1_base64(b"abcd").as_str());
}

#[tokio::test]
async fn stream_incremental_hash_matches_one_shot() {
    let opts = HashOptions::default()
        .with_algorithm(Algorithm::Sha512)
        .with_encoding(DigestEncoding::Hex)
        .with_varieties([Variety::Stream]);
    let resp = respond_with(
        EtagHashLayer::new(opts),
        ResponseSource::stream(Chunks::new(&["c1", "", "c2", "c3"])),
    )
    .await
    .unwrap();

    let trailers = resp.into_body().collect().await.unwrap().trailers().cloned().unwrap();
    let one_shot = encoded_digest(opts.algorithm(), opts.encoding(), b"c1c2c3");
    assert_eq!(trailers.get(ETAG).unwrap(), one_shot.as_str());
}

#[tokio::test]
async fn stream_drops_content_length() {
    let opts = HashOptions::default().with_varieties([Variety::Stream]);
    let mut source = Some(ResponseSource::stream(Chunks::new(&["abcd"])));
    let resp = ServiceBuilder::new()
        .layer(EtagHashLayer::new(opts))
        .service_fn(move |_req: Request<()>| {
            let mut resp = source.take().expect("service called once").into_response();
            resp.headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from_static("4"));
            async move { Ok::<_, Infallible>(resp) }
        })
        .oneshot(Request::new(()))
        .await
        .unwrap();

    assert!(!resp.headers().contains_key(CONTENT_LENGTH));
    assert_eq!(resp.headers().get(TRAILER).unwrap(), "etag");
}

#[tokio::test]
async fn disabled_stream_is_untouched() {
    let resp = respond_with(
        EtagHashLayer::new(HashOptions::default()),
        ResponseSource::stream(Chunks::new(&["ab", "cd"])),
    )
    .await
    .unwrap();

    assert!(!resp.headers().contains_key(TRAILER));
    let collected = resp.into_body().collect().await.unwrap();
    assert!(collected.trailers().is_none());
    assert_eq!(collected.to_bytes(), "abcd");
}

#[tokio::test]
async fn disabled_plain_has_no_validator() {
    let opts = HashOptions::from_json(r#"{"varieties": ["buffer"]}"#).unwrap();
    let resp = respond_with(EtagHashLayer::new(opts), ResponseSource::<Chunks>::text("hello"))
        .await
        .unwrap();
    assert!(!resp.headers().contains_key(ETAG));

    // a bare number would fail marshalling, so this also shows it was never marshalled
    let opts = HashOptions::from_json(r#"{"varieties": ["buffer"]}"#).unwrap();
    let resp = respond_with(EtagHashLayer::new(opts), ResponseSource::<Chunks>::Plain(json!(7)))
        .await
        .unwrap();
    assert!(!resp.headers().contains_key(ETAG));
    assert_eq!(resp.into_body().collect().await.unwrap().to_bytes(), "7");
}

#[tokio::test]
async fn plain_number_is_a_contract_violation() {
    let err = respond_with(
        EtagHashLayer::new(HashOptions::default()),
        ResponseSource::<Chunks>::Plain(json!(42)),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        EtagHashServiceError::Marshal(MarshalError::PlainSource("number"))
    ));
}

#[tokio::test]
async fn invalid_configuration_fails_at_startup() {
    assert!(HashOptions::from_json(r#"{"algo": "not-a-real-hash"}"#).is_err());
    assert!(HashOptions::from_json(r#"{"encoding": "utf8"}"#).is_err());
    assert!(HashOptions::from_json(r#"{"varieties": ["plain", "file"]}"#).is_err());
}

#[tokio::test]
async fn view_rendered_once_and_hashed() {
    let renderer = CountingRenderer::default();
    let calls = renderer.0.clone();
    let opts = HashOptions::default().with_varieties([Variety::View]);
    let resp = respond_with(
        EtagHashLayer::with_renderer(opts, renderer),
        ResponseSource::<Chunks>::view("name.html", json!({"name": "ferris"})).unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        resp.headers().get(ETAG).unwrap(),
        strong(&sha1_base64(b"<p>ferris</p>")).as_str()
    );
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "<p>ferris</p>");
}

#[tokio::test]
async fn disabled_view_rendered_without_validator() {
    let renderer = CountingRenderer::default();
    let calls = renderer.0.clone();
    let resp = respond_with(
        EtagHashLayer::with_renderer(HashOptions::default(), renderer),
        ResponseSource::<Chunks>::view("name.html", json!({"name": "ferris"})).unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!resp.headers().contains_key(ETAG));
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "<p>ferris</p>");
}

#[tokio::test]
async fn view_without_renderer_fails() {
    let opts = HashOptions::default().with_varieties([Variety::View]);
    let err = respond_with(
        EtagHashLayer::new(opts),
        ResponseSource::<Chunks>::view("index.html", ()).unwrap(),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, EtagHashServiceError::Render(NoViewRendererError(ref t)) if t == "index.html")
    );
}

#[tokio::test]
async fn inner_error_propagates() {
    let err = ServiceBuilder::new()
        .layer(EtagHashLayer::new(HashOptions::default()))
        .service_fn(|_req: Request<()>| async {
            Err::<Response<ResponseSource<Chunks>>, _>(io::Error::new(
                io::ErrorKind::Other,
                "upstream down",
            ))
        })
        .oneshot(Request::new(()))
        .await
        .unwrap_err();
    assert!(matches!(err, EtagHashServiceError::Inner(ref e) if e.to_string() == "upstream down"));
    assert_eq!(err.to_string(), "upstream down");
}

#[cfg(feature = "minijinja-renderer")]
mod minijinja_views {
    use minijinja::Environment;
    use tower_etag_hash::MinijinjaRenderer;

    use super::*;

    #[tokio::test]
    async fn minijinja_view() {
        let mut env = Environment::new();
        env.add_template("hello.html", "Hello {{ name }}!").unwrap();
        let opts = HashOptions::default()
            .with_encoding(DigestEncoding::Hex)
            .with_varieties([Variety::View]);
        let resp = respond_with(
            EtagHashLayer::with_renderer(opts, MinijinjaRenderer::new(env)),
            ResponseSource::<Chunks>::view("hello.html", json!({"name": "world"})).unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(
            resp.headers().get(ETAG).unwrap(),
            strong(&sha1_hex(b"Hello world!")).as_str()
        );
    }

    #[tokio::test]
    async fn render_error_propagates() {
        let opts = HashOptions::default().with_varieties([Variety::View]);
        let err = respond_with(
            EtagHashLayer::with_renderer(opts, MinijinjaRenderer::new(Environment::new())),
            ResponseSource::<Chunks>::view("missing.html", ()).unwrap(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EtagHashServiceError::Render(_)));
    }
}
