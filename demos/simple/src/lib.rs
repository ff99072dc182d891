use std::convert::Infallible;

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    http::{Request, Response, StatusCode},
    BoxError, Router,
};
use futures_util::stream;
use minijinja::Environment;
use serde::Serialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_etag_hash::{EtagHashLayer, HashOptions, MinijinjaRenderer, ResponseSource, Variety};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>{{ title }}</title></head>
  <body>
    <h1>{{ title }}</h1>
    <ul>
    {% for page in pages %}
      <li><a href="{{ page.path }}">{{ page.path }}</a>: {{ page.variety }}</li>
    {% endfor %}
    </ul>
  </body>
</html>
"#;

/// 1x1 transparent gif
pub const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

#[derive(Clone, Debug, Serialize)]
pub struct Page {
    pub path: &'static str,
    pub variety: Variety,
}

#[derive(Clone, Debug, Serialize)]
pub struct Index {
    pub title: &'static str,
    pub pages: Vec<Page>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Status {
    pub ok: bool,
    pub version: &'static str,
}

pub fn templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("index.html", INDEX_TEMPLATE)?;
    Ok(env)
}

pub fn app(env: Environment<'static>) -> Router {
    let options = HashOptions::default().with_varieties([
        Variety::Plain,
        Variety::Buffer,
        Variety::View,
        Variety::Stream,
    ]);

    Router::new()
        .fallback_service(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_etag_hash_layer_err))
                .layer(EtagHashLayer::with_renderer(
                    options,
                    MinijinjaRenderer::new(env),
                ))
                .service_fn(pages),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

pub async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let env = templates().unwrap();
    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();
    axum::serve(listener, app(env).into_make_service())
        .await
        .unwrap();
}

pub async fn handle_etag_hash_layer_err<T: Into<BoxError>>(err: T) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.into().to_string())
}

/// Serves every page as a different response variety
pub async fn pages(req: Request<Body>) -> Result<Response<ResponseSource<Body>>, Infallible> {
    let source = match req.uri().path() {
        "/" => ResponseSource::view(
            "index.html",
            Index {
                title: "etag hash demo",
                pages: vec![
                    Page {
                        path: "/hello",
                        variety: Variety::Plain,
                    },
                    Page {
                        path: "/status",
                        variety: Variety::Plain,
                    },
                    Page {
                        path: "/pixel.gif",
                        variety: Variety::Buffer,
                    },
                    Page {
                        path: "/stream",
                        variety: Variety::Stream,
                    },
                ],
            },
        ),
        "/hello" => Ok(ResponseSource::text("hello")),
        "/status" => ResponseSource::json(Status {
            ok: true,
            version: env!("CARGO_PKG_VERSION"),
        }),
        "/pixel.gif" => Ok(ResponseSource::buffer(PIXEL_GIF)),
        "/stream" => Ok(ResponseSource::stream(Body::from_stream(stream::iter(
            ["ab", "cd", "ef"].map(Ok::<_, Infallible>),
        )))),
        _ => {
            let mut resp = ResponseSource::text("not found").into_response();
            *resp.status_mut() = StatusCode::NOT_FOUND;
            return Ok(resp);
        }
    };

    Ok(source.map(ResponseSource::into_response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to build response");
        let mut resp = ResponseSource::text("internal server error").into_response();
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        resp
    }))
}
