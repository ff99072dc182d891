use std::{
    future::{ready, Ready},
    task::{Context, Poll},
};

use tower_service::Service;

use crate::ViewSource;

/// Renderer for services that never respond with the view variety.
///
/// Any view response it sees fails with [`NoViewRendererError`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct NoViewRenderer;

#[derive(Debug, thiserror::Error)]
#[error("no view renderer configured, cannot render template {0:?}")]
pub struct NoViewRendererError(pub String);

impl Service<ViewSource> for NoViewRenderer {
    type Response = String;

    type Error = NoViewRendererError;

    type Future = Ready<Result<String, NoViewRendererError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, view: ViewSource) -> Self::Future {
        ready(Err(NoViewRendererError(view.template)))
    }
}
