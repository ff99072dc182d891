use std::{
    future::{ready, Ready},
    sync::Arc,
    task::{Context, Poll},
};

use minijinja::Environment;
use tower_service::Service;

use crate::ViewSource;

/// Renders views from a shared minijinja [`Environment`].
///
/// The view's template is looked up by name and rendered with its context.
/// Rendering is synchronous, the returned future is always ready.
#[derive(Clone, Debug)]
pub struct MinijinjaRenderer {
    env: Arc<Environment<'static>>,
}

impl MinijinjaRenderer {
    pub fn new(env: Environment<'static>) -> Self {
        Self::from_shared(Arc::new(env))
    }

    pub fn from_shared(env: Arc<Environment<'static>>) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &Environment<'static> {
        &self.env
    }

    pub fn render(&self, view: &ViewSource) -> Result<String, minijinja::Error> {
        self.env
            .get_template(&view.template)?
            .render(&view.context)
    }
}

impl Service<ViewSource> for MinijinjaRenderer {
    type Response = String;

    type Error = minijinja::Error;

    type Future = Ready<Result<String, minijinja::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, view: ViewSource) -> Self::Future {
        ready(self.render(&view))
    }
}
