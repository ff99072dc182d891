use tower_layer::Layer;

use crate::{EtagHash, HashOptions, NoViewRenderer, ResponseHasher};

/// [`Layer`] that applies [`EtagHash`] to services
/// responding with [`ResponseSource`](crate::ResponseSource) bodies
#[derive(Clone, Debug)]
pub struct EtagHashLayer<R = NoViewRenderer> {
    hasher: ResponseHasher,
    renderer: R,
}

impl EtagHashLayer {
    /// For services that never respond with views
    pub fn new(options: HashOptions) -> Self {
        Self::with_renderer(options, NoViewRenderer)
    }
}

impl<R> EtagHashLayer<R> {
    pub fn with_renderer(options: HashOptions, renderer: R) -> Self {
        Self::from_hasher(ResponseHasher::new(options), renderer)
    }

    pub fn from_hasher(hasher: ResponseHasher, renderer: R) -> Self {
        Self { hasher, renderer }
    }
}

impl<R: Clone, S> Layer<S> for EtagHashLayer<R> {
    type Service = EtagHash<R, S>;

    fn layer(&self, inner: S) -> Self::Service {
        EtagHash::new(self.hasher.clone(), self.renderer.clone(), inner)
    }
}
