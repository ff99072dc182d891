use pin_project::pin_project;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower_service::Service;

use crate::{
    EtagHashResBody, EtagHashServiceError, Outcome, PendingView, ResponseHasher, ResponseSource,
    ViewSource,
};

#[pin_project]
pub struct EtagHashServiceFuture<F, R: Service<ViewSource>> {
    hasher: ResponseHasher,
    renderer: R,
    #[pin]
    state: EtagHashServiceFutureState<F, R::Future>,
}

impl<F, R: Service<ViewSource>> EtagHashServiceFuture<F, R> {
    pub fn new(hasher: ResponseHasher, renderer: R, inner_fut: F) -> Self {
        Self {
            hasher,
            renderer,
            state: EtagHashServiceFutureState::Inner { fut: inner_fut },
        }
    }
}

// using options just to take() and move fields to next state easily
#[pin_project(project = EtagHashServiceFutureStateProj)]
pub enum EtagHashServiceFutureState<F, RF> {
    Inner {
        #[pin]
        fut: F,
    },
    RenderBefore {
        view: Option<(PendingView, ViewSource)>,
    },
    Render {
        pending: Option<PendingView>,
        #[pin]
        fut: RF,
    },
}

impl<F, R, B, E> Future for EtagHashServiceFuture<F, R>
where
    F: Future<Output = Result<http::Response<ResponseSource<B>>, E>>,
    R: Service<ViewSource, Response = String>,
{
    type Output = Result<http::Response<EtagHashResBody<B>>, EtagHashServiceError<E, R::Error>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut curr_state = this.state;

        match curr_state.as_mut().project() {
            EtagHashServiceFutureStateProj::Inner { fut } => match fut.poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(result) => {
                    let resp = match result {
                        Ok(r) => r,
                        Err(e) => return Poll::Ready(Err(EtagHashServiceError::Inner(e))),
                    };
                    let view = match this.hasher.on_before_send(resp) {
                        Ok(Outcome::Ready(resp)) => return Poll::Ready(Ok(resp)),
                        Ok(Outcome::Render(pending, view)) => (pending, view),
                        Err(e) => return Poll::Ready(Err(EtagHashServiceError::Marshal(e))),
                    };
                    curr_state.set(EtagHashServiceFutureState::RenderBefore { view: Some(view) });
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            },
            EtagHashServiceFutureStateProj::RenderBefore { view } => {
                match this.renderer.poll_ready(cx) {
                    Poll::Pending => Poll::Pending,
                    Poll::Ready(result) => {
                        if let Err(e) = result {
                            return Poll::Ready(Err(EtagHashServiceError::Render(e)));
                        }
                        let (pending, view) = view.take().expect("polled after completion");
                        tracing::trace!(template = %view.template, "rendering view");
                        let fut = this.renderer.call(view);
                        curr_state.set(EtagHashServiceFutureState::Render {
                            pending: Some(pending),
                            fut,
                        });
                        cx.waker().wake_by_ref();
                        Poll::Pending
                    }
                }
            }
            EtagHashServiceFutureStateProj::Render { pending, fut } => match fut.poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(result) => {
                    let rendered = match result {
                        Ok(r) => r,
                        Err(e) => return Poll::Ready(Err(EtagHashServiceError::Render(e))),
                    };
                    let pending = pending.take().expect("polled after completion");
                    Poll::Ready(
                        this.hasher
                            .on_rendered(pending, rendered)
                            .map_err(EtagHashServiceError::Marshal),
                    )
                }
            },
        }
    }
}
