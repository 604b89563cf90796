//! Request handlers served by [`HttpConnection`](crate::connection::HttpConnection)

use async_trait::async_trait;
use std::error::Error;
use std::future::Future;

use http::{Request, Response};
use http_body::Body;

/// Turns one request into one response.
///
/// `ReqBody` is the body type the connection hands over, normally
/// [`ReqBody`](crate::protocol::body::ReqBody). An `Err` is answered with a bare 500.
#[async_trait]
pub trait Handler<ReqBody> {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

/// A [`Handler`] backed by an async function, built with [`make_handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<ReqBody, RespBody, Err, F, Fut> Handler<ReqBody> for HandlerFn<F>
where
    RespBody: Body,
    ReqBody: Send + 'static,
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, ReqBody, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<ReqBody>) -> Ret,
{
    HandlerFn { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::convert::Infallible;

    async fn method_echo(request: Request<()>) -> Result<Response<String>, Infallible> {
        Ok(Response::new(request.method().to_string()))
    }

    #[tokio::test]
    async fn function_handler_is_called() {
        let handler = make_handler(method_echo);
        let request = Request::builder().method("PUT").body(()).unwrap();

        let response = handler.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "PUT");
    }
}
