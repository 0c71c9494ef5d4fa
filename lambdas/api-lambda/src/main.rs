mod http_handler;
mod pages;

use http_handler::function_handler;
use lambda_http::http::StatusCode;
use lambda_http::{run, service_fn, Body, Error, Response};
use std::sync::Arc;
use taskboard_shared::AppState;

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_http::tracing::init_default_subscriber();

    let state = Arc::new(AppState::from_env().await?);

    run(service_fn(move |event| {
        let state = state.clone();
        async move {
            match function_handler(event, state).await {
                Ok(resp) => Ok::<Response<Body>, Error>(resp),
                // Expected failures all resolve to redirects inside the
                // handler; anything surfacing here is an internal error.
                Err(err) => {
                    tracing::error!("Unhandled error: {}", err);
                    let resp = Response::builder()
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                        .header("Content-Type", "text/html; charset=utf-8")
                        .body(Body::from(pages::error_page(&err.to_string())))
                        .map_err(Box::new)?;
                    Ok(resp)
                }
            }
        }
    }))
    .await
}
