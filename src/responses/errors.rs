use crate::errors::ServerError;
use crate::templates::desktop_layout;
use astra::{Body, Response, ResponseBuilder};
use maud::html;
use tracing::error;

pub type ResultResp = Result<Response, ServerError>;

/// Convert a ServerError into a proper HTML response
pub fn error_to_response(err: ServerError) -> Response {
    match err {
        ServerError::NotFound => html_error_response(404, "Not Found"),
        ServerError::SourceUnavailable(msg) => html_error_response(503, &msg),
        ServerError::DbError(msg) => {
            error!(error = %msg, "database error while handling request");
            html_error_response(500, "Database Error")
        }
        ServerError::InternalError => html_error_response(500, "Internal Server Error"),
    }
}

/// Build an HTML error page
pub fn html_error_response(status: u16, message: &str) -> Response {
    let page = desktop_layout(
        &format!("Error {status}"),
        html! {
            main class="container" {
                h1 { "Error " (status) }
                p { (message) }
                p { a href="/" { "← Back to listings" } }
            }
        },
    );

    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Body::from(page.into_string()))
        .unwrap_or_else(|_| Response::new(Body::from("Internal Server Error")))
}
