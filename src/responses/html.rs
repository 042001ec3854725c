use crate::errors::ServerError;
use crate::responses::ResultResp;
use astra::{Body, ResponseBuilder};
use maud::Markup;

pub fn html_response(markup: Markup) -> ResultResp {
    html_with_status(200, markup)
}

pub fn html_with_status(status: u16, markup: Markup) -> ResultResp {
    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Body::from(markup.into_string()))
        .map_err(|_| ServerError::InternalError)
}
