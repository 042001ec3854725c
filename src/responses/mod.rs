pub mod errors;
pub mod html;

pub use errors::{error_to_response, html_error_response, ResultResp};

// Normal HTML response
pub use html::{html_response, html_with_status};
