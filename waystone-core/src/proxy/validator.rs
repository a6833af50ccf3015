//! Response admissibility
//!
//! Decides whether a response may be written to the cache. Only plain
//! same-origin successes qualify; in strict mode the declared content type
//! must also match what the request asked for, so an HTML error page (captive
//! portal, misconfigured origin) never lands under a script or stylesheet key.

use crate::http::{Destination, ResponseType, StoredResponse};

/// Whether `response` may be persisted for a request of class `destination`
pub fn is_admissible(response: Option<&StoredResponse>, destination: Destination, strict: bool) -> bool {
    let Some(response) = response else {
        return false;
    };
    if !response.is_ok() || response.redirected || response.response_type != ResponseType::Basic {
        return false;
    }
    if !strict {
        return true;
    }
    content_type_matches(response.content_type(), destination)
}

fn content_type_matches(content_type: Option<&str>, destination: Destination) -> bool {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    match destination {
        Destination::Script => ct.contains("javascript"),
        Destination::Style => ct.contains("css"),
        Destination::Image => ct.starts_with("image/"),
        Destination::Document => ct.contains("html"),
        Destination::Font | Destination::Other => true,
    }
}
