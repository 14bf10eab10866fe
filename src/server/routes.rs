/// Request routing for the values endpoint
use log::error;

use crate::boards::SharedSnapshot;

const INDEX_PAGE: &str =
    "<html><head><meta http-equiv=\"refresh\" content=\"0; URL=/values\" /></head></html>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    fn new(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    /// Body is the reason phrase.
    pub fn plain(status: u16) -> Self {
        Self::new(status, "text/plain", reason(status))
    }

    /// Full HTTP/1.1 response with headers; the connection is closed after it.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            reason(self.status),
            self.content_type,
            self.body.len()
        );
        if self.status == 405 {
            out.push_str("Allow: GET\r\n");
        }
        out.push_str("\r\n");
        out.push_str(&self.body);
        out.into_bytes()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        431 => "Request Header Fields Too Large",
        _ => "Internal Server Error",
    }
}

/// Split "GET /values HTTP/1.1" into method and path (query string dropped).
pub fn parse_request_line(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let version = parts.next()?;
    if !version.starts_with("HTTP/") || parts.next().is_some() {
        return None;
    }
    let path = target.split('?').next().unwrap_or(target);
    Some((method, path))
}

pub fn route(request_line: &str, snapshot: &SharedSnapshot) -> Response {
    let Some((method, path)) = parse_request_line(request_line) else {
        return Response::plain(400);
    };

    match (method, path) {
        ("GET", "/") => Response::new(200, "text/html", INDEX_PAGE),
        ("GET", "/values") => match snapshot.to_json() {
            Ok(json) => Response::new(200, "application/json", json),
            Err(e) => {
                error!("Failed to serialize snapshot: {}", e);
                Response::plain(500)
            }
        },
        (_, "/") | (_, "/values") => Response::plain(405),
        _ => Response::plain(404),
    }
}
