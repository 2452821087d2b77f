//! HTTP status responses, independent of any server implementation.
//!
//! ```text
//!   GET  /          200 text/plain        "Hello from <hostname> @ <address>"
//!   GET  /config    200 application/json  <manifest>
//!   *    / /config  405 text/plain        "405: Method Not Allowed"
//!   *    other      404 text/plain        "404: Not found"
//! ```

use std::net::Ipv4Addr;

use crate::app::ports::LinkInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl StatusReply {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self { status, content_type: "text/plain", body: body.into() }
    }
}

/// Snapshot of everything the status endpoint reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusPresenter {
    hostname: String,
    address: Option<Ipv4Addr>,
    manifest_json: String,
    revision: u32,
}

impl StatusPresenter {
    pub fn new(manifest_json: String) -> Self {
        Self { manifest_json, ..Self::default() }
    }

    /// Record the identity obtained on the latest attach.
    pub fn set_identity(&mut self, info: &LinkInfo) {
        self.hostname = info.hostname.as_str().into();
        self.address = Some(info.address);
        self.revision = self.revision.wrapping_add(1);
    }

    /// Changes whenever the snapshot changes; adapters that copy the
    /// presenter use it to skip redundant copies.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn greeting(&self) -> String {
        let address = self.address.unwrap_or(Ipv4Addr::UNSPECIFIED);
        format!("Hello from {} @ {}", self.hostname, address)
    }

    pub fn respond(&self, method: HttpMethod, uri: &str) -> StatusReply {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        match (path, method) {
            ("/", HttpMethod::Get) => StatusReply::text(200, self.greeting()),
            ("/config", HttpMethod::Get) => StatusReply {
                status: 200,
                content_type: "application/json",
                body: self.manifest_json.clone(),
            },
            ("/" | "/config", _) => StatusReply::text(405, "405: Method Not Allowed"),
            _ => StatusReply::text(404, "404: Not found"),
        }
    }
}
