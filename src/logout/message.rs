//! Builder for the legacy single-logout notice.
//!
//! The XML shape is fixed by what deployed relying parties already parse;
//! only the request id, issue instant, and session index vary.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::ticket::id::TicketIdGenerator;
use crate::ticket::LOGOUT_PREFIX;

pub struct LogoutMessageBuilder {
    id_generator: TicketIdGenerator,
}

impl Default for LogoutMessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogoutMessageBuilder {
    pub fn new() -> Self {
        Self {
            id_generator: TicketIdGenerator::new(),
        }
    }

    /// The uncompressed back-channel message for a revoked ticket.
    pub fn build(&self, ticket_id: &str, issue_instant: DateTime<Utc>) -> String {
        let id = self.id_generator.new_id(LOGOUT_PREFIX);
        render(&id, ticket_id, issue_instant)
    }

    /// The front-channel variant: deflate-compressed and base64-encoded for
    /// embedding in a redirect URL.
    pub fn build_front_channel(
        &self,
        ticket_id: &str,
        issue_instant: DateTime<Utc>,
    ) -> Result<String, std::io::Error> {
        let message = self.build(ticket_id, issue_instant);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(message.as_bytes())?;
        let compressed = encoder.finish()?;
        Ok(STANDARD.encode(compressed))
    }
}

fn render(id: &str, ticket_id: &str, issue_instant: DateTime<Utc>) -> String {
    let instant = issue_instant.format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        "<samlp:LogoutRequest xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\"\n  \
         ID=\"{id}\" Version=\"2.0\" IssueInstant=\"{instant}\">\n  \
         <saml:NameID xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\">@NOT_USED@</saml:NameID>\n  \
         <samlp:SessionIndex>{session_index}</samlp:SessionIndex>\n\
         </samlp:LogoutRequest>",
        id = xml_escape(id),
        session_index = xml_escape(ticket_id),
    )
}

fn xml_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}
