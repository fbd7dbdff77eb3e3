//! Fulfillment email delivery.
//!
//! A paid order becomes a [`FulfillmentRecord`], which a [`Mailer`] turns
//! into one outbound email. Nothing is persisted: the record is dropped after
//! the send attempt, whatever the outcome.

pub mod resend;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MailError;

pub use resend::ResendMailer;

/// Who gets the email and which link it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FulfillmentRecord {
    pub recipient_email: String,
    pub resource_link: String,
}

impl FulfillmentRecord {
    pub fn new(recipient_email: impl Into<String>, resource_link: impl Into<String>) -> Self {
        Self {
            recipient_email: recipient_email.into(),
            resource_link: resource_link.into(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the access email, returning the provider's message id.
    async fn send_fulfillment(&self, record: &FulfillmentRecord) -> Result<String, MailError>;
}

/// Render the HTML body of the access email.
pub fn render_html(course_name: &str, resource_link: &str) -> String {
    format!(
        "<p>Thank you for your purchase of <strong>{name}</strong>.</p>\
         <p>Your course is ready: <a href=\"{link}\">{link}</a></p>\
         <p>Keep this email, the link is your access.</p>",
        name = escape_html(course_name),
        link = escape_html(resource_link),
    )
}

/// Render the plain-text alternative of the access email.
pub fn render_text(course_name: &str, resource_link: &str) -> String {
    format!(
        "Thank you for your purchase of {course_name}.\n\n\
         Your course is ready: {resource_link}\n\n\
         Keep this email, the link is your access.\n"
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
