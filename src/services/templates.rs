//! Email bodies for broadcasts and survey window notices.

use super::mailer::OutgoingEmail;

pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl RenderedEmail {
    pub fn to(&self, recipient: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: recipient.to_string(),
            subject: self.subject.clone(),
            html: self.html.clone(),
            text: self.text.clone(),
        }
    }
}

pub fn escape_html(input: &str) -> String {
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

/// Blank-line separated paragraphs become `<p>` blocks; single newlines become `<br>`.
fn paragraphs_html(message: &str) -> String {
    message
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn layout(title: &str, body_html: &str, app_base_url: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><body style=\"font-family: Arial, sans-serif; color: #222;\">\n\
         <h2>{}</h2>\n{}\n\
         <hr>\n<p style=\"font-size: 12px; color: #666;\">Consortium Statistics &middot; <a href=\"{}\">{}</a></p>\n\
         </body></html>",
        escape_html(title),
        body_html,
        escape_html(app_base_url),
        escape_html(app_base_url),
    )
}

pub fn broadcast(subject: &str, message: &str, app_base_url: &str) -> RenderedEmail {
    RenderedEmail {
        subject: subject.trim().to_string(),
        html: layout(subject.trim(), &paragraphs_html(message), app_base_url),
        text: format!("{}\n\n--\nConsortium Statistics\n{}", message.trim(), app_base_url),
    }
}

pub fn forms_opened(year: i32, app_base_url: &str) -> RenderedEmail {
    let subject = format!("{} statistics survey forms are now open", year);
    let message = format!(
        "The {} survey forms are now open for editing.\n\nPlease sign in to submit your institution's statistics.",
        year
    );
    RenderedEmail {
        html: layout(&subject, &paragraphs_html(&message), app_base_url),
        text: format!("{}\n\n{}", message, app_base_url),
        subject,
    }
}

pub fn forms_closed(year: i32, app_base_url: &str) -> RenderedEmail {
    let subject = format!("{} statistics survey forms are now closed", year);
    let message = format!(
        "The {} survey forms have closed and can no longer be edited.\n\nContact the consortium office if you need a change made.",
        year
    );
    RenderedEmail {
        html: layout(&subject, &paragraphs_html(&message), app_base_url),
        text: format!("{}\n\n{}", message, app_base_url),
        subject,
    }
}
