//! Email content rendering.
//!
//! Templates use `{{field}}` placeholders. Submitted values are HTML-escaped
//! in bodies; unknown placeholders render as empty strings.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use super::mail::MailMessage;
use crate::models::{EmailSettings, Form, Submission, META_KEY};

pub const DEFAULT_CONFIRMATION_SUBJECT: &str = "Thanks for your submission to {{form_name}}";

pub const DEFAULT_CONFIRMATION_TEMPLATE: &str = "<p>Thanks for getting in touch!</p>\
<p>We received your submission to <strong>{{form_name}}</strong> and will get back to you soon.</p>\
<p style=\"color:#666;font-size:12px\">Reference: {{submission_id}}</p>";

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid");
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        JsonValue::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Placeholder values for a submission, unescaped.
pub fn template_vars(form: &Form, submission: &Submission) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = submission
        .data
        .as_object()
        .map(|data| {
            data.iter()
                .filter(|(key, _)| key.as_str() != META_KEY)
                .map(|(key, value)| (key.clone(), display_value(value)))
                .collect()
        })
        .unwrap_or_default();

    vars.insert("form_name".into(), form.name.clone());
    vars.insert("submission_id".into(), submission.id.to_string());
    vars
}

/// Substitutes placeholders; `escape` applies HTML escaping to values.
pub fn render(template: &str, vars: &HashMap<String, String>, escape: bool) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let value = vars.get(&caps[1]).map(String::as_str).unwrap_or("");
            if escape {
                escape_html(value)
            } else {
                value.to_string()
            }
        })
        .into_owned()
}

fn single_line(value: String) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}

/// Submitter confirmation, falling back to system defaults for unset fields.
pub fn render_confirmation(
    settings: Option<&EmailSettings>,
    form: &Form,
    submission: &Submission,
    recipient: &str,
    default_from: &str,
) -> MailMessage {
    let vars = template_vars(form, submission);
    let subject = settings
        .and_then(|s| s.subject.as_deref())
        .unwrap_or(DEFAULT_CONFIRMATION_SUBJECT);
    let body = settings
        .and_then(|s| s.template.as_deref())
        .unwrap_or(DEFAULT_CONFIRMATION_TEMPLATE);
    let from = settings
        .and_then(|s| s.from_email.as_deref())
        .unwrap_or(default_from);

    MailMessage {
        from: from.to_string(),
        to: recipient.to_string(),
        subject: single_line(render(subject, &vars, false)),
        html: render(body, &vars, true),
        reply_to: None,
    }
}

/// Owner notice listing every submitted field.
pub fn render_developer_notice(
    form: &Form,
    submission: &Submission,
    recipient: &str,
    default_from: &str,
) -> MailMessage {
    let mut rows = String::new();
    if let Some(data) = submission.data.as_object() {
        for (key, value) in data.iter().filter(|(key, _)| key.as_str() != META_KEY) {
            rows.push_str(&format!(
                "<tr><th align=\"left\">{}</th><td>{}</td></tr>",
                escape_html(key),
                escape_html(&display_value(value))
            ));
        }
    }

    let meta = submission
        .data
        .get(META_KEY)
        .and_then(JsonValue::as_object)
        .map(|meta| {
            meta.iter()
                .map(|(key, value)| format!("{}: {}", escape_html(key), escape_html(&display_value(value))))
                .collect::<Vec<_>>()
                .join(" &middot; ")
        })
        .unwrap_or_default();

    let html = format!(
        "<h2>New submission to {}</h2><table cellpadding=\"4\">{}</table>\
<p style=\"color:#666;font-size:12px\">{}</p>\
<p style=\"color:#666;font-size:12px\">Submission {} at {}</p>",
        escape_html(&form.name),
        rows,
        meta,
        submission.id,
        submission.created_at.to_rfc3339()
    );

    MailMessage {
        from: default_from.to_string(),
        to: recipient.to_string(),
        subject: single_line(format!("New submission: {}", form.name)),
        html,
        reply_to: submission.submitter_email(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn form() -> Form {
        Form {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Contact".into(),
            description: None,
            schema: json!({ "fields": [] }),
            schema_version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn submission(data: JsonValue) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            form_id: Uuid::new_v4(),
            data,
            email: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>\"x\" & 'y'</script>"),
            "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_render_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "<b>Ann</b>".to_string());
        assert_eq!(render("Hi {{ name }}!{{missing}}", &vars, true), "Hi &lt;b&gt;Ann&lt;/b&gt;!");
        assert_eq!(render("Hi {{name}}", &vars, false), "Hi <b>Ann</b>");
    }

    #[test]
    fn test_confirmation_defaults() {
        let f = form();
        let s = submission(json!({ "email": "a@b.com" }));
        let message = render_confirmation(None, &f, &s, "a@b.com", "noreply@forms.test");

        assert_eq!(message.from, "noreply@forms.test");
        assert_eq!(message.subject, "Thanks for your submission to Contact");
        assert!(message.html.contains(&s.id.to_string()));
        assert_eq!(message.reply_to, None);
    }

    #[test]
    fn test_confirmation_uses_settings() {
        let f = form();
        let s = submission(json!({ "email": "a@b.com", "name": "Ann & Co" }));
        let mut settings = EmailSettings::new_default(f.id, Utc::now());
        settings.subject = Some("Hello {{name}}".into());
        settings.template = Some("<p>Dear {{name}}</p>".into());
        settings.from_email = Some("team@acme.io".into());

        let message = render_confirmation(Some(&settings), &f, &s, "a@b.com", "noreply@forms.test");
        assert_eq!(message.from, "team@acme.io");
        assert_eq!(message.subject, "Hello Ann & Co");
        assert_eq!(message.html, "<p>Dear Ann &amp; Co</p>");
    }

    #[test]
    fn test_developer_notice_lists_fields() {
        let f = form();
        let s = submission(json!({
            "email": "a@b.com",
            "message": "<hello>",
            "_meta": { "browser": "Chrome", "country": "US" }
        }));
        let message = render_developer_notice(&f, &s, "owner@acme.io", "noreply@forms.test");

        assert_eq!(message.to, "owner@acme.io");
        assert_eq!(message.reply_to.as_deref(), Some("a@b.com"));
        assert!(message.html.contains("<th align=\"left\">message</th><td>&lt;hello&gt;</td>"));
        assert!(message.html.contains("browser: Chrome"));
        assert!(!message.html.contains("<th align=\"left\">_meta</th>"));
    }
}
