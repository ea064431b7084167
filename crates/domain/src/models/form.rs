//! Form domain models and built-in form templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;
use validator::Validate;

/// Schema version assigned to newly created forms.
pub const INITIAL_SCHEMA_VERSION: i32 = 1;

/// A form owned by exactly one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Versioned schema descriptor (field list, labels, types).
    pub schema: JsonValue,
    pub schema_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting a form.
#[derive(Debug, Clone)]
pub struct NewForm {
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub schema: JsonValue,
}

/// Request to create an empty or custom form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateFormRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Option<JsonValue>,
}

impl CreateFormRequest {
    pub fn into_new_form(self, tenant_id: Uuid) -> NewForm {
        NewForm {
            tenant_id,
            name: self.name.trim().to_string(),
            description: self.description,
            schema: self.schema.unwrap_or_else(|| json!({ "fields": [] })),
        }
    }
}

/// Request to create a form from a built-in template.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateFromTemplateRequest {
    #[validate(length(min = 1, max = 64))]
    pub template_id: String,
    /// Overrides the template's default name.
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
}

/// A field in a template schema.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TemplateField {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    pub required: bool,
}

/// Built-in starting point for a new form.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FormTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [TemplateField],
}

impl FormTemplate {
    /// Schema descriptor for a form created from this template.
    pub fn schema(&self) -> JsonValue {
        json!({
            "template": self.id,
            "fields": self.fields,
        })
    }

    pub fn new_form(&self, tenant_id: Uuid, name: Option<String>) -> NewForm {
        NewForm {
            tenant_id,
            name: name
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| self.name.to_string()),
            description: Some(self.description.to_string()),
            schema: self.schema(),
        }
    }
}

const CONTACT_FIELDS: &[TemplateField] = &[
    TemplateField {
        name: "name",
        label: "Name",
        field_type: "text",
        required: true,
    },
    TemplateField {
        name: "email",
        label: "Email",
        field_type: "email",
        required: true,
    },
    TemplateField {
        name: "message",
        label: "Message",
        field_type: "textarea",
        required: true,
    },
];

const NEWSLETTER_FIELDS: &[TemplateField] = &[TemplateField {
    name: "email",
    label: "Email",
    field_type: "email",
    required: true,
}];

const FEEDBACK_FIELDS: &[TemplateField] = &[
    TemplateField {
        name: "email",
        label: "Email",
        field_type: "email",
        required: false,
    },
    TemplateField {
        name: "rating",
        label: "Rating",
        field_type: "number",
        required: true,
    },
    TemplateField {
        name: "comments",
        label: "Comments",
        field_type: "textarea",
        required: false,
    },
];

const WAITLIST_FIELDS: &[TemplateField] = &[
    TemplateField {
        name: "name",
        label: "Name",
        field_type: "text",
        required: false,
    },
    TemplateField {
        name: "email",
        label: "Email",
        field_type: "email",
        required: true,
    },
    TemplateField {
        name: "company",
        label: "Company",
        field_type: "text",
        required: false,
    },
];

const TEMPLATES: &[FormTemplate] = &[
    FormTemplate {
        id: "contact",
        name: "Contact Form",
        description: "Collect name, email and a message.",
        fields: CONTACT_FIELDS,
    },
    FormTemplate {
        id: "newsletter",
        name: "Newsletter Signup",
        description: "Collect email addresses for a mailing list.",
        fields: NEWSLETTER_FIELDS,
    },
    FormTemplate {
        id: "feedback",
        name: "Feedback Form",
        description: "Collect a rating and optional comments.",
        fields: FEEDBACK_FIELDS,
    },
    FormTemplate {
        id: "waitlist",
        name: "Waitlist",
        description: "Collect early-access signups.",
        fields: WAITLIST_FIELDS,
    },
];

/// All built-in templates.
pub fn form_templates() -> &'static [FormTemplate] {
    TEMPLATES
}

pub fn find_template(id: &str) -> Option<&'static FormTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_template() {
        assert_eq!(find_template("contact").unwrap().name, "Contact Form");
        assert!(find_template("missing").is_none());
    }

    #[test]
    fn test_template_ids_unique() {
        let mut ids: Vec<_> = form_templates().iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), form_templates().len());
    }

    #[test]
    fn test_template_schema() {
        let schema = find_template("newsletter").unwrap().schema();
        assert_eq!(schema["template"], "newsletter");
        assert_eq!(schema["fields"][0]["name"], "email");
        assert_eq!(schema["fields"][0]["type"], "email");
    }

    #[test]
    fn test_template_new_form_name_override() {
        let tenant_id = Uuid::new_v4();
        let template = find_template("contact").unwrap();

        let default_named = template.new_form(tenant_id, None);
        assert_eq!(default_named.name, "Contact Form");

        let renamed = template.new_form(tenant_id, Some("  Support  ".into()));
        assert_eq!(renamed.name, "Support");
        assert_eq!(renamed.tenant_id, tenant_id);
    }

    #[test]
    fn test_create_form_request_validation() {
        let valid = CreateFormRequest {
            name: "Signup".into(),
            description: None,
            schema: None,
        };
        assert!(valid.validate().is_ok());

        let empty_name = CreateFormRequest {
            name: String::new(),
            description: None,
            schema: None,
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_into_new_form_defaults_schema() {
        let form = CreateFormRequest {
            name: " Signup ".into(),
            description: None,
            schema: None,
        }
        .into_new_form(Uuid::new_v4());

        assert_eq!(form.name, "Signup");
        assert_eq!(form.schema, json!({ "fields": [] }));
    }
}
