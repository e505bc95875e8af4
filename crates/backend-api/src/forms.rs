//! Submitted forms and their validation rules.
//!
//! Every form is a plain struct deserialized from an urlencoded body. Missing
//! fields come through as empty strings so that `required` can report them.
//! Each form type declares its fields statically; validation walks that list in
//! order and either yields the form's data or the per-field messages.

use feedback_auth::Registration;
use feedback_database::{Feedback, FeedbackChanges, NewFeedback};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static USERNAME_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").ok());
static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok());

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid username or password.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Password,
    Email,
    Textarea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Username,
    Email,
}

impl Pattern {
    /// An unusable pattern rejects everything
    fn matches(self, value: &str) -> bool {
        let regex = match self {
            Pattern::Username => &*USERNAME_PATTERN,
            Pattern::Email => &*EMAIL_PATTERN,
        };
        regex.as_ref().is_some_and(|regex| regex.is_match(value))
    }

    fn message(self) -> &'static str {
        match self {
            Pattern::Username => {
                "Username may only contain letters, numbers, underscores and hyphens."
            }
            Pattern::Email => "Invalid email address.",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub input: InputKind,
    pub required: bool,
    pub max_len: Option<usize>,
    pub pattern: Option<Pattern>,
}

impl Field {
    const fn required(name: &'static str, label: &'static str, input: InputKind) -> Self {
        Self {
            name,
            label,
            input,
            required: true,
            max_len: None,
            pattern: None,
        }
    }

    const fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    const fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    fn check(&self, value: &str, errors: &mut FormErrors) {
        if value.trim().is_empty() {
            if self.required {
                errors.add(self.name, REQUIRED_MESSAGE);
            }
            return;
        }

        if let Some(max_len) = self.max_len {
            if value.chars().count() > max_len {
                errors.add(
                    self.name,
                    format!("Field cannot be longer than {max_len} characters."),
                );
            }
        }

        if let Some(pattern) = self.pattern {
            if !pattern.matches(value) {
                errors.add(self.name, pattern.message());
            }
        }
    }
}

/// Field-level messages, kept in the order fields were declared
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: Vec<(&'static str, Vec<String>)>,
}

impl FormErrors {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message.into()),
            None => self.fields.push((field, vec![message.into()])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, messages)| messages.as_slice())
            .unwrap_or_default()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }
}

impl Serialize for FormErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, messages) in &self.fields {
            map.serialize_entry(name, messages)?;
        }
        map.end()
    }
}

pub trait WebForm: DeserializeOwned + Default {
    type Data;

    const NAME: &'static str;
    const FIELDS: &'static [Field];

    /// Current value of a declared field
    fn value(&self, field: &str) -> &str;

    fn data(&self) -> Self::Data;

    fn validate(&self) -> Result<Self::Data, FormErrors> {
        let mut errors = FormErrors::default();
        for field in Self::FIELDS {
            field.check(self.value(field.name), &mut errors);
        }

        if errors.is_empty() {
            Ok(self.data())
        } else {
            Err(errors)
        }
    }
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_owned())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    #[serde(deserialize_with = "trimmed")]
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "trimmed")]
    pub first_name: String,
    #[serde(deserialize_with = "trimmed")]
    pub last_name: String,
    #[serde(deserialize_with = "trimmed")]
    pub email: String,
}

impl WebForm for RegisterForm {
    type Data = Registration;

    const NAME: &'static str = "register";
    const FIELDS: &'static [Field] = &[
        Field::required("username", "Username", InputKind::Text)
            .max_len(20)
            .pattern(Pattern::Username),
        Field::required("password", "Password", InputKind::Password).max_len(128),
        Field::required("first_name", "First Name", InputKind::Text).max_len(30),
        Field::required("last_name", "Last Name", InputKind::Text).max_len(30),
        Field::required("email", "Email", InputKind::Email)
            .max_len(50)
            .pattern(Pattern::Email),
    ];

    fn value(&self, field: &str) -> &str {
        match field {
            "username" => &self.username,
            "password" => &self.password,
            "first_name" => &self.first_name,
            "last_name" => &self.last_name,
            "email" => &self.email,
            _ => "",
        }
    }

    fn data(&self) -> Registration {
        Registration {
            username: self.username.clone(),
            password: self.password.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    #[serde(deserialize_with = "trimmed")]
    pub username: String,
    pub password: String,
}

impl WebForm for LoginForm {
    type Data = Credentials;

    const NAME: &'static str = "login";
    const FIELDS: &'static [Field] = &[
        Field::required("username", "Username", InputKind::Text),
        Field::required("password", "Password", InputKind::Password),
    ];

    fn value(&self, field: &str) -> &str {
        match field {
            "username" => &self.username,
            "password" => &self.password,
            _ => "",
        }
    }

    fn data(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackDraft {
    pub title: String,
    pub content: String,
}

impl FeedbackDraft {
    pub fn into_new(self, username: &str) -> NewFeedback {
        NewFeedback {
            title: self.title,
            content: self.content,
            username: username.to_owned(),
        }
    }

    pub fn into_changes(self) -> FeedbackChanges {
        FeedbackChanges {
            title: self.title,
            content: self.content,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackForm {
    #[serde(deserialize_with = "trimmed")]
    pub title: String,
    #[serde(deserialize_with = "trimmed")]
    pub content: String,
}

impl From<&Feedback> for FeedbackForm {
    fn from(feedback: &Feedback) -> Self {
        Self {
            title: feedback.title.clone(),
            content: feedback.content.clone(),
        }
    }
}

impl WebForm for FeedbackForm {
    type Data = FeedbackDraft;

    const NAME: &'static str = "feedback";
    const FIELDS: &'static [Field] = &[
        Field::required("title", "Title", InputKind::Text).max_len(100),
        Field::required("content", "Content", InputKind::Textarea),
    ];

    fn value(&self, field: &str) -> &str {
        match field {
            "title" => &self.title,
            "content" => &self.content,
            _ => "",
        }
    }

    fn data(&self) -> FeedbackDraft {
        FeedbackDraft {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

/// Confirmation for a delete; carries no fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteForm {}

impl WebForm for DeleteForm {
    type Data = ();

    const NAME: &'static str = "delete";
    const FIELDS: &'static [Field] = &[];

    fn value(&self, _field: &str) -> &str {
        ""
    }

    fn data(&self) {}
}
