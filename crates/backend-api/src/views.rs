//! JSON views handed to whatever renders the pages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use feedback_database::{Feedback, User};
use serde::Serialize;

use crate::forms::{FormErrors, InputKind, WebForm};

#[derive(Debug, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub input: InputKind,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct FormView {
    pub form: &'static str,
    pub action: String,
    pub fields: Vec<FieldView>,
    pub errors: FormErrors,
}

impl FormView {
    /// Describe a form with its current values. Passwords are never echoed.
    pub fn new<F: WebForm>(form: &F, action: impl Into<String>) -> Self {
        let fields = F::FIELDS
            .iter()
            .map(|field| FieldView {
                name: field.name,
                label: field.label,
                input: field.input,
                value: match field.input {
                    InputKind::Password => String::new(),
                    _ => form.value(field.name).to_owned(),
                },
            })
            .collect();

        Self {
            form: F::NAME,
            action: action.into(),
            fields,
            errors: FormErrors::default(),
        }
    }

    pub fn with_errors(mut self, errors: FormErrors) -> Self {
        self.errors = errors;
        self
    }

    pub fn respond(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for FormView {
    fn into_response(self) -> Response {
        self.respond(StatusCode::OK)
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub created_at: String,
}

impl From<User> for ProfileView {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeedbackView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub username: String,
    pub created_at: String,
    pub updated_at: String,
    pub edit_action: String,
    pub delete_action: String,
}

impl From<Feedback> for FeedbackView {
    fn from(feedback: Feedback) -> Self {
        Self {
            edit_action: format!("/feedback/{}/update", feedback.id),
            delete_action: format!("/feedback/{}/delete", feedback.id),
            id: feedback.id,
            title: feedback.title,
            content: feedback.content,
            username: feedback.username,
            created_at: feedback.created_at,
            updated_at: feedback.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub user: ProfileView,
    pub feedback: Vec<FeedbackView>,
    pub new_feedback_action: String,
}

impl UserPage {
    pub fn new(user: User, feedback: Vec<Feedback>) -> Self {
        Self {
            new_feedback_action: format!("/users/{}/feedback/new", user.username),
            user: user.into(),
            feedback: feedback.into_iter().map(FeedbackView::from).collect(),
        }
    }
}
