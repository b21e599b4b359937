//! Form definitions: typed bindings for HTTP form submissions with
//! field-level validation. Handlers re-render the originating context with
//! these errors instead of letting anything escape to the user.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name to error messages, in stable field order.
#[derive(Debug, Default, Serialize)]
pub struct FormErrors(pub BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub content: String,
}

impl ContactForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if self.name.trim().is_empty() {
            errors.add("name", "This field is required");
        }
        if self.email.trim().is_empty() {
            errors.add("email", "This field is required");
        } else if !looks_like_email(&self.email) {
            errors.add("email", "Enter a valid email address");
        }
        if self.content.trim().is_empty() {
            errors.add("content", "This field is required");
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl SignupForm {
    /// Field checks that need no database access; the duplicate-email
    /// check lives in the signup handler.
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if self.username.trim().is_empty() {
            errors.add("username", "This field is required");
        }
        if self.email.trim().is_empty() {
            errors.add("email", "This field is required");
        } else if !looks_like_email(&self.email) {
            errors.add("email", "Enter a valid email address");
        }
        if self.password1.is_empty() {
            errors.add("password1", "This field is required");
        } else if self.password1.len() < 8 {
            errors.add("password1", "Password must be at least 8 characters");
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match");
        }
        errors
    }
}

/// The review form as defined: rating bounded to 1..=5, text required.
/// The book-detail POST path deliberately does not run this validation
/// (see the book view), so out-of-range submissions still reach storage.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub text: String,
}

impl ReviewForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        match self.rating {
            Some(r) if (1..=5).contains(&r) => {}
            Some(_) => errors.add("rating", "Rating must be between 1 and 5"),
            None => errors.add("rating", "This field is required"),
        }
        if self.text.trim().is_empty() {
            errors.add("text", "This field is required");
        }
        errors
    }
}

/// Add-book form fields as received. Parsed from a multipart body since
/// the form carries a cover image; `image` holds the stored relative path
/// once the upload is written out.
#[derive(Debug, Default, Serialize)]
pub struct AddBookForm {
    pub title: String,
    pub author: Option<i32>,
    pub genres: Vec<i32>,
    pub first_published: Option<i32>,
    pub description: String,
    pub quote: String,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub slug: String,
}

impl AddBookForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if self.title.trim().is_empty() {
            errors.add("title", "This field is required");
        }
        if self.author.is_none() {
            errors.add("author", "This field is required");
        }
        errors
    }
}

/// Profile edit: only non-identity fields. Username and email are shown
/// read-only by the presentation layer and never bound here.
#[derive(Debug, Default, Serialize)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub date_birth: Option<String>,
    pub avatar: Option<String>,
}

impl ProfileForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if let Some(date) = &self.date_birth {
            if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                errors.add("date_birth", "Enter a valid date (YYYY-MM-DD)");
            }
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if self.old_password.is_empty() {
            errors.add("old_password", "This field is required");
        }
        if self.new_password1.is_empty() {
            errors.add("new_password1", "This field is required");
        }
        if self.new_password1 != self.new_password2 {
            errors.add("new_password2", "The two password fields didn't match");
        }
        errors
    }
}
