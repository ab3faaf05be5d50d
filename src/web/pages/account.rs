//! Registration and login pages.
//!
//! Both forms are anonymous, so they carry no CSRF field.

use maud::{html, Markup, Render};

use crate::auth::MIN_PASSWORD_LENGTH;
use crate::components::{Alert, BaseLayout, Button, Checkbox, FieldErrors, Form, FormGroup, Input};
use crate::db::limits;
use crate::web::forms::FormErrors;

/// Values echoed back into the registration form after a failed attempt.
#[derive(Debug, Clone, Default)]
pub struct RegisterValues {
    pub username: String,
}

/// Render the get-started (registration) page.
#[must_use]
pub fn get_started_page(values: &RegisterValues, errors: &FormErrors) -> Markup {
    let password_help = format!(
        "At least {MIN_PASSWORD_LENGTH} characters, not entirely numeric."
    );

    let fields = html! {
        (FieldErrors::new(errors.general()))
        (FormGroup::new(
            "User name",
            "username",
            Input::text("username")
                .id("username")
                .value(&values.username)
                .maxlength(limits::USERNAME)
                .autocomplete("username")
                .required()
                .render(),
        )
        .help("Required. 150 characters or fewer. Letters, digits and @/./+/-/_ only.")
        .errors(errors.field("username")))
        (FormGroup::new(
            "Password",
            "password1",
            Input::password("password1")
                .id("password1")
                .autocomplete("new-password")
                .required()
                .render(),
        )
        .help(&password_help)
        .errors(errors.field("password1")))
        (FormGroup::new(
            "Password confirmation",
            "password2",
            Input::password("password2")
                .id("password2")
                .autocomplete("new-password")
                .required()
                .render(),
        )
        .help("Enter the same password as before, for verification.")
        .errors(errors.field("password2")))
        (Button::submit("Create account"))
    };

    let content = html! {
        article class="auth-container" {
            h1 { "Get started" }
            (Form::post("/users/get-started/", fields))
            p { "Already have an account? " a href="/users/login/" { "Log in" } }
        }
    };

    BaseLayout::new("Get started", None).render(content)
}

/// Render the login page.
///
/// `next` is carried through the form so the visitor returns where they started.
#[must_use]
pub fn login_page(error: Option<&str>, username: &str, next: Option<&str>) -> Markup {
    let fields = html! {
        @if let Some(next) = next {
            input type="hidden" name="next" value=(next);
        }
        (FormGroup::new(
            "User name",
            "username",
            Input::text("username")
                .id("username")
                .value(username)
                .autocomplete("username")
                .required()
                .render(),
        ))
        (FormGroup::new(
            "Password",
            "password",
            Input::password("password")
                .id("password")
                .autocomplete("current-password")
                .required()
                .render(),
        ))
        (Checkbox::new("remember").value("true").label("Keep me signed in for 30 days"))
        (Button::submit("Log in"))
    };

    let content = html! {
        article class="auth-container" {
            h1 { "Log in" }
            @if let Some(error) = error {
                (Alert::error(error).with_title("Login failed"))
            }
            (Form::post("/users/login/", fields))
            p { "New here? " a href="/users/get-started/" { "Create an account" } }
        }
    };

    BaseLayout::new("Log in", None).render(content)
}
