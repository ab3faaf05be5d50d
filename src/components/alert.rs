//! Alert messages and inline field errors.

use maud::{html, Markup, Render};

/// Alert variant types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertVariant {
    Error,
    Info,
}

impl AlertVariant {
    /// Get the CSS class for the alert article element.
    #[must_use]
    pub const fn article_class(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// An alert message component.
///
/// ```ignore
/// let alert = Alert::error("Invalid username or password").with_title("Login failed");
/// ```
#[derive(Debug, Clone)]
pub struct Alert<'a> {
    pub variant: AlertVariant,
    pub title: Option<&'a str>,
    pub message: &'a str,
}

impl<'a> Alert<'a> {
    #[must_use]
    pub const fn new(variant: AlertVariant, message: &'a str) -> Self {
        Self {
            variant,
            title: None,
            message,
        }
    }

    #[must_use]
    pub const fn error(message: &'a str) -> Self {
        Self::new(AlertVariant::Error, message)
    }

    #[must_use]
    pub const fn info(message: &'a str) -> Self {
        Self::new(AlertVariant::Info, message)
    }

    #[must_use]
    pub const fn with_title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }
}

impl Render for Alert<'_> {
    fn render(&self) -> Markup {
        html! {
            article class=(self.variant.article_class()) role="alert" {
                @if let Some(title) = self.title {
                    strong { (title) }
                    " "
                }
                (self.message)
            }
        }
    }
}

/// Validation messages shown under a form field.
#[derive(Debug, Clone)]
pub struct FieldErrors<'a> {
    pub messages: &'a [String],
}

impl<'a> FieldErrors<'a> {
    #[must_use]
    pub const fn new(messages: &'a [String]) -> Self {
        Self { messages }
    }
}

impl Render for FieldErrors<'_> {
    fn render(&self) -> Markup {
        html! {
            @if !self.messages.is_empty() {
                ul class="errorlist" {
                    @for message in self.messages {
                        li { (message) }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_render() {
        let html = Alert::error("Bad things").with_title("Oops").render().into_string();
        assert_eq!(
            html,
            r#"<article class="error" role="alert"><strong>Oops</strong> Bad things</article>"#
        );
    }

    #[test]
    fn test_field_errors() {
        assert_eq!(FieldErrors::new(&[]).render().into_string(), "");
        let messages = vec!["Too short".to_string(), "<b>".to_string()];
        let html = FieldErrors::new(&messages).render().into_string();
        assert_eq!(
            html,
            r#"<ul class="errorlist"><li>Too short</li><li>&lt;b&gt;</li></ul>"#
        );
    }
}
