//! Form components for maud templates.

use maud::{html, Markup, Render};

use super::alert::FieldErrors;
use crate::auth::CSRF_FIELD;

/// A form container element.
#[derive(Debug)]
pub struct Form<'a> {
    pub action: &'a str,
    pub method: &'a str,
    pub content: Markup,
    pub class: Option<&'a str>,
    /// Enable multipart/form-data encoding
    pub multipart: bool,
}

impl<'a> Form<'a> {
    #[must_use]
    pub fn new(action: &'a str, method: &'a str, content: Markup) -> Self {
        Self {
            action,
            method,
            content,
            class: None,
            multipart: false,
        }
    }

    /// Create a POST form.
    #[must_use]
    pub fn post(action: &'a str, content: Markup) -> Self {
        Self::new(action, "post", content)
    }

    #[must_use]
    pub fn class(mut self, class: &'a str) -> Self {
        self.class = Some(class);
        self
    }

    /// Enable multipart/form-data encoding (for file uploads).
    #[must_use]
    pub fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }
}

impl Render for Form<'_> {
    fn render(&self) -> Markup {
        html! {
            form
                action=(self.action)
                method=(self.method)
                class=[self.class]
                enctype=[self.multipart.then_some("multipart/form-data")]
            {
                (self.content)
            }
        }
    }
}

/// An input element.
#[derive(Debug, Clone)]
pub struct Input<'a> {
    pub name: &'a str,
    /// "text", "password", "email", "date", "file", ...
    pub r#type: &'a str,
    pub value: Option<&'a str>,
    pub required: bool,
    pub id: Option<&'a str>,
    pub maxlength: Option<usize>,
    pub accept: Option<&'a str>,
    pub multiple: bool,
    pub autocomplete: Option<&'a str>,
}

impl<'a> Input<'a> {
    #[must_use]
    pub fn new(name: &'a str, r#type: &'a str) -> Self {
        Self {
            name,
            r#type,
            value: None,
            required: false,
            id: None,
            maxlength: None,
            accept: None,
            multiple: false,
            autocomplete: None,
        }
    }

    #[must_use]
    pub fn text(name: &'a str) -> Self {
        Self::new(name, "text")
    }

    #[must_use]
    pub fn password(name: &'a str) -> Self {
        Self::new(name, "password")
    }

    #[must_use]
    pub fn email(name: &'a str) -> Self {
        Self::new(name, "email")
    }

    #[must_use]
    pub fn date(name: &'a str) -> Self {
        Self::new(name, "date")
    }

    #[must_use]
    pub fn file(name: &'a str) -> Self {
        Self::new(name, "file")
    }

    #[must_use]
    pub fn value(mut self, value: &'a str) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn maxlength(mut self, maxlength: usize) -> Self {
        self.maxlength = Some(maxlength);
        self
    }

    /// Restrict the file picker, e.g. `image/png,image/jpeg`.
    #[must_use]
    pub fn accept(mut self, accept: &'a str) -> Self {
        self.accept = Some(accept);
        self
    }

    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    #[must_use]
    pub fn autocomplete(mut self, autocomplete: &'a str) -> Self {
        self.autocomplete = Some(autocomplete);
        self
    }
}

impl Render for Input<'_> {
    fn render(&self) -> Markup {
        html! {
            input
                type=(self.r#type)
                name=(self.name)
                value=[self.value]
                required[self.required]
                id=[self.id]
                maxlength=[self.maxlength]
                accept=[self.accept]
                multiple[self.multiple]
                autocomplete=[self.autocomplete];
        }
    }
}

/// A textarea element.
#[derive(Debug)]
pub struct TextArea<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
    pub rows: Option<u32>,
    pub required: bool,
    pub id: Option<&'a str>,
    pub maxlength: Option<usize>,
}

impl<'a> TextArea<'a> {
    #[must_use]
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            value: None,
            rows: None,
            required: false,
            id: None,
            maxlength: None,
        }
    }

    #[must_use]
    pub fn value(mut self, value: &'a str) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn rows(mut self, rows: u32) -> Self {
        self.rows = Some(rows);
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn maxlength(mut self, maxlength: usize) -> Self {
        self.maxlength = Some(maxlength);
        self
    }
}

impl Render for TextArea<'_> {
    fn render(&self) -> Markup {
        html! {
            textarea
                name=(self.name)
                rows=[self.rows]
                required[self.required]
                id=[self.id]
                maxlength=[self.maxlength]
            {
                @if let Some(value) = self.value {
                    (value)
                }
            }
        }
    }
}

/// A checkbox input element.
#[derive(Debug)]
pub struct Checkbox<'a> {
    pub name: &'a str,
    /// Defaults to "1" if not set
    pub value: Option<&'a str>,
    pub checked: bool,
    /// Displayed after the checkbox
    pub label: Option<&'a str>,
}

impl<'a> Checkbox<'a> {
    #[must_use]
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            value: None,
            checked: false,
            label: None,
        }
    }

    #[must_use]
    pub fn value(mut self, value: &'a str) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    #[must_use]
    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }
}

impl Render for Checkbox<'_> {
    fn render(&self) -> Markup {
        html! {
            label {
                input
                    type="checkbox"
                    name=(self.name)
                    value=(self.value.unwrap_or("1"))
                    checked[self.checked];
                @if let Some(label) = self.label {
                    " " (label)
                }
            }
        }
    }
}

/// Label, input, help text and errors for one field.
#[derive(Debug)]
pub struct FormGroup<'a> {
    pub label: &'a str,
    /// Input ID (also used for label's `for` attribute)
    pub id: &'a str,
    pub input: Markup,
    pub help: Option<&'a str>,
    pub errors: &'a [String],
}

impl<'a> FormGroup<'a> {
    #[must_use]
    pub fn new(label: &'a str, id: &'a str, input: Markup) -> Self {
        Self {
            label,
            id,
            input,
            help: None,
            errors: &[],
        }
    }

    #[must_use]
    pub fn help(mut self, help: &'a str) -> Self {
        self.help = Some(help);
        self
    }

    #[must_use]
    pub fn errors(mut self, errors: &'a [String]) -> Self {
        self.errors = errors;
        self
    }
}

impl Render for FormGroup<'_> {
    fn render(&self) -> Markup {
        html! {
            div class="form-group" {
                label for=(self.id) { (self.label) }
                (self.input)
                @if let Some(help) = self.help {
                    small { (help) }
                }
                (FieldErrors::new(self.errors))
            }
        }
    }
}

/// Hidden CSRF token field for state-changing forms.
#[derive(Debug)]
pub struct CsrfField<'a>(pub &'a str);

impl Render for CsrfField<'_> {
    fn render(&self) -> Markup {
        html! {
            input type="hidden" name=(CSRF_FIELD) value=(self.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_multipart() {
        let html = Form::post("/upload/", html! {}).multipart().render().into_string();
        assert_eq!(
            html,
            r#"<form action="/upload/" method="post" enctype="multipart/form-data"></form>"#
        );
    }

    #[test]
    fn test_input_attributes() {
        let html = Input::text("title")
            .value("Hello \"world\"")
            .maxlength(128)
            .required()
            .render()
            .into_string();
        assert!(html.contains(r#"name="title""#));
        assert!(html.contains(r#"value="Hello &quot;world&quot;""#));
        assert!(html.contains(r#"maxlength="128""#));
        assert!(html.contains("required"));
    }

    #[test]
    fn test_form_group_with_errors() {
        let errors = vec!["This field is required.".to_string()];
        let html = FormGroup::new("Title", "title", Input::text("title").id("title").render())
            .errors(&errors)
            .render()
            .into_string();
        assert!(html.contains(r#"<label for="title">Title</label>"#));
        assert!(html.contains("<li>This field is required.</li>"));
    }

    #[test]
    fn test_csrf_field() {
        let html = CsrfField("tok").render().into_string();
        assert_eq!(html, r#"<input type="hidden" name="csrf_token" value="tok">"#);
    }
}
