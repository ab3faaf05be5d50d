//! Button component for the web UI.
//!
//! Renders as either a `<button>` or an `<a>` depending on whether an href is set.

use maud::{html, Markup, Render};

/// Button style variants matching CSS classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ButtonVariant {
    #[default]
    Primary,
    Outline,
    Danger,
    Secondary,
}

impl ButtonVariant {
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::Primary => "btn btn-primary",
            Self::Outline => "btn outline",
            Self::Danger => "btn btn-danger",
            Self::Secondary => "btn btn-secondary",
        }
    }
}

/// A configurable button component.
///
/// ```ignore
/// let edit = Button::outline("Edit").href("/blogs/blog-edit/3/");
/// let submit = Button::primary("Save").r#type("submit");
/// ```
#[derive(Debug, Clone)]
pub struct Button<'a> {
    pub label: &'a str,
    pub variant: ButtonVariant,
    /// Renders as `<a>` if present
    pub href: Option<&'a str>,
    /// Button type attribute (for `<button>` elements)
    pub r#type: Option<&'a str>,
}

impl<'a> Button<'a> {
    #[must_use]
    pub fn new(label: &'a str, variant: ButtonVariant) -> Self {
        Self {
            label,
            variant,
            href: None,
            r#type: None,
        }
    }

    #[must_use]
    pub fn primary(label: &'a str) -> Self {
        Self::new(label, ButtonVariant::Primary)
    }

    #[must_use]
    pub fn outline(label: &'a str) -> Self {
        Self::new(label, ButtonVariant::Outline)
    }

    #[must_use]
    pub fn danger(label: &'a str) -> Self {
        Self::new(label, ButtonVariant::Danger)
    }

    #[must_use]
    pub fn secondary(label: &'a str) -> Self {
        Self::new(label, ButtonVariant::Secondary)
    }

    #[must_use]
    pub fn href(mut self, href: &'a str) -> Self {
        self.href = Some(href);
        self
    }

    #[must_use]
    pub fn r#type(mut self, r#type: &'a str) -> Self {
        self.r#type = Some(r#type);
        self
    }

    /// Shorthand for a submit button.
    #[must_use]
    pub fn submit(label: &'a str) -> Self {
        Self::primary(label).r#type("submit")
    }
}

impl Render for Button<'_> {
    fn render(&self) -> Markup {
        let class = self.variant.class();

        if let Some(href) = self.href {
            html! {
                a class=(class) href=(href) { (self.label) }
            }
        } else {
            html! {
                button class=(class) type=(self.r#type.unwrap_or("button")) { (self.label) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_as_link() {
        let html = Button::outline("Edit").href("/x/").render().into_string();
        assert_eq!(html, r#"<a class="btn outline" href="/x/">Edit</a>"#);
    }

    #[test]
    fn test_submit_button() {
        let html = Button::submit("Save").render().into_string();
        assert_eq!(
            html,
            r#"<button class="btn btn-primary" type="submit">Save</button>"#
        );
    }
}
