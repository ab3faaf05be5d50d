//! Maud HTML components for the web UI.
//!
//! - `layout`: base page layout and navigation
//! - `button`: button and link-button components
//! - `alert`: alert messages and field errors
//! - `form`: form elements
//! - `pagination`: page navigation controls

pub mod alert;
pub mod button;
pub mod form;
pub mod layout;
pub mod pagination;

pub use alert::{Alert, AlertVariant, FieldErrors};
pub use button::{Button, ButtonVariant};
pub use form::{Checkbox, CsrfField, Form, FormGroup, Input, TextArea};
pub use layout::{BaseLayout, Viewer};
pub use pagination::Pagination;

pub use maud::{html, Markup, PreEscaped, DOCTYPE};
