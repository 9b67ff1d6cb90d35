//! Minijinja template rendering for notification text.
//!
//! Templates are arbitrary strings (the SMS template may come from
//! configuration), so a fresh [`minijinja::Environment`] is created per
//! render call.

use serde::Serialize;

use crate::traits::NotifyError;

/// SMS template carrying the aurora description.
pub const PLAIN_SMS_TEMPLATE: &str = "{{ code }} #{{ serial }} Aurora: {{ aurora }} \
Impact latitude: {{ latitude }} degrees GMLat, northern hemisphere.\
{% if valid_from %} From {{ valid_from }}{% endif %}{% if valid_to %} to {{ valid_to }}{% endif %}";

/// SMS template carrying a deep link instead of the aurora description.
pub const LINK_SMS_TEMPLATE: &str = "{{ code }} #{{ serial }} {{ link }} \
Impact latitude: {{ latitude }} degrees GMLat, northern hemisphere.\
{% if valid_from %} From {{ valid_from }}{% endif %}{% if valid_to %} to {{ valid_to }}{% endif %}";

/// Values an SMS template can reference.
#[derive(Debug, Clone, Serialize)]
pub struct SmsContext {
    pub code: String,
    pub serial: i64,
    pub aurora: String,
    pub link: String,
    pub latitude: String,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
}

/// Renders notification templates using minijinja.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Block tags swallow their own line, so templates written over several
    /// lines in config don't leave blank lines in the SMS.
    fn environment() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env
    }

    pub fn render<C: Serialize>(&self, template: &str, ctx: &C) -> Result<String, NotifyError> {
        Self::environment()
            .render_str(template, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Syntax check only; nothing is evaluated.
    pub fn validate(&self, template: &str) -> Result<(), NotifyError> {
        Self::environment()
            .template_from_str(template)
            .map(|_| ())
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}
