//! Visit intents, their resolved descriptors and per-visit hooks.

use crate::http::{Headers, Progress};
use crate::page::{Errors, Page};
use crate::params::VisitStatus;
use crate::payload::{RequestPayload, VisitData};
use crate::query::ArrayFormat;
use crate::request::CancelToken;
use core::fmt;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    pub const fn is_get(self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Predicate deciding a preserve option from the response page.
pub type PagePredicate = Arc<dyn Fn(&Page) -> bool + Send + Sync>;

/// `preserveScroll` / `preserveState` value.
#[derive(Clone)]
pub enum PreserveOption {
    Bool(bool),
    /// Preserve only when the response carries validation errors.
    Errors,
    Predicate(PagePredicate),
}

impl PreserveOption {
    pub fn predicate(check: impl Fn(&Page) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(check))
    }

    /// Decide the option against the page about to be applied.
    pub fn resolve(&self, page: &Page) -> bool {
        match self {
            Self::Bool(flag) => *flag,
            Self::Errors => page.has_errors(),
            Self::Predicate(check) => check(page),
        }
    }

    /// Only a literal `true` counts; sentinels and predicates do not.
    pub const fn is_literally_true(&self) -> bool {
        matches!(self, Self::Bool(true))
    }
}

impl Default for PreserveOption {
    fn default() -> Self {
        Self::Bool(false)
    }
}

impl From<bool> for PreserveOption {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl fmt::Debug for PreserveOption {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(flag) => write!(formatter, "Bool({flag})"),
            Self::Errors => formatter.write_str("Errors"),
            Self::Predicate(_) => formatter.write_str("Predicate(..)"),
        }
    }
}

/// Per-visit lifecycle hooks. Each runs before the matching global event.
#[derive(Clone, Default)]
pub struct VisitCallbacks {
    /// Receives a token that cancels this visit.
    pub on_cancel_token: Option<Arc<dyn Fn(CancelToken) + Send + Sync>>,
    /// Returning `false` aborts the visit before anything is sent.
    pub on_before: Option<Arc<dyn Fn(&Visit) -> bool + Send + Sync>>,
    pub on_start: Option<Arc<dyn Fn(&Visit) + Send + Sync>>,
    pub on_progress: Option<Arc<dyn Fn(&Progress) + Send + Sync>>,
    pub on_finish: Option<Arc<dyn Fn(&Visit, VisitStatus) + Send + Sync>>,
    pub on_cancel: Option<Arc<dyn Fn() + Send + Sync>>,
    pub on_success: Option<Arc<dyn Fn(&Page) + Send + Sync>>,
    pub on_error: Option<Arc<dyn Fn(&Errors) + Send + Sync>>,
}

impl fmt::Debug for VisitCallbacks {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("VisitCallbacks")
            .field("on_cancel_token", &self.on_cancel_token.is_some())
            .field("on_before", &self.on_before.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// A visit with every default resolved, as seen by hooks and listeners.
#[derive(Clone, Debug)]
pub struct Visit {
    pub url: Url,
    pub method: Method,
    pub data: RequestPayload,
    pub replace: bool,
    pub preserve_scroll: PreserveOption,
    pub preserve_state: PreserveOption,
    pub only: Vec<String>,
    pub except: Vec<String>,
    pub headers: Headers,
    /// `None` when no bag was named.
    pub error_bag: Option<String>,
    pub force_form_data: bool,
    pub query_string_array_format: ArrayFormat,
    pub is_async: bool,
}

impl Visit {
    /// Partial reloads name the props they want.
    pub fn is_partial(&self) -> bool {
        !self.only.is_empty() || !self.except.is_empty()
    }
}

/// What a caller passes to [`Router::visit`](crate::router::Router::visit).
///
/// Unset preserve options fall back to the defaults of the helper used.
#[derive(Clone, Debug, Default)]
pub struct VisitOptions {
    pub method: Method,
    pub data: VisitData,
    pub replace: bool,
    pub preserve_scroll: Option<PreserveOption>,
    pub preserve_state: Option<PreserveOption>,
    pub only: Vec<String>,
    pub except: Vec<String>,
    pub headers: Headers,
    pub error_bag: Option<String>,
    pub force_form_data: bool,
    /// `None` uses [`RouterConfig::array_format`](crate::config::RouterConfig).
    pub query_string_array_format: Option<ArrayFormat>,
    pub is_async: bool,
    pub callbacks: VisitCallbacks,
}

impl VisitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn data(mut self, data: impl Into<VisitData>) -> Self {
        self.data = data.into();
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.data.fields.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    #[must_use]
    pub fn preserve_scroll(mut self, option: impl Into<PreserveOption>) -> Self {
        self.preserve_scroll = Some(option.into());
        self
    }

    #[must_use]
    pub fn preserve_state(mut self, option: impl Into<PreserveOption>) -> Self {
        self.preserve_state = Some(option.into());
        self
    }

    #[must_use]
    pub fn only<Name: Into<String>>(mut self, names: impl IntoIterator<Item = Name>) -> Self {
        self.only = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn except<Name: Into<String>>(mut self, names: impl IntoIterator<Item = Name>) -> Self {
        self.except = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn error_bag(mut self, bag: impl Into<String>) -> Self {
        self.error_bag = Some(bag.into());
        self
    }

    #[must_use]
    pub fn force_form_data(mut self, force: bool) -> Self {
        self.force_form_data = force;
        self
    }

    #[must_use]
    pub fn array_format(mut self, format: ArrayFormat) -> Self {
        self.query_string_array_format = Some(format);
        self
    }

    #[must_use]
    pub fn asynchronous(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    #[must_use]
    pub fn callbacks(mut self, callbacks: VisitCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    #[must_use]
    pub fn on_before(mut self, hook: impl Fn(&Visit) -> bool + Send + Sync + 'static) -> Self {
        self.callbacks.on_before = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_start(mut self, hook: impl Fn(&Visit) + Send + Sync + 'static) -> Self {
        self.callbacks.on_start = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_progress(mut self, hook: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.callbacks.on_progress = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_finish(
        mut self,
        hook: impl Fn(&Visit, VisitStatus) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_finish = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_cancel(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_cancel = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_cancel_token(mut self, hook: impl Fn(CancelToken) + Send + Sync + 'static) -> Self {
        self.callbacks.on_cancel_token = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_success(mut self, hook: impl Fn(&Page) + Send + Sync + 'static) -> Self {
        self.callbacks.on_success = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&Errors) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(hook));
        self
    }

    /// Fill unset preserve options.
    #[must_use]
    pub(crate) fn with_preserve_defaults(mut self, scroll: bool, state: bool) -> Self {
        self.preserve_scroll.get_or_insert(PreserveOption::Bool(scroll));
        self.preserve_state.get_or_insert(PreserveOption::Bool(state));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preserve_resolution() {
        let clean = Page::new("Form", "/form");
        let invalid = Page::new("Form", "/form").with_prop("errors", json!({ "email": "taken" }));

        assert!(PreserveOption::Errors.resolve(&invalid));
        assert!(!PreserveOption::Errors.resolve(&clean));
        assert!(PreserveOption::from(true).resolve(&clean));

        let same_component = PreserveOption::predicate(|page| page.component == "Form");
        assert!(same_component.resolve(&clean));
        assert!(!same_component.is_literally_true());
        assert!(PreserveOption::Bool(true).is_literally_true());
    }

    #[test]
    fn defaults_do_not_override_explicit_choices() {
        let options = VisitOptions::new()
            .preserve_scroll(false)
            .with_preserve_defaults(true, true);
        assert!(!options.preserve_scroll.unwrap_or_default().is_literally_true());
        assert!(options.preserve_state.unwrap_or_default().is_literally_true());
    }
}
