//! The page object exchanged with the server.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Page props keyed by prop name.
pub type Props = Map<String, Value>;

/// Validation errors keyed by field name, or by error bag then field name.
pub type Errors = Map<String, Value>;

/// Prop holding validation errors.
pub const ERRORS_PROP: &str = "errors";

/// Prop naming groups of props the server wants loaded after the first render.
pub const DEFERRED_PROP: &str = "deferred";

/// Captured scroll offset of one scrollable region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollRegion {
    pub top: f64,
    pub left: f64,
}

/// The unit of navigable state.
///
/// Only the [`PageStore`](crate::store::PageStore) replaces the current page;
/// everybody else works on clones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Name the component resolver turns into a renderable unit.
    pub component: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub props: Props,
    /// Canonical URL including the query and possibly a hash.
    pub url: String,
    /// Asset version token used for cache busting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scroll_regions: Vec<ScrollRegion>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remembered_state: Map<String, Value>,
}

impl Page {
    /// Create a page with no props and no version.
    pub fn new(component: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            props: Props::new(),
            url: url.into(),
            version: None,
            scroll_regions: Vec::new(),
            remembered_state: Map::new(),
        }
    }

    /// Builder-style prop insertion.
    #[must_use]
    pub fn with_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }

    /// Builder-style version assignment.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Validation errors carried in the `errors` prop, empty when absent.
    pub fn errors(&self) -> Errors {
        self.props
            .get(ERRORS_PROP)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        self.props
            .get(ERRORS_PROP)
            .and_then(Value::as_object)
            .is_some_and(|errors| !errors.is_empty())
    }

    /// Deferred prop groups declared by the server.
    ///
    /// Entries that are not arrays of strings are ignored.
    pub fn deferred(&self) -> BTreeMap<String, Vec<String>> {
        let Some(groups) = self.props.get(DEFERRED_PROP).and_then(Value::as_object) else {
            return BTreeMap::new();
        };
        groups
            .iter()
            .filter_map(|(group, props)| {
                let names: Vec<String> = props
                    .as_array()?
                    .iter()
                    .filter_map(|name| name.as_str().map(str::to_owned))
                    .collect();
                (!names.is_empty()).then(|| (group.clone(), names))
            })
            .collect()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
