//! Shared types for the FacetBar core: facet categories, date-group-by
//! intervals, field metadata, and filter definitions with group-by
//! shorthand classification.

use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Which side of the search semantics a facet belongs to.
///
/// `Filters` and `GroupBy` facets are driven by the external menu widgets;
/// `Field` facets are built from typed search fields (free text, selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Filters,
    GroupBy,
    Field,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Filters => "filters",
            Category::GroupBy => "group_by",
            Category::Field => "field",
        }
    }
}

// ---------------------------------------------------------------------------
// Date intervals
// ---------------------------------------------------------------------------

/// Granularity of a date-field group-by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Interval {
    /// Default granularity when a date group-by carries no explicit interval.
    pub const DEFAULT: Interval = Interval::Month;

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
            Interval::Quarter => "quarter",
            Interval::Year => "year",
        }
    }

    /// Human-readable label shown next to a group-by chip value.
    pub fn label(&self) -> &'static str {
        match self {
            Interval::Day => "Day",
            Interval::Week => "Week",
            Interval::Month => "Month",
            Interval::Quarter => "Quarter",
            Interval::Year => "Year",
        }
    }

    pub fn parse(s: &str) -> Option<Interval> {
        match s {
            "day" => Some(Interval::Day),
            "week" => Some(Interval::Week),
            "month" => Some(Interval::Month),
            "quarter" => Some(Interval::Quarter),
            "year" => Some(Interval::Year),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Field metadata
// ---------------------------------------------------------------------------

/// Type of a model field, as declared by the consuming view. Only the
/// date-ness matters to the search bar (date group-bys get an interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Char,
    Integer,
    Float,
    Boolean,
    Selection,
    Many2One,
    Date,
    DateTime,
}

impl FieldType {
    pub fn is_date(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateTime)
    }
}

// ---------------------------------------------------------------------------
// Filter definitions
// ---------------------------------------------------------------------------

/// One filter entry as handed over by the external arch parser.
///
/// `name` is the stable token identifying the filter (it becomes the facet
/// value); `label` is what the user sees. A definition whose context
/// expression declares a `group_by` is reclassified by [`FilterDefinition::classify`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub domain: Option<serde_json::Value>,
    /// Raw context expression; parsed as JSON to detect group-by shorthand.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub invisible: bool,
    /// Field the filter groups on. Set by classification, or directly by the
    /// caller for user-defined group-bys.
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub default_interval: Option<Interval>,
}

impl FilterDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        FilterDefinition {
            name: name.into(),
            label: label.into(),
            domain: None,
            context: None,
            help: None,
            invisible: false,
            field_name: None,
            default_interval: None,
        }
    }

    pub fn with_domain(mut self, domain: serde_json::Value) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Build a group-by definition directly, bypassing context detection.
    pub fn groupby(
        name: impl Into<String>,
        label: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        let mut def = FilterDefinition::new(name, label);
        def.field_name = Some(field_name.into());
        def
    }

    /// Classify this definition as `Filters` or `GroupBy` by inspecting its
    /// context expression for group-by shorthand (`{"group_by": "field:interval"}`).
    ///
    /// A malformed context expression is absorbed: the definition falls back
    /// to the `Filters` category. The failure is logged so test runs can
    /// observe the fallback.
    pub fn classify(&mut self) -> Category {
        if self.field_name.is_some() {
            return Category::GroupBy;
        }
        let Some(raw) = self.context.as_deref() else {
            return Category::Filters;
        };
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(ctx) => {
                if let Some(group_by) = ctx.get("group_by").and_then(|v| v.as_str()) {
                    let mut parts = group_by.splitn(2, ':');
                    let field = parts.next().unwrap_or(group_by);
                    self.field_name = Some(field.to_string());
                    self.default_interval = parts.next().and_then(Interval::parse);
                    return Category::GroupBy;
                }
                Category::Filters
            }
            Err(err) => {
                debug!(filter = %self.name, %err, "malformed context expression, treating as plain filter");
                Category::Filters
            }
        }
    }
}
