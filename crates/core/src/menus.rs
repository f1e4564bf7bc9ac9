//! Menu-facing types: item descriptors handed to the external filter and
//! group-by menu widgets, the reconciliation sink for deactivating menu
//! groups no longer represented in the query, and [`FilterGroupField`] — the
//! field implementation backing menu-driven facets.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::query::{Facet, FacetDescriptor, FacetValue, SearchField};
use crate::types::{Category, FilterDefinition, Interval};

// ---------------------------------------------------------------------------
// Menu identifiers and item descriptors
// ---------------------------------------------------------------------------

pub type GroupId = Uuid;
pub type ItemId = Uuid;

/// One entry of the external filters menu.
#[derive(Debug, Clone)]
pub struct FilterMenuItem {
    pub is_active: bool,
    pub description: String,
    pub item_id: ItemId,
    pub group_id: GroupId,
    pub domain: Option<Value>,
}

/// One entry of the external group-by menu.
#[derive(Debug, Clone)]
pub struct GroupByMenuItem {
    pub is_active: bool,
    pub description: String,
    pub item_id: ItemId,
    pub group_id: GroupId,
    pub field_name: String,
    /// Pre-selected date interval, present for date/datetime fields.
    pub default_option: Option<Interval>,
}

/// Couples a group-by menu item to its grouped field and the currently
/// selected date interval. Normalized into the payload's interval mapping.
#[derive(Debug, Clone)]
pub struct IntervalBinding {
    pub item_id: ItemId,
    pub field_name: String,
    pub interval: Interval,
}

/// Receiving side of menu reconciliation. After every rebuild the controller
/// recomputes which menu groups the query still represents and asks the
/// external menu widgets to deactivate the rest.
pub trait MenuSink {
    fn unset_groups(&mut self, category: Category, group_ids: &[GroupId]);
}

/// No-op sink for hosts without menu widgets.
pub struct NullMenuSink;

impl MenuSink for NullMenuSink {
    fn unset_groups(&mut self, _category: Category, _group_ids: &[GroupId]) {}
}

// ---------------------------------------------------------------------------
// Group field
// ---------------------------------------------------------------------------

/// Field backing the facets created from one menu group of filters or
/// group-bys. The facet's values are the active entries of the group:
/// filters store their name token, group-bys their field name.
pub struct FilterGroupField {
    key: String,
    category: Category,
    filters: Vec<FilterDefinition>,
}

impl FilterGroupField {
    pub fn new(category: Category, filters: Vec<FilterDefinition>) -> Self {
        FilterGroupField {
            key: format!("group:{}", Uuid::new_v4()),
            category,
            filters,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn filters(&self) -> &[FilterDefinition] {
        &self.filters
    }

    /// The facet value representing `def` within this group.
    pub fn value_for(&self, def: &FilterDefinition) -> FacetValue {
        match self.category {
            Category::GroupBy => FacetValue::new(
                def.field_name.clone().unwrap_or_else(|| def.name.clone()),
                def.label.clone(),
            ),
            _ => FacetValue::new(def.name.clone(), def.label.clone()),
        }
    }

    /// Descriptor toggling `def` in a query.
    pub fn descriptor_for(self: &Arc<Self>, def: &FilterDefinition) -> FacetDescriptor {
        FacetDescriptor::new(
            self.category,
            Arc::<FilterGroupField>::clone(self) as Arc<dyn SearchField>,
            vec![self.value_for(def)],
        )
    }

    pub fn find_by_name(&self, name: &str) -> Option<&FilterDefinition> {
        self.filters.iter().find(|f| f.name == name)
    }

    fn find_by_token(&self, token: &str) -> Option<&FilterDefinition> {
        match self.category {
            Category::GroupBy => self
                .filters
                .iter()
                .find(|f| f.field_name.as_deref() == Some(token)),
            _ => self.find_by_name(token),
        }
    }

    fn active_definitions<'a>(&'a self, facet: &'a Facet) -> impl Iterator<Item = &'a FilterDefinition> {
        facet
            .values
            .iter()
            .filter_map(|v| v.value.as_str())
            .filter_map(|token| self.find_by_token(token))
    }
}

impl SearchField for FilterGroupField {
    fn key(&self) -> &str {
        &self.key
    }

    /// OR-combination of the active filters' domains, in domain prefix
    /// notation: `n` domains yield `n - 1` leading `"|"` operators followed
    /// by the spliced domain leaves.
    fn domain(&self, facet: &Facet) -> Option<Value> {
        let domains: Vec<Value> = self
            .active_definitions(facet)
            .filter_map(|def| def.domain.clone())
            .collect();
        match domains.len() {
            0 => None,
            1 => Some(domains.into_iter().next().unwrap()),
            n => {
                let mut combined = vec![Value::String("|".into()); n - 1];
                for domain in domains {
                    match domain {
                        Value::Array(leaves) => combined.extend(leaves),
                        other => combined.push(other),
                    }
                }
                Some(Value::Array(combined))
            }
        }
    }

    /// Shallow merge of the active filters' context objects. Contexts that
    /// do not parse as JSON objects are skipped (they were already reported
    /// at classification time).
    fn context(&self, facet: &Facet) -> Option<Value> {
        let mut merged = serde_json::Map::new();
        for def in self.active_definitions(facet) {
            let Some(raw) = def.context.as_deref() else {
                continue;
            };
            if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(raw) {
                for (k, v) in obj {
                    if k != "group_by" {
                        merged.insert(k, v);
                    }
                }
            }
        }
        if merged.is_empty() {
            None
        } else {
            Some(Value::Object(merged))
        }
    }

    /// One fragment per active group-by value: the grouped field's name.
    /// Granularity travels separately in the payload's interval mapping.
    fn groupby(&self, facet: &Facet) -> Option<Vec<Value>> {
        if self.category != Category::GroupBy {
            return None;
        }
        let fragments: Vec<Value> = facet
            .values
            .iter()
            .filter_map(|v| v.value.as_str())
            .map(|token| Value::String(token.to_string()))
            .collect();
        if fragments.is_empty() {
            None
        } else {
            Some(fragments)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter_facet(field: &Arc<FilterGroupField>, names: &[&str]) -> Facet {
        Facet {
            id: 1,
            category: field.category(),
            field: Arc::<FilterGroupField>::clone(field) as Arc<dyn SearchField>,
            separator: None,
            values: names
                .iter()
                .map(|n| {
                    let def = field.find_by_token(n).expect("unknown token in test");
                    field.value_for(def)
                })
                .collect(),
        }
    }

    fn group(category: Category, defs: Vec<FilterDefinition>) -> Arc<FilterGroupField> {
        Arc::new(FilterGroupField::new(category, defs))
    }

    #[test]
    fn single_active_filter_yields_its_domain() {
        let g = group(
            Category::Filters,
            vec![FilterDefinition::new("open", "Open")
                .with_domain(json!([["state", "=", "open"]]))],
        );
        let facet = filter_facet(&g, &["open"]);
        assert_eq!(g.domain(&facet), Some(json!([["state", "=", "open"]])));
    }

    #[test]
    fn multiple_active_filters_or_their_domains() {
        let g = group(
            Category::Filters,
            vec![
                FilterDefinition::new("open", "Open").with_domain(json!([["state", "=", "open"]])),
                FilterDefinition::new("done", "Done").with_domain(json!([["state", "=", "done"]])),
            ],
        );
        let facet = filter_facet(&g, &["open", "done"]);
        assert_eq!(
            g.domain(&facet),
            Some(json!(["|", ["state", "=", "open"], ["state", "=", "done"]]))
        );
    }

    #[test]
    fn inactive_filters_contribute_nothing() {
        let g = group(
            Category::Filters,
            vec![
                FilterDefinition::new("open", "Open").with_domain(json!([["state", "=", "open"]])),
                FilterDefinition::new("done", "Done").with_domain(json!([["state", "=", "done"]])),
            ],
        );
        let facet = filter_facet(&g, &["done"]);
        assert_eq!(g.domain(&facet), Some(json!([["state", "=", "done"]])));
    }

    #[test]
    fn contexts_merge_without_group_by_key() {
        let g = group(
            Category::Filters,
            vec![
                FilterDefinition::new("a", "A").with_context(r#"{"default_x": 1}"#),
                FilterDefinition::new("b", "B").with_context(r#"{"default_y": 2, "group_by": "x"}"#),
            ],
        );
        let facet = filter_facet(&g, &["a", "b"]);
        assert_eq!(g.context(&facet), Some(json!({"default_x": 1, "default_y": 2})));
    }

    #[test]
    fn groupby_group_emits_field_name_fragments() {
        let mut date = FilterDefinition::new("by_date", "Date")
            .with_context(r#"{"group_by": "create_date:week"}"#);
        date.classify();
        let mut status = FilterDefinition::new("by_status", "Status")
            .with_context(r#"{"group_by": "status"}"#);
        status.classify();

        let g = group(Category::GroupBy, vec![date, status]);
        let facet = filter_facet(&g, &["create_date", "status"]);
        assert_eq!(g.groupby(&facet), Some(vec![json!("create_date"), json!("status")]));
        assert_eq!(g.domain(&facet), None);
    }

    #[test]
    fn filters_group_never_emits_groupbys() {
        let g = group(
            Category::Filters,
            vec![FilterDefinition::new("open", "Open")],
        );
        let facet = filter_facet(&g, &["open"]);
        assert_eq!(g.groupby(&facet), None);
    }
}
