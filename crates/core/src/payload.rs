//! Search payload building: project the current query into the domain,
//! context and group-by fragments the consuming view understands.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::menus::IntervalBinding;
use crate::query::SearchQuery;
use crate::types::Interval;

/// Payload of one `search` emission. Fragment order follows facet order;
/// group-by fragments are flattened since one facet can contribute several
/// levels. `interval_mapping` normalizes the controller's interval table to
/// one granularity per grouped field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchData {
    pub domains: Vec<Value>,
    pub contexts: Vec<Value>,
    pub groupbys: Vec<Value>,
    pub interval_mapping: BTreeMap<String, Interval>,
}

/// Build the search payload. Pure: the query is only read.
pub fn build_search_data(query: &SearchQuery, intervals: &[IntervalBinding]) -> SearchData {
    let mut data = SearchData::default();
    for facet in query.facets() {
        if let Some(domain) = facet.field.domain(facet) {
            data.domains.push(domain);
        }
        if let Some(context) = facet.field.context(facet) {
            data.contexts.push(context);
        }
        if let Some(groupbys) = facet.field.groupby(facet) {
            data.groupbys.extend(groupbys);
        }
    }
    for binding in intervals {
        data.interval_mapping
            .insert(binding.field_name.clone(), binding.interval);
    }
    data
}
