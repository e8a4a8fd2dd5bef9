//! An in-process, in-memory stand-in for [`super::UpstreamGateway`], used
//! by the router, inverse-relation, and graph-state-capture test suites so
//! they can exercise the write path without a real HTTP client
//! (SPEC_FULL.md §1.1: the trait exists precisely so tests can substitute
//! a fake upstream).

#![cfg(any(test, feature = "test-util"))]

use super::{GatewayError, Page, PropertyBag, PropertyPage, PropertyValue, QueryFilter, QueryPage, UpstreamGateway};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct FakeGateway {
    pages: Mutex<HashMap<String, Page>>,
    next_id: Mutex<u128>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    pub fn insert(&self, page: Page) {
        self.pages.lock().unwrap().insert(page.id.clone(), page);
    }

    pub fn get(&self, id: &str) -> Option<Page> {
        self.pages.lock().unwrap().get(id).cloned()
    }
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_properties(properties: &mut PropertyBag, patch: &Value) {
    let Some(obj) = patch.as_object() else { return };
    for (name, value) in obj {
        if let Ok(decoded) = serde_json::from_value::<PropertyValue>(value.clone()) {
            properties.insert(name.clone(), decoded);
        }
    }
}

#[async_trait]
impl UpstreamGateway for FakeGateway {
    async fn query_database(
        &self,
        db_id: &str,
        cursor: Option<&str>,
        page_size: u32,
        _filter: Option<&QueryFilter>,
    ) -> Result<QueryPage, GatewayError> {
        let pages = self.pages.lock().unwrap();
        let mut matching: Vec<Page> = pages
            .values()
            .filter(|p| p.parent_database_id == db_id && !p.archived)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));

        let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + page_size as usize).min(matching.len());
        let slice = matching[start..end].to_vec();
        let has_more = end < matching.len();

        Ok(QueryPage {
            pages: slice,
            next_cursor: if has_more { Some(end.to_string()) } else { None },
            has_more,
        })
    }

    async fn retrieve_page(&self, id: &str) -> Result<Page, GatewayError> {
        self.pages
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn retrieve_property(
        &self,
        page_id: &str,
        property_id: &str,
        _cursor: Option<&str>,
    ) -> Result<PropertyPage, GatewayError> {
        let pages = self.pages.lock().unwrap();
        let page = pages.get(page_id).ok_or_else(|| GatewayError::NotFound(page_id.to_string()))?;
        let value = page
            .properties
            .get(property_id)
            .cloned()
            .unwrap_or(PropertyValue::Unknown);
        Ok(PropertyPage {
            value,
            next_cursor: None,
            has_more: false,
        })
    }

    async fn update_page(&self, id: &str, properties: &Value) -> Result<Page, GatewayError> {
        let mut pages = self.pages.lock().unwrap();
        let page = pages.get_mut(id).ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        apply_properties(&mut page.properties, properties);
        page.last_edited_time = "1970-01-01T00:00:01Z".to_string();
        Ok(page.clone())
    }

    async fn create_page(&self, parent_db_id: &str, properties: &Value) -> Result<Page, GatewayError> {
        let mut next_id = self.next_id.lock().unwrap();
        let id = uuid::Uuid::from_u128(*next_id).to_string();
        *next_id += 1;
        drop(next_id);

        let mut page = Page {
            id: id.clone(),
            parent_database_id: parent_db_id.to_string(),
            last_edited_time: "1970-01-01T00:00:00Z".to_string(),
            archived: false,
            properties: PropertyBag::new(),
        };
        apply_properties(&mut page.properties, properties);
        self.pages.lock().unwrap().insert(id, page.clone());
        Ok(page)
    }

    async fn archive_page(&self, id: &str) -> Result<Page, GatewayError> {
        let mut pages = self.pages.lock().unwrap();
        let page = pages.get_mut(id).ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        page.archived = true;
        Ok(page.clone())
    }
}
