use std::sync::Arc;

use bson::Document;

use crate::manager::Manager;

/// Per-scenario state: the shared manager and the result of the last search.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    manager: Arc<Manager>,
    search_result: Option<Vec<Document>>,
}

impl ScenarioContext {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self {
            manager,
            search_result: None,
        }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Documents found by the last search step, if any ran.
    pub fn search_result(&self) -> Option<&[Document]> {
        self.search_result.as_deref()
    }

    /// Replaces the stored result.
    pub fn set_search_result(&mut self, docs: Vec<Document>) {
        self.search_result = Some(docs);
    }

    pub fn clear_search_result(&mut self) {
        self.search_result = None;
    }
}

/// Implemented by a cucumber `World` that carries a [`ScenarioContext`].
pub trait MongoWorld: 'static {
    fn mongo(&mut self) -> &mut ScenarioContext;
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn search_result_is_replaced_and_cleared() {
        let mut ctx = ScenarioContext::new(Arc::new(Manager::default()));
        assert!(ctx.search_result().is_none());

        ctx.set_search_result(vec![doc! { "_id": 1 }, doc! { "_id": 2 }]);
        ctx.set_search_result(vec![doc! { "_id": 3 }]);
        assert_eq!(ctx.search_result(), Some(&[doc! { "_id": 3 }][..]));

        ctx.clear_search_result();
        assert!(ctx.search_result().is_none());
    }
}
