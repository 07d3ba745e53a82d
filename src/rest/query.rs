//! Search and association query parameters
//!
//! Collection endpoints filter with `filter=FIELD::value`, page with
//! `range=[start-end]`, and resolve associations with the
//! `ASSOCIATEOBJTYPE`/`ASSOCIATEOBJID` pair.

/// Query parameters understood by the collection endpoints
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    filter: Option<String>,
    range: Option<String>,
    associate_obj_type: Option<i64>,
    associate_obj_id: Option<String>,
    obj_type: Option<i64>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by object name
    pub fn by_name(name: &str) -> Self {
        Self::new().filter("NAME", name)
    }

    /// Filter by object id
    pub fn by_id(id: &str) -> Self {
        Self::new().filter("ID", id)
    }

    pub fn filter(mut self, field: &str, value: &str) -> Self {
        self.filter = Some(format!("{field}::{value}"));
        self
    }

    pub fn range(mut self, range: &str) -> Self {
        self.range = Some(range.to_string());
        self
    }

    /// Restrict the listing to objects associated with the given object
    pub fn associated_with(mut self, obj_type: i64, obj_id: i64) -> Self {
        self.associate_obj_type = Some(obj_type);
        self.associate_obj_id = Some(obj_id.to_string());
        self
    }

    /// Type of the objects being listed (association endpoints need it spelled out)
    pub fn of_type(mut self, obj_type: i64) -> Self {
        self.obj_type = Some(obj_type);
        self
    }

    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.clone()));
        }
        if let Some(range) = &self.range {
            pairs.push(("range", range.clone()));
        }
        if let Some(obj_type) = self.associate_obj_type {
            pairs.push(("ASSOCIATEOBJTYPE", obj_type.to_string()));
        }
        if let Some(obj_id) = &self.associate_obj_id {
            pairs.push(("ASSOCIATEOBJID", obj_id.clone()));
        }
        if let Some(obj_type) = self.obj_type {
            pairs.push(("TYPE", obj_type.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_filter_uses_double_colon() {
        let pairs = SearchQuery::by_name("web-01").pairs();
        assert_eq!(pairs, vec![("filter", "NAME::web-01".to_string())]);
    }

    #[test]
    fn test_association_pairs() {
        let pairs = SearchQuery::new()
            .associated_with(11, 42)
            .of_type(256)
            .pairs();

        assert_eq!(
            pairs,
            vec![
                ("ASSOCIATEOBJTYPE", "11".to_string()),
                ("ASSOCIATEOBJID", "42".to_string()),
                ("TYPE", "256".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_query_adds_nothing() {
        assert!(SearchQuery::new().pairs().is_empty());
    }
}
