//! Filtered, sorted, paginated authority listings with row-level visibility.
//!
//! Admins see every authority. Everyone else sees only the authorities
//! whose role set includes at least one role they hold.

use serde::{Deserialize, Serialize};

use crate::error::{AuthorityError, Result};
use crate::identity::ActingIdentity;
use crate::model::Authority;
use crate::store::{AuthorityField, AuthorityQuery, FieldFilter, Page, SortDirection, Store};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Listing parameters as received from the API layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListParams {
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub page: usize,
    pub count: usize,
    /// `field;value`.
    pub filter: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            sort_by: None,
            sort_dir: None,
            page: DEFAULT_PAGE,
            count: DEFAULT_PAGE_SIZE,
            filter: None,
        }
    }
}

impl ListParams {
    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(expr.into());
        self
    }

    pub fn sort(mut self, field: impl Into<String>, dir: impl Into<String>) -> Self {
        self.sort_by = Some(field.into());
        self.sort_dir = Some(dir.into());
        self
    }

    pub fn page(mut self, page: usize, count: usize) -> Self {
        self.page = page;
        self.count = count;
        self
    }
}

/// Parse a `field;value` filter expression.
///
/// `active` compares the flag's text form exactly, so `active;true` matches
/// and `active;1` does not. Every other field is a case-insensitive contains.
pub fn parse_filter(expr: &str) -> Result<FieldFilter> {
    let (field, value) = expr
        .split_once(';')
        .ok_or_else(|| AuthorityError::Validation(format!("malformed filter: {expr}")))?;

    if field == "active" {
        return Ok(FieldFilter::ActiveEquals(value.to_string()));
    }
    let field = AuthorityField::parse(field)
        .ok_or_else(|| AuthorityError::Validation(format!("unknown filter field: {field}")))?;
    Ok(FieldFilter::Contains {
        field,
        needle: value.to_string(),
    })
}

/// Sorting applies only when both field and direction are supplied.
fn parse_sort(params: &ListParams) -> Result<Option<(AuthorityField, SortDirection)>> {
    let (Some(field), Some(dir)) = (params.sort_by.as_deref(), params.sort_dir.as_deref()) else {
        return Ok(None);
    };
    let field = AuthorityField::parse(field)
        .ok_or_else(|| AuthorityError::Validation(format!("unknown sort field: {field}")))?;
    let dir = SortDirection::parse(dir)
        .ok_or_else(|| AuthorityError::Validation(format!("unknown sort direction: {dir}")))?;
    Ok(Some((field, dir)))
}

/// Build the listing visible to `identity`.
pub fn render(
    store: &Store,
    identity: &ActingIdentity,
    params: &ListParams,
) -> Result<Page<Authority>> {
    if params.count == 0 {
        return Err(AuthorityError::Validation("page size must be positive".to_string()));
    }

    let filter = params.filter.as_deref().map(parse_filter).transpose()?;
    let sort = parse_sort(params)?;
    let within = if identity.is_admin {
        None
    } else {
        Some(store.authorities_for_roles(&identity.roles))
    };

    let page = store.query_authorities(&AuthorityQuery {
        filter,
        within,
        sort,
        page: params.page.max(1),
        page_size: params.count,
    });
    tracing::debug!(
        identity = %identity.id,
        admin = identity.is_admin,
        total = page.total,
        "Authorities rendered"
    );
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_filter_keeps_literal_text() {
        assert_eq!(
            parse_filter("active;true").unwrap(),
            FieldFilter::ActiveEquals("true".to_string())
        );
        assert_eq!(
            parse_filter("active;1").unwrap(),
            FieldFilter::ActiveEquals("1".to_string())
        );
    }

    #[test]
    fn other_fields_become_contains() {
        assert_eq!(
            parse_filter("owner;alice").unwrap(),
            FieldFilter::Contains {
                field: AuthorityField::Owner,
                needle: "alice".to_string()
            }
        );
        // only the first separator splits
        assert_eq!(
            parse_filter("description;a;b").unwrap(),
            FieldFilter::Contains {
                field: AuthorityField::Description,
                needle: "a;b".to_string()
            }
        );
    }

    #[test]
    fn malformed_and_unknown_filters_are_rejected() {
        assert!(matches!(
            parse_filter("owner"),
            Err(AuthorityError::Validation(_))
        ));
        assert!(matches!(
            parse_filter("secret;x"),
            Err(AuthorityError::Validation(_))
        ));
    }

    #[test]
    fn sort_needs_both_halves() {
        let only_field = ListParams {
            sort_by: Some("name".into()),
            ..ListParams::default()
        };
        assert_eq!(parse_sort(&only_field).unwrap(), None);

        let both = ListParams::default().sort("name", "DESC");
        assert_eq!(
            parse_sort(&both).unwrap(),
            Some((AuthorityField::Name, SortDirection::Desc))
        );

        let bad = ListParams::default().sort("name", "sideways");
        assert!(parse_sort(&bad).is_err());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let store = Store::in_memory();
        let identity = ActingIdentity::admin("root@example.com");
        let err = render(&store, &identity, &ListParams::default().page(1, 0)).unwrap_err();
        assert!(matches!(err, AuthorityError::Validation(_)));
    }

    #[test]
    fn defaults_when_fields_are_omitted() {
        let params: ListParams = serde_json::from_str(r#"{"filter":"name;root"}"#).unwrap();
        assert_eq!(params.page, DEFAULT_PAGE);
        assert_eq!(params.count, DEFAULT_PAGE_SIZE);
        assert_eq!(params.filter.as_deref(), Some("name;root"));
    }
}
