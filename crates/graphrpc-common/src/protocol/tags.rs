//! Wire tags of every transient protocol record.
//!
//! This is the tag-to-variant registry: a tag listed here decodes into a
//! [`Record`](crate::codec::Record) that is never cached, and each protocol
//! type maps its variants onto these tags explicitly. Tags are only ever
//! added; an existing tag never changes meaning.

pub const REQUEST: &str = "Request";
pub const RESPONSE: &str = "Response";
pub const ERROR_RESPONSE: &str = "ErrorResponse";

pub const BY_ID: &str = "ById";
pub const BY_CONTAINER_NAME: &str = "ByContainerName";
pub const BY_TYPE_TAG: &str = "ByTypeTag";
pub const BY_CONTAINER_NAME_AND_ID: &str = "ByContainerNameAndId";
pub const BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FILTER: &str =
    "ByContainerNameAndGenericTypeAndFilter";
pub const BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FILTER_AND_SORT_AND_PAGING: &str =
    "ByContainerNameAndGenericTypeAndFilterAndSortAndPaging";
pub const BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FIELD_NAME_AND_FILTER: &str =
    "ByContainerNameAndGenericTypeAndFieldNameAndFilter";
pub const BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FIELD_NAMES_AND_FILTER: &str =
    "ByContainerNameAndGenericTypeAndFieldNamesAndFilter";
pub const BY_FILTER_AND_SORT_AND_PAGING: &str = "ByFilterAndSortAndPaging";
pub const BY_PERSISTENT_OBJECT: &str = "ByPersistentObject";
pub const BY_PERSISTENT_OBJECT_AND_FLAG: &str = "ByPersistentObjectAndFlag";

pub const BOOL_RESULT: &str = "BoolResult";
pub const NULLABLE_BOOL_RESULT: &str = "NullableBoolResult";
pub const INT_RESULT: &str = "IntResult";
pub const STRING_RESULT: &str = "StringResult";
pub const LIST_OF_STRING_RESULT: &str = "ListOfStringResult";
pub const LIST_OF_PERSISTENT_OBJECT_RESULT: &str = "ListOfPersistentObjectResult";
pub const PERSISTENT_OBJECT_RESULT: &str = "PersistentObjectResult";
pub const LIST_OF_DECIMAL_RESULT: &str = "ListOfDecimalResult";
pub const LIST_OF_VALUE_RESULT: &str = "ListOfValueResult";
pub const OBJECT_RESULT: &str = "ObjectResult";

pub const FILTER_ALL: &str = "FilterAll";
pub const FILTER_COMPARE: &str = "FilterCompare";
pub const FILTER_AND: &str = "FilterAnd";
pub const FILTER_OR: &str = "FilterOr";
pub const FILTER_NOT: &str = "FilterNot";
pub const SORT_CRITERION: &str = "SortCriterion";

pub const RECORD_TAGS: &[&str] = &[
    REQUEST,
    RESPONSE,
    ERROR_RESPONSE,
    BY_ID,
    BY_CONTAINER_NAME,
    BY_TYPE_TAG,
    BY_CONTAINER_NAME_AND_ID,
    BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FILTER,
    BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FILTER_AND_SORT_AND_PAGING,
    BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FIELD_NAME_AND_FILTER,
    BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FIELD_NAMES_AND_FILTER,
    BY_FILTER_AND_SORT_AND_PAGING,
    BY_PERSISTENT_OBJECT,
    BY_PERSISTENT_OBJECT_AND_FLAG,
    BOOL_RESULT,
    NULLABLE_BOOL_RESULT,
    INT_RESULT,
    STRING_RESULT,
    LIST_OF_STRING_RESULT,
    LIST_OF_PERSISTENT_OBJECT_RESULT,
    PERSISTENT_OBJECT_RESULT,
    LIST_OF_DECIMAL_RESULT,
    LIST_OF_VALUE_RESULT,
    OBJECT_RESULT,
    FILTER_ALL,
    FILTER_COMPARE,
    FILTER_AND,
    FILTER_OR,
    FILTER_NOT,
    SORT_CRITERION,
];

/// Whether `tag` names a transient protocol record rather than a domain type.
pub fn is_record_tag(tag: &str) -> bool {
    RECORD_TAGS.contains(&tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tags_unique() {
        let unique: HashSet<_> = RECORD_TAGS.iter().collect();
        assert_eq!(unique.len(), RECORD_TAGS.len());
    }

    #[test]
    fn test_domain_tags_are_not_records() {
        assert!(is_record_tag("ById"));
        assert!(!is_record_tag("Invoice"));
    }
}
