//! Parameter variants attached to requests.

use super::filter::{Filter, SortCriterion};
use super::tags;
use crate::codec::{CodecError, Item, Record};
use crate::graph::ObjectRef;
use uuid::Uuid;

/// The closed set of request payloads. Each variant has its own wire tag in
/// [`tags`]; variants are added, never changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameters {
    ById {
        object_id: Uuid,
    },
    ByContainerName {
        container_name: String,
    },
    ByTypeTag {
        type_tag: String,
    },
    ByContainerNameAndId {
        container_name: String,
        object_id: Uuid,
    },
    ByContainerNameAndGenericTypeAndFilter {
        container_name: String,
        type_tag: String,
        filter: Filter,
    },
    ByContainerNameAndGenericTypeAndFilterAndSortAndPaging {
        container_name: String,
        type_tag: String,
        filter: Filter,
        sort: Vec<SortCriterion>,
        paging: Paging,
    },
    ByContainerNameAndGenericTypeAndFieldNameAndFilter {
        container_name: String,
        type_tag: String,
        field_name: String,
        filter: Filter,
    },
    ByContainerNameAndGenericTypeAndFieldNamesAndFilter {
        container_name: String,
        type_tag: String,
        field_names: Vec<String>,
        filter: Filter,
    },
    ByFilterAndSortAndPaging {
        filter: Filter,
        sort: Vec<SortCriterion>,
        paging: Paging,
    },
    ByPersistentObject {
        object: ObjectRef,
    },
    ByPersistentObjectAndFlag {
        object: ObjectRef,
        is_to_be_removed_if_not_referenced_only: bool,
    },
}

/// Window into a sorted result: skip `start`, then take at most `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Paging {
    pub start: usize,
    pub max: Option<usize>,
}

impl Paging {
    /// `max` of `None` takes everything after `start`.
    pub fn new(start: usize, max: Option<usize>) -> Self {
        Self { start, max }
    }

    /// Cuts the window out of already sorted `items`.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let window = items.into_iter().skip(self.start);
        match self.max {
            Some(max) => window.take(max).collect(),
            None => window.collect(),
        }
    }

    fn write(&self, record: Record) -> Record {
        record
            .with("Start", self.start as i64)
            .with("Max", self.max.map(|m| m as i64))
    }

    fn read(record: &mut Record) -> Result<Self, CodecError> {
        let start = record.int("Start")?;
        let max = match record.take("Max") {
            Item::Null => None,
            Item::Int(m) => Some(m),
            other => return Err(record.element_error("Max", &other)),
        };
        let non_negative = |n: i64, name: &str| {
            usize::try_from(n).map_err(|_| {
                CodecError::invalid_record(&record.type_tag, format!("'{}' must not be negative", name))
            })
        };
        Ok(Self {
            start: non_negative(start, "Start")?,
            max: max.map(|m| non_negative(m, "Max")).transpose()?,
        })
    }
}

impl Parameters {
    /// Wire tag naming the variant.
    pub fn tag(&self) -> &'static str {
        match self {
            Parameters::ById { .. } => tags::BY_ID,
            Parameters::ByContainerName { .. } => tags::BY_CONTAINER_NAME,
            Parameters::ByTypeTag { .. } => tags::BY_TYPE_TAG,
            Parameters::ByContainerNameAndId { .. } => tags::BY_CONTAINER_NAME_AND_ID,
            Parameters::ByContainerNameAndGenericTypeAndFilter { .. } => {
                tags::BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FILTER
            }
            Parameters::ByContainerNameAndGenericTypeAndFilterAndSortAndPaging { .. } => {
                tags::BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FILTER_AND_SORT_AND_PAGING
            }
            Parameters::ByContainerNameAndGenericTypeAndFieldNameAndFilter { .. } => {
                tags::BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FIELD_NAME_AND_FILTER
            }
            Parameters::ByContainerNameAndGenericTypeAndFieldNamesAndFilter { .. } => {
                tags::BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FIELD_NAMES_AND_FILTER
            }
            Parameters::ByFilterAndSortAndPaging { .. } => tags::BY_FILTER_AND_SORT_AND_PAGING,
            Parameters::ByPersistentObject { .. } => tags::BY_PERSISTENT_OBJECT,
            Parameters::ByPersistentObjectAndFlag { .. } => tags::BY_PERSISTENT_OBJECT_AND_FLAG,
        }
    }

    pub fn to_record(&self) -> Record {
        let record = Record::new(self.tag());
        match self {
            Parameters::ById { object_id } => record.with("ObjectId", *object_id),
            Parameters::ByContainerName { container_name } => {
                record.with("ContainerName", container_name.as_str())
            }
            Parameters::ByTypeTag { type_tag } => record.with("TypeTag", type_tag.as_str()),
            Parameters::ByContainerNameAndId {
                container_name,
                object_id,
            } => record
                .with("ContainerName", container_name.as_str())
                .with("ObjectId", *object_id),
            Parameters::ByContainerNameAndGenericTypeAndFilter {
                container_name,
                type_tag,
                filter,
            } => record
                .with("ContainerName", container_name.as_str())
                .with("TypeTag", type_tag.as_str())
                .with("Filter", filter.to_record()),
            Parameters::ByContainerNameAndGenericTypeAndFilterAndSortAndPaging {
                container_name,
                type_tag,
                filter,
                sort,
                paging,
            } => paging.write(
                record
                    .with("ContainerName", container_name.as_str())
                    .with("TypeTag", type_tag.as_str())
                    .with("Filter", filter.to_record())
                    .with("Sort", SortCriterion::list_to_item(sort)),
            ),
            Parameters::ByContainerNameAndGenericTypeAndFieldNameAndFilter {
                container_name,
                type_tag,
                field_name,
                filter,
            } => record
                .with("ContainerName", container_name.as_str())
                .with("TypeTag", type_tag.as_str())
                .with("FieldName", field_name.as_str())
                .with("Filter", filter.to_record()),
            Parameters::ByContainerNameAndGenericTypeAndFieldNamesAndFilter {
                container_name,
                type_tag,
                field_names,
                filter,
            } => record
                .with("ContainerName", container_name.as_str())
                .with("TypeTag", type_tag.as_str())
                .with("FieldNames", field_names.clone())
                .with("Filter", filter.to_record()),
            Parameters::ByFilterAndSortAndPaging {
                filter,
                sort,
                paging,
            } => paging.write(
                record
                    .with("Filter", filter.to_record())
                    .with("Sort", SortCriterion::list_to_item(sort)),
            ),
            Parameters::ByPersistentObject { object } => record.with("Object", object.clone()),
            Parameters::ByPersistentObjectAndFlag {
                object,
                is_to_be_removed_if_not_referenced_only,
            } => record
                .with("Object", object.clone())
                .with(
                    "IsToBeRemovedIfNotReferencedOnly",
                    *is_to_be_removed_if_not_referenced_only,
                ),
        }
    }

    /// Reads parameters back from a decoded record. Unknown tags and
    /// negative paging values are rejected.
    pub fn from_record(mut r: Record) -> Result<Self, CodecError> {
        let tag = r.type_tag.clone();
        Ok(match tag.as_str() {
            tags::BY_ID => Parameters::ById {
                object_id: r.uuid("ObjectId")?,
            },
            tags::BY_CONTAINER_NAME => Parameters::ByContainerName {
                container_name: r.text("ContainerName")?,
            },
            tags::BY_TYPE_TAG => Parameters::ByTypeTag {
                type_tag: r.text("TypeTag")?,
            },
            tags::BY_CONTAINER_NAME_AND_ID => Parameters::ByContainerNameAndId {
                container_name: r.text("ContainerName")?,
                object_id: r.uuid("ObjectId")?,
            },
            tags::BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FILTER => {
                Parameters::ByContainerNameAndGenericTypeAndFilter {
                    container_name: r.text("ContainerName")?,
                    type_tag: r.text("TypeTag")?,
                    filter: filter(&mut r)?,
                }
            }
            tags::BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FILTER_AND_SORT_AND_PAGING => {
                Parameters::ByContainerNameAndGenericTypeAndFilterAndSortAndPaging {
                    container_name: r.text("ContainerName")?,
                    type_tag: r.text("TypeTag")?,
                    filter: filter(&mut r)?,
                    sort: SortCriterion::list_from_record(&mut r, "Sort")?,
                    paging: Paging::read(&mut r)?,
                }
            }
            tags::BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FIELD_NAME_AND_FILTER => {
                Parameters::ByContainerNameAndGenericTypeAndFieldNameAndFilter {
                    container_name: r.text("ContainerName")?,
                    type_tag: r.text("TypeTag")?,
                    field_name: r.text("FieldName")?,
                    filter: filter(&mut r)?,
                }
            }
            tags::BY_CONTAINER_NAME_AND_GENERIC_TYPE_AND_FIELD_NAMES_AND_FILTER => {
                Parameters::ByContainerNameAndGenericTypeAndFieldNamesAndFilter {
                    container_name: r.text("ContainerName")?,
                    type_tag: r.text("TypeTag")?,
                    field_names: texts(&mut r, "FieldNames")?,
                    filter: filter(&mut r)?,
                }
            }
            tags::BY_FILTER_AND_SORT_AND_PAGING => Parameters::ByFilterAndSortAndPaging {
                filter: filter(&mut r)?,
                sort: SortCriterion::list_from_record(&mut r, "Sort")?,
                paging: Paging::read(&mut r)?,
            },
            tags::BY_PERSISTENT_OBJECT => Parameters::ByPersistentObject {
                object: r.node("Object")?,
            },
            tags::BY_PERSISTENT_OBJECT_AND_FLAG => Parameters::ByPersistentObjectAndFlag {
                object: r.node("Object")?,
                is_to_be_removed_if_not_referenced_only: r
                    .opt_bool("IsToBeRemovedIfNotReferencedOnly")?
                    .unwrap_or(false),
            },
            other => return Err(CodecError::invalid_record(other, "not a parameter variant")),
        })
    }
}

/// A missing filter means "everything".
fn filter(record: &mut Record) -> Result<Filter, CodecError> {
    match record.opt_record("Filter")? {
        Some(r) => Filter::from_record(r),
        None => Ok(Filter::All),
    }
}

fn texts(record: &mut Record, name: &str) -> Result<Vec<String>, CodecError> {
    record
        .list(name)?
        .into_iter()
        .map(|item| match item {
            Item::Text(s) => Ok(s),
            other => Err(record.element_error(name, &other)),
        })
        .collect()
}
