//! The storage boundary.

use graphrpc_common::codec::StoreIndex;
use graphrpc_common::graph::{DomainType, ObjectCache, ObjectRef, PersistentObject, Value};
use graphrpc_common::protocol::{Filter, Paging, SortCriterion};
use thiserror::Error;
use uuid::Uuid;

/// Failures a [`Store`] reports. The router answers all of them with a
/// server error carrying the message as data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Object {0} not found")]
    NotFound(Uuid),

    #[error("Object {0} already exists")]
    AlreadyExists(Uuid),

    #[error("Unknown container '{0}'")]
    UnknownContainer(String),

    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Storage failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A store of persistent objects, grouped in named containers.
///
/// Writes receive the decoded request graph: `objects` holds every node the
/// request carried and `target` is the root being written. Queries are
/// generic over the domain type; the server reaches them through
/// [`GenericOperations`](crate::GenericOperations).
///
/// Implementations are called from blocking worker threads and must be
/// safe to share.
pub trait Store: StoreIndex + Send + Sync + 'static {
    /// Stores a new object together with the nodes it reaches.
    ///
    /// # Arguments
    ///
    /// * `objects` - Every node decoded from the request
    /// * `target` - The root being added
    ///
    /// # Returns
    ///
    /// `AlreadyExists` if the root is already stored. Reached nodes the
    /// store already holds are left as they are.
    fn add(&self, objects: &ObjectCache, target: &ObjectRef) -> StoreResult<()>;

    /// Replaces the stored state of `target` and of the nodes it reaches.
    ///
    /// Children that the stored version referenced and the new version no
    /// longer does are removed unless something else still references them.
    ///
    /// # Arguments
    ///
    /// * `objects` - Every node decoded from the request
    /// * `target` - The root being updated; must already be stored
    fn update(&self, objects: &ObjectCache, target: &ObjectRef) -> StoreResult<()>;

    /// Removes one object, leaving a tombstone until the next cleanup.
    ///
    /// `object` is the stored state, materialized by the caller before
    /// removal starts.
    fn remove(&self, object: &PersistentObject) -> StoreResult<()>;

    /// Removes `object` and what it references, transitively. With
    /// `only_if_unreferenced`, objects still referenced from outside the
    /// removed set are kept.
    fn remove_cascaded(&self, object: &PersistentObject, only_if_unreferenced: bool) -> StoreResult<()>;

    /// Whether `container` currently holds `id`.
    fn contains(&self, container: &str, id: Uuid) -> StoreResult<bool>;

    /// Whether `id` was removed from `container` since the last cleanup.
    fn is_id_deleted(&self, container: &str, id: Uuid) -> StoreResult<bool>;

    /// The stored state of one object.
    ///
    /// # Returns
    ///
    /// `None` when the container does not hold `id`; `UnknownContainer`
    /// when the container itself does not exist.
    fn retrieve(&self, container: &str, id: Uuid) -> StoreResult<Option<PersistentObject>>;

    /// Loads a node by id alone, used to expand response graphs.
    fn load(&self, id: Uuid) -> Option<PersistentObject>;

    /// Number of `T` objects in `container` matching `filter`.
    fn count<T: DomainType>(&self, container: &str, filter: &Filter) -> StoreResult<i64>;

    /// `T` objects of `container` matching `filter`.
    ///
    /// # Arguments
    ///
    /// * `container` - Container to search
    /// * `filter` - Predicate over field values
    /// * `sort` - Criteria applied in order; ties keep id order
    /// * `paging` - Window over the sorted matches
    fn find<T: DomainType>(
        &self,
        container: &str,
        filter: &Filter,
        sort: &[SortCriterion],
        paging: Paging,
    ) -> StoreResult<Vec<PersistentObject>>;

    /// Objects of the container that do not match `filter`.
    fn find_complement<T: DomainType>(
        &self,
        container: &str,
        filter: &Filter,
        sort: &[SortCriterion],
        paging: Paging,
    ) -> StoreResult<Vec<PersistentObject>> {
        self.find::<T>(container, &filter.clone().negate(), sort, paging)
    }

    /// Distinct values of one field across the matching objects.
    fn find_distinct_values<T: DomainType>(
        &self,
        container: &str,
        field_name: &str,
        filter: &Filter,
    ) -> StoreResult<Vec<Value>>;

    /// One sum per entry of `field_names`, in the same order. Non-numeric
    /// values are skipped.
    fn find_sums_of_values<T: DomainType>(
        &self,
        container: &str,
        field_names: &[String],
        filter: &Filter,
    ) -> StoreResult<Vec<f64>>;

    /// One average per entry of `field_names`; zero when nothing matches.
    fn find_average_values<T: DomainType>(
        &self,
        container: &str,
        field_names: &[String],
        filter: &Filter,
    ) -> StoreResult<Vec<f64>>;

    /// Container holding objects tagged `type_tag`.
    fn container_name_of_type(&self, type_tag: &str) -> Option<String>;

    /// Type tag of the objects held by `container`.
    fn type_of_container(&self, container: &str) -> Option<String>;

    /// Purges bookkeeping about removed objects.
    fn cleanup(&self) -> StoreResult<()>;
}
