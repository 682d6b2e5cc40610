//! Type-tag keyed access to the generic store queries.
//!
//! Requests name their domain type by tag; the store's queries are generic
//! over a Rust type. Each registered type contributes a set of closures
//! calling the right instantiation.

use crate::store::{Store, StoreResult};
use graphrpc_common::graph::{DomainType, PersistentObject, Value};
use graphrpc_common::protocol::{Filter, Paging, SortCriterion};
use std::collections::HashMap;
use std::sync::Arc;

type CountFn<S> = Arc<dyn Fn(&S, &str, &Filter) -> StoreResult<i64> + Send + Sync>;
type FindFn<S> = Arc<
    dyn Fn(&S, &str, &Filter, &[SortCriterion], Paging) -> StoreResult<Vec<PersistentObject>>
        + Send
        + Sync,
>;
type DistinctFn<S> = Arc<dyn Fn(&S, &str, &str, &Filter) -> StoreResult<Vec<Value>> + Send + Sync>;
type AggregateFn<S> = Arc<dyn Fn(&S, &str, &[String], &Filter) -> StoreResult<Vec<f64>> + Send + Sync>;

/// The queries of one domain type.
pub struct TypedOperations<S> {
    pub count: CountFn<S>,
    pub find: FindFn<S>,
    pub find_complement: FindFn<S>,
    pub find_distinct_values: DistinctFn<S>,
    pub find_sums_of_values: AggregateFn<S>,
    pub find_average_values: AggregateFn<S>,
}

impl<S: Store> TypedOperations<S> {
    fn of<T: DomainType>() -> Self {
        Self {
            count: Arc::new(|store: &S, container: &str, filter: &Filter| {
                store.count::<T>(container, filter)
            }),
            find: Arc::new(|store: &S, container: &str, filter: &Filter, sort: &[SortCriterion], paging: Paging| {
                store.find::<T>(container, filter, sort, paging)
            }),
            find_complement: Arc::new(
                |store: &S, container: &str, filter: &Filter, sort: &[SortCriterion], paging: Paging| {
                    store.find_complement::<T>(container, filter, sort, paging)
                },
            ),
            find_distinct_values: Arc::new(|store: &S, container: &str, field: &str, filter: &Filter| {
                store.find_distinct_values::<T>(container, field, filter)
            }),
            find_sums_of_values: Arc::new(
                |store: &S, container: &str, fields: &[String], filter: &Filter| {
                    store.find_sums_of_values::<T>(container, fields, filter)
                },
            ),
            find_average_values: Arc::new(
                |store: &S, container: &str, fields: &[String], filter: &Filter| {
                    store.find_average_values::<T>(container, fields, filter)
                },
            ),
        }
    }
}

/// Registry from type tag to [`TypedOperations`], built once at startup.
pub struct GenericOperations<S> {
    types: HashMap<&'static str, TypedOperations<S>>,
}

impl<S: Store> Default for GenericOperations<S> {
    fn default() -> Self {
        Self {
            types: HashMap::new(),
        }
    }
}

impl<S: Store> GenericOperations<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the queries of `T` under its type tag.
    ///
    /// # Example
    ///
    /// ```
    /// use graphrpc_common::graph::{DomainType, TypeDescriptor};
    /// use graphrpc_server::{GenericOperations, MemoryStore};
    ///
    /// struct Invoice;
    ///
    /// impl DomainType for Invoice {
    ///     const TYPE_TAG: &'static str = "Invoice";
    ///
    ///     fn descriptor() -> TypeDescriptor {
    ///         TypeDescriptor::new(Self::TYPE_TAG, "invoices")
    ///     }
    /// }
    ///
    /// let generic = GenericOperations::<MemoryStore>::new().register::<Invoice>();
    /// assert!(generic.get("Invoice").is_some());
    /// ```
    pub fn register<T: DomainType>(mut self) -> Self {
        self.types.insert(T::TYPE_TAG, TypedOperations::of::<T>());
        self
    }

    /// Queries registered for `type_tag`.
    pub fn get(&self, type_tag: &str) -> Option<&TypedOperations<S>> {
        self.types.get(type_tag)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
