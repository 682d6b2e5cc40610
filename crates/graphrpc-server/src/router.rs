//! Request dispatch.
//!
//! The router turns one request body into one answer body:
//! - built-in methods are bound to their parameter variant and run against
//!   the [`Store`]
//! - generic queries reach the store through [`GenericOperations`]
//! - any other method name is looked up among the registered actions
//!
//! Every failure is answered with an error response; the router itself
//! never fails.

use crate::directory::user_field;
use crate::generic::{GenericOperations, TypedOperations};
use crate::store::{Store, StoreError};
use graphrpc_common::codec::{GraphDecoder, GraphEncoder};
use graphrpc_common::directory::{NoDirectory, UserDirectory};
use graphrpc_common::graph::{ObjectCache, ObjectRef, PersistentObject, TypeRegistry};
use graphrpc_common::protocol::{
    order_by, ErrorResponse, Message, Method, Parameters, Request, Response, RpcResult,
    ACTION_DEPTH,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// A zero-argument action callable by name.
pub type Action = Arc<dyn Fn() -> Result<(), StoreError> + Send + Sync>;

/// Why a method could not produce a result.
#[derive(Debug)]
enum Failure {
    InvalidParams(String),
    Store(StoreError),
}

impl From<StoreError> for Failure {
    fn from(e: StoreError) -> Self {
        Failure::Store(e)
    }
}

impl Failure {
    fn into_response(self, id: Uuid) -> ErrorResponse {
        match self {
            Failure::InvalidParams(detail) => ErrorResponse::invalid_params(id, detail),
            Failure::Store(e) => ErrorResponse::server_error(id, e.to_string()),
        }
    }
}

/// An answer and the nodes it references.
struct Answer {
    message: Message,
    objects: ObjectCache,
    depth: u32,
}

impl Answer {
    fn error(error: ErrorResponse) -> Self {
        Self {
            message: error.into(),
            objects: ObjectCache::new(),
            depth: 0,
        }
    }
}

/// Dispatches decoded requests to a [`Store`].
///
/// Requests are decoded with the store as the local index, so only nodes
/// the store already holds come out attached. Answers are encoded at the
/// method's depth after loading that many levels of referenced objects.
pub struct RpcRouter<S: Store> {
    store: Arc<S>,
    registry: Arc<TypeRegistry>,
    generic: GenericOperations<S>,
    actions: HashMap<String, Action>,
    users: Arc<dyn UserDirectory>,
}

impl<S: Store> RpcRouter<S> {
    /// Create a router without actions or user directory
    ///
    /// # Arguments
    ///
    /// * `store` - Store every built-in method runs against
    /// * `registry` - Domain types requests may carry
    /// * `generic` - Typed operations for the queries that name a type tag
    ///
    /// # Example
    ///
    /// ```
    /// use graphrpc_common::graph::TypeRegistry;
    /// use graphrpc_server::{GenericOperations, MemoryStore, RpcRouter};
    /// use std::sync::Arc;
    ///
    /// let registry = Arc::new(TypeRegistry::new());
    /// let store = Arc::new(MemoryStore::new(registry.clone()));
    /// let router = RpcRouter::new(store, registry, GenericOperations::new())
    ///     .with_action("rebuildindex", || Ok(()));
    /// ```
    pub fn new(
        store: Arc<S>,
        registry: impl Into<Arc<TypeRegistry>>,
        generic: GenericOperations<S>,
    ) -> Self {
        Self {
            store,
            registry: registry.into(),
            generic,
            actions: HashMap::new(),
            users: Arc::new(NoDirectory),
        }
    }

    /// Directory answering `userdirectory.*` and resolving user fields.
    pub fn with_users(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = users;
        self
    }

    /// Registers an action. Built-in method names cannot be shadowed.
    pub fn with_action(
        mut self,
        name: impl Into<String>,
        action: impl Fn() -> Result<(), StoreError> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        if Method::from_name(&name).is_some() {
            warn!("Action '{}' is shadowed by the built-in method", name);
        }
        self.actions.insert(name, Arc::new(action));
        self
    }

    /// The store requests run against.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Decodes a request body, dispatches it and encodes the answer.
    ///
    /// # Arguments
    ///
    /// * `body` - The encoded request as received
    ///
    /// # Returns
    ///
    /// The encoded response or error message. Undecodable bodies get a
    /// parse error with a nil id; anything but a request gets an invalid
    /// request error.
    pub fn handle_text(&self, body: &str) -> String {
        let mut decoded = ObjectCache::new();
        let message = GraphDecoder::new(&self.registry, &mut decoded)
            .local(self.store.as_ref())
            .users(self.users.as_ref())
            .decode_message(body);

        let answer = match message {
            Ok(Message::Request(request)) => self.dispatch(request, &decoded),
            Ok(other) => Answer::error(ErrorResponse::invalid_request(
                other.id(),
                format!("expected Request, found {}", other.kind()),
            )),
            Err(e) => {
                warn!("Undecodable request: {}", e);
                Answer::error(ErrorResponse::parse_error(Uuid::nil(), e.to_string()))
            }
        };

        let id = answer.message.id();
        GraphEncoder::new(&answer.objects)
            .encode_message(&answer.message, answer.depth)
            .unwrap_or_else(|e| {
                error!("Failed to encode answer to {}: {}", id, e);
                let fallback = ErrorResponse::internal_error(id, e.to_string());
                GraphEncoder::new(&ObjectCache::new())
                    .encode_message(&Message::from(fallback), 0)
                    .unwrap_or_default()
            })
    }

    fn dispatch(&self, request: Request, decoded: &ObjectCache) -> Answer {
        let id = request.id;
        debug!("Dispatching {}", request.method);

        let Some(method) = Method::from_name(&request.method) else {
            return match self.actions.get(&request.method) {
                Some(action) => match action() {
                    Ok(()) => Answer {
                        message: Response::empty(id).into(),
                        objects: ObjectCache::new(),
                        depth: ACTION_DEPTH,
                    },
                    Err(e) => Answer::error(ErrorResponse::server_error(id, e.to_string())),
                },
                None => Answer::error(ErrorResponse::method_not_found(id, &request.method)),
            };
        };

        let mut objects = ObjectCache::new();
        match self.invoke(method, request.parameters, decoded, &mut objects) {
            Ok(result) => Answer {
                message: Response { id, result }.into(),
                objects,
                depth: method.depth(),
            },
            Err(failure) => {
                if let Failure::Store(e) = &failure {
                    warn!("{} failed: {}", method.name(), e);
                }
                Answer::error(failure.into_response(id))
            }
        }
    }

    fn invoke(
        &self,
        method: Method,
        parameters: Option<Parameters>,
        decoded: &ObjectCache,
        objects: &mut ObjectCache,
    ) -> Result<Option<RpcResult>, Failure> {
        use Parameters as P;

        let depth = method.depth();
        let store = self.store.as_ref();
        let result = match (method, parameters) {
            (Method::Ping, _) => Some(RpcResult::Bool(true)),
            (Method::Cleanup, _) => {
                store.cleanup()?;
                None
            }
            (Method::AddObject, Some(P::ByPersistentObject { object })) => {
                store.add(decoded, &object)?;
                None
            }
            (Method::UpdateObject, Some(P::ByPersistentObject { object })) => {
                store.update(decoded, &object)?;
                None
            }
            (Method::RemoveObject, Some(P::ByPersistentObject { object })) => {
                let stored = self.materialize(&object)?;
                store.remove(&stored)?;
                None
            }
            (
                Method::RemoveObjectCascadedly,
                Some(P::ByPersistentObjectAndFlag {
                    object,
                    is_to_be_removed_if_not_referenced_only,
                }),
            ) => {
                let stored = self.materialize(&object)?;
                store
                    .remove_cascaded(&stored, is_to_be_removed_if_not_referenced_only)?;
                None
            }
            (Method::ContainsId, Some(P::ByContainerNameAndId { container_name, object_id })) => {
                Some(RpcResult::Bool(store.contains(&container_name, object_id)?))
            }
            (Method::IsIdDeleted, Some(P::ByContainerNameAndId { container_name, object_id })) => {
                Some(RpcResult::Bool(store.is_id_deleted(&container_name, object_id)?))
            }
            (Method::RetrieveObject, Some(P::ByContainerNameAndId { container_name, object_id })) => {
                let found = store.retrieve(&container_name, object_id)?;
                let found = found.map(|node| self.load(objects, vec![node], depth).remove(0));
                Some(RpcResult::PersistentObject(found))
            }
            (
                Method::CountObjects,
                Some(P::ByContainerNameAndGenericTypeAndFilter {
                    container_name,
                    type_tag,
                    filter,
                }),
            ) => {
                let count = (self.typed(&type_tag)?.count)(store, &container_name, &filter)?;
                Some(RpcResult::Int(count))
            }
            (
                Method::Find | Method::FindComplement,
                Some(P::ByContainerNameAndGenericTypeAndFilterAndSortAndPaging {
                    container_name,
                    type_tag,
                    filter,
                    sort,
                    paging,
                }),
            ) => {
                let typed = self.typed(&type_tag)?;
                let query = if method == Method::Find {
                    &typed.find
                } else {
                    &typed.find_complement
                };
                let found = query(store, &container_name, &filter, &sort, paging)?;
                Some(RpcResult::ListOfPersistentObject(self.load(objects, found, depth)))
            }
            (
                Method::FindDistinctValues,
                Some(P::ByContainerNameAndGenericTypeAndFieldNameAndFilter {
                    container_name,
                    type_tag,
                    field_name,
                    filter,
                }),
            ) => {
                let typed = self.typed(&type_tag)?;
                let values =
                    (typed.find_distinct_values)(store, &container_name, &field_name, &filter)?;
                Some(RpcResult::ListOfValue(values))
            }
            (
                Method::FindSumsOfValues | Method::FindAverageValues,
                Some(P::ByContainerNameAndGenericTypeAndFieldNamesAndFilter {
                    container_name,
                    type_tag,
                    field_names,
                    filter,
                }),
            ) => {
                let typed = self.typed(&type_tag)?;
                let aggregate = if method == Method::FindSumsOfValues {
                    &typed.find_sums_of_values
                } else {
                    &typed.find_average_values
                };
                let values = aggregate(store, &container_name, &field_names, &filter)?;
                Some(RpcResult::ListOfDecimal(values))
            }
            (Method::GetInternalNameOfContainer, Some(P::ByTypeTag { type_tag })) => {
                Some(RpcResult::String(store.container_name_of_type(&type_tag)))
            }
            (Method::GetAssemblyQualifiedTypeNameOfContainer, Some(P::ByContainerName { container_name })) => {
                Some(RpcResult::String(store.type_of_container(&container_name)))
            }
            (Method::FindUser, Some(P::ById { object_id })) => Some(RpcResult::String(
                self.users.find_user(object_id).and_then(|u| u.display_name),
            )),
            (Method::FindUsers, Some(P::ByFilterAndSortAndPaging { filter, sort, paging })) => {
                let mut users = self.users.find_users(&filter);
                users.sort_by(|a, b| {
                    order_by(&sort, &|n: &str| user_field(a, n), &|n: &str| user_field(b, n))
                });
                let ids = paging.apply(users).into_iter().map(|u| u.id.to_string()).collect();
                Some(RpcResult::ListOfString(ids))
            }
            (method, parameters) => {
                return Err(Failure::InvalidParams(format!(
                    "{} does not accept {}",
                    method.name(),
                    parameters.as_ref().map_or("missing parameters", Parameters::tag)
                )))
            }
        };
        Ok(result)
    }

    fn typed(&self, type_tag: &str) -> Result<&TypedOperations<S>, Failure> {
        self.generic
            .get(type_tag)
            .ok_or_else(|| Failure::InvalidParams(format!("unknown type '{}'", type_tag)))
    }

    /// The stored state of a node named by a request.
    fn materialize(&self, target: &ObjectRef) -> Result<PersistentObject, Failure> {
        let container = self
            .store
            .container_name_of_type(&target.type_tag)
            .ok_or_else(|| StoreError::UnknownType(target.type_tag.clone()))?;
        Ok(self
            .store
            .retrieve(&container, target.id)?
            .ok_or(StoreError::NotFound(target.id))?)
    }

    /// Places `roots` in the answer cache with everything the encoder will
    /// expand at `depth`.
    fn load(&self, objects: &mut ObjectCache, roots: Vec<PersistentObject>, depth: u32) -> Vec<ObjectRef> {
        let mut frontier: Vec<ObjectRef> = Vec::new();
        let refs: Vec<ObjectRef> = roots
            .into_iter()
            .map(|node| {
                frontier.extend(node.referenced().into_iter().cloned());
                objects.insert(node)
            })
            .collect();

        for _ in 0..depth {
            let mut next = Vec::new();
            for target in frontier.drain(..) {
                if objects.contains(target.id) {
                    continue;
                }
                if let Some(node) = self.store.load(target.id) {
                    next.extend(node.referenced().into_iter().cloned());
                    objects.insert(node);
                }
            }
            frontier = next;
        }
        refs
    }
}
