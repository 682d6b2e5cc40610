use crate::config::{ClientConfig, RetryConfig};
use crate::container_cache::ContainerNameCache;
use crate::exchange::{Exchange, HttpExchange};
use crate::online::{OnlineFlag, OnlineState};
use graphrpc_common::codec::{GraphDecoder, GraphEncoder};
use graphrpc_common::directory::UserDirectory;
use graphrpc_common::graph::{ObjectCache, ObjectRef, PersistentObject, TypeRegistry, UserRef, Value};
use graphrpc_common::protocol::{
    Filter, GraphRpcError, Message, Method, Paging, Parameters, Request, Result, RpcResult,
    SortCriterion, ACTION_DEPTH,
};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// GraphRPC client
///
/// Every call is one encoded request POSTed to the endpoint and one encoded
/// answer decoded back. Decoded objects land in a cache owned by the client
/// and kept across calls, so an id seen twice is the same node both times.
///
/// Read-style calls may be made fault tolerant through
/// [`ClientConfig::fault_tolerant`]: while the endpoint is offline, or when a
/// call fails in transport or decoding, they return an empty default
/// instead of an error. Write-style calls never degrade.
pub struct GraphRpcClient<E: Exchange = HttpExchange> {
    exchange: E,
    registry: Arc<TypeRegistry>,
    objects: Mutex<ObjectCache>,
    retry: RetryConfig,
    fault_tolerant: bool,
    online: OnlineFlag,
    names: Arc<ContainerNameCache>,
    users: Arc<dyn UserDirectory>,
}

/// Read-only view of the client's object cache.
///
/// Holds the cache lock; drop it before awaiting another call.
pub struct Objects<'a>(MutexGuard<'a, ObjectCache>);

impl Deref for Objects<'_> {
    type Target = ObjectCache;

    fn deref(&self) -> &ObjectCache {
        &self.0
    }
}

impl GraphRpcClient<HttpExchange> {
    /// Create a client for `url` with the default configuration
    ///
    /// # Arguments
    ///
    /// * `url` - Endpoint every request is POSTed to
    /// * `registry` - Domain types the client can decode
    ///
    /// # Returns
    ///
    /// A client in the `Unknown` online state, or an error if the HTTP
    /// client cannot be built
    ///
    /// # Example
    ///
    /// ```no_run
    /// use graphrpc_client::GraphRpcClient;
    /// use graphrpc_common::graph::TypeRegistry;
    ///
    /// # async fn run() -> graphrpc_common::protocol::Result<()> {
    /// let client = GraphRpcClient::new("http://127.0.0.1:8080", TypeRegistry::new())?;
    /// if client.ping().await {
    ///     println!("{} is online", client.endpoint());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(url: impl Into<String>, registry: impl Into<Arc<TypeRegistry>>) -> Result<Self> {
        Self::with_config(url, registry, ClientConfig::default())
    }

    /// Create a client for `url` with retries, fault tolerance, timeout,
    /// proxy and API key taken from `config`.
    pub fn with_config(
        url: impl Into<String>,
        registry: impl Into<Arc<TypeRegistry>>,
        config: ClientConfig,
    ) -> Result<Self> {
        let exchange = HttpExchange::new(url, &config)?;
        Ok(Self::with_exchange(exchange, registry, config))
    }
}

impl<E: Exchange> GraphRpcClient<E> {
    /// Create a client over any [`Exchange`]. Transport settings in `config`
    /// (timeout, proxy, api key) are the exchange's business.
    pub fn with_exchange(
        exchange: E,
        registry: impl Into<Arc<TypeRegistry>>,
        config: ClientConfig,
    ) -> Self {
        let names = config.container_caches.for_endpoint(exchange.endpoint());
        Self {
            exchange,
            registry: registry.into(),
            objects: Mutex::new(ObjectCache::new()),
            retry: config.retry,
            fault_tolerant: config.fault_tolerant,
            online: OnlineFlag::default(),
            names,
            users: config.user_directory,
        }
    }

    /// Address requests are sent to; also keys the container-name cache.
    pub fn endpoint(&self) -> &str {
        self.exchange.endpoint()
    }

    /// Last known reachability of the endpoint.
    pub fn online_state(&self) -> OnlineState {
        self.online.get()
    }

    pub fn is_online(&self) -> bool {
        self.online.get() == OnlineState::Online
    }

    /// Every node this client has built or decoded so far.
    pub fn objects(&self) -> Objects<'_> {
        Objects(self.lock())
    }

    /// A copy of one cached node.
    pub fn object(&self, id: Uuid) -> Option<PersistentObject> {
        self.lock().get(id).cloned()
    }

    /// Places a locally built node in the cache, replacing any node with the
    /// same id. Nodes referenced by objects sent to the server must be
    /// inserted first or they travel as bare ids.
    pub fn insert(&self, object: PersistentObject) -> ObjectRef {
        self.lock().insert(object)
    }

    /// Applies `edit` to a cached node. Returns false when the id is unknown.
    pub fn edit(&self, id: Uuid, edit: impl FnOnce(&mut PersistentObject)) -> bool {
        match self.lock().get_mut(id) {
            Some(node) => {
                edit(node);
                true
            }
            None => false,
        }
    }

    // ----- writes -----

    /// Stores a new object (and the part of its graph within reach).
    ///
    /// The object enters the client's cache first, so the returned reference
    /// can be edited and passed to [`update`](Self::update) later.
    ///
    /// # Arguments
    ///
    /// * `object` - The new root; children must already be in the cache
    ///   (see [`insert`](Self::insert))
    ///
    /// # Returns
    ///
    /// A reference to the stored root, now attached. Fails with `Offline`
    /// without touching the network when the endpoint is known to be down.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use graphrpc_client::GraphRpcClient;
    /// use graphrpc_common::graph::PersistentObject;
    ///
    /// # async fn run(client: GraphRpcClient) -> graphrpc_common::protocol::Result<()> {
    /// let mut invoice = PersistentObject::new("Invoice");
    /// invoice.set_element("Title", "A");
    /// let target = client.add(invoice).await?;
    ///
    /// client.edit(target.id, |node| node.set_element("Title", "B"));
    /// client.update(&target).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add(&self, object: PersistentObject) -> Result<ObjectRef> {
        let target = self.insert(object);
        self.write(
            Method::AddObject,
            Some(Parameters::ByPersistentObject {
                object: target.clone(),
            }),
        )
        .await?;
        self.edit(target.id, |node| node.set_attached(true));
        Ok(target)
    }

    /// Sends the cached state of `target` as its new stored state.
    pub async fn update(&self, target: &ObjectRef) -> Result<()> {
        self.write(
            Method::UpdateObject,
            Some(Parameters::ByPersistentObject {
                object: target.clone(),
            }),
        )
        .await?;
        self.edit(target.id, |node| node.set_attached(true));
        Ok(())
    }

    /// Removes one stored object and marks the cached node removed.
    pub async fn remove(&self, target: &ObjectRef) -> Result<()> {
        self.write(
            Method::RemoveObject,
            Some(Parameters::ByPersistentObject {
                object: target.clone(),
            }),
        )
        .await?;
        self.edit(target.id, |node| node.set_removed(true));
        Ok(())
    }

    /// Removes `target` and every object it owns through its reference
    /// fields. With `only_if_unreferenced`, children still referenced
    /// elsewhere are kept.
    pub async fn remove_cascaded(&self, target: &ObjectRef, only_if_unreferenced: bool) -> Result<()> {
        self.write(
            Method::RemoveObjectCascadedly,
            Some(Parameters::ByPersistentObjectAndFlag {
                object: target.clone(),
                is_to_be_removed_if_not_referenced_only: only_if_unreferenced,
            }),
        )
        .await?;
        self.edit(target.id, |node| node.set_removed(true));
        Ok(())
    }

    /// Purges what the store keeps about removed objects.
    pub async fn cleanup(&self) -> Result<()> {
        self.write(Method::Cleanup, None).await
    }

    /// Invokes a zero-argument action registered on the server.
    ///
    /// Actions are treated as writes: they never degrade to a default.
    ///
    /// # Arguments
    ///
    /// * `name` - The action's method name, matched exactly by the server
    pub async fn call_action(&self, name: &str) -> Result<()> {
        debug!("Calling action '{}'", name);
        self.ensure_online().await?;
        let result = self.call(Request::new(name), ACTION_DEPTH, None).await?;
        expect_nothing(result)
    }

    // ----- reads -----

    /// Whether `container` holds an object with `id`.
    ///
    /// # Returns
    ///
    /// `false` instead of an error when the client is fault tolerant and the
    /// endpoint cannot be reached
    pub async fn contains_id(&self, container: &str, id: Uuid) -> Result<bool> {
        self.read(
            Method::ContainsId,
            Some(Parameters::ByContainerNameAndId {
                container_name: container.to_string(),
                object_id: id,
            }),
            None,
            expect_bool,
        )
        .await
    }

    /// Whether `id` was removed from `container` since the store's last
    /// cleanup.
    pub async fn is_id_deleted(&self, container: &str, id: Uuid) -> Result<bool> {
        self.read(
            Method::IsIdDeleted,
            Some(Parameters::ByContainerNameAndId {
                container_name: container.to_string(),
                object_id: id,
            }),
            None,
            expect_bool,
        )
        .await
    }

    /// Number of objects in `container` matching `filter`.
    ///
    /// # Arguments
    ///
    /// * `container` - Container to count in
    /// * `type_tag` - Domain type of the container's objects, resolved by the
    ///   server at request time
    /// * `filter` - Predicate; [`Filter::All`] counts everything
    pub async fn count(&self, container: &str, type_tag: &str, filter: &Filter) -> Result<i64> {
        self.read(
            Method::CountObjects,
            Some(Parameters::ByContainerNameAndGenericTypeAndFilter {
                container_name: container.to_string(),
                type_tag: type_tag.to_string(),
                filter: filter.clone(),
            }),
            None,
            expect_int,
        )
        .await
    }

    /// Objects matching `filter`, sorted and windowed.
    ///
    /// Matches and the objects they reference arrive two levels deep and
    /// are merged into the cache, replacing what an earlier call left there.
    ///
    /// # Arguments
    ///
    /// * `container` - Container to search
    /// * `type_tag` - Domain type of the container's objects
    /// * `filter` - Predicate over field values
    /// * `sort` - Criteria applied in order
    /// * `paging` - Window over the sorted matches
    ///
    /// # Returns
    ///
    /// References to the matches, whose state is read through
    /// [`object`](Self::object) or [`objects`](Self::objects)
    pub async fn find(
        &self,
        container: &str,
        type_tag: &str,
        filter: &Filter,
        sort: &[SortCriterion],
        paging: Paging,
    ) -> Result<Vec<ObjectRef>> {
        let parameters = query(container, type_tag, filter, sort, paging);
        self.read(Method::Find, Some(parameters), None, expect_objects)
            .await
    }

    /// Objects of the container that do not match `filter`.
    pub async fn find_complement(
        &self,
        container: &str,
        type_tag: &str,
        filter: &Filter,
        sort: &[SortCriterion],
        paging: Paging,
    ) -> Result<Vec<ObjectRef>> {
        let parameters = query(container, type_tag, filter, sort, paging);
        self.read(Method::FindComplement, Some(parameters), None, expect_objects)
            .await
    }

    /// Distinct values of `field_name` across the matching objects.
    pub async fn find_distinct_values(
        &self,
        container: &str,
        type_tag: &str,
        field_name: &str,
        filter: &Filter,
    ) -> Result<Vec<Value>> {
        self.read(
            Method::FindDistinctValues,
            Some(Parameters::ByContainerNameAndGenericTypeAndFieldNameAndFilter {
                container_name: container.to_string(),
                type_tag: type_tag.to_string(),
                field_name: field_name.to_string(),
                filter: filter.clone(),
            }),
            None,
            expect_values,
        )
        .await
    }

    /// One sum per field in `field_names`, in order.
    pub async fn find_sums_of_values(
        &self,
        container: &str,
        type_tag: &str,
        field_names: &[&str],
        filter: &Filter,
    ) -> Result<Vec<f64>> {
        let parameters = aggregate(container, type_tag, field_names, filter);
        self.read(Method::FindSumsOfValues, Some(parameters), None, expect_decimals)
            .await
    }

    /// One average per field in `field_names`, in order.
    pub async fn find_average_values(
        &self,
        container: &str,
        type_tag: &str,
        field_names: &[&str],
        filter: &Filter,
    ) -> Result<Vec<f64>> {
        let parameters = aggregate(container, type_tag, field_names, filter);
        self.read(Method::FindAverageValues, Some(parameters), None, expect_decimals)
            .await
    }

    /// Fetches one object and the objects it references, one level deep.
    ///
    /// # Returns
    ///
    /// `None` when the container does not hold `id`
    pub async fn retrieve(&self, container: &str, id: Uuid) -> Result<Option<ObjectRef>> {
        self.read(
            Method::RetrieveObject,
            Some(Parameters::ByContainerNameAndId {
                container_name: container.to_string(),
                object_id: id,
            }),
            Some(id),
            expect_object,
        )
        .await
    }

    /// Store container holding objects of `type_tag`. Cached per endpoint.
    pub async fn container_name_of_type(&self, type_tag: &str) -> Result<Option<String>> {
        if let Some(container) = self.names.container_of(type_tag) {
            return Ok(Some(container));
        }
        let container = self
            .read(
                Method::GetInternalNameOfContainer,
                Some(Parameters::ByTypeTag {
                    type_tag: type_tag.to_string(),
                }),
                None,
                expect_text,
            )
            .await?;
        Ok(container.map(|c| self.names.insert(type_tag, &c)))
    }

    /// Type tag of the objects stored in `container`. Cached per endpoint.
    pub async fn type_of_container(&self, container: &str) -> Result<Option<String>> {
        if let Some(type_tag) = self.names.type_of(container) {
            return Ok(Some(type_tag));
        }
        let type_tag = self
            .read(
                Method::GetAssemblyQualifiedTypeNameOfContainer,
                Some(Parameters::ByContainerName {
                    container_name: container.to_string(),
                }),
                None,
                expect_text,
            )
            .await?;
        Ok(type_tag.map(|t| {
            self.names.insert(&t, container);
            t
        }))
    }

    // ----- user directory -----

    /// Looks a user up in the server's directory.
    pub async fn find_user(&self, id: Uuid) -> Result<Option<UserRef>> {
        let name = self
            .read(
                Method::FindUser,
                Some(Parameters::ById { object_id: id }),
                None,
                expect_text,
            )
            .await?;
        Ok(name.map(|name| UserRef::new(id, name)))
    }

    /// Ids of the directory users matching `filter`.
    pub async fn find_user_ids(&self, filter: &Filter) -> Result<Vec<Uuid>> {
        self.read(
            Method::FindUsers,
            Some(Parameters::ByFilterAndSortAndPaging {
                filter: filter.clone(),
                sort: Vec::new(),
                paging: Paging::default(),
            }),
            None,
            expect_ids,
        )
        .await
    }

    // ----- not available remotely -----
    // Container management and reverse lookups stay with the store's own
    // process.

    pub async fn create_container(&self, _container: &str) -> Result<()> {
        Err(GraphRpcError::NotSupportedRemotely("create_container".into()))
    }

    pub async fn delete_container(&self, _container: &str) -> Result<()> {
        Err(GraphRpcError::NotSupportedRemotely("delete_container".into()))
    }

    pub async fn find_referencing_objects(&self, _target: &ObjectRef) -> Result<Vec<ObjectRef>> {
        Err(GraphRpcError::NotSupportedRemotely(
            "find_referencing_objects".into(),
        ))
    }

    // ----- online state -----

    /// Asks the endpoint whether it is alive and records the answer.
    pub async fn ping(&self) -> bool {
        let outcome = self
            .call(Request::new(Method::Ping.name()), Method::Ping.depth(), None)
            .await
            .and_then(expect_bool);
        match outcome {
            Ok(alive) => {
                self.transition(if alive {
                    OnlineState::Online
                } else {
                    OnlineState::Offline
                });
                alive
            }
            Err(e) => {
                warn!("Ping to {} failed: {}", self.endpoint(), e);
                self.transition(OnlineState::Offline);
                false
            }
        }
    }

    /// Current state, pinging when it is not known to be online.
    pub async fn check_online(&self) -> bool {
        match self.online.get() {
            OnlineState::Online => true,
            OnlineState::Unknown | OnlineState::Offline => self.ping().await,
        }
    }

    // ----- engine -----

    fn lock(&self) -> MutexGuard<'_, ObjectCache> {
        // A panic while decoding leaves the cache usable; nodes are only
        // ever added or refreshed.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, state: OnlineState) {
        let previous = self.online.set(state);
        if previous != state {
            info!("Endpoint {} is now {} (was {})", self.endpoint(), state, previous);
        }
    }

    async fn ensure_online(&self) -> Result<()> {
        match self.online.get() {
            OnlineState::Online => Ok(()),
            OnlineState::Offline => Err(GraphRpcError::Offline(self.endpoint().to_string())),
            OnlineState::Unknown => {
                if self.ping().await {
                    Ok(())
                } else {
                    Err(GraphRpcError::Offline(self.endpoint().to_string()))
                }
            }
        }
    }

    async fn write(&self, method: Method, parameters: Option<Parameters>) -> Result<()> {
        debug_assert!(method.is_write(), "{} is not a write", method.name());
        debug!("Dispatching {}", method.name());
        self.ensure_online().await?;
        let result = self.call(request(method, parameters), method.depth(), None).await?;
        expect_nothing(result)
    }

    async fn read<T: Default>(
        &self,
        method: Method,
        parameters: Option<Parameters>,
        force: Option<Uuid>,
        extract: fn(Option<RpcResult>) -> Result<T>,
    ) -> Result<T> {
        let degradable = self.fault_tolerant && !method.is_write();
        if degradable && self.online.get() == OnlineState::Offline {
            debug!("{} is offline, {} answers with a default", self.endpoint(), method.name());
            return Ok(T::default());
        }

        debug!("Dispatching {}", method.name());
        let outcome = self
            .call(request(method, parameters), method.depth(), force)
            .await
            .and_then(extract);
        match outcome {
            Err(e) if degradable && e.is_degradable() => {
                warn!("{} degraded to a default result: {}", method.name(), e);
                Ok(T::default())
            }
            other => other,
        }
    }

    /// One request/response cycle: encode, exchange with retries, decode,
    /// correlate.
    async fn call(&self, request: Request, depth: u32, force: Option<Uuid>) -> Result<Option<RpcResult>> {
        let request_id = request.id;
        let body = {
            let objects = self.lock();
            GraphEncoder::new(&objects).encode_message(&Message::Request(request), depth)?
        };

        let text = self.exchange_with_retry(body).await?;

        let message = {
            let mut objects = self.lock();
            GraphDecoder::new(&self.registry, &mut objects)
                .remote()
                .force(force)
                .users(self.users.as_ref())
                .decode_message(&text)?
        };

        match message {
            Message::Response(response) if response.id == request_id => Ok(response.result),
            Message::Response(response) => Err(GraphRpcError::UnexpectedPayload(format!(
                "response {} does not answer request {}",
                response.id, request_id
            ))),
            Message::Error(error) => Err(error.into()),
            Message::Request(other) => Err(GraphRpcError::UnexpectedPayload(format!(
                "received request '{}' instead of a response",
                other.method
            ))),
        }
    }

    async fn exchange_with_retry(&self, body: String) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.exchange.post(body.clone()).await {
                Ok(text) => {
                    if self.online.mark_success() {
                        info!("Endpoint {} is now online", self.endpoint());
                    }
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.retries => {
                    attempt += 1;
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "Attempt {} of {} to {} failed: {}. Retrying in {:?}...",
                        attempt,
                        self.retry.retries + 1,
                        self.endpoint(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    self.transition(OnlineState::Offline);
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn request(method: Method, parameters: Option<Parameters>) -> Request {
    let request = Request::new(method.name());
    match parameters {
        Some(parameters) => request.with_parameters(parameters),
        None => request,
    }
}

fn query(
    container: &str,
    type_tag: &str,
    filter: &Filter,
    sort: &[SortCriterion],
    paging: Paging,
) -> Parameters {
    Parameters::ByContainerNameAndGenericTypeAndFilterAndSortAndPaging {
        container_name: container.to_string(),
        type_tag: type_tag.to_string(),
        filter: filter.clone(),
        sort: sort.to_vec(),
        paging,
    }
}

fn aggregate(container: &str, type_tag: &str, field_names: &[&str], filter: &Filter) -> Parameters {
    Parameters::ByContainerNameAndGenericTypeAndFieldNamesAndFilter {
        container_name: container.to_string(),
        type_tag: type_tag.to_string(),
        field_names: field_names.iter().map(|f| f.to_string()).collect(),
        filter: filter.clone(),
    }
}

fn unexpected(expected: &str, found: Option<RpcResult>) -> GraphRpcError {
    GraphRpcError::UnexpectedPayload(format!(
        "expected {}, found {}",
        expected,
        found.as_ref().map_or("no result", RpcResult::kind)
    ))
}

fn expect_nothing(result: Option<RpcResult>) -> Result<()> {
    match result {
        None => Ok(()),
        other => Err(unexpected("no result", other)),
    }
}

fn expect_bool(result: Option<RpcResult>) -> Result<bool> {
    match result {
        Some(RpcResult::Bool(b)) => Ok(b),
        other => Err(unexpected("Bool", other)),
    }
}

fn expect_int(result: Option<RpcResult>) -> Result<i64> {
    match result {
        Some(RpcResult::Int(i)) => Ok(i),
        other => Err(unexpected("Int", other)),
    }
}

fn expect_text(result: Option<RpcResult>) -> Result<Option<String>> {
    match result {
        Some(RpcResult::String(s)) => Ok(s),
        other => Err(unexpected("String", other)),
    }
}

fn expect_ids(result: Option<RpcResult>) -> Result<Vec<Uuid>> {
    match result {
        Some(RpcResult::ListOfString(ids)) => ids
            .iter()
            .map(|id| {
                Uuid::parse_str(id)
                    .map_err(|_| GraphRpcError::UnexpectedPayload(format!("'{}' is not a user id", id)))
            })
            .collect(),
        other => Err(unexpected("ListOfString", other)),
    }
}

fn expect_objects(result: Option<RpcResult>) -> Result<Vec<ObjectRef>> {
    match result {
        Some(RpcResult::ListOfPersistentObject(objects)) => Ok(objects),
        other => Err(unexpected("ListOfPersistentObject", other)),
    }
}

fn expect_object(result: Option<RpcResult>) -> Result<Option<ObjectRef>> {
    match result {
        Some(RpcResult::PersistentObject(object)) => Ok(object),
        other => Err(unexpected("PersistentObject", other)),
    }
}

fn expect_decimals(result: Option<RpcResult>) -> Result<Vec<f64>> {
    match result {
        Some(RpcResult::ListOfDecimal(values)) => Ok(values),
        other => Err(unexpected("ListOfDecimal", other)),
    }
}

fn expect_values(result: Option<RpcResult>) -> Result<Vec<Value>> {
    match result {
        Some(RpcResult::ListOfValue(values)) => Ok(values),
        other => Err(unexpected("ListOfValue", other)),
    }
}
