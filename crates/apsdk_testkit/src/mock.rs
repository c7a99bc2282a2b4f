//! In-memory platform simulator.
//!
//! [`MockPlatform`] implements [`Transport`] by decoding each request and
//! answering it from an in-memory record store, the way the hosted platform
//! would. It assigns ids, bumps revisions, enforces expected revisions,
//! pages list results and creates inline articles for connections.
//!
//! Find filters are not evaluated. Every record of the requested type
//! matches.

use apsdk_core::{Action, ApiRequest, SdkError, SdkResult, Transport};
use apsdk_protocol::{
    EndpointRecord, EntityRecord, GraphNode, JsonSerializer, PagingInfo, PatchRecord,
    ResponseEnvelope, Serializer, Status,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: u32 = 20;

/// A canned failure for the next call.
#[derive(Debug, Clone)]
enum Fault {
    Status(Status),
    Transport(SdkError),
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<String, EntityRecord>,
    order: Vec<String>,
    calls: Vec<ApiRequest>,
    faults: VecDeque<Fault>,
}

impl State {
    fn insert(&mut self, record: EntityRecord) -> String {
        let id = record.id.clone().unwrap_or_default();
        if self.records.insert(id.clone(), record).is_none() {
            self.order.push(id.clone());
        }
        id
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.records.remove(id).is_none() {
            return false;
        }
        self.order.retain(|o| o != id);
        true
    }

    fn of_kind(&self, kind: &str) -> Vec<EntityRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|r| r.kind.eq_ignore_ascii_case(kind))
            .cloned()
            .collect()
    }
}

/// Simulated platform backed by memory.
#[derive(Debug)]
pub struct MockPlatform {
    state: Mutex<State>,
    echo_endpoint_objects: bool,
    reverse_endpoints: bool,
}

impl MockPlatform {
    /// Creates an empty simulator. Created connection endpoints echo the
    /// full inline record.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            echo_endpoint_objects: true,
            reverse_endpoints: false,
        }
    }

    /// Creates an empty simulator wrapped in an [`Arc`].
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Controls whether created endpoints carry the inline record or only
    /// its id.
    pub fn with_endpoint_objects(mut self, echo: bool) -> Self {
        self.echo_endpoint_objects = echo;
        self
    }

    /// Lists endpoint B before endpoint A in connection responses.
    pub fn with_reversed_endpoints(mut self, reverse: bool) -> Self {
        self.reverse_endpoints = reverse;
        self
    }

    /// Stores a record as if it had been created earlier. A missing id is
    /// generated and a zero revision becomes 1.
    pub fn insert(&self, mut record: EntityRecord) -> String {
        if record.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            record.id = Some(new_id());
        }
        record.revision = record.revision.max(1);
        self.state.lock().insert(record)
    }

    /// Returns a stored record.
    pub fn record(&self, id: &str) -> Option<EntityRecord> {
        self.state.lock().records.get(id).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrites the revision of a stored record, simulating a concurrent
    /// writer.
    pub fn set_revision(&self, id: &str, revision: u64) {
        if let Some(record) = self.state.lock().records.get_mut(id) {
            record.revision = revision;
        }
    }

    /// Makes the next call answer with `status`.
    pub fn fail_next(&self, status: Status) {
        self.state.lock().faults.push_back(Fault::Status(status));
    }

    /// Makes the next call fail in the transport.
    pub fn fail_transport_next(&self, error: SdkError) {
        self.state.lock().faults.push_back(Fault::Transport(error));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().calls.clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Number of requests received for one action.
    pub fn count_of(&self, action: Action) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.action == action)
            .count()
    }

    fn handle(&self, request: &ApiRequest) -> SdkResult<ResponseEnvelope> {
        let mut state = self.state.lock();
        state.calls.push(request.clone());

        match state.faults.pop_front() {
            Some(Fault::Status(status)) => return Ok(ResponseEnvelope::new(status)),
            Some(Fault::Transport(error)) => return Err(error),
            None => {}
        }

        let field = request.resource.record_field();
        let envelope = match request.action {
            Action::Create | Action::Register => {
                let record = EntityRecord::decode(&body(request)?)?;
                match self.create(&mut state, record) {
                    Ok(created) => ResponseEnvelope::success().with_record(field, created),
                    Err(status) => ResponseEnvelope::new(status),
                }
            }
            Action::Update => {
                let patch = PatchRecord::decode(&body(request)?)?;
                match self.update(&mut state, request, &patch) {
                    Ok(updated) => ResponseEnvelope::success().with_record(field, updated),
                    Err(status) => ResponseEnvelope::new(status),
                }
            }
            Action::Get => match lookup(&state, request) {
                Some(record) => ResponseEnvelope::success().with_record(field, record),
                None => not_found(request),
            },
            Action::Delete => {
                let id = request.id.clone().unwrap_or_default();
                if lookup(&state, request).is_some() && state.remove(&id) {
                    ResponseEnvelope::success()
                } else {
                    not_found(request)
                }
            }
            Action::BulkDelete => {
                let body = body(request)?;
                let ids = body
                    .get("idlist")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for id in ids.iter().filter_map(Value::as_str) {
                    state.remove(id);
                }
                ResponseEnvelope::success()
            }
            Action::Find => {
                let records = state.of_kind(&request.kind);
                let (page, paging) = page_of(request, records);
                ResponseEnvelope::success()
                    .with_records(request.resource.list_field(), page)
                    .with_paging(paging)
            }
            Action::FindConnected => {
                let nodes = connected(&state, request);
                let (page, paging) = page_of(request, nodes);
                ResponseEnvelope::success()
                    .with_nodes(page)
                    .with_paging(paging)
            }
            Action::FindByEndpoints => {
                let a = request.id.clone().unwrap_or_default();
                let b = request.other_id.clone().unwrap_or_default();
                let found = state
                    .of_kind(&request.kind)
                    .into_iter()
                    .filter(|r| joins(r, &a, &b))
                    .collect();
                ResponseEnvelope::success().with_records(request.resource.list_field(), found)
            }
        };

        debug!(
            action = ?request.action,
            kind = %request.kind,
            code = %envelope.status().code,
            "mock platform answered"
        );
        Ok(envelope)
    }

    fn create(&self, state: &mut State, mut record: EntityRecord) -> Result<EntityRecord, Status> {
        record.id = Some(new_id());
        record.revision = 1;
        record.created_by = Some("mock".into());
        record.last_modified_by = Some("mock".into());

        let Some((a, b)) = record.endpoints.take() else {
            state.insert(record.clone());
            return Ok(record);
        };

        for endpoint in [&a, &b] {
            if endpoint.object.is_none() {
                let id = endpoint.object_id.as_deref().unwrap_or_default();
                if !state.records.contains_key(id) {
                    return Err(Status::error(
                        Status::NOT_FOUND,
                        format!("endpoint article {id} not found"),
                    ));
                }
            }
        }

        record.relation_id = Some(format!("rel-{}", record.kind.to_ascii_lowercase()));
        let (stored_a, echoed_a) = self.create_endpoint(state, a)?;
        let (stored_b, echoed_b) = self.create_endpoint(state, b)?;
        record.endpoints = Some((stored_a, stored_b));
        state.insert(record.clone());

        record.endpoints = Some(if self.reverse_endpoints {
            (echoed_b, echoed_a)
        } else {
            (echoed_a, echoed_b)
        });
        Ok(record)
    }

    /// Returns the stored endpoint and the one echoed in the response.
    fn create_endpoint(
        &self,
        state: &mut State,
        endpoint: EndpointRecord,
    ) -> Result<(EndpointRecord, EndpointRecord), Status> {
        if let Some(object) = endpoint.object {
            let mut article = *object;
            article.id = Some(new_id());
            article.revision = 1;
            article.created_by = Some("mock".into());
            let id = state.insert(article.clone());
            let stored = EndpointRecord {
                label: endpoint.label.clone(),
                object_id: Some(id.clone()),
                kind: Some(article.kind.clone()),
                object: None,
            };
            let mut echoed = stored.clone();
            if self.echo_endpoint_objects {
                echoed.object = Some(Box::new(article));
            }
            return Ok((stored, echoed));
        }

        let id = endpoint.object_id.clone().unwrap_or_default();
        let existing = state.records.get(&id).ok_or_else(|| {
            Status::error(Status::NOT_FOUND, format!("endpoint article {id} not found"))
        })?;
        let stored = EndpointRecord {
            label: endpoint.label,
            object_id: Some(id),
            kind: Some(existing.kind.clone()),
            object: None,
        };
        Ok((stored.clone(), stored))
    }

    fn update(
        &self,
        state: &mut State,
        request: &ApiRequest,
        patch: &PatchRecord,
    ) -> Result<EntityRecord, Status> {
        let id = request.id.clone().unwrap_or_default();
        let record = state
            .records
            .get_mut(&id)
            .filter(|r| r.kind.eq_ignore_ascii_case(&request.kind))
            .ok_or_else(|| Status::error(Status::NOT_FOUND, format!("{id} not found")))?;

        if let Some(expected) = request.revision {
            if expected != record.revision {
                return Err(Status::error(
                    Status::CONFLICT,
                    format!(
                        "revision mismatch: expected {expected}, current {}",
                        record.revision
                    ),
                ));
            }
        }

        for (name, value) in &patch.properties {
            match value {
                Some(value) => record.properties.insert(name.clone(), Some(value.clone())),
                None => record.properties.remove(name),
            };
        }
        for (name, value) in &patch.attributes {
            match value {
                Some(value) => record.attributes.insert(name.clone(), value.clone()),
                None => record.attributes.remove(name),
            };
        }
        record.tags.extend(patch.add_tags.iter().cloned());
        for tag in &patch.remove_tags {
            record.tags.remove(tag);
        }
        record.revision += 1;
        record.last_modified_by = Some("mock".into());
        Ok(record.clone())
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockPlatform {
    async fn send(&self, request: &ApiRequest) -> SdkResult<Vec<u8>> {
        let envelope = self.handle(request)?;
        Ok(JsonSerializer.encode_envelope(&envelope)?)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn body(request: &ApiRequest) -> SdkResult<Value> {
    let bytes = request
        .body
        .as_deref()
        .ok_or_else(|| SdkError::validation(format!("{:?} without a body", request.action)))?;
    Ok(JsonSerializer.deserialize(bytes)?)
}

fn lookup(state: &State, request: &ApiRequest) -> Option<EntityRecord> {
    let id = request.id.as_deref()?;
    state
        .records
        .get(id)
        .filter(|r| r.kind.eq_ignore_ascii_case(&request.kind))
        .cloned()
}

fn not_found(request: &ApiRequest) -> ResponseEnvelope {
    ResponseEnvelope::new(Status::error(
        Status::NOT_FOUND,
        format!(
            "{} {} not found",
            request.kind,
            request.id.as_deref().unwrap_or("")
        ),
    ))
}

fn joins(connection: &EntityRecord, a: &str, b: &str) -> bool {
    let Some((ea, eb)) = &connection.endpoints else {
        return false;
    };
    let (x, y) = (ea.object_id.as_deref(), eb.object_id.as_deref());
    (x == Some(a) && y == Some(b)) || (x == Some(b) && y == Some(a))
}

/// Graph nodes for the articles connected to `request.id` through
/// `request.kind`.
fn connected(state: &State, request: &ApiRequest) -> Vec<GraphNode> {
    let id = request.id.as_deref().unwrap_or_default();
    let label = request.query.as_ref().and_then(|q| q.label.as_deref());

    state
        .of_kind(&request.kind)
        .into_iter()
        .filter_map(|connection| {
            let (a, b) = connection.endpoints.as_ref()?;
            let other = if a.object_id.as_deref() == Some(id) && label.map_or(true, |l| l == a.label) {
                b
            } else if b.object_id.as_deref() == Some(id) && label.map_or(true, |l| l == b.label) {
                a
            } else {
                return None;
            };
            let article = state.records.get(other.object_id.as_deref()?)?.clone();
            let edge = request.return_edge.then(|| connection.clone());
            Some(GraphNode { article, edge })
        })
        .collect()
}

fn page_of<T>(request: &ApiRequest, items: Vec<T>) -> (Vec<T>, PagingInfo) {
    let query = request.query.clone().unwrap_or_default();
    let size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let number = query.page_number.max(1);
    let total = items.len() as u64;
    let skip = (number as usize - 1).saturating_mul(size as usize);
    let page = items.into_iter().skip(skip).take(size as usize).collect();
    (page, PagingInfo::new(number, size, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apsdk_core::{Query, Resource};

    fn create_request(record: &EntityRecord) -> ApiRequest {
        let mut request = ApiRequest::new(Resource::Object, Action::Create, record.kind.clone());
        request.body = Some(JsonSerializer.serialize(&record.encode()).unwrap());
        request
    }

    #[test]
    fn create_assigns_id_and_revision() {
        let mock = MockPlatform::new();
        let envelope = mock
            .handle(&create_request(&EntityRecord::new("player").with_property("name", "jo")))
            .unwrap();
        let record = envelope.record().unwrap();
        assert_eq!(record.revision, 1);
        assert!(record.id.is_some());
        assert_eq!(mock.len(), 1);
    }

    #[test]
    fn failed_connection_create_stores_nothing() {
        let mock = MockPlatform::new();
        let existing = mock.insert(EntityRecord::new("player"));
        let connection = EntityRecord::new("friend").with_endpoints(
            EndpointRecord::inline("me", EntityRecord::new("player").with_property("name", "jo")),
            EndpointRecord::existing("them", "missing"),
        );

        let mut request = create_request(&connection);
        request.resource = Resource::Connection;
        let envelope = mock.handle(&request).unwrap();
        assert_eq!(envelope.status().code, Status::NOT_FOUND);
        assert_eq!(mock.len(), 1);
        assert!(mock.record(&existing).is_some());

        let connection = EntityRecord::new("friend").with_endpoints(
            EndpointRecord::inline("me", EntityRecord::new("player")),
            EndpointRecord::existing("them", existing),
        );
        let mut request = create_request(&connection);
        request.resource = Resource::Connection;
        let envelope = mock.handle(&request).unwrap();
        assert!(envelope.status().is_successful());
        assert_eq!(mock.len(), 3);
    }

    #[test]
    fn update_checks_revision() {
        let mock = MockPlatform::new();
        let id = mock.insert(EntityRecord::new("player").with_revision(6));

        let mut patch = PatchRecord::new();
        patch.properties.insert("score".into(), Some("1".into()));
        let mut request = ApiRequest::new(Resource::Object, Action::Update, "player")
            .with_id(id.clone())
            .with_revision(5);
        request.body = Some(JsonSerializer.serialize(&patch.encode()).unwrap());

        let envelope = mock.handle(&request).unwrap();
        assert_eq!(envelope.status().code, Status::CONFLICT);

        request.revision = None;
        let envelope = mock.handle(&request).unwrap();
        assert_eq!(envelope.record().unwrap().revision, 7);
        assert_eq!(
            mock.record(&id).unwrap().properties.get("score"),
            Some(&Some("1".into()))
        );
    }

    #[test]
    fn find_pages() {
        let mock = MockPlatform::new();
        for _ in 0..45 {
            mock.insert(EntityRecord::new("player"));
        }
        let request = ApiRequest::new(Resource::Object, Action::Find, "player")
            .with_query(Query::new().with_page(3).with_page_size(20));
        let envelope = mock.handle(&request).unwrap();
        assert_eq!(envelope.records().len(), 5);
        assert_eq!(envelope.paging(), Some(PagingInfo::new(3, 20, 45)));
    }

    #[test]
    fn missing_record() {
        let mock = MockPlatform::new();
        let request = ApiRequest::new(Resource::Object, Action::Get, "player").with_id("nope");
        assert_eq!(mock.handle(&request).unwrap().status().code, Status::NOT_FOUND);
    }

    #[test]
    fn injected_fault_consumed_once() {
        let mock = MockPlatform::new();
        mock.fail_next(Status::error("500", "boom"));
        let id = mock.insert(EntityRecord::new("player"));
        let request = ApiRequest::new(Resource::Object, Action::Get, "player").with_id(id);
        assert_eq!(mock.handle(&request).unwrap().status().code, "500");
        assert!(mock.handle(&request).unwrap().status().is_successful());
        assert_eq!(mock.count_of(Action::Get), 2);
    }
}
