//! In-process backend used by tests, benches and demos.
//!
//! Simulates core and collection admin, a small subset of the query syntax
//! emitted by the renderer, JSON updates, the commit counter and the
//! replication endpoint. Failures can be injected per handler.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::core::fields;
use crate::index::backend::{
    BackendError, BackendRequest, BackendResponse, BackendResult, SearchBackend, COLLECTION_ADMIN, COMMIT_COUNT,
    CORE_ADMIN, REPLICATION, SELECT, UPDATE,
};

type Doc = Map<String, Value>;

#[derive(Debug, Default)]
struct Resource {
    docs: BTreeMap<String, Doc>,
    deleted_docs: u64,
    commit_count: i64,
    generation: u64,
    /// Committed file list per generation.
    file_lists: BTreeMap<u64, Vec<Value>>,
    collection: bool,
}

impl Resource {
    fn commit(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let mut files: Vec<Value> = self
            .file_lists
            .get(&(generation - 1))
            .map(|files| {
                files
                    .iter()
                    .filter(|f| !f["name"].as_str().unwrap_or("").starts_with("segments_"))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        files.push(json!({"name": format!("_{}.cfs", generation), "size": 1024 + self.docs.len() as u64}));
        files.push(json!({"name": format!("segments_{}", generation), "size": 256}));
        self.file_lists.insert(generation, files);
    }
}

struct InjectedFailure {
    handler: &'static str,
    skip: usize,
    error: BackendError,
}

#[derive(Default)]
struct State {
    resources: HashMap<String, Resource>,
    /// Collections created but not yet visible to LIST, with remaining LIST calls.
    invisible: HashMap<String, usize>,
    list_lag: usize,
    auto_drain: bool,
    failures: VecDeque<InjectedFailure>,
    requests: Vec<BackendRequest>,
    releases: HashMap<String, usize>,
}

pub struct MemoryBackend {
    state: Mutex<State>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        MemoryBackend::new()
    }
}

fn not_found(kind: &str, name: &str) -> BackendError {
    BackendError::new(Some(404), format!("Can not find {}: {}", kind, name))
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend { state: Mutex::new(State { auto_drain: true, ..State::default() }) }
    }

    /// Number of LIST calls a new collection stays invisible for.
    pub fn set_list_lag(&self, calls: usize) {
        self.state.lock().list_lag = calls;
    }

    /// When set, each commit-count poll drains one outstanding commit.
    pub fn set_auto_drain(&self, enabled: bool) {
        self.state.lock().auto_drain = enabled;
    }

    pub fn set_commit_count(&self, resource: &str, count: i64) {
        if let Some(r) = self.state.lock().resources.get_mut(resource) {
            r.commit_count = count;
        }
    }

    pub fn commit_count(&self, resource: &str) -> Option<i64> {
        self.state.lock().resources.get(resource).map(|r| r.commit_count)
    }

    /// Fails the `skip`-th next call (0 = the very next) to `handler` once.
    pub fn inject_failure(&self, handler: &'static str, skip: usize, error: BackendError) {
        self.state.lock().failures.push_back(InjectedFailure { handler, skip, error });
    }

    /// Removes a resource behind the store's back.
    pub fn drop_resource(&self, resource: &str) {
        self.state.lock().resources.remove(resource);
    }

    pub fn has_resource(&self, resource: &str) -> bool {
        self.state.lock().resources.contains_key(resource)
    }

    pub fn doc_count(&self, resource: &str) -> usize {
        self.state.lock().resources.get(resource).map_or(0, |r| r.docs.len())
    }

    pub fn document(&self, resource: &str, id: &str) -> Option<Value> {
        let state = self.state.lock();
        state.resources.get(resource)?.docs.get(id).cloned().map(Value::Object)
    }

    pub fn generation(&self, resource: &str) -> Option<u64> {
        self.state.lock().resources.get(resource).map(|r| r.generation)
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self, handler: &str) -> usize {
        self.state.lock().requests.iter().filter(|r| r.handler == handler).count()
    }

    pub fn release_count(&self, resource: &str) -> usize {
        self.state.lock().releases.get(resource).copied().unwrap_or(0)
    }

    fn take_failure(state: &mut State, handler: &str) -> Option<BackendError> {
        let mut hit = None;
        for (i, failure) in state.failures.iter_mut().enumerate() {
            if failure.handler != handler {
                continue;
            }
            if failure.skip == 0 {
                hit = Some(i);
                break;
            }
            failure.skip -= 1;
        }
        hit.and_then(|i| state.failures.remove(i)).map(|f| f.error)
    }

    fn core_admin(state: &mut State, req: &BackendRequest) -> BackendResult<Value> {
        match req.get_param("action").unwrap_or("") {
            "CREATE" => {
                let name = req.get_param("name").unwrap_or("");
                if state.resources.contains_key(name) {
                    return Err(BackendError::new(None, format!("Core with name '{}' already exists.", name)));
                }
                state.resources.insert(name.to_string(), Resource::default());
                Ok(json!({"core": name}))
            }
            "UNLOAD" => {
                let name = req.get_param("core").unwrap_or("");
                match state.resources.remove(name) {
                    Some(_) => Ok(json!({})),
                    None => Err(not_found("core", name)),
                }
            }
            "STATUS" => {
                let mut status = Map::new();
                match req.get_param("core") {
                    Some(name) => {
                        let entry = state.resources.get(name).map(core_status).unwrap_or_else(|| json!({}));
                        status.insert(name.to_string(), entry);
                    }
                    None => {
                        for (name, resource) in &state.resources {
                            let key = if resource.collection { format!("{}_shard1_replica_n1", name) } else { name.clone() };
                            status.insert(key, core_status(resource));
                        }
                    }
                }
                Ok(json!({"status": status}))
            }
            other => Err(BackendError::new(Some(400), format!("unsupported core action: {}", other))),
        }
    }

    fn collection_admin(state: &mut State, req: &BackendRequest) -> BackendResult<Value> {
        match req.get_param("action").unwrap_or("") {
            "CREATE" => {
                let name = req.get_param("name").unwrap_or("");
                if state.resources.contains_key(name) {
                    return Err(BackendError::new(None, format!("collection already exists: {}", name)));
                }
                state.resources.insert(name.to_string(), Resource { collection: true, ..Resource::default() });
                if state.list_lag > 0 {
                    state.invisible.insert(name.to_string(), state.list_lag);
                }
                Ok(json!({"success": {}}))
            }
            "DELETE" => {
                let name = req.get_param("name").unwrap_or("");
                state.invisible.remove(name);
                match state.resources.remove(name) {
                    Some(_) => Ok(json!({"success": {}})),
                    None => Err(BackendError::new(None, format!("Could not find collection : {}", name))),
                }
            }
            "LIST" => {
                let hidden: HashSet<String> = state.invisible.keys().cloned().collect();
                state.invisible.retain(|_, remaining| {
                    *remaining -= 1;
                    *remaining > 0
                });
                let mut names: Vec<&String> = state
                    .resources
                    .iter()
                    .filter(|(name, r)| r.collection && !hidden.contains(*name))
                    .map(|(name, _)| name)
                    .collect();
                names.sort();
                Ok(json!({"collections": names}))
            }
            other => Err(BackendError::new(Some(400), format!("unsupported collection action: {}", other))),
        }
    }

    fn update(state: &mut State, name: &str, req: &BackendRequest) -> BackendResult<Value> {
        let resource = state.resources.get_mut(name).ok_or_else(|| not_found("core", name))?;
        match &req.body {
            Some(Value::Array(docs)) => {
                for doc in docs {
                    let doc = doc.as_object().ok_or_else(|| BackendError::new(Some(400), "document must be an object"))?;
                    let id = doc
                        .get(fields::SOLR_ID)
                        .and_then(Value::as_str)
                        .ok_or_else(|| BackendError::new(Some(400), "missing unique key"))?;
                    if resource.docs.insert(id.to_string(), doc.clone()).is_some() {
                        resource.deleted_docs += 1;
                    }
                }
            }
            Some(Value::Object(command)) => {
                let query = command
                    .get("delete")
                    .and_then(|d| d.get("query"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| BackendError::new(Some(400), "unsupported update command"))?;
                let (field, values) = parse_delete_query(query)?;
                let before = resource.docs.len();
                resource.docs.retain(|_, doc| !field_values(doc, &field).iter().any(|v| values.contains(v)));
                resource.deleted_docs += (before - resource.docs.len()) as u64;
            }
            _ => {}
        }
        // visibility is immediate; generations advance per update
        resource.commit();
        Ok(json!({"responseHeader": {"status": 0}}))
    }

    fn commit_counter(state: &mut State, name: &str, req: &BackendRequest) -> BackendResult<Value> {
        let auto_drain = state.auto_drain;
        let resource = state.resources.get_mut(name).ok_or_else(|| not_found("core", name))?;
        match req.get_param("action").unwrap_or("get") {
            "increment" => {
                resource.commit_count += 1;
                Ok(json!({"count": resource.commit_count}))
            }
            _ => {
                let count = resource.commit_count;
                if auto_drain && count > 0 {
                    resource.commit_count -= 1;
                }
                Ok(json!({"count": count}))
            }
        }
    }

    fn replication(state: &mut State, name: &str, req: &BackendRequest) -> BackendResult<Value> {
        let resource = state.resources.get(name).ok_or_else(|| not_found("core", name))?;
        match req.get_param("command").unwrap_or("") {
            "indexversion" => Ok(json!({"indexversion": resource.generation * 1000, "generation": resource.generation})),
            "filelist" => {
                let generation: u64 = req
                    .get_param("generation")
                    .and_then(|g| g.parse().ok())
                    .ok_or_else(|| BackendError::new(Some(400), "missing generation"))?;
                match resource.file_lists.get(&generation) {
                    Some(files) => Ok(json!({"filelist": files})),
                    None => Err(BackendError::new(Some(400), format!("invalid index generation: {}", generation))),
                }
            }
            other => Err(BackendError::new(Some(400), format!("unsupported replication command: {}", other))),
        }
    }

    fn select(state: &mut State, name: &str, req: &BackendRequest) -> BackendResult<Value> {
        let resource = state.resources.get(name).ok_or_else(|| not_found("core", name))?;
        let q = req.get_param("q").unwrap_or("*:*");
        let filters = req.get_params("fq");

        let mut hits: Vec<&Doc> = Vec::new();
        for doc in resource.docs.values() {
            if !matches(doc, q)? {
                continue;
            }
            let mut keep = true;
            for filter in &filters {
                keep &= matches(doc, filter)?;
            }
            if keep {
                hits.push(doc);
            }
        }

        if let Some(sort) = req.get_param("sort") {
            let first = sort.split(',').next().unwrap_or("").trim();
            let (field, order) = first.split_once(' ').unwrap_or((first, "asc"));
            hits.sort_by(|a, b| compare_field(a, b, field));
            if order.trim() == "desc" {
                hits.reverse();
            }
        }

        let start: usize = req.get_param("start").and_then(|s| s.parse().ok()).unwrap_or(0);
        let rows: usize = req.get_param("rows").and_then(|s| s.parse().ok()).unwrap_or(10);
        let fl: Option<Vec<&str>> = req.get_param("fl").map(|fl| fl.split(',').map(str::trim).collect());

        let docs: Vec<Value> = hits
            .iter()
            .skip(start)
            .take(rows)
            .map(|doc| {
                let mut out = Map::new();
                for (key, value) in doc.iter() {
                    if fl.as_ref().map_or(true, |fl| fl.contains(&key.as_str())) {
                        out.insert(key.clone(), value.clone());
                    }
                }
                if fl.as_ref().map_or(false, |fl| fl.contains(&fields::SCORE)) {
                    out.insert(fields::SCORE.to_string(), json!(1.0));
                }
                Value::Object(out)
            })
            .collect();
        Ok(json!({"response": {"numFound": hits.len(), "start": start, "docs": docs}}))
    }
}

impl SearchBackend for MemoryBackend {
    fn execute(&self, request: &BackendRequest) -> BackendResult<BackendResponse> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        if let Some(error) = MemoryBackend::take_failure(&mut state, request.handler) {
            return Err(error);
        }
        let body = match (request.handler, request.resource.as_deref()) {
            (CORE_ADMIN, _) => MemoryBackend::core_admin(&mut state, request),
            (COLLECTION_ADMIN, _) => MemoryBackend::collection_admin(&mut state, request),
            (UPDATE, Some(name)) => MemoryBackend::update(&mut state, name, request),
            (SELECT, Some(name)) => MemoryBackend::select(&mut state, name, request),
            (COMMIT_COUNT, Some(name)) => MemoryBackend::commit_counter(&mut state, name, request),
            (REPLICATION, Some(name)) => MemoryBackend::replication(&mut state, name, request),
            (handler, _) => Err(BackendError::new(Some(400), format!("unsupported request: {}", handler))),
        }?;
        Ok(BackendResponse(body))
    }

    fn release(&self, resource: &str) {
        *self.state.lock().releases.entry(resource.to_string()).or_insert(0) += 1;
    }
}

fn core_status(resource: &Resource) -> Value {
    json!({
        "index": {
            "numDocs": resource.docs.len(),
            "maxDoc": resource.docs.len() as u64 + resource.deleted_docs,
            "deletedDocs": resource.deleted_docs,
            "generation": resource.generation,
        }
    })
}

fn field_values(doc: &Doc, field: &str) -> Vec<String> {
    match doc.get(field) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(values)) => values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        Some(other) => vec![other.to_string()],
        None => Vec::new(),
    }
}

fn compare_field(a: &Doc, b: &Doc, field: &str) -> std::cmp::Ordering {
    let key = |doc: &Doc| field_values(doc, field).into_iter().next().unwrap_or_default();
    let (ka, kb) = (key(a), key(b));
    match (ka.parse::<i64>(), kb.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => ka.cmp(&kb),
    }
}

/// `field:(v1 v2 ...)`
fn parse_delete_query(query: &str) -> BackendResult<(String, HashSet<String>)> {
    let (field, rest) = query
        .split_once(':')
        .ok_or_else(|| BackendError::new(Some(400), format!("unsupported delete query: {}", query)))?;
    let values = rest.trim_start_matches('(').trim_end_matches(')').split_whitespace().map(str::to_string).collect();
    Ok((field.to_string(), values))
}

/// Splits `{!parser k='v' k2=v2}rest` into its parts.
fn parse_local_params(q: &str) -> Option<(String, HashMap<String, String>, String)> {
    let body = q.strip_prefix("{!")?;
    let mut chars = body.chars().peekable();
    let mut parser = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == '}' {
            break;
        }
        parser.push(c);
        chars.next();
    }
    let mut params = HashMap::new();
    loop {
        while chars.peek().map_or(false, |c| c.is_whitespace()) {
            chars.next();
        }
        match chars.peek() {
            Some('}') => {
                chars.next();
                break;
            }
            None => return None,
            _ => {}
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        chars.next();
        let mut value = String::new();
        if chars.peek() == Some(&'\'') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(n) = chars.next() {
                            value.push(n);
                        }
                    }
                    '\'' => break,
                    c => value.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '}' {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        params.insert(key, value);
    }
    Some((parser, params, chars.collect()))
}

/// Splits the inside of a boolean group into top-level clauses.
fn split_clauses(inner: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let (mut parens, mut braces) = (0i32, 0i32);
    let (mut in_single, mut in_double, mut escaped) = (false, false, false);
    for c in inner.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\'' if braces > 0 => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '(' if !in_single && !in_double => parens += 1,
            ')' if !in_single && !in_double => parens -= 1,
            '{' if !in_single && !in_double => braces += 1,
            '}' if !in_single && !in_double => braces -= 1,
            c if c.is_whitespace() && parens == 0 && braces == 0 && !in_single && !in_double => {
                if !current.is_empty() {
                    clauses.push(std::mem::take(&mut current));
                }
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.is_empty() {
        clauses.push(current);
    }
    clauses
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(n) = chars.next() {
                out.push(n);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"').and_then(|t| t.strip_suffix('"')).unwrap_or(text)
}

fn glob_matches(pattern: &str, word: &str) -> bool {
    let leading = pattern.starts_with('*');
    let trailing = pattern.ends_with('*');
    let core = pattern.trim_matches('*');
    match (leading, trailing) {
        (true, true) => word.contains(core),
        (false, true) => word.starts_with(core),
        (true, false) => word.ends_with(core),
        (false, false) => word == core,
    }
}

fn field_text(doc: &Doc, field: &str) -> String {
    field_values(doc, field).join(" ").to_lowercase()
}

fn sign_split(clause: &str) -> (char, &str) {
    match clause.chars().next() {
        Some(c @ ('+' | '-')) => (c, &clause[1..]),
        _ => (' ', clause),
    }
}

/// Evaluates the subset of query syntax produced by the renderer.
fn matches(doc: &Doc, q: &str) -> BackendResult<bool> {
    let q = q.trim();
    if q == "*:*" {
        return Ok(true);
    }
    if q.starts_with("{!") {
        let (parser, params, rest) =
            parse_local_params(q).ok_or_else(|| BackendError::new(Some(400), format!("bad local params: {}", q)))?;
        let v = params.get("v").cloned().unwrap_or(rest);
        return match parser.as_str() {
            "lucene" => matches(doc, &v),
            "terms" => {
                let field = params.get("f").cloned().unwrap_or_default();
                let wanted: HashSet<&str> = v.split(',').collect();
                Ok(field_values(doc, &field).iter().any(|value| wanted.contains(value.as_str())))
            }
            "edismax" => {
                let fields: Vec<String> = params
                    .get("qf")
                    .map(|qf| qf.split_whitespace().map(|f| f.split('^').next().unwrap_or(f).to_string()).collect())
                    .unwrap_or_default();
                let text: String = fields.iter().map(|f| field_text(doc, f)).collect::<Vec<_>>().join(" ");
                for clause in split_clauses(&v) {
                    let (sign, term) = sign_split(&clause);
                    let term = unescape(strip_quotes(term)).to_lowercase();
                    let found = text.contains(&term);
                    if (sign == '-' && found) || (sign != '-' && !found) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            "zimbrawildcard" => {
                let pattern = unescape(&v).to_lowercase();
                let fields = params.get("fields").cloned().unwrap_or_default();
                Ok(fields
                    .split_whitespace()
                    .any(|f| field_text(doc, f).split_whitespace().any(|w| glob_matches(&pattern, w))))
            }
            other => Err(BackendError::new(Some(400), format!("unknown query parser: {}", other))),
        };
    }
    if let Some(inner) = q.strip_prefix('(').and_then(|q| q.strip_suffix(')')) {
        let (mut required, mut optional_hit, mut has_optional) = (true, false, false);
        for clause in split_clauses(inner) {
            let (sign, sub) = sign_split(&clause);
            let hit = matches(doc, sub)?;
            match sign {
                '+' => required &= hit,
                '-' => required &= !hit,
                _ => {
                    has_optional = true;
                    optional_hit |= hit;
                }
            }
        }
        let has_required = split_clauses(inner).iter().any(|c| c.starts_with('+'));
        return Ok(required && (optional_hit || !has_optional || has_required));
    }
    let (field, value) = q
        .split_once(':')
        .ok_or_else(|| BackendError::new(Some(400), format!("unsupported query: {}", q)))?;
    let field = unescape(field);
    if let Some(range) = value.strip_prefix('[').or_else(|| value.strip_prefix('{')) {
        let range = range.trim_end_matches(']').trim_end_matches('}');
        let (lower, upper) = range.split_once(" TO ").unwrap_or((range, "*"));
        let lower_inclusive = value.starts_with('[');
        let upper_inclusive = value.ends_with(']');
        return Ok(field_values(doc, &field).iter().filter_map(|v| v.parse::<i64>().ok()).any(|n| {
            let above = lower == "*" || lower.parse::<i64>().map_or(false, |l| if lower_inclusive { n >= l } else { n > l });
            let below = upper == "*" || upper.parse::<i64>().map_or(false, |u| if upper_inclusive { n <= u } else { n < u });
            above && below
        }));
    }
    if value.ends_with('*') && !value.ends_with("\\*") {
        let pattern = unescape(value).to_lowercase();
        return Ok(field_text(doc, &field).split_whitespace().any(|w| glob_matches(&pattern, w)));
    }
    let value = unescape(strip_quotes(value)).to_lowercase();
    Ok(field_values(doc, &field).iter().any(|v| v.to_lowercase().contains(&value)))
}
