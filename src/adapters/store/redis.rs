//! Redis-backed document store for multi-instance deployments.
//!
//! Layout under a namespace `ns`:
//! - `ns:{collection}:{id}` holds the document as a JSON string
//! - `ns:{collection}:__ids` is the set of ids, used by `scan_all`
//! - `ns:{collection}:idx:{field}:{value}` is the set of ids whose string
//!   field equals `value`, maintained only for registered fields
//!
//! Writes go through one Lua script so the document and its index entries
//! change together.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use serde_json::Value;

use crate::ports::{DocumentPath, DocumentStore, FieldPatch, StoreError, StoredDocument};

const WRITE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
local old = {}
if raw then old = cjson.decode(raw) end

local doc
if ARGV[1] == 'set' then
  doc = cjson.decode(ARGV[2])
else
  doc = cjson.decode(raw or '{}')
  for path, value in pairs(cjson.decode(ARGV[2])) do
    local parts = {}
    for part in string.gmatch(path, '[^/]+') do parts[#parts + 1] = part end
    local node = doc
    for i = 1, #parts - 1 do
      if type(node[parts[i]]) ~= 'table' then node[parts[i]] = {} end
      node = node[parts[i]]
    end
    if #parts > 0 then
      if value == cjson.null then node[parts[#parts]] = nil else node[parts[#parts]] = value end
    end
  end
end

for i = 5, #ARGV do
  local field = ARGV[i]
  local before = old[field]
  local after = doc[field]
  if before ~= after then
    if type(before) == 'string' then
      redis.call('SREM', ARGV[4] .. field .. ':' .. before, ARGV[3])
    end
    if type(after) == 'string' then
      redis.call('SADD', ARGV[4] .. field .. ':' .. after, ARGV[3])
    end
  end
end

redis.call('SET', KEYS[1], cjson.encode(doc))
redis.call('SADD', KEYS[2], ARGV[3])
return 1
"#;

/// Redis document store.
#[derive(Clone)]
pub struct RedisDocumentStore {
    conn: MultiplexedConnection,
    namespace: String,
    indexes: HashMap<String, HashSet<String>>,
    script: Script,
}

impl RedisDocumentStore {
    pub fn new(conn: MultiplexedConnection, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
            indexes: HashMap::new(),
            script: Script::new(WRITE_SCRIPT),
        }
    }

    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(backend_err)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(backend_err)?;
        Ok(Self::new(conn, namespace))
    }

    /// Maintains a secondary index for equality queries on `field`.
    ///
    /// Only string values are indexed. Documents written before the index
    /// was registered are not backfilled.
    pub fn with_index(mut self, collection: &str, field: &str) -> Self {
        self.indexes
            .entry(collection.to_string())
            .or_default()
            .insert(field.to_string());
        self
    }

    fn doc_key(&self, collection: &str, id: &str) -> String {
        format!("{}:{}:{}", self.namespace, collection, id)
    }

    fn ids_key(&self, collection: &str) -> String {
        format!("{}:{}:__ids", self.namespace, collection)
    }

    fn index_prefix(&self, collection: &str) -> String {
        format!("{}:{}:idx:", self.namespace, collection)
    }

    fn index_key(&self, collection: &str, field: &str, value: &str) -> String {
        format!("{}{}:{}", self.index_prefix(collection), field, value)
    }

    fn indexed_fields(&self, collection: &str) -> Vec<&str> {
        let mut fields: Vec<&str> = self
            .indexes
            .get(collection)
            .map(|fields| fields.iter().map(String::as_str).collect())
            .unwrap_or_default();
        fields.sort_unstable();
        fields
    }

    async fn write(&self, path: &DocumentPath, mode: &str, body: &Value) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(body)?;
        let mut invocation = self.script.prepare_invoke();
        invocation
            .key(self.doc_key(&path.collection, &path.id))
            .key(self.ids_key(&path.collection))
            .arg(mode)
            .arg(encoded)
            .arg(&path.id)
            .arg(self.index_prefix(&path.collection));
        for field in self.indexed_fields(&path.collection) {
            invocation.arg(field);
        }

        let mut conn = self.conn.clone();
        invocation
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn load_many(
        &self,
        collection: &str,
        mut ids: Vec<String>,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ids.sort();

        let keys: Vec<String> = ids.iter().map(|id| self.doc_key(collection, id)).collect();
        let mut conn = self.conn.clone();
        let raws: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(backend_err)?;

        let mut documents = Vec::with_capacity(ids.len());
        for (id, raw) in ids.into_iter().zip(raws) {
            if let Some(raw) = raw {
                documents.push(StoredDocument {
                    id,
                    body: serde_json::from_str(&raw)?,
                });
            }
        }
        Ok(documents)
    }
}

fn backend_err(err: redis::RedisError) -> StoreError {
    StoreError::backend(err.to_string())
}

/// Index sets only hold string values.
fn index_value(value: &Value) -> Option<&str> {
    value.as_str()
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.doc_key(&path.collection, &path.id))
            .await
            .map_err(backend_err)?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, path: &DocumentPath, value: Value) -> Result<(), StoreError> {
        self.write(path, "set", &value).await
    }

    async fn update(&self, path: &DocumentPath, patch: FieldPatch) -> Result<(), StoreError> {
        self.write(path, "patch", &Value::Object(patch)).await
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let indexed = self
            .indexes
            .get(collection)
            .map(|fields| fields.contains(field))
            .unwrap_or(false);
        if !indexed {
            return Err(StoreError::index_unavailable(collection, field));
        }

        let Some(value) = index_value(value) else {
            return Ok(Vec::new());
        };

        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .smembers(self.index_key(collection, field, value))
            .await
            .map_err(backend_err)?;
        self.load_many(collection, ids).await
    }

    async fn scan_all(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .smembers(self.ids_key(collection))
            .await
            .map_err(backend_err)?;
        self.load_many(collection, ids).await
    }
}

impl std::fmt::Debug for RedisDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisDocumentStore")
            .field("namespace", &self.namespace)
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}
