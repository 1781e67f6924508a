use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use redis::{Connection, FromRedisValue, Pipeline, cmd, pipe};
use serde::{Serialize, de::DeserializeOwned};

use super::{EavStore, ValueRow};
use crate::{
    errors::{EavError, EavResult},
    keys::KeyContext,
    models::{Attribute, EnumGroup, EnumValue},
    types::{AttributeId, EnumGroupId, EnumValueId, ValueId},
};

/// Redis-backed store.
///
/// Definitions are JSON strings; each value row is a hash whose fields are the
/// populated sparse columns, and enum links are a set acting as the join table.
/// Multi-key writes go through `MULTI`/`EXEC` pipelines.
pub struct RedisStore {
    conn: RefCell<Connection>,
    prefix: String,
}

impl RedisStore {
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Self {
        Self {
            conn: RefCell::new(conn),
            prefix: prefix.into(),
        }
    }

    /// Opens a connection to `url` and stores every key under `prefix`.
    pub fn connect(url: &str, prefix: impl Into<String>) -> EavResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        Ok(Self::new(conn, prefix))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    fn query<T: FromRedisValue>(&self, command: &redis::Cmd) -> EavResult<T> {
        let mut conn = self.conn.borrow_mut();
        Ok(command.query(&mut *conn)?)
    }

    fn exec(&self, pipeline: &Pipeline) -> EavResult<()> {
        let mut conn = self.conn.borrow_mut();
        let _: () = pipeline.query(&mut *conn)?;
        Ok(())
    }

    fn next_id(&self) -> EavResult<u64> {
        self.query(cmd("INCR").arg(self.keys().sequence()))
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> EavResult<Option<T>> {
        let raw: Option<String> = self.query(cmd("GET").arg(key))?;
        raw.map(|json| serde_json::from_str(&json)).transpose().map_err(Into::into)
    }

    fn load_many<T: DeserializeOwned>(&self, keys: &[String]) -> EavResult<Vec<T>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<Option<String>> = self.query(cmd("MGET").arg(keys))?;
        raw.into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(Into::into))
            .collect()
    }

    fn members(&self, key: &str) -> EavResult<Vec<u64>> {
        let mut ids: Vec<u64> = self.query(cmd("SMEMBERS").arg(key))?;
        ids.sort_unstable();
        Ok(ids)
    }

    fn encode<T: Serialize>(record: &T) -> EavResult<String> {
        Ok(serde_json::to_string(record)?)
    }

    fn row_id(&self, value_type: &str, entity_id: &str, attribute: AttributeId) -> EavResult<Option<ValueId>> {
        let id: Option<u64> = self.query(
            cmd("HGET")
                .arg(self.keys().value_lookup(value_type))
                .arg(KeyContext::value_lookup_field(entity_id, attribute)),
        )?;
        Ok(id.map(ValueId))
    }

    fn load_row(&self, value_type: &str, id: ValueId) -> EavResult<Option<ValueRow>> {
        let keys = self.keys();
        let fields: HashMap<String, String> = self.query(cmd("HGETALL").arg(keys.value(value_type, id)))?;
        if fields.is_empty() {
            return Ok(None);
        }
        let links: Vec<u64> = self.query(cmd("SMEMBERS").arg(keys.value_enum(value_type, id)))?;
        let mut row = decode_row(&keys.value(value_type, id), &fields)?;
        row.id = Some(id);
        row.value_enum = links.into_iter().map(EnumValueId).collect();
        Ok(Some(row))
    }

    fn load_rows(&self, value_type: &str, index_key: &str) -> EavResult<Vec<ValueRow>> {
        let mut rows = Vec::new();
        for id in self.members(index_key)? {
            if let Some(row) = self.load_row(value_type, ValueId(id))? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Deletes every key under this store's prefix. Returns the number of keys removed.
    pub fn cleanup(&self) -> EavResult<u64> {
        const SCAN_COUNT: usize = 1000;
        let pattern = self.keys().pattern();
        let mut cursor: u64 = 0;
        let mut total_deleted: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = self.query(
                cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_COUNT),
            )?;

            if !keys.is_empty() {
                let deleted: u64 = self.query(cmd("DEL").arg(&keys))?;
                total_deleted += deleted;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        log::debug!("removed {total_deleted} keys under {pattern}");
        Ok(total_deleted)
    }
}

fn corrupt(key: &str, field: &str, detail: impl std::fmt::Display) -> EavError {
    EavError::Other {
        message: format!("corrupt value row {key}: field {field}: {detail}").into(),
    }
}

fn required_field<'a>(key: &str, fields: &'a HashMap<String, String>, name: &str) -> EavResult<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| corrupt(key, name, "missing"))
}

fn encode_row(row: &ValueRow) -> EavResult<Vec<(&'static str, String)>> {
    let mut fields = vec![
        ("entity_id", row.entity_id.clone()),
        ("attribute_id", row.attribute_id.to_string()),
    ];
    if let Some(text) = &row.value_text {
        fields.push(("value_text", text.clone()));
    }
    if let Some(number) = row.value_float {
        fields.push(("value_float", number.to_string()));
    }
    if let Some(number) = row.value_int {
        fields.push(("value_int", number.to_string()));
    }
    if let Some(date) = row.value_date {
        fields.push(("value_date", date.to_rfc3339()));
    }
    if let Some(flag) = row.value_bool {
        fields.push(("value_bool", if flag { "1" } else { "0" }.to_string()));
    }
    if let Some(reference) = &row.value_object {
        fields.push(("value_object", serde_json::to_string(reference)?));
    }
    Ok(fields)
}

fn decode_row(key: &str, fields: &HashMap<String, String>) -> EavResult<ValueRow> {
    let entity_id = required_field(key, fields, "entity_id")?;
    let attribute_id = required_field(key, fields, "attribute_id")?
        .parse::<u64>()
        .map_err(|err| corrupt(key, "attribute_id", err))?;
    let mut row = ValueRow::empty(entity_id, AttributeId(attribute_id));

    row.value_text = fields.get("value_text").cloned();
    if let Some(raw) = fields.get("value_float") {
        row.value_float = Some(raw.parse().map_err(|err| corrupt(key, "value_float", err))?);
    }
    if let Some(raw) = fields.get("value_int") {
        row.value_int = Some(raw.parse().map_err(|err| corrupt(key, "value_int", err))?);
    }
    if let Some(raw) = fields.get("value_date") {
        let parsed = DateTime::parse_from_rfc3339(raw).map_err(|err| corrupt(key, "value_date", err))?;
        row.value_date = Some(parsed.with_timezone(&Utc));
    }
    if let Some(raw) = fields.get("value_bool") {
        row.value_bool = Some(raw == "1");
    }
    if let Some(raw) = fields.get("value_object") {
        row.value_object = Some(serde_json::from_str(raw)?);
    }
    Ok(row)
}

impl EavStore for RedisStore {
    fn save_enum_group(&self, group: &EnumGroup) -> EavResult<EnumGroupId> {
        let id = match group.id {
            Some(id) => id,
            None => EnumGroupId(self.next_id()?),
        };
        let mut stored = group.clone();
        stored.id = Some(id);

        let keys = self.keys();
        let mut pipeline = pipe();
        pipeline
            .atomic()
            .cmd("SET")
            .arg(keys.enum_group(id))
            .arg(Self::encode(&stored)?)
            .ignore()
            .cmd("SADD")
            .arg(keys.enum_groups())
            .arg(id.0)
            .ignore();
        self.exec(&pipeline)?;
        Ok(id)
    }

    fn enum_group(&self, id: EnumGroupId) -> EavResult<Option<EnumGroup>> {
        self.load_json(&self.keys().enum_group(id))
    }

    fn enum_group_by_name(&self, name: &str) -> EavResult<Option<EnumGroup>> {
        Ok(self.enum_groups()?.into_iter().find(|group| group.name == name))
    }

    fn enum_groups(&self) -> EavResult<Vec<EnumGroup>> {
        let keys = self.keys();
        let record_keys: Vec<String> = self
            .members(&keys.enum_groups())?
            .into_iter()
            .map(|id| keys.enum_group(EnumGroupId(id)))
            .collect();
        self.load_many(&record_keys)
    }

    fn save_enum_value(&self, value: &EnumValue) -> EavResult<EnumValueId> {
        let keys = self.keys();
        let previous_group = match value.id {
            Some(id) => self
                .load_json::<EnumValue>(&keys.enum_value(id))?
                .and_then(|previous| previous.group),
            None => None,
        };
        let id = match value.id {
            Some(id) => id,
            None => EnumValueId(self.next_id()?),
        };
        let mut stored = value.clone();
        stored.id = Some(id);

        let mut pipeline = pipe();
        pipeline
            .atomic()
            .cmd("SET")
            .arg(keys.enum_value(id))
            .arg(Self::encode(&stored)?)
            .ignore()
            .cmd("SADD")
            .arg(keys.enum_values())
            .arg(id.0)
            .ignore();
        if let Some(previous) = previous_group
            && Some(previous) != value.group
        {
            pipeline
                .cmd("SREM")
                .arg(keys.enum_group_members(previous))
                .arg(id.0)
                .ignore();
        }
        if let Some(group) = value.group {
            pipeline.cmd("SADD").arg(keys.enum_group_members(group)).arg(id.0).ignore();
        }
        self.exec(&pipeline)?;
        Ok(id)
    }

    fn enum_value(&self, id: EnumValueId) -> EavResult<Option<EnumValue>> {
        self.load_json(&self.keys().enum_value(id))
    }

    fn enum_value_by_value(&self, value: &str) -> EavResult<Option<EnumValue>> {
        let keys = self.keys();
        let record_keys: Vec<String> = self
            .members(&keys.enum_values())?
            .into_iter()
            .map(|id| keys.enum_value(EnumValueId(id)))
            .collect();
        Ok(self
            .load_many::<EnumValue>(&record_keys)?
            .into_iter()
            .find(|candidate| candidate.value == value))
    }

    fn enum_values_in_group(&self, group: EnumGroupId) -> EavResult<Vec<EnumValue>> {
        let keys = self.keys();
        let record_keys: Vec<String> = self
            .members(&keys.enum_group_members(group))?
            .into_iter()
            .map(|id| keys.enum_value(EnumValueId(id)))
            .collect();
        self.load_many(&record_keys)
    }

    fn save_attribute(&self, attribute: &Attribute) -> EavResult<AttributeId> {
        let keys = self.keys();
        let previous_namespace = match attribute.id {
            Some(id) => self
                .load_json::<Attribute>(&keys.attribute(id))?
                .map(|previous| previous.namespace),
            None => None,
        };
        let id = match attribute.id {
            Some(id) => id,
            None => AttributeId(self.next_id()?),
        };
        let mut stored = attribute.clone();
        stored.id = Some(id);

        let mut pipeline = pipe();
        pipeline
            .atomic()
            .cmd("SET")
            .arg(keys.attribute(id))
            .arg(Self::encode(&stored)?)
            .ignore()
            .cmd("SADD")
            .arg(keys.attributes(&attribute.namespace))
            .arg(id.0)
            .ignore();
        if let Some(previous) = previous_namespace
            && previous != attribute.namespace
        {
            pipeline.cmd("SREM").arg(keys.attributes(&previous)).arg(id.0).ignore();
        }
        self.exec(&pipeline)?;
        Ok(id)
    }

    fn attribute(&self, namespace: &str, id: AttributeId) -> EavResult<Option<Attribute>> {
        Ok(self
            .load_json::<Attribute>(&self.keys().attribute(id))?
            .filter(|attribute| attribute.namespace == namespace))
    }

    fn attribute_by_id(&self, id: AttributeId) -> EavResult<Option<Attribute>> {
        self.load_json(&self.keys().attribute(id))
    }

    fn attributes(&self, namespace: &str) -> EavResult<Vec<Attribute>> {
        let keys = self.keys();
        let record_keys: Vec<String> = self
            .members(&keys.attributes(namespace))?
            .into_iter()
            .map(|id| keys.attribute(AttributeId(id)))
            .collect();
        let mut attributes: Vec<Attribute> = self.load_many(&record_keys)?;
        attributes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(attributes)
    }

    fn delete_attribute(&self, namespace: &str, id: AttributeId) -> EavResult<bool> {
        if self.attribute(namespace, id)?.is_none() {
            return Ok(false);
        }
        let keys = self.keys();
        let mut pipeline = pipe();
        pipeline
            .atomic()
            .cmd("DEL")
            .arg(keys.attribute(id))
            .ignore()
            .cmd("SREM")
            .arg(keys.attributes(namespace))
            .arg(id.0)
            .ignore();
        self.exec(&pipeline)?;
        Ok(true)
    }

    fn value_rows(&self, value_type: &str, entity_id: &str) -> EavResult<Vec<ValueRow>> {
        self.load_rows(value_type, &self.keys().entity_values(value_type, entity_id))
    }

    fn value_row(&self, value_type: &str, entity_id: &str, attribute: AttributeId) -> EavResult<Option<ValueRow>> {
        match self.row_id(value_type, entity_id, attribute)? {
            Some(id) => self.load_row(value_type, id),
            None => Ok(None),
        }
    }

    fn values_for_attribute(&self, value_type: &str, attribute: AttributeId) -> EavResult<Vec<ValueRow>> {
        self.load_rows(value_type, &self.keys().attribute_values(value_type, attribute))
    }

    fn attribute_in_use(&self, attribute: AttributeId) -> EavResult<bool> {
        let keys = self.keys();
        let value_types: Vec<String> = self.query(cmd("SMEMBERS").arg(keys.value_types()))?;
        for value_type in value_types {
            let count: u64 = self.query(cmd("SCARD").arg(keys.attribute_values(&value_type, attribute)))?;
            if count > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn save_value_row(&self, value_type: &str, row: &ValueRow) -> EavResult<ValueId> {
        let id = match self.row_id(value_type, &row.entity_id, row.attribute_id)? {
            Some(id) => id,
            None => ValueId(self.next_id()?),
        };
        let keys = self.keys();
        let record_key = keys.value(value_type, id);

        // Columns are rewritten wholesale so a stale slot never survives an update.
        let mut pipeline = pipe();
        pipeline
            .atomic()
            .cmd("DEL")
            .arg(&record_key)
            .ignore()
            .cmd("HSET")
            .arg(&record_key)
            .arg(encode_row(row)?)
            .ignore()
            .cmd("HSET")
            .arg(keys.value_lookup(value_type))
            .arg(KeyContext::value_lookup_field(&row.entity_id, row.attribute_id))
            .arg(id.0)
            .ignore()
            .cmd("SADD")
            .arg(keys.entity_values(value_type, &row.entity_id))
            .arg(id.0)
            .ignore()
            .cmd("SADD")
            .arg(keys.attribute_values(value_type, row.attribute_id))
            .arg(id.0)
            .ignore()
            .cmd("SADD")
            .arg(keys.value_types())
            .arg(value_type)
            .ignore();
        self.exec(&pipeline)?;
        Ok(id)
    }

    fn set_enum_links(&self, value_type: &str, value: ValueId, links: &BTreeSet<EnumValueId>) -> EavResult<()> {
        let keys = self.keys();
        let exists: bool = self.query(cmd("EXISTS").arg(keys.value(value_type, value)))?;
        if !exists {
            return Err(EavError::not_found("value", value));
        }

        let link_key = keys.value_enum(value_type, value);
        let mut pipeline = pipe();
        pipeline.atomic().cmd("DEL").arg(&link_key).ignore();
        if !links.is_empty() {
            let ids: Vec<u64> = links.iter().map(|id| id.0).collect();
            pipeline.cmd("SADD").arg(&link_key).arg(ids).ignore();
        }
        self.exec(&pipeline)
    }

    fn delete_value_row(&self, value_type: &str, entity_id: &str, attribute: AttributeId) -> EavResult<bool> {
        let Some(id) = self.row_id(value_type, entity_id, attribute)? else {
            return Ok(false);
        };
        let keys = self.keys();
        let mut pipeline = pipe();
        pipeline
            .atomic()
            .cmd("DEL")
            .arg(keys.value(value_type, id))
            .arg(keys.value_enum(value_type, id))
            .ignore()
            .cmd("HDEL")
            .arg(keys.value_lookup(value_type))
            .arg(KeyContext::value_lookup_field(entity_id, attribute))
            .ignore()
            .cmd("SREM")
            .arg(keys.entity_values(value_type, entity_id))
            .arg(id.0)
            .ignore()
            .cmd("SREM")
            .arg(keys.attribute_values(value_type, attribute))
            .arg(id.0)
            .ignore();
        self.exec(&pipeline)?;
        Ok(true)
    }

    fn count_values(&self, value_type: &str) -> EavResult<usize> {
        self.query(cmd("HLEN").arg(self.keys().value_lookup(value_type)))
    }
}
