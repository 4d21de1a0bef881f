// Schema snapshots
//
// A snapshot flattens a descriptor tree into an arena of nodes that refer to
// their children by index. Identical subtrees are stored once: each node is
// keyed by the blake3 hash of its canonical serialized form, and children are
// interned before their parents so equal children already share an index.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codec::json;
use crate::codec::types::Target;
use crate::internal::error::{Error, Result, ResultExt};
use crate::schema::defaults::DefaultSpec;
use crate::schema::types::{EnumType, Identity, Kind, StructType, TypeDescriptor};

/// Kind tag of a snapshot node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Any,
    Int,
    Float,
    Str,
    Bool,
    Bytes,
    Datetime,
    Path,
    List,
    Map,
    DefaultMap,
    Tuple,
    Struct,
    Enum,
}

/// Persisted default specifier. Constants are stored JSON-safe encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "spec", content = "value", rename_all = "snake_case")]
pub enum SnapshotDefault {
    #[default]
    Required,
    Constant(serde_json::Value),
    Now,
    Missing,
    Empty,
}

impl SnapshotDefault {
    fn is_required(&self) -> bool {
        matches!(self, SnapshotDefault::Required)
    }
}

/// One descriptor in the arena.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotNode {
    pub kind: NodeKind,
    /// Container parameters (element, value or tuple members).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<usize>,
    /// Structure fields in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<(String, usize)>,
    /// Enumeration members and their numbers in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<(String, i64)>,
    /// Structure or enumeration name; absent for anonymous structures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "SnapshotDefault::is_required")]
    pub default: SnapshotDefault,
}

/// A self-contained, serializable copy of a descriptor tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SchemaSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub root: usize,
}

#[derive(Default)]
struct SnapshotBuilder {
    nodes: Vec<SnapshotNode>,
    index: HashMap<blake3::Hash, usize>,
}

impl SnapshotBuilder {
    fn intern(&mut self, descriptor: &TypeDescriptor) -> Result<usize> {
        let mut params = Vec::new();
        let mut fields = Vec::new();
        let mut members = Vec::new();
        let mut name = None;

        let kind = match descriptor.kind() {
            Kind::Any => NodeKind::Any,
            Kind::Int => NodeKind::Int,
            Kind::Float => NodeKind::Float,
            Kind::Str => NodeKind::Str,
            Kind::Bool => NodeKind::Bool,
            Kind::Bytes => NodeKind::Bytes,
            Kind::Datetime => NodeKind::Datetime,
            Kind::Path => NodeKind::Path,
            Kind::List(element) => {
                params.push(self.intern(element)?);
                NodeKind::List
            }
            Kind::Map(element) => {
                params.push(self.intern(element)?);
                NodeKind::Map
            }
            Kind::DefaultMap(element) => {
                params.push(self.intern(element)?);
                NodeKind::DefaultMap
            }
            Kind::Tuple(elements) => {
                for (i, element) in elements.iter().enumerate() {
                    params.push(self.intern(element).within(i.to_string())?);
                }
                NodeKind::Tuple
            }
            Kind::Struct(st) => {
                for (field_name, field) in st.fields() {
                    fields.push((field_name.clone(), self.intern(field).within(field_name.as_str())?));
                }
                name = st.name().map(str::to_string);
                NodeKind::Struct
            }
            Kind::Enum(en) => {
                members = en.members().map(|(member, number)| (member.clone(), *number)).collect();
                name = Some(en.name().to_string());
                NodeKind::Enum
            }
        };

        let default = match descriptor.default_spec() {
            DefaultSpec::Required => SnapshotDefault::Required,
            DefaultSpec::Constant(value) => {
                let encoded = descriptor.to_target(value, Target::JsonSafe)?;
                SnapshotDefault::Constant(json::to_json(&encoded)?)
            }
            DefaultSpec::Now => SnapshotDefault::Now,
            DefaultSpec::Missing => SnapshotDefault::Missing,
            DefaultSpec::Empty => SnapshotDefault::Empty,
            DefaultSpec::Factory(_) => {
                return Err(Error::conversion(format!(
                    "{descriptor}: factory defaults cannot be persisted"
                )))
            }
        };

        let node = SnapshotNode { kind, params, fields, members, name, default };
        let canonical = serde_json::to_vec(&node).map_err(|err| Error::conversion(err.to_string()))?;
        let key = blake3::hash(&canonical);
        if let Some(&existing) = self.index.get(&key) {
            return Ok(existing);
        }
        let id = self.nodes.len();
        self.nodes.push(node);
        self.index.insert(key, id);
        Ok(id)
    }
}

fn child(built: &[TypeDescriptor], at: usize, index: usize) -> Result<TypeDescriptor> {
    built.get(index).cloned().ok_or_else(|| {
        Error::conversion(format!("Snapshot node {at} refers to node {index}, which is not defined before it"))
    })
}

impl SchemaSnapshot {
    /// Captures a descriptor tree.
    ///
    /// Fails when a default cannot be persisted (arbitrary factories).
    pub fn capture(descriptor: &TypeDescriptor) -> Result<Self> {
        let mut builder = SnapshotBuilder::default();
        let root = builder.intern(descriptor)?;
        Ok(Self { nodes: builder.nodes, root })
    }

    /// Rebuilds the descriptor tree.
    ///
    /// Nodes may only refer to earlier nodes, which rules out cycles.
    /// Restored structures carry no class binding.
    pub fn restore(&self) -> Result<TypeDescriptor> {
        let mut built: Vec<TypeDescriptor> = Vec::with_capacity(self.nodes.len());
        for (at, node) in self.nodes.iter().enumerate() {
            let expect_params = |n: usize| -> Result<()> {
                if node.params.len() == n {
                    Ok(())
                } else {
                    Err(Error::conversion(format!(
                        "Snapshot node {at} ({:?}) needs {n} parameter(s), has {}",
                        node.kind,
                        node.params.len()
                    )))
                }
            };

            let base = match node.kind {
                NodeKind::Any => TypeDescriptor::any(),
                NodeKind::Int => TypeDescriptor::int(),
                NodeKind::Float => TypeDescriptor::float(),
                NodeKind::Str => TypeDescriptor::str(),
                NodeKind::Bool => TypeDescriptor::bool(),
                NodeKind::Bytes => TypeDescriptor::bytes(),
                NodeKind::Datetime => TypeDescriptor::datetime(),
                NodeKind::Path => TypeDescriptor::path(),
                NodeKind::List => {
                    expect_params(1)?;
                    TypeDescriptor::list(child(&built, at, node.params[0])?)
                }
                NodeKind::Map => {
                    expect_params(1)?;
                    TypeDescriptor::map(child(&built, at, node.params[0])?)
                }
                NodeKind::DefaultMap => {
                    expect_params(1)?;
                    TypeDescriptor::default_map(child(&built, at, node.params[0])?)
                }
                NodeKind::Tuple => {
                    let mut elements = Vec::with_capacity(node.params.len());
                    for &index in &node.params {
                        elements.push(child(&built, at, index)?);
                    }
                    TypeDescriptor::tuple(elements)
                }
                NodeKind::Struct => {
                    let identity = match &node.name {
                        Some(name) => Identity::Named(name.clone()),
                        None => Identity::Anonymous,
                    };
                    let mut st = StructType::with_identity(identity);
                    for (field_name, index) in &node.fields {
                        st = st.field(field_name.as_str(), child(&built, at, *index)?);
                    }
                    TypeDescriptor::structure(st)
                }
                NodeKind::Enum => {
                    let name = node.name.as_deref().ok_or_else(|| {
                        Error::conversion(format!("Snapshot node {at} is an enumeration without a name"))
                    })?;
                    node.members
                        .iter()
                        .fold(EnumType::new(name), |en, (member, number)| en.member(member.as_str(), *number))
                        .into_descriptor()
                }
            };

            let descriptor = match &node.default {
                SnapshotDefault::Required => base,
                SnapshotDefault::Constant(raw) => {
                    let value = base.from_target(&json::from_json(raw)?, Target::JsonSafe)?;
                    base.default(value)
                }
                SnapshotDefault::Now => base.now(),
                SnapshotDefault::Missing => base.missing(),
                SnapshotDefault::Empty => base.empty(),
            };
            built.push(descriptor);
        }

        built
            .get(self.root)
            .cloned()
            .ok_or_else(|| Error::conversion(format!("Snapshot root {} is out of range", self.root)))
    }

    /// Hex blake3 digest of the canonical serialized snapshot.
    pub fn fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self).map_err(|err| Error::conversion(err.to_string()))?;
        Ok(blake3::hash(&canonical).to_hex().to_string())
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| Error::conversion(err.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| Error::conversion(format!("Invalid schema snapshot: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::defaults::Factory;

    fn module() -> StructType {
        StructType::named("Module")
            .field("layers", TypeDescriptor::int().default(42))
            .field("tags", TypeDescriptor::list(TypeDescriptor::str()).empty())
    }

    #[test]
    fn test_identical_subtrees_are_stored_once() {
        let root = StructType::anonymous()
            .field("encoder", module().into_descriptor())
            .field("decoder", module().into_descriptor())
            .field("size", TypeDescriptor::int().default(42));
        let snapshot = SchemaSnapshot::capture(&root.into_descriptor()).unwrap();

        let fields = &snapshot.nodes[snapshot.root].fields;
        assert_eq!(fields[0].1, fields[1].1);
        // `size` has the same descriptor as `layers`.
        let module_node = &snapshot.nodes[fields[0].1];
        assert_eq!(module_node.fields[0].1, fields[2].1);
    }

    #[test]
    fn test_restore_rebuilds_equal_descriptor() {
        let root = StructType::anonymous()
            .field("module", module().into_descriptor().empty())
            .field("seen", TypeDescriptor::datetime().now())
            .field("blob", TypeDescriptor::bytes().default(bytes::Bytes::from_static(b"hello")))
            .field("nick", TypeDescriptor::str().missing())
            .into_descriptor();
        let snapshot = SchemaSnapshot::capture(&root).unwrap();
        let text = snapshot.to_json_string().unwrap();
        let restored = SchemaSnapshot::from_json_str(&text).unwrap().restore().unwrap();
        assert_eq!(restored, root);
        assert!(text.contains("Xk~0{Zv"));
    }

    #[test]
    fn test_enum_and_default_map_survive_restore() {
        let colour = EnumType::new("Colour").member("red", 1).member("green", 2);
        let root = StructType::named("Palette")
            .field("main", colour.into_descriptor().default("green"))
            .field("counts", TypeDescriptor::default_map(TypeDescriptor::int().default(0)).empty())
            .into_descriptor();
        let snapshot = SchemaSnapshot::capture(&root).unwrap();
        let text = snapshot.to_json_string().unwrap();
        let restored = SchemaSnapshot::from_json_str(&text).unwrap().restore().unwrap();
        assert_eq!(restored, root);
        assert!(text.contains("\"default_map\""));
    }

    #[test]
    fn test_factories_are_not_persistable() {
        let desc = StructType::anonymous()
            .field("n", TypeDescriptor::int().factory(Factory::from_fn(|| 1i64)))
            .into_descriptor();
        let err = SchemaSnapshot::capture(&desc).unwrap_err();
        assert!(matches!(err, Error::ConversionError { .. }));
        assert_eq!(err.path().to_string(), "n");
    }

    #[test]
    fn test_forward_references_are_rejected() {
        let snapshot = SchemaSnapshot {
            nodes: vec![SnapshotNode {
                kind: NodeKind::List,
                params: vec![0],
                fields: Vec::new(),
                members: Vec::new(),
                name: None,
                default: SnapshotDefault::Required,
            }],
            root: 0,
        };
        assert!(snapshot.restore().is_err());
    }
}
