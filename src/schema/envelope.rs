// Persistence envelope for structure values
//
// Named structures persist as (name, values) and are resolved through a
// registry on load. Anonymous structures have nothing to look up, so they
// carry a schema snapshot alongside their values.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::json;
use crate::codec::types::Target;
use crate::internal::error::{Error, Result};
use crate::schema::registry::SchemaRegistry;
use crate::schema::snapshot::SchemaSnapshot;
use crate::schema::types::{Identity, StructType};
use crate::schema::value::StructValue;

/// A persisted structure value. Values are always JSON-safe encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "identity", rename_all = "snake_case")]
pub enum Envelope {
    Named { name: String, value: serde_json::Value },
    Anonymous { schema: SchemaSnapshot, value: serde_json::Value },
}

impl Envelope {
    /// Packs a structure value.
    pub fn seal(st: &StructType, value: &StructValue) -> Result<Self> {
        let encoded = json::to_json(&st.to_target(value, Target::JsonSafe)?)?;
        match st.identity() {
            Identity::Named(name) => Ok(Envelope::Named { name: name.clone(), value: encoded }),
            Identity::Anonymous => {
                let schema = SchemaSnapshot::capture(&st.clone().into_descriptor())?;
                Ok(Envelope::Anonymous { schema, value: encoded })
            }
        }
    }

    /// Unpacks the structure type and its value.
    ///
    /// Named envelopes are resolved through `registry`.
    pub fn open(&self, registry: &SchemaRegistry) -> Result<(Arc<StructType>, StructValue)> {
        let (st, raw) = match self {
            Envelope::Named { name, value } => {
                debug!(structure = %name, "opening named envelope");
                (registry.resolve(name)?, value)
            }
            Envelope::Anonymous { schema, value } => {
                let descriptor = schema.restore()?;
                let st = descriptor
                    .as_struct()
                    .cloned()
                    .ok_or_else(|| Error::conversion("Envelope schema does not describe a structure"))?;
                (st, value)
            }
        };
        let value = st.parse(&json::from_json(raw)?, Target::JsonSafe)?;
        Ok((st, value))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| Error::conversion(err.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| Error::conversion(format!("Invalid envelope: {err}")))
    }
}
