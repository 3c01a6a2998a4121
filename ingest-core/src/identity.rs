//! Type-safe entity identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

/// Trait for type-safe entity IDs, preventing accidental mixups between
/// e.g. a tenant id and an artifact id at compile time.
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const ENTITY_NAME: &'static str;

    fn new(uuid: Uuid) -> Self;
    fn as_uuid(&self) -> Uuid;

    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    fn new_v4() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Error produced when an entity id fails to parse from a string.
#[derive(Debug, Clone)]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse {} id from '{}': {}",
            self.entity_name, self.input, self.source
        )
    }
}

impl std::error::Error for EntityIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self::new)
                    .map_err(|e| EntityIdParseError {
                        entity_name: Self::ENTITY_NAME,
                        input: s.to_string(),
                        source: e,
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

define_entity_id!(TenantId, "tenant", "Identifier for a tenant (workspace-owning customer).");
define_entity_id!(ArtifactId, "artifact", "Identifier for a stored raw artifact.");
define_entity_id!(DocumentId, "document", "Identifier for a transformed document.");
define_entity_id!(ChunkId, "chunk", "Identifier for a document chunk.");
define_entity_id!(BackfillId, "backfill", "Identifier for a backfill run.");
define_entity_id!(
    ExclusionRuleId,
    "exclusion_rule",
    "Identifier for an exclusion rule."
);

/// Deterministic UUIDv5 namespace used for chunk ids, matching the namespace
/// the upstream connectors already used for URL-derived UUIDs.
pub const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x10, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

/// Compute a deterministic chunk id from a document id and a unique key
/// within that document (e.g. `"{document_id}:{chunk_index}"`).
pub fn deterministic_chunk_id(document_id: DocumentId, unique_key: &str) -> ChunkId {
    let name = format!("{document_id}:{unique_key}");
    ChunkId::new(Uuid::new_v5(&CHUNK_ID_NAMESPACE, name.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_do_not_mix_at_runtime() {
        let tenant = TenantId::now_v7();
        let artifact = ArtifactId::now_v7();
        assert_ne!(tenant.as_uuid(), artifact.as_uuid());
    }

    #[test]
    fn entity_id_roundtrips_through_string() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: TenantId = uuid_str.parse().expect("valid uuid parses");
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn entity_id_roundtrips_through_json() {
        let id = ArtifactId::now_v7();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"'));
        let back: ArtifactId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn chunk_id_is_deterministic() {
        let doc = DocumentId::new(Uuid::nil());
        let a = deterministic_chunk_id(doc, "chunk:0");
        let b = deterministic_chunk_id(doc, "chunk:0");
        let c = deterministic_chunk_id(doc, "chunk:1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
