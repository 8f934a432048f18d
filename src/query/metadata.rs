//! Managed-type metadata consumed by resolution and validation.
//!
//! The core never owns ORM configuration; it only asks a [`ManagedTypeProvider`]
//! for entities, attributes and enum types. [`InMemoryMetadata`] is a simple
//! provider for tests, tools and the CLI, loadable from JSON or TOML through
//! [`MetadataFile`].

use rustc_hash::FxHashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{JpqlError, Result};

/// How an attribute is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    /// Identifier attribute.
    Id,
    /// Version attribute.
    Version,
    /// Basic (single column) attribute.
    Basic,
    /// Embedded value object.
    Embedded,
    /// Single-valued relationship.
    OneToOne,
    /// Single-valued relationship.
    ManyToOne,
    /// Collection-valued relationship.
    OneToMany,
    /// Collection-valued relationship.
    ManyToMany,
    /// Collection of basic or embeddable values.
    ElementCollection,
}

impl MappingKind {
    /// Whether the mapping holds a collection.
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            MappingKind::OneToMany | MappingKind::ManyToMany | MappingKind::ElementCollection
        )
    }

    /// Whether the mapping navigates to another managed type.
    pub fn is_relationship(self) -> bool {
        matches!(
            self,
            MappingKind::OneToOne
                | MappingKind::ManyToOne
                | MappingKind::OneToMany
                | MappingKind::ManyToMany
                | MappingKind::Embedded
        )
    }
}

/// Attribute mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Attribute name.
    pub name: String,
    /// Mapping kind.
    pub kind: MappingKind,
    /// Declared Java type of the attribute.
    pub attribute_type: String,
    /// Element or target type for relationships and collections.
    pub reference_type: Option<String>,
    /// Class that declares the attribute.
    pub declaring_type: String,
}

impl Mapping {
    /// Whether the mapping holds a collection.
    pub fn is_collection(&self) -> bool {
        self.kind.is_collection()
    }

    /// Type reached by navigating through the attribute.
    pub fn target_type(&self) -> &str {
        self.reference_type
            .as_deref()
            .unwrap_or(&self.attribute_type)
    }
}

/// Kind of a managed or known type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// `@Entity`.
    Entity,
    /// `@Embeddable`.
    Embeddable,
    /// `@MappedSuperclass`.
    MappedSuperclass,
    /// Java enum.
    Enum,
    /// Any other known class (e.g. constructor result classes).
    Class,
}

/// A type known to the metadata provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedType {
    name: String,
    entity_name: Option<String>,
    kind: TypeKind,
    superclass: Option<String>,
    attributes: Vec<Mapping>,
    constants: Vec<String>,
}

impl ManagedType {
    fn bare(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            entity_name: None,
            kind,
            superclass: None,
            attributes: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Entity with its fully-qualified class name and entity name.
    pub fn entity(class_name: impl Into<String>, entity_name: impl Into<String>) -> Self {
        let mut ty = Self::bare(class_name, TypeKind::Entity);
        ty.entity_name = Some(entity_name.into());
        ty
    }

    /// Embeddable class.
    pub fn embeddable(class_name: impl Into<String>) -> Self {
        Self::bare(class_name, TypeKind::Embeddable)
    }

    /// Mapped superclass.
    pub fn mapped_superclass(class_name: impl Into<String>) -> Self {
        Self::bare(class_name, TypeKind::MappedSuperclass)
    }

    /// Plain class.
    pub fn class(class_name: impl Into<String>) -> Self {
        Self::bare(class_name, TypeKind::Class)
    }

    /// Enum type with its constants.
    pub fn enumeration<I, S>(class_name: impl Into<String>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ty = Self::bare(class_name, TypeKind::Enum);
        ty.constants = constants.into_iter().map(Into::into).collect();
        ty
    }

    /// Sets the superclass.
    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Adds a basic attribute.
    pub fn with_basic(self, name: impl Into<String>, attribute_type: impl Into<String>) -> Self {
        self.with_attribute(name, MappingKind::Basic, attribute_type, None::<String>)
    }

    /// Adds a relationship; collection kinds get `java.util.Collection` as declared type.
    pub fn with_relationship(
        self,
        name: impl Into<String>,
        kind: MappingKind,
        target: impl Into<String>,
    ) -> Self {
        let target = target.into();
        if kind.is_collection() {
            self.with_attribute(name, kind, "java.util.Collection", Some(target))
        } else {
            self.with_attribute(name, kind, target, None::<String>)
        }
    }

    /// Adds an attribute with full control over its mapping.
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        kind: MappingKind,
        attribute_type: impl Into<String>,
        reference_type: Option<impl Into<String>>,
    ) -> Self {
        self.attributes.push(Mapping {
            name: name.into(),
            kind,
            attribute_type: attribute_type.into(),
            reference_type: reference_type.map(Into::into),
            declaring_type: self.name.clone(),
        });
        self
    }

    /// Fully-qualified class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity name, for entities.
    pub fn entity_name(&self) -> Option<&str> {
        self.entity_name.as_deref()
    }

    /// Type kind.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Superclass name.
    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    /// Attributes declared directly on this type.
    pub fn attributes(&self) -> &[Mapping] {
        &self.attributes
    }

    /// Enum constants.
    pub fn constants(&self) -> &[String] {
        &self.constants
    }

    /// Attribute declared directly on this type.
    pub fn attribute(&self, name: &str) -> Option<&Mapping> {
        self.attributes.iter().find(|m| m.name == name)
    }

    /// Whether the type is an entity.
    pub fn is_entity(&self) -> bool {
        self.kind == TypeKind::Entity
    }

    /// Whether the type is an enum.
    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }
}

/// Resolves type and attribute names for the query core.
pub trait ManagedTypeProvider {
    /// Entity by entity (abstract schema) name.
    fn entity(&self, name: &str) -> Option<&ManagedType>;
    /// Any known type by fully-qualified class name.
    fn managed_type(&self, type_name: &str) -> Option<&ManagedType>;
    /// Whether a class with this name exists.
    fn type_exists(&self, type_name: &str) -> bool {
        self.managed_type(type_name).is_some()
    }
    /// Enum type for a fully-qualified constant path such as
    /// `com.acme.Status.ACTIVE`; `None` unless the constant is declared.
    fn enum_type(&self, path: &str) -> Option<&ManagedType> {
        let (type_name, constant) = path.rsplit_once('.')?;
        self.managed_type(type_name)
            .filter(|ty| ty.is_enum() && ty.constants().iter().any(|c| c == constant))
    }
    /// All entities, sorted by entity name.
    fn entities(&self) -> Vec<&ManagedType>;
    /// Attribute lookup that walks the superclass chain.
    fn attribute(&self, type_name: &str, name: &str) -> Option<&Mapping> {
        let mut current = self.managed_type(type_name);
        let mut hops = 0;
        while let Some(ty) = current {
            if let Some(mapping) = ty.attribute(name) {
                return Some(mapping);
            }
            hops += 1;
            if hops > 64 {
                return None;
            }
            current = ty.superclass().and_then(|s| self.managed_type(s));
        }
        None
    }
    /// Attribute names visible on a type, including inherited ones.
    fn attribute_names(&self, type_name: &str) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = self.managed_type(type_name);
        let mut hops = 0;
        while let Some(ty) = current {
            names.extend(ty.attributes().iter().map(|m| m.name.as_str()));
            hops += 1;
            if hops > 64 {
                break;
            }
            current = ty.superclass().and_then(|s| self.managed_type(s));
        }
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Simple in-memory metadata provider used for tests, tools and the CLI.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadata {
    types: FxHashMap<String, ManagedType>,
    entities: FxHashMap<String, String>,
}

impl InMemoryMetadata {
    /// Creates a new empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type.
    pub fn with_type(mut self, ty: ManagedType) -> Self {
        self.insert(ty);
        self
    }

    /// Registers a type in place.
    pub fn insert(&mut self, ty: ManagedType) {
        if let Some(entity) = ty.entity_name() {
            self.entities.insert(entity.to_string(), ty.name().to_string());
        }
        self.types.insert(ty.name().to_string(), ty);
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Loads a metadata file, picking the format from the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let file = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => MetadataFile::from_toml(&text)?,
            Some("json") => MetadataFile::from_json(&text)?,
            other => {
                return Err(JpqlError::Metadata(format!(
                    "unsupported metadata format {:?} for {}",
                    other.unwrap_or(""),
                    path.display()
                )))
            }
        };
        let metadata = file.into_metadata()?;
        debug!(
            path = %path.display(),
            types = metadata.len(),
            "metadata.load.completed"
        );
        Ok(metadata)
    }
}

impl ManagedTypeProvider for InMemoryMetadata {
    fn entity(&self, name: &str) -> Option<&ManagedType> {
        self.entities.get(name).and_then(|ty| self.types.get(ty))
    }

    fn managed_type(&self, type_name: &str) -> Option<&ManagedType> {
        self.types.get(type_name)
    }

    fn entities(&self) -> Vec<&ManagedType> {
        let mut entities: Vec<&ManagedType> =
            self.types.values().filter(|ty| ty.is_entity()).collect();
        entities.sort_by(|a, b| a.entity_name().cmp(&b.entity_name()));
        entities
    }
}

/// Serialized form of [`InMemoryMetadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFile {
    /// Types.
    #[serde(default)]
    pub types: Vec<TypeEntry>,
}

/// One type in a [`MetadataFile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEntry {
    /// Fully-qualified class name.
    pub name: String,
    /// Type kind.
    pub kind: TypeKind,
    /// Entity name; defaults to the simple class name for entities.
    #[serde(default)]
    pub entity: Option<String>,
    /// Superclass name.
    #[serde(default)]
    pub superclass: Option<String>,
    /// Attributes.
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
    /// Enum constants.
    #[serde(default)]
    pub constants: Vec<String>,
}

/// One attribute in a [`TypeEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEntry {
    /// Attribute name.
    pub name: String,
    /// Mapping kind.
    #[serde(default = "default_mapping_kind")]
    pub kind: MappingKind,
    /// Declared Java type.
    #[serde(rename = "type")]
    pub attribute_type: String,
    /// Target type for relationships and collections.
    #[serde(default)]
    pub target: Option<String>,
}

fn default_mapping_kind() -> MappingKind {
    MappingKind::Basic
}

impl MetadataFile {
    /// Parses JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parses TOML.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Builds the provider, rejecting duplicate class or entity names.
    pub fn into_metadata(self) -> Result<InMemoryMetadata> {
        let mut metadata = InMemoryMetadata::new();
        for entry in self.types {
            if metadata.managed_type(&entry.name).is_some() {
                return Err(JpqlError::Metadata(format!(
                    "type '{}' declared twice",
                    entry.name
                )));
            }
            let mut ty = match entry.kind {
                TypeKind::Entity => {
                    let entity = entry
                        .entity
                        .clone()
                        .unwrap_or_else(|| simple_name(&entry.name).to_string());
                    if metadata.entity(&entity).is_some() {
                        return Err(JpqlError::Metadata(format!(
                            "entity name '{entity}' declared twice"
                        )));
                    }
                    ManagedType::entity(entry.name, entity)
                }
                TypeKind::Embeddable => ManagedType::embeddable(entry.name),
                TypeKind::MappedSuperclass => ManagedType::mapped_superclass(entry.name),
                TypeKind::Class => ManagedType::class(entry.name),
                TypeKind::Enum => ManagedType::enumeration(entry.name, entry.constants),
            };
            if let Some(superclass) = entry.superclass {
                ty = ty.with_superclass(superclass);
            }
            for attr in entry.attributes {
                ty = ty.with_attribute(attr.name, attr.kind, attr.attribute_type, attr.target);
            }
            metadata.insert(ty);
        }
        Ok(metadata)
    }
}

/// Last dotted segment of a class name.
pub fn simple_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InMemoryMetadata {
        InMemoryMetadata::new()
            .with_type(ManagedType::mapped_superclass("com.acme.Person").with_basic("name", "String"))
            .with_type(
                ManagedType::entity("com.acme.Employee", "Employee")
                    .with_superclass("com.acme.Person")
                    .with_basic("salary", "java.math.BigDecimal")
                    .with_relationship("phones", MappingKind::OneToMany, "com.acme.Phone"),
            )
            .with_type(ManagedType::entity("com.acme.Phone", "Phone").with_basic("number", "String"))
            .with_type(ManagedType::enumeration("com.acme.Status", ["ACTIVE", "RETIRED"]))
    }

    #[test]
    fn attributes_walk_superclass_chain() {
        let metadata = sample();
        let name = metadata
            .attribute("com.acme.Employee", "name")
            .expect("inherited attribute");
        assert_eq!(name.declaring_type, "com.acme.Person");
        let phones = metadata
            .attribute("com.acme.Employee", "phones")
            .expect("phones");
        assert!(phones.is_collection());
        assert_eq!(phones.target_type(), "com.acme.Phone");
        assert_eq!(
            metadata.attribute_names("com.acme.Employee"),
            vec!["name", "phones", "salary"]
        );
    }

    #[test]
    fn enum_type_requires_enum_prefix() {
        let metadata = sample();
        assert!(metadata.enum_type("com.acme.Status.ACTIVE").is_some());
        assert!(metadata.enum_type("com.acme.Status.BOGUS").is_none());
        assert!(metadata.enum_type("com.acme.Employee.salary").is_none());
        assert!(metadata.enum_type("ACTIVE").is_none());
    }

    #[test]
    fn loads_json_and_toml() {
        let json = r#"{"types":[{"name":"com.acme.Dept","kind":"entity",
            "attributes":[{"name":"title","type":"String"}]}]}"#;
        let metadata = MetadataFile::from_json(json)
            .and_then(MetadataFile::into_metadata)
            .expect("json");
        assert_eq!(
            metadata.entity("Dept").map(ManagedType::name),
            Some("com.acme.Dept")
        );

        let toml_text = r#"
            [[types]]
            name = "com.acme.Level"
            kind = "enum"
            constants = ["LOW", "HIGH"]
        "#;
        let metadata = MetadataFile::from_toml(toml_text)
            .and_then(MetadataFile::into_metadata)
            .expect("toml");
        assert!(metadata.enum_type("com.acme.Level.LOW").is_some());
    }

    #[test]
    fn duplicate_entities_are_rejected() {
        let file = MetadataFile {
            types: vec![
                TypeEntry {
                    name: "a.Employee".into(),
                    kind: TypeKind::Entity,
                    entity: None,
                    superclass: None,
                    attributes: Vec::new(),
                    constants: Vec::new(),
                },
                TypeEntry {
                    name: "b.Employee".into(),
                    kind: TypeKind::Entity,
                    entity: None,
                    superclass: None,
                    attributes: Vec::new(),
                    constants: Vec::new(),
                },
            ],
        };
        assert!(matches!(
            file.into_metadata(),
            Err(JpqlError::Metadata(_))
        ));
    }
}
