use super::{AccessorFamily, KeySpec, Schema, ValueType};
use crate::error::{ParseError, ResolveError};
use crate::path::{IndexKind, ParsedPath, PathSegment};
use ahash::AHashMap;

/// A checked, read-only view of a [`Schema`] used during generation.
#[derive(Debug, Clone)]
pub struct SchemaContext {
    package: String,
    root: String,
    types: Vec<TypeInfo>,
    index: AHashMap<String, usize>,
}

/// One record type with its resolved fields, in declaration order.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub id: Option<u32>,
    pub fields: Vec<FieldInfo>,
    /// The field flagged `key: true`, if any.
    pub identity: Option<String>,
}

impl TypeInfo {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: ValueType,
    pub optional: bool,
    /// For arrays of records: the element field used for key lookups.
    pub key_field: Option<String>,
    pub accessors: AccessorFamily,
}

/// One path segment after resolution against the schema.
#[derive(Debug, Clone)]
pub struct ResolvedSegment<'a> {
    pub segment: PathSegment,
    /// The record type that owns the field.
    pub owner: &'a str,
    pub field: &'a FieldInfo,
    /// The type produced by this segment after its index is applied.
    pub value_type: ValueType,
}

impl SchemaContext {
    /// Checks a schema and builds the lookup tables.
    ///
    /// Every field type must parse and every record it names must be
    /// declared. Array key fields must exist on the element type.
    pub fn new(schema: Schema) -> Result<Self, ParseError> {
        let mut index = AHashMap::new();
        for (i, ty) in schema.types.iter().enumerate() {
            if index.insert(ty.name.clone(), i).is_some() {
                return Err(ParseError::Schema(format!(
                    "type '{}' is declared more than once",
                    ty.name
                )));
            }
        }

        // Parse all field types first so identities are known before keys
        // of array fields are derived from them.
        let mut parsed: Vec<Vec<ValueType>> = Vec::with_capacity(schema.types.len());
        let mut identities: Vec<Option<String>> = Vec::with_capacity(schema.types.len());
        for ty in &schema.types {
            let mut field_types = Vec::with_capacity(ty.fields.len());
            let mut identity = None;
            for field in &ty.fields {
                let value_type =
                    ValueType::parse(&field.type_name).ok_or_else(|| ParseError::FieldType {
                        type_name: ty.name.clone(),
                        spelling: field.type_name.clone(),
                    })?;
                if let Some(name) = innermost_record(&value_type) {
                    if !index.contains_key(name) {
                        return Err(ParseError::FieldType {
                            type_name: ty.name.clone(),
                            spelling: field.type_name.clone(),
                        });
                    }
                }
                if field.key == Some(KeySpec::Flag(true)) {
                    identity = Some(field.name.clone());
                }
                field_types.push(value_type);
            }
            parsed.push(field_types);
            identities.push(identity);
        }

        let mut types = Vec::with_capacity(schema.types.len());
        for (i, (ty, field_types)) in schema.types.iter().zip(parsed).enumerate() {
            let mut fields = Vec::with_capacity(ty.fields.len());
            for (field, value_type) in ty.fields.iter().zip(field_types) {
                let key_field = match (&value_type, &field.key) {
                    (ValueType::Array(elem), Some(KeySpec::Field(key))) => {
                        let elem_name = elem.record_name().ok_or_else(|| {
                            ParseError::Schema(format!(
                                "field '{}.{}' has a key but its elements are not records",
                                ty.name, field.name
                            ))
                        })?;
                        let elem_def = &schema.types[index[elem_name]];
                        if !elem_def.fields.iter().any(|f| &f.name == key) {
                            return Err(ParseError::Schema(format!(
                                "key field '{}' of '{}.{}' does not exist on '{}'",
                                key, ty.name, field.name, elem_name
                            )));
                        }
                        Some(key.clone())
                    }
                    (ValueType::Array(elem), _) => elem
                        .record_name()
                        .and_then(|name| identities[index[name]].clone()),
                    _ => None,
                };
                let accessors =
                    AccessorFamily::for_field(&field.name, &value_type, key_field.as_deref());
                fields.push(FieldInfo {
                    name: field.name.clone(),
                    ty: value_type,
                    optional: field.optional,
                    key_field,
                    accessors,
                });
            }
            types.push(TypeInfo {
                name: ty.name.clone(),
                id: ty.id,
                fields,
                identity: identities[i].clone(),
            });
        }

        let root = match schema.root {
            Some(root) => {
                if !index.contains_key(&root) {
                    return Err(ParseError::Schema(format!(
                        "root type '{}' is not declared",
                        root
                    )));
                }
                root
            }
            None => types
                .first()
                .map(|t| t.name.clone())
                .ok_or_else(|| ParseError::Schema("schema declares no types".to_string()))?,
        };

        tracing::debug!(types = types.len(), root = %root, "schema loaded");

        Ok(Self {
            package: schema.package,
            root,
            types,
            index,
        })
    }

    /// Parses and checks a schema from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        Self::new(Schema::from_json(json)?)
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// The type every state path starts from.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// All types in declaration order.
    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    pub fn type_info(&self, name: &str) -> Result<&TypeInfo, ResolveError> {
        self.index
            .get(name)
            .map(|&i| &self.types[i])
            .ok_or_else(|| ResolveError::UnknownType(name.to_string()))
    }

    pub fn field(&self, type_name: &str, field: &str) -> Result<&FieldInfo, ResolveError> {
        self.type_info(type_name)?
            .field(field)
            .ok_or_else(|| ResolveError::UnknownField {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })
    }

    /// Resolves every segment of `path`, starting from `root_type`.
    pub fn resolve(
        &self,
        root_type: &str,
        path: &ParsedPath,
    ) -> Result<Vec<ResolvedSegment<'_>>, ResolveError> {
        let mut resolved = Vec::with_capacity(path.len());
        let mut current = self.type_info(root_type)?;

        for (i, segment) in path.segments.iter().enumerate() {
            let field = current
                .field(&segment.field)
                .ok_or_else(|| ResolveError::UnknownField {
                    type_name: current.name.clone(),
                    field: segment.field.clone(),
                })?;
            let value_type = self.indexed_type(current, field, &segment.index)?;

            let owner = current.name.as_str();
            if i + 1 < path.len() {
                let next = value_type.record_name().ok_or_else(|| {
                    let next_field = &path.segments[i + 1].field;
                    ResolveError::UnknownField {
                        type_name: value_type.to_string(),
                        field: next_field.clone(),
                    }
                })?;
                current = self.type_info(next)?;
            }

            resolved.push(ResolvedSegment {
                segment: segment.clone(),
                owner,
                field,
                value_type,
            });
        }

        Ok(resolved)
    }

    /// Resolves `path` from the schema's root type.
    pub fn resolve_from_root(
        &self,
        path: &ParsedPath,
    ) -> Result<Vec<ResolvedSegment<'_>>, ResolveError> {
        self.resolve(&self.root, path)
    }

    fn indexed_type(
        &self,
        owner: &TypeInfo,
        field: &FieldInfo,
        index: &IndexKind,
    ) -> Result<ValueType, ResolveError> {
        let invalid = |index: &IndexKind| ResolveError::InvalidIndex {
            type_name: owner.name.clone(),
            field: field.name.clone(),
            index: PathSegment {
                field: String::new(),
                index: index.clone(),
            }
            .to_string(),
        };

        match (index, &field.ty) {
            (IndexKind::None, ty) => Ok(ty.clone()),
            (IndexKind::Literal(_) | IndexKind::Variable(_), ValueType::Array(elem))
            | (IndexKind::Literal(_) | IndexKind::Variable(_), ValueType::Map(elem)) => {
                Ok((**elem).clone())
            }
            (IndexKind::KeyLookup { key_field, .. }, ValueType::Array(elem)) => {
                match &field.key_field {
                    Some(key) if key == key_field => Ok((**elem).clone()),
                    _ => Err(ResolveError::MissingKeyField {
                        type_name: owner.name.clone(),
                        field: field.name.clone(),
                        key_field: key_field.clone(),
                    }),
                }
            }
            (other, _) => Err(invalid(other)),
        }
    }
}

fn innermost_record(ty: &ValueType) -> Option<&str> {
    match ty {
        ValueType::Record(name) => Some(name),
        ValueType::Array(inner) | ValueType::Map(inner) => innermost_record(inner),
        _ => None,
    }
}
