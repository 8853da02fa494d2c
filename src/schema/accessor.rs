use super::ValueType;
use crate::naming::to_snake_case;

/// The accessor names generated for one schema field.
///
/// Names are canonical snake case. Printers adapt the casing to their target
/// (the JavaScript printer camel-cases them and drops the `_mut` suffix, as it
/// has no separate mutable borrow).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessorFamily {
    Scalar {
        getter: String,
        setter: String,
    },
    Array {
        getter: String,
        getter_mut: String,
        setter: String,
        append: String,
        remove_at: String,
        update_at: String,
        at: String,
        at_mut: String,
        length: String,
        keyed: Option<KeyedAccessors>,
    },
    Map {
        getter: String,
        getter_mut: String,
        setter: String,
        set_key: String,
        delete_key: String,
        get_by_key: String,
        get_by_key_mut: String,
    },
}

/// Extra accessors for arrays whose elements carry an identity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedAccessors {
    pub key_field: String,
    pub find: String,
    pub find_mut: String,
    pub update: String,
}

impl AccessorFamily {
    /// Derives the accessor family for a field of type `ty`.
    pub fn for_field(field: &str, ty: &ValueType, key_field: Option<&str>) -> Self {
        let f = to_snake_case(field);
        match ty {
            ValueType::Array(_) => AccessorFamily::Array {
                getter: format!("get_{f}"),
                getter_mut: format!("get_{f}_mut"),
                setter: format!("set_{f}"),
                append: format!("append_{f}"),
                remove_at: format!("remove_{f}_at"),
                update_at: format!("update_{f}_at"),
                at: format!("{f}_at"),
                at_mut: format!("{f}_at_mut"),
                length: format!("{f}_len"),
                keyed: key_field.map(|key| {
                    let k = to_snake_case(key);
                    KeyedAccessors {
                        key_field: key.to_string(),
                        find: format!("find_{f}_by_{k}"),
                        find_mut: format!("find_{f}_by_{k}_mut"),
                        update: format!("update_{f}_by_{k}"),
                    }
                }),
            },
            ValueType::Map(_) => AccessorFamily::Map {
                getter: format!("get_{f}"),
                getter_mut: format!("get_{f}_mut"),
                setter: format!("set_{f}"),
                set_key: format!("set_{f}_key"),
                delete_key: format!("delete_{f}_key"),
                get_by_key: format!("get_{f}_by_key"),
                get_by_key_mut: format!("get_{f}_by_key_mut"),
            },
            _ => AccessorFamily::Scalar {
                getter: format!("get_{f}"),
                setter: format!("set_{f}"),
            },
        }
    }

    pub fn getter(&self) -> &str {
        match self {
            AccessorFamily::Scalar { getter, .. }
            | AccessorFamily::Array { getter, .. }
            | AccessorFamily::Map { getter, .. } => getter,
        }
    }

    /// The getter used when navigating towards a write.
    ///
    /// Scalars have no mutable getter; a record-typed scalar field is
    /// navigated through its plain getter's `_mut` form.
    pub fn getter_mut(&self) -> String {
        match self {
            AccessorFamily::Scalar { getter, .. } => format!("{getter}_mut"),
            AccessorFamily::Array { getter_mut, .. } | AccessorFamily::Map { getter_mut, .. } => {
                getter_mut.clone()
            }
        }
    }

    pub fn setter(&self) -> &str {
        match self {
            AccessorFamily::Scalar { setter, .. }
            | AccessorFamily::Array { setter, .. }
            | AccessorFamily::Map { setter, .. } => setter,
        }
    }

    /// Every accessor name of the family, in a stable order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            AccessorFamily::Scalar { getter, setter } => vec![getter.as_str(), setter.as_str()],
            AccessorFamily::Array {
                getter,
                getter_mut,
                setter,
                append,
                remove_at,
                update_at,
                at,
                at_mut,
                length,
                keyed,
            } => {
                let mut names: Vec<&str> = [
                    getter, getter_mut, setter, append, remove_at, update_at, at, at_mut, length,
                ]
                .into_iter()
                .map(String::as_str)
                .collect();
                if let Some(k) = keyed {
                    names.extend([k.find.as_str(), k.find_mut.as_str(), k.update.as_str()]);
                }
                names
            }
            AccessorFamily::Map {
                getter,
                getter_mut,
                setter,
                set_key,
                delete_key,
                get_by_key,
                get_by_key_mut,
            } => [
                getter,
                getter_mut,
                setter,
                set_key,
                delete_key,
                get_by_key,
                get_by_key_mut,
            ]
            .into_iter()
            .map(String::as_str)
            .collect(),
        }
    }
}
