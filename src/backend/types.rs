//! State types emitted from the schema, for both targets.

use super::writer::SourceWriter;
use crate::naming::{ident, to_camel_case, to_pascal_case};
use crate::schema::{AccessorFamily, FieldInfo, KeyedAccessors, SchemaContext, TypeInfo, ValueType};

/// The owned Rust spelling of `ty`.
pub(super) fn rust_type(ty: &ValueType) -> String {
    match ty {
        ValueType::String => "String".to_string(),
        ValueType::Int => "i64".to_string(),
        ValueType::Float => "f64".to_string(),
        ValueType::Bool => "bool".to_string(),
        ValueType::Record(name) => to_pascal_case(name),
        ValueType::Array(inner) => format!("Vec<{}>", rust_type(inner)),
        ValueType::Map(inner) => format!("BTreeMap<String, {}>", rust_type(inner)),
        ValueType::Any => "Value".to_string(),
    }
}

/// The Rust spelling of a parameter of type `ty`; non-`Copy` values are borrowed.
pub(super) fn rust_param_type(ty: &ValueType) -> String {
    match ty {
        ValueType::String => "&str".to_string(),
        ValueType::Array(inner) => format!("&[{}]", rust_type(inner)),
        ty if is_copy(ty) => rust_type(ty),
        ty => format!("&{}", rust_type(ty)),
    }
}

pub(super) fn is_copy(ty: &ValueType) -> bool {
    matches!(ty, ValueType::Int | ValueType::Float | ValueType::Bool)
}

/// Accessor names are snake case; JavaScript camel-cases them and has no
/// separate mutable form.
pub(super) fn js_accessor(name: &str) -> String {
    to_camel_case(name.strip_suffix("_mut").unwrap_or(name))
}

/// A property access on `receiver` that stays valid for any field name.
pub(super) fn js_property(receiver: &str, name: &str) -> String {
    let plain = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if plain {
        format!("{receiver}.{name}")
    } else {
        format!("{receiver}[{}]", serde_json::Value::from(name))
    }
}

pub(super) fn rust_types(schema: &SchemaContext, out: &mut SourceWriter) {
    for info in schema.types() {
        RustType { schema, info }.write(out);
        out.blank();
    }
}

pub(super) fn javascript_types(schema: &SchemaContext, out: &mut SourceWriter) {
    for info in schema.types() {
        JsType { info }.write(out);
        out.blank();
    }
}

/// The type of `record.field`, or `Any` when either is unknown.
fn key_type(schema: &SchemaContext, element: &ValueType, key_field: &str) -> ValueType {
    element
        .record_name()
        .and_then(|record| schema.field(record, key_field).ok())
        .map(|f| f.ty.clone())
        .unwrap_or_default()
}

struct RustType<'s> {
    schema: &'s SchemaContext,
    info: &'s TypeInfo,
}

impl RustType<'_> {
    fn write(&self, out: &mut SourceWriter) {
        let name = to_pascal_case(&self.info.name);
        match self.info.id {
            Some(id) => out.line(format!(
                "/// Schema type `{}` (id {}).",
                self.info.name, id
            )),
            None => out.line(format!("/// Schema type `{}`.", self.info.name)),
        }
        out.line("#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]");
        out.open(format!("pub struct {name} {{"));
        for field in &self.info.fields {
            let member = ident(&field.name);
            if member != field.name {
                out.line(format!("#[serde(rename = {:?})]", field.name));
            }
            if field.optional {
                out.line("#[serde(default)]");
            }
            out.line(format!("pub {}: {},", member, rust_type(&field.ty)));
        }
        out.close("}");
        out.blank();

        out.open(format!("impl {name} {{"));
        let mut first = true;
        for field in &self.info.fields {
            if !first {
                out.blank();
            }
            first = false;
            self.accessors(out, field);
        }
        out.close("}");
    }

    fn accessors(&self, out: &mut SourceWriter, field: &FieldInfo) {
        let member = ident(&field.name);
        let ty = rust_type(&field.ty);
        let label = &field.name;

        match &field.accessors {
            AccessorFamily::Scalar { getter, setter } => {
                match &field.ty {
                    ValueType::String => {
                        out.line(format!(
                            "pub fn {getter}(&self) -> &str {{ &self.{member} }}"
                        ));
                        out.line(format!(
                            "pub fn {setter}(&mut self, value: impl Into<String>) {{ self.{member} = value.into(); }}"
                        ));
                        return;
                    }
                    t if is_copy(t) => {
                        out.line(format!("pub fn {getter}(&self) -> {ty} {{ self.{member} }}"));
                    }
                    _ => {
                        out.line(format!("pub fn {getter}(&self) -> &{ty} {{ &self.{member} }}"));
                        out.line(format!(
                            "pub fn {getter}_mut(&mut self) -> &mut {ty} {{ &mut self.{member} }}"
                        ));
                    }
                }
                out.line(format!(
                    "pub fn {setter}(&mut self, value: {ty}) {{ self.{member} = value; }}"
                ));
            }
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
                let elem_type = field.ty.element().cloned().unwrap_or_default();
                let elem = rust_type(&elem_type);
                let out_of_range = format!(
                    "HandlerError::IndexOutOfRange {{ field: {label:?}, index }}"
                );
                out.line(format!("pub fn {getter}(&self) -> &[{elem}] {{ &self.{member} }}"));
                out.line(format!(
                    "pub fn {getter_mut}(&mut self) -> &mut {ty} {{ &mut self.{member} }}"
                ));
                out.line(format!(
                    "pub fn {setter}(&mut self, value: {ty}) {{ self.{member} = value; }}"
                ));
                out.line(format!(
                    "pub fn {append}(&mut self, value: {elem}) {{ self.{member}.push(value); }}"
                ));
                out.verbatim(&format!(
                    "
                    pub fn {remove_at}(&mut self, index: usize) -> Result<{elem}, HandlerError> {{
                        if index < self.{member}.len() {{
                            Ok(self.{member}.remove(index))
                        }} else {{
                            Err({out_of_range})
                        }}
                    }}
                    pub fn {update_at}(&mut self, index: usize, value: {elem}) -> Result<(), HandlerError> {{
                        let slot = self.{member}.get_mut(index).ok_or({out_of_range})?;
                        *slot = value;
                        Ok(())
                    }}
                    pub fn {at}(&self, index: usize) -> Result<&{elem}, HandlerError> {{
                        self.{member}.get(index).ok_or({out_of_range})
                    }}
                    pub fn {at_mut}(&mut self, index: usize) -> Result<&mut {elem}, HandlerError> {{
                        self.{member}.get_mut(index).ok_or({out_of_range})
                    }}
                    pub fn {length}(&self) -> i64 {{ self.{member}.len() as i64 }}
                    "
                ));
                if let Some(keyed) = keyed {
                    self.keyed(out, field, &elem_type, keyed);
                }
            }
            AccessorFamily::Map {
                getter,
                getter_mut,
                setter,
                set_key,
                delete_key,
                get_by_key,
                get_by_key_mut,
            } => {
                let value = rust_type(field.ty.element().unwrap_or(&ValueType::Any));
                let not_found = format!(
                    "HandlerError::NotFound {{ field: {label:?}, key: key.to_string() }}"
                );
                out.verbatim(&format!(
                    "
                    pub fn {getter}(&self) -> &{ty} {{ &self.{member} }}
                    pub fn {getter_mut}(&mut self) -> &mut {ty} {{ &mut self.{member} }}
                    pub fn {setter}(&mut self, value: {ty}) {{ self.{member} = value; }}
                    pub fn {set_key}(&mut self, key: impl Into<String>, value: {value}) {{
                        self.{member}.insert(key.into(), value);
                    }}
                    pub fn {delete_key}(&mut self, key: &str) -> Option<{value}> {{
                        self.{member}.remove(key)
                    }}
                    pub fn {get_by_key}(&self, key: &str) -> Result<&{value}, HandlerError> {{
                        self.{member}.get(key).ok_or_else(|| {not_found})
                    }}
                    pub fn {get_by_key_mut}(&mut self, key: &str) -> Result<&mut {value}, HandlerError> {{
                        self.{member}.get_mut(key).ok_or_else(|| {not_found})
                    }}
                    "
                ));
            }
        }
    }

    fn keyed(
        &self,
        out: &mut SourceWriter,
        field: &FieldInfo,
        element: &ValueType,
        keyed: &KeyedAccessors,
    ) {
        let member = ident(&field.name);
        let elem = rust_type(element);
        let key_member = ident(&keyed.key_field);
        let key_ty = key_type(self.schema, element, &keyed.key_field);
        let (param, matches, shown) = match &key_ty {
            ValueType::String => ("&str".to_string(), format!("item.{key_member} == key"), "key.to_string()"),
            t if is_copy(t) => (
                format!("&{}", rust_type(t)),
                format!("item.{key_member} == *key"),
                "key.to_string()",
            ),
            t => (
                format!("&{}", rust_type(t)),
                format!("item.{key_member} == *key"),
                "format!(\"{key:?}\")",
            ),
        };
        let not_found = format!(
            "HandlerError::NotFound {{ field: {:?}, key: {shown} }}",
            field.name
        );
        let KeyedAccessors {
            find,
            find_mut,
            update,
            ..
        } = keyed;
        out.verbatim(&format!(
            "
            pub fn {find}(&self, key: {param}) -> Result<&{elem}, HandlerError> {{
                self.{member}.iter().find(|item| {matches}).ok_or_else(|| {not_found})
            }}
            pub fn {find_mut}(&mut self, key: {param}) -> Result<&mut {elem}, HandlerError> {{
                self.{member}.iter_mut().find(|item| {matches}).ok_or_else(|| {not_found})
            }}
            pub fn {update}(&mut self, key: {param}, value: {elem}) -> Result<(), HandlerError> {{
                let slot = self.{find_mut}(key)?;
                *slot = value;
                Ok(())
            }}
            "
        ));
    }
}

struct JsType<'s> {
    info: &'s TypeInfo,
}

impl JsType<'_> {
    fn write(&self, out: &mut SourceWriter) {
        let name = to_pascal_case(&self.info.name);
        out.line(format!("/** Schema type `{}`. */", self.info.name));
        out.open(format!("export class {name} {{"));
        out.open("constructor(data = {}) {");
        for field in &self.info.fields {
            let source = format!("{} ?? {}", js_property("data", &field.name), js_default(&field.ty));
            out.line(format!(
                "{} = {};",
                js_property("this", &field.name),
                js_convert(&field.ty, &source)
            ));
        }
        out.close("}");

        // The mutable getters collapse onto the plain ones.
        let mut written: Vec<String> = Vec::new();
        for field in &self.info.fields {
            for method in self.accessors(field) {
                if written.contains(&method.0) {
                    continue;
                }
                out.blank();
                out.verbatim(&method.1);
                written.push(method.0);
            }
        }
        out.close("}");
    }

    /// `(name, source)` for every accessor of `field`.
    fn accessors(&self, field: &FieldInfo) -> Vec<(String, String)> {
        let this = js_property("this", &field.name);
        let label = serde_json::Value::from(field.name.as_str());
        let mut methods = Vec::new();
        let mut add = |name: &str, body: String| {
            let name = js_accessor(name);
            let source = body.replace("NAME", &name);
            methods.push((name, source));
        };
        let range_check = format!(
            "if (index < 0 || index >= {this}.length) throw rt.HandlerError.indexOutOfRange({label}, index);"
        );

        match &field.accessors {
            AccessorFamily::Scalar { getter, setter } => {
                add(getter, format!("NAME() {{\n  return {this};\n}}"));
                add(setter, format!("NAME(value) {{\n  {this} = value;\n}}"));
            }
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
                add(getter, format!("NAME() {{\n  return {this};\n}}"));
                add(getter_mut, format!("NAME() {{\n  return {this};\n}}"));
                add(setter, format!("NAME(value) {{\n  {this} = value;\n}}"));
                add(append, format!("NAME(value) {{\n  {this}.push(value);\n}}"));
                add(
                    remove_at,
                    format!("NAME(index) {{\n  {range_check}\n  return {this}.splice(index, 1)[0];\n}}"),
                );
                add(
                    update_at,
                    format!("NAME(index, value) {{\n  {range_check}\n  {this}[index] = value;\n}}"),
                );
                add(at, format!("NAME(index) {{\n  {range_check}\n  return {this}[index];\n}}"));
                add(at_mut, format!("NAME(index) {{\n  {range_check}\n  return {this}[index];\n}}"));
                add(length, format!("NAME() {{\n  return {this}.length;\n}}"));
                if let Some(keyed) = keyed {
                    let item_key = js_property("item", &keyed.key_field);
                    let not_found = format!("throw rt.HandlerError.notFound({label}, key);");
                    add(
                        &keyed.find,
                        format!(
                            "NAME(key) {{\n  const found = {this}.find((item) => {item_key} === key);\n  if (found === undefined) {not_found}\n  return found;\n}}"
                        ),
                    );
                    add(
                        &keyed.update,
                        format!(
                            "NAME(key, value) {{\n  const index = {this}.findIndex((item) => {item_key} === key);\n  if (index < 0) {not_found}\n  {this}[index] = value;\n}}"
                        ),
                    );
                }
            }
            AccessorFamily::Map {
                getter,
                getter_mut,
                setter,
                set_key,
                delete_key,
                get_by_key,
                get_by_key_mut,
            } => {
                let lookup = format!(
                    "NAME(key) {{\n  if (!Object.hasOwn({this}, key)) throw rt.HandlerError.notFound({label}, key);\n  return {this}[key];\n}}"
                );
                add(getter, format!("NAME() {{\n  return {this};\n}}"));
                add(getter_mut, format!("NAME() {{\n  return {this};\n}}"));
                add(setter, format!("NAME(value) {{\n  {this} = value;\n}}"));
                add(set_key, format!("NAME(key, value) {{\n  {this}[key] = value;\n}}"));
                add(delete_key, format!("NAME(key) {{\n  delete {this}[key];\n}}"));
                add(get_by_key, lookup.clone());
                add(get_by_key_mut, lookup);
            }
        }
        methods
    }
}

fn js_default(ty: &ValueType) -> &'static str {
    match ty {
        ValueType::String => "\"\"",
        ValueType::Int | ValueType::Float => "0",
        ValueType::Bool => "false",
        ValueType::Record(_) | ValueType::Map(_) => "{}",
        ValueType::Array(_) => "[]",
        ValueType::Any => "null",
    }
}

/// Wraps raw JSON `source` so records come out as class instances.
fn js_convert(ty: &ValueType, source: &str) -> String {
    match ty {
        ValueType::Record(name) => format!("new {}({source})", to_pascal_case(name)),
        ValueType::Array(inner) => match inner.as_ref() {
            ValueType::Record(name) => {
                format!("({source}).map((item) => new {}(item))", to_pascal_case(name))
            }
            _ => format!("[...({source})]"),
        },
        ValueType::Map(inner) => match inner.as_ref() {
            ValueType::Record(name) => format!(
                "Object.fromEntries(Object.entries({source}).map(([key, item]) => [key, new {}(item)]))",
                to_pascal_case(name)
            ),
            _ => format!("{{ ...({source}) }}"),
        },
        _ => source.to_string(),
    }
}
