use crate::codegen::{EmitContext, Expr};
use crate::error::GenerateError;
use crate::graph::Node;
use crate::registry::{NodeCategory, NodeDefinition, Registry};
use crate::schema::ValueType;

pub(super) fn register(registry: &mut Registry) {
    registry.insert_core(
        NodeDefinition::new("concat", NodeCategory::Text)
            .input("a", ValueType::Any)
            .input("b", ValueType::Any)
            .output("result", ValueType::String)
            .behavior(emit_concat),
    );
    registry.insert_core(
        NodeDefinition::new("toString", NodeCategory::Text)
            .input("value", ValueType::Any)
            .output("result", ValueType::String)
            .behavior(emit_to_string),
    );
    // `{name}` placeholders in the template are filled from inputs of the
    // same name.
    registry.insert_core(
        NodeDefinition::new("format", NodeCategory::Text)
            .input("template", ValueType::String)
            .output("result", ValueType::String)
            .variadic()
            .behavior(emit_format),
    );
}

fn emit_concat(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let a = ctx.input(node, "a")?;
    let b = ctx.input(node, "b")?;
    let value = Expr::Format {
        template: "{}{}".to_string(),
        args: vec![a, b],
    };
    ctx.declare(node, "result", ValueType::String, value);
    Ok(())
}

fn emit_to_string(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let value = ctx.input(node, "value")?;
    ctx.declare(node, "result", ValueType::String, Expr::ToString(Box::new(value)));
    Ok(())
}

fn emit_format(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let template = ctx.literal_str(node, "template")?;
    let (positional, names) = split_template(&template)
        .ok_or_else(|| ctx.error(node, format!("unbalanced braces in template {:?}", template)))?;
    let mut args = Vec::with_capacity(names.len());
    for name in &names {
        args.push(ctx.input(node, name)?);
    }
    let value = Expr::Format {
        template: positional,
        args,
    };
    ctx.declare(node, "result", ValueType::String, value);
    Ok(())
}

/// Rewrites `{name}` placeholders to `{}` and returns the names in order.
/// `{{` and `}}` stay escaped.
fn split_template(template: &str) -> Option<(String, Vec<String>)> {
    let mut positional = String::with_capacity(template.len());
    let mut names = Vec::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                positional.push_str("{{");
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                positional.push_str("}}");
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return None,
                        Some(c) => name.push(c),
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                names.push(name.to_string());
                positional.push_str("{}");
            }
            '}' => return None,
            c => positional.push(c),
        }
    }
    Some((positional, names))
}
