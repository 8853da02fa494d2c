use super::types::{self, js_accessor};
use super::writer::SourceWriter;
use super::{Backend, Target};
use crate::codegen::{
    Ambient, BinOp, Expr, FailReason, Literal, MathFn, Program, Stmt, UnaryOp, Unit, WaitKind,
};
use crate::graph::UnitKind;
use crate::instrument::TraceKind;
use crate::naming::to_camel_case;
use itertools::Itertools;

/// Writes programs as an ES module against the `kumiki-runtime` package.
///
/// Handlers resolve to `{ ok: true }` or `{ ok: false, error }`; functions
/// and filters throw `rt.HandlerError`. Units that wait are `async` and take
/// an `AbortSignal`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScriptBackend;

impl Backend for JavaScriptBackend {
    fn target(&self) -> Target {
        Target::JavaScript
    }

    fn render(&self, program: &Program) -> String {
        let mut printer = JsPrinter {
            program,
            unit: None,
            out: SourceWriter::new("  "),
        };
        printer.module();
        printer.out.finish()
    }
}

const TRACE_RUNTIME: &str = r#"
/**
 * Receives trace events. Any object with an `emit(event)` method is a sink.
 * @typedef {{ emit(event: object): void }} TraceSink
 */

/** Fans trace events out to every subscribed sink. */
export class TraceHub {
  constructor() {
    this.sinks = [];
  }

  subscribe(sink) {
    this.sinks.push(sink);
    return () => {
      this.sinks = this.sinks.filter((s) => s !== sink);
    };
  }

  emit(event) {
    for (const sink of this.sinks) {
      sink.emit(event);
    }
  }
}

export const TRACE_HUB = new TraceHub();

class TraceScope {
  constructor(hub, session, unit) {
    this.hub = hub;
    this.session = session;
    this.unit = unit;
    this.started = performance.now();
    this.openNodes = [];
    this.lastNode = null;
    this.error = null;
    this.emit("event:start", {});
  }

  emit(kind, fields) {
    this.hub.emit({ kind, session: this.session, unit: this.unit, ...fields });
  }

  nodeStart(node) {
    this.openNodes.push(performance.now());
    this.lastNode = node;
    this.emit("node:start", { node });
  }

  nodeEnd(node) {
    const started = this.openNodes.pop();
    const durationMs = started === undefined ? null : performance.now() - started;
    this.emit("node:end", { node, durationMs });
  }

  nodeWait(node) {
    this.emit("node:wait", { node });
  }

  nodeResume(node) {
    this.emit("node:resume", { node });
  }

  fail(error) {
    this.error = error?.message ?? String(error);
    this.emit("node:error", { node: this.lastNode, error: this.error });
  }

  finish() {
    this.emit("event:end", { durationMs: performance.now() - this.started, error: this.error });
  }
}

function traceBegin(session, unit) {
  return new TraceScope(TRACE_HUB, session, unit);
}
"#;

const FILTER_RUNTIME: &str = r#"
/** Filters installed per participant, applied in installation order. */
export class FilterRegistry {
  constructor() {
    this.filters = new Map();
  }

  install(participant, filter) {
    const installed = this.filters.get(participant) ?? [];
    installed.push(filter);
    this.filters.set(participant, installed);
  }

  clear(participant) {
    this.filters.delete(participant);
  }

  /** The state as `viewer` may see it. */
  apply(state, viewer) {
    let view = state;
    for (const filter of this.filters.get(viewer) ?? []) {
      view = filter(view, viewer);
    }
    return view;
  }
}
"#;

struct JsPrinter<'p> {
    program: &'p Program,
    unit: Option<&'p Unit>,
    out: SourceWriter,
}

impl<'p> JsPrinter<'p> {
    fn module(&mut self) {
        let program = self.program;
        self.out.line("// Code generated by kumiki. DO NOT EDIT.");
        self.out.line(format!("// Package: {}", program.package));
        self.out.blank();
        self.out.line("import * as rt from \"kumiki-runtime\";");
        if !program.views.is_empty() {
            self.out.line("import * as views from \"./views.js\";");
        }

        if let Some(schema) = &program.schema {
            self.out.blank();
            types::javascript_types(schema, &mut self.out);
        }
        if program.tracing {
            self.out.blank();
            self.out.verbatim(TRACE_RUNTIME);
        }
        if program.has_filters() {
            self.out.blank();
            self.out.verbatim(FILTER_RUNTIME);
        }

        for unit in &program.units {
            self.out.blank();
            self.unit = Some(unit);
            match unit.kind {
                UnitKind::Handler => self.handler(unit),
                UnitKind::Function => self.function(unit),
                UnitKind::Filter => self.filter(unit),
            }
        }
        self.unit = None;

        if program.has_filters() {
            let entries = program
                .units
                .iter()
                .filter(|u| u.kind == UnitKind::Filter && u.params.is_empty())
                .map(|u| format!("{}: {}", json_string(&u.name), name(u)))
                .join(", ");
            self.out.blank();
            self.out.line("/** Every generated filter without parameters, by name. */");
            self.out.line(format!("export const FILTERS = {{ {entries} }};"));
        }
    }

    fn signature(&self, unit: &Unit, ambient: &[&str]) -> String {
        let mut params: Vec<String> = ambient.iter().map(|a| a.to_string()).collect();
        if unit.cancellable {
            params.push("signal".to_string());
        }
        params.extend(unit.params.iter().map(|p| p.name.clone()));
        let asyncness = if unit.cancellable { "async " } else { "" };
        format!(
            "export {asyncness}function {}({}) {{",
            name(unit),
            params.join(", ")
        )
    }

    fn trace_begin(&mut self, unit: &Unit) {
        self.out.line(format!(
            "const __trace = traceBegin(session.id, {});",
            json_string(&unit.name)
        ));
    }

    fn handler(&mut self, unit: &Unit) {
        let event = unit.event.as_deref().unwrap_or(&unit.name);
        self.out.line(format!("/** Handles the `{event}` event. */"));
        self.out
            .open(self.signature(unit, &["session", "state", "sender"]));
        if unit.traced {
            self.trace_begin(unit);
        }
        self.out.open("try {");
        self.block(&unit.body);
        if !ends_in_exit(&unit.body) {
            self.out.line("return { ok: true };");
        }
        self.out.reopen("} catch (error) {");
        self.out.open("if (error instanceof rt.HandlerError) {");
        if unit.traced {
            self.out.line("__trace.fail(error);");
        }
        self.out.line("return { ok: false, error: error.message };");
        self.out.close("}");
        self.out.line("throw error;");
        if unit.traced {
            self.out.reopen("} finally {");
            self.out.line("__trace.finish();");
        }
        self.out.close("}");
        self.out.close("}");
    }

    fn function(&mut self, unit: &Unit) {
        self.out.line(format!("/** Function `{}`. */", unit.name));
        self.out
            .open(self.signature(unit, &["session", "state", "sender"]));
        if unit.traced {
            self.trace_begin(unit);
            self.out.open("try {");
        }
        self.block(&unit.body);
        if unit.returns.is_some() && !ends_in_exit(&unit.body) {
            self.out.line(format!(
                "throw new rt.HandlerError({});",
                json_string(&format!(
                    "function '{}' ended without returning a value",
                    unit.name
                ))
            ));
        }
        if unit.traced {
            self.out.reopen("} catch (error) {");
            self.out.line("__trace.fail(error);");
            self.out.line("throw error;");
            self.out.reopen("} finally {");
            self.out.line("__trace.finish();");
            self.out.close("}");
        }
        self.out.close("}");
    }

    fn filter(&mut self, unit: &Unit) {
        self.out.line(format!(
            "/** Filter `{}`: the state as `viewer` sees it. */",
            unit.name
        ));
        self.out.open(self.signature(unit, &["state", "viewer"]));
        self.out.line("const __filtered = rt.clone(state);");
        self.out.open("{");
        self.out.line("const state = __filtered;");
        self.block(&unit.body);
        self.out.close("}");
        self.out.line("return __filtered;");
        self.out.close("}");
    }

    fn block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let {
                name,
                mutable,
                value,
            } => {
                let binding = if *mutable { "let" } else { "const" };
                self.out
                    .line(format!("{binding} {name} = {};", self.expr(value)));
            }
            Stmt::Assign { target, value } => {
                self.out
                    .line(format!("{} = {};", self.expr(target), self.expr(value)));
            }
            Stmt::Expr(expr) => self.out.line(format!("{};", self.expr(expr))),
            Stmt::If {
                condition,
                then,
                otherwise,
            } => {
                self.out.open(format!("if ({}) {{", self.expr(condition)));
                self.block(then);
                if !otherwise.is_empty() {
                    self.out.reopen("} else {");
                    self.block(otherwise);
                }
                self.out.close("}");
            }
            Stmt::ForEach {
                item,
                index,
                iter,
                body,
                ..
            } => {
                self.out.open(format!(
                    "for (const [{index}, {item}] of {}.entries()) {{",
                    self.receiver(iter)
                ));
                self.block(body);
                self.out.close("}");
            }
            Stmt::Repeat { index, count, body } => {
                self.out.open(format!(
                    "for (let {index} = 0; {index} < {}; {index}++) {{",
                    self.operand(count)
                ));
                self.block(body);
                self.out.close("}");
            }
            Stmt::Continue => self.out.line("continue;"),
            Stmt::Return(value) => {
                let line = self.return_stmt(value.as_ref());
                self.out.line(line);
            }
            Stmt::Fail(reason) => {
                let error = match reason {
                    FailReason::NotHost => "rt.HandlerError.notHost()".to_string(),
                    FailReason::NotPermitted => "rt.HandlerError.notPermitted()".to_string(),
                    FailReason::Message(message) => {
                        format!("new rt.HandlerError(String({}))", self.expr(message))
                    }
                };
                self.out.line(format!("throw {error};"));
            }
            Stmt::Wait { kind, .. } => match kind {
                WaitKind::Duration(ms) => {
                    self.out.line(format!(
                        "await rt.sleepOrCancel({}, signal);",
                        self.expr(ms)
                    ));
                }
                WaitKind::Until {
                    condition,
                    interval,
                } => {
                    self.out
                        .open(format!("while (!{}) {{", self.receiver(condition)));
                    self.out.line(format!(
                        "await rt.sleepOrCancel({}, signal);",
                        self.expr(interval)
                    ));
                    self.out.close("}");
                }
            },
            Stmt::Trace(point) => {
                let method = match point.kind {
                    TraceKind::NodeStart => "nodeStart",
                    TraceKind::NodeEnd => "nodeEnd",
                    TraceKind::NodeWait => "nodeWait",
                    TraceKind::NodeResume => "nodeResume",
                    TraceKind::EventStart | TraceKind::EventEnd | TraceKind::NodeError => return,
                };
                self.out.line(format!(
                    "__trace.{method}({});",
                    json_string(&point.node)
                ));
            }
            Stmt::Comment(text) => self.out.line(format!("// {text}")),
            Stmt::Placeholder { node, kind } => self.out.line(format!(
                "// NOT IMPLEMENTED: node '{node}' of kind '{kind}' has no emitter"
            )),
        }
    }

    fn return_stmt(&self, value: Option<&Expr>) -> String {
        match (self.unit.map(|u| u.kind), value) {
            (Some(UnitKind::Handler), _) => "return { ok: true };".to_string(),
            (Some(UnitKind::Filter), _) => "return __filtered;".to_string(),
            (_, Some(value)) => format!("return {};", self.expr(value)),
            (_, None) => "return;".to_string(),
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Var(name) => name.clone(),
            Expr::Lit(lit) => literal(lit),
            Expr::Ambient(ambient) => match ambient {
                Ambient::State => "state",
                Ambient::Session => "session",
                Ambient::Sender => "sender",
                Ambient::Viewer => "viewer",
                Ambient::Cancel => "signal",
            }
            .to_string(),
            Expr::Binary { op, lhs, rhs } => format!(
                "{} {} {}",
                self.operand(lhs),
                binary_op(*op),
                self.operand(rhs)
            ),
            Expr::Unary { op, expr } => {
                let sign = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                };
                format!("{sign}{}", self.receiver(expr))
            }
            Expr::Call {
                function,
                args,
                cancellable,
            } => {
                let mut parts = vec!["session".to_string(), "state".into(), "sender".into()];
                if *cancellable {
                    parts.push("signal".into());
                }
                parts.extend(args.iter().map(|a| self.expr(a)));
                let call = format!("{}({})", to_camel_case(function), parts.join(", "));
                if *cancellable {
                    format!("await {call}")
                } else {
                    call
                }
            }
            Expr::Helper { name, args } => {
                format!("rt.{}({})", to_camel_case(name), self.list(args))
            }
            Expr::Method {
                receiver,
                name,
                args,
            } => format!(
                "{}.{}({})",
                self.receiver(receiver),
                js_accessor(name),
                self.list(args)
            ),
            Expr::Field { receiver, name } => format!("{}.{name}", self.receiver(receiver)),
            // Errors propagate as exceptions and values are shared.
            Expr::Try(inner) | Expr::Owned(inner) | Expr::AsIndex(inner) => self.expr(inner),
            Expr::Ref { expr, .. } => self.expr(expr),
            Expr::Slice(items) | Expr::List(items) => format!("[{}]", self.list(items)),
            Expr::View(view) => format!("views.{}(state)", to_camel_case(view)),
            Expr::ToString(inner) => format!("String({})", self.expr(inner)),
            Expr::Format { template, args } => self.template(template, args),
            Expr::Math { func, args } => {
                let arg = |i: usize| {
                    args.get(i)
                        .map(|a| self.expr(a))
                        .unwrap_or_else(|| "0".to_string())
                };
                match func {
                    MathFn::Min => format!("Math.min({}, {})", arg(0), arg(1)),
                    MathFn::Max => format!("Math.max({}, {})", arg(0), arg(1)),
                    MathFn::Abs => format!("Math.abs({})", arg(0)),
                    MathFn::Round => format!("Math.round({})", arg(0)),
                    MathFn::Floor => format!("Math.floor({})", arg(0)),
                    MathFn::Ceil => format!("Math.ceil({})", arg(0)),
                    MathFn::Clamp => {
                        format!("Math.min(Math.max({}, {}), {})", arg(0), arg(1), arg(2))
                    }
                }
            }
            Expr::InList { needle, list } => format!(
                "[{}].includes({})",
                list.iter().map(literal).join(", "),
                self.expr(needle)
            ),
        }
    }

    /// A template literal from a `{}` template; `{{` and `}}` are literal braces.
    fn template(&self, template: &str, args: &[Expr]) -> String {
        let mut out = String::from("`");
        let mut args = args.iter();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' if chars.peek() == Some(&'}') => {
                    chars.next();
                    match args.next() {
                        Some(arg) => {
                            out.push_str("${");
                            out.push_str(&self.expr(arg));
                            out.push('}');
                        }
                        None => out.push_str("{}"),
                    }
                }
                '`' | '\\' => {
                    out.push('\\');
                    out.push(c);
                }
                '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
                _ => out.push(c),
            }
        }
        out.push('`');
        out
    }

    fn operand(&self, expr: &Expr) -> String {
        match expr {
            Expr::Binary { .. } => format!("({})", self.expr(expr)),
            Expr::Call {
                cancellable: true, ..
            } => format!("({})", self.expr(expr)),
            Expr::Try(inner) | Expr::Owned(inner) | Expr::AsIndex(inner) | Expr::Ref { expr: inner, .. } => {
                self.operand(inner)
            }
            _ => self.expr(expr),
        }
    }

    fn receiver(&self, expr: &Expr) -> String {
        match expr {
            Expr::Unary { .. } => format!("({})", self.expr(expr)),
            Expr::Lit(Literal::Int(_) | Literal::Float(_)) => format!("({})", self.expr(expr)),
            _ => self.operand(expr),
        }
    }

    fn list(&self, items: &[Expr]) -> String {
        items.iter().map(|e| self.expr(e)).join(", ")
    }
}

fn name(unit: &Unit) -> String {
    to_camel_case(&unit.ident)
}

fn json_string(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

fn ends_in_exit(block: &[Stmt]) -> bool {
    matches!(block.last(), Some(Stmt::Return(_) | Stmt::Fail(_)))
}

fn binary_op(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::Eq => "===",
        BinOp::Ne => "!==",
        BinOp::Gt => ">",
        BinOp::Lt => "<",
        BinOp::Ge => ">=",
        BinOp::Le => "<=",
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) => f.to_string(),
        Literal::Str(s) => json_string(s),
        Literal::List(items) => format!("[{}]", items.iter().map(literal).join(", ")),
        Literal::Map(_) => lit.to_json().to_string(),
    }
}
