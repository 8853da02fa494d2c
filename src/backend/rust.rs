use super::types::{self, is_copy, rust_param_type, rust_type};
use super::writer::SourceWriter;
use super::{Backend, Target};
use crate::codegen::{
    Ambient, BinOp, Expr, FailReason, Literal, MathFn, Program, Stmt, UnaryOp, Unit, WaitKind,
};
use crate::graph::UnitKind;
use crate::instrument::TraceKind;
use crate::naming::ident;
use itertools::Itertools;

/// Writes programs as a Rust module against the `kumiki_runtime` crate.
///
/// Handlers and functions take the live session, the state and the sender,
/// and return `Result<_, HandlerError>`. Units that wait become `async fn`
/// and take a `CancellationToken`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend;

impl Backend for RustBackend {
    fn target(&self) -> Target {
        Target::Rust
    }

    fn render(&self, program: &Program) -> String {
        let mut printer = RustPrinter {
            program,
            unit: None,
            out: SourceWriter::new("    "),
        };
        printer.module();
        printer.out.finish()
    }
}

const TRACE_RUNTIME: &str = r#"
/// Receives trace events from generated handlers and functions.
pub trait TraceSink: Send + Sync {
    fn emit(&self, event: &TraceEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub kind: &'static str,
    pub session: String,
    pub unit: &'static str,
    pub node: Option<String>,
    pub duration_ms: Option<f64>,
    pub error: Option<String>,
}

/// Fans trace events out to every subscribed sink.
pub struct TraceHub {
    sinks: std::sync::RwLock<Vec<std::sync::Arc<dyn TraceSink>>>,
}

impl TraceHub {
    pub const fn new() -> Self {
        Self {
            sinks: std::sync::RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, sink: std::sync::Arc<dyn TraceSink>) {
        if let Ok(mut sinks) = self.sinks.write() {
            sinks.push(sink);
        }
    }

    pub fn emit(&self, event: TraceEvent) {
        if let Ok(sinks) = self.sinks.read() {
            for sink in sinks.iter() {
                sink.emit(&event);
            }
        }
    }
}

pub static TRACE_HUB: TraceHub = TraceHub::new();

/// Trace state of one handler or function invocation.
pub struct TraceScope<'h> {
    hub: &'h TraceHub,
    session: String,
    unit: &'static str,
    started: std::time::Instant,
    open_nodes: Vec<std::time::Instant>,
    last_node: Option<String>,
}

impl<'h> TraceScope<'h> {
    pub fn begin(hub: &'h TraceHub, session: impl ToString, unit: &'static str) -> Self {
        let scope = Self {
            hub,
            session: session.to_string(),
            unit,
            started: std::time::Instant::now(),
            open_nodes: Vec::new(),
            last_node: None,
        };
        scope.emit("event:start", None, None, None);
        scope
    }

    fn emit(&self, kind: &'static str, node: Option<&str>, duration_ms: Option<f64>, error: Option<String>) {
        self.hub.emit(TraceEvent {
            kind,
            session: self.session.clone(),
            unit: self.unit,
            node: node.map(str::to_string),
            duration_ms,
            error,
        });
    }

    pub fn node_start(&mut self, node: &str) {
        self.open_nodes.push(std::time::Instant::now());
        self.last_node = Some(node.to_string());
        self.emit("node:start", Some(node), None, None);
    }

    pub fn node_end(&mut self, node: &str) {
        let duration = self
            .open_nodes
            .pop()
            .map(|started| started.elapsed().as_secs_f64() * 1000.0);
        self.emit("node:end", Some(node), duration, None);
    }

    pub fn node_wait(&self, node: &str) {
        self.emit("node:wait", Some(node), None, None);
    }

    pub fn node_resume(&self, node: &str) {
        self.emit("node:resume", Some(node), None, None);
    }

    pub fn finish<T>(self, result: &Result<T, HandlerError>) {
        let error = result.as_ref().err().map(|e| e.to_string());
        if let Some(message) = &error {
            self.emit("node:error", self.last_node.as_deref(), None, Some(message.clone()));
        }
        let elapsed = self.started.elapsed().as_secs_f64() * 1000.0;
        self.emit("event:end", None, Some(elapsed), error);
    }
}
"#;

struct RustPrinter<'p> {
    program: &'p Program,
    /// The unit being printed.
    unit: Option<&'p Unit>,
    out: SourceWriter,
}

impl<'p> RustPrinter<'p> {
    fn module(&mut self) {
        let program = self.program;
        self.out.line("// Code generated by kumiki. DO NOT EDIT.");
        self.out.line(format!("// Package: {}", program.package));
        self.out.blank();
        self.out
            .line("#![allow(unused_variables, unused_mut, unused_parens, unreachable_code)]");
        self.out.blank();
        self.out.line("use kumiki_runtime::prelude::*;");
        if !program.views.is_empty() {
            self.out.line("use crate::views;");
        }

        if let Some(schema) = &program.schema {
            self.out.blank();
            types::rust_types(schema, &mut self.out);
        }
        if program.tracing {
            self.out.blank();
            self.out.verbatim(TRACE_RUNTIME);
        }
        if program.has_filters() {
            self.out.blank();
            self.filter_registry();
        }

        for unit in &program.units {
            self.out.blank();
            self.unit = Some(unit);
            match unit.kind {
                UnitKind::Filter => self.filter(unit),
                UnitKind::Handler | UnitKind::Function => self.callable(unit),
            }
        }
        self.unit = None;
    }

    fn filter_registry(&mut self) {
        let state = &self.program.state_type;
        self.out.verbatim(&format!(
            r#"
            pub type FilterFn = fn(&{state}, &str) -> Result<{state}, HandlerError>;

            /// Filters installed per participant, applied in installation order.
            pub struct FilterRegistry {{
                filters: std::sync::RwLock<std::collections::HashMap<String, Vec<FilterFn>>>,
            }}

            impl FilterRegistry {{
                pub fn new() -> Self {{
                    Self {{
                        filters: std::sync::RwLock::new(std::collections::HashMap::new()),
                    }}
                }}

                pub fn install(&self, participant: &str, filter: FilterFn) {{
                    if let Ok(mut filters) = self.filters.write() {{
                        filters.entry(participant.to_string()).or_default().push(filter);
                    }}
                }}

                pub fn clear(&self, participant: &str) {{
                    if let Ok(mut filters) = self.filters.write() {{
                        filters.remove(participant);
                    }}
                }}

                /// The state as `viewer` may see it.
                pub fn apply(&self, state: &{state}, viewer: &str) -> Result<{state}, HandlerError> {{
                    let installed = match self.filters.read() {{
                        Ok(filters) => filters.get(viewer).cloned().unwrap_or_default(),
                        Err(_) => Vec::new(),
                    }};
                    let mut view = state.clone();
                    for filter in installed {{
                        view = filter(&view, viewer)?;
                    }}
                    Ok(view)
                }}
            }}

            impl Default for FilterRegistry {{
                fn default() -> Self {{
                    Self::new()
                }}
            }}
            "#
        ));

        let entries = self
            .program
            .units
            .iter()
            .filter(|u| u.kind == UnitKind::Filter && u.params.is_empty())
            .map(|u| format!("({:?}, {} as FilterFn)", u.name, u.ident))
            .join(", ");
        self.out.blank();
        self.out.line("/// Every generated filter without parameters, by name.");
        self.out
            .line(format!("pub const FILTERS: &[(&str, FilterFn)] = &[{entries}];"));
    }

    fn signature_params(&self, unit: &Unit) -> Vec<String> {
        unit.params
            .iter()
            .map(|p| format!("{}: {}", p.name, rust_param_type(&p.ty)))
            .collect()
    }

    fn callable(&mut self, unit: &Unit) {
        match (&unit.kind, &unit.event) {
            (UnitKind::Handler, Some(event)) => {
                self.out.line(format!("/// Handles the `{event}` event."))
            }
            _ => self.out.line(format!("/// Function `{}`.", unit.name)),
        }

        let mut params = vec![
            "session: &mut Session".to_string(),
            format!("state: &mut {}", self.program.state_type),
            "sender: &str".to_string(),
        ];
        if unit.cancellable {
            params.push("cancel: &CancellationToken".to_string());
        }
        params.extend(self.signature_params(unit));

        let returns = unit.returns.as_ref().map(rust_type).unwrap_or_else(|| "()".to_string());
        let asyncness = if unit.cancellable { "async " } else { "" };
        self.out.open(format!(
            "pub {asyncness}fn {}({}) -> Result<{returns}, HandlerError> {{",
            unit.ident,
            params.join(", ")
        ));

        if unit.traced {
            self.out.line(format!(
                "let mut __trace = TraceScope::begin(&TRACE_HUB, session.id(), {:?});",
                unit.name
            ));
            if unit.cancellable {
                self.out
                    .open(format!("let __result: Result<{returns}, HandlerError> = async {{"));
            } else {
                self.out.open(format!(
                    "let __result: Result<{returns}, HandlerError> = (|| -> Result<{returns}, HandlerError> {{"
                ));
            }
            self.body(unit, Some(&returns));
            self.out.close(if unit.cancellable { "}.await;" } else { "})();" });
            self.out.line("__trace.finish(&__result);");
            self.out.line("__result");
        } else {
            self.body(unit, None);
        }
        self.out.close("}");
    }

    /// Prints the statements plus the fall-through result. `typed` names the
    /// success type when the tail needs spelling out for inference.
    fn body(&mut self, unit: &Unit, typed: Option<&str>) {
        self.block(&unit.body);
        if ends_in_exit(&unit.body) {
            return;
        }
        let turbofish = typed
            .map(|t| format!("::<{t}, HandlerError>"))
            .unwrap_or_default();
        match &unit.returns {
            None => self.out.line(format!("Ok{turbofish}(())")),
            Some(_) => self.out.line(format!(
                "Err{turbofish}(HandlerError::Failed({:?}.to_string()))",
                format!("function '{}' ended without returning a value", unit.name)
            )),
        }
    }

    fn filter(&mut self, unit: &Unit) {
        let state = &self.program.state_type;
        self.out
            .line(format!("/// Filter `{}`: the state as `viewer` sees it.", unit.name));
        let mut params = vec![format!("state: &{state}"), "viewer: &str".to_string()];
        params.extend(self.signature_params(unit));
        self.out.open(format!(
            "pub fn {}({}) -> Result<{state}, HandlerError> {{",
            unit.ident,
            params.join(", ")
        ));
        self.out.line("let mut __filtered = state.clone();");
        self.out.line("let state = &mut __filtered;");
        self.block(&unit.body);
        if !ends_in_exit(&unit.body) {
            self.out.line("Ok(__filtered)");
        }
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
                let binding = if *mutable { "let mut" } else { "let" };
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
                self.out.open(format!("if {} {{", self.expr(condition)));
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
                mutable,
                body,
            } => {
                let method = if *mutable { "iter_mut" } else { "iter" };
                self.out.open(format!(
                    "for ({index}, {item}) in (0i64..).zip({}.{method}()) {{",
                    self.receiver(iter)
                ));
                self.block(body);
                self.out.close("}");
            }
            Stmt::Repeat { index, count, body } => {
                self.out
                    .open(format!("for {index} in 0..{} {{", self.operand(count)));
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
                    FailReason::NotHost => "HandlerError::NotHost".to_string(),
                    FailReason::NotPermitted => "HandlerError::NotPermitted".to_string(),
                    FailReason::Message(message) => format!(
                        "HandlerError::Failed({}.to_string())",
                        self.receiver(message)
                    ),
                };
                self.out.line(format!("return Err({error});"));
            }
            Stmt::Wait { kind, .. } => match kind {
                WaitKind::Duration(ms) => {
                    let sleep = self.sleep(ms);
                    self.select(&sleep);
                }
                WaitKind::Until {
                    condition,
                    interval,
                } => {
                    self.out
                        .open(format!("while !{} {{", self.receiver(condition)));
                    let sleep = self.sleep(interval);
                    self.select(&sleep);
                    self.out.close("}");
                }
            },
            Stmt::Trace(point) => {
                let method = match point.kind {
                    TraceKind::NodeStart => "node_start",
                    TraceKind::NodeEnd => "node_end",
                    TraceKind::NodeWait => "node_wait",
                    TraceKind::NodeResume => "node_resume",
                    // Unit-level events come from the wrapper.
                    TraceKind::EventStart | TraceKind::EventEnd | TraceKind::NodeError => return,
                };
                self.out
                    .line(format!("__trace.{method}({:?});", point.node));
            }
            Stmt::Comment(text) => self.out.line(format!("// {text}")),
            Stmt::Placeholder { node, kind } => self.out.line(format!(
                "// NOT IMPLEMENTED: node '{node}' of kind '{kind}' has no emitter"
            )),
        }
    }

    fn sleep(&self, ms: &Expr) -> String {
        format!(
            "tokio::time::sleep(std::time::Duration::from_millis({}.max(0) as u64))",
            self.receiver(ms)
        )
    }

    fn select(&mut self, sleep: &str) {
        self.out.open("tokio::select! {");
        self.out.line(format!("_ = {sleep} => {{}}"));
        self.out
            .line("_ = cancel.cancelled() => return Err(HandlerError::Cancelled),");
        self.out.close("}");
    }

    fn return_stmt(&self, value: Option<&Expr>) -> String {
        let Some(unit) = self.unit else {
            return "return Ok(());".to_string();
        };
        if unit.kind == UnitKind::Filter {
            return "return Ok(__filtered);".to_string();
        }
        match (value, &unit.returns) {
            (Some(value), Some(ty)) if is_copy(ty) || matches!(value, Expr::Owned(_)) => {
                format!("return Ok({});", self.expr(value))
            }
            (Some(value), Some(_)) => {
                format!("return Ok({}.to_owned());", self.receiver(value))
            }
            _ => "return Ok(());".to_string(),
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
                Ambient::Cancel => "cancel",
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
            } => self.call(function, args, *cancellable),
            Expr::Helper { name, args } => format!("{name}({})", self.list(args)),
            Expr::Method {
                receiver,
                name,
                args,
            } => format!("{}.{name}({})", self.receiver(receiver), self.list(args)),
            Expr::Field { receiver, name } => format!("{}.{name}", self.receiver(receiver)),
            Expr::Try(inner) => format!("{}?", self.receiver(inner)),
            Expr::Ref { expr, mutable } => {
                let prefix = if *mutable { "&mut " } else { "&" };
                format!("{prefix}{}", self.receiver(expr))
            }
            Expr::Owned(inner) => format!("{}.to_owned()", self.receiver(inner)),
            Expr::Slice(items) => format!("&[{}]", self.list(items)),
            Expr::List(items) => format!("vec![{}]", self.list(items)),
            Expr::View(name) => format!("views::{}(state)", ident(name)),
            Expr::ToString(inner) => format!("{}.to_string()", self.receiver(inner)),
            Expr::Format { template, args } => {
                let args = args.iter().map(|a| format!(", {}", self.expr(a))).join("");
                format!("format!({template:?}{args})")
            }
            Expr::Math { func, args } => {
                let arg = |i: usize| {
                    args.get(i)
                        .map(|a| self.expr(a))
                        .unwrap_or_else(|| "0".to_string())
                };
                let first = args
                    .first()
                    .map(|a| self.receiver(a))
                    .unwrap_or_else(|| "0".to_string());
                match func {
                    MathFn::Min => format!("{first}.min({})", arg(1)),
                    MathFn::Max => format!("{first}.max({})", arg(1)),
                    MathFn::Abs => format!("{first}.abs()"),
                    MathFn::Round => format!("{first}.round()"),
                    MathFn::Floor => format!("{first}.floor()"),
                    MathFn::Ceil => format!("{first}.ceil()"),
                    MathFn::Clamp => format!("{first}.clamp({}, {})", arg(1), arg(2)),
                }
            }
            Expr::InList { needle, list } => format!(
                "[{}].contains(&{})",
                list.iter().map(literal).join(", "),
                self.receiver(needle)
            ),
            Expr::AsIndex(inner) => format!("({} as usize)", self.receiver(inner)),
        }
    }

    /// Parenthesises expressions that would bind loosely as an operand.
    fn operand(&self, expr: &Expr) -> String {
        match expr {
            Expr::Binary { .. } => format!("({})", self.expr(expr)),
            _ => self.expr(expr),
        }
    }

    /// Like [`Self::operand`], for the left side of `.` and `?`.
    fn receiver(&self, expr: &Expr) -> String {
        match expr {
            Expr::Binary { .. } | Expr::Unary { .. } | Expr::Ref { .. } => {
                format!("({})", self.expr(expr))
            }
            // Numeric literals need a concrete type to take methods.
            Expr::Lit(Literal::Int(i)) if *i < 0 => format!("({i}i64)"),
            Expr::Lit(Literal::Int(i)) => format!("{i}i64"),
            Expr::Lit(Literal::Float(f)) if *f < 0.0 => format!("({f:?}f64)"),
            Expr::Lit(Literal::Float(f)) => format!("{f:?}f64"),
            _ => self.expr(expr),
        }
    }

    fn list(&self, items: &[Expr]) -> String {
        items.iter().map(|e| self.expr(e)).join(", ")
    }

    /// Non-`Copy` arguments are passed by reference, matching the callee's
    /// parameter types.
    fn call(&self, function: &str, args: &[Expr], cancellable: bool) -> String {
        let callee = self
            .program
            .units
            .iter()
            .find(|u| u.kind == UnitKind::Function && u.ident == function);

        let mut parts: Vec<String> = vec!["session".into(), "state".into(), "sender".into()];
        if cancellable {
            parts.push("cancel".into());
        }
        for (i, arg) in args.iter().enumerate() {
            let by_ref = callee
                .and_then(|u| u.params.get(i))
                .is_some_and(|p| !is_copy(&p.ty));
            let arg = match arg {
                Expr::Owned(inner) if by_ref => inner.as_ref(),
                other => other,
            };
            parts.push(if by_ref {
                format!("&{}", self.receiver(arg))
            } else {
                self.expr(arg)
            });
        }

        let call = format!("{function}({})", parts.join(", "));
        if cancellable {
            format!("{call}.await")
        } else {
            call
        }
    }
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
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Gt => ">",
        BinOp::Lt => "<",
        BinOp::Ge => ">=",
        BinOp::Le => "<=",
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "Value::Null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) => format!("{f:?}"),
        Literal::Str(s) => format!("{s:?}"),
        Literal::List(items) => format!("vec![{}]", items.iter().map(literal).join(", ")),
        Literal::Map(_) => format!("serde_json::json!({})", lit.to_json()),
    }
}
