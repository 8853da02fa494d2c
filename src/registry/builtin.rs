use super::{FlowShape, NodeCategory, NodeDefinition};
use crate::schema::ValueType;
use serde_json::json;

/// The closed set of kinds compiled into the core.
///
/// Control structures live here because reconstruction needs to know their
/// shape; everything else goes through [`super::NodeBehavior`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinKind {
    Branch,
    ForEach,
    ForEachWhere,
    UpdateWhere,
    Repeat,
    Return,
    Fail,
    Wait,
    WaitUntil,
    CallFunction,
    Constant,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 11] = [
        BuiltinKind::Branch,
        BuiltinKind::ForEach,
        BuiltinKind::ForEachWhere,
        BuiltinKind::UpdateWhere,
        BuiltinKind::Repeat,
        BuiltinKind::Return,
        BuiltinKind::Fail,
        BuiltinKind::Wait,
        BuiltinKind::WaitUntil,
        BuiltinKind::CallFunction,
        BuiltinKind::Constant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinKind::Branch => "branch",
            BuiltinKind::ForEach => "forEach",
            BuiltinKind::ForEachWhere => "forEachWhere",
            BuiltinKind::UpdateWhere => "updateWhere",
            BuiltinKind::Repeat => "repeat",
            BuiltinKind::Return => "return",
            BuiltinKind::Fail => "fail",
            BuiltinKind::Wait => "wait",
            BuiltinKind::WaitUntil => "waitUntil",
            BuiltinKind::CallFunction => "callFunction",
            BuiltinKind::Constant => "constant",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn shape(&self) -> FlowShape {
        match self {
            BuiltinKind::Branch => FlowShape::Decision,
            BuiltinKind::ForEach
            | BuiltinKind::ForEachWhere
            | BuiltinKind::UpdateWhere
            | BuiltinKind::Repeat => FlowShape::Iteration,
            BuiltinKind::Return | BuiltinKind::Fail => FlowShape::Terminal,
            BuiltinKind::Wait
            | BuiltinKind::WaitUntil
            | BuiltinKind::CallFunction
            | BuiltinKind::Constant => FlowShape::Linear,
        }
    }

    /// Suspends the unit, which then needs a cancellation token.
    pub fn is_wait(&self) -> bool {
        matches!(self, BuiltinKind::Wait | BuiltinKind::WaitUntil)
    }

    pub fn definition(self) -> NodeDefinition {
        let def = NodeDefinition::new(self.as_str(), NodeCategory::Flow)
            .shape(self.shape())
            .builtin(self);

        match self {
            BuiltinKind::Branch => def.input("condition", ValueType::Bool),
            BuiltinKind::ForEach => def
                .optional_input("path", ValueType::String)
                .optional_input("collection", ValueType::Any)
                .output("item", ValueType::Any)
                .output("index", ValueType::Int),
            BuiltinKind::ForEachWhere => def
                .optional_input("path", ValueType::String)
                .optional_input("collection", ValueType::Any)
                .input("field", ValueType::String)
                .input("equals", ValueType::Any)
                .output("item", ValueType::Any)
                .output("index", ValueType::Int),
            BuiltinKind::UpdateWhere => def
                .input("path", ValueType::String)
                .input("field", ValueType::String)
                .input("equals", ValueType::Any)
                .output("item", ValueType::Any)
                .output("index", ValueType::Int),
            BuiltinKind::Repeat => def
                .input("count", ValueType::Int)
                .output("index", ValueType::Int),
            BuiltinKind::Return => def.optional_input("value", ValueType::Any),
            BuiltinKind::Fail => def.input_or("message", ValueType::String, json!("failed")),
            BuiltinKind::Wait => def.input("duration", ValueType::Int).session_only(),
            BuiltinKind::WaitUntil => def
                .input("path", ValueType::String)
                .input_or("interval", ValueType::Int, json!(100))
                .session_only(),
            BuiltinKind::CallFunction => def
                .input("function", ValueType::String)
                .output("result", ValueType::Any)
                .variadic()
                .session_only(),
            BuiltinKind::Constant => def
                .input("value", ValueType::Any)
                .output("value", ValueType::Any),
        }
    }
}
