use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Eq,
    Ne,
    And,
    Or,
}

/// Parsed script expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptExpr {
    Literal(Value),
    List(Vec<ScriptExpr>),
    Name(String),
    Property {
        target: Box<ScriptExpr>,
        name: String,
        safe: bool,
    },
    Index {
        target: Box<ScriptExpr>,
        index: Box<ScriptExpr>,
    },
    Call {
        target: Option<Box<ScriptExpr>>,
        method: String,
        args: Vec<ScriptExpr>,
        safe: bool,
    },
    Not(Box<ScriptExpr>),
    Binary {
        op: BinaryOp,
        left: Box<ScriptExpr>,
        right: Box<ScriptExpr>,
    },
    /// `left ?: right`
    Elvis(Box<ScriptExpr>, Box<ScriptExpr>),
}
