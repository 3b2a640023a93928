//! Program tree for Forge scripts
//!
//! This is the contract between a frontend and the analysis/execution
//! stages. Every node carries a [`Range`]; every expression also carries a
//! [`NodeId`] unique within its program.

use crate::diagnostics::Range;
use serde::Serialize;
use std::fmt;

/// Identity of an expression node, used as the key of a type map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// One of the three variable namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Store {
    /// `let`
    L,
    /// `var`
    V,
    /// `const`
    C,
}

impl Store {
    pub const ALL: [Store; 3] = [Store::L, Store::V, Store::C];

    pub fn prefix(self) -> &'static str {
        match self {
            Store::L => "l",
            Store::V => "v",
            Store::C => "c",
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Store::L => "let",
            Store::V => "var",
            Store::C => "const",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Store> {
        match prefix {
            "l" => Some(Store::L),
            "v" => Some(Store::V),
            "c" => Some(Store::C),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Store::L => 0,
            Store::V => 1,
            Store::C => 2,
        }
    }

    pub fn is_mutable(self) -> bool {
        !matches!(self, Store::C)
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ident {
    pub name: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub range: Range,
}

impl Program {
    pub fn empty() -> Self {
        Self {
            body: Vec::new(),
            range: Range::default(),
        }
    }
}

/// Written type annotation (`: number`, `: string[]`, `: number | null`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeExpr {
    Named(String),
    Array(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: Ident,
    pub annotation: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatchClause {
    pub param: Option<Ident>,
    pub body: Vec<Stmt>,
}

/// A module name inside a directive, as written between quotes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleName {
    pub name: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StmtKind {
    Declaration {
        store: Store,
        name: Ident,
        annotation: Option<TypeExpr>,
        init: Option<Expr>,
    },
    Assignment {
        target: Expr,
        op: AssignOp,
        value: Expr,
    },
    Expression(Expr),
    Block(Vec<Stmt>),
    /// `if` plus any `elif`/`else if` arms, in order
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    ForEach {
        store: Store,
        binding: Ident,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        test: Expr,
    },
    Try {
        body: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Function(FunctionDecl),
    Return(Option<Expr>),
    Throw(Expr),
    Break,
    Continue,
    /// `disable 'Name';`
    Disable(Vec<ModuleName>),
    /// `able 'A', 'B';`
    Enable(Vec<ModuleName>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// Binary operator applied by a compound assignment
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Arrow function with an expression body
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub key: Ident,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Boolean(bool),
    Null,
    Identifier(String),
    /// `l.name`, `v.name`, `c.name`
    Namespaced {
        store: Store,
        name: Ident,
    },
    Member {
        object: Box<Expr>,
        property: Ident,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Assign {
        target: Box<Expr>,
        op: AssignOp,
        value: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Await(Box<Expr>),
    Function {
        params: Vec<Param>,
        body: FunctionBody,
        is_arrow: bool,
        is_async: bool,
    },
    Object(Vec<Property>),
    Array(Vec<Expr>),
    Template(Vec<TemplatePart>),
}

impl Expr {
    /// Root identifier and property names of a plain member chain such as
    /// `Sys.cpu.cores`. Returns `None` when the chain contains anything
    /// other than an identifier root and dotted properties.
    pub fn member_path(&self) -> Option<MemberPath<'_>> {
        match &self.kind {
            ExprKind::Member { object, property } => {
                let mut path = match &object.kind {
                    ExprKind::Identifier(name) => MemberPath {
                        root: name,
                        root_range: object.range,
                        segments: Vec::new(),
                    },
                    _ => object.member_path()?,
                };
                path.segments.push(property);
                Some(path)
            }
            _ => None,
        }
    }
}

/// Borrowed view of `root.seg1.seg2`
#[derive(Debug)]
pub struct MemberPath<'a> {
    pub root: &'a str,
    pub root_range: Range,
    pub segments: Vec<&'a Ident>,
}

impl MemberPath<'_> {
    /// Dotted segment names without the root
    pub fn names(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.name.as_str()).collect()
    }
}
