use std::fmt::Debug;
use std::rc::Rc;

#[derive(Debug)]
pub struct ProgramData {
    pub body: Vec<StatementType>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableDeclarationKind {
    Var,
    Let,
    Const,
}

#[derive(Debug)]
pub struct VariableDeclaratorData {
    pub id: String,
    pub init: Option<ExpressionType>,
}

#[derive(Debug)]
pub struct CatchClauseData {
    pub param: Option<String>,
    pub body: Vec<StatementType>,
}

#[derive(Debug)]
pub enum StatementType {
    EmptyStatement,
    ExpressionStatement(ExpressionType),
    BlockStatement(Vec<StatementType>),
    VariableDeclaration {
        kind: VariableDeclarationKind,
        declarations: Vec<VariableDeclaratorData>,
    },
    FunctionDeclaration(Rc<FunctionData>),
    IfStatement {
        test: ExpressionType,
        consequent: Box<StatementType>,
        alternate: Option<Box<StatementType>>,
    },
    WhileStatement {
        test: ExpressionType,
        body: Box<StatementType>,
    },
    ForStatement {
        /// Either a `VariableDeclaration` or an `ExpressionStatement`.
        init: Option<Box<StatementType>>,
        test: Option<ExpressionType>,
        update: Option<ExpressionType>,
        body: Box<StatementType>,
    },
    ReturnStatement(Option<ExpressionType>),
    BreakStatement,
    ContinueStatement,
    ThrowStatement(ExpressionType),
    TryStatement {
        block: Vec<StatementType>,
        handler: Option<CatchClauseData>,
        finalizer: Option<Vec<StatementType>>,
    },
}

#[derive(Debug)]
pub enum FunctionBodyOrExpression {
    FunctionBody(Vec<StatementType>),
    Expression(Box<ExpressionType>),
}

#[derive(Debug)]
pub struct FunctionData {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBodyOrExpression,
    /// Arrow functions take `this` from the scope they were created in.
    pub is_arrow: bool,
}

#[derive(Debug, Clone)]
pub enum LiteralType {
    UndefinedLiteral,
    NullLiteral,
    BooleanLiteral(bool),
    NumberLiteral(f64),
    StringLiteral(String),
}

#[derive(Debug)]
pub enum MemberProperty {
    Static(String),
    Computed(Box<ExpressionType>),
}

#[derive(Debug)]
pub enum ExpressionType {
    Literal(LiteralType),
    Identifier(String),
    ThisExpression,
    ArrayExpression(Vec<ExpressionType>),
    ObjectExpression(Vec<(String, ExpressionType)>),
    FunctionExpression(Rc<FunctionData>),
    UnaryExpression {
        operator: UnaryOperator,
        argument: Box<ExpressionType>,
    },
    UpdateExpression {
        operator: UpdateOperator,
        prefix: bool,
        argument: Box<ExpressionType>,
    },
    BinaryExpression {
        operator: BinaryOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    LogicalExpression {
        operator: LogicalOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    ConditionalExpression {
        test: Box<ExpressionType>,
        consequent: Box<ExpressionType>,
        alternate: Box<ExpressionType>,
    },
    AssignmentExpression {
        operator: AssignmentOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    MemberExpression {
        object: Box<ExpressionType>,
        property: MemberProperty,
    },
    CallExpression {
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionType>,
    },
    NewExpression {
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionType>,
    },
    SequenceExpression(Vec<ExpressionType>),
}

impl ExpressionType {
    /// Only identifiers and member expressions may appear on the left of an
    /// assignment or as the operand of `++`/`--`.
    pub fn is_assignment_target(&self) -> bool {
        matches!(
            self,
            ExpressionType::Identifier(_) | ExpressionType::MemberExpression { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    LogicalNot,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    LooselyEqual,
    LooselyUnequal,
    StrictlyEqual,
    StrictlyUnequal,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalOperator {
    Or,
    And,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssignmentOperator {
    Equals,
    AddEquals,
    SubtractEquals,
    MultiplyEquals,
    DivideEquals,
    ModuloEquals,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies before storing.
    pub fn binary_operator(&self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Equals => None,
            AssignmentOperator::AddEquals => Some(BinaryOperator::Add),
            AssignmentOperator::SubtractEquals => Some(BinaryOperator::Subtract),
            AssignmentOperator::MultiplyEquals => Some(BinaryOperator::Multiply),
            AssignmentOperator::DivideEquals => Some(BinaryOperator::Divide),
            AssignmentOperator::ModuloEquals => Some(BinaryOperator::Modulo),
        }
    }
}
