//! Abstract Syntax Tree (AST) Types for Bash
//!
//! The tree is produced once by the parser and never mutated afterwards.
//! Command substitutions own their own parsed sub-trees.

use std::fmt;

// =============================================================================
// BASE TYPES
// =============================================================================

/// Position information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

// =============================================================================
// SCRIPT & STATEMENTS
// =============================================================================

/// Root node: a complete script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptNode {
    pub statements: Vec<StatementNode>,
}

/// A statement is a list of pipelines connected by && or ||,
/// optionally sent to the background with a trailing `&`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementNode {
    pub pipelines: Vec<PipelineNode>,
    /// Operators between pipelines; `operators.len() == pipelines.len() - 1`
    pub operators: Vec<StatementOperator>,
    pub background: bool,
    /// Source line of the first token
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOperator {
    And, // &&
    Or,  // ||
}

// =============================================================================
// PIPELINES & COMMANDS
// =============================================================================

/// A pipeline: cmd1 | cmd2 | cmd3
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineNode {
    pub commands: Vec<CommandNode>,
    /// Negate exit status with !
    pub negated: bool,
    /// For each pipe, whether it's |& (pipe stderr too)
    pub pipe_stderr: Vec<bool>,
}

/// Union of all command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandNode {
    Simple(SimpleCommandNode),
    Compound(CompoundCommandNode),
    FunctionDef(FunctionDefNode),
}

/// Simple command: name args... with optional redirections
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleCommandNode {
    /// Variable assignments before command: VAR=value cmd
    pub assignments: Vec<AssignmentNode>,
    /// Command words; the first one is the command name
    pub words: Vec<WordNode>,
    pub redirections: Vec<RedirectionNode>,
    pub line: usize,
}

/// Compound commands: control structures
#[derive(Debug, Clone, PartialEq)]
pub enum CompoundCommandNode {
    If(IfNode),
    For(ForNode),
    CStyleFor(CStyleForNode),
    While(WhileNode),
    Until(WhileNode),
    Case(CaseNode),
    Subshell(BlockNode),
    Group(BlockNode),
    Arithmetic(ArithmeticCommandNode),
    Conditional(ConditionalCommandNode),
}

impl CompoundCommandNode {
    pub fn redirections(&self) -> &[RedirectionNode] {
        match self {
            Self::If(n) => &n.redirections,
            Self::For(n) => &n.redirections,
            Self::CStyleFor(n) => &n.redirections,
            Self::While(n) | Self::Until(n) => &n.redirections,
            Self::Case(n) => &n.redirections,
            Self::Subshell(n) | Self::Group(n) => &n.redirections,
            Self::Arithmetic(n) => &n.redirections,
            Self::Conditional(n) => &n.redirections,
        }
    }

    pub(crate) fn redirections_mut(&mut self) -> &mut Vec<RedirectionNode> {
        match self {
            Self::If(n) => &mut n.redirections,
            Self::For(n) => &mut n.redirections,
            Self::CStyleFor(n) => &mut n.redirections,
            Self::While(n) | Self::Until(n) => &mut n.redirections,
            Self::Case(n) => &mut n.redirections,
            Self::Subshell(n) | Self::Group(n) => &mut n.redirections,
            Self::Arithmetic(n) => &mut n.redirections,
            Self::Conditional(n) => &mut n.redirections,
        }
    }
}

// =============================================================================
// CONTROL FLOW
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub clauses: Vec<IfClause>,
    pub else_body: Option<Vec<StatementNode>>,
    pub redirections: Vec<RedirectionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfClause {
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
}

/// for loop: for VAR in WORDS; do ...; done
#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    pub variable: String,
    /// Words to iterate over (None = "$@")
    pub words: Option<Vec<WordNode>>,
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
}

/// C-style for loop: for ((init; cond; step)); do ...; done
///
/// The three clauses are kept as arithmetic text; `$` expansions inside
/// them are resolved on every evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CStyleForNode {
    pub init: Option<String>,
    pub condition: Option<String>,
    pub update: Option<String>,
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
    pub line: usize,
}

/// while / until loop
#[derive(Debug, Clone, PartialEq)]
pub struct WhileNode {
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseNode {
    pub word: WordNode,
    pub items: Vec<CaseItemNode>,
    pub redirections: Vec<RedirectionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseItemNode {
    pub patterns: Vec<WordNode>,
    pub body: Vec<StatementNode>,
    pub terminator: CaseTerminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTerminator {
    DoubleSemi,  // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&
}

/// Body of `( ... )` or `{ ...; }`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
}

/// Arithmetic command: (( expr ))
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticCommandNode {
    pub expression: String,
    pub redirections: Vec<RedirectionNode>,
    pub line: usize,
}

/// Conditional command: [[ expr ]]
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalCommandNode {
    pub expression: ConditionalExpressionNode,
    pub redirections: Vec<RedirectionNode>,
    pub line: usize,
}

// =============================================================================
// FUNCTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefNode {
    pub name: String,
    pub body: Box<CompoundCommandNode>,
    /// Redirections written after the body; applied on every call
    pub redirections: Vec<RedirectionNode>,
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

/// Variable assignment: VAR=value, VAR+=value, VAR[i]=value or VAR=(a b c)
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentNode {
    pub name: String,
    /// Raw subscript text for `VAR[sub]=value`
    pub index: Option<String>,
    pub value: Option<WordNode>,
    pub append: bool,
    pub array: Option<Vec<ArrayElementNode>>,
}

/// One element of a compound array assignment: `value` or `[key]=value`
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayElementNode {
    pub key: Option<String>,
    pub value: WordNode,
    pub append: bool,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RedirectionNode {
    /// Explicit file descriptor (default depends on operator)
    pub fd: Option<i32>,
    pub operator: RedirectionOperator,
    pub target: RedirectionTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectionTarget {
    Word(WordNode),
    HereDoc(HereDocNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectionOperator {
    Less,      // <
    Great,     // >
    DGreat,    // >>
    GreatAnd,  // >&
    LessAnd,   // <&
    LessGreat, // <>
    Clobber,   // >|
    AndGreat,  // &>
    AndDGreat, // &>>
    TLess,     // <<<
    DLess,     // <<
    DLessDash, // <<-
}

impl RedirectionOperator {
    /// File descriptor the operator applies to when none is written.
    pub fn default_fd(&self) -> i32 {
        match self {
            Self::Less | Self::LessAnd | Self::LessGreat | Self::TLess | Self::DLess | Self::DLessDash => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for RedirectionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Less => "<",
            Self::Great => ">",
            Self::DGreat => ">>",
            Self::GreatAnd => ">&",
            Self::LessAnd => "<&",
            Self::LessGreat => "<>",
            Self::Clobber => ">|",
            Self::AndGreat => "&>",
            Self::AndDGreat => "&>>",
            Self::TLess => "<<<",
            Self::DLess => "<<",
            Self::DLessDash => "<<-",
        };
        f.write_str(s)
    }
}

/// Here document
#[derive(Debug, Clone, PartialEq)]
pub struct HereDocNode {
    pub delimiter: String,
    pub content: WordNode,
    /// Strip leading tabs (<<- vs <<)
    pub strip_tabs: bool,
    /// Quoted delimiter means no expansion
    pub quoted: bool,
}

// =============================================================================
// WORDS
// =============================================================================

/// A Word is a sequence of parts that form a single shell word.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordNode {
    pub parts: Vec<WordPart>,
}

impl WordNode {
    pub fn literal(value: impl Into<String>) -> Self {
        Self { parts: vec![WordPart::Literal(value.into())] }
    }

    /// The word's text if it is made only of unquoted literal parts.
    pub fn as_plain_literal(&self) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                WordPart::Literal(s) => out.push_str(s),
                _ => return None,
            }
        }
        Some(out)
    }

    /// True when any part carries quoting (used for heredoc delimiters
    /// and `[[ == ]]` right-hand sides).
    pub fn has_quotes(&self) -> bool {
        self.parts.iter().any(|p| {
            matches!(p, WordPart::SingleQuoted(_) | WordPart::DoubleQuoted(_) | WordPart::Escaped(_))
        })
    }
}

/// Parts that can make up a word
#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    /// Unquoted text; glob metacharacters in it stay active
    Literal(String),
    SingleQuoted(String),
    DoubleQuoted(Vec<WordPart>),
    /// Backslash-escaped text outside quotes
    Escaped(String),
    ParameterExpansion(ParameterExpansionPart),
    CommandSubstitution(CommandSubstitutionPart),
    /// `$(( expr ))`, expression text kept verbatim
    ArithmeticExpansion(String),
    BraceExpansion(Vec<BraceItem>),
    /// `~` or `~user`
    TildeExpansion(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandSubstitutionPart {
    pub body: ScriptNode,
    pub backtick: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BraceItem {
    Word(WordNode),
    Range(BraceRange),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraceRange {
    pub start: String,
    pub end: String,
    pub step: Option<i64>,
}

// =============================================================================
// PARAMETER EXPANSION
// =============================================================================

/// Parameter/variable expansion: $VAR or ${VAR...}
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterExpansionPart {
    /// Variable name, positional digits or special character
    pub parameter: String,
    pub index: Option<ParameterIndex>,
    /// `${!name...}`
    pub indirect: bool,
    pub operation: Option<ParameterOperation>,
}

impl ParameterExpansionPart {
    pub fn simple(name: impl Into<String>) -> Self {
        Self { parameter: name.into(), index: None, indirect: false, operation: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterIndex {
    /// `[@]`
    All,
    /// `[*]`
    Star,
    /// `[expr]` raw subscript text
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterOperation {
    /// ${VAR:-default} or ${VAR-default}
    Default { word: WordNode, check_empty: bool },
    /// ${VAR:=default} or ${VAR=default}
    AssignDefault { word: WordNode, check_empty: bool },
    /// ${VAR:?error} or ${VAR?error}
    ErrorIfUnset { word: Option<WordNode>, check_empty: bool },
    /// ${VAR:+alternative} or ${VAR+alternative}
    Alternative { word: WordNode, check_empty: bool },
    /// ${#VAR}
    Length,
    /// ${VAR:offset} or ${VAR:offset:length}, arithmetic text
    Substring { offset: String, length: Option<String> },
    /// ${VAR#pattern}, ${VAR##pattern}, ${VAR%pattern}, ${VAR%%pattern}
    RemovePattern { pattern: WordNode, side: PatternSide, greedy: bool },
    /// ${VAR/pattern/replacement} and friends
    Replace {
        pattern: WordNode,
        replacement: Option<WordNode>,
        all: bool,
        anchor: Option<PatternAnchor>,
    },
    /// ${VAR^}, ${VAR^^}, ${VAR,}, ${VAR,,}
    CaseModify { direction: CaseDirection, all: bool, pattern: Option<WordNode> },
    /// ${VAR@Q} and the other transforms
    Transform(TransformOperator),
    /// ${!arr[@]} or ${!arr[*]}
    Keys { star: bool },
    /// ${!prefix*} or ${!prefix@}
    NamePrefix { star: bool },
    /// Parsed but rejected at expansion time
    BadSubstitution(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSide {
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternAnchor {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseDirection {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOperator {
    /// @Q quote for reuse as input
    Quote,
    /// @E expand backslash escapes
    Escape,
    /// @P prompt string
    Prompt,
    /// @A assignment statement
    Assignment,
    /// @a attribute flags
    Attributes,
    /// @U uppercase
    Upper,
    /// @u uppercase first character
    UpperFirst,
    /// @L lowercase
    Lower,
    /// @K quoted key/value pairs
    KeyValueQuoted,
    /// @k key/value pairs as separate words
    KeyValue,
}

impl TransformOperator {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'Q' => Self::Quote,
            'E' => Self::Escape,
            'P' => Self::Prompt,
            'A' => Self::Assignment,
            'a' => Self::Attributes,
            'U' => Self::Upper,
            'u' => Self::UpperFirst,
            'L' => Self::Lower,
            'K' => Self::KeyValueQuoted,
            'k' => Self::KeyValue,
            _ => return None,
        })
    }
}

// =============================================================================
// CONDITIONAL EXPRESSIONS ([[ ]])
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalExpressionNode {
    And(Box<ConditionalExpressionNode>, Box<ConditionalExpressionNode>),
    Or(Box<ConditionalExpressionNode>, Box<ConditionalExpressionNode>),
    Not(Box<ConditionalExpressionNode>),
    Group(Box<ConditionalExpressionNode>),
    /// `-f file`, `-z str`, ...
    Unary { operator: String, operand: WordNode },
    /// `a == b`, `a -lt b`, `a =~ re`, ...
    Binary { operator: String, left: WordNode, right: WordNode },
    /// Bare word: true when non-empty
    Word(WordNode),
}

// =============================================================================
// ARITHMETIC EXPRESSIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    Number(i64),
    /// Variable reference, optionally subscripted
    Variable(ArithLValue),
    Unary { op: ArithUnaryOp, operand: Box<ArithExpr> },
    Binary { op: ArithBinaryOp, left: Box<ArithExpr>, right: Box<ArithExpr> },
    Ternary { condition: Box<ArithExpr>, then_branch: Box<ArithExpr>, else_branch: Box<ArithExpr> },
    /// `=` when `op` is None, otherwise a compound assignment like `+=`
    Assign { op: Option<ArithBinaryOp>, target: ArithLValue, value: Box<ArithExpr> },
    IncDec { target: ArithLValue, increment: bool, prefix: bool },
}

/// Assignable location inside an arithmetic expression
#[derive(Debug, Clone, PartialEq)]
pub struct ArithLValue {
    pub name: String,
    /// Raw subscript text; evaluated arithmetically for indexed arrays
    /// and used as a key for associative arrays
    pub index: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithUnaryOp {
    Negate,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithBinaryOp {
    Comma,
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl fmt::Display for ArithBinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Comma => ",",
            Self::LogicalOr => "||",
            Self::LogicalAnd => "&&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
        };
        f.write_str(s)
    }
}
