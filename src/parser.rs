//! Recursive-descent parser producing a module of functions plus a
//! top-level statement sequence.
//!
//! The parser keeps a precedence-climbing set of helpers, one function per
//! level, and a thin statement layer for blocks and the module itself.
//! Every AST node carries its source location and a type slot that stays
//! `None` until the type checker fills it.

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{SourceLocation, Token, TokenKind};
use crate::ty::Type;

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  And,
  Or,
}

impl BinaryOp {
  /// The operator as written in source; also the canonical IR call name for
  /// everything except the short-circuiting `and`/`or`.
  pub fn symbol(self) -> &'static str {
    match self {
      BinaryOp::Add => "+",
      BinaryOp::Sub => "-",
      BinaryOp::Mul => "*",
      BinaryOp::Div => "/",
      BinaryOp::Rem => "%",
      BinaryOp::Eq => "==",
      BinaryOp::Ne => "!=",
      BinaryOp::Lt => "<",
      BinaryOp::Le => "<=",
      BinaryOp::Gt => ">",
      BinaryOp::Ge => ">=",
      BinaryOp::And => "and",
      BinaryOp::Or => "or",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Not,
}

impl UnaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      UnaryOp::Neg => "-",
      UnaryOp::Not => "not",
    }
  }
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone)]
pub struct Expr {
  pub kind: ExprKind,
  pub loc: SourceLocation,
  /// Filled by the type checker; `None` straight out of the parser.
  pub ty: Option<Type>,
}

impl Expr {
  pub fn new(kind: ExprKind, loc: SourceLocation) -> Self {
    Self {
      kind,
      loc,
      ty: None,
    }
  }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
  IntLit(i64),
  BoolLit(bool),
  Ident(String),
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  If {
    cond: Box<Expr>,
    then_branch: Box<Expr>,
    else_branch: Option<Box<Expr>>,
  },
  While {
    cond: Box<Expr>,
    body: Box<Expr>,
  },
  Break {
    value: Option<Box<Expr>>,
  },
  Continue,
  VarDecl {
    name: String,
    declared_ty: Option<Type>,
    init: Box<Expr>,
  },
  /// The target is always an `Ident` expression; the parser rejects anything
  /// else on the left of `=`.
  Assign {
    target: Box<Expr>,
    value: Box<Expr>,
  },
  Block {
    statements: Vec<Expr>,
    result: Option<Box<Expr>>,
  },
  Call {
    callee: String,
    args: Vec<Expr>,
  },
  Return {
    value: Option<Box<Expr>>,
  },
}

#[derive(Debug, Clone)]
pub struct Param {
  pub name: String,
  pub ty: Type,
  pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct FunDef {
  pub name: String,
  pub params: Vec<Param>,
  pub return_type: Type,
  pub body: Expr,
  pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct Module {
  pub functions: Vec<FunDef>,
  /// The top-level statement sequence, parsed as a synthetic block.
  pub top_level: Option<Expr>,
}

/// Parse a token stream into a module: function definitions first, then an
/// optional top-level statement sequence.
pub fn parse(tokens: &[Token]) -> CompileResult<Module> {
  let mut stream = TokenStream::new(tokens);

  let mut functions = Vec::new();
  while stream.at("fun") {
    functions.push(parse_fun_def(&mut stream)?);
  }

  let top_level = if stream.at_end() {
    None
  } else {
    let loc = stream.loc();
    let (statements, result) = parse_stmt_sequence(&mut stream, false)?;
    Some(Expr::new(ExprKind::Block { statements, result }, loc))
  };

  Ok(Module {
    functions,
    top_level,
  })
}

// ----- Module layer -----

fn parse_fun_def(stream: &mut TokenStream) -> CompileResult<FunDef> {
  let loc = stream.skip("fun")?;
  let (name, _) = stream.get_ident()?;

  stream.skip("(")?;
  let mut params = Vec::new();
  if !stream.at(")") {
    loop {
      let (param_name, param_loc) = stream.get_ident()?;
      stream.skip(":")?;
      let ty = parse_type(stream)?;
      params.push(Param {
        name: param_name,
        ty,
        loc: param_loc,
      });
      if !stream.equal(",") {
        break;
      }
    }
  }
  stream.skip(")")?;

  stream.skip(":")?;
  let return_type = parse_type(stream)?;
  let body = parse_block(stream)?;

  Ok(FunDef {
    name,
    params,
    return_type,
    body,
    loc,
  })
}

fn parse_type(stream: &mut TokenStream) -> CompileResult<Type> {
  let (name, loc) = stream.get_ident()?;
  Type::from_name(&name)
    .ok_or_else(|| CompileError::syntax(loc, format!("unknown type \"{name}\"")))
}

// ----- Statement parsing -----

/// Parse statements up to `}` (inside a block) or end of input (at the top
/// level). An expression without a trailing `;` at the end of the sequence
/// becomes the sequence's result value.
///
/// A statement whose expression ends with `}` does not need a `;` after it.
fn parse_stmt_sequence(
  stream: &mut TokenStream,
  inside_block: bool,
) -> CompileResult<(Vec<Expr>, Option<Box<Expr>>)> {
  let mut statements = Vec::new();

  loop {
    if at_sequence_end(stream, inside_block) {
      return Ok((statements, None));
    }

    let expr = if stream.at("var") {
      parse_var_decl(stream)?
    } else {
      parse_expr(stream)?
    };

    if stream.equal(";") {
      statements.push(expr);
      continue;
    }
    if at_sequence_end(stream, inside_block) {
      return Ok((statements, Some(Box::new(expr))));
    }
    if ends_with_block(&expr) {
      statements.push(expr);
      continue;
    }

    let end = if inside_block { "\"}\"" } else { "end of input" };
    return Err(CompileError::syntax(
      stream.loc(),
      format!("expected \";\" or {end}, but got {}", stream.peek().describe()),
    ));
  }
}

fn at_sequence_end(stream: &TokenStream, inside_block: bool) -> bool {
  if inside_block {
    stream.at("}")
  } else {
    stream.at_end()
  }
}

/// Does this expression end with a closing brace in source? Such statements
/// may omit the separating semicolon.
fn ends_with_block(expr: &Expr) -> bool {
  match &expr.kind {
    ExprKind::Block { .. } => true,
    ExprKind::If {
      then_branch,
      else_branch,
      ..
    } => match else_branch {
      Some(else_branch) => ends_with_block(else_branch),
      None => ends_with_block(then_branch),
    },
    ExprKind::While { body, .. } => ends_with_block(body),
    _ => false,
  }
}

fn parse_block(stream: &mut TokenStream) -> CompileResult<Expr> {
  let loc = stream.skip("{")?;
  let (statements, result) = parse_stmt_sequence(stream, true)?;
  stream.skip("}")?;
  Ok(Expr::new(ExprKind::Block { statements, result }, loc))
}

fn parse_var_decl(stream: &mut TokenStream) -> CompileResult<Expr> {
  let loc = stream.skip("var")?;
  let (name, _) = stream.get_ident()?;
  let declared_ty = if stream.equal(":") {
    Some(parse_type(stream)?)
  } else {
    None
  };
  stream.skip("=")?;
  let init = parse_expr(stream)?;
  Ok(Expr::new(
    ExprKind::VarDecl {
      name,
      declared_ty,
      init: Box::new(init),
    },
    loc,
  ))
}

// ----- Expression parsing -----

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_assign(stream)
}

/// Assignment is right-associative: `a = b = c` is `a = (b = c)`.
fn parse_assign(stream: &mut TokenStream) -> CompileResult<Expr> {
  let node = parse_or(stream)?;

  if stream.at("=") {
    let assign_loc = stream.skip("=")?;
    let value = parse_assign(stream)?;
    if !matches!(node.kind, ExprKind::Ident(_)) {
      return Err(CompileError::syntax(
        assign_loc,
        "left-hand side of assignment must be an identifier",
      ));
    }
    return Ok(Expr::new(
      ExprKind::Assign {
        target: Box::new(node),
        value: Box::new(value),
      },
      assign_loc,
    ));
  }

  Ok(node)
}

fn parse_or(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_and(stream)?;
  while stream.at("or") {
    let loc = stream.skip("or")?;
    let rhs = parse_and(stream)?;
    node = binary(BinaryOp::Or, node, rhs, loc);
  }
  Ok(node)
}

fn parse_and(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_equality(stream)?;
  while stream.at("and") {
    let loc = stream.skip("and")?;
    let rhs = parse_equality(stream)?;
    node = binary(BinaryOp::And, node, rhs, loc);
  }
  Ok(node)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_relational(stream)?;
  loop {
    let op = match stream.peek_operator() {
      Some("==") => BinaryOp::Eq,
      Some("!=") => BinaryOp::Ne,
      _ => break,
    };
    let loc = stream.skip(op.symbol())?;
    let rhs = parse_relational(stream)?;
    node = binary(op, node, rhs, loc);
  }
  Ok(node)
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_add(stream)?;
  loop {
    let op = match stream.peek_operator() {
      Some("<") => BinaryOp::Lt,
      Some("<=") => BinaryOp::Le,
      Some(">") => BinaryOp::Gt,
      Some(">=") => BinaryOp::Ge,
      _ => break,
    };
    let loc = stream.skip(op.symbol())?;
    let rhs = parse_add(stream)?;
    node = binary(op, node, rhs, loc);
  }
  Ok(node)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_mul(stream)?;
  loop {
    let op = match stream.peek_operator() {
      Some("+") => BinaryOp::Add,
      Some("-") => BinaryOp::Sub,
      _ => break,
    };
    let loc = stream.skip(op.symbol())?;
    let rhs = parse_mul(stream)?;
    node = binary(op, node, rhs, loc);
  }
  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_unary(stream)?;
  loop {
    let op = match stream.peek_operator() {
      Some("*") => BinaryOp::Mul,
      Some("/") => BinaryOp::Div,
      Some("%") => BinaryOp::Rem,
      _ => break,
    };
    let loc = stream.skip(op.symbol())?;
    let rhs = parse_unary(stream)?;
    node = binary(op, node, rhs, loc);
  }
  Ok(node)
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, loc: SourceLocation) -> Expr {
  Expr::new(
    ExprKind::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    },
    loc,
  )
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Expr> {
  for (text, op) in [("-", UnaryOp::Neg), ("not", UnaryOp::Not)] {
    if stream.peek_operator() == Some(text) {
      let loc = stream.skip(text)?;
      let operand = parse_unary(stream)?;
      return Ok(Expr::new(
        ExprKind::Unary {
          op,
          operand: Box::new(operand),
        },
        loc,
      ));
    }
  }
  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  let loc = stream.loc();

  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  if stream.at("{") {
    return parse_block(stream);
  }

  if stream.equal("if") {
    return parse_if(stream, loc);
  }

  if stream.equal("while") {
    let cond = parse_expr(stream)?;
    stream.equal("do");
    let body = parse_expr(stream)?;
    return Ok(Expr::new(
      ExprKind::While {
        cond: Box::new(cond),
        body: Box::new(body),
      },
      loc,
    ));
  }

  if stream.equal("break") {
    let value = parse_optional_value(stream)?;
    return Ok(Expr::new(ExprKind::Break { value }, loc));
  }

  if stream.equal("continue") {
    return Ok(Expr::new(ExprKind::Continue, loc));
  }

  if stream.equal("return") {
    let value = parse_optional_value(stream)?;
    return Ok(Expr::new(ExprKind::Return { value }, loc));
  }

  match stream.peek().kind {
    TokenKind::Identifier => {
      let (name, name_loc) = stream.get_ident()?;
      if stream.at("(") {
        return parse_call(stream, name, name_loc);
      }
      Ok(Expr::new(ExprKind::Ident(name), name_loc))
    }
    TokenKind::IntLiteral => {
      let token = stream.advance();
      let value = token.text.parse::<i64>().map_err(|_| {
        CompileError::syntax(token.loc, format!("integer literal {} out of range", token.text))
      })?;
      Ok(Expr::new(ExprKind::IntLit(value), token.loc))
    }
    TokenKind::BoolLiteral => {
      let token = stream.advance();
      Ok(Expr::new(ExprKind::BoolLit(token.text == "true"), token.loc))
    }
    _ => Err(CompileError::syntax(
      loc,
      format!("unexpected {}", stream.peek().describe()),
    )),
  }
}

fn parse_if(stream: &mut TokenStream, loc: SourceLocation) -> CompileResult<Expr> {
  let cond = parse_expr(stream)?;
  // `then` may be left out when the branch is a block, mirroring `do`.
  if !stream.at("{") {
    stream.skip("then")?;
  }
  let then_branch = parse_expr(stream)?;
  let else_branch = if stream.equal("else") {
    Some(Box::new(parse_expr(stream)?))
  } else {
    None
  };
  Ok(Expr::new(
    ExprKind::If {
      cond: Box::new(cond),
      then_branch: Box::new(then_branch),
      else_branch,
    },
    loc,
  ))
}

fn parse_call(
  stream: &mut TokenStream,
  callee: String,
  loc: SourceLocation,
) -> CompileResult<Expr> {
  stream.skip("(")?;
  let mut args = Vec::new();
  if !stream.at(")") {
    loop {
      args.push(parse_expr(stream)?);
      if !stream.equal(",") {
        break;
      }
    }
  }
  stream.skip(")")?;
  Ok(Expr::new(ExprKind::Call { callee, args }, loc))
}

/// `break` and `return` take a value exactly when the next token can begin
/// an expression.
fn parse_optional_value(stream: &mut TokenStream) -> CompileResult<Option<Box<Expr>>> {
  let token = stream.peek();
  let starts_expr = match token.kind {
    TokenKind::IntLiteral | TokenKind::BoolLiteral | TokenKind::Identifier => true,
    TokenKind::Punct => matches!(token.text.as_str(), "(" | "{"),
    TokenKind::Operator => matches!(token.text.as_str(), "-" | "not"),
    TokenKind::Keyword => matches!(token.text.as_str(), "if" | "while"),
    TokenKind::End => false,
  };
  if starts_expr {
    Ok(Some(Box::new(parse_expr(stream)?)))
  } else {
    Ok(None)
  }
}

// ----- Token cursor -----

/// Lightweight cursor over the token vector. The tokenizer guarantees a
/// trailing `End` token, which doubles as the look-ahead sentinel.
struct TokenStream<'a> {
  tokens: &'a [Token],
  pos: usize,
}

impl<'a> TokenStream<'a> {
  fn new(tokens: &'a [Token]) -> Self {
    Self { tokens, pos: 0 }
  }

  fn peek(&self) -> &Token {
    let last = self.tokens.len().saturating_sub(1);
    &self.tokens[self.pos.min(last)]
  }

  fn loc(&self) -> SourceLocation {
    self.peek().loc
  }

  fn at_end(&self) -> bool {
    self.peek().kind == TokenKind::End
  }

  /// True when the current token is the given keyword, operator or
  /// punctuator.
  fn at(&self, text: &str) -> bool {
    let token = self.peek();
    matches!(
      token.kind,
      TokenKind::Keyword | TokenKind::Operator | TokenKind::Punct
    ) && token.text == text
  }

  fn peek_operator(&self) -> Option<&str> {
    let token = self.peek();
    (token.kind == TokenKind::Operator).then_some(token.text.as_str())
  }

  fn advance(&mut self) -> Token {
    let token = self.peek().clone();
    if self.pos < self.tokens.len() {
      self.pos += 1;
    }
    token
  }

  /// Consume the current token if it matches, reporting whether it did.
  fn equal(&mut self, text: &str) -> bool {
    if self.at(text) {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Require the given token, returning its location.
  fn skip(&mut self, text: &str) -> CompileResult<SourceLocation> {
    let loc = self.loc();
    if self.equal(text) {
      Ok(loc)
    } else {
      Err(CompileError::syntax(
        loc,
        format!("expected \"{text}\", but got {}", self.peek().describe()),
      ))
    }
  }

  /// Require an identifier, returning its text and location.
  fn get_ident(&mut self) -> CompileResult<(String, SourceLocation)> {
    let token = self.peek();
    if token.kind == TokenKind::Identifier {
      let result = (token.text.clone(), token.loc);
      self.pos += 1;
      return Ok(result);
    }
    Err(CompileError::syntax(
      token.loc,
      format!("expected an identifier, but got {}", token.describe()),
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;

  fn parse_source(input: &str) -> Module {
    parse(&tokenize(input).unwrap()).unwrap()
  }

  fn parse_error(input: &str) -> String {
    parse(&tokenize(input).unwrap()).unwrap_err().to_string()
  }

  /// The sole top-level expression of a single-expression program.
  fn top_expr(input: &str) -> Expr {
    let module = parse_source(input);
    let Some(Expr {
      kind: ExprKind::Block { statements, result },
      ..
    }) = module.top_level
    else {
      panic!("expected a top-level block");
    };
    assert!(statements.is_empty(), "expected a lone expression");
    *result.expect("expected a result expression")
  }

  fn root_symbol(expr: &Expr) -> &'static str {
    match &expr.kind {
      ExprKind::Binary { op, .. } => op.symbol(),
      other => panic!("expected a binary root, got {other:?}"),
    }
  }

  #[test]
  fn empty_input_is_an_empty_module() {
    let module = parse_source("");
    assert!(module.functions.is_empty());
    assert!(module.top_level.is_none());
  }

  #[test]
  fn precedence_pairs_group_by_level() {
    // One representative operator per level, low to high. For operators `a`
    // (level i) and `b` (level j), `x a y b z` must keep the lower-level
    // operator at the root.
    let levels = ["or", "and", "==", "<", "+", "*"];
    for (i, a) in levels.iter().enumerate() {
      for (j, b) in levels.iter().enumerate() {
        if i == j {
          continue;
        }
        let expr = top_expr(&format!("x {a} y {b} z"));
        let expected_root = if i < j { a } else { b };
        assert_eq!(
          root_symbol(&expr),
          *expected_root,
          "x {a} y {b} z should keep {expected_root} at the root"
        );
      }
    }
  }

  #[test]
  fn same_level_operators_are_left_associative() {
    let expr = top_expr("1 - 2 - 3");
    let ExprKind::Binary { op, lhs, .. } = expr.kind else {
      panic!()
    };
    assert_eq!(op, BinaryOp::Sub);
    assert!(matches!(lhs.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));
  }

  #[test]
  fn assignment_is_right_associative() {
    let expr = top_expr("a = b = c");
    let ExprKind::Assign { target, value } = expr.kind else {
      panic!("expected assignment, got {:?}", expr.kind)
    };
    assert!(matches!(target.kind, ExprKind::Ident(ref n) if n == "a"));
    assert!(matches!(value.kind, ExprKind::Assign { .. }));
  }

  #[test]
  fn assignment_target_must_be_an_identifier() {
    let rendered = parse_error("1 = 2;");
    assert!(rendered.contains("must be an identifier"), "{rendered}");
  }

  #[test]
  fn unary_operators_nest() {
    let expr = top_expr("not not - -1");
    let ExprKind::Unary { op: UnaryOp::Not, operand } = expr.kind else {
      panic!()
    };
    assert!(matches!(operand.kind, ExprKind::Unary { op: UnaryOp::Not, .. }));
  }

  #[test]
  fn unary_binds_tighter_than_multiplication() {
    let expr = top_expr("-x * y");
    assert_eq!(root_symbol(&expr), "*");
  }

  #[test]
  fn if_then_else() {
    let expr = top_expr("if a then b else c");
    let ExprKind::If { else_branch, .. } = expr.kind else {
      panic!()
    };
    assert!(else_branch.is_some());

    let expr = top_expr("if a then b");
    let ExprKind::If { else_branch, .. } = expr.kind else {
      panic!()
    };
    assert!(else_branch.is_none());
  }

  #[test]
  fn if_requires_then_before_a_non_block_branch() {
    let rendered = parse_error("if (a) b");
    assert!(rendered.contains("expected \"then\""), "{rendered}");

    // The block form works without `then`.
    let expr = top_expr("if a { 1 } else { 2 }");
    assert!(matches!(expr.kind, ExprKind::If { .. }));
  }

  #[test]
  fn while_with_and_without_do() {
    for src in ["while x do f();", "while (x) { f(); }"] {
      let module = parse_source(src);
      let Some(Expr {
        kind: ExprKind::Block { statements, .. },
        ..
      }) = module.top_level
      else {
        panic!()
      };
      assert!(matches!(statements[0].kind, ExprKind::While { .. }), "{src}");
    }
  }

  #[test]
  fn break_with_and_without_value() {
    let expr = top_expr("while true do { break 1 }");
    let ExprKind::While { body, .. } = expr.kind else { panic!() };
    let ExprKind::Block { result, .. } = body.kind else { panic!() };
    let ExprKind::Break { value } = result.unwrap().kind else {
      panic!()
    };
    assert!(matches!(value.unwrap().kind, ExprKind::IntLit(1)));

    let expr = top_expr("while true do { break; }");
    let ExprKind::While { body, .. } = expr.kind else { panic!() };
    let ExprKind::Block { statements, .. } = body.kind else { panic!() };
    assert!(matches!(statements[0].kind, ExprKind::Break { value: None }));
  }

  #[test]
  fn statement_ending_with_brace_needs_no_semicolon() {
    let module = parse_source("while (a) { f(); } g();");
    let Some(Expr {
      kind: ExprKind::Block { statements, .. },
      ..
    }) = module.top_level
    else {
      panic!()
    };
    assert_eq!(statements.len(), 2);

    // Also when the brace comes from an if branch nested in the statement.
    let module = parse_source("{ if a then { f(); } g() }");
    let Some(Expr {
      kind: ExprKind::Block { result, .. },
      ..
    }) = module.top_level
    else {
      panic!()
    };
    let ExprKind::Block { statements, result } = result.unwrap().kind else {
      panic!()
    };
    assert_eq!(statements.len(), 1);
    assert!(result.is_some());
  }

  #[test]
  fn missing_semicolon_between_expressions_is_an_error() {
    let rendered = parse_error("f() g()");
    assert!(rendered.contains("expected \";\""), "{rendered}");
  }

  #[test]
  fn var_declaration_with_and_without_annotation() {
    let module = parse_source("var x: Int = 1; var y = true;");
    let Some(Expr {
      kind: ExprKind::Block { statements, .. },
      ..
    }) = module.top_level
    else {
      panic!()
    };
    let ExprKind::VarDecl { declared_ty, .. } = &statements[0].kind else {
      panic!()
    };
    assert_eq!(*declared_ty, Some(Type::Int));
    let ExprKind::VarDecl { declared_ty, .. } = &statements[1].kind else {
      panic!()
    };
    assert!(declared_ty.is_none());
  }

  #[test]
  fn function_definition() {
    let module = parse_source("fun sq(x: Int): Int { return x * x; } print_int(sq(3));");
    assert_eq!(module.functions.len(), 1);
    let fun = &module.functions[0];
    assert_eq!(fun.name, "sq");
    assert_eq!(fun.params.len(), 1);
    assert_eq!(fun.params[0].ty, Type::Int);
    assert_eq!(fun.return_type, Type::Int);
    assert!(module.top_level.is_some());
  }

  #[test]
  fn argument_lists_have_no_arity_limit() {
    // Arguments beyond the six register slots are the codegen's problem,
    // not the grammar's.
    let expr = top_expr("f(1, 2, 3, 4, 5, 6, 7, 8)");
    let ExprKind::Call { args, .. } = expr.kind else {
      panic!()
    };
    assert_eq!(args.len(), 8);

    let module = parse_source(
      "fun wide(a: Int, b: Int, c: Int, d: Int, e: Int, f: Int, g: Int, h: Int): Int { a }",
    );
    assert_eq!(module.functions[0].params.len(), 8);
  }

  #[test]
  fn call_argument_lists() {
    let expr = top_expr("f(1, g(2), true)");
    let ExprKind::Call { callee, args } = expr.kind else {
      panic!()
    };
    assert_eq!(callee, "f");
    assert_eq!(args.len(), 3);
    assert!(matches!(args[1].kind, ExprKind::Call { .. }));
  }

  #[test]
  fn integer_literal_out_of_range_is_an_error() {
    let rendered = parse_error("99999999999999999999;");
    assert!(rendered.contains("out of range"), "{rendered}");
  }

  #[test]
  fn unexpected_token_reports_location() {
    let rendered = parse_error("1 + ;");
    assert!(rendered.contains("1:5"), "{rendered}");
    assert!(rendered.contains("syntax error"), "{rendered}");
  }

  #[test]
  fn functions_must_precede_the_top_level_code() {
    let rendered = parse_error("f(); fun g(): Unit { }");
    assert!(rendered.contains("syntax error"), "{rendered}");
  }
}
