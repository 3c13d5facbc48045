//! Statement parser
//!
//! Turns scanned [`SourceLine`]s into a tree of structure nodes. Blocks are
//! indentation-delimited; one statement per line. Expressions are parsed by
//! precedence climbing over [`Operator::precedence`].

use super::ast::{ExprKind, ExprNode};
use crate::error::{Error, Result};
use crate::ir::{Operator, Variable};
use crate::lexer::{Scanner, SourceLine, Token, TokenKind};

/// Structured statement, prior to linearization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureNode {
    /// `var = <expr>`
    Assign {
        /// Assigned variable
        var: Variable,
        /// Right-hand side
        expr: ExprNode,
        /// Source line
        line: usize,
    },
    /// `print(<expr>)`
    Print {
        /// Printed expression
        expr: ExprNode,
        /// Source line
        line: usize,
    },
    /// `var = input()`
    Input {
        /// Destination variable
        var: Variable,
        /// Source line
        line: usize,
    },
    /// `if <cond>:` with optional `elif`/`else` chain folded into `else_body`
    If {
        /// Branch condition
        cond: ExprNode,
        /// Statements of the taken branch
        body: Vec<StructureNode>,
        /// Statements of the else branch (empty when absent)
        else_body: Vec<StructureNode>,
        /// Source line
        line: usize,
    },
    /// `while <cond>:`
    While {
        /// Loop condition
        cond: ExprNode,
        /// Loop body
        body: Vec<StructureNode>,
        /// Source line
        line: usize,
    },
}

/// Parse a complete program
pub fn parse_program(source: &str) -> Result<Vec<StructureNode>> {
    let lines = Scanner::new(source).scan_lines()?;
    let mut parser = ProgramParser {
        lines,
        pos: 0,
        indents: vec![0],
    };
    let program = parser.parse_block(0)?;
    tracing::debug!(statements = program.len(), "parsed program");
    Ok(program)
}

struct ProgramParser {
    lines: Vec<SourceLine>,
    pos: usize,
    indents: Vec<usize>,
}

impl ProgramParser {
    fn parse_block(&mut self, indent: usize) -> Result<Vec<StructureNode>> {
        let mut nodes = Vec::new();
        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent {
                if !self.indents.contains(&line.indent) {
                    return Err(Error::indentation(line.line, "dedent to an unseen level"));
                }
                break;
            }
            if line.indent > indent {
                return Err(Error::indentation(line.line, "unexpected indent"));
            }
            let line = line.clone();
            self.pos += 1;
            nodes.push(self.parse_statement(&line)?);
        }
        Ok(nodes)
    }

    fn parse_statement(&mut self, line: &SourceLine) -> Result<StructureNode> {
        let tokens = &line.tokens;
        let line_no = line.line;
        // A keyword on the left of `=` is the reserved-identifier case.
        if !matches!(tokens[0].kind, TokenKind::Ident(_))
            && tokens.get(1).map(|t| &t.kind) == Some(&TokenKind::Assign)
        {
            return Err(Error::ReservedIdentifier {
                line: line_no,
                name: tokens[0].kind.to_string(),
            });
        }
        match &tokens[0].kind {
            TokenKind::Ident(name) => self.parse_assignment(name.clone(), tokens, line_no),
            TokenKind::Print => {
                let expr = parse_bracketed_expr(&tokens[1..], line_no)?;
                expect_kind(&expr, ExprKind::Arithmetic)?;
                Ok(StructureNode::Print { expr, line: line_no })
            }
            TokenKind::If => {
                let cond = parse_header_condition(&tokens[1..], line_no)?;
                let body = self.parse_indented_body(line)?;
                let else_body = self.parse_branch_tail(line.indent)?;
                Ok(StructureNode::If {
                    cond,
                    body,
                    else_body,
                    line: line_no,
                })
            }
            TokenKind::While => {
                let cond = parse_header_condition(&tokens[1..], line_no)?;
                let body = self.parse_indented_body(line)?;
                Ok(StructureNode::While {
                    cond,
                    body,
                    line: line_no,
                })
            }
            TokenKind::Elif | TokenKind::Else => Err(Error::OrphanBranch {
                line: line_no,
                keyword: tokens[0].kind.to_string(),
            }),
            kind => Err(Error::syntax(
                line_no,
                format!("statement cannot start with '{kind}'"),
            )),
        }
    }

    fn parse_assignment(
        &mut self,
        name: String,
        tokens: &[Token],
        line_no: usize,
    ) -> Result<StructureNode> {
        if tokens.get(1).map(|t| &t.kind) != Some(&TokenKind::Assign) {
            return Err(Error::syntax(line_no, "expected '=' after variable name"));
        }
        let rhs = &tokens[2..];
        // `x = input()` is a transfer, not an expression.
        if rhs.len() == 3
            && rhs[0].kind == TokenKind::Input
            && rhs[1].kind == TokenKind::LParen
            && rhs[2].kind == TokenKind::RParen
        {
            return Ok(StructureNode::Input {
                var: Variable::new(name),
                line: line_no,
            });
        }
        let expr = parse_full_expr(rhs, line_no)?;
        expect_kind(&expr, ExprKind::Arithmetic)?;
        Ok(StructureNode::Assign {
            var: Variable::new(name),
            expr,
            line: line_no,
        })
    }

    fn parse_indented_body(&mut self, header: &SourceLine) -> Result<Vec<StructureNode>> {
        let Some(next) = self.lines.get(self.pos) else {
            return Err(Error::indentation(header.line, "expected an indented block"));
        };
        if next.indent <= header.indent {
            return Err(Error::indentation(next.line, "expected an indented block"));
        }
        let body_indent = next.indent;
        self.indents.push(body_indent);
        let body = self.parse_block(body_indent)?;
        self.indents.pop();
        Ok(body)
    }

    /// Consume an `elif`/`else` continuation at the given indent, if present.
    fn parse_branch_tail(&mut self, indent: usize) -> Result<Vec<StructureNode>> {
        let Some(line) = self.lines.get(self.pos) else {
            return Ok(Vec::new());
        };
        if line.indent != indent {
            return Ok(Vec::new());
        }
        match line.tokens[0].kind {
            TokenKind::Elif => {
                let line = line.clone();
                self.pos += 1;
                let cond = parse_header_condition(&line.tokens[1..], line.line)?;
                let body = self.parse_indented_body(&line)?;
                let else_body = self.parse_branch_tail(indent)?;
                Ok(vec![StructureNode::If {
                    cond,
                    body,
                    else_body,
                    line: line.line,
                }])
            }
            TokenKind::Else => {
                let line = line.clone();
                self.pos += 1;
                if line.tokens.len() != 2 || line.tokens[1].kind != TokenKind::Colon {
                    return Err(Error::syntax(line.line, "expected ':' after 'else'"));
                }
                self.parse_indented_body(&line)
            }
            _ => Ok(Vec::new()),
        }
    }
}

fn expect_kind(expr: &ExprNode, expected: ExprKind) -> Result<()> {
    if expr.kind() != expected {
        return Err(Error::TypeError {
            expected: expected.to_string(),
            got: expr.kind().to_string(),
        });
    }
    Ok(())
}

/// `<cond> :` at the tail of an `if`/`elif`/`while` header
fn parse_header_condition(tokens: &[Token], line_no: usize) -> Result<ExprNode> {
    let Some((last, rest)) = tokens.split_last() else {
        return Err(Error::syntax(line_no, "missing condition"));
    };
    if last.kind != TokenKind::Colon {
        return Err(Error::syntax(line_no, "expected ':' at end of header"));
    }
    let cond = parse_full_expr(rest, line_no)?;
    expect_kind(&cond, ExprKind::Boolean)?;
    Ok(cond)
}

/// `( <expr> )` covering the whole token run
fn parse_bracketed_expr(tokens: &[Token], line_no: usize) -> Result<ExprNode> {
    match (tokens.first(), tokens.last()) {
        (Some(open), Some(close))
            if open.kind == TokenKind::LParen && close.kind == TokenKind::RParen =>
        {
            parse_full_expr(&tokens[1..tokens.len() - 1], line_no)
        }
        _ => Err(Error::syntax(line_no, "expected parenthesized expression")),
    }
}

/// Parse a token run that must form exactly one expression
fn parse_full_expr(tokens: &[Token], line_no: usize) -> Result<ExprNode> {
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        line: line_no,
    };
    let expr = parser.parse_expr(1)?;
    if parser.pos != tokens.len() {
        return Err(Error::syntax(
            line_no,
            format!("unexpected '{}'", tokens[parser.pos].kind),
        ));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    line: usize,
}

impl ExprParser<'_> {
    /// Precedence-climbing entry point
    fn parse_expr(&mut self, min_prec: u8) -> Result<ExprNode> {
        // `not` binds looser than comparisons, so it is handled here
        // rather than in the tight prefix position.
        let mut left = if self.peek() == Some(&TokenKind::Not)
            && min_prec <= Operator::Not.precedence()
        {
            self.pos += 1;
            let operand = self.parse_expr(Operator::Not.precedence())?;
            ExprNode::logic_not(operand)?
        } else {
            self.parse_prefix()?
        };

        while let Some(op) = self.peek().and_then(binary_operator) {
            if op.precedence() < min_prec {
                break;
            }
            self.pos += 1;
            let right = self.parse_expr(op.precedence() + 1)?;
            left = match op.domain() {
                crate::ir::OperatorDomain::Arithmetic => ExprNode::binary(op, left, right)?,
                crate::ir::OperatorDomain::Comparison => ExprNode::comparison(op, left, right)?,
                crate::ir::OperatorDomain::Logic => ExprNode::logic(op, left, right)?,
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<ExprNode> {
        match self.peek() {
            Some(TokenKind::Minus) => {
                self.pos += 1;
                let operand = self.parse_prefix()?;
                ExprNode::unary(Operator::Neg, operand)
            }
            Some(TokenKind::Tilde) => {
                self.pos += 1;
                let operand = self.parse_prefix()?;
                ExprNode::unary(Operator::BitNot, operand)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<ExprNode> {
        let Some(token) = self.tokens.get(self.pos) else {
            return Err(Error::syntax(self.line, "expression ends unexpectedly"));
        };
        match &token.kind {
            TokenKind::Int(value) => {
                self.pos += 1;
                Ok(ExprNode::literal(*value))
            }
            TokenKind::Ident(name) => {
                self.pos += 1;
                Ok(ExprNode::variable(name.clone()))
            }
            TokenKind::LParen => {
                self.pos += 1;
                let inner = self.parse_expr(1)?;
                if self.peek() != Some(&TokenKind::RParen) {
                    return Err(Error::syntax(self.line, "unbalanced parentheses"));
                }
                self.pos += 1;
                Ok(inner)
            }
            kind => Err(Error::syntax(
                self.line,
                format!("unexpected '{kind}' in expression"),
            )),
        }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }
}

fn binary_operator(kind: &TokenKind) -> Option<Operator> {
    match kind {
        TokenKind::Plus => Some(Operator::Add),
        TokenKind::Minus => Some(Operator::Sub),
        TokenKind::Star => Some(Operator::Mul),
        TokenKind::Slash => Some(Operator::Div),
        TokenKind::Percent => Some(Operator::Mod),
        TokenKind::Amp => Some(Operator::BitAnd),
        TokenKind::Pipe => Some(Operator::BitOr),
        TokenKind::Caret => Some(Operator::BitXor),
        TokenKind::Lt => Some(Operator::Lt),
        TokenKind::Le => Some(Operator::Le),
        TokenKind::Gt => Some(Operator::Gt),
        TokenKind::Ge => Some(Operator::Ge),
        TokenKind::EqEq => Some(Operator::Eq),
        TokenKind::Ne => Some(Operator::Ne),
        TokenKind::And => Some(Operator::And),
        TokenKind::Or => Some(Operator::Or),
        _ => None,
    }
}
