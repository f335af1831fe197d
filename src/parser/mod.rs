//! # Parser
//!
//! Recursive-descent, precedence-climbing parser producing the AST in
//! [`crate::ast`]. Grounded on the teacher's `statement/parser.rs` string
//! utilities (`split_by_comma`, the paren/string-aware scanning idioms) but
//! rebuilt over a real token stream with line/column tracking, since the
//! grammar here has real operator precedence the teacher's line-oriented
//! Datalog parser never needed.

use crate::ast::*;
use crate::error::VagueError;
use crate::lexer::{KeywordTable, Token, TokenKind};
use crate::registry::PluginRegistry;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    registry: Option<&'a PluginRegistry>,
}

type PResult<T> = Result<T, VagueError>;

pub fn parse(source: &str, keywords: &KeywordTable) -> PResult<Program> {
    let tokens = crate::lexer::tokenize(source, keywords)?;
    Parser::new(tokens).parse_program()
}

pub fn parse_with_registry(source: &str, registry: &PluginRegistry) -> PResult<Program> {
    let tokens = crate::lexer::tokenize(source, registry.keywords())?;
    Parser::with_registry(tokens, registry).parse_program()
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>) -> Self {
        // The parser filters newlines itself, keeping just enough of them
        // to terminate statement lists; see `skip_newlines`.
        Parser {
            tokens,
            pos: 0,
            registry: None,
        }
    }

    pub fn with_registry(tokens: Vec<Token>, registry: &'a PluginRegistry) -> Self {
        Parser {
            tokens,
            pos: 0,
            registry: Some(registry),
        }
    }

    // -- token plumbing ---------------------------------------------------

    pub fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Operator(o) if o == op)
    }

    fn is_op_at(&self, offset: usize, op: &str) -> bool {
        matches!(&self.peek_at(offset).kind, TokenKind::Operator(o) if o == op)
    }

    fn is_kw(&self, kw: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Keyword(k) if k == kw)
    }

    fn is_kw_at(&self, offset: usize, kw: &str) -> bool {
        matches!(&self.peek_at(offset).kind, TokenKind::Keyword(k) if k == kw)
    }

    fn is_number(&self) -> bool {
        matches!(&self.peek().kind, TokenKind::Number(_))
    }

    fn is_eof(&self) -> bool {
        matches!(&self.peek().kind, TokenKind::Eof)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.is_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> PResult<Token> {
        if self.is_op(op) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected '{op}', found '{}'", self.peek().lexeme)))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> PResult<Token> {
        if self.is_kw(kw) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected '{kw}', found '{}'", self.peek().lexeme)))
        }
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(format!(
                "expected identifier, found '{}'",
                self.peek().lexeme
            ))),
        }
    }

    fn error(&self, message: impl Into<String>) -> VagueError {
        let tok = self.peek();
        VagueError::ParseError {
            line: tok.line,
            column: tok.column,
            message: message.into(),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_newlines_and_commas(&mut self) {
        loop {
            match &self.peek().kind {
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Operator(op) if op == "," => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// Parses a dotted path of identifiers (`a.b.c`), used for qualified
    /// names, `^parent.field`, and import targets.
    fn parse_dotted_path(&mut self) -> PResult<Vec<String>> {
        let mut parts = vec![self.expect_identifier()?];
        while self.is_op(".") && matches!(&self.peek_at(1).kind, TokenKind::Identifier(_)) {
            self.advance();
            parts.push(self.expect_identifier()?);
        }
        Ok(parts)
    }

    // -- program / statements ---------------------------------------------

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.is_eof() {
            statements.push(self.parse_statement()?);
            self.skip_newlines();
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        if self.is_kw("import") {
            return self.parse_import();
        }
        if self.is_kw("let") {
            return self.parse_let();
        }
        if self.is_kw("schema") {
            return Ok(Statement::Schema(self.parse_schema()?));
        }
        if self.is_kw("context") {
            return Ok(Statement::Context(self.parse_context()?));
        }
        if self.is_kw("distribution") {
            return Ok(Statement::Distribution(self.parse_distribution()?));
        }
        if self.is_kw("dataset") {
            return Ok(Statement::Dataset(self.parse_dataset()?));
        }
        if let Some(registry) = self.registry {
            if let Some((statement, consumed)) = registry.try_parse_statement(&self.tokens, self.pos) {
                self.pos = (self.pos + consumed).min(self.tokens.len() - 1);
                return Ok(statement);
            }
        }
        Err(self.error(format!(
            "unexpected token '{}' at start of statement",
            self.peek().lexeme
        )))
    }

    fn parse_import(&mut self) -> PResult<Statement> {
        self.expect_kw("import")?;
        let name = self.expect_identifier()?;
        self.expect_kw("from")?;
        let path = self.expect_string()?;
        Ok(Statement::Import { name, path })
    }

    fn parse_let(&mut self) -> PResult<Statement> {
        self.expect_kw("let")?;
        let name = self.expect_identifier()?;
        self.expect_op("=")?;
        let value = self.parse_expression()?;
        Ok(Statement::Let { name, value })
    }

    fn expect_string(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Str(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error("expected string literal")),
        }
    }

    fn parse_context_applications(&mut self) -> PResult<Vec<String>> {
        let mut apps = Vec::new();
        if self.eat_kw("with") {
            apps.push(self.expect_identifier()?);
            while self.eat_op(",") {
                apps.push(self.expect_identifier()?);
            }
        }
        Ok(apps)
    }

    // -- schema -------------------------------------------------------------

    fn parse_schema(&mut self) -> PResult<SchemaDefinition> {
        self.expect_kw("schema")?;
        let name = self.expect_identifier()?;
        let base = if self.eat_kw("from") {
            Some(QualifiedName {
                parts: self.parse_dotted_path()?,
            })
        } else {
            None
        };
        let context_applications = self.parse_context_applications()?;

        self.skip_newlines();
        self.expect_op("{")?;
        self.skip_newlines();

        let mut fields = Vec::new();
        let mut assumptions = Vec::new();
        while !self.is_op("}") {
            if self.is_kw("assume") {
                assumptions.push(self.parse_assume_clause()?);
            } else {
                fields.push(self.parse_field_definition()?);
            }
            self.skip_newlines();
        }
        self.expect_op("}")?;

        let refine = if self.is_kw("refine") {
            Some(self.parse_refine_block()?)
        } else {
            None
        };
        let then = if self.is_kw("then") {
            Some(self.parse_then_block()?)
        } else {
            None
        };

        Ok(SchemaDefinition {
            name,
            base,
            context_applications,
            fields,
            assumptions,
            refine,
            then,
        })
    }

    fn parse_assume_clause(&mut self) -> PResult<AssumeClause> {
        self.expect_kw("assume")?;
        if self.eat_kw("if") {
            let condition = self.parse_expression()?;
            self.skip_newlines();
            self.expect_op("{")?;
            self.skip_newlines();
            let mut constraints = vec![self.parse_expression()?];
            self.skip_newlines_and_commas();
            while !self.is_op("}") {
                constraints.push(self.parse_expression()?);
                self.skip_newlines_and_commas();
            }
            self.expect_op("}")?;
            Ok(AssumeClause {
                condition: Some(condition),
                constraints,
            })
        } else {
            let mut constraints = vec![self.parse_expression()?];
            while self.eat_op(",") {
                constraints.push(self.parse_expression()?);
            }
            Ok(AssumeClause {
                condition: None,
                constraints,
            })
        }
    }

    fn parse_refine_block(&mut self) -> PResult<RefineBlock> {
        self.expect_kw("refine")?;
        self.skip_newlines();
        self.expect_op("{")?;
        self.skip_newlines();
        let mut fields = Vec::new();
        while !self.is_op("}") {
            let condition = if self.eat_kw("when") {
                Some(self.parse_expression()?)
            } else {
                None
            };
            let field = self.parse_field_definition()?;
            fields.push(RefineField { condition, field });
            self.skip_newlines();
        }
        self.expect_op("}")?;
        Ok(RefineBlock { fields })
    }

    fn parse_then_block(&mut self) -> PResult<ThenBlock> {
        self.expect_kw("then")?;
        self.skip_newlines();
        self.expect_op("{")?;
        self.skip_newlines();
        let mut mutations = Vec::new();
        while !self.is_op("}") {
            let target = self.parse_expression()?;
            let op = if self.eat_op("+=") {
                MutationOp::AddAssign
            } else {
                self.expect_op("=")?;
                MutationOp::Assign
            };
            let value = self.parse_expression()?;
            mutations.push(Mutation { target, op, value });
            self.skip_newlines();
        }
        self.expect_op("}")?;
        Ok(ThenBlock { mutations })
    }

    // -- fields ---------------------------------------------------------------

    fn parse_field_definition(&mut self) -> PResult<FieldDefinition> {
        let name = self.expect_identifier()?;
        self.expect_op(":")?;

        let mut flags = FieldFlags::default();
        loop {
            if self.eat_kw("unique") {
                flags.unique = true;
            } else if self.eat_kw("private") {
                flags.private = true;
            } else {
                break;
            }
        }

        let (field_type, computed, computed_expr) = self.parse_field_type()?;
        flags.computed = computed;

        if self.eat_op("?") {
            flags.optional = true;
        }

        let when = if self.eat_kw("when") {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let distribution = if self.eat_op("~") {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let where_filter = if self.eat_kw("where") {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(FieldDefinition {
            name,
            field_type,
            flags,
            when,
            distribution,
            where_filter,
            computed_expr,
        })
    }

    /// Returns `(field_type, is_computed, computed_expression)`.
    fn parse_field_type(&mut self) -> PResult<(FieldType, bool, Option<Expression>)> {
        // Primitive (optionally ranged).
        if let Some(kind) = self.peek_primitive_kind() {
            self.advance();
            if self.eat_kw("in") {
                let (min, max) = self.parse_range_operands()?;
                return Ok((
                    FieldType::Range {
                        base: kind,
                        min: Some(min),
                        max,
                    },
                    false,
                    None,
                ));
            }
            return Ok((FieldType::Primitive(kind), false, None));
        }

        // Ordered sequence literal: `[ expr (',' expr)* ]`.
        if self.is_op("[") {
            self.advance();
            self.skip_newlines();
            let mut items = Vec::new();
            if !self.is_op("]") {
                items.push(self.parse_expression()?);
                self.skip_newlines_and_commas();
                while !self.is_op("]") {
                    items.push(self.parse_expression()?);
                    self.skip_newlines_and_commas();
                }
            }
            self.expect_op("]")?;
            if items.is_empty() {
                return Err(self.error("empty ordered sequence"));
            }
            return Ok((FieldType::OrderedSequence(items), false, None));
        }

        // Collection cardinality: `N`, `N..M`, or `(expr)` followed by
        // `per ID`? then `*`/`of` and an element type.
        if let Some(spec) = self.try_parse_collection_cardinality()? {
            let per_parent = if self.eat_kw("per") {
                Some(self.expect_identifier()?)
            } else {
                None
            };
            if !(self.eat_op("*") || self.eat_kw("of")) {
                return Err(self.error("expected '*' or 'of' after collection cardinality"));
            }
            let (element, _, _) = self.parse_field_type()?;
            return Ok((
                FieldType::Collection {
                    cardinality: spec,
                    element: Box::new(element),
                    per_parent,
                },
                false,
                None,
            ));
        }

        // Fall back to a general expression and classify it.
        let expr = self.parse_expression()?;
        Ok(self.classify_expression_as_field_type(expr))
    }

    fn peek_primitive_kind(&self) -> Option<PrimitiveKind> {
        match &self.peek().kind {
            TokenKind::Keyword(k) => match k.as_str() {
                "int" => Some(PrimitiveKind::Int),
                "decimal" => Some(PrimitiveKind::Decimal),
                "string" => Some(PrimitiveKind::String),
                "boolean" => Some(PrimitiveKind::Boolean),
                "date" => Some(PrimitiveKind::Date),
                _ => None,
            },
            _ => None,
        }
    }

    fn parse_range_operands(&mut self) -> PResult<(Expression, Option<Expression>)> {
        let min = self.parse_additive()?;
        self.expect_op("..")?;
        let max = if self.can_start_expression() {
            Some(self.parse_additive()?)
        } else {
            None
        };
        Ok((min, max))
    }

    fn can_start_expression(&self) -> bool {
        !matches!(
            &self.peek().kind,
            TokenKind::Newline | TokenKind::Eof
        ) && !self.is_op("}")
            && !self.is_op(")")
            && !self.is_op("]")
            && !self.is_kw("when")
            && !self.is_kw("where")
            && !self.is_op("?")
            && !self.is_op("~")
    }

    /// Implements the cardinality-vs-weight/literal ambiguity: a leading
    /// `NUMBER` (or balanced `( expr )`) is only a cardinality if followed
    /// by `*`, `..`, or `per` (spec §4.3).
    fn try_parse_collection_cardinality(&mut self) -> PResult<Option<CardinalitySpec>> {
        if self.is_number() {
            let next_is_cardinality_marker = self.is_op_at(1, "*")
                || self.is_op_at(1, "..")
                || self.is_kw_at(1, "per")
                || self.is_kw_at(1, "of");
            if !next_is_cardinality_marker {
                return Ok(None);
            }
            let n = self.parse_integer_literal()?;
            if self.eat_op("..") {
                let m = self.parse_integer_literal()?;
                return Ok(Some(CardinalitySpec::Range(n, m)));
            }
            return Ok(Some(CardinalitySpec::Fixed(n)));
        }

        if self.is_op("(") {
            if let Some(end) = self.find_matching_paren(self.pos) {
                let after = &self.tokens[(end + 1).min(self.tokens.len() - 1)];
                let is_marker = matches!(&after.kind, TokenKind::Operator(o) if o == "*")
                    || matches!(&after.kind, TokenKind::Keyword(k) if k == "per" || k == "of");
                if is_marker {
                    self.advance(); // (
                    let expr = self.parse_expression()?;
                    self.expect_op(")")?;
                    return Ok(Some(CardinalitySpec::Dynamic(expr)));
                }
            }
        }
        Ok(None)
    }

    fn find_matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0i32;
        let mut i = open;
        while i < self.tokens.len() {
            match &self.tokens[i].kind {
                TokenKind::Operator(o) if o == "(" => depth += 1,
                TokenKind::Operator(o) if o == ")" => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                TokenKind::Eof => return None,
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn parse_integer_literal(&mut self) -> PResult<i64> {
        match &self.peek().kind {
            TokenKind::Number(raw) => {
                let raw = raw.clone();
                self.advance();
                raw.parse::<i64>()
                    .map_err(|_| self.error(format!("expected integer, found '{raw}'")))
            }
            _ => Err(self.error("expected integer")),
        }
    }

    fn classify_expression_as_field_type(&self, expr: Expression) -> (FieldType, bool, Option<Expression>) {
        match &expr {
            Expression::Superposition(opts) => (FieldType::Superposition(opts.clone()), false, None),
            Expression::QualifiedName(q) => (FieldType::Reference(q.clone()), false, None),
            Expression::Identifier(name) => {
                (FieldType::Reference(QualifiedName::single(name.clone())), false, None)
            }
            Expression::Call { callee, args } if !COMPUTED_TRIGGER_FUNCS.contains(&callee.as_str()) => {
                (
                    FieldType::Generator {
                        name: callee.clone(),
                        args: args.clone(),
                    },
                    false,
                    None,
                )
            }
            _ if contains_computed_trigger(&expr) => {
                (FieldType::Expr(expr.clone()), true, Some(expr))
            }
            _ => (FieldType::Expr(expr), false, None),
        }
    }

    // -- context / distribution / dataset -------------------------------------

    fn parse_context(&mut self) -> PResult<ContextDefinition> {
        self.expect_kw("context")?;
        let name = self.expect_identifier()?;
        self.skip_newlines();
        self.expect_op("{")?;
        self.skip_newlines();
        let mut overrides = Vec::new();
        while !self.is_op("}") {
            let field = self.expect_identifier()?;
            self.expect_op(":")?;
            let value = self.parse_expression()?;
            overrides.push((field, value));
            self.skip_newlines();
        }
        self.expect_op("}")?;
        Ok(ContextDefinition { name, overrides })
    }

    fn parse_distribution(&mut self) -> PResult<DistributionDefinition> {
        self.expect_kw("distribution")?;
        let name = self.expect_identifier()?;
        self.skip_newlines();
        self.expect_op("{")?;
        self.skip_newlines();
        let mut buckets = Vec::new();
        while !self.is_op("}") {
            let weight = if self.is_number() && self.is_op_at(1, ":") {
                let w = self.parse_number_literal_f64()?;
                self.expect_op(":")?;
                Some(w)
            } else {
                None
            };
            let value = self.parse_expression()?;
            buckets.push(SuperpositionOption { weight, value });
            self.skip_newlines_and_commas();
        }
        self.expect_op("}")?;
        Ok(DistributionDefinition { name, buckets })
    }

    fn parse_number_literal_f64(&mut self) -> PResult<f64> {
        match &self.peek().kind {
            TokenKind::Number(raw) => {
                let raw = raw.clone();
                self.advance();
                raw.parse::<f64>()
                    .map_err(|_| self.error(format!("invalid number '{raw}'")))
            }
            _ => Err(self.error("expected number")),
        }
    }

    fn parse_dataset(&mut self) -> PResult<DatasetDefinition> {
        self.expect_kw("dataset")?;
        let name = self.expect_identifier()?;
        let violating = self.eat_kw("violating");
        let context_applications = self.parse_context_applications()?;
        self.skip_newlines();
        self.expect_op("{")?;
        self.skip_newlines();

        let mut collections = Vec::new();
        while !self.is_op("}") {
            if self.is_kw("validate") {
                self.skip_validation_block()?;
            } else {
                collections.push(self.parse_collection_definition()?);
            }
            self.skip_newlines();
        }
        self.expect_op("}")?;

        Ok(DatasetDefinition {
            name,
            violating,
            context_applications,
            collections,
        })
    }

    /// `validate { ... }` is read by the external validator, not the core;
    /// the core only needs to skip a balanced block.
    fn skip_validation_block(&mut self) -> PResult<()> {
        self.expect_kw("validate")?;
        self.skip_newlines();
        self.expect_op("{")?;
        let mut depth = 1i32;
        while depth > 0 {
            if self.is_eof() {
                return Err(self.error("unterminated validate block"));
            }
            if self.is_op("{") {
                depth += 1;
            } else if self.is_op("}") {
                depth -= 1;
                if depth == 0 {
                    self.advance();
                    break;
                }
            }
            self.advance();
        }
        Ok(())
    }

    fn parse_collection_definition(&mut self) -> PResult<CollectionDefinition> {
        let name = self.expect_identifier()?;
        self.expect_op(":")?;

        let cardinality = match self.try_parse_collection_cardinality()? {
            Some(spec) => spec,
            None => {
                // A bare number with no marker token still denotes a fixed
                // cardinality at the dataset level (e.g. `items: 3 of P`,
                // where the marker check above requires lookahead past the
                // optional `per` clause too).
                if self.is_number() {
                    CardinalitySpec::Fixed(self.parse_integer_literal()?)
                } else if self.is_op("(") {
                    self.advance();
                    let expr = self.parse_expression()?;
                    self.expect_op(")")?;
                    CardinalitySpec::Dynamic(expr)
                } else {
                    return Err(self.error("expected a collection cardinality"));
                }
            }
        };

        let per_parent = if self.eat_kw("per") {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        self.expect_kw("of")?;
        let schema = QualifiedName {
            parts: self.parse_dotted_path()?,
        };

        let mut overrides = Vec::new();
        if self.eat_kw("with") {
            self.skip_newlines();
            self.expect_op("{")?;
            self.skip_newlines();
            while !self.is_op("}") {
                let field = self.expect_identifier()?;
                self.expect_op(":")?;
                let value = self.parse_expression()?;
                overrides.push((field, value));
                self.skip_newlines_and_commas();
            }
            self.expect_op("}")?;
        }

        Ok(CollectionDefinition {
            name,
            cardinality,
            per_parent,
            schema,
            overrides,
        })
    }

    // -- expressions ------------------------------------------------------

    pub fn parse_expression(&mut self) -> PResult<Expression> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> PResult<Expression> {
        let condition = self.parse_or()?;
        if self.eat_op("?") {
            let if_true = self.parse_ternary()?;
            self.expect_op(":")?;
            let if_false = self.parse_ternary()?;
            return Ok(Expression::Ternary {
                condition: Box::new(condition),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            });
        }
        Ok(condition)
    }

    fn parse_or(&mut self) -> PResult<Expression> {
        let mut left = self.parse_and()?;
        while self.eat_kw("or") {
            let right = self.parse_and()?;
            left = Expression::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expression> {
        let mut left = self.parse_not()?;
        while self.eat_kw("and") {
            let right = self.parse_not()?;
            left = Expression::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expression> {
        if self.eat_kw("not") {
            let operand = self.parse_not()?;
            return Ok(Expression::Not(Box::new(operand)));
        }
        self.parse_superposition()
    }

    fn parse_superposition(&mut self) -> PResult<Expression> {
        let first = self.parse_weighted_option()?;
        if !self.is_op("|") {
            if first.weight.is_none() {
                return Ok(first.value);
            }
            return Ok(Expression::Superposition(vec![first]));
        }
        let mut options = vec![first];
        while self.eat_op("|") {
            self.skip_newlines();
            options.push(self.parse_weighted_option()?);
        }
        Ok(Expression::Superposition(options))
    }

    fn parse_weighted_option(&mut self) -> PResult<SuperpositionOption> {
        // NUMBER COLON -> a weighted option (spec §4.3 ambiguity policy).
        if self.is_number() && self.is_op_at(1, ":") {
            let weight = self.parse_number_literal_f64()?;
            self.expect_op(":")?;
            let value = self.parse_comparison()?;
            return Ok(SuperpositionOption {
                weight: Some(weight),
                value,
            });
        }
        let value = self.parse_comparison()?;
        Ok(SuperpositionOption {
            weight: None,
            value,
        })
    }

    fn parse_comparison(&mut self) -> PResult<Expression> {
        let left = self.parse_range()?;
        let op = if self.eat_op("==") {
            BinaryOp::Eq
        } else if self.eat_op("<=") {
            BinaryOp::Le
        } else if self.eat_op(">=") {
            BinaryOp::Ge
        } else if self.eat_op("<") {
            BinaryOp::Lt
        } else if self.eat_op(">") {
            BinaryOp::Gt
        } else {
            return Ok(left);
        };
        let right = self.parse_range()?;
        Ok(Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_range(&mut self) -> PResult<Expression> {
        let min = self.parse_additive()?;
        if self.eat_op("..") {
            let max = if self.can_start_expression() {
                Some(Box::new(self.parse_additive()?))
            } else {
                None
            };
            return Ok(Expression::Range {
                min: Box::new(min),
                max,
            });
        }
        Ok(min)
    }

    fn parse_additive(&mut self) -> PResult<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.is_op("+") {
                BinaryOp::Add
            } else if self.is_op("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expression> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.is_op("*") {
                BinaryOp::Mul
            } else if self.is_op("/") {
                BinaryOp::Div
            } else if self.is_op("%") {
                BinaryOp::Mod
            } else {
                break;
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expression> {
        if self.eat_op("-") {
            let expr = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        if self.eat_op("+") {
            let expr = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Plus,
                expr: Box::new(expr),
            });
        }
        if self.eat_op("^") {
            let path = self.parse_dotted_path()?;
            return Ok(Expression::ParentReference(path));
        }
        self.parse_call_or_property()
    }

    fn parse_call_or_property(&mut self) -> PResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.is_op("(") {
                let callee = match &expr {
                    Expression::Identifier(name) => name.clone(),
                    Expression::QualifiedName(q) => q.to_string(),
                    _ => break,
                };
                self.advance();
                let mut args = Vec::new();
                if !self.is_op(")") {
                    args.push(self.parse_ternary()?);
                    while self.eat_op(",") {
                        args.push(self.parse_ternary()?);
                    }
                }
                self.expect_op(")")?;
                expr = Expression::Call { callee, args };
            } else if self.is_op(".") && matches!(&self.peek_at(1).kind, TokenKind::Identifier(_)) {
                self.advance();
                let field = self.expect_identifier()?;
                expr = match expr {
                    Expression::Identifier(name) => Expression::QualifiedName(QualifiedName {
                        parts: vec![name, field],
                    }),
                    Expression::QualifiedName(mut q) => {
                        q.parts.push(field);
                        Expression::QualifiedName(q)
                    }
                    other => other,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expression> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Number(raw) => {
                self.advance();
                if raw.contains('.') {
                    Ok(Expression::Literal(Literal::Number(raw.parse().map_err(
                        |_| self.error(format!("invalid number '{raw}'")),
                    )?)))
                } else {
                    Ok(Expression::Literal(Literal::Int(raw.parse().map_err(
                        |_| self.error(format!("invalid integer '{raw}'")),
                    )?)))
                }
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expression::Literal(Literal::Str(s.clone())))
            }
            TokenKind::Keyword(k) if k == "true" => {
                self.advance();
                Ok(Expression::Literal(Literal::Bool(true)))
            }
            TokenKind::Keyword(k) if k == "false" => {
                self.advance();
                Ok(Expression::Literal(Literal::Bool(false)))
            }
            TokenKind::Keyword(k) if k == "null" => {
                self.advance();
                Ok(Expression::Literal(Literal::Null))
            }
            TokenKind::Keyword(k) if k == "any" => self.parse_any_of(),
            TokenKind::Keyword(k) if k == "match" => self.parse_match(),
            TokenKind::Operator(op) if op == "." => {
                self.advance();
                let path = self.parse_dotted_path_after_leading_identifier()?;
                Ok(Expression::ElementProperty(path))
            }
            TokenKind::Operator(op) if op == "(" => {
                self.advance();
                let expr = self.parse_ternary()?;
                self.expect_op(")")?;
                Ok(expr)
            }
            TokenKind::Identifier(_) => {
                let path = self.parse_dotted_path()?;
                if path.len() == 1 {
                    Ok(Expression::Identifier(path.into_iter().next().unwrap()))
                } else {
                    Ok(Expression::QualifiedName(QualifiedName { parts: path }))
                }
            }
            _ => Err(self.error(format!("unexpected token '{}'", tok.lexeme))),
        }
    }

    fn parse_dotted_path_after_leading_identifier(&mut self) -> PResult<Vec<String>> {
        self.parse_dotted_path()
    }

    fn parse_any_of(&mut self) -> PResult<Expression> {
        self.expect_kw("any")?;
        self.expect_kw("of")?;
        let collection = self.parse_comparison()?;
        let condition = if self.eat_kw("where") {
            Some(Box::new(self.parse_ternary()?))
        } else {
            None
        };
        Ok(Expression::AnyOf {
            collection: Box::new(collection),
            condition,
        })
    }

    fn parse_match(&mut self) -> PResult<Expression> {
        self.expect_kw("match")?;
        let subject = self.parse_comparison()?;
        self.skip_newlines();
        self.expect_op("{")?;
        self.skip_newlines();
        let mut arms = Vec::new();
        let mut default = None;
        while !self.is_op("}") {
            if matches!(&self.peek().kind, TokenKind::Identifier(name) if name == "_") {
                self.advance();
                self.expect_op("=>")?;
                default = Some(Box::new(self.parse_ternary()?));
            } else {
                let pattern = self.parse_ternary()?;
                self.expect_op("=>")?;
                let value = self.parse_ternary()?;
                arms.push((pattern, value));
            }
            self.skip_newlines_and_commas();
        }
        self.expect_op("}")?;
        Ok(Expression::Match {
            subject: Box::new(subject),
            arms,
            default,
        })
    }
}

fn contains_computed_trigger(expr: &Expression) -> bool {
    match expr {
        Expression::Literal(_) => false,
        Expression::Identifier(_) | Expression::QualifiedName(_) => true,
        Expression::ElementProperty(_) => false,
        // Operators always mark a field computed, regardless of their operands.
        Expression::Binary { .. }
        | Expression::Logical { .. }
        | Expression::Not(_)
        | Expression::Unary { .. }
        | Expression::Ternary { .. } => true,
        Expression::Range { min, max } => {
            contains_computed_trigger(min) || max.as_deref().is_some_and(contains_computed_trigger)
        }
        Expression::Superposition(opts) => opts.iter().any(|o| contains_computed_trigger(&o.value)),
        Expression::AnyOf { collection, condition } => {
            contains_computed_trigger(collection)
                || condition.as_deref().is_some_and(contains_computed_trigger)
        }
        Expression::ParentReference(_) => true,
        Expression::Match {
            subject,
            arms,
            default,
        } => {
            contains_computed_trigger(subject)
                || arms.iter().any(|(p, v)| contains_computed_trigger(p) || contains_computed_trigger(v))
                || default.as_deref().is_some_and(contains_computed_trigger)
        }
        Expression::Call { callee, args } => {
            COMPUTED_TRIGGER_FUNCS.contains(&callee.as_str())
                || args.iter().any(contains_computed_trigger)
        }
    }
}
