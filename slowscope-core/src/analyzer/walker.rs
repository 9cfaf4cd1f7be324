//! Recursive-descent walker over lexemes.
//!
//! The walker understands the outermost clause layout of SELECT, UPDATE,
//! DELETE and INSERT statements, table lists with joins, and boolean
//! predicate trees. Parenthesized subqueries are skipped as opaque values.
//! Anything it cannot place is stepped over rather than rejected, so malformed
//! input degrades to fewer findings instead of an error.

use super::lexer::{CmpOp, LexKind, Lexeme, lex, significant};
use std::collections::HashMap;
use std::ops::Range;

/// Keywords that end a clause at depth 0.
const CLAUSE_BOUNDARIES: &[&str] = &[
    "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "SET", "UNION", "EXCEPT",
    "INTERSECT", "FOR", "LOCK", "INTO", "VALUES", "WINDOW",
];

/// Keywords that start a join operator inside a table list.
const JOIN_WORDS: &[&str] = &[
    "JOIN", "INNER", "CROSS", "LEFT", "RIGHT", "FULL", "NATURAL", "STRAIGHT_JOIN",
];

/// Statement verb of the outermost statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verb {
    Select,
    Update,
    Delete,
    Insert,
    Other,
}

/// One entry of a table list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableFactor {
    /// `None` for derived tables and parenthesized join groups
    pub(crate) name: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) alias: Option<String>,
    /// Significant-token index of the table name
    pub(crate) name_pos: Option<usize>,
    /// Significant-token index of the database qualifier
    pub(crate) database_pos: Option<usize>,
    /// Significant-token index of the alias
    pub(crate) alias_pos: Option<usize>,
}

/// Join condition attached to a table factor.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JoinCondition {
    On(Range<usize>),
    Using(Vec<(String, usize)>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JoinSpec {
    /// Index into the table list of the joined factor
    pub(crate) right: usize,
    /// Index of the factor immediately to its left
    pub(crate) left: usize,
    pub(crate) condition: JoinCondition,
}

/// A column reference inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnRef {
    pub(crate) qualifier: Option<String>,
    pub(crate) name: String,
    pub(crate) pos: usize,
}

/// Comparison found while walking a predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    /// Column compared with a literal, placeholder or constant expression
    ColumnValue { column: ColumnRef, equality: bool },
    /// Column compared with another column
    ColumnColumn { left: ColumnRef, right: ColumnRef },
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Column(ColumnRef),
    Value,
    Expr,
}

/// Outermost structure of a statement.
#[derive(Debug, Clone)]
pub(crate) struct Parsed {
    pub(crate) lexemes: Vec<Lexeme>,
    pub(crate) sig: Vec<usize>,
    pub(crate) verb: Verb,
    /// Factors of the outermost FROM clause (with joins)
    pub(crate) from_tables: Vec<TableFactor>,
    pub(crate) joins: Vec<JoinSpec>,
    /// UPDATE or INSERT target tables
    pub(crate) target_tables: Vec<TableFactor>,
    pub(crate) where_range: Option<Range<usize>>,
    pub(crate) order_range: Option<Range<usize>>,
}

impl Parsed {
    /// Tokenizes and walks `sql`. `None` only when tokenization fails.
    pub(crate) fn parse(sql: &str) -> Option<Self> {
        let lexemes = lex(sql)?;
        let sig = significant(&lexemes);
        let mut parsed = Self {
            lexemes,
            sig,
            verb: Verb::Other,
            from_tables: Vec::new(),
            joins: Vec::new(),
            target_tables: Vec::new(),
            where_range: None,
            order_range: None,
        };
        parsed.walk_outermost();
        Some(parsed)
    }

    pub(crate) fn lexeme(&self, sig_idx: usize) -> &Lexeme {
        &self.lexemes[self.sig[sig_idx]]
    }

    fn cursor(&self, range: Range<usize>) -> Cursor<'_> {
        Cursor::new(&self.lexemes, &self.sig, range)
    }

    fn walk_outermost(&mut self) {
        let len = self.sig.len();
        let mut start = 0;

        // EXPLAIN wraps the statement it describes
        if self.sig.first().is_some_and(|_| self.lexeme(0).is_kw("EXPLAIN")) {
            start = (1..len)
                .find(|&i| {
                    let l = self.lexeme(i);
                    ["SELECT", "UPDATE", "DELETE", "INSERT", "REPLACE"]
                        .iter()
                        .any(|kw| l.is_kw(kw))
                })
                .unwrap_or(len);
        }
        if start >= len {
            return;
        }

        let first = self.lexeme(start);
        self.verb = if first.is_kw("SELECT") {
            Verb::Select
        } else if first.is_kw("UPDATE") {
            Verb::Update
        } else if first.is_kw("DELETE") {
            Verb::Delete
        } else if first.is_kw("INSERT") || first.is_kw("REPLACE") {
            Verb::Insert
        } else {
            Verb::Other
        };
        if self.verb == Verb::Other {
            return;
        }

        let marks = self.clause_marks(start);
        let next_mark = |after: usize| {
            marks
                .iter()
                .map(|(_, i)| *i)
                .find(|&i| i > after)
                .unwrap_or(len)
        };
        let first_mark = |kw: &str| marks.iter().find(|(k, _)| *k == kw).map(|(_, i)| *i);

        if let Some(from) = first_mark("FROM") {
            let mut cur = self.cursor(from + 1..next_mark(from));
            let (tables, joins) = cur.table_list();
            self.from_tables = tables;
            self.joins = joins;
        }

        match self.verb {
            Verb::Update => {
                let end = first_mark("SET").unwrap_or(len);
                let mut cur = self.cursor(start + 1..end);
                cur.skip_modifiers();
                let (tables, joins) = cur.table_list();
                self.target_tables = tables;
                if self.from_tables.is_empty() {
                    self.joins = joins;
                }
            }
            Verb::Insert => {
                if let Some(into) = first_mark("INTO") {
                    let mut cur = self.cursor(into + 1..next_mark(into));
                    if let Some(factor) = cur.table_factor() {
                        self.target_tables.push(factor);
                    }
                }
            }
            _ => {}
        }

        if let Some(w) = first_mark("WHERE") {
            self.where_range = Some(w + 1..next_mark(w));
        }
        if let Some(o) = first_mark("ORDER") {
            self.order_range = Some(o + 2..next_mark(o));
        }
    }

    /// Depth-0 clause keywords of the first query block, in order.
    fn clause_marks(&self, start: usize) -> Vec<(&'static str, usize)> {
        let mut marks = Vec::new();
        let mut depth = 0usize;
        for i in start + 1..self.sig.len() {
            let l = self.lexeme(i);
            match l.kind {
                LexKind::LParen => depth = depth.saturating_add(1),
                LexKind::RParen => depth = depth.saturating_sub(1),
                LexKind::Semicolon if depth == 0 => {
                    marks.push(("", i));
                    break;
                }
                _ => {}
            }
            if depth != 0 {
                continue;
            }
            let Some(kw) = CLAUSE_BOUNDARIES.iter().find(|kw| l.is_kw(kw)) else {
                continue;
            };
            let needs_by = *kw == "GROUP" || *kw == "ORDER";
            if needs_by && !self.sig.get(i + 1).is_some_and(|_| self.lexeme(i + 1).is_kw("BY")) {
                continue;
            }
            marks.push((*kw, i));
            if matches!(*kw, "UNION" | "EXCEPT" | "INTERSECT") {
                break;
            }
        }
        marks
    }

    /// Predicates of the outermost WHERE clause.
    pub(crate) fn where_predicates(&self) -> Vec<Predicate> {
        self.where_range
            .clone()
            .map(|range| self.cursor(range).predicates())
            .unwrap_or_default()
    }

    /// Predicates of one ON clause.
    pub(crate) fn on_predicates(&self, range: Range<usize>) -> Vec<Predicate> {
        self.cursor(range).predicates()
    }

    /// Columns of the outermost ORDER BY with their direction.
    pub(crate) fn order_items(&self) -> Vec<(ColumnRef, bool)> {
        let Some(range) = self.order_range.clone() else {
            return Vec::new();
        };
        let mut cur = self.cursor(range);
        let mut items = Vec::new();
        while !cur.at_end() {
            let operand = cur.operand();
            let mut descending = false;
            if cur.eat_kw("DESC") {
                descending = true;
            } else {
                cur.eat_kw("ASC");
            }
            if let Operand::Column(column) = operand {
                items.push((column, descending));
            }
            // skip to the next item
            while !cur.at_end() && !cur.eat(&LexKind::Comma) {
                cur.skip_one();
            }
        }
        items
    }

    /// Alias (or bare table name) to table name, keys lowercased.
    pub(crate) fn alias_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for factor in self.from_tables.iter().chain(&self.target_tables) {
            if let Some(name) = &factor.name {
                map.insert(name.to_lowercase(), name.clone());
                if let Some(alias) = &factor.alias {
                    map.insert(alias.to_lowercase(), name.clone());
                }
            }
        }
        map
    }

    /// Table lists at any depth, used by the masker to find every table name.
    pub(crate) fn all_table_factors(&self) -> Vec<TableFactor> {
        let len = self.sig.len();
        let mut factors = Vec::new();
        for i in 0..len {
            let l = self.lexeme(i);
            let starts_list = l.is_kw("FROM") || l.is_kw("UPDATE") || l.is_kw("TABLE");
            let starts_single = l.is_kw("INTO") || l.is_kw("JOIN") || l.is_kw("STRAIGHT_JOIN");
            if !starts_list && !starts_single {
                continue;
            }
            // FROM inside EXTRACT(... FROM ...) or TRIM(... FROM ...) is not a table list
            if l.is_kw("FROM") && self.inside_function_call(i) {
                continue;
            }
            let mut cur = self.cursor(i + 1..len);
            if starts_list {
                cur.skip_modifiers();
                let (tables, _) = cur.table_list();
                factors.extend(tables);
            } else if let Some(factor) = cur.table_factor() {
                factors.push(factor);
            }
        }
        factors
    }

    fn inside_function_call(&self, at: usize) -> bool {
        let mut depth = 0usize;
        for i in (0..at).rev() {
            match self.lexeme(i).kind {
                LexKind::RParen => depth += 1,
                LexKind::LParen if depth > 0 => depth -= 1,
                LexKind::LParen => {
                    // a subquery opens with SELECT; a function call follows a word
                    let opens_select = i + 1 < self.sig.len() && self.lexeme(i + 1).is_kw("SELECT");
                    let after_word = i > 0
                        && matches!(self.lexeme(i - 1).kind, LexKind::Word { .. })
                        && !self.lexeme(i - 1).is_reserved();
                    return !opens_select && after_word;
                }
                _ => {}
            }
        }
        false
    }
}

/// Cursor over a range of significant-token indices.
struct Cursor<'a> {
    lexemes: &'a [Lexeme],
    sig: &'a [usize],
    pos: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    fn new(lexemes: &'a [Lexeme], sig: &'a [usize], range: Range<usize>) -> Self {
        Self {
            lexemes,
            sig,
            pos: range.start,
            end: range.end.min(sig.len()),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Lexeme> {
        let idx = self.pos + offset;
        if idx < self.end {
            Some(&self.lexemes[self.sig[idx]])
        } else {
            None
        }
    }

    fn peek(&self) -> Option<&'a Lexeme> {
        self.peek_at(0)
    }

    fn bump(&mut self) {
        if self.pos < self.end {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: &LexKind) -> bool {
        if self.peek().is_some_and(|l| &l.kind == kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|l| l.is_kw(keyword)) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn check_kw(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|l| l.is_kw(keyword))
    }

    /// Position just past the parenthesis group starting at the cursor.
    fn group_end(&self) -> usize {
        let mut depth = 0usize;
        let mut i = self.pos;
        while i < self.end {
            match self.lexemes[self.sig[i]].kind {
                LexKind::LParen => depth += 1,
                LexKind::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return i + 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        self.end
    }

    fn skip_group(&mut self) {
        self.pos = self.group_end();
    }

    /// Skips one token, or a whole group when it opens a parenthesis.
    fn skip_one(&mut self) {
        if self.peek().is_some_and(|l| l.kind == LexKind::LParen) {
            self.skip_group();
        } else {
            self.bump();
        }
    }

    /// Whether the group at the cursor is a subquery.
    fn at_subquery(&self) -> bool {
        self.peek().is_some_and(|l| l.kind == LexKind::LParen)
            && self.peek_at(1).is_some_and(|l| l.is_kw("SELECT") || l.is_kw("WITH"))
    }

    fn skip_modifiers(&mut self) {
        while ["LOW_PRIORITY", "IGNORE", "QUICK", "HIGH_PRIORITY"]
            .iter()
            .any(|kw| self.check_kw(kw))
        {
            self.bump();
        }
    }

    fn at_join_word(&self) -> bool {
        self.peek().is_some_and(|l| JOIN_WORDS.iter().any(|kw| l.is_kw(kw)))
            && !self.peek_at(1).is_some_and(|l| l.kind == LexKind::LParen)
    }

    // ---------------------------------------------------------------------
    // Table lists
    // ---------------------------------------------------------------------

    fn table_list(&mut self) -> (Vec<TableFactor>, Vec<JoinSpec>) {
        let mut tables = Vec::new();
        let mut joins = Vec::new();

        let Some(first) = self.table_factor() else {
            return (tables, joins);
        };
        tables.push(first);

        loop {
            if self.eat(&LexKind::Comma) {
                match self.table_factor() {
                    Some(factor) => tables.push(factor),
                    None => break,
                }
                continue;
            }
            if !self.at_join_word() {
                break;
            }
            while self.at_join_word() || self.check_kw("OUTER") {
                self.bump();
            }
            let Some(factor) = self.table_factor() else {
                break;
            };
            tables.push(factor);
            let right = tables.len() - 1;
            let left = right.saturating_sub(1);

            if self.eat_kw("ON") {
                let start = self.pos;
                let mut depth = 0usize;
                while let Some(l) = self.peek() {
                    match l.kind {
                        LexKind::LParen => depth += 1,
                        LexKind::RParen => depth = depth.saturating_sub(1),
                        LexKind::Comma if depth == 0 => break,
                        _ => {}
                    }
                    if depth == 0 && self.at_join_word() {
                        break;
                    }
                    self.bump();
                }
                joins.push(JoinSpec {
                    right,
                    left,
                    condition: JoinCondition::On(start..self.pos),
                });
            } else if self.eat_kw("USING") {
                let mut columns = Vec::new();
                if self.peek().is_some_and(|l| l.kind == LexKind::LParen) {
                    let group_end = self.group_end();
                    self.bump();
                    while self.pos < group_end.saturating_sub(1) {
                        if let Some(name) = self.peek().and_then(Lexeme::ident) {
                            columns.push((name.to_string(), self.pos));
                        }
                        self.bump();
                    }
                    self.pos = group_end;
                }
                joins.push(JoinSpec {
                    right,
                    left,
                    condition: JoinCondition::Using(columns),
                });
            }
        }
        (tables, joins)
    }

    fn table_factor(&mut self) -> Option<TableFactor> {
        let first = self.peek()?;
        let mut factor = TableFactor {
            name: None,
            database: None,
            alias: None,
            name_pos: None,
            database_pos: None,
            alias_pos: None,
        };

        if first.kind == LexKind::LParen {
            self.skip_group();
        } else {
            let name = first.ident()?.to_string();
            factor.name = Some(name);
            factor.name_pos = Some(self.pos);
            self.bump();
            if self.peek().is_some_and(|l| l.kind == LexKind::Period) {
                if let Some(table) = self.peek_at(1).and_then(Lexeme::ident) {
                    factor.database = factor.name.take();
                    factor.database_pos = factor.name_pos.take();
                    factor.name = Some(table.to_string());
                    factor.name_pos = Some(self.pos + 1);
                    self.bump();
                    self.bump();
                }
            }
            if self.check_kw("PARTITION") {
                self.bump();
                self.skip_one();
            }
        }

        let explicit_alias = self.eat_kw("AS");
        if let Some(alias) = self.peek().and_then(Lexeme::ident)
            && (explicit_alias || !self.peek_at(1).is_some_and(|l| l.kind == LexKind::LParen))
        {
            factor.alias = Some(alias.to_string());
            factor.alias_pos = Some(self.pos);
            self.bump();
        }

        // index hints: USE|IGNORE|FORCE {INDEX|KEY} [FOR ...] (list)
        while ["USE", "IGNORE", "FORCE"].iter().any(|kw| self.check_kw(kw))
            && self.peek_at(1).is_some_and(|l| l.is_kw("INDEX") || l.is_kw("KEY"))
        {
            while !self.at_end() && !self.peek().is_some_and(|l| l.kind == LexKind::LParen) {
                self.bump();
            }
            self.skip_group();
        }

        Some(factor)
    }

    // ---------------------------------------------------------------------
    // Predicates
    // ---------------------------------------------------------------------

    fn predicates(&mut self) -> Vec<Predicate> {
        let mut out = Vec::new();
        while !self.at_end() {
            let before = self.pos;
            self.or_expr(&mut out);
            if self.pos == before {
                self.skip_one();
            }
        }
        out
    }

    fn or_expr(&mut self, out: &mut Vec<Predicate>) {
        self.and_expr(out);
        while self.eat_kw("OR") || self.eat_kw("XOR") {
            self.and_expr(out);
        }
    }

    fn and_expr(&mut self, out: &mut Vec<Predicate>) {
        self.not_expr(out);
        while self.eat_kw("AND") {
            self.not_expr(out);
        }
    }

    fn not_expr(&mut self, out: &mut Vec<Predicate>) {
        if self.eat_kw("NOT") {
            self.not_expr(out);
        } else {
            self.predicate(out);
        }
    }

    fn predicate(&mut self, out: &mut Vec<Predicate>) {
        let Some(first) = self.peek() else {
            return;
        };

        // boolean grouping: ( a = 1 OR b = 2 )
        if first.kind == LexKind::LParen && !self.at_subquery() {
            let group_end = self.group_end();
            let mut inner = Cursor {
                lexemes: self.lexemes,
                sig: self.sig,
                pos: self.pos + 1,
                end: group_end.saturating_sub(1),
            };
            out.extend(inner.predicates());
            self.pos = group_end;
            // (a + 1) > 5 and similar: the group was an operand
            self.predicate_tail(Operand::Expr, out);
            return;
        }

        let left = self.operand();
        self.predicate_tail(left, out);
    }

    fn predicate_tail(&mut self, left: Operand, out: &mut Vec<Predicate>) {
        self.eat_kw("NOT");
        let Some(next) = self.peek() else {
            return;
        };

        if let LexKind::Cmp(op) = next.kind {
            self.bump();
            // col = ANY (subquery)
            if self.check_kw("ANY") || self.check_kw("SOME") || self.check_kw("ALL") {
                self.bump();
            }
            let right = self.operand();
            emit_comparison(left, op, right, out);
        } else if next.is_kw("IS") {
            self.bump();
            let negated = self.eat_kw("NOT");
            let is_null = self.check_kw("NULL");
            if is_null || self.check_kw("TRUE") || self.check_kw("FALSE") || self.check_kw("UNKNOWN")
            {
                self.bump();
            }
            if let Operand::Column(column) = left {
                out.push(Predicate::ColumnValue {
                    column,
                    equality: is_null && !negated,
                });
            }
        } else if next.is_kw("BETWEEN") {
            self.bump();
            self.operand();
            self.eat_kw("AND");
            self.operand();
            emit_range(left, out);
        } else if next.is_kw("IN") {
            self.bump();
            if self.peek().is_some_and(|l| l.kind == LexKind::LParen) {
                self.skip_group();
            }
            emit_range(left, out);
        } else if next.is_kw("LIKE") || next.is_kw("RLIKE") || next.is_kw("REGEXP") {
            self.bump();
            self.operand();
            if self.eat_kw("ESCAPE") {
                self.operand();
            }
            emit_range(left, out);
        }
    }

    // ---------------------------------------------------------------------
    // Operands
    // ---------------------------------------------------------------------

    fn operand(&mut self) -> Operand {
        let mut result = self.primary();
        while let Some(next) = self.peek() {
            let arithmetic = matches!(
                next.kind,
                LexKind::Star | LexKind::Minus | LexKind::Other
            ) || next.is_kw("DIV")
                || next.is_kw("MOD");
            if !arithmetic {
                break;
            }
            self.bump();
            let rhs = self.primary();
            result = match (result, rhs) {
                (Operand::Value, Operand::Value) => Operand::Value,
                _ => Operand::Expr,
            };
        }
        result
    }

    fn primary(&mut self) -> Operand {
        let Some(l) = self.peek() else {
            return Operand::Expr;
        };

        if l.kind == LexKind::Minus {
            self.bump();
            return self.primary();
        }
        if l.is_literal() {
            self.bump();
            return Operand::Value;
        }
        if ["NULL", "TRUE", "FALSE"].iter().any(|kw| l.is_kw(kw))
            || (l.is_kw("CURRENT_TIMESTAMP") || l.is_kw("CURRENT_DATE") || l.is_kw("CURRENT_TIME"))
                && !self.peek_at(1).is_some_and(|n| n.kind == LexKind::LParen)
        {
            self.bump();
            return Operand::Value;
        }
        if l.is_kw("INTERVAL") {
            self.bump();
            let value = self.primary();
            // unit
            self.bump();
            return value;
        }
        if l.is_kw("CASE") {
            self.skip_case();
            return Operand::Expr;
        }
        if l.is_kw("EXISTS") {
            self.bump();
            self.skip_group();
            return Operand::Expr;
        }
        if l.kind == LexKind::LParen {
            if self.at_subquery() {
                self.skip_group();
                return Operand::Value;
            }
            let end = self.group_end();
            let has_column = (self.pos + 1..end.saturating_sub(1))
                .any(|i| self.lexemes[self.sig[i]].ident().is_some());
            self.pos = end;
            return if has_column { Operand::Expr } else { Operand::Value };
        }
        if matches!(l.kind, LexKind::Word { .. })
            && self.peek_at(1).is_some_and(|n| n.kind == LexKind::LParen)
        {
            // function call; arguments are not predicate fields
            self.bump();
            self.skip_group();
            return Operand::Value;
        }
        if l.ident().is_some() {
            return Operand::Column(self.column_ref());
        }

        self.bump();
        Operand::Expr
    }

    /// `name`, `qualifier.name` or `db.table.name`.
    fn column_ref(&mut self) -> ColumnRef {
        let mut parts = Vec::new();
        let mut last_pos = self.pos;
        loop {
            let Some(name) = self.peek().and_then(Lexeme::ident) else {
                break;
            };
            parts.push(name.to_string());
            last_pos = self.pos;
            self.bump();
            if self.peek().is_some_and(|l| l.kind == LexKind::Period)
                && self.peek_at(1).is_some_and(|l| l.ident().is_some())
            {
                self.bump();
            } else {
                break;
            }
        }
        let name = parts.pop().unwrap_or_default();
        ColumnRef {
            qualifier: parts.pop(),
            name,
            pos: last_pos,
        }
    }

    fn skip_case(&mut self) {
        let mut depth = 0usize;
        while let Some(l) = self.peek() {
            if l.is_kw("CASE") {
                depth += 1;
            } else if l.is_kw("END") {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    self.bump();
                    return;
                }
            }
            self.skip_one();
        }
    }
}

fn emit_comparison(left: Operand, op: CmpOp, right: Operand, out: &mut Vec<Predicate>) {
    let equality = op.is_equality();
    match (left, right) {
        (Operand::Column(left), Operand::Column(right)) => {
            out.push(Predicate::ColumnColumn { left, right });
        }
        (Operand::Column(column), Operand::Value) | (Operand::Value, Operand::Column(column)) => {
            out.push(Predicate::ColumnValue { column, equality });
        }
        _ => {}
    }
}

fn emit_range(left: Operand, out: &mut Vec<Predicate>) {
    if let Operand::Column(column) = left {
        out.push(Predicate::ColumnValue {
            column,
            equality: false,
        });
    }
}
