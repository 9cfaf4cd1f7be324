//! SQL structural analyzer.
//!
//! Pure text analysis: turns a raw statement into its primary table and the
//! columns it filters, joins and sorts on, then ranks those columns for
//! composite-index design. Nothing here performs I/O and nothing panics on
//! malformed input; statements the walker cannot place yield empty results.
//!
//! # Module Structure
//! - `lexer`: MySQL tokenization via `sqlparser`, reduced to a small lexeme set
//! - `walker`: recursive descent over clauses, table lists and predicates
//!
//! # Supported Shapes
//! SELECT, UPDATE, DELETE and INSERT statements with a single or joined FROM
//! list, WHERE predicates combined with AND/OR/NOT, `JOIN ... ON/USING`, and
//! ORDER BY. Subqueries are treated as opaque values and CTEs are not
//! resolved.

pub(crate) mod lexer;
pub(crate) mod walker;

#[cfg(test)]
mod tests;

use crate::models::{FieldRef, FieldUsage, SortDirection, StatementShape};
use lexer::{LexKind, lex, significant};
use std::collections::HashMap;
use walker::{ColumnRef, JoinCondition, Parsed, Predicate};

/// Primary table of the outermost FROM clause.
///
/// For joined queries this is the first table of the list. Statements without
/// a FROM clause fall back to their UPDATE or INSERT target. Returns `None`
/// when no table can be resolved, including when the first FROM entry is a
/// derived table.
///
/// # Example
///
/// ```
/// use slowscope_core::analyzer::extract_table;
///
/// assert_eq!(extract_table("SELECT * FROM `shop`.`orders` o").as_deref(), Some("orders"));
/// assert_eq!(extract_table("SELECT 1"), None);
/// ```
pub fn extract_table(sql: &str) -> Option<String> {
    let parsed = Parsed::parse(sql)?;
    primary_factor(&parsed).and_then(|f| f.name.clone())
}

/// Alias to table map of the outermost FROM/JOIN list.
///
/// Keys are lowercased; bare table names map to themselves.
pub fn extract_table_aliases(sql: &str) -> HashMap<String, String> {
    Parsed::parse(sql)
        .map(|parsed| parsed.alias_map())
        .unwrap_or_default()
}

/// Columns compared with a literal or placeholder in the outermost WHERE.
///
/// `=`, `<=>` and `IS NULL` are equality predicates; `>`, `<`, `>=`, `<=`,
/// `<>`, `!=`, `BETWEEN`, `IN`, `LIKE` and `IS NOT NULL` are range
/// predicates. Column-to-column comparisons and subqueries are skipped.
pub fn extract_where_fields(sql: &str) -> Vec<FieldRef> {
    let Some(parsed) = Parsed::parse(sql) else {
        return Vec::new();
    };
    where_fields(&parsed, &parsed.alias_map())
}

/// Both sides of every column pair in `JOIN ... ON` and `JOIN ... USING`.
pub fn extract_join_fields(sql: &str) -> Vec<FieldRef> {
    let Some(parsed) = Parsed::parse(sql) else {
        return Vec::new();
    };
    join_fields(&parsed, &parsed.alias_map())
}

/// ORDER BY columns in appearance order, ascending unless `DESC` is given.
pub fn extract_order_by_fields(sql: &str) -> Vec<FieldRef> {
    let Some(parsed) = Parsed::parse(sql) else {
        return Vec::new();
    };
    order_by_fields(&parsed, &parsed.alias_map())
}

/// Ranks fields for composite-index design.
///
/// Equality columns come first, then range columns, then join columns, then
/// sort-only columns; ties keep appearance order. A column used in several
/// ways is kept once per table at its best tier, so `a.id` and `b.id` stay
/// separate candidates. When `lowercased_sql` is not empty, fields whose
/// column name does not occur in it are dropped.
pub fn sort_fields_by_priority(fields: &[FieldRef], lowercased_sql: &str) -> Vec<FieldRef> {
    let mut best: HashMap<(Option<String>, String), &FieldRef> = HashMap::new();
    for field in fields {
        let column = field.column_key();
        if !lowercased_sql.is_empty() && !lowercased_sql.contains(&column) {
            continue;
        }
        let key = (field.table.as_deref().map(str::to_lowercase), column);
        best.entry(key)
            .and_modify(|current| {
                if (field.usage, field.position) < (current.usage, current.position) {
                    *current = field;
                }
            })
            .or_insert(field);
    }

    let mut ranked: Vec<FieldRef> = best.into_values().cloned().collect();
    ranked.sort_by(|a, b| {
        a.usage
            .cmp(&b.usage)
            .then_with(|| a.position.cmp(&b.position))
    });
    ranked
}

/// Runs every extractor over one statement.
///
/// Returns `None` when the statement has no resolvable table.
pub fn analyze(sql: &str) -> Option<StatementShape> {
    let Some(parsed) = Parsed::parse(sql) else {
        tracing::debug!("Statement could not be tokenized");
        return None;
    };
    let Some(factor) = primary_factor(&parsed) else {
        tracing::debug!("No primary table found in statement");
        return None;
    };
    let table = factor.name.clone()?;
    let database = factor.database.clone();

    let aliases = parsed.alias_map();
    let mut fields = where_fields(&parsed, &aliases);
    fields.extend(join_fields(&parsed, &aliases));
    fields.extend(order_by_fields(&parsed, &aliases));

    let literals = parsed
        .lexemes
        .iter()
        .filter(|l| matches!(l.kind, LexKind::Str | LexKind::Number))
        .map(|l| l.text.clone())
        .collect();

    Some(StatementShape {
        sql: sql.to_string(),
        table: Some(table),
        database,
        fields,
        literals,
    })
}

/// Whether `sql` is a single statement that cannot modify data or take locks.
///
/// Accepts SELECT (without `INTO` or locking clauses), SHOW, DESCRIBE/DESC
/// and EXPLAIN. `EXPLAIN ANALYZE` executes its statement and is only accepted
/// for SELECT.
pub fn is_read_only(sql: &str) -> bool {
    let Some(lexemes) = lex(sql) else {
        return false;
    };
    let sig = significant(&lexemes);
    let words: Vec<&lexer::Lexeme> = sig.iter().map(|&i| &lexemes[i]).collect();

    // one statement only; a trailing semicolon is fine
    let mut depth = 0usize;
    for (i, l) in words.iter().enumerate() {
        match l.kind {
            LexKind::LParen => depth += 1,
            LexKind::RParen => depth = depth.saturating_sub(1),
            LexKind::Semicolon if i + 1 < words.len() => return false,
            _ => {}
        }
        if depth == 0 && (l.is_kw("INTO") || l.is_kw("LOCK")) {
            return false;
        }
        if depth == 0
            && l.is_kw("FOR")
            && words
                .get(i + 1)
                .is_some_and(|n| n.is_kw("UPDATE") || n.text.eq_ignore_ascii_case("SHARE"))
        {
            return false;
        }
    }

    let mut rest = words
        .iter()
        .skip_while(|l| l.kind == LexKind::LParen)
        .copied();
    let Some(first) = rest.next() else {
        return false;
    };
    if first.is_kw("SELECT") || first.is_kw("SHOW") || first.is_kw("DESCRIBE") || first.is_kw("DESC")
    {
        return true;
    }
    if first.is_kw("EXPLAIN") {
        let mut rest = rest.peekable();
        let analyze = rest.peek().is_some_and(|l| l.text.eq_ignore_ascii_case("ANALYZE"));
        if !analyze {
            return true;
        }
        rest.next();
        return rest
            .find(|l| matches!(l.kind, LexKind::Word { .. }) && l.is_reserved())
            .is_some_and(|l| l.is_kw("SELECT"));
    }
    false
}

fn primary_factor(parsed: &Parsed) -> Option<&walker::TableFactor> {
    parsed
        .from_tables
        .first()
        .or_else(|| parsed.target_tables.first())
}

/// Table of a column reference. Unqualified columns belong to the only
/// table of a single-table statement and stay unresolved otherwise.
fn resolve_table(column: &ColumnRef, aliases: &HashMap<String, String>) -> Option<String> {
    match &column.qualifier {
        Some(qualifier) => Some(
            aliases
                .get(&qualifier.to_lowercase())
                .cloned()
                .unwrap_or_else(|| qualifier.clone()),
        ),
        None => {
            let mut tables = aliases.values();
            let first = tables.next()?;
            tables
                .all(|t| t.eq_ignore_ascii_case(first))
                .then(|| first.clone())
        }
    }
}

fn where_fields(parsed: &Parsed, aliases: &HashMap<String, String>) -> Vec<FieldRef> {
    parsed
        .where_predicates()
        .into_iter()
        .filter_map(|predicate| match predicate {
            Predicate::ColumnValue { column, equality } => {
                let usage = if equality {
                    FieldUsage::Equality
                } else {
                    FieldUsage::Range
                };
                let table = resolve_table(&column, aliases);
                Some(FieldRef::new(column.name, usage, column.pos).with_table(table))
            }
            Predicate::ColumnColumn { .. } => None,
        })
        .collect()
}

fn join_fields(parsed: &Parsed, aliases: &HashMap<String, String>) -> Vec<FieldRef> {
    let mut fields = Vec::new();
    for join in &parsed.joins {
        match &join.condition {
            JoinCondition::On(range) => {
                for predicate in parsed.on_predicates(range.clone()) {
                    if let Predicate::ColumnColumn { left, right } = predicate {
                        for side in [left, right] {
                            let table = resolve_table(&side, aliases);
                            fields.push(
                                FieldRef::new(side.name, FieldUsage::Join, side.pos)
                                    .with_table(table),
                            );
                        }
                    }
                }
            }
            JoinCondition::Using(columns) => {
                let left = parsed.from_tables.get(join.left).and_then(|f| f.name.clone());
                let right = parsed.from_tables.get(join.right).and_then(|f| f.name.clone());
                for (column, pos) in columns {
                    fields.push(
                        FieldRef::new(column.clone(), FieldUsage::Join, *pos)
                            .with_table(left.clone()),
                    );
                    fields.push(
                        FieldRef::new(column.clone(), FieldUsage::Join, *pos)
                            .with_table(right.clone()),
                    );
                }
            }
        }
    }
    fields
}

fn order_by_fields(parsed: &Parsed, aliases: &HashMap<String, String>) -> Vec<FieldRef> {
    parsed
        .order_items()
        .into_iter()
        .map(|(column, descending)| {
            let direction = if descending {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            let table = resolve_table(&column, aliases);
            FieldRef::new(column.name, FieldUsage::OrderBy, column.pos)
                .with_table(table)
                .with_direction(direction)
        })
        .collect()
}
