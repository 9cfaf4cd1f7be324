//! Statement and DDL masking.
//!
//! Both maskers work on the analyzer's lexeme stream and render it back with
//! selected lexemes replaced, so keywords, operators, spacing and clause
//! structure come out exactly as they went in. Comments are dropped because
//! they can carry anything.

use super::{MASKED_NUMBER, MASKED_STRING, MaskingSession, NameKind};
use crate::analyzer::lexer::{LexKind, Lexeme, lex, significant};
use crate::analyzer::walker::Parsed;
use crate::error::SlowscopeError;
use crate::Result;
use std::collections::{HashMap, HashSet};

/// Output of [`MaskingSession::mask_sql`] for input the tokenizer rejects.
pub const REDACTED_STATEMENT: &str = "/* statement redacted: not tokenizable */";

/// Non-reserved words that are syntax rather than names.
const KEEP_WORDS: &[&str] = &[
    "ACTION", "AGAINST", "ANY", "BINARY", "BOOLEAN", "BTREE", "CASCADE", "CHAR", "CHARACTER",
    "CHARSET", "COLLATE", "CURRENT", "DAY", "DAY_HOUR", "DAY_MINUTE", "DAY_SECOND", "DUAL",
    "FOLLOWING", "HASH", "HOUR", "HOUR_MINUTE", "HOUR_SECOND", "MICROSECOND", "MINUTE",
    "MINUTE_SECOND", "MODE", "MONTH", "NO", "OVER", "PARTITION", "PRECEDING", "QUARTER",
    "RANGE", "RESTRICT", "ROLLUP", "ROW", "ROWS", "SECOND", "SEPARATOR", "SIGNED", "SOME",
    "UNBOUNDED", "UNSIGNED", "WEEK", "YEAR", "YEAR_MONTH",
];

/// Words opening an index or constraint definition inside CREATE TABLE.
const DDL_INDEX_WORDS: &[&str] = &[
    "CHECK", "CONSTRAINT", "FOREIGN", "FULLTEXT", "INDEX", "KEY", "PRIMARY", "SPATIAL", "UNIQUE",
];

fn is_keep_word(lexeme: &Lexeme) -> bool {
    match &lexeme.kind {
        LexKind::Word { value, quote: None } => {
            KEEP_WORDS.iter().any(|kw| value.eq_ignore_ascii_case(kw))
        }
        _ => false,
    }
}

/// Renders `lexeme` as `token`, keeping identifier quotes.
fn quoted_like(lexeme: &Lexeme, token: &str) -> String {
    match &lexeme.kind {
        LexKind::Word {
            quote: Some(quote), ..
        } => {
            let close = if *quote == '[' { ']' } else { *quote };
            format!("{}{}{}", quote, token, close)
        }
        _ => token.to_string(),
    }
}

fn render(lexemes: &[Lexeme], replacements: &HashMap<usize, String>) -> String {
    let mut out = String::new();
    for (i, lexeme) in lexemes.iter().enumerate() {
        if let Some(replacement) = replacements.get(&i) {
            out.push_str(replacement);
        } else if lexeme.kind == LexKind::Space && !lexeme.text.trim().is_empty() {
            // a comment
            out.push(' ');
        } else {
            out.push_str(&lexeme.text);
        }
    }
    out
}

fn literal_mask(lexeme: &Lexeme) -> Option<&'static str> {
    match lexeme.kind {
        LexKind::Str => Some(MASKED_STRING),
        LexKind::Number => Some(MASKED_NUMBER),
        _ => None,
    }
}

impl MaskingSession {
    /// Masks literals and names in one statement.
    ///
    /// Table and database names are replaced wherever they appear, column
    /// names too unless column masking is off. Aliases, function names and
    /// keywords stay as written, and so do `?` placeholders.
    ///
    /// Input the tokenizer rejects is replaced by [`REDACTED_STATEMENT`].
    ///
    /// # Errors
    /// `MaskingCollision` when a name equals a token already issued for
    /// another name in this run.
    pub fn mask_sql(&mut self, sql: &str) -> Result<String> {
        let Some(parsed) = Parsed::parse(sql) else {
            tracing::warn!("Statement could not be tokenized, redacting it");
            return Ok(REDACTED_STATEMENT.to_string());
        };
        let sig = &parsed.sig;
        let lexemes = &parsed.lexemes;
        let word_at = |i: usize| sig.get(i).map(|&idx| &lexemes[idx]);

        // names fixed by their position in a table list
        let mut roles: HashMap<usize, NameKind> = HashMap::new();
        let mut table_names: HashSet<String> = HashSet::new();
        let mut aliases: HashSet<String> = HashSet::new();
        for factor in parsed.all_table_factors() {
            if let (Some(pos), Some(name)) = (factor.name_pos, &factor.name) {
                if name.eq_ignore_ascii_case("DUAL") {
                    continue;
                }
                roles.insert(pos, NameKind::Table);
                table_names.insert(name.to_lowercase());
            }
            if let Some(pos) = factor.database_pos {
                roles.insert(pos, NameKind::Database);
            }
            if let Some(alias) = &factor.alias {
                aliases.insert(alias.to_lowercase());
            }
        }
        // column aliases may be referenced again in GROUP BY, HAVING or ORDER BY
        for i in 1..sig.len() {
            if let (Some(prev), Some(name)) = (word_at(i - 1), word_at(i).and_then(Lexeme::ident))
                && prev.is_kw("AS")
                && !table_names.contains(&name.to_lowercase())
            {
                aliases.insert(name.to_lowercase());
            }
        }

        let mut replacements: HashMap<usize, String> = HashMap::new();
        for (i, &idx) in sig.iter().enumerate() {
            let lexeme = &lexemes[idx];
            if let Some(mask) = literal_mask(lexeme) {
                replacements.insert(idx, mask.to_string());
                continue;
            }
            let Some(value) = lexeme.ident() else {
                continue;
            };
            if is_keep_word(lexeme) && !roles.contains_key(&i) {
                continue;
            }

            let prev = i.checked_sub(1).and_then(|p| word_at(p));
            let next = word_at(i + 1);
            let after_period = prev.is_some_and(|p| p.kind == LexKind::Period);
            let before_period = next.is_some_and(|n| n.kind == LexKind::Period);
            let key = value.to_lowercase();

            let kind = if let Some(kind) = roles.get(&i) {
                Some(*kind)
            } else if next.is_some_and(|n| n.kind == LexKind::LParen) && !after_period {
                // function call
                None
            } else if prev.is_some_and(|p| p.is_kw("AS")) {
                // alias definition
                None
            } else if before_period && !after_period {
                // qualifier of `q.col` or `db.table.col`
                let three_part = word_at(i + 3).is_some_and(|n| n.kind == LexKind::Period);
                if three_part {
                    Some(NameKind::Database)
                } else if aliases.contains(&key) && !table_names.contains(&key) {
                    None
                } else {
                    Some(NameKind::Table)
                }
            } else if before_period && after_period {
                // middle of `db.table.col`
                Some(NameKind::Table)
            } else if after_period {
                Some(NameKind::Column)
            } else if aliases.contains(&key) {
                None
            } else if table_names.contains(&key) {
                Some(NameKind::Table)
            } else {
                Some(NameKind::Column)
            };

            let Some(kind) = kind else {
                continue;
            };
            if kind == NameKind::Column && !self.mask_columns {
                continue;
            }
            let token = self.mask_name(kind, value)?;
            replacements.insert(idx, quoted_like(lexeme, &token));
        }

        Ok(render(lexemes, &replacements))
    }

    /// Masks a `CREATE TABLE` statement: the table name, column and index
    /// names, referenced tables, string literals, defaults and the
    /// `AUTO_INCREMENT` counter. Types and options stay readable.
    ///
    /// # Errors
    /// `ParseAmbiguous` when `ddl` is not a CREATE TABLE statement;
    /// `MaskingCollision` as for [`MaskingSession::mask_sql`].
    pub fn mask_table_structure(&mut self, ddl: &str) -> Result<String> {
        let lexemes = lex(ddl).ok_or_else(|| SlowscopeError::parse_ambiguous("table structure"))?;
        let sig = significant(&lexemes);
        let at = |i: usize| sig.get(i).map(|&idx| &lexemes[idx]);

        // CREATE [TEMPORARY] TABLE [IF NOT EXISTS] name
        let mut i = 0;
        if !at(i).is_some_and(|l| l.is_kw("CREATE")) {
            return Err(SlowscopeError::parse_ambiguous("not a CREATE TABLE statement"));
        }
        i += 1;
        if at(i).is_some_and(|l| l.text.eq_ignore_ascii_case("TEMPORARY")) {
            i += 1;
        }
        if !at(i).is_some_and(|l| l.is_kw("TABLE")) {
            return Err(SlowscopeError::parse_ambiguous("not a CREATE TABLE statement"));
        }
        i += 1;
        if at(i).is_some_and(|l| l.text.eq_ignore_ascii_case("IF")) {
            i += 3;
        }

        let mut replacements: HashMap<usize, String> = HashMap::new();
        i = self.mask_ddl_table_ref(&lexemes, &sig, i, &mut replacements)?;

        let mut depth = 0usize;
        let mut item_start = false;
        let mut in_index_item = false;
        let mut after_references = false;
        while i < sig.len() {
            let idx = sig[i];
            let lexeme = &lexemes[idx];
            let prev = i.checked_sub(1).and_then(|p| at(p));
            let next = at(i + 1);

            match lexeme.kind {
                LexKind::LParen => {
                    depth += 1;
                    if depth == 1 {
                        item_start = true;
                    }
                    i += 1;
                    continue;
                }
                LexKind::RParen => {
                    depth = depth.saturating_sub(1);
                    i += 1;
                    continue;
                }
                LexKind::Comma if depth == 1 => {
                    item_start = true;
                    i += 1;
                    continue;
                }
                LexKind::Str => {
                    replacements.insert(idx, MASKED_STRING.to_string());
                    i += 1;
                    continue;
                }
                LexKind::Number => {
                    if masks_ddl_number(&lexemes, &sig, i) {
                        replacements.insert(idx, MASKED_NUMBER.to_string());
                    }
                    i += 1;
                    continue;
                }
                _ => {}
            }

            if depth == 0 {
                i += 1;
                continue;
            }

            if item_start {
                item_start = false;
                after_references = false;
                in_index_item = DDL_INDEX_WORDS
                    .iter()
                    .any(|kw| lexeme.text.eq_ignore_ascii_case(kw));
                if !in_index_item && depth == 1 {
                    if let Some(value) = lexeme.ident() {
                        let token = self.mask_column_token(value)?;
                        if let Some(token) = token {
                            replacements.insert(idx, quoted_like(lexeme, &token));
                        }
                    }
                    i += 1;
                    continue;
                }
            }

            if depth == 1 && lexeme.text.eq_ignore_ascii_case("REFERENCES") {
                after_references = true;
                i = self.mask_ddl_table_ref(&lexemes, &sig, i + 1, &mut replacements)?;
                continue;
            }

            let Some(value) = lexeme.ident() else {
                i += 1;
                continue;
            };
            if is_keep_word(lexeme) {
                i += 1;
                continue;
            }

            if depth == 1 {
                let names_index = in_index_item
                    && !after_references
                    && prev.is_some_and(|p| {
                        p.is_kw("KEY") || p.is_kw("INDEX") || p.text.eq_ignore_ascii_case("CONSTRAINT")
                    })
                    && !DDL_INDEX_WORDS
                        .iter()
                        .any(|kw| lexeme.text.eq_ignore_ascii_case(kw));
                if names_index {
                    let token = self.mask_name(NameKind::Index, value)?;
                    replacements.insert(idx, quoted_like(lexeme, &token));
                }
            } else if (!next.is_some_and(|n| n.kind == LexKind::LParen)
                || (in_index_item && is_prefix_length(&lexemes, &sig, i + 1)))
                && let Some(token) = self.mask_column_token(value)?
            {
                // column lists and generated or check expressions
                replacements.insert(idx, quoted_like(lexeme, &token));
            }
            i += 1;
        }

        Ok(render(&lexemes, &replacements))
    }

    fn mask_column_token(&mut self, name: &str) -> Result<Option<String>> {
        if !self.mask_columns {
            return Ok(None);
        }
        self.mask_name(NameKind::Column, name).map(Some)
    }

    /// Masks `[db.]table` starting at significant index `i`; returns the
    /// index after it.
    fn mask_ddl_table_ref(
        &mut self,
        lexemes: &[Lexeme],
        sig: &[usize],
        mut i: usize,
        replacements: &mut HashMap<usize, String>,
    ) -> Result<usize> {
        let at = |i: usize| sig.get(i).map(|&idx| &lexemes[idx]);
        let Some(first) = at(i).and_then(|l| l.ident().map(|v| (l, v))) else {
            return Err(SlowscopeError::parse_ambiguous("table name expected"));
        };

        let qualified = at(i + 1).is_some_and(|l| l.kind == LexKind::Period);
        if qualified && let Some((second, table)) = at(i + 2).and_then(|l| l.ident().map(|v| (l, v))) {
            let db_token = self.mask_name(NameKind::Database, first.1)?;
            replacements.insert(sig[i], quoted_like(first.0, &db_token));
            let table_token = self.mask_name(NameKind::Table, table)?;
            replacements.insert(sig[i + 2], quoted_like(second, &table_token));
            i += 3;
        } else {
            let token = self.mask_name(NameKind::Table, first.1)?;
            replacements.insert(sig[i], quoted_like(first.0, &token));
            i += 1;
        }
        Ok(i)
    }
}

/// `(N)` after an index column, as in `KEY idx (name(20))`.
fn is_prefix_length(lexemes: &[Lexeme], sig: &[usize], open: usize) -> bool {
    let at = |i: usize| sig.get(i).map(|&idx| &lexemes[idx]);
    at(open).is_some_and(|l| l.kind == LexKind::LParen)
        && at(open + 1).is_some_and(|l| l.kind == LexKind::Number)
        && at(open + 2).is_some_and(|l| l.kind == LexKind::RParen)
}

/// Numbers that carry data: defaults and the table's AUTO_INCREMENT value.
fn masks_ddl_number(lexemes: &[Lexeme], sig: &[usize], i: usize) -> bool {
    let at = |i: usize| sig.get(i).map(|&idx| &lexemes[idx]);
    let mut back = i;
    if back > 0 && at(back - 1).is_some_and(|l| l.kind == LexKind::Minus) {
        back -= 1;
    }
    let Some(prev) = back.checked_sub(1).and_then(|p| at(p)) else {
        return false;
    };
    if prev.text.eq_ignore_ascii_case("DEFAULT") {
        return true;
    }
    matches!(prev.kind, LexKind::Cmp(_))
        && back
            .checked_sub(2)
            .and_then(|p| at(p))
            .is_some_and(|l| l.text.eq_ignore_ascii_case("AUTO_INCREMENT"))
}
