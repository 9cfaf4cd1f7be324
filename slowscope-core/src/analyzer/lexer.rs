//! Lexical layer of the analyzer.
//!
//! Wraps the `sqlparser` MySQL tokenizer and reduces its token set to the
//! handful of lexeme kinds the clause walker and the SQL masker care about.
//! Every lexeme keeps the exact text it was produced from, so a stream can be
//! rendered back into the original statement with selected lexemes replaced.

use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Words that delimit or structure the statement shapes we analyze.
///
/// An unquoted word in this list is never treated as an identifier. Column
/// names that collide with these must be backtick-quoted in MySQL anyway.
const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CROSS", "CURRENT_DATE",
    "CURRENT_TIME", "CURRENT_TIMESTAMP", "DELETE", "DESC", "DESCRIBE", "DISTINCT",
    "DIV", "DUPLICATE", "ELSE", "END", "ESCAPE", "EXCEPT", "EXISTS", "EXPLAIN", "FALSE",
    "FOR", "FORCE", "FROM", "FULL", "GROUP", "HAVING", "HIGH_PRIORITY", "IGNORE", "IN",
    "INDEX", "INNER", "INSERT", "INTERSECT", "INTERVAL", "INTO", "IS", "JOIN", "KEY",
    "LEFT", "LIKE", "LIMIT", "LOCK", "LOW_PRIORITY", "MOD", "NATURAL", "NOT", "NULL",
    "OFFSET", "ON", "OR", "ORDER", "OUTER", "OUTFILE", "QUICK", "REGEXP", "REPLACE",
    "RIGHT", "RLIKE", "SELECT", "SET", "SHARE", "SHOW", "SQL_CALC_FOUND_ROWS",
    "SQL_NO_CACHE", "STRAIGHT_JOIN", "TABLE", "THEN", "TRUE", "UNION", "UNKNOWN",
    "UPDATE", "USE", "USING", "VALUES", "WHEN", "WHERE", "WINDOW", "WITH", "XOR",
];

/// Comparison operators recognized in predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    NullSafeEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

impl CmpOp {
    /// Whether the operator pins a single value (index ref access).
    pub(crate) fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::NullSafeEq)
    }
}

/// Reduced token kinds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LexKind {
    /// Identifier or keyword; `quote` is the delimiter for quoted identifiers.
    Word { value: String, quote: Option<char> },
    /// Quoted string literal (single, double, national or hex).
    Str,
    /// Numeric literal.
    Number,
    /// Bind placeholder such as `?`.
    Placeholder,
    Cmp(CmpOp),
    Comma,
    Period,
    LParen,
    RParen,
    Star,
    Minus,
    Semicolon,
    /// Whitespace and comments.
    Space,
    /// Anything else (arithmetic, casts, JSON arrows, ...).
    Other,
}

/// One lexeme and the text it renders as.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexeme {
    pub(crate) kind: LexKind,
    pub(crate) text: String,
}

impl Lexeme {
    /// Unquoted word equal (case-insensitively) to `keyword`.
    pub(crate) fn is_kw(&self, keyword: &str) -> bool {
        match &self.kind {
            LexKind::Word { value, quote: None } => value.eq_ignore_ascii_case(keyword),
            _ => false,
        }
    }

    /// Unquoted word found in the reserved list.
    pub(crate) fn is_reserved(&self) -> bool {
        match &self.kind {
            LexKind::Word { value, quote: None } => {
                RESERVED.iter().any(|kw| value.eq_ignore_ascii_case(kw))
            }
            _ => false,
        }
    }

    /// Identifier value if this is a quoted word or a non-reserved bare word.
    pub(crate) fn ident(&self) -> Option<&str> {
        match &self.kind {
            LexKind::Word { value, quote: Some(_) } => Some(value),
            LexKind::Word { value, quote: None } if !self.is_reserved() => Some(value),
            _ => None,
        }
    }

    /// String, number or placeholder.
    pub(crate) fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            LexKind::Str | LexKind::Number | LexKind::Placeholder
        )
    }
}

/// Tokenizes `sql` into lexemes, whitespace included.
///
/// Returns `None` when the tokenizer rejects the input (unterminated quote and
/// the like); callers treat that as an ambiguous statement.
pub(crate) fn lex(sql: &str) -> Option<Vec<Lexeme>> {
    let dialect = MySqlDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::debug!("Tokenizer rejected statement: {}", e);
            return None;
        }
    };

    Some(
        tokens
            .into_iter()
            .filter(|token| !matches!(token, Token::EOF))
            .map(to_lexeme)
            .collect(),
    )
}

fn to_lexeme(token: Token) -> Lexeme {
    let text = token.to_string();
    let kind = match token {
        Token::Word(word) => LexKind::Word {
            value: word.value,
            quote: word.quote_style,
        },
        Token::SingleQuotedString(_)
        | Token::DoubleQuotedString(_)
        | Token::NationalStringLiteral(_)
        | Token::HexStringLiteral(_) => LexKind::Str,
        Token::Number(_, _) => LexKind::Number,
        Token::Placeholder(_) => LexKind::Placeholder,
        Token::Eq | Token::DoubleEq => LexKind::Cmp(CmpOp::Eq),
        Token::Spaceship => LexKind::Cmp(CmpOp::NullSafeEq),
        Token::Neq => LexKind::Cmp(CmpOp::NotEq),
        Token::Lt => LexKind::Cmp(CmpOp::Lt),
        Token::Gt => LexKind::Cmp(CmpOp::Gt),
        Token::LtEq => LexKind::Cmp(CmpOp::LtEq),
        Token::GtEq => LexKind::Cmp(CmpOp::GtEq),
        Token::Comma => LexKind::Comma,
        Token::Period => LexKind::Period,
        Token::LParen => LexKind::LParen,
        Token::RParen => LexKind::RParen,
        Token::Mul => LexKind::Star,
        Token::Minus => LexKind::Minus,
        Token::SemiColon => LexKind::Semicolon,
        Token::Whitespace(_) => LexKind::Space,
        _ => LexKind::Other,
    };
    Lexeme { kind, text }
}

/// Indices of the lexemes that are not whitespace or comments.
pub(crate) fn significant(lexemes: &[Lexeme]) -> Vec<usize> {
    lexemes
        .iter()
        .enumerate()
        .filter(|(_, lexeme)| lexeme.kind != LexKind::Space)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<LexKind> {
        let lexemes = lex(sql).unwrap();
        significant(&lexemes)
            .into_iter()
            .map(|i| lexemes[i].kind.clone())
            .collect()
    }

    #[test]
    fn test_lex_predicate() {
        let kinds = kinds("id = 1 AND name <> 'x'");
        assert_eq!(kinds.len(), 7);
        assert_eq!(kinds[1], LexKind::Cmp(CmpOp::Eq));
        assert_eq!(kinds[2], LexKind::Number);
        assert_eq!(kinds[5], LexKind::Cmp(CmpOp::NotEq));
        assert_eq!(kinds[6], LexKind::Str);
    }

    #[test]
    fn test_backtick_identifier_is_quoted_word() {
        let lexemes = lex("`order`").unwrap();
        assert_eq!(
            lexemes[0].kind,
            LexKind::Word {
                value: "order".to_string(),
                quote: Some('`')
            }
        );
        assert_eq!(lexemes[0].ident(), Some("order"));
        assert_eq!(lexemes[0].text, "`order`");
    }

    #[test]
    fn test_reserved_words_are_not_identifiers() {
        let lexemes = lex("where").unwrap();
        assert!(lexemes[0].is_kw("WHERE"));
        assert!(lexemes[0].ident().is_none());

        let lexemes = lex("status").unwrap();
        assert_eq!(lexemes[0].ident(), Some("status"));
    }

    #[test]
    fn test_rendering_round_trips_layout() {
        let sql = "SELECT  a,\n b FROM t";
        let rendered: String = lex(sql).unwrap().into_iter().map(|l| l.text).collect();
        assert_eq!(rendered, sql);
    }

    #[test]
    fn test_unterminated_string_is_rejected() {
        assert!(lex("SELECT * FROM t WHERE a = 'open").is_none());
    }
}
