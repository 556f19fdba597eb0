//! # Query Parser Module
//!
//! Splits a raw search string into tokens and classifies each token against
//! the active [`SearchConfig`].
//!
//! ## Syntax
//!
//! ```text
//! <query>   ::= { <ws> <token> } <ws>
//! <token>   ::= [ "-" ] <body>
//! <body>    ::= <key> ":" <value>      named, order or special
//!             | <term>                 anonymous
//! ```
//!
//! - A leading `-` negates the token. On an `order:` token it flips the
//!   direction instead.
//! - The first unescaped `:` separates key and value. A backslash escapes
//!   the next character, so `a\:b` is the anonymous term `a:b` and `\-x` is a
//!   term starting with a dash.
//! - `order:column[,asc|desc]` selects the ordering; `special:name` selects a
//!   special filter; every other key must be a named filter of the config.
//!
//! ## Example Usage
//!
//! ```rust
//! # use booru_search::config::UserSearchConfig;
//! # use booru_search::parser::{parse_query, TokenKind};
//! let tokens = parse_query(&UserSearchConfig, "-name:u1 order:name,desc").unwrap();
//!
//! assert!(tokens[0].negated);
//! assert!(matches!(tokens[0].kind, TokenKind::Named { value: "u1", .. }));
//! assert!(matches!(tokens[1].kind, TokenKind::Order(_)));
//! ```

pub mod value;

use crate::config::{NamedFilter, SearchConfig};
use crate::query::{Direction, Filter, Order};
use crate::search::SearchError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till1, take_while},
    character::complete::{anychar, char, none_of},
    combinator::all_consuming,
    multi::many0,
    sequence::{preceded, terminated},
};

/// One whitespace-delimited unit of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'q> {
    pub negated: bool,
    pub body: &'q str,
}

/// What a token asks for, resolved against a config.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'q, C> {
    /// A bare term handed to the config's anonymous filter.
    Anonymous { term: &'q str },

    /// `key:value` for a declared named filter; `value` is still escaped.
    Named {
        filter: NamedFilter<C>,
        value: &'q str,
    },

    /// `order:column[,direction]`.
    Order(Order<C>),

    /// `special:name`.
    Special { name: &'q str, filter: Filter<C> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedToken<'q, C> {
    pub negated: bool,
    pub kind: TokenKind<'q, C>,
}

/// Splits `input` on whitespace and detects negation.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, SearchError> {
    fn token(input: &str) -> IResult<&str, Token<'_>> {
        take_till1(char::is_whitespace)
            .map(|raw: &str| match raw.strip_prefix('-') {
                Some(body) => Token {
                    negated: true,
                    body,
                },
                None => Token {
                    negated: false,
                    body: raw,
                },
            })
            .parse(input)
    }

    let separator = || take_while(char::is_whitespace);

    let (_, tokens) = all_consuming(terminated(
        many0(preceded(separator(), token)),
        separator(),
    ))
    .parse(input)
    .map_err(|_| SearchError::new(format!("Malformed query: {input:?}")))?;

    Ok(tokens)
}

/// Tokenizes and classifies a whole query.
///
/// # Errors
/// Fails on the first token that names an unknown key, carries a malformed
/// order directive or an unknown special filter. No partial result is
/// returned.
pub fn parse_query<'q, S: SearchConfig>(
    config: &S,
    input: &'q str,
) -> Result<Vec<ClassifiedToken<'q, S::Column>>, SearchError> {
    tokenize(input)?
        .into_iter()
        .map(|token| classify(config, token))
        .collect()
}

fn classify<'q, S: SearchConfig>(
    config: &S,
    token: Token<'q>,
) -> Result<ClassifiedToken<'q, S::Column>, SearchError> {
    if token.body.is_empty() {
        return Err(SearchError::new("Negation without a term"));
    }

    let kind = match split_key(token.body) {
        None => TokenKind::Anonymous { term: token.body },
        Some((key, value)) => match key.as_str() {
            "order" => TokenKind::Order(parse_order(config, value)?),
            "special" => {
                if value.is_empty() {
                    return Err(SearchError::new("Empty special filter name"));
                }
                let filter = config.special_filter(value).ok_or_else(|| {
                    SearchError::new(format!("Unknown special filter: {value:?}"))
                })?;
                TokenKind::Special {
                    name: value,
                    filter,
                }
            }
            _ => {
                let filter = config
                    .named_filter(&key)
                    .ok_or_else(|| SearchError::new(format!("Unknown named token: {key:?}")))?;
                TokenKind::Named {
                    filter: *filter,
                    value,
                }
            }
        },
    };

    Ok(ClassifiedToken {
        negated: token.negated,
        kind,
    })
}

/// Splits `body` at its first unescaped `:`, unescaping the key.
fn split_key(body: &str) -> Option<(String, &str)> {
    fn key(input: &str) -> IResult<&str, String> {
        terminated(
            many0(alt((preceded(char('\\'), anychar), none_of(":\\"))))
                .map(|chars: Vec<char>| chars.into_iter().collect::<String>()),
            char(':'),
        )
        .parse(input)
    }

    key(body).ok().map(|(value, key)| (key, value))
}

fn parse_order<S: SearchConfig>(config: &S, value: &str) -> Result<Order<S::Column>, SearchError> {
    let parts: Vec<&str> = value.split(',').collect();

    let (key, direction) = match parts.as_slice() {
        [key] => (*key, Direction::Asc),
        [key, "asc"] => (*key, Direction::Asc),
        [key, "desc"] => (*key, Direction::Desc),
        [_, direction] => {
            return Err(SearchError::new(format!(
                "Unknown order direction: {direction:?}"
            )));
        }
        _ => {
            return Err(SearchError::new(format!(
                "Too many arguments for order token: {value:?}"
            )));
        }
    };

    if key.is_empty() {
        return Err(SearchError::new("Order token requires a column"));
    }

    let column = config
        .order_column(key)
        .ok_or_else(|| SearchError::new(format!("Unknown order column: {key:?}")))?;

    Ok(Order::new(column, direction))
}

#[cfg(test)]
mod tests {
    use super::{ClassifiedToken, Token, TokenKind, parse_query, tokenize};
    use crate::config::{PostSearchConfig, SearchConfig, UserSearchConfig};
    use crate::model::{PostColumn, UserColumn};
    use crate::query::{Direction, Filter, Order};

    #[test]
    fn test_tokenize() {
        assert_eq!(
            vec![
                Token {
                    negated: false,
                    body: "u1"
                },
                Token {
                    negated: true,
                    body: "name:u2"
                },
                Token {
                    negated: false,
                    body: "order:name"
                },
            ],
            tokenize("  u1\t-name:u2 \n order:name  ").unwrap()
        );
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_unicode_whitespace() {
        for separator in ['\u{a0}', '\u{b}', '\u{c}', '\u{3000}'] {
            let query = format!("u1{separator}order:name{separator}");
            let tokens = tokenize(&query).unwrap();

            assert_eq!(
                vec!["u1", "order:name"],
                tokens.iter().map(|t| t.body).collect::<Vec<_>>(),
                "{separator:?}"
            );
        }
    }

    #[test]
    fn test_classify() {
        let tokens = parse_query(&UserSearchConfig, "u1 -creation_time:2014 -order:name,desc")
            .unwrap();

        assert_eq!(
            ClassifiedToken {
                negated: false,
                kind: TokenKind::Anonymous { term: "u1" },
            },
            tokens[0]
        );
        assert_eq!(
            ClassifiedToken {
                negated: true,
                kind: TokenKind::Named {
                    filter: *UserSearchConfig.named_filter("creation_time").unwrap(),
                    value: "2014",
                },
            },
            tokens[1]
        );
        assert_eq!(
            ClassifiedToken {
                negated: true,
                kind: TokenKind::Order(Order::new(UserColumn::Name, Direction::Desc)),
            },
            tokens[2]
        );
    }

    #[test]
    fn test_special() {
        let tokens = parse_query(&PostSearchConfig, "-special:fav").unwrap();

        assert_eq!(
            ClassifiedToken {
                negated: true,
                kind: TokenKind::Special {
                    name: "fav",
                    filter: Filter::at_least(PostColumn::FavCount, 1),
                },
            },
            tokens[0]
        );
    }

    #[test]
    fn test_escaped_colon_is_anonymous() {
        let tokens = parse_query(&UserSearchConfig, r"a\:b \-u1").unwrap();

        assert_eq!(TokenKind::Anonymous { term: r"a\:b" }, tokens[0].kind);
        assert_eq!(TokenKind::Anonymous { term: r"\-u1" }, tokens[1].kind);
        assert!(!tokens[1].negated);
    }

    #[test]
    fn test_value_keeps_later_colons() {
        let tokens = parse_query(&UserSearchConfig, "name:a:b").unwrap();

        assert!(matches!(tokens[0].kind, TokenKind::Named { value: "a:b", .. }));
    }

    #[test]
    fn test_invalid_tokens() {
        for query in [
            "order:",
            "order:nam",
            "order:name,as",
            "order:name,asc,desc",
            "order:,asc",
            "bad:x",
            ":x",
            "Name:u1",
            "special:",
            "special:unsupported",
            "special:-",
            "-",
            "u1 bad:x",
        ] {
            assert!(
                parse_query(&UserSearchConfig, query).is_err(),
                "{query:?} should fail"
            );
        }
    }
}
