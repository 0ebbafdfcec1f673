//! Comparison operators and their text form.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{multispace0, multispace1},
    combinator::{all_consuming, value},
    sequence::{delimited, tuple},
    IResult,
};
use serde::Serialize;
use std::str::FromStr;

use crate::error::BankError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    ILike,
}

impl Operator {
    /// SQL text of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::ILike => "ILIKE",
        }
    }

    /// Parse operator text such as `>=`, `<>` or `not like`.
    pub fn parse(input: &str) -> Result<Self, BankError> {
        match all_consuming(delimited(multispace0, parse_operator, multispace0))(input) {
            Ok((_, op)) => Ok(op),
            Err(_) => Err(BankError::InvalidOperator(input.to_string())),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::parse(s)
    }
}

/// Longest symbols first so `<=` is not read as `<`.
fn parse_operator(input: &str) -> IResult<&str, Operator> {
    alt((
        value(Operator::Lte, tag("<=")),
        value(Operator::Gte, tag(">=")),
        value(Operator::Ne, tag("!=")),
        value(Operator::Ne, tag("<>")),
        value(Operator::Eq, tag("==")),
        value(Operator::Lt, tag("<")),
        value(Operator::Gt, tag(">")),
        value(Operator::Eq, tag("=")),
        value(
            Operator::NotLike,
            tuple((tag_no_case("not"), multispace1, tag_no_case("like"))),
        ),
        value(Operator::ILike, tag_no_case("ilike")),
        value(Operator::Like, tag_no_case("like")),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbols() {
        assert_eq!(Operator::parse("=").unwrap(), Operator::Eq);
        assert_eq!(Operator::parse("<=").unwrap(), Operator::Lte);
        assert_eq!(Operator::parse("<>").unwrap(), Operator::Ne);
        assert_eq!(Operator::parse(" > ").unwrap(), Operator::Gt);
    }

    #[test]
    fn test_parse_words() {
        assert_eq!(Operator::parse("LIKE").unwrap(), Operator::Like);
        assert_eq!(Operator::parse("not  like").unwrap(), Operator::NotLike);
        assert_eq!(Operator::parse("ILike").unwrap(), Operator::ILike);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Operator::parse("=>"),
            Err(BankError::InvalidOperator(_))
        ));
        assert!(Operator::parse("likes").is_err());
    }
}
