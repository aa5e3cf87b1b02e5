use super::{ParseError, Spanned};
use crate::keywords::is_reserved_keyword;
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    BracketRoundOpen,
    BracketRoundClose,
    Comment(&'code str),
    Int(i64),
    Float(f64),
    Text(&'code str),
    Identifier(&'code str),
    // Reserved word the language has no syntax for (`for`, `def`, ...)
    Keyword(&'code str),
    True,
    False,
    None,
    Raise,
    Pass,
    Comma,
    Dot,
    Newline,
    Assign,
    Equal,
    NotEqual,
    GreaterOrEqual,
    Greater,
    LessOrEqual,
    Less,
    Plus,
    Minus,
    Asterisk,
    DoubleAsterisk,
    Slash,
    Percent,
}

impl<'code> Token<'code> {
    pub fn into_cow_str(self) -> Cow<'code, str> {
        match self {
            Self::BracketRoundOpen => "(".into(),
            Self::BracketRoundClose => ")".into(),
            Self::Comment(comment) => comment.into(),
            Self::Int(number) => number.to_string().into(),
            Self::Float(number) => number.to_string().into(),
            Self::Text(text) => format!("'{text}'").into(),
            Self::Identifier(identifier) => identifier.into(),
            Self::Keyword(keyword) => keyword.into(),
            Self::True => "True".into(),
            Self::False => "False".into(),
            Self::None => "None".into(),
            Self::Raise => "raise".into(),
            Self::Pass => "pass".into(),
            Self::Comma => ",".into(),
            Self::Dot => ".".into(),
            Self::Newline => "newline".into(),
            Self::Assign => "=".into(),
            Self::Equal => "==".into(),
            Self::NotEqual => "!=".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::Greater => ">".into(),
            Self::LessOrEqual => "<=".into(),
            Self::Less => "<".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Asterisk => "*".into(),
            Self::DoubleAsterisk => "**".into(),
            Self::Slash => "/".into(),
            Self::Percent => "%".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'code>()
-> impl Parser<'code, &'code str, Vec<Spanned<Token<'code>>>, extra::Err<ParseError<'code, char>>> {
    let bracket = choice((
        just('(').to(Token::BracketRoundOpen),
        just(')').to(Token::BracketRoundClose),
    ));

    let comparator = choice((
        just("==").to(Token::Equal),
        just("!=").to(Token::NotEqual),
        just(">=").to(Token::GreaterOrEqual),
        just('>').to(Token::Greater),
        just("<=").to(Token::LessOrEqual),
        just('<').to(Token::Less),
    ));

    let arithmetic_operator = choice((
        just("**").to(Token::DoubleAsterisk),
        just('*').to(Token::Asterisk),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    let comment = just('#')
        .then(none_of("\r\n").repeated())
        .to_slice()
        .map(Token::Comment);

    // Negative literals are parsed as unary minus so `a-1` stays a subtraction.
    let fraction = just('.').then(text::digits(10)).ignored();
    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(text::digits(10))
        .ignored();

    let float = text::int(10)
        .then(choice((
            fraction.then(exponent.clone().or_not()).ignored(),
            exponent,
        )))
        .to_slice()
        .from_str::<f64>()
        .unwrapped()
        .map(Token::Float);

    let int = text::int(10).try_map(|digits: &str, span| {
        digits.parse::<i64>().map(Token::Int).map_err(|_| {
            ParseError::custom(span, format!("Integer literal '{digits}' is too large"))
        })
    });

    let text = choice((
        just('\'')
            .ignore_then(none_of("'\r\n").repeated().to_slice())
            .then_ignore(just('\'')),
        just('"')
            .ignore_then(none_of("\"\r\n").repeated().to_slice())
            .then_ignore(just('"')),
    ))
    .map(Token::Text);

    let word = any()
        .filter(|character: &char| character.is_ascii_alphabetic() || *character == '_')
        .then(
            any()
                .filter(|character: &char| character.is_ascii_alphanumeric() || *character == '_')
                .repeated(),
        )
        .to_slice()
        .map(|word: &'code str| match word {
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            "raise" => Token::Raise,
            "pass" => Token::Pass,
            keyword if is_reserved_keyword(keyword) => Token::Keyword(keyword),
            identifier => Token::Identifier(identifier),
        });

    let token = choice((
        bracket,
        comment,
        float,
        int,
        text,
        word,
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        text::newline().to(Token::Newline),
        comparator,
        just('=').to(Token::Assign),
        arithmetic_operator,
    ));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded_by(text::inline_whitespace())
        .repeated()
        .collect()
        .then_ignore(end())
}
