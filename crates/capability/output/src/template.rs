//! printf 风格的单值模板
//!
//! 支持的占位符：`%v` `%s` `%d` `%f` `%.Nf` `%g` `%t`，以及字面量 `%%`。
//! 一个模板最多包含一个取值占位符。

use crate::OutputError;
use domain::FieldValue;
use std::fmt::Write;

const DEFAULT_FLOAT_PRECISION: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Value,
    Str,
    Decimal,
    Float(usize),
    General,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Verb(Verb),
}

/// 解析后的模板。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self, OutputError> {
        let invalid = |reason: String| OutputError::InvalidTemplate {
            template: raw.to_string(),
            reason,
        };

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut verbs = 0usize;
        let mut chars = raw.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                literal.push(ch);
                continue;
            }
            let verb = match chars.next() {
                Some('%') => {
                    literal.push('%');
                    continue;
                }
                Some('v') => Verb::Value,
                Some('s') => Verb::Str,
                Some('d') => Verb::Decimal,
                Some('f') => Verb::Float(DEFAULT_FLOAT_PRECISION),
                Some('g') => Verb::General,
                Some('t') => Verb::Bool,
                Some('.') => {
                    let mut digits = String::new();
                    while let Some(digit) = chars.peek().copied().filter(char::is_ascii_digit) {
                        digits.push(digit);
                        chars.next();
                    }
                    if chars.next() != Some('f') {
                        return Err(invalid("precision is only supported for %f".to_string()));
                    }
                    // "%.f" 与 Go 一致，精度为 0
                    let precision = if digits.is_empty() {
                        0
                    } else {
                        digits
                            .parse()
                            .map_err(|_| invalid(format!("invalid precision {}", digits)))?
                    };
                    Verb::Float(precision)
                }
                Some(other) => return Err(invalid(format!("unsupported verb %{}", other))),
                None => return Err(invalid("dangling %".to_string())),
            };
            verbs += 1;
            if verbs > 1 {
                return Err(invalid("more than one value placeholder".to_string()));
            }
            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Verb(verb));
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            pieces,
        })
    }

    /// 用一个值渲染模板。
    pub fn render(&self, value: &FieldValue) -> Result<String, OutputError> {
        let mut out = String::with_capacity(self.raw.len() + 8);
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Verb(verb) => self.render_verb(&mut out, *verb, value)?,
            }
        }
        Ok(out)
    }

    fn render_verb(
        &self,
        out: &mut String,
        verb: Verb,
        value: &FieldValue,
    ) -> Result<(), OutputError> {
        let mismatch = || OutputError::ValueMismatch {
            template: self.raw.clone(),
            found: value.type_name(),
        };
        let written = match (verb, value) {
            (Verb::Value | Verb::Str, value) => write!(out, "{}", value),
            (Verb::Decimal, FieldValue::I64(v)) => write!(out, "{}", v),
            (Verb::Decimal, FieldValue::F64(v)) if v.fract() == 0.0 && v.is_finite() => {
                write!(out, "{}", *v as i64)
            }
            (Verb::Float(precision), value) => {
                let number = value.as_f64().ok_or_else(mismatch)?;
                write!(out, "{:.*}", precision, number)
            }
            (Verb::General, value) => {
                let number = value.as_f64().ok_or_else(mismatch)?;
                write!(out, "{}", number)
            }
            (Verb::Bool, FieldValue::Bool(v)) => write!(out, "{}", v),
            _ => return Err(mismatch()),
        };
        written.map_err(|err| OutputError::InvalidTemplate {
            template: self.raw.clone(),
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_percent_is_not_a_placeholder() {
        let template = Template::parse("100%% at %d").expect("template");
        assert_eq!(template.render(&FieldValue::I64(3)).expect("render"), "100% at 3");
    }

    #[test]
    fn empty_precision_means_zero() {
        let template = Template::parse("%.f").expect("template");
        assert_eq!(template.render(&FieldValue::F64(2.6)).expect("render"), "3");
    }

    #[test]
    fn template_without_placeholder_renders_verbatim() {
        let template = Template::parse("sunny").expect("template");
        assert_eq!(template.render(&FieldValue::Bool(true)).expect("render"), "sunny");
    }
}
