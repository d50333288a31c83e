//! JSON 路径表达式
//!
//! 支持的语法（JSONPath 的点/方括号子集）：
//! - `$`：根节点（可省略）
//! - `.name`：对象字段
//! - `['name']` / `["name"]`：带特殊字符的对象字段
//! - `[3]` / `[-1]`：数组下标（负数从末尾计数）
//!
//! 通配符、递归下降、过滤表达式不支持，解析时直接报错。

use crate::NormalizeError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// 路径中的一段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(i64),
}

/// 预编译的 JSON 路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    /// 解析路径表达式。
    pub fn parse(expr: &str) -> Result<Self, NormalizeError> {
        let raw = expr.trim().to_string();
        let invalid = |reason: &str| NormalizeError::InvalidPath {
            path: raw.clone(),
            reason: reason.to_string(),
        };

        let chars: Vec<char> = raw.chars().collect();
        if chars.is_empty() {
            return Err(invalid("empty path"));
        }

        let mut segments = Vec::new();
        let mut pos = 0;
        if chars[0] == '$' {
            pos = 1;
        } else if chars[0] != '.' && chars[0] != '[' {
            // 省略 `$` 时允许直接以字段名开头，如 `sensor.value`
            let (name, next) = read_name(&chars, 0);
            segments.push(Segment::Key(name));
            pos = next;
        }

        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    if chars.get(pos + 1) == Some(&'.') {
                        return Err(invalid("recursive descent is not supported"));
                    }
                    let (name, next) = read_name(&chars, pos + 1);
                    if name.is_empty() {
                        return Err(invalid("empty field name"));
                    }
                    if name == "*" {
                        return Err(invalid("wildcards are not supported"));
                    }
                    segments.push(Segment::Key(name));
                    pos = next;
                }
                '[' => {
                    let close = chars[pos + 1..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|offset| pos + 1 + offset)
                        .ok_or_else(|| invalid("unclosed '['"))?;
                    let inner: String = chars[pos + 1..close].iter().collect();
                    let inner = inner.trim();
                    segments.push(parse_bracket(inner).map_err(|reason| invalid(&reason))?);
                    pos = close + 1;
                }
                other => {
                    return Err(invalid(&format!("unexpected character '{}'", other)));
                }
            }
        }

        Ok(Self { raw, segments })
    }

    /// 原始表达式。
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// 在负载上求值，返回命中的节点。
    ///
    /// 失败时返回可读的原因（缺失字段、下标越界、类型不匹配）。
    pub fn lookup<'a>(&self, payload: &'a Value) -> Result<&'a Value, String> {
        let mut current = payload;
        for segment in &self.segments {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map
                    .get(key)
                    .ok_or_else(|| format!("field '{}' not found", key))?,
                (Segment::Key(key), other) => {
                    return Err(format!(
                        "cannot read field '{}' of {}",
                        key,
                        json_type_name(other)
                    ));
                }
                (Segment::Index(index), Value::Array(items)) => {
                    let resolved = if *index < 0 {
                        items.len() as i64 + index
                    } else {
                        *index
                    };
                    usize::try_from(resolved)
                        .ok()
                        .and_then(|idx| items.get(idx))
                        .ok_or_else(|| {
                            format!("index {} out of range (len {})", index, items.len())
                        })?
                }
                (Segment::Index(index), other) => {
                    return Err(format!(
                        "cannot index [{}] into {}",
                        index,
                        json_type_name(other)
                    ));
                }
            };
        }
        Ok(current)
    }
}

impl FromStr for JsonPath {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonPath::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// JSON 节点类型名（日志与错误信息用）。
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn read_name(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn parse_bracket(inner: &str) -> Result<Segment, String> {
    if inner.is_empty() {
        return Err("empty brackets".to_string());
    }
    let quoted = ['\'', '"']
        .iter()
        .find(|quote| inner.len() >= 2 && inner.starts_with(**quote) && inner.ends_with(**quote));
    if quoted.is_some() {
        return Ok(Segment::Key(inner[1..inner.len() - 1].to_string()));
    }
    inner
        .parse::<i64>()
        .map(Segment::Index)
        .map_err(|_| format!("unsupported bracket expression '{}'", inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_dot_and_bracket_segments() {
        let path = JsonPath::parse("$.sensors[1]['room temp'].value").expect("path");
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("sensors".to_string()),
                Segment::Index(1),
                Segment::Key("room temp".to_string()),
                Segment::Key("value".to_string()),
            ]
        );
    }

    #[test]
    fn root_marker_is_optional() {
        let with_root = JsonPath::parse("$.sensor.value").expect("path");
        let without_root = JsonPath::parse("sensor.value").expect("path");
        assert_eq!(with_root.segments(), without_root.segments());
    }

    #[test]
    fn bare_root_selects_payload() {
        let path = JsonPath::parse("$").expect("path");
        let payload = json!(21.5);
        assert_eq!(path.lookup(&payload), Ok(&payload));
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert!(JsonPath::parse("").is_err());
        assert!(JsonPath::parse("$..value").is_err());
        assert!(JsonPath::parse("$.items[*]").is_err());
        assert!(JsonPath::parse("$.items[0").is_err());
        assert!(JsonPath::parse("$.a.").is_err());
    }

    #[test]
    fn negative_index_counts_from_end() {
        let path = JsonPath::parse("$.readings[-1]").expect("path");
        let payload = json!({"readings": [1, 2, 3]});
        assert_eq!(path.lookup(&payload), Ok(&json!(3)));
    }

    #[test]
    fn lookup_reports_missing_field_and_range() {
        let payload = json!({"readings": [1]});
        let missing = JsonPath::parse("$.sensor").expect("path");
        assert_eq!(
            missing.lookup(&payload).expect_err("missing"),
            "field 'sensor' not found"
        );
        let range = JsonPath::parse("$.readings[4]").expect("path");
        assert_eq!(
            range.lookup(&payload).expect_err("range"),
            "index 4 out of range (len 1)"
        );
        let scalar = JsonPath::parse("$.readings[0].value").expect("path");
        assert_eq!(
            scalar.lookup(&payload).expect_err("scalar"),
            "cannot read field 'value' of number"
        );
    }
}
