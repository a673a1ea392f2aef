//! 聚合键字段的规范化。

use once_cell::sync::Lazy;
use regex::Regex;

/// 键字段分隔符。
pub const KEY_DELIMITER: char = '|';
const DELIMITER_REPLACEMENT: char = '/';

static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-]?)(\d+)(?:\.(\d*))?$").expect("decimal pattern is valid"));

/// 文本字段：换行、制表符与连续空白折叠为单个空格，去除首尾空白并转为大写。
/// 字段内的分隔符替换为 `/`，避免拼接后出现多余的字段。
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out.replace(KEY_DELIMITER, &DELIMITER_REPLACEMENT.to_string())
        .to_uppercase()
}

/// 数值字段：`"10.0"` -> `"10"`，`"050.50"` -> `"50.5"`。无法识别为数字时按文本处理。
pub fn normalize_number(raw: &str) -> String {
    let text = normalize_text(raw);
    if let Some(caps) = DECIMAL.captures(&text) {
        let sign = caps.get(1).map_or("", |m| m.as_str());
        let int_part = caps[2].trim_start_matches('0');
        let int_part = if int_part.is_empty() { "0" } else { int_part };
        let frac = caps
            .get(3)
            .map_or("", |m| m.as_str())
            .trim_end_matches('0');

        let mut number = String::new();
        let is_zero = int_part == "0" && frac.is_empty();
        if sign == "-" && !is_zero {
            number.push('-');
        }
        number.push_str(int_part);
        if !frac.is_empty() {
            number.push('.');
            number.push_str(frac);
        }
        return number;
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => format_number(value),
        _ => text,
    }
}

/// 将浮点数格式化为不带多余小数位的字符串。
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let rendered = value.to_string();
    if rendered.contains('e') || rendered.contains('E') {
        rendered
    } else {
        normalize_number(&rendered)
    }
}

/// 将已规范化的字段拼接为键。
pub fn join_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut key = String::new();
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            key.push(KEY_DELIMITER);
        }
        key.push_str(field.as_ref());
    }
    key
}
