use crate::error::FormatError;

/// 以命名占位符格式化模板: `{name}` 替换为参数, `{{` / `}}` 为转义的花括号。
/// 占位符中的转换 / 格式说明 (`!r`, `:>10`) 会被忽略。
pub fn format(template: &str, fields: &[(&str, &str)]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut field = String::new();
                let mut closed = false;
                for (_, fc) in chars.by_ref() {
                    if fc == '}' {
                        closed = true;
                        break;
                    }
                    field.push(fc);
                }
                if !closed {
                    return Err(FormatError::UnmatchedBrace { brace: '{', offset });
                }
                out.push_str(lookup(&field, offset, fields)?);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(FormatError::UnmatchedBrace { brace: '}', offset });
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn lookup<'a>(field: &str, offset: usize, fields: &[(&str, &'a str)]) -> Result<&'a str, FormatError> {
    let name = field
        .split(['!', ':'])
        .next()
        .unwrap_or("")
        .trim();

    if name.is_empty() || name.chars().all(|c| c.is_ascii_digit()) {
        return Err(FormatError::Positional(offset));
    }

    fields
        .iter()
        .find(|(k, _)| *k == name)
        .map(|(_, v)| *v)
        .ok_or_else(|| FormatError::MissingField(name.to_string()))
}

/// Formats the template, falling back to the raw text when the fields don't match.
pub fn format_or_raw(template: &str, fields: &[(&str, &str)]) -> (String, Option<FormatError>) {
    match format(template, fields) {
        Ok(s) => (s, None),
        Err(e) => (template.to_string(), Some(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_fields_are_substituted() {
        let s = format("{main_kw} / {slug}", &[("main_kw", "widgets"), ("slug", "w")]).unwrap();
        assert_eq!(s, "widgets / w");
    }

    #[test]
    fn test_escaped_braces() {
        let s = format("{{\"k\": \"{slug}\"}}", &[("slug", "a")]).unwrap();
        assert_eq!(s, "{\"k\": \"a\"}");
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let err = format("{goal}", &[("slug", "a")]).unwrap_err();
        assert_eq!(err, FormatError::MissingField("goal".to_string()));
    }

    #[test]
    fn test_raw_json_braces_fail() {
        assert!(format("{\"a\": 1}", &[]).is_err());
        assert!(matches!(format("a } b", &[]), Err(FormatError::UnmatchedBrace { brace: '}', .. })));
        assert!(matches!(format("a {b", &[]), Err(FormatError::UnmatchedBrace { brace: '{', .. })));
        assert_eq!(format("{}", &[]), Err(FormatError::Positional(0)));
    }

    #[test]
    fn test_fallback_keeps_raw_text() {
        let (s, err) = format_or_raw("use {unknown}", &[("slug", "a")]);
        assert_eq!(s, "use {unknown}");
        assert!(err.is_some());
    }
}
