//! `${section.key}` substitution inside string values.
//!
//! `$$` produces a literal `$`, so `$${HOME}` survives as `${HOME}`.

use toml::{Table, Value};

use super::ConfigError;

const MAX_PASSES: usize = 100;

type StringVisitor<'a> = dyn FnMut(&mut String) -> Result<usize, ConfigError> + 'a;

/// Substitutes references until a pass makes no change, then unescapes `$$`.
///
/// `$$` is kept verbatim while references settle, so an escaped `${...}`
/// is never read as a reference by a later pass.
///
/// References may point at other references; a chain that never settles is
/// reported as [`ConfigError::CircularReference`].
pub(crate) fn resolve_references(table: &mut Table) -> Result<(), ConfigError> {
    for _ in 0..MAX_PASSES {
        let root = table.clone();
        let changed = visit_table(table, &mut |s| substitute_str(s, &root))?;
        if changed == 0 {
            visit_table(table, &mut |s| {
                unescape(s);
                Ok(0)
            })?;
            return Ok(());
        }
    }

    Err(ConfigError::CircularReference)
}

fn visit_table(table: &mut Table, visit: &mut StringVisitor<'_>) -> Result<usize, ConfigError> {
    table
        .iter_mut()
        .map(|(_, value)| visit_value(value, visit))
        .sum()
}

fn visit_value(value: &mut Value, visit: &mut StringVisitor<'_>) -> Result<usize, ConfigError> {
    match value {
        Value::String(s) => visit(s),
        Value::Table(table) => visit_table(table, visit),
        Value::Array(items) => items.iter_mut().map(|v| visit_value(v, visit)).sum(),
        _ => Ok(0),
    }
}

/// Replaces `${...}` references, leaving `$$` pairs in place.
fn substitute_str(s: &mut String, root: &Table) -> Result<usize, ConfigError> {
    if !s.contains("${") {
        return Ok(0);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s.as_str();
    let mut count = 0;

    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];

        if let Some(after) = tail.strip_prefix('$') {
            out.push_str("$$");
            rest = after;
        } else if let Some(body) = tail.strip_prefix('{') {
            let end = body.find('}').ok_or(ConfigError::UnclosedReference)?;
            out.push_str(&lookup(root, &body[..end])?);
            count += 1;
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = tail;
        }
    }
    out.push_str(rest);

    *s = out;
    Ok(count)
}

fn unescape(s: &mut String) {
    if s.contains("$$") {
        *s = s.replace("$$", "$");
    }
}

fn lookup(root: &Table, path: &str) -> Result<String, ConfigError> {
    if path.split('.').any(str::is_empty) {
        return Err(ConfigError::InvalidReferencePath(path.to_string()));
    }

    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = root.get(first);
    for segment in segments {
        current = current.and_then(Value::as_table).and_then(|t| t.get(segment));
    }

    let value = current.ok_or_else(|| ConfigError::ReferenceNotFound(path.to_string()))?;
    scalar_to_string(value).ok_or_else(|| ConfigError::NonScalarReference(path.to_string()))
}

/// Renders a scalar the way it is substituted into strings; `None` for
/// arrays and tables.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(toml_str: &str) -> Result<Table, ConfigError> {
        let mut table: Table = toml::from_str(toml_str).unwrap();
        resolve_references(&mut table).map(|()| table)
    }

    #[test]
    fn test_nested_path() {
        let table = resolved(
            r#"
            [server]
            host = "example.com"
            port = 8080

            [client]
            endpoint = "https://${server.host}:${server.port}"
            "#,
        )
        .unwrap();

        assert_eq!(
            table["client"]["endpoint"].as_str(),
            Some("https://example.com:8080")
        );
    }

    #[test]
    fn test_chained_references() {
        let table = resolved(
            r#"
            a = "hello"
            b = "${a} world"
            c = "${b}!"
            "#,
        )
        .unwrap();

        assert_eq!(table["c"].as_str(), Some("hello world!"));
    }

    #[test]
    fn test_escapes_and_lone_dollar() {
        let table = resolved(r#"value = "costs $5, use $${VAR}""#).unwrap();
        assert_eq!(table["value"].as_str(), Some("costs $5, use ${VAR}"));
    }

    #[test]
    fn test_escaped_reference_survives_extra_passes() {
        let table = resolved(
            r#"
            a = "x"
            b = "${a}"
            lit = "$${HOME}"
            "#,
        )
        .unwrap();

        assert_eq!(table["b"].as_str(), Some("x"));
        assert_eq!(table["lit"].as_str(), Some("${HOME}"));
    }

    #[test]
    fn test_double_escape_unescaped_once() {
        let table = resolved(
            r#"
            a = "x"
            b = "${a} $$$$"
            "#,
        )
        .unwrap();

        assert_eq!(table["b"].as_str(), Some("x $$"));
    }

    #[test]
    fn test_reference_to_escaped_value() {
        let table = resolved(
            r#"
            lit = "$${HOME}/bin"
            path = "${lit}"
            "#,
        )
        .unwrap();

        assert_eq!(table["path"].as_str(), Some("${HOME}/bin"));
        assert_eq!(table["lit"].as_str(), Some("${HOME}/bin"));
    }

    #[test]
    fn test_references_inside_arrays() {
        let table = resolved(
            r#"
            base = "/api"
            endpoints = ["${base}/users", "${base}/posts"]
            "#,
        )
        .unwrap();

        let endpoints = table["endpoints"].as_array().unwrap();
        assert_eq!(endpoints[0].as_str(), Some("/api/users"));
        assert_eq!(endpoints[1].as_str(), Some("/api/posts"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            resolved("a = \"${b}\"\nb = \"${a}\""),
            Err(ConfigError::CircularReference)
        ));
        assert!(matches!(
            resolved(r#"url = "${missing.path}""#),
            Err(ConfigError::ReferenceNotFound(_))
        ));
        assert!(matches!(
            resolved(r#"url = "${a..b}""#),
            Err(ConfigError::InvalidReferencePath(_))
        ));
        assert!(matches!(
            resolved("url = \"${server}\"\n[server]\nhost = \"x\""),
            Err(ConfigError::NonScalarReference(_))
        ));
        assert!(matches!(
            resolved(r#"url = "${server.host""#),
            Err(ConfigError::UnclosedReference)
        ));
    }
}
