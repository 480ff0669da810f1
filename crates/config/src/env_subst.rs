/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// Unresolvable or malformed placeholders are left untouched.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        match tail.find('}') {
            Some(end) if end > 0 => {
                let name = &tail[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &tail[end + 1..];
            },
            _ => {
                // No closing brace (or empty name): emit literally and stop scanning.
                out.push_str(&rest[start..]);
                return out;
            },
        }
    }

    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn fake_env(name: &str) -> Option<String> {
        match name {
            "APP_SECRET" => Some("s3cret".to_string()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn replaces_known_and_keeps_unknown() {
        assert_eq!(
            substitute_with("appSecret = \"${APP_SECRET}\", other = \"${MISSING}\"", fake_env),
            "appSecret = \"s3cret\", other = \"${MISSING}\""
        );
    }

    #[test]
    fn empty_value_substitutes_to_nothing() {
        assert_eq!(substitute_with("x${EMPTY}y", fake_env), "xy");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_with("tail ${APP_SECRET", fake_env), "tail ${APP_SECRET");
        assert_eq!(substitute_with("${}", fake_env), "${}");
    }
}
