//! Shell text composition for commands sent into panes.
//!
//! # Example
//!
//! ```
//! use muxwright::shell::{compose, quote};
//!
//! let env = vec![("PORT".to_string(), "8080".to_string())];
//! assert_eq!(compose("cargo run", &env, true), "export PORT=8080; cargo run");
//! assert_eq!(compose("cargo run", &[], false), " cargo run");
//! assert_eq!(quote("it's"), r#"'it'\''s'"#);
//! ```

/// Quote a word for POSIX sh, leaving plain words untouched.
pub fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// `export K=V ...;` prefix for an environment, or an empty string.
pub fn exports(env: &[(String, String)]) -> String {
    if env.is_empty() {
        return String::new();
    }
    let assignments: Vec<String> = env
        .iter()
        .map(|(key, value)| format!("{}={}", key, quote(value)))
        .collect();
    format!("export {};", assignments.join(" "))
}

/// Apply the history convention: a leading space keeps the line out of the
/// history of shells using `ignorespace`.
pub fn with_history(line: &str, history: bool) -> String {
    if history || line.is_empty() {
        line.to_string()
    } else {
        format!(" {}", line)
    }
}

/// Build the full line for a command run with `env`.
pub fn compose(command: &str, env: &[(String, String)], history: bool) -> String {
    let exports = exports(env);
    let line = match (exports.is_empty(), command.is_empty()) {
        (true, _) => command.to_string(),
        (false, true) => exports,
        (false, false) => format!("{} {}", exports, command),
    };
    with_history(&line, history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("/tmp/a-b_c"), "/tmp/a-b_c");
        assert_eq!(quote("two words"), "'two words'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_exports() {
        let env = vec![
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "x y".to_string()),
        ];
        assert_eq!(exports(&env), "export A=1 B='x y';");
        assert_eq!(exports(&[]), "");
    }

    #[test]
    fn test_compose() {
        let env = vec![("A".to_string(), "1".to_string())];
        assert_eq!(compose("run", &env, true), "export A=1; run");
        assert_eq!(compose("run", &env, false), " export A=1; run");
        assert_eq!(compose("", &env, true), "export A=1;");
        assert_eq!(compose("", &[], false), "");
    }
}
