use crate::models::Binding;

const PLACEHOLDER: char = '?';

/// How text bindings are turned into SQL literals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiteralPolicy {
    /// Wrap in single quotes as-is. Embedded quotes are NOT escaped, so
    /// bindings must come from a trusted source.
    #[default]
    Verbatim,
    /// Wrap in single quotes after `escape_literal`
    EscapeQuotes,
}

/// Double every single quote so the value stays inside its literal
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Whether a text binding reads as a number and is written bare
pub fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }

    let mut chars = trimmed.chars().peekable();
    if matches!(chars.peek(), Some('+') | Some('-')) {
        chars.next();
    }

    let mut digits = 0;
    let mut seen_dot = false;
    while let Some(&c) = chars.peek() {
        match c {
            '0'..='9' => digits += 1,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        chars.next();
    }
    if digits == 0 {
        return false;
    }

    if matches!(chars.peek(), Some('e') | Some('E')) {
        chars.next();
        if matches!(chars.peek(), Some('+') | Some('-')) {
            chars.next();
        }
        let mut exponent_digits = 0;
        while let Some(c) = chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            exponent_digits += 1;
            chars.next();
        }
        if exponent_digits == 0 {
            return false;
        }
    }

    chars.next().is_none()
}

/// Replaces positional `?` placeholders with literal values, left to right
pub struct BindingSubstitutor {
    policy: LiteralPolicy,
}

impl BindingSubstitutor {
    pub fn new(policy: LiteralPolicy) -> Self {
        Self { policy }
    }

    /// Render one binding as a SQL literal
    pub fn literal(&self, binding: &Binding) -> String {
        match binding {
            Binding::Integer(value) => value.to_string(),
            // NaN and infinities have no bare SQL form
            Binding::Float(value) if !value.is_finite() => format!("'{}'", value),
            Binding::Float(value) => value.to_string(),
            Binding::Bool(value) => if *value { "1" } else { "0" }.to_string(),
            Binding::Text(value) if is_numeric(value) => value.clone(),
            Binding::Text(value) => match self.policy {
                LiteralPolicy::Verbatim => format!("'{}'", value),
                LiteralPolicy::EscapeQuotes => format!("'{}'", escape_literal(value)),
            },
        }
    }

    /// Substitute bindings in order. Leftover placeholders stay in the text and
    /// leftover bindings are ignored.
    pub fn substitute(&self, sql: &str, bindings: &[Binding]) -> String {
        let mut output = String::with_capacity(sql.len());
        let mut rest = sql;

        for (index, binding) in bindings.iter().enumerate() {
            let Some(position) = rest.find(PLACEHOLDER) else {
                tracing::debug!(
                    "{} binding(s) left without a placeholder",
                    bindings.len() - index
                );
                break;
            };
            output.push_str(&rest[..position]);
            output.push_str(&self.literal(binding));
            rest = &rest[position + PLACEHOLDER.len_utf8()..];
        }

        output.push_str(rest);
        output
    }
}

impl Default for BindingSubstitutor {
    fn default() -> Self {
        Self::new(LiteralPolicy::default())
    }
}
