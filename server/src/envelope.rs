use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Empty result form")]
    EmptyForm,
    #[error("Missing content field")]
    MissingContent,
    #[error("Content is not valid JSON")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Content is not a quoted string literal")]
    MalformedLiteral,
}

/// one decoded result envelope, as posted back by a worker for a single slice
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope {
    pub element_type: Option<String>,
    pub element: Option<String>,
    pub content_type: Option<String>,
    pub content: Value,
}

impl ResultEnvelope {
    /// decode the form-encoded envelope a worker posts for one slice
    ///
    /// The `content` field is interpreted according to `contentType`:
    /// JSON serialized inside the form string for `application/json`, a
    /// quoted string literal for `text/plain`, and passed through raw
    /// for anything else.
    pub fn decode(form: &[(String, String)]) -> Result<Self, EnvelopeError> {
        if form.is_empty() {
            return Err(EnvelopeError::EmptyForm);
        }

        let content_type = first(form, "contentType");
        let raw_content = first(form, "content").ok_or(EnvelopeError::MissingContent)?;

        let content = match content_type {
            Some("application/json") => serde_json::from_str(raw_content)?,
            Some("text/plain") => Value::String(parse_string_literal(raw_content)?),
            _ => Value::String(raw_content.to_owned()),
        };

        Ok(Self {
            element_type: first(form, "elementType").map(str::to_owned),
            element: first(form, "element").map(str::to_owned),
            content_type: content_type.map(str::to_owned),
            content,
        })
    }
}

/// first value for a key, repeated fields beyond the first are ignored
fn first<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

/// strip the wrapping quotes from a string literal and process its escapes
///
/// Workers serialize `text/plain` content as a single- or double-quoted
/// literal with backslash escapes, so `'a\tb'` decodes to `a<TAB>b`.
fn parse_string_literal(raw: &str) -> Result<String, EnvelopeError> {
    let raw = raw.trim();
    let mut chars = raw.chars();

    let quote = match chars.next() {
        Some(quote @ ('\'' | '"')) => quote,
        _ => return Err(EnvelopeError::MalformedLiteral),
    };
    if raw.len() < 2 || !raw.ends_with(quote) {
        return Err(EnvelopeError::MalformedLiteral);
    }

    let mut out = String::with_capacity(raw.len() - 2);
    let mut chars = raw[1..raw.len() - 1].chars();

    while let Some(current) = chars.next() {
        if current == quote {
            // a bare closing quote inside the body means we matched the wrong end
            return Err(EnvelopeError::MalformedLiteral);
        }
        if current != '\\' {
            out.push(current);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(escaped @ ('\\' | '\'' | '"')) => out.push(escaped),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let code =
                    u8::from_str_radix(&hex, 16).map_err(|_| EnvelopeError::MalformedLiteral)?;
                out.push(code as char);
            }
            _ => return Err(EnvelopeError::MalformedLiteral),
        }
    }

    Ok(out)
}
