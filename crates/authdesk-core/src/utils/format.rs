/// Shown in place of a token that is not present
pub const TOKEN_PLACEHOLDER: &str = "(none)";

/// Number of leading characters kept when shortening a token
const TOKEN_HEAD_CHARS: usize = 10;

/// Number of trailing characters kept when shortening a token
const TOKEN_TAIL_CHARS: usize = 5;

/// Format a token for display, showing only its ends.
///
/// Tokens of up to 10 characters are returned unchanged; longer ones become
/// the first 10 characters, `...`, and the last 5 characters.
pub fn format_token(token: Option<&str>) -> String {
    let Some(token) = token else {
        return TOKEN_PLACEHOLDER.to_string();
    };

    let len = token.chars().count();
    if len <= TOKEN_HEAD_CHARS {
        return token.to_string();
    }

    let head: String = token.chars().take(TOKEN_HEAD_CHARS).collect();
    let tail: String = token.chars().skip(len - TOKEN_TAIL_CHARS).collect();
    format!("{}...{}", head, tail)
}
