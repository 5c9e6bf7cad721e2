// Submission validation
//
// The signup form checks email shape before posting. The server only
// insists on presence unless strict email checking is switched on.

/// Shape check used by the signup form: `local@domain.tld` with no whitespace
/// and exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    // The domain needs a dot with something on both sides of at least one of them.
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
