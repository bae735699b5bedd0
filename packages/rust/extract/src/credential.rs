//! Author credential field naming.
//!
//! Credential rows in the author panel carry a generic class plus a
//! type-specific one, e.g. `class="AboutListItem WorkCredentialListItem"`.
//! The type-specific class becomes the field name:
//!
//! | class                            | field                  |
//! |----------------------------------|------------------------|
//! | `WorkCredentialListItem`         | `work_credential`      |
//! | `SchoolCredentialListItem`       | `school_credential`    |
//! | `LocationCredentialListItem`     | `location_credential`  |
//! | `LanguageCredentialListItem`     | `language_credential`  |
//! | `AnswerViewsListItem`            | `answer_views`         |
//! | `JoinedSpaceListItem`            | `joined_space`         |
//!
//! Class names that do not have the `<CamelCase>ListItem` shape are not
//! recognized, and the row is skipped instead of guessing a name.

/// Generic classes present on every row; never a field name.
const NOISE_CLASSES: [&str; 2] = ["AboutListItem", "CredentialListItem"];

/// Suffix shared by every row class.
const ROW_SUFFIX: &str = "ListItem";

/// Derive the field name for a credential row from its class list.
///
/// Takes the first class that is not generic noise, strips the `ListItem`
/// suffix, and converts the remaining CamelCase token to snake_case.
pub fn credential_field_name<'a>(classes: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let class = classes
        .into_iter()
        .find(|c| !c.is_empty() && !NOISE_CLASSES.contains(c))?;
    let token = class.strip_suffix(ROW_SUFFIX)?;
    if !is_camel_case(token) {
        return None;
    }
    Some(camel_to_snake(token))
}

/// Upper-case first letter, ASCII alphanumerics only.
fn is_camel_case(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric())
}

/// `WorkCredential` -> `work_credential`.
pub fn camel_to_snake(token: &str) -> String {
    let mut out = String::with_capacity(token.len() + 4);
    for (i, c) in token.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
