//! Domain-component helpers for deriving an account suffix from a base DN.

use thiserror::Error;

use adldap_core::error::Error as CoreError;

/// Attribute name of a domain component RDN.
const DOMAIN_COMPONENT: &str = "dc";

/// Errors that can occur when deriving a domain from a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainComponentError {
    /// The distinguished name contained no `DC=` components.
    #[error("distinguished name `{0}` has no domain components")]
    NoDomainComponents(String),
}

impl From<DomainComponentError> for CoreError {
    fn from(err: DomainComponentError) -> Self {
        match err {
            DomainComponentError::NoDomainComponents(dn) => CoreError::SuffixDerivation(dn),
        }
    }
}

/// Returns the lowercased values of every `DC=` component, in order.
///
/// Attribute names match case-insensitively. Components that are not domain components
/// (`OU=`, `CN=`, ...) and empty `DC=` values are skipped.
#[must_use]
pub fn domain_components(base_dn: &str) -> Vec<String> {
    split_components(base_dn)
        .into_iter()
        .filter_map(|component| {
            let (attribute, value) = component.split_once('=')?;
            if !attribute.trim().eq_ignore_ascii_case(DOMAIN_COMPONENT) {
                return None;
            }
            let value = unescape(value.trim());
            (!value.is_empty()).then(|| value.to_lowercase())
        })
        .collect()
}

/// Derives an `@domain.tld` account suffix from a base DN.
///
/// `DC=corp,DC=example,DC=com` becomes `@corp.example.com`.
///
/// # Errors
///
/// Returns [`DomainComponentError::NoDomainComponents`] when the DN is empty or has no
/// `DC=` components. A guessed suffix would silently corrupt principal names, so there is
/// no fallback.
pub fn account_suffix_from_base_dn(base_dn: &str) -> Result<String, DomainComponentError> {
    let parts = domain_components(base_dn);
    if parts.is_empty() {
        return Err(DomainComponentError::NoDomainComponents(
            base_dn.to_string(),
        ));
    }
    Ok(format!("@{}", parts.join(".")))
}

/// Splits on unescaped commas, trimming each component.
fn split_components(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }

        if ch == '\\' {
            current.push(ch);
            escape = true;
            continue;
        }

        if ch == ',' {
            parts.push(current.trim().to_string());
            current.clear();
            continue;
        }

        current.push(ch);
    }

    parts.push(current.trim().to_string());
    parts.retain(|part| !part.is_empty());
    parts
}

fn unescape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_from_uppercase_dn() {
        assert_eq!(
            account_suffix_from_base_dn("DC=corp,DC=example,DC=com").unwrap(),
            "@corp.example.com"
        );
    }

    #[test]
    fn suffix_ignores_non_domain_components_and_case() {
        assert_eq!(
            account_suffix_from_base_dn("OU=Staff, dc=Corp, Dc=Example,DC=COM").unwrap(),
            "@corp.example.com"
        );
    }

    #[test]
    fn no_domain_components_is_an_error() {
        let err = account_suffix_from_base_dn("CN=Users,OU=Staff").unwrap_err();
        assert_eq!(
            err,
            DomainComponentError::NoDomainComponents("CN=Users,OU=Staff".to_string())
        );
        assert!(account_suffix_from_base_dn("").is_err());

        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::SuffixDerivation(_)));
    }

    #[test]
    fn escaped_comma_stays_inside_component() {
        assert_eq!(
            domain_components("OU=Smith\\, John,DC=a,DC=b"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn empty_domain_value_is_skipped() {
        assert_eq!(domain_components("DC=,DC=b,,"), vec!["b".to_string()]);
    }
}
