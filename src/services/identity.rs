use crate::store::OwnerStore;

/// Digit-only lookup keys for a chat identity such as
/// `+55 (11) 98765-4321` or `551187654321@s.whatsapp.net`.
///
/// Brazilian mobile numbers circulate both with and without the leading 9
/// after the area code, so both forms are tried.
pub fn identity_candidates(identity: &str) -> Vec<String> {
    let local = identity.split('@').next().unwrap_or_default();
    let digits: String = local.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return vec![];
    }

    let mut candidates = vec![digits.clone()];
    if digits.starts_with("55") && (digits.len() == 12 || digits.len() == 13) {
        let (prefix, rest) = digits.split_at(4);
        if digits.len() == 12 {
            candidates.push(format!("{prefix}9{rest}"));
        } else if digits.len() == 13 && rest.starts_with('9') {
            candidates.push(format!("{prefix}{}", &rest[1..]));
        }
    }
    candidates
}

/// First owner registered under any candidate form of `identity`.
pub async fn normalize_and_resolve(
    owners: &dyn OwnerStore,
    identity: &str,
) -> anyhow::Result<Option<String>> {
    for candidate in identity_candidates(identity) {
        if let Some(owner_id) = owners.find_owner_by_identity(&candidate).await? {
            return Ok(Some(owner_id));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_formatting_and_jid_suffix() {
        assert_eq!(identity_candidates("+1 (555) 010-2000"), vec!["15550102000"]);
        assert_eq!(
            identity_candidates("5511987654321@s.whatsapp.net"),
            vec!["5511987654321", "551187654321"]
        );
    }

    #[test]
    fn test_brazilian_ninth_digit_variants() {
        assert_eq!(
            identity_candidates("55 11 8765-4321"),
            vec!["551187654321", "5511987654321"]
        );
        // 13 digits without a leading 9 after the area code: no variant
        assert_eq!(identity_candidates("5511287654321"), vec!["5511287654321"]);
    }

    #[test]
    fn test_empty_identity() {
        assert!(identity_candidates("").is_empty());
        assert!(identity_candidates("@g.us").is_empty());
    }
}
