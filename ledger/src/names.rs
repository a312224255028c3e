//! Account name and asset symbol rules.

const MAX_NAME_LEN: usize = 63;
const MIN_SYMBOL_LEN: usize = 3;
const MAX_SYMBOL_LEN: usize = 8;
const MAX_FULL_SYMBOL_LEN: usize = 12;

/// Account names: dot-separated labels of lowercase letters, digits and
/// `-`, each starting with a letter and ending with a letter or digit.
/// `alice` and `shop.alice` are valid; `Alice`, `1abc` and `bob-` are not.
pub fn is_valid_account_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    name.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    first.is_ascii_lowercase()
        && (last.is_ascii_lowercase() || last.is_ascii_digit())
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

/// The parent of a dotted account name (`shop.alice` → `alice`).
pub fn parent_name(name: &str) -> Option<&str> {
    name.split_once('.').map(|(_, parent)| parent)
}

/// Asset symbols: 3 to 8 uppercase letters, optionally followed by `.SUB`
/// of uppercase letters or digits, at most 12 characters in total.
pub fn is_valid_symbol(symbol: &str) -> bool {
    if symbol.len() > MAX_FULL_SYMBOL_LEN {
        return false;
    }
    let (root, sub) = match symbol.split_once('.') {
        Some((root, sub)) => (root, Some(sub)),
        None => (symbol, None),
    };
    let root_ok = (MIN_SYMBOL_LEN..=MAX_SYMBOL_LEN).contains(&root.len())
        && root.bytes().all(|b| b.is_ascii_uppercase());
    let sub_ok = sub.map_or(true, |s| {
        !s.is_empty() && s.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    });
    root_ok && sub_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_names() {
        for ok in ["alice", "a", "bob-2", "shop.alice", "x1.y2.z3"] {
            assert!(is_valid_account_name(ok), "{ok}");
        }
        for bad in ["", "Alice", "1abc", "bob-", "-bob", "a..b", ".a", "a_b"] {
            assert!(!is_valid_account_name(bad), "{bad}");
        }
        assert!(!is_valid_account_name(&"a".repeat(64)));
        assert_eq!(parent_name("shop.alice"), Some("alice"));
        assert_eq!(parent_name("alice"), None);
    }

    #[test]
    fn asset_symbols() {
        for ok in ["XTS", "GOLD", "ABCDEFGH", "GOLD.V2"] {
            assert!(is_valid_symbol(ok), "{ok}");
        }
        for bad in ["XT", "ABCDEFGHI", "gold", "GOLD.", "GOLD.v2", "GOLD1", "ABCDEFGH.XYZW"] {
            assert!(!is_valid_symbol(bad), "{bad}");
        }
    }
}
