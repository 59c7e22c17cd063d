//! Case conversion for API: request keys camelCase -> snake_case (for DB), response keys snake_case -> camelCase (for client).
//! Also lenient key matching for form fields and item JSON sent as PascalCase or snake_case.

use serde_json::{Map, Value};

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "mail_id" -> "mailId", "created_date" -> "createdDate"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "mailId" -> "mail_id", "priceMin" -> "price_min"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert all keys of a JSON object from snake_case to camelCase (in place).
/// Used for API responses so the client receives camelCase keys.
pub fn object_keys_to_camel_case(obj: &mut Map<String, Value>) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let camel = to_camel_case(&k);
        if camel != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert(camel, v);
            }
        }
    }
}

/// Convert all keys of a JSON object from camelCase to snake_case (in place).
/// Used for request bodies so we use snake_case for DB column names.
pub fn object_keys_to_snake_case(obj: &mut Map<String, Value>) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let snake = to_snake_case(&k);
        if snake != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert(snake, v);
            }
        }
    }
}

/// Key comparison that ignores ASCII case and underscores: "SODate", "so_date" and "soDate" are equal.
pub fn loose_eq(a: &str, b: &str) -> bool {
    let mut left = a.chars().filter(|c| *c != '_');
    let mut right = b.chars().filter(|c| *c != '_');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x.eq_ignore_ascii_case(&y) => {}
            _ => return false,
        }
    }
}

/// Rename keys that loosely match one of `known` to that canonical spelling (in place).
/// Unknown keys are left untouched.
pub fn canonicalize_keys(obj: &mut Map<String, Value>, known: &[&str]) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let Some(canonical) = known.iter().find(|c| loose_eq(c, &k)) else { continue };
        if *canonical != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert((*canonical).to_string(), v);
            }
        }
    }
}
