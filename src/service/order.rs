//! Ordering: parse the `order` query parameter into sort terms, falling back
//! to the model's default sort when the parameter is absent.

use crate::model::{MetaModel, SortDirection, SortTerm};
use crate::service::translate::TranslationMap;

/// Resolved ordering for a list request.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderSpec {
    /// No ORDER BY clause at all (`order=1`).
    Natural,
    Terms(Vec<SortTerm>),
}

impl OrderSpec {
    pub fn terms(&self) -> &[SortTerm] {
        match self {
            OrderSpec::Natural => &[],
            OrderSpec::Terms(terms) => terms,
        }
    }
}

/// Parse the `order` parameter. Terms are comma separated; a `-` prefix or a
/// case-insensitive ` desc` suffix sorts descending, an ` asc` suffix sorts
/// ascending, and unmarked terms leave the direction to the storage engine.
/// Field names are external and translated back to internal names.
pub fn resolve_order(
    order_param: Option<&str>,
    reverse_map: &TranslationMap,
    meta: &MetaModel,
) -> OrderSpec {
    let Some(raw) = order_param else {
        return OrderSpec::Terms(meta.default_sort.clone());
    };

    if raw.trim() == "1" {
        return OrderSpec::Natural;
    }

    let mut terms = Vec::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (name, direction) = parse_term(token);
        terms.push(SortTerm {
            field: reverse_map.name(name).to_string(),
            direction,
        });
    }
    OrderSpec::Terms(terms)
}

fn parse_term(token: &str) -> (&str, Option<SortDirection>) {
    if let Some(rest) = token.strip_prefix('-') {
        return (rest.trim(), Some(SortDirection::Desc));
    }
    if let Some(name) = strip_suffix_ci(token, " desc") {
        return (name.trim_end(), Some(SortDirection::Desc));
    }
    if let Some(name) = strip_suffix_ci(token, " asc") {
        return (name.trim_end(), Some(SortDirection::Asc));
    }
    (token, None)
}

/// Case-insensitive ASCII suffix strip that never splits a multi-byte
/// character in the head.
fn strip_suffix_ci<'a>(token: &'a str, suffix: &str) -> Option<&'a str> {
    let split = token.len().checked_sub(suffix.len())?;
    if !token.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = token.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldMeta, FieldType};

    fn meta() -> MetaModel {
        let mut meta = MetaModel::new("tokens");
        meta.fields.push(FieldMeta {
            api_name: Some("validFrom".into()),
            ..FieldMeta::new("gto_valid_from", FieldType::DateTime)
        });
        meta.fields.push(FieldMeta::new("gto_round_order", FieldType::Numeric));
        meta.default_sort = vec![SortTerm::asc("gto_round_order")];
        meta
    }

    #[test]
    fn absent_parameter_uses_model_default() {
        let meta = meta();
        let rev = TranslationMap::build(&meta).reverse();
        let spec = resolve_order(None, &rev, &meta);
        assert_eq!(spec, OrderSpec::Terms(vec![SortTerm::asc("gto_round_order")]));
    }

    #[test]
    fn literal_one_means_no_ordering() {
        let meta = meta();
        let rev = TranslationMap::build(&meta).reverse();
        assert_eq!(resolve_order(Some("1"), &rev, &meta), OrderSpec::Natural);
    }

    #[test]
    fn prefixes_suffixes_and_translation() {
        let meta = meta();
        let rev = TranslationMap::build(&meta).reverse();
        let spec = resolve_order(
            Some("-validFrom, gto_round_order ASC, gto_round_order desc"),
            &rev,
            &meta,
        );
        assert_eq!(
            spec,
            OrderSpec::Terms(vec![
                SortTerm::desc("gto_valid_from"),
                SortTerm::asc("gto_round_order"),
                SortTerm::desc("gto_round_order"),
            ])
        );
    }

    #[test]
    fn multibyte_terms_never_split_mid_character() {
        let meta = meta();
        let rev = TranslationMap::build(&meta).reverse();
        assert_eq!(
            resolve_order(Some("ẞ desc"), &rev, &meta),
            OrderSpec::Terms(vec![SortTerm::desc("ẞ")])
        );
        // Suffix-length split would land inside a character here.
        assert_eq!(
            resolve_order(Some("ẞẞ"), &rev, &meta),
            OrderSpec::Terms(vec![SortTerm { field: "ẞẞ".into(), direction: None }])
        );
    }

    #[test]
    fn unmarked_terms_have_no_direction() {
        let meta = meta();
        let rev = TranslationMap::build(&meta).reverse();
        let spec = resolve_order(Some("gto_round_order"), &rev, &meta);
        assert_eq!(
            spec,
            OrderSpec::Terms(vec![SortTerm {
                field: "gto_round_order".into(),
                direction: None
            }])
        );
    }
}
