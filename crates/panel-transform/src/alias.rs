//! Column alias resolution.
//!
//! Source sheets spell the same column several ways (`city`, `City`,
//! `prefecture`). Resolution runs once, right after ingestion, and renames
//! whichever spelling is present to the canonical name so later stages only
//! see canonical names.

use std::collections::BTreeMap;

use tracing::debug;

use panel_model::CaseInsensitiveSet;

use crate::error::{PanelError, Result};
use crate::frame::TabularDataset;

/// One applied rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasResolution {
    pub canonical: String,
    /// Column name as spelled in the source.
    pub found: String,
}

/// Renames the first present candidate of each canonical name to that name.
///
/// The canonical name itself is tried first, then the candidates in declared
/// order. Each candidate matches a column of the same spelling if there is
/// one, otherwise any column equal to it ignoring case. Fails with
/// [`PanelError::MissingColumns`] listing every canonical name with no
/// present candidate; no rename is applied in that case.
pub fn resolve_aliases(
    dataset: &TabularDataset,
    aliases: &BTreeMap<String, Vec<String>>,
) -> Result<(TabularDataset, Vec<AliasResolution>)> {
    let present = CaseInsensitiveSet::new(dataset.columns());
    let mut resolutions = Vec::new();
    let mut missing = Vec::new();

    for (canonical, candidates) in aliases {
        let candidates =
            std::iter::once(canonical.as_str()).chain(candidates.iter().map(String::as_str));
        match present.first_present(candidates) {
            Some(found) => resolutions.push(AliasResolution {
                canonical: canonical.clone(),
                found: found.to_string(),
            }),
            None => missing.push(canonical.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(PanelError::MissingColumns { columns: missing });
    }

    let mut resolved = dataset.clone();
    for resolution in &resolutions {
        if resolution.found != resolution.canonical {
            debug!(
                dataset = %dataset.name(),
                from = %resolution.found,
                to = %resolution.canonical,
                "resolved column alias"
            );
            resolved = resolved.rename_column(&resolution.found, &resolution.canonical)?;
        }
    }
    Ok((resolved, resolutions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::CellValue;

    fn sheet() -> TabularDataset {
        TabularDataset::from_rows(
            "sheet",
            &["Prefecture", "YEAR", "value"],
            vec![vec!["Hangzhou".into(), 2019.into(), CellValue::Missing]],
        )
        .unwrap()
    }

    fn aliases(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(canonical, candidates)| {
                (
                    canonical.to_string(),
                    candidates.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn renames_first_present_candidate() {
        let (ds, resolutions) = resolve_aliases(
            &sheet(),
            &aliases(&[("city", &["town", "prefecture"]), ("year", &[])]),
        )
        .unwrap();
        assert_eq!(ds.columns(), vec!["city", "year", "value"]);
        assert_eq!(resolutions.len(), 2);
        assert_eq!(resolutions[0].found, "Prefecture");
    }

    #[test]
    fn canonical_name_wins_over_candidates() {
        let ds = TabularDataset::from_rows(
            "sheet",
            &["city", "prefecture"],
            vec![vec!["Hangzhou".into(), "Ningbo".into()]],
        )
        .unwrap();
        let (resolved, _) =
            resolve_aliases(&ds, &aliases(&[("city", &["prefecture"])])).unwrap();
        assert_eq!(resolved.cell("city", 0).unwrap(), CellValue::from("Hangzhou"));
        assert!(resolved.has_column("prefecture"));
    }

    #[test]
    fn exact_spelling_wins_over_case_variants() {
        let ds = TabularDataset::from_rows(
            "sheet",
            &["City", "city"],
            vec![vec!["Hangzhou City".into(), "Hangzhou".into()]],
        )
        .unwrap();
        let (resolved, resolutions) = resolve_aliases(&ds, &aliases(&[("city", &[])])).unwrap();
        assert_eq!(resolutions[0].found, "city");
        assert_eq!(resolved.columns(), vec!["City", "city"]);
        assert_eq!(resolved.cell("city", 0).unwrap(), CellValue::from("Hangzhou"));
    }

    #[test]
    fn reports_every_unresolved_name() {
        let err = resolve_aliases(
            &sheet(),
            &aliases(&[("industry", &["sector"]), ("province", &[]), ("city", &["prefecture"])]),
        )
        .unwrap_err();
        match err {
            PanelError::MissingColumns { columns } => {
                assert_eq!(columns, vec!["industry", "province"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
