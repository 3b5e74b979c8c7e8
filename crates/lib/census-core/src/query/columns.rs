use std::collections::HashSet;

/// Column projection requested for an obs/var read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSelection {
    /// No restriction; every column the source has.
    #[default]
    All,
    /// Distinct names in request order.
    Only(Vec<String>),
}

impl ColumnSelection {
    /// Parses a comma-separated column list.
    ///
    /// Names are trimmed, blanks dropped and duplicates removed. An absent or
    /// empty list selects all columns.
    #[must_use]
    pub fn parse(input: Option<&str>) -> Self {
        let Some(input) = input else {
            return Self::All;
        };

        let mut seen = HashSet::new();
        let names: Vec<String> = input
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            Self::All
        } else {
            Self::Only(names)
        }
    }

    #[must_use]
    pub fn names(&self) -> Option<&[String]> {
        match self {
            Self::All => None,
            Self::Only(names) => Some(names),
        }
    }

    /// Indices of `available` columns this selection keeps.
    ///
    /// Requested names the source does not have are skipped, so the result is
    /// the intersection in request order.
    #[must_use]
    pub fn project(&self, available: &[String]) -> Vec<usize> {
        match self {
            Self::All => (0..available.len()).collect(),
            Self::Only(names) => names
                .iter()
                .filter_map(|name| available.iter().position(|column| column == name))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn absent_or_blank_selects_all() {
        assert_eq!(ColumnSelection::parse(None), ColumnSelection::All);
        assert_eq!(ColumnSelection::parse(Some("")), ColumnSelection::All);
        assert_eq!(ColumnSelection::parse(Some(" , ,")), ColumnSelection::All);
    }

    #[test]
    fn names_are_trimmed_and_deduplicated_in_order() {
        let selection = ColumnSelection::parse(Some(" tissue,cell_type , tissue,,sex"));
        assert_eq!(
            selection.names(),
            Some(columns(&["tissue", "cell_type", "sex"]).as_slice())
        );
    }

    #[test]
    fn projection_is_intersection_in_request_order() {
        let available = columns(&["soma_joinid", "cell_type", "tissue"]);
        let selection = ColumnSelection::parse(Some("tissue,missing,cell_type"));
        assert_eq!(selection.project(&available), vec![2, 1]);
        assert_eq!(ColumnSelection::All.project(&available), vec![0, 1, 2]);
    }
}
