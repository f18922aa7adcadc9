//! Per-year counts tables hanging off the AV, e-book and e-journal list records.

use serde::{Deserialize, Serialize};

/// Accepted on the wire as the short name (`"av"`) or the table name (`"list_av_counts"`),
/// case-insensitive. Serialized as the short name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum CountsTable {
    Av,
    Ebook,
    Ejournal,
}

impl CountsTable {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "av" | "list_av_counts" => Some(CountsTable::Av),
            "ebook" | "list_ebook_counts" => Some(CountsTable::Ebook),
            "ejournal" | "list_ejournal_counts" => Some(CountsTable::Ejournal),
            _ => None,
        }
    }

    /// SQL table name. Only ever one of these constants, so it is safe to splice into queries.
    pub fn table_name(&self) -> &'static str {
        match self {
            CountsTable::Av => "list_av_counts",
            CountsTable::Ebook => "list_ebook_counts",
            CountsTable::Ejournal => "list_ejournal_counts",
        }
    }

    /// Column referencing the parent list record.
    pub fn record_column(&self) -> &'static str {
        match self {
            CountsTable::Av => "listav",
            CountsTable::Ebook => "listebook",
            CountsTable::Ejournal => "listejournal",
        }
    }

    /// Columns carried forward when a row is copied into a new year.
    pub fn value_columns(&self) -> &'static [&'static str] {
        match self {
            CountsTable::Av => &["titles"],
            CountsTable::Ebook => &["titles", "volumes"],
            CountsTable::Ejournal => &["titles", "subscriptions"],
        }
    }
}

impl TryFrom<String> for CountsTable {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CountsTable::from_str(&value).ok_or_else(|| {
            format!("unknown table `{}`, expected av, ebook or ejournal", value)
        })
    }
}

impl std::fmt::Display for CountsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_short_and_table_names() {
        assert_eq!(CountsTable::from_str("AV"), Some(CountsTable::Av));
        assert_eq!(CountsTable::from_str("list_ebook_counts"), Some(CountsTable::Ebook));
        assert_eq!(CountsTable::from_str("fiscal_support"), None);
    }

    #[test]
    fn deserializes_through_the_same_names() {
        let t: CountsTable = serde_json::from_str(r#""list_ebook_counts""#).unwrap();
        assert_eq!(t, CountsTable::Ebook);
        let t: CountsTable = serde_json::from_str(r#""EJournal""#).unwrap();
        assert_eq!(t, CountsTable::Ejournal);

        let err = serde_json::from_str::<CountsTable>(r#""fiscal""#).unwrap_err();
        assert!(err.to_string().contains("unknown table `fiscal`"));
        assert_eq!(serde_json::to_string(&CountsTable::Av).unwrap(), r#""av""#);
    }

    #[test]
    fn every_table_carries_titles() {
        for t in [CountsTable::Av, CountsTable::Ebook, CountsTable::Ejournal] {
            assert!(t.value_columns().contains(&"titles"));
            assert!(t.table_name().ends_with("_counts"));
        }
    }
}
