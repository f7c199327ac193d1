use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ResolutionError;

/// Normalized company identity handed to adapters and used as the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Company {
    /// Case-folded canonical name, e.g. "saab"
    pub key: String,
    /// Display name, e.g. "SAAB"
    pub name: String,
    /// Exchange ticker when the input was one, e.g. "SAAB-B.ST"
    pub ticker: Option<String>,
}

/// Canonical names for the alias spellings seen in reports and inputs.
const ALIASES: &[(&str, &str)] = &[
    ("intellego", "Intellego Technologies"),
    ("intellego technologies", "Intellego Technologies"),
    ("intellego technologies ab", "Intellego Technologies"),
    ("saab", "SAAB"),
    ("saab ab", "SAAB"),
    ("saab b", "SAAB"),
    ("saab (b stock)", "SAAB"),
    ("saab (b)", "SAAB"),
    ("bioarctic", "BioArctic"),
    ("bioarctic ab", "BioArctic"),
    ("bioarctic (b stock)", "BioArctic"),
    ("bioarctic b", "BioArctic"),
    ("bioarctic ab class b", "BioArctic"),
];

/// Stockholm exchange tickers of the screened universe.
const TICKERS: &[(&str, &str)] = &[
    ("BIOA-B.ST", "BioArctic"),
    ("SAAB-B.ST", "SAAB"),
    ("INT.ST", "Intellego Technologies"),
    ("VOLV-B.ST", "Volvo"),
    ("EVO.ST", "Evolution Gaming"),
    ("ERIC-B.ST", "Ericsson"),
    ("NDA-SE.ST", "Nordea"),
    ("TELIA.ST", "Telia"),
    ("SAND.ST", "Sandvik"),
    ("ASSA-B.ST", "Assa Abloy"),
    ("ATCO-A.ST", "Atlas Copco A"),
    ("ATCO-B.ST", "Atlas Copco B"),
];

/// Maps free-text names and tickers onto canonical companies
#[derive(Debug, Clone)]
pub struct CompanyDirectory {
    aliases: HashMap<String, String>,
    tickers: HashMap<String, String>,
}

impl Default for CompanyDirectory {
    fn default() -> Self {
        let mut directory = Self::empty();
        for (alias, name) in ALIASES {
            directory.add_alias(alias, name);
        }
        for (ticker, name) in TICKERS {
            directory.add_ticker(ticker, name);
        }
        directory
    }
}

impl CompanyDirectory {
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
            tickers: HashMap::new(),
        }
    }

    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(alias.trim().to_lowercase(), canonical.to_string());
    }

    pub fn add_ticker(&mut self, ticker: &str, canonical: &str) {
        self.tickers
            .insert(ticker.trim().to_uppercase(), canonical.to_string());
    }

    /// Trim, case-fold and map known aliases. Unknown names pass through so
    /// the cascade can still try them.
    pub fn normalize(&self, input: &str) -> Result<Company, ResolutionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ResolutionError::EmptyIdentifier);
        }

        let upper = trimmed.to_uppercase();
        if let Some(name) = self.tickers.get(&upper) {
            return Ok(Self::canonical(name, Some(upper)));
        }

        let folded = trimmed.to_lowercase();
        if let Some(name) = self.aliases.get(&folded) {
            return Ok(Self::canonical(name, None));
        }

        Ok(Company {
            key: folded,
            name: trimmed.to_string(),
            ticker: None,
        })
    }

    fn canonical(name: &str, ticker: Option<String>) -> Company {
        Company {
            key: name.to_lowercase(),
            name: name.to_string(),
            ticker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_map_to_one_key() {
        let dir = CompanyDirectory::default();
        let a = dir.normalize("  SAAB AB ").unwrap();
        let b = dir.normalize("saab (b)").unwrap();
        let c = dir.normalize("SAAB-B.ST").unwrap();
        assert_eq!(a.key, "saab");
        assert_eq!(a.key, b.key);
        assert_eq!(a.key, c.key);
        assert_eq!(c.ticker.as_deref(), Some("SAAB-B.ST"));
        assert_eq!(a.name, "SAAB");
    }

    #[test]
    fn test_ticker_lookup_is_case_insensitive() {
        let dir = CompanyDirectory::default();
        let company = dir.normalize("bioa-b.st").unwrap();
        assert_eq!(company.key, "bioarctic");
        assert_eq!(company.name, "BioArctic");
    }

    #[test]
    fn test_unknown_company_passes_through_folded() {
        let dir = CompanyDirectory::default();
        let company = dir.normalize(" Acme Widgets ").unwrap();
        assert_eq!(company.key, "acme widgets");
        assert_eq!(company.name, "Acme Widgets");
        assert!(company.ticker.is_none());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let dir = CompanyDirectory::default();
        assert!(matches!(dir.normalize("   "), Err(ResolutionError::EmptyIdentifier)));
    }
}
