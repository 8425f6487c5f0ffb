//! Company scoping.
//!
//! Every query the engine runs is scoped to one or more companies. The scope is
//! an explicit value passed by the caller and turned into a plain predicate.

use serde::{Deserialize, Serialize};
use tally_shared::types::CompanyId;

/// Anything owned by exactly one company.
pub trait CompanyScoped {
    /// The owning company.
    fn company_id(&self) -> &CompanyId;
}

/// Which companies a read covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "companies", rename_all = "snake_case")]
pub enum CompanyScope {
    /// A single company.
    Single(CompanyId),
    /// An explicit set of companies (consolidated views).
    Many(Vec<CompanyId>),
    /// Every company. Reserved for month-end tooling.
    All,
}

impl CompanyScope {
    /// Returns true if the scope covers `company`.
    #[must_use]
    pub fn includes(&self, company: &CompanyId) -> bool {
        match self {
            Self::Single(id) => id == company,
            Self::Many(ids) => ids.contains(company),
            Self::All => true,
        }
    }

    /// Returns a typed predicate selecting records inside this scope.
    pub fn filter<T: CompanyScoped>(&self) -> impl Fn(&T) -> bool + '_ {
        move |record: &T| self.includes(record.company_id())
    }

    /// The explicit company list, or `None` for [`CompanyScope::All`].
    #[must_use]
    pub fn companies(&self) -> Option<Vec<CompanyId>> {
        match self {
            Self::Single(id) => Some(vec![id.clone()]),
            Self::Many(ids) => Some(ids.clone()),
            Self::All => None,
        }
    }
}

impl From<CompanyId> for CompanyScope {
    fn from(id: CompanyId) -> Self {
        Self::Single(id)
    }
}
