use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Which field of an expense row a [`Column`] refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    PolicyId,
    Year,
    Amount,
    BirthYear,
    Drug,
    Procedure,
    Diagnosis,
    /// Any additional categorical column, keyed by its normalized header.
    Attribute(String),
}

/// A column of the expense table, addressed by its canonical name or one of the
/// German export headers (`Versnr`, `Jahr`, `Ausgaben`, ...).
///
/// The label keeps the spelling the caller used, so titles and report headers
/// read `Medikament` when that is what was asked for. Equality only looks at
/// the kind.
#[derive(Debug, Clone)]
pub struct Column {
    kind: ColumnKind,
    label: Cow<'static, str>,
}

impl Column {
    pub const POLICY_ID: Column = Column::builtin(ColumnKind::PolicyId, "PolicyId");
    pub const YEAR: Column = Column::builtin(ColumnKind::Year, "Year");
    pub const AMOUNT: Column = Column::builtin(ColumnKind::Amount, "Amount");
    pub const BIRTH_YEAR: Column = Column::builtin(ColumnKind::BirthYear, "BirthYear");
    pub const DRUG: Column = Column::builtin(ColumnKind::Drug, "Drug");
    pub const PROCEDURE: Column = Column::builtin(ColumnKind::Procedure, "Procedure");
    pub const DIAGNOSIS: Column = Column::builtin(ColumnKind::Diagnosis, "Diagnosis");

    const fn builtin(kind: ColumnKind, label: &'static str) -> Self {
        Self {
            kind,
            label: Cow::Borrowed(label),
        }
    }

    pub fn parse(raw: &str) -> Self {
        let key = normalize_key(raw);
        let kind = match key.as_str() {
            "policyid" | "policy" | "versnr" => ColumnKind::PolicyId,
            "year" | "jahr" => ColumnKind::Year,
            "amount" | "ausgaben" => ColumnKind::Amount,
            "birthyear" | "gebjahr" => ColumnKind::BirthYear,
            "drug" | "medikament" => ColumnKind::Drug,
            "procedure" | "eingriff" => ColumnKind::Procedure,
            "diagnosis" | "diagnose" => ColumnKind::Diagnosis,
            _ => ColumnKind::Attribute(key),
        };

        Self {
            kind,
            label: Cow::Owned(raw.trim().to_string()),
        }
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// The name as the caller spelled it.
    pub fn name(&self) -> &str {
        &self.label
    }

    pub fn canonical_name(&self) -> &str {
        match &self.kind {
            ColumnKind::PolicyId => "PolicyId",
            ColumnKind::Year => "Year",
            ColumnKind::Amount => "Amount",
            ColumnKind::BirthYear => "BirthYear",
            ColumnKind::Drug => "Drug",
            ColumnKind::Procedure => "Procedure",
            ColumnKind::Diagnosis => "Diagnosis",
            ColumnKind::Attribute(_) => &self.label,
        }
    }

    /// Only `Amount` is continuous; everything else may serve as a grouping key.
    pub fn is_categorical(&self) -> bool {
        self.kind != ColumnKind::Amount
    }

    pub(crate) fn matches_key(&self, raw: &str) -> bool {
        match &self.kind {
            ColumnKind::Attribute(key) => *key == normalize_key(raw),
            other => Column::parse(raw).kind == *other,
        }
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Column {}

impl Hash for Column {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl From<&str> for Column {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !matches!(ch, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}
