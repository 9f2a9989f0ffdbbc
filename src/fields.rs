//! Indexed fields and their on-disk names

use crate::error::{ConfigError, Result};

/// Name of the division lookup table
pub const DIVISION_FILE: &str = "division.lkp";

/// Name of the entryname index
pub const ENTRYNAM_FILE: &str = "entrynam.idx";

/// An independently indexed attribute
#[derive(Debug, PartialEq, Eq)]
pub struct FieldDef {
    /// Name used by parsers and on the command line
    pub name: &'static str,
    /// Short name of the `.trg` / `.hit` files and the staging extension
    pub index_name: &'static str,
    pub description: &'static str,
}
impl FieldDef {
    #[must_use]
    pub fn target_file(&self) -> String {
        format!("{}.trg", self.index_name)
    }

    #[must_use]
    pub fn hit_file(&self) -> String {
        format!("{}.hit", self.index_name)
    }
}

pub const ACC: FieldDef = FieldDef {
    name: "acc",
    index_name: "acnum",
    description: "accession number",
};
pub const SV: FieldDef = FieldDef {
    name: "sv",
    index_name: "seqvn",
    description: "sequence version",
};
pub const DES: FieldDef = FieldDef {
    name: "des",
    index_name: "des",
    description: "description words",
};
pub const KEY: FieldDef = FieldDef {
    name: "key",
    index_name: "keyword",
    description: "keywords",
};
pub const ORG: FieldDef = FieldDef {
    name: "org",
    index_name: "taxon",
    description: "taxonomy",
};

/// Every field that can be indexed
pub static FIELDS: [FieldDef; 5] = [ACC, SV, DES, KEY, ORG];

/// Looks up a field by its name or its on-disk short name
pub fn lookup(name: &str) -> Result<&'static FieldDef> {
    FIELDS
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name) || f.index_name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigError::UnknownField(name.to_string()).into())
}

/// Parses a comma or whitespace separated list of field names, dropping repeats
pub fn parse_list(names: &str) -> Result<Vec<&'static FieldDef>> {
    let mut fields: Vec<&'static FieldDef> = Vec::new();
    for name in names
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|n| !n.is_empty())
    {
        let field = lookup(name)?;
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    Ok(fields)
}
