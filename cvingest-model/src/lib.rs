//! # ClinVar domain model.
//!
//! Builds typed records out of the generic trees produced by `cvingest-io` and
//! linearizes them into a stream of [Entity] values.
//!
//! - [statement] reads the three classification statement types in all their layouts
//! - [variant_tree] handles the Genotype/Haplotype/SimpleAllele hierarchy and the ids of
//!   submitted variants
//! - [models] holds one constructor per entity type
//! - [disassemble] flattens a composed [models::VariationArchive]
//!
pub mod disassemble;
pub mod entity;
pub mod models;
pub mod record;
pub mod statement;
pub mod variant_tree;

// re-exports
pub use disassemble::disassemble;
pub use entity::Entity;
pub use record::{CLINVAR_SET_TAG, ReleaseRecord, VARIATION_ARCHIVE_TAG};
pub use statement::StatementType;
pub use variant_tree::{DescendantTree, VariantKind};

#[cfg(test)]
pub(crate) mod test_utils {
    use cvingest_core::XmlNode;
    use cvingest_io::RecordParser;

    /// Parse a single element into a generic tree.
    pub fn parse_node(xml: &str) -> XmlNode {
        let doc = format!("<ClinVarVariationRelease>{}</ClinVarVariationRelease>", xml);
        let mut parser = RecordParser::new(doc.as_bytes());
        parser
            .next_record()
            .expect("well-formed test xml")
            .expect("one element")
            .node
    }
}
