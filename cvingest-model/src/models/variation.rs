use cvingest_core::utils::parse_count;
use cvingest_core::{IngestError, Result, XmlNode};
use serde::Serialize;
use serde_json::Value;

use crate::models::gene::GeneAssociation;
use crate::variant_tree::{DescendantTree, VariantKind, VariantNode, take_variant_nodes};

/// The canonical variation of an archive record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variation {
    pub id: String,
    pub subclass_type: VariantKind,
    pub name: Option<String>,
    pub variation_type: Option<String>,
    pub allele_id: Option<String>,
    pub protein_change: Vec<String>,
    pub num_copies: Option<i64>,
    pub num_chromosomes: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gene_associations: Vec<GeneAssociation>,
    pub child_ids: Vec<String>,
    pub descendant_ids: Vec<String>,
    pub content: Option<Value>,
}

impl Variation {
    ///
    /// Take the single variation out of a `ClassifiedRecord`/`IncludedRecord`.
    ///
    /// # Errors
    /// - [IngestError::UnknownShape] when none of SimpleAllele/Haplotype/Genotype is present
    /// - [IngestError::UnexpectedCardinality] when more than one is
    ///
    pub fn take_from(container: &mut XmlNode, vcv_id: &str) -> Result<Self> {
        let mut roots = take_variant_nodes(container, vcv_id)?;
        match roots.len() {
            0 => Err(IngestError::UnknownShape(format!(
                "no SimpleAllele, Haplotype or Genotype in {}",
                vcv_id
            ))),
            1 => Variation::from_variant(roots.remove(0), vcv_id),
            _ => Err(IngestError::cardinality(vcv_id, "root variation")),
        }
    }

    pub fn from_variant(variant: VariantNode, vcv_id: &str) -> Result<Self> {
        let tree = DescendantTree::build(&variant.node, vcv_id)?;
        let mut node = variant.node;

        let id = node.take_attr("VariationID").ok_or_else(|| {
            IngestError::UnknownShape(format!("variation without VariationID in {}", vcv_id))
        })?;

        let name = node.take_child_text("Name", vcv_id)?;
        let variation_type = match node.take_child_text("VariantType", vcv_id)? {
            Some(t) => Some(t),
            None => node.take_child_text("VariationType", vcv_id)?,
        };
        let protein_change = node.take_child_texts("ProteinChange");

        let gene_associations = match node.take_one("GeneList", vcv_id)? {
            Some(mut gene_list) => {
                let genes = gene_list
                    .take_list("Gene")
                    .into_iter()
                    .map(|gene| GeneAssociation::from_xml(gene, &id, vcv_id))
                    .collect::<Result<Vec<_>>>()?;
                if !gene_list.is_empty() {
                    node.push_child("GeneList", gene_list);
                }
                genes
            }
            None => Vec::new(),
        };

        Ok(Variation {
            subclass_type: variant.kind,
            name,
            variation_type,
            allele_id: node.take_attr("AlleleID"),
            protein_change,
            num_copies: parse_count(node.take_attr("NumberOfCopies")),
            num_chromosomes: parse_count(node.take_attr("NumberOfChromosomes")),
            gene_associations,
            child_ids: tree.get_all_children(),
            descendant_ids: tree.get_all_descendants(),
            content: node.into_content(),
            id,
        })
    }
}
