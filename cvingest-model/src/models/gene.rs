use cvingest_core::{IngestError, Result, XmlNode};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gene {
    pub id: String,
    pub hgnc_id: Option<String>,
    pub symbol: Option<String>,
    pub full_name: Option<String>,
    pub vcv_id: String,
}

///
/// Link between a variation and a gene. The gene itself is embedded until the
/// record is disassembled.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneAssociation {
    pub source: Option<String>,
    pub relationship_type: Option<String>,
    pub gene_id: String,
    pub variation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gene: Option<Gene>,
    pub content: Option<Value>,
}

impl GeneAssociation {
    ///
    /// Build an association (and its gene) from a `GeneList/Gene` element.
    ///
    /// # Arguments
    /// - node: the `Gene` element
    /// - variation_id: id of the variation whose gene list this is
    /// - vcv_id: accession of the owning archive
    ///
    pub fn from_xml(mut node: XmlNode, variation_id: &str, vcv_id: &str) -> Result<Self> {
        let gene_id = node.take_attr("GeneID").ok_or_else(|| {
            IngestError::UnknownShape(format!(
                "Gene without GeneID on variation {} in {}",
                variation_id, vcv_id
            ))
        })?;

        let gene = Gene {
            id: gene_id.clone(),
            hgnc_id: node.take_attr("HGNC_ID"),
            symbol: node.take_attr("Symbol"),
            full_name: node.take_attr("FullName"),
            vcv_id: vcv_id.to_string(),
        };

        Ok(GeneAssociation {
            source: node.take_attr("Source"),
            relationship_type: node.take_attr("RelationshipType"),
            gene_id,
            variation_id: variation_id.to_string(),
            gene: Some(gene),
            content: node.into_content(),
        })
    }
}
