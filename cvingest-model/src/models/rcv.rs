use cvingest_core::utils::{parse_count, sanitize_opt_date};
use cvingest_core::{IngestError, Result, XmlNode};
use serde::Serialize;
use serde_json::Value;

use crate::statement::{StatementFields, StatementType, take_statements};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RcvAccessionClassification {
    pub rcv_id: String,
    pub statement_type: StatementType,
    pub review_status: Option<String>,
    pub interpretation_description: Option<String>,
    pub num_submissions: Option<i64>,
    pub date_last_evaluated: Option<String>,
    pub clinical_impact_assertion_type: Option<String>,
    pub clinical_impact_clinical_significance: Option<String>,
    pub content: Option<Value>,
}

impl RcvAccessionClassification {
    pub fn from_statement(fields: StatementFields, rcv_id: &str) -> Self {
        RcvAccessionClassification {
            rcv_id: rcv_id.to_string(),
            statement_type: fields.statement_type,
            review_status: fields.review_status,
            interpretation_description: fields.description,
            num_submissions: fields.num_submissions,
            date_last_evaluated: fields.date_last_evaluated,
            clinical_impact_assertion_type: fields.clinical_impact_assertion_type,
            clinical_impact_clinical_significance: fields.clinical_impact_clinical_significance,
            content: fields.rest.into_content(),
        }
    }
}

/// An aggregate record for one variation and one condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RcvAccession {
    pub id: String,
    pub version: Option<String>,
    pub title: Option<String>,
    pub variation_archive_id: String,
    pub variation_id: String,
    pub trait_set_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<RcvAccessionClassification>,
    pub content: Option<Value>,
}

///
/// Before 2024 an RCV carried a single germline interpretation in attributes on the
/// `RCVAccession` element itself.
///
fn legacy_rcv_statement(node: &mut XmlNode) -> Result<Option<StatementFields>> {
    let Some(description) = node.take_attr("Interpretation") else {
        return Ok(None);
    };
    Ok(Some(StatementFields {
        statement_type: StatementType::GermlineClassification,
        review_status: node.take_attr("ReviewStatus"),
        description: Some(description),
        num_submissions: parse_count(node.take_attr("SubmissionCount")),
        num_submitters: None,
        date_last_evaluated: sanitize_opt_date(node.take_attr("DateLastEvaluated"))?,
        date_created: None,
        most_recent_submission: None,
        clinical_impact_assertion_type: None,
        clinical_impact_clinical_significance: None,
        rest: XmlNode::new(),
    }))
}

impl RcvAccession {
    ///
    /// Build an RCV from an `RCVList/RCVAccession` element.
    ///
    /// # Arguments
    /// - node: the `RCVAccession` element
    /// - variation_archive_id: accession of the owning archive
    /// - variation_id: id of the archive's variation
    ///
    pub fn from_xml(mut node: XmlNode, variation_archive_id: &str, variation_id: &str) -> Result<Self> {
        let id = node.take_attr("Accession").ok_or_else(|| {
            IngestError::UnknownShape(format!("RCVAccession without Accession in {}", variation_archive_id))
        })?;

        let trait_set_id = node.take_child_attr("ClassifiedConditionList", "TraitSetID", &id)?;

        let statements = match node.take_one("RCVClassifications", &id)? {
            Some(mut list) => {
                let statements = take_statements(&mut list, &id)?;
                if !list.is_empty() {
                    node.push_child("RCVClassifications", list);
                }
                statements
            }
            None => legacy_rcv_statement(&mut node)?.into_iter().collect(),
        };

        Ok(RcvAccession {
            version: node.take_attr("Version"),
            title: node.take_attr("Title"),
            variation_archive_id: variation_archive_id.to_string(),
            variation_id: variation_id.to_string(),
            trait_set_id,
            classifications: statements
                .into_iter()
                .map(|s| RcvAccessionClassification::from_statement(s, &id))
                .collect(),
            content: node.into_content(),
            id,
        })
    }
}

/// Which submissions an RCV aggregates, from an RCV release `ClinVarSet`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RcvMapping {
    pub rcv_accession: String,
    pub scv_accessions: Vec<String>,
    pub trait_set_id: Option<String>,
}

impl RcvMapping {
    pub fn from_xml(mut node: XmlNode) -> Result<Self> {
        let context = node
            .attr("ID")
            .map(|id| format!("ClinVarSet {}", id))
            .unwrap_or_else(|| "ClinVarSet".to_string());

        let mut reference = node
            .take_one("ReferenceClinVarAssertion", &context)?
            .ok_or_else(|| {
                IngestError::UnknownShape(format!("{} without ReferenceClinVarAssertion", context))
            })?;
        let rcv_accession = reference
            .take_child_attr("ClinVarAccession", "Acc", &context)?
            .ok_or_else(|| IngestError::UnknownShape(format!("{} without an RCV accession", context)))?;
        let trait_set_id = reference.take_child_attr("TraitSet", "ID", &rcv_accession)?;

        let mut scv_accessions = Vec::new();
        for mut assertion in node.take_list("ClinVarAssertion") {
            if let Some(scv) = assertion.take_child_attr("ClinVarAccession", "Acc", &rcv_accession)? {
                scv_accessions.push(scv);
            }
        }

        Ok(RcvMapping {
            rcv_accession,
            scv_accessions,
            trait_set_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::parse_node;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn test_rcv_with_two_statements() {
        let node = parse_node(
            r#"<RCVAccession Title="NM_007294.4(BRCA1):c.4065_4068del AND Breast-ovarian cancer" Accession="RCV000019283" Version="10">
                 <ClassifiedConditionList TraitSetID="2348">
                   <ClassifiedCondition DB="MedGen" ID="C2676676">Breast-ovarian cancer, familial 1</ClassifiedCondition>
                 </ClassifiedConditionList>
                 <RCVClassifications>
                   <OncogenicityClassification>
                     <ReviewStatus>no assertion criteria provided</ReviewStatus>
                     <Description SubmissionCount="1">Oncogenic</Description>
                   </OncogenicityClassification>
                   <GermlineClassification>
                     <ReviewStatus>reviewed by expert panel</ReviewStatus>
                     <Description DateLastEvaluated="2016-06-14" SubmissionCount="2">Pathogenic</Description>
                   </GermlineClassification>
                 </RCVClassifications>
               </RCVAccession>"#,
        );
        let rcv = RcvAccession::from_xml(node, "VCV000017661", "17661").unwrap();
        assert_eq!(rcv.id, "RCV000019283");
        assert_eq!(rcv.version.as_deref(), Some("10"));
        assert_eq!(rcv.trait_set_id.as_deref(), Some("2348"));
        assert_eq!(rcv.variation_id, "17661");

        let types: Vec<StatementType> = rcv.classifications.iter().map(|c| c.statement_type).collect();
        assert_eq!(
            types,
            vec![
                StatementType::GermlineClassification,
                StatementType::OncogenicityClassification
            ]
        );
        assert_eq!(rcv.classifications[0].num_submissions, Some(2));
        assert_eq!(rcv.classifications[0].rcv_id, "RCV000019283");
        // the classified conditions stay in the payload
        assert!(rcv.content.unwrap().get("ClassifiedConditionList").is_some());
    }

    #[rstest]
    fn test_legacy_rcv() {
        let node = parse_node(
            r#"<RCVAccession Title="t" Accession="RCV000000012" Version="5" Interpretation="Pathogenic" ReviewStatus="no assertion criteria provided" SubmissionCount="1" DateLastEvaluated="2010-07-01"/>"#,
        );
        let rcv = RcvAccession::from_xml(node, "VCV1", "1").unwrap();
        assert_eq!(rcv.classifications.len(), 1);
        let c = &rcv.classifications[0];
        assert_eq!(c.statement_type, StatementType::GermlineClassification);
        assert_eq!(c.interpretation_description.as_deref(), Some("Pathogenic"));
        assert_eq!(c.date_last_evaluated.as_deref(), Some("2010-07-01"));
        assert_eq!(rcv.content, None);
    }

    #[rstest]
    fn test_rcv_mapping() {
        let node = parse_node(
            r#"<ClinVarSet ID="93287540">
                 <RecordStatus>current</RecordStatus>
                 <ReferenceClinVarAssertion ID="56789">
                   <ClinVarAccession Acc="RCV000000012" Version="5" Type="RCV"/>
                   <TraitSet Type="Disease" ID="3"><Trait Type="Disease"/></TraitSet>
                 </ReferenceClinVarAssertion>
                 <ClinVarAssertion ID="20155"><ClinVarAccession Acc="SCV000020155" Version="3" Type="SCV"/></ClinVarAssertion>
                 <ClinVarAssertion ID="20156"><ClinVarAccession Acc="SCV000020156" Version="1" Type="SCV"/></ClinVarAssertion>
               </ClinVarSet>"#,
        );
        let mapping = RcvMapping::from_xml(node).unwrap();
        assert_eq!(mapping.rcv_accession, "RCV000000012");
        assert_eq!(mapping.scv_accessions, vec!["SCV000020155", "SCV000020156"]);
        assert_eq!(mapping.trait_set_id.as_deref(), Some("3"));
    }

    #[rstest]
    fn test_rcv_mapping_without_reference() {
        let node = parse_node(r#"<ClinVarSet ID="1"><ClinVarAssertion/></ClinVarSet>"#);
        assert!(matches!(
            RcvMapping::from_xml(node),
            Err(IngestError::UnknownShape(_))
        ));
    }
}
