//! Classification statement extraction shared by SCV, RCV and VCV classifications.
//!
//! ClinVar supports three statement types per record. An SCV carries exactly one of
//! them, RCVs and VCVs any subset. The element layout differs slightly per level:
//!
//! - VCV: `Classifications/<Type DateLastEvaluated NumberOfSubmissions ...>` with
//!   `ReviewStatus` and `Description` children.
//! - RCV: `RCVClassifications/<Type>` with `ReviewStatus` and a `Description`
//!   carrying `DateLastEvaluated` and `SubmissionCount`.
//! - SCV: `Classification/<Type>` whose own text is the description, with review
//!   status and evaluation date on the enclosing `Classification`.
//!
//! [StatementFields::extract] accepts all three and leaves everything it does not
//! recognise in [StatementFields::rest].

use cvingest_core::utils::{parse_count, sanitize_opt_date};
use cvingest_core::{IngestError, Result, XmlNode};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StatementType {
    GermlineClassification,
    SomaticClinicalImpact,
    OncogenicityClassification,
}

impl StatementType {
    /// Declaration order, which is also the emission order.
    pub const ALL: [StatementType; 3] = [
        StatementType::GermlineClassification,
        StatementType::SomaticClinicalImpact,
        StatementType::OncogenicityClassification,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            StatementType::GermlineClassification => "GermlineClassification",
            StatementType::SomaticClinicalImpact => "SomaticClinicalImpact",
            StatementType::OncogenicityClassification => "OncogenicityClassification",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatementFields {
    pub statement_type: StatementType,
    pub review_status: Option<String>,
    pub description: Option<String>,
    pub num_submissions: Option<i64>,
    pub num_submitters: Option<i64>,
    pub date_last_evaluated: Option<String>,
    pub date_created: Option<String>,
    pub most_recent_submission: Option<String>,
    pub clinical_impact_assertion_type: Option<String>,
    pub clinical_impact_clinical_significance: Option<String>,
    pub rest: XmlNode,
}

impl StatementFields {
    ///
    /// Pull the statement fields out of a statement-type node.
    ///
    /// # Arguments
    /// - statement_type: which of the three types `node` is
    /// - node: the `GermlineClassification`/`SomaticClinicalImpact`/`OncogenicityClassification` element
    /// - context: accession of the owning record, for error messages
    ///
    pub fn extract(statement_type: StatementType, mut node: XmlNode, context: &str) -> Result<Self> {
        let review_status = node.take_child_text("ReviewStatus", context)?;

        let mut date_last_evaluated = node.take_attr("DateLastEvaluated");
        let mut num_submissions = parse_count(node.take_attr("NumberOfSubmissions"));
        let num_submitters = parse_count(node.take_attr("NumberOfSubmitters"));
        let date_created = node.take_attr("DateCreated");
        let most_recent_submission = node.take_attr("MostRecentSubmission");

        let somatic = statement_type == StatementType::SomaticClinicalImpact;
        let mut clinical_impact_assertion_type = None;
        let mut clinical_impact_clinical_significance = None;

        let description = match node.take_one("Description", context)? {
            Some(mut desc) => {
                if date_last_evaluated.is_none() {
                    date_last_evaluated = desc.take_attr("DateLastEvaluated");
                }
                if num_submissions.is_none() {
                    num_submissions = parse_count(desc.take_attr("SubmissionCount"));
                }
                if somatic {
                    clinical_impact_assertion_type = desc.take_attr("ClinicalImpactAssertionType");
                    clinical_impact_clinical_significance =
                        desc.take_attr("ClinicalImpactClinicalSignificance");
                }
                let text = desc.take_text();
                if !desc.is_empty() {
                    node.push_child("Description", desc);
                }
                text
            }
            None => node.take_text(),
        };

        if somatic {
            clinical_impact_assertion_type =
                clinical_impact_assertion_type.or_else(|| node.take_attr("ClinicalImpactAssertionType"));
            clinical_impact_clinical_significance = clinical_impact_clinical_significance
                .or_else(|| node.take_attr("ClinicalImpactClinicalSignificance"));
        }

        Ok(Self {
            statement_type,
            review_status,
            description,
            num_submissions,
            num_submitters,
            date_last_evaluated: sanitize_opt_date(date_last_evaluated)?,
            date_created: sanitize_opt_date(date_created)?,
            most_recent_submission: sanitize_opt_date(most_recent_submission)?,
            clinical_impact_assertion_type,
            clinical_impact_clinical_significance,
            rest: node,
        })
    }

    /// The "no submissions, no submitters" node found in included records.
    pub fn is_placeholder(&self) -> bool {
        self.num_submissions == Some(0) && self.num_submitters == Some(0)
    }
}

///
/// Take every statement present under `parent`, in [StatementType::ALL] order.
///
/// # Errors
/// [IngestError::UnexpectedCardinality] if one statement type occurs twice.
///
pub fn take_statements(parent: &mut XmlNode, context: &str) -> Result<Vec<StatementFields>> {
    let mut statements = Vec::new();
    for statement_type in StatementType::ALL {
        if let Some(node) = parent.take_one(statement_type.tag(), context)? {
            statements.push(StatementFields::extract(statement_type, node, context)?);
        }
    }
    Ok(statements)
}

///
/// Take the one statement of a submission-level classification.
///
/// # Errors
/// [IngestError::UnexpectedCardinality] if more than one statement type is present.
///
pub fn take_single_statement(parent: &mut XmlNode, context: &str) -> Result<Option<StatementFields>> {
    let mut statements = take_statements(parent, context)?;
    if statements.len() > 1 {
        let present: Vec<&str> = statements.iter().map(|s| s.statement_type.tag()).collect();
        return Err(IngestError::cardinality(
            context,
            format!("statement types ({})", present.join(", ")),
        ));
    }
    Ok(statements.pop())
}

///
/// Read a pre-2024 `Interpretation` node as a germline statement.
///
/// The old layout has no statement types; everything it says is germline.
///
pub fn legacy_interpretation(mut node: XmlNode, context: &str) -> Result<StatementFields> {
    // the old Type attribute ("Clinical significance") has no counterpart
    let legacy_type = node.take_attr("Type");
    let mut fields = StatementFields::extract(StatementType::GermlineClassification, node, context)?;
    if let Some(legacy_type) = legacy_type {
        if legacy_type != "Clinical significance" {
            fields.rest.set_attr("Type", legacy_type);
        }
    }
    Ok(fields)
}
