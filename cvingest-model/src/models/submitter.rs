use cvingest_core::utils::sanitize_opt_date;
use cvingest_core::{IngestError, Result, XmlNode};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submitter {
    pub id: String,
    pub current_name: Option<String>,
    pub current_abbrev: Option<String>,
    pub org_category: Option<String>,
    pub all_names: Vec<String>,
    pub all_abbrevs: Vec<String>,
    pub content: Option<Value>,
}

impl Submitter {
    ///
    /// Take the submitter attributes off a `ClinVarAccession` or `SubmitterDescription`
    /// element. Only the submitter's own attributes are consumed.
    ///
    /// # Arguments
    /// - node: the element carrying `OrgID`, `SubmitterName`, ...
    /// - context: accession of the owning assertion
    ///
    pub fn take_from(node: &mut XmlNode, context: &str) -> Result<Self> {
        let id = node.take_attr("OrgID").ok_or_else(|| {
            IngestError::UnknownShape(format!("submitter without OrgID in {}", context))
        })?;
        let current_name = node.take_attr("SubmitterName");
        let current_abbrev = node.take_attr("OrgAbbreviation");

        Ok(Submitter {
            id,
            all_names: current_name.iter().cloned().collect(),
            all_abbrevs: current_abbrev.iter().cloned().collect(),
            current_name,
            current_abbrev,
            org_category: node.take_attr("OrganizationCategory"),
            content: None,
        })
    }

    /// Build an additional submitter from `AdditionalSubmitters/SubmitterDescription`.
    pub fn from_description(mut node: XmlNode, context: &str) -> Result<Self> {
        let mut submitter = Submitter::take_from(&mut node, context)?;
        submitter.content = node.into_content();
        Ok(submitter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub id: String,
    pub submitter_id: String,
    pub additional_submitter_ids: Vec<String>,
    pub submission_date: String,
}

impl Submission {
    ///
    /// A submission is identified by its submitter and the day it was made.
    ///
    /// # Arguments
    /// - submitter: the primary submitter
    /// - additional: submitters listed under `AdditionalSubmitters`
    /// - submission_date: raw `SubmissionDate` of the assertion
    /// - context: accession of the owning assertion
    ///
    pub fn new(
        submitter: &Submitter,
        additional: &[Submitter],
        submission_date: Option<String>,
        context: &str,
    ) -> Result<Self> {
        let submission_date = sanitize_opt_date(submission_date)?.ok_or_else(|| {
            IngestError::UnknownShape(format!("assertion {} has no SubmissionDate", context))
        })?;
        Ok(Submission {
            id: format!("{}.{}", submitter.id, submission_date),
            submitter_id: submitter.id.clone(),
            additional_submitter_ids: additional.iter().map(|s| s.id.clone()).collect(),
            submission_date,
        })
    }
}
