pub mod clinical_assertion;
pub mod gene;
pub mod rcv;
pub mod submitter;
pub mod traits;
pub mod variation;
pub mod variation_archive;

pub use clinical_assertion::{
    AssertionContext, ClinicalAssertion, ClinicalAssertionObservation, ClinicalAssertionVariation,
};
pub use gene::{Gene, GeneAssociation};
pub use rcv::{RcvAccession, RcvAccessionClassification, RcvMapping};
pub use submitter::{Submission, Submitter};
pub use traits::{
    ClinicalAssertionTrait, ClinicalAssertionTraitSet, Trait, TraitContext, TraitMapping, TraitSet, XRef,
};
pub use variation::Variation;
pub use variation_archive::{RecordType, VariationArchive, VariationArchiveClassification};
