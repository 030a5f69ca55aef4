//! Admin decisions on verifications.
//!
//! Every entry point resolves the affected verifications, builds one
//! [`DecisionUpdate`] per record and hands them to the store in a single call,
//! so a decision and its catalogue entry cascade are written together.

use super::models::{AiVerification, VerificationDecision};
use crate::catalogue::CatalogueIndexStatus;
use crate::catalogue_store::{DecisionUpdate, PendingVerificationFilter, VerificationStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub struct DecisionResolver {
    verification_store: Arc<dyn VerificationStore>,
}

impl DecisionResolver {
    pub fn new(verification_store: Arc<dyn VerificationStore>) -> Self {
        Self { verification_store }
    }

    /// Returns false if the verification does not exist. Already decided
    /// verifications are decided again.
    pub fn set_decision(&self, verification_id: &str, decision: VerificationDecision) -> Result<bool> {
        let Some(verification) = self.verification_store.get_verification(verification_id)? else {
            return Ok(false);
        };
        let applied = self.apply(&[verification], decision)?;
        Ok(applied > 0)
    }

    /// Unknown ids are ignored. Returns the number of verifications updated.
    pub fn set_batch_decision(
        &self,
        verification_ids: &[String],
        decision: VerificationDecision,
    ) -> Result<usize> {
        let verifications = self.verification_store.get_verifications(verification_ids)?;
        self.apply(&verifications, decision)
    }

    /// Decides every pending verification matching `filter`.
    pub fn set_bulk_decision_by_filter(
        &self,
        filter: &PendingVerificationFilter,
        decision: VerificationDecision,
    ) -> Result<usize> {
        let verifications = self.verification_store.list_pending(filter)?;
        let count = self.apply(&verifications, decision)?;
        info!(
            "Bulk {} of {} pending verifications (distributor: {:?}, ukrainian: {:?})",
            decision.as_str(),
            count,
            filter.distributor_code,
            filter.is_ukrainian
        );
        Ok(count)
    }

    fn apply(&self, verifications: &[AiVerification], decision: VerificationDecision) -> Result<usize> {
        let redecided = verifications.iter().filter(|v| !v.is_pending()).count();
        if redecided > 0 {
            info!("Re-deciding {} already decided verifications", redecided);
        }
        let updates: Vec<DecisionUpdate> = verifications
            .iter()
            .map(|v| decision_update(v, decision))
            .collect();
        self.verification_store.apply_decisions(&updates)
    }
}

/// Confirmation links the matched album. Rejection leaves the link alone.
fn decision_update(verification: &AiVerification, decision: VerificationDecision) -> DecisionUpdate {
    let (entry_status, discography_id) = match decision {
        VerificationDecision::Confirmed => (
            CatalogueIndexStatus::AiVerified,
            verification.matched_discography_id.clone(),
        ),
        VerificationDecision::Rejected => (CatalogueIndexStatus::NotRelevant, None),
    };
    DecisionUpdate {
        verification_id: verification.id.clone(),
        catalogue_index_id: verification.catalogue_index_id.clone(),
        decision,
        entry_status,
        discography_id,
    }
}
