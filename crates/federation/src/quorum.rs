//! Folding guardian answers into a federation-wide outcome.

use std::{collections::HashMap, fmt};

use fedpeg_primitives::{DepositId, GuardianId};

use crate::{
    TransportError,
    types::{PROTOCOL_VERSION, PegInOutcome, PegInResponse, PegInStatus, PegInStatusResponse},
};

/// Result of one submission round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RoundOutcome {
    Accepted(DepositId),
    Rejected(String),
    /// Neither outcome is settled yet; carries a summary of what went wrong.
    Inconclusive(String),
}

/// What a quorum of guardians reports about a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederationStatus {
    /// No quorum knows the proof.
    Unknown,
    /// A quorum accepted the deposit under this id, but not all of it considers it final.
    Accepted(DepositId),
    Confirmed(DepositId),
    Rejected { reason: String },
}

#[derive(Debug, Default)]
struct Votes {
    known: HashMap<DepositId, usize>,
    confirmed: HashMap<DepositId, usize>,
    rejections: Vec<String>,
    faults: Vec<String>,
}

impl Votes {
    fn fault(&mut self, guardian: GuardianId, reason: impl fmt::Display) {
        self.faults.push(format!("{guardian}: {reason}"));
    }

    fn version_ok(&mut self, guardian: GuardianId, version: u16) -> bool {
        if version == PROTOCOL_VERSION {
            return true;
        }
        self.fault(guardian, format_args!("unsupported protocol version {version}"));
        false
    }

    fn quorum_id(counts: &HashMap<DepositId, usize>, threshold: usize) -> Option<DepositId> {
        counts
            .iter()
            .find(|&(_, &count)| count >= threshold)
            .map(|(id, _)| *id)
    }

    /// Whether so many guardians rejected that the rest cannot form a quorum.
    fn rejection_is_final(&self, guardians: usize, threshold: usize) -> bool {
        self.rejections.len() > guardians.saturating_sub(threshold)
    }

    fn rejection_reason(&self) -> String {
        self.rejections.first().cloned().unwrap_or_default()
    }

    fn summary(&self) -> String {
        let split = if self.known.len() > 1 {
            format!("guardians disagree on deposit id ({} ids)", self.known.len())
        } else {
            String::new()
        };
        let mut parts: Vec<_> = self.faults.clone();
        if !split.is_empty() {
            parts.push(split);
        }
        if parts.is_empty() {
            "not enough guardians agreed".to_string()
        } else {
            parts.join("; ")
        }
    }
}

pub(crate) fn tally_submission(
    responses: Vec<(GuardianId, Result<PegInResponse, TransportError>)>,
    threshold: usize,
) -> RoundOutcome {
    let guardians = responses.len();
    let mut votes = Votes::default();

    for (guardian, response) in responses {
        match response {
            Ok(response) if votes.version_ok(guardian, response.version) => {
                match response.outcome {
                    PegInOutcome::Accepted { deposit_id } => {
                        *votes.known.entry(deposit_id).or_default() += 1;
                    }
                    PegInOutcome::Rejected { reason } => votes.rejections.push(reason),
                }
            }
            Ok(_) => {}
            Err(err) => votes.fault(guardian, err),
        }
    }

    if let Some(id) = Votes::quorum_id(&votes.known, threshold) {
        RoundOutcome::Accepted(id)
    } else if votes.rejection_is_final(guardians, threshold) {
        RoundOutcome::Rejected(votes.rejection_reason())
    } else {
        RoundOutcome::Inconclusive(votes.summary())
    }
}

pub(crate) fn tally_status(
    responses: Vec<(GuardianId, Result<PegInStatusResponse, TransportError>)>,
    threshold: usize,
) -> FederationStatus {
    let guardians = responses.len();
    let mut votes = Votes::default();

    for (guardian, response) in responses {
        match response {
            Ok(response) if votes.version_ok(guardian, response.version) => {
                match response.status {
                    PegInStatus::Unknown => {}
                    PegInStatus::Accepted { deposit_id } => {
                        *votes.known.entry(deposit_id).or_default() += 1;
                    }
                    PegInStatus::Confirmed { deposit_id } => {
                        *votes.known.entry(deposit_id).or_default() += 1;
                        *votes.confirmed.entry(deposit_id).or_default() += 1;
                    }
                    PegInStatus::Rejected { reason } => votes.rejections.push(reason),
                }
            }
            Ok(_) => {}
            Err(err) => votes.fault(guardian, err),
        }
    }

    if let Some(id) = Votes::quorum_id(&votes.confirmed, threshold) {
        FederationStatus::Confirmed(id)
    } else if let Some(id) = Votes::quorum_id(&votes.known, threshold) {
        FederationStatus::Accepted(id)
    } else if votes.rejection_is_final(guardians, threshold) {
        FederationStatus::Rejected {
            reason: votes.rejection_reason(),
        }
    } else {
        FederationStatus::Unknown
    }
}
